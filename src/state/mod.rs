//! State module for the lifecycle enums persisted by the crawler
//!
//! # Components
//!
//! - `UrlStatus`: lifecycle of a frontier row (pending, in progress, done, error)
//! - `Category`: internal vs external classification relative to the seed
//! - `RenderMode`: rendering profile, which selects the user agent

mod category;
mod render_mode;
mod url_status;

// Re-export main types
pub use category::Category;
pub use render_mode::RenderMode;
pub use url_status::UrlStatus;
