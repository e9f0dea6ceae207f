//! Page rendering
//!
//! The crawler talks to a rendering engine only through the [`Renderer`] and
//! [`PageHandle`] traits. Two engines are provided:
//! - [`ChromiumRenderer`] drives a headless Chromium over CDP
//! - [`HttpRenderer`] fetches pages with plain HTTP and never runs scripts
//!
//! Both share [`StatusProbe`] for the status-only requests made against
//! external URLs.

mod chromium;
mod http;
mod probe;
mod settle;
mod timing;

pub use chromium::{ChromiumPage, ChromiumRenderer};
pub use http::{HttpPage, HttpRenderer};
pub use probe::StatusProbe;
pub use settle::{settle, SettlePolicy};
pub use timing::{parse_performance_timing, NavigationTimings};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Selector used to collect hyperlinks from a rendered page
pub const LINK_SELECTOR: &str = "a[href]";

/// Errors raised by a rendering engine
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A bounded wait ran out
    #[error("Timed out after {}ms waiting for {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Navigation to {0} produced no response")]
    NoResponse(String),

    #[error("Page or browser already closed")]
    Closed,
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Page lifecycle signals a handle can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The load event has fired
    Load,
    /// No new network activity for a short quiet period
    NetworkIdle,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Load => write!(f, "load"),
            LoadState::NetworkIdle => write!(f, "network idle"),
        }
    }
}

/// A single page owned by one worker for the duration of one fetch
#[async_trait]
pub trait PageHandle: Send {
    /// Navigates to `url`, waiting at most `timeout` for the document
    ///
    /// # Returns
    ///
    /// * `Ok(Some(status))` - Status code of the navigation response
    /// * `Ok(None)` - The navigation completed without a response
    /// * `Err(RenderError)` - Navigation failed or timed out
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>, RenderError>;

    /// Waits for a lifecycle signal
    ///
    /// Returns `RenderError::Timeout` when the signal does not arrive within
    /// `timeout`.
    async fn wait_for(&mut self, state: LoadState, timeout: Duration) -> Result<(), RenderError>;

    /// Timing offsets of the last navigation
    async fn timings(&mut self) -> Result<NavigationTimings, RenderError>;

    /// Serialized document content
    async fn content(&mut self) -> Result<String, RenderError>;

    /// Resolved `href` values of every element matching `selector`
    async fn hrefs(&mut self, selector: &str) -> Result<Vec<String>, RenderError>;

    /// Releases the page. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// A rendering engine shared by all workers of a run
#[async_trait]
pub trait Renderer: Send + Sync {
    type Page: PageHandle + 'static;

    /// Allocates a fresh page
    async fn open_page(&self) -> Result<Self::Page, RenderError>;

    /// Status-only request: no rendering, no page allocated
    async fn request_status(&self, url: &str, timeout: Duration) -> Result<u16, RenderError>;

    /// Releases engine-wide resources once every worker has finished
    async fn shutdown(&self) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_soft() {
        let err = RenderError::Timeout {
            what: LoadState::NetworkIdle.to_string(),
            after: Duration::from_millis(1500),
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Timed out after 1500ms waiting for network idle"
        );
        assert!(!RenderError::Closed.is_timeout());
    }
}
