//! URL handling module for Snapgraph
//!
//! This module provides authority extraction and the internal/external
//! classifier. URLs are not normalized: the frontier identity is
//! the exact string a link resolved to.

mod authority;

use crate::state::Category;

// Re-export main functions
pub use authority::{authority_of, extract_authority};

/// Classifies a URL relative to the seed's authority
///
/// A URL whose authority equals `base_authority` is internal; anything else,
/// including strings that do not parse as URLs, is external. The comparison
/// is a pure function of the two authorities.
///
/// # Arguments
///
/// * `url` - The URL string to classify
/// * `base_authority` - The seed's authority, as returned by [`extract_authority`]
///
/// # Examples
///
/// ```
/// use snapgraph::state::Category;
/// use snapgraph::url::classify;
///
/// assert_eq!(classify("http://a.test/b", "a.test"), Category::Internal);
/// assert_eq!(classify("http://other.test/", "a.test"), Category::External);
/// ```
pub fn classify(url: &str, base_authority: &str) -> Category {
    match authority_of(url) {
        Some(authority) if authority == base_authority.to_lowercase() => Category::Internal,
        _ => Category::External,
    }
}
