//! Status-only requests
//!
//! External URLs are never rendered. A single GET (redirects followed) tells
//! us whether they resolve, and the body is discarded unread.

use crate::render::RenderError;
use crate::state::RenderMode;
use reqwest::Client;
use std::time::Duration;

/// Issues status-only requests with the run's user agent
#[derive(Debug, Clone)]
pub struct StatusProbe {
    client: Client,
}

impl StatusProbe {
    /// Builds a probe presenting the user agent of `mode`
    ///
    /// # Returns
    ///
    /// * `Ok(StatusProbe)` - Ready to issue requests
    /// * `Err(RenderError)` - The HTTP client could not be built
    pub fn new(mode: RenderMode) -> Result<Self, RenderError> {
        let client = Client::builder()
            .user_agent(mode.user_agent())
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    /// Shares an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Requests `url` and returns the final response status
    ///
    /// Any status, including 4xx and 5xx, is a successful probe. Only
    /// transport failures and timeouts are errors.
    pub async fn status(&self, url: &str, timeout: Duration) -> Result<u16, RenderError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        Ok(response.status().as_u16())
    }
}
