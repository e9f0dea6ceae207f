//! Best-effort page settling
//!
//! There is no reliable "fully loaded" signal for dynamic pages. Settling
//! approximates it with two bounded waits followed by a short fixed delay.
//! Running out of time on either wait is not an error: the page is used in
//! whatever state it reached. A script failure while waiting, such as a
//! context destroyed by a client-side redirect, is treated the same way.

use crate::config::CrawlerConfig;
use crate::render::{LoadState, PageHandle, RenderError};
use std::time::Duration;
use tracing::debug;

/// Deadlines for the settle sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    /// Limit for each of the two load-state waits
    pub wait_timeout: Duration,
    /// Fixed delay after both waits
    pub grace_delay: Duration,
}

impl SettlePolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            wait_timeout: config.settle_timeout(),
            grace_delay: config.grace_delay(),
        }
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(15_000),
            grace_delay: Duration::from_millis(250),
        }
    }
}

/// Waits for load, then network idle, then the grace delay
///
/// # Returns
///
/// * `Ok(true)` - Both signals arrived in time
/// * `Ok(false)` - At least one wait timed out or could not be evaluated
/// * `Err(RenderError)` - The page is gone or otherwise unusable
pub async fn settle<P>(page: &mut P, policy: SettlePolicy) -> Result<bool, RenderError>
where
    P: PageHandle + ?Sized,
{
    let mut settled = true;

    for state in [LoadState::Load, LoadState::NetworkIdle] {
        match page.wait_for(state, policy.wait_timeout).await {
            Ok(()) => {}
            Err(err) if err.is_timeout() || matches!(err, RenderError::Script(_)) => {
                debug!("Proceeding without {} signal: {}", state, err);
                settled = false;
            }
            Err(err) => return Err(err),
        }
    }

    if !policy.grace_delay.is_zero() {
        tokio::time::sleep(policy.grace_delay).await;
    }

    Ok(settled)
}
