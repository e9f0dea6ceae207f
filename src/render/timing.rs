//! Navigation timing metrics
//!
//! Pages report their timing marks through the legacy
//! `window.performance.timing` object, serialized to JSON in the page. All
//! three metrics are offsets in milliseconds from `navigationStart`.

use serde::Deserialize;

/// Timing offsets for one navigation, relative to navigation start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationTimings {
    /// Time to first byte
    pub ttfb_ms: Option<i64>,
    /// End of the DOMContentLoaded event
    pub dom_content_loaded_ms: Option<i64>,
    /// End of the load event
    pub load_event_end_ms: Option<i64>,
}

/// The subset of `PerformanceTiming` we read
///
/// Marks that have not happened yet are reported as 0.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PerformanceTiming {
    navigation_start: i64,
    response_start: i64,
    dom_content_loaded_event_end: i64,
    load_event_end: i64,
}

impl PerformanceTiming {
    fn offset(&self, mark: i64) -> Option<i64> {
        if mark == 0 || self.navigation_start == 0 {
            None
        } else {
            Some(mark - self.navigation_start)
        }
    }
}

impl From<PerformanceTiming> for NavigationTimings {
    fn from(timing: PerformanceTiming) -> Self {
        Self {
            ttfb_ms: timing.offset(timing.response_start),
            dom_content_loaded_ms: timing.offset(timing.dom_content_loaded_event_end),
            load_event_end_ms: timing.offset(timing.load_event_end),
        }
    }
}

/// Parses the JSON form of `window.performance.timing`
///
/// # Arguments
///
/// * `json` - Output of `JSON.stringify(window.performance.timing)`
///
/// # Returns
///
/// * `Ok(NavigationTimings)` - Offsets for every mark that has fired
/// * `Err(serde_json::Error)` - The text was not a timing object
pub fn parse_performance_timing(json: &str) -> Result<NavigationTimings, serde_json::Error> {
    let timing: PerformanceTiming = serde_json::from_str(json)?;
    Ok(timing.into())
}
