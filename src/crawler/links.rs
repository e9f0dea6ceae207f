//! Link extraction and staging
//!
//! Hyperlinks come out of the rendered page already resolved to absolute
//! URLs. Only http and https targets are kept, the page's own URL is dropped,
//! and duplicates are removed by exact string comparison. Nothing is
//! normalized: `http://a.test/x` and `http://a.test/x/` are different targets.

use crate::render::{PageHandle, RenderError, LINK_SELECTOR};
use crate::storage::{StagedLink, Storage, StorageResult};
use std::collections::BTreeSet;
use url::Url;

/// Reads the page's hyperlinks and reduces them to the set of crawlable
/// targets
///
/// # Arguments
///
/// * `page` - A page that has been navigated to `current_url`
/// * `current_url` - The address the page was claimed under
pub async fn extract_links<P>(page: &mut P, current_url: &str) -> Result<BTreeSet<String>, RenderError>
where
    P: PageHandle + ?Sized,
{
    let hrefs = page.hrefs(LINK_SELECTOR).await?;
    Ok(filter_targets(hrefs, current_url))
}

/// Keeps absolute http(s) targets other than `current_url`, deduplicated
///
/// # Example
///
/// ```
/// use snapgraph::crawler::filter_targets;
///
/// let targets = filter_targets(
///     vec![
///         "http://a.test/b".to_string(),
///         "http://a.test/b".to_string(),
///         "http://a.test/".to_string(),
///         "mailto:x@a.test".to_string(),
///     ],
///     "http://a.test/",
/// );
/// assert_eq!(targets.len(), 1);
/// ```
pub fn filter_targets<I>(hrefs: I, current_url: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    hrefs
        .into_iter()
        .filter(|href| href != current_url)
        .filter(|href| is_crawlable(href))
        .collect()
}

fn is_crawlable(href: &str) -> bool {
    match Url::parse(href) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Registers every target in the frontier and stages one edge per target
///
/// Targets are inserted as pending rows immediately. The returned edges are
/// only persisted together with the snapshot that owns them.
pub fn stage_links<S>(
    storage: &mut S,
    source_id: i64,
    targets: &BTreeSet<String>,
    base_authority: &str,
) -> StorageResult<Vec<StagedLink>>
where
    S: Storage + ?Sized,
{
    targets
        .iter()
        .map(|target| {
            let target_id = storage.register_discovered(target, base_authority)?;
            Ok(StagedLink {
                source_id,
                target_id,
            })
        })
        .collect()
}
