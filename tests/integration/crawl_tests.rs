//! Integration tests for the crawler
//!
//! Most tests drive the pipeline with a scripted in-memory renderer, so no
//! browser is needed. The last tests use wiremock and the plain HTTP engine
//! to exercise a full crawl end-to-end.

use async_trait::async_trait;
use snapgraph::config::Config;
use snapgraph::crawler::{crawl_with, process_claimed, PipelineContext};
use snapgraph::render::{
    HttpRenderer, LoadState, NavigationTimings, PageHandle, RenderError, Renderer, SettlePolicy,
};
use snapgraph::storage::{SqliteStorage, Storage, UrlRecord};
use snapgraph::{Category, RenderMode, SnapgraphError, UrlStatus};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// How a scripted internal page behaves
#[derive(Debug, Clone)]
enum ScriptedPage {
    Ok {
        status: Option<u16>,
        html: String,
        links: Vec<String>,
    },
    NavigationFails(String),
    ContentFails {
        links: Vec<String>,
    },
    /// The document parses but its load event never fires
    LoadNeverFires {
        html: String,
    },
}

impl ScriptedPage {
    fn ok(html: &str, links: &[&str]) -> Self {
        ScriptedPage::Ok {
            status: Some(200),
            html: html.to_string(),
            links: links.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// A site held in memory
#[derive(Default)]
struct ScriptedRenderer {
    pages: HashMap<String, ScriptedPage>,
    statuses: HashMap<String, u16>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    status_requests: Mutex<Vec<String>>,
    crash_on_status: bool,
}

impl ScriptedRenderer {
    fn page(mut self, url: &str, page: ScriptedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    fn external(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedHandle {
    pages: HashMap<String, ScriptedPage>,
    current: Option<ScriptedPage>,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    type Page = ScriptedHandle;

    async fn open_page(&self) -> Result<ScriptedHandle, RenderError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            pages: self.pages.clone(),
            current: None,
            closed: Arc::clone(&self.closed),
            is_closed: false,
        })
    }

    async fn request_status(&self, url: &str, _timeout: Duration) -> Result<u16, RenderError> {
        if self.crash_on_status {
            panic!("status check for {} crashed", url);
        }
        self.status_requests.lock().unwrap().push(url.to_string());
        self.statuses
            .get(url)
            .copied()
            .ok_or_else(|| RenderError::Navigation {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

#[async_trait]
impl PageHandle for ScriptedHandle {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<Option<u16>, RenderError> {
        let page = self.pages.get(url).cloned().ok_or_else(|| RenderError::Navigation {
            url: url.to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })?;
        let status = match &page {
            ScriptedPage::Ok { status, .. } => *status,
            ScriptedPage::NavigationFails(message) => {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    message: message.clone(),
                })
            }
            ScriptedPage::ContentFails { .. } | ScriptedPage::LoadNeverFires { .. } => Some(200),
        };
        self.current = Some(page);
        Ok(status)
    }

    async fn wait_for(&mut self, state: LoadState, timeout: Duration) -> Result<(), RenderError> {
        // Network idle never arrives; the pipeline must carry on regardless
        let load_hangs = matches!(self.current, Some(ScriptedPage::LoadNeverFires { .. }));
        match state {
            LoadState::Load if !load_hangs => Ok(()),
            _ => Err(RenderError::Timeout {
                what: state.to_string(),
                after: timeout,
            }),
        }
    }

    async fn timings(&mut self) -> Result<NavigationTimings, RenderError> {
        Ok(NavigationTimings {
            ttfb_ms: Some(12),
            dom_content_loaded_ms: Some(40),
            load_event_end_ms: Some(55),
        })
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        match &self.current {
            Some(ScriptedPage::Ok { html, .. }) | Some(ScriptedPage::LoadNeverFires { html }) => {
                Ok(html.clone())
            }
            _ => Err(RenderError::Script("Execution context was destroyed".to_string())),
        }
    }

    async fn hrefs(&mut self, _selector: &str) -> Result<Vec<String>, RenderError> {
        match &self.current {
            Some(ScriptedPage::Ok { links, .. }) | Some(ScriptedPage::ContentFails { links }) => {
                Ok(links.clone())
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn test_context(run_id: i64, base_authority: &str) -> PipelineContext {
    PipelineContext {
        run_id,
        mode: RenderMode::Desktop,
        base_authority: base_authority.to_string(),
        navigation_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        settle: SettlePolicy {
            wait_timeout: Duration::from_millis(10),
            grace_delay: Duration::ZERO,
        },
    }
}

fn test_config(db_path: &Path, concurrency: u32) -> Config {
    let mut config = Config::default();
    config.output.database_path = db_path.to_string_lossy().into_owned();
    config.crawler.concurrency = concurrency;
    config.crawler.settle_timeout_ms = 10;
    config.crawler.grace_delay_ms = 0;
    config.crawler.navigation_timeout_ms = 5_000;
    config.crawler.request_timeout_ms = 5_000;
    config
}

fn temp_storage() -> (tempfile::TempDir, SqliteStorage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new(&dir.path().join("snapgraph.db")).unwrap();
    (dir, storage)
}

fn url_row(storage: &SqliteStorage, url: &str) -> UrlRecord {
    storage
        .get_url_by_address(url)
        .unwrap()
        .unwrap_or_else(|| panic!("{} missing from frontier", url))
}

#[tokio::test]
async fn test_single_internal_fetch_scenario() {
    let renderer = ScriptedRenderer::default().page(
        "http://a.test/",
        ScriptedPage::ok(
            "<html><body>home</body></html>",
            &[
                "http://a.test/b",
                "http://other.test/",
                "http://a.test/b",
                "http://a.test/",
                "mailto:hello@a.test",
            ],
        ),
    );
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Desktop).unwrap();
    storage.reseed("http://a.test/").unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    assert_eq!(claimed.category, Category::Internal);

    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();
    assert_eq!(status, UrlStatus::Done);

    let seed = url_row(&storage, "http://a.test/");
    assert_eq!(seed.status, UrlStatus::Done);

    let internal = url_row(&storage, "http://a.test/b");
    assert_eq!(internal.status, UrlStatus::Pending);
    assert_eq!(internal.category, Some(Category::Internal));

    let external = url_row(&storage, "http://other.test/");
    assert_eq!(external.status, UrlStatus::Pending);
    assert_eq!(external.category, Some(Category::External));

    assert_eq!(storage.list_urls().unwrap().len(), 3);

    let snapshots = storage.snapshots_for_url(seed.id).unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert_eq!(snapshot.status_code, Some(200));
    assert!(snapshot.error_message.is_none());
    assert_eq!(snapshot.content.as_deref(), Some("<html><body>home</body></html>"));
    assert_eq!(snapshot.content_hash.as_ref().map(String::len), Some(64));
    assert_eq!(snapshot.ttfb_ms, Some(12));
    assert_eq!(snapshot.load_event_end_ms, Some(55));

    let links = storage.links_for_snapshot(snapshot.id).unwrap();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|l| l.snapshot_id == snapshot.id));
    assert!(links.iter().all(|l| l.source_id == seed.id));
    assert_eq!(storage.count_links(run_id).unwrap(), 2);

    assert_eq!(renderer.opened(), 1);
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn test_missing_load_event_still_records_page() {
    let renderer = ScriptedRenderer::default().page(
        "http://a.test/",
        ScriptedPage::LoadNeverFires {
            html: "<html><body><img src=\"/hangs.png\"></body></html>".to_string(),
        },
    );
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Desktop).unwrap();
    storage.reseed("http://a.test/").unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();

    assert_eq!(status, UrlStatus::Done);
    assert_eq!(url_row(&storage, "http://a.test/").status, UrlStatus::Done);

    let snapshot = &storage.snapshots_for_url(claimed.id).unwrap()[0];
    assert_eq!(snapshot.status_code, Some(200));
    assert!(snapshot.error_message.is_none());
    assert!(snapshot.content.as_deref().unwrap_or_default().contains("hangs.png"));
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn test_external_url_is_never_rendered() {
    let renderer = ScriptedRenderer::default().external("http://other.test/", 301);
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Bot).unwrap();
    storage
        .register_discovered("http://other.test/", "a.test")
        .unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    assert_eq!(claimed.category, Category::External);

    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();
    assert_eq!(status, UrlStatus::Done);
    assert_eq!(renderer.opened(), 0);

    let snapshots = storage.snapshots_for_url(claimed.id).unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].status_code, Some(301));
    assert!(snapshots[0].content_hash.is_none());
    assert!(snapshots[0].content.is_none());
    assert!(storage.links_for_snapshot(snapshots[0].id).unwrap().is_empty());
}

#[tokio::test]
async fn test_external_failure_is_terminal_done() {
    let renderer = ScriptedRenderer::default();
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Desktop).unwrap();
    storage
        .register_discovered("http://down.test/", "a.test")
        .unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();

    assert_eq!(status, UrlStatus::Done);
    assert_eq!(url_row(&storage, "http://down.test/").status, UrlStatus::Done);

    let snapshot = &storage.snapshots_for_url(claimed.id).unwrap()[0];
    assert!(snapshot.status_code.is_none());
    assert!(snapshot
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("connection refused"));
    assert!(snapshot.content_hash.is_none());
    assert_eq!(renderer.opened(), 0);
}

#[tokio::test]
async fn test_navigation_failure_records_error_snapshot() {
    let renderer = ScriptedRenderer::default().page(
        "http://a.test/",
        ScriptedPage::NavigationFails("net::ERR_CONNECTION_RESET".to_string()),
    );
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Desktop).unwrap();
    storage.reseed("http://a.test/").unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();

    assert_eq!(status, UrlStatus::Error);
    assert_eq!(url_row(&storage, "http://a.test/").status, UrlStatus::Error);

    let snapshots = storage.snapshots_for_url(claimed.id).unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert!(snapshot.is_error());
    assert!(snapshot.status_code.is_none());
    assert!(snapshot.content.is_none());
    assert!(snapshot.content_hash.is_none());
    assert!(snapshot.ttfb_ms.is_none());
    assert!(snapshot
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("ERR_CONNECTION_RESET"));

    assert_eq!(renderer.opened(), 1);
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn test_failure_after_link_discovery_discards_edges() {
    let renderer = ScriptedRenderer::default().page(
        "http://a.test/",
        ScriptedPage::ContentFails {
            links: vec!["http://a.test/b".to_string()],
        },
    );
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Desktop).unwrap();
    storage.reseed("http://a.test/").unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();
    assert_eq!(status, UrlStatus::Error);

    let snapshots = storage.snapshots_for_url(claimed.id).unwrap();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].is_error());
    assert!(storage.links_for_snapshot(snapshots[0].id).unwrap().is_empty());
    assert_eq!(storage.count_links(run_id).unwrap(), 0);

    // Discovered targets are frontier rows, not part of the failed attempt
    assert_eq!(url_row(&storage, "http://a.test/b").status, UrlStatus::Pending);
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn test_missing_response_is_a_failure() {
    let renderer = ScriptedRenderer::default().page(
        "http://a.test/",
        ScriptedPage::Ok {
            status: None,
            html: "<html></html>".to_string(),
            links: vec![],
        },
    );
    let (_dir, mut storage) = temp_storage();
    let run_id = storage.start_run(RenderMode::Desktop).unwrap();
    storage.reseed("http://a.test/").unwrap();

    let claimed = storage.claim_next("a.test").unwrap().unwrap();
    let status = process_claimed(&renderer, &mut storage, &test_context(run_id, "a.test"), &claimed)
        .await
        .unwrap();

    assert_eq!(status, UrlStatus::Error);
    let snapshot = &storage.snapshots_for_url(claimed.id).unwrap()[0];
    assert!(snapshot.status_code.is_none());
    assert!(snapshot.error_message.is_some());
}

/// A small site: a hub linking to ten leaves, each linking back and out
fn scripted_site() -> ScriptedRenderer {
    let leaves: Vec<String> = (0..10).map(|i| format!("http://a.test/p{}", i)).collect();
    let hub_links: Vec<&str> = leaves.iter().map(String::as_str).collect();

    let mut renderer = ScriptedRenderer::default()
        .page("http://a.test/", ScriptedPage::ok("<html>hub</html>", &hub_links))
        .external("http://other.test/", 200)
        .page(
            "http://a.test/broken",
            ScriptedPage::NavigationFails("net::ERR_TIMED_OUT".to_string()),
        );

    for leaf in &leaves {
        renderer = renderer.page(
            leaf,
            ScriptedPage::ok(
                &format!("<html>{}</html>", leaf),
                &["http://a.test/", "http://other.test/", "http://a.test/broken"],
            ),
        );
    }
    renderer
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_crawl_with_concurrent_workers() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&db_path, 4);

    let renderer = Arc::new(scripted_site());
    let summary = crawl_with(Arc::clone(&renderer), &config, "http://a.test/")
        .await
        .unwrap();
    assert_eq!(summary.workers, 4);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let urls = storage.list_urls().unwrap();

    // hub + 10 leaves + broken + external
    assert_eq!(urls.len(), 13);
    assert_eq!(summary.report.claimed, 13);
    assert_eq!(summary.report.errors, 1);

    for url in &urls {
        assert!(url.status.is_terminal(), "{} left {}", url.url, url.status);
        assert_eq!(
            storage.snapshots_for_url(url.id).unwrap().len(),
            1,
            "{} should be fetched exactly once",
            url.url
        );
    }
    assert_eq!(url_row(&storage, "http://a.test/broken").status, UrlStatus::Error);
    assert_eq!(url_row(&storage, "http://other.test/").status, UrlStatus::Done);

    let run = storage.get_run(summary.run_id).unwrap();
    let end_time = run.end_time.clone().unwrap();
    assert!(end_time >= run.start_time);

    // hub: 10 edges, each leaf: 3 edges
    assert_eq!(storage.count_links(summary.run_id).unwrap(), 40);
    assert_eq!(storage.count_snapshots(summary.run_id).unwrap(), 13);

    // internal pages only, every one released
    assert_eq!(renderer.opened(), 12);
    assert_eq!(renderer.closed(), 12);
    assert_eq!(
        renderer.status_requests.lock().unwrap().as_slice(),
        ["http://other.test/"]
    );
}

#[tokio::test]
async fn test_second_run_only_reseeds_the_start_url() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&db_path, 2);

    let first = crawl_with(Arc::new(scripted_site()), &config, "http://a.test/")
        .await
        .unwrap();
    let second = crawl_with(Arc::new(scripted_site()), &config, "http://a.test/")
        .await
        .unwrap();
    assert!(second.run_id > first.run_id);
    assert_eq!(second.report.claimed, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let seed = url_row(&storage, "http://a.test/");
    let snapshots = storage.snapshots_for_url(seed.id).unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].run_id, first.run_id);
    assert_eq!(snapshots[1].run_id, second.run_id);

    // Each snapshot owns its own edge set
    assert_eq!(storage.links_for_snapshot(snapshots[0].id).unwrap().len(), 10);
    assert_eq!(storage.links_for_snapshot(snapshots[1].id).unwrap().len(), 10);

    let leaf = url_row(&storage, "http://a.test/p3");
    assert_eq!(storage.snapshots_for_url(leaf.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_crashed_worker_fails_the_closed_run() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&db_path, 1);

    let mut renderer = ScriptedRenderer::default().page(
        "http://a.test/",
        ScriptedPage::ok("<html>home</html>", &["http://other.test/"]),
    );
    renderer.crash_on_status = true;

    let result = crawl_with(Arc::new(renderer), &config, "http://a.test/").await;
    assert!(matches!(result, Err(SnapgraphError::Join(_))));

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert!(run.is_finished());
    assert_eq!(url_row(&storage, "http://a.test/").status, UrlStatus::Done);
    assert_eq!(
        url_row(&storage, "http://other.test/").status,
        UrlStatus::InProgress
    );
}

#[tokio::test]
async fn test_http_engine_end_to_end() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    // A second server has another port, so it classifies as external
    let external_server = MockServer::start().await;
    let external_url = format!("{}/ext", external_server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
            <a href="/a">A</a>
            <a href="{}">External</a>
            <a href="mailto:team@a.test">Mail</a>
            </body></html>"#,
            external_url
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"<html><a href="/">Home</a></html>"#),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ext"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&external_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&db_path, 3);

    let renderer = Arc::new(HttpRenderer::new(RenderMode::Desktop).unwrap());
    let seed = format!("{}/", base_url);
    let summary = crawl_with(renderer, &config, &seed).await.unwrap();
    assert_eq!(summary.report.claimed, 3);
    assert_eq!(summary.report.errors, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.list_urls().unwrap().len(), 3);

    let home = url_row(&storage, &seed);
    assert_eq!(home.category, Some(Category::Internal));
    assert_eq!(home.status, UrlStatus::Done);

    let page_a = url_row(&storage, &format!("{}/a", base_url));
    let a_snapshot = &storage.snapshots_for_url(page_a.id).unwrap()[0];
    assert_eq!(a_snapshot.status_code, Some(404));
    assert!(a_snapshot.content_hash.is_some());

    let external = url_row(&storage, &external_url);
    assert_eq!(external.category, Some(Category::External));
    let ext_snapshot = &storage.snapshots_for_url(external.id).unwrap()[0];
    assert_eq!(ext_snapshot.status_code, Some(204));
    assert!(ext_snapshot.content_hash.is_none());

    // home -> a, home -> ext, a -> home
    assert_eq!(storage.count_links(summary.run_id).unwrap(), 3);
    assert!(storage.get_run(summary.run_id).unwrap().is_finished());
}

#[tokio::test]
async fn test_invalid_seed_is_rejected_before_run() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = test_config(&db_path, 1);

    let result = crawl_with(Arc::new(ScriptedRenderer::default()), &config, "ftp://a.test/").await;
    assert!(result.is_err());

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert!(storage.get_latest_run().unwrap().is_none());
}
