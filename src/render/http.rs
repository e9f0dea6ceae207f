//! Plain HTTP rendering engine
//!
//! A fallback for hosts without Chromium. Navigation is a single GET and the
//! document is never scripted, so both load states are reached as soon as the
//! body has been read. Hyperlinks are read from the raw HTML with `scraper`
//! and resolved against the final URL after redirects.

use crate::render::{LoadState, NavigationTimings, PageHandle, RenderError, Renderer, StatusProbe};
use crate::state::RenderMode;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use url::Url;

/// Rendering engine backed by `reqwest`
pub struct HttpRenderer {
    client: Client,
    probe: StatusProbe,
}

impl HttpRenderer {
    /// Builds the engine with the user agent of `mode`
    ///
    /// # Returns
    ///
    /// * `Ok(HttpRenderer)` - Ready to open pages
    /// * `Err(RenderError)` - The HTTP client could not be built
    pub fn new(mode: RenderMode) -> Result<Self, RenderError> {
        let client = Client::builder()
            .user_agent(mode.user_agent())
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            probe: StatusProbe::with_client(client.clone()),
            client,
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    type Page = HttpPage;

    async fn open_page(&self) -> Result<HttpPage, RenderError> {
        Ok(HttpPage {
            client: self.client.clone(),
            document: None,
            closed: false,
        })
    }

    async fn request_status(&self, url: &str, timeout: Duration) -> Result<u16, RenderError> {
        self.probe.status(url, timeout).await
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// A fetched document
#[derive(Debug)]
struct Document {
    final_url: Url,
    body: String,
    timings: NavigationTimings,
}

/// A page of the HTTP engine
pub struct HttpPage {
    client: Client,
    document: Option<Document>,
    closed: bool,
}

impl HttpPage {
    fn document(&self) -> Result<&Document, RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        self.document
            .as_ref()
            .ok_or_else(|| RenderError::Script("no document loaded".to_string()))
    }
}

#[async_trait]
impl PageHandle for HttpPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>, RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }

        let navigation_error = |err: reqwest::Error| {
            if err.is_timeout() {
                RenderError::Timeout {
                    what: format!("navigation to {}", url),
                    after: timeout,
                }
            } else {
                RenderError::Navigation {
                    url: url.to_string(),
                    message: err.to_string(),
                }
            }
        };

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(navigation_error)?;
        let ttfb_ms = started.elapsed().as_millis() as i64;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await.map_err(navigation_error)?;
        let loaded_ms = started.elapsed().as_millis() as i64;

        self.document = Some(Document {
            final_url,
            body,
            timings: NavigationTimings {
                ttfb_ms: Some(ttfb_ms),
                dom_content_loaded_ms: Some(loaded_ms),
                load_event_end_ms: Some(loaded_ms),
            },
        });

        Ok(Some(status))
    }

    async fn wait_for(&mut self, _state: LoadState, _timeout: Duration) -> Result<(), RenderError> {
        self.document().map(|_| ())
    }

    async fn timings(&mut self) -> Result<NavigationTimings, RenderError> {
        Ok(self.document()?.timings)
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.document()?.body.clone())
    }

    async fn hrefs(&mut self, selector: &str) -> Result<Vec<String>, RenderError> {
        let document = self.document()?;
        extract_hrefs(&document.body, &document.final_url, selector)
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.closed = true;
        self.document = None;
        Ok(())
    }
}

/// Resolves the `href` of every element matching `selector`
///
/// A `<base href>` in the document takes precedence over the page URL, as it
/// does in a browser. Hrefs that cannot be resolved are skipped.
fn extract_hrefs(html: &str, page_url: &Url, selector: &str) -> Result<Vec<String>, RenderError> {
    let selector = Selector::parse(selector)
        .map_err(|e| RenderError::Script(format!("invalid selector {}: {}", selector, e)))?;
    let document = Html::parse_document(html);

    let base = Selector::parse("base[href]")
        .ok()
        .and_then(|base| document.select(&base).next())
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone());

    let hrefs = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect();

    Ok(hrefs)
}
