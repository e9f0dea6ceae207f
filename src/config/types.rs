use crate::state::RenderMode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Snapgraph
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Rendering profile for the run
    pub mode: RenderMode,

    /// Number of independent workers draining the frontier
    pub concurrency: u32,

    /// Bound on a single page navigation (milliseconds)
    pub navigation_timeout_ms: u64,

    /// Bound on each of the "load" and "network-idle" waits (milliseconds)
    pub settle_timeout_ms: u64,

    /// Fixed delay after the settle waits (milliseconds)
    pub grace_delay_ms: u64,

    /// Bound on a status-only request for external URLs (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Desktop,
            concurrency: 5,
            navigation_timeout_ms: 30_000,
            settle_timeout_ms: 15_000,
            grace_delay_ms: 250,
            request_timeout_ms: 30_000,
        }
    }
}

impl CrawlerConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Which rendering engine backs the internal fetch path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Headless Chromium over the DevTools protocol
    #[default]
    Chromium,
    /// Plain HTTP fetch with static HTML parsing (no JavaScript)
    Http,
}

/// Browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    pub engine: EngineKind,

    /// Run the browser without a window
    pub headless: bool,

    /// Path to a Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Chromium,
            headless: true,
            executable: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./snapgraph.db".to_string(),
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<RenderMode>,
    pub concurrency: Option<u32>,
    pub database_path: Option<String>,
    pub engine: Option<EngineKind>,
}

impl Config {
    /// Applies command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(mode) = overrides.mode {
            self.crawler.mode = mode;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.crawler.concurrency = concurrency;
        }
        if let Some(path) = overrides.database_path {
            self.output.database_path = path;
        }
        if let Some(engine) = overrides.engine {
            self.browser.engine = engine;
        }
    }
}
