use crate::render::Locator;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Press-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// Cycle scheduling and retention
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minutes to wait after a cycle completes before starting the next
    #[serde(rename = "cycle-interval-minutes", default = "default_cycle_interval")]
    pub cycle_interval_minutes: u64,

    /// Days a ledger entry is kept before it expires
    #[serde(rename = "retention-days", default = "default_retention_days")]
    pub retention_days: u32,
}

impl CrawlerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_minutes * 60)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_minutes: default_cycle_interval(),
            retention_days: default_retention_days(),
        }
    }
}

/// Where the ledger, archives and debug captures live
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON dedup ledger
    #[serde(rename = "ledger-path", default = "default_ledger_path")]
    pub ledger_path: String,

    /// Root directory of the per-source archives
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,

    /// Directory receiving raw documents of failed extractions
    #[serde(rename = "debug-dir", default = "default_debug_dir")]
    pub debug_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            data_dir: default_data_dir(),
            debug_dir: default_debug_dir(),
        }
    }
}

/// HTTP identity, proxy and per-attempt timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Forward proxy as `host:port`; every request is routed through it
    #[serde(default)]
    pub proxy: Option<String>,

    /// Client identity sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for feed and listing requests (seconds)
    #[serde(rename = "listing-timeout-secs", default = "default_listing_timeout")]
    pub listing_timeout_secs: u64,

    /// Timeout for article requests (seconds)
    #[serde(rename = "article-timeout-secs", default = "default_article_timeout")]
    pub article_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy.as_ref().map(|p| {
            if p.contains("://") {
                p.clone()
            } else {
                format!("http://{}", p)
            }
        })
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn article_timeout(&self) -> Duration {
        Duration::from_secs(self.article_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: default_user_agent(),
            listing_timeout_secs: default_listing_timeout(),
            article_timeout_secs: default_article_timeout(),
        }
    }
}

/// Retry, backoff and politeness tuning (all delays in seconds)
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: f64,

    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: f64,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound of the uniform jitter added to each backoff wait
    #[serde(rename = "jitter-max", default = "default_jitter_max")]
    pub jitter_max: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            jitter_max: default_jitter_max(),
        }
    }
}

/// Headless Chrome settings for rendered sources
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Chrome/Chromium binary; detected from the usual locations when unset
    #[serde(rename = "chrome-executable", default)]
    pub chrome_executable: Option<String>,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(rename = "window-size", default = "default_window_size")]
    pub window_size: String,

    /// How long to look for an interstitial confirmation control
    #[serde(rename = "dismiss-wait-secs", default = "default_dismiss_wait")]
    pub dismiss_wait_secs: u64,

    /// How long to wait for the content container to appear
    #[serde(rename = "content-wait-secs", default = "default_content_wait")]
    pub content_wait_secs: u64,

    /// Pause after dismissing an interstitial
    #[serde(rename = "settle-millis", default = "default_settle_millis")]
    pub settle_millis: u64,
}

impl RendererConfig {
    /// Parses `window-size` ("W,H")
    pub fn window_dimensions(&self) -> Option<(u32, u32)> {
        let (width, height) = self.window_size.split_once(',')?;
        let width = width.trim().parse().ok()?;
        let height = height.trim().parse().ok()?;
        Some((width, height))
    }

    pub fn dismiss_wait(&self) -> Duration {
        Duration::from_secs(self.dismiss_wait_secs)
    }

    pub fn content_wait(&self) -> Duration {
        Duration::from_secs(self.content_wait_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
            window_size: default_window_size(),
            dismiss_wait_secs: default_dismiss_wait(),
            content_wait_secs: default_content_wait(),
            settle_millis: default_settle_millis(),
        }
    }
}

/// One configured content source
///
/// The `kind` key selects the adapter variant:
///
/// ```toml
/// [[source]]
/// id = "JST"
/// kind = "feed"
/// feeds = ["https://www.jst.go.jp/rss/press.xml"]
/// content-selector = "section.inr"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceConfig {
    Feed(FeedSourceConfig),
    ListPage(ListPageSourceConfig),
    Rendered(RenderedSourceConfig),
}

impl SourceConfig {
    pub fn id(&self) -> &str {
        match self {
            Self::Feed(s) => &s.id,
            Self::ListPage(s) => &s.id,
            Self::Rendered(s) => &s.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Feed(_) => "feed",
            Self::ListPage(_) => "list-page",
            Self::Rendered(_) => "rendered",
        }
    }

    pub fn pause_after(&self) -> Option<[f64; 2]> {
        match self {
            Self::Feed(s) => s.pause_after,
            Self::ListPage(s) => s.pause_after,
            Self::Rendered(s) => s.pause_after,
        }
    }
}

/// Syndication feed source fetched over plain HTTP
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedSourceConfig {
    pub id: String,
    pub feeds: Vec<String>,
    /// Feed links that are never articles (e.g. an overview page)
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Container holding the article text
    pub content_selector: String,
    /// Subtrees inside the container to leave out of the body
    #[serde(default)]
    pub strip_selector: Option<String>,
    #[serde(default)]
    pub polite: bool,
    #[serde(default)]
    pub pause_after: Option<[f64; 2]>,
}

/// Monthly digest listing scanned for entry blocks
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListPageSourceConfig {
    pub id: String,
    /// Base listing URL; `/<YYYY>/<MM>` is appended per cycle
    pub list_url: String,
    pub entry_selector: String,
    pub link_selector: String,
    pub title_selector: String,
    pub content_selector: String,
    #[serde(default = "default_true")]
    pub polite: bool,
    #[serde(default)]
    pub pause_after: Option<[f64; 2]>,
}

/// Feed source whose articles need a rendered DOM
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderedSourceConfig {
    pub id: String,
    pub feeds: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Selector matching each content paragraph
    pub content_selector: String,
    /// Interstitial confirmation control to click away, if present
    #[serde(default)]
    pub dismiss: Option<Locator>,
    #[serde(default)]
    pub pause_after: Option<[f64; 2]>,
}

fn default_cycle_interval() -> u64 {
    30
}

fn default_retention_days() -> u32 {
    30
}

fn default_ledger_path() -> String {
    "scraped_links.json".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_debug_dir() -> String {
    "debug_html".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".to_string()
}

fn default_listing_timeout() -> u64 {
    20
}

fn default_article_timeout() -> u64 {
    15
}

fn default_min_delay() -> f64 {
    3.5
}

fn default_max_delay() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    4
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter_max() -> f64 {
    0.5
}

fn default_window_size() -> String {
    "1920,1080".to_string()
}

fn default_dismiss_wait() -> u64 {
    5
}

fn default_content_wait() -> u64 {
    15
}

fn default_settle_millis() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}
