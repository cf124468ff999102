//! Crawl configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default index listing page template. `{name}` is replaced by the
/// sanitized package name.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple/{name}/";

/// Environment variable overriding the index URL template.
pub const INDEX_URL_ENV: &str = "DEP_HARVESTER_INDEX_URL";

/// Placeholder substituted with the package name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Download buffer size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Settings shared by every stage of a crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Index listing page template containing `{name}`
    pub index_url: String,

    /// Directory holding downloaded artifacts and transient metadata files
    pub work_dir: PathBuf,

    /// Keep dependencies that only apply when an extra is selected
    pub include_extras: bool,

    /// Write buffer used while streaming artifacts to disk
    pub chunk_size: usize,

    /// Upper bound for each pipeline stage (default: 5 minutes)
    pub stage_timeout: Duration,

    /// TCP connect timeout for all requests
    pub connect_timeout: Duration,

    /// Total timeout for index page requests
    pub index_timeout: Duration,

    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            work_dir: PathBuf::from("."),
            include_extras: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            stage_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
            index_timeout: Duration::from_secs(15),
            user_agent: concat!("dep-harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_extras(mut self, include: bool) -> Self {
        self.include_extras = include;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sets the timeout applied to each pipeline stage.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Builds the listing page URL for `name`.
    ///
    /// A template without the placeholder gets the name appended as a path
    /// segment.
    pub fn index_page_url(&self, name: &str) -> String {
        if self.index_url.contains(NAME_PLACEHOLDER) {
            self.index_url.replace(NAME_PLACEHOLDER, name)
        } else if self.index_url.ends_with('/') {
            format!("{}{}/", self.index_url, name)
        } else {
            format!("{}/{}/", self.index_url, name)
        }
    }
}
