//! Source collectors: arXiv, NewsAPI.ai and RSS/Atom feeds.

pub mod arxiv;
pub mod newsapi;
pub mod feed;

pub use self::arxiv::{ArxivCollector, ArxivConfig};
pub use self::newsapi::{NewsApiCollector, NewsApiConfig};
pub use self::feed::{default_feeds, RssCollector};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use crate::dedup::dedup_batch;
use crate::error::FetchError;
use crate::types::{NewsItem, SourceKind};

/// HTTP timeout for fetching feeds and APIs
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Longest summary kept from any source
pub(crate) const MAX_SUMMARY_CHARS: usize = 8000;

/// Create a shared HTTP client with configured timeout
pub fn create_http_client() -> Result<reqwest::Client, Box<dyn Error + Send + Sync>> {
    reqwest::Client::builder()
        .timeout(StdDuration::from_secs(FETCH_TIMEOUT_SECS))
        .user_agent(concat!("med-pulse/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| e.into())
}

/// The recent time window a run collects from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback {
    pub days: u32,
    pub now: DateTime<Utc>,
}

impl Lookback {
    pub fn new(days: u32, now: DateTime<Utc>) -> Self {
        Self { days, now }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.now - Duration::days(i64::from(self.days))
    }

    /// Use >= to include items from exactly the window start
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start()
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn collect(&self, window: &Lookback) -> Result<Vec<NewsItem>, FetchError>;
}

/// Run one collector with a time budget. Failures are logged and yield no items.
pub async fn collect_guarded(collector: &dyn Collector, window: &Lookback, budget: StdDuration) -> Vec<NewsItem> {
    let source = collector.kind();

    let result = match tokio::time::timeout(budget, collector.collect(window)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(budget.as_secs())),
    };

    match result {
        Ok(items) => {
            let items = dedup_batch(items);
            info!(source = %source, count = items.len(), "Collected items");
            items
        }
        Err(e) => {
            warn!(source = %source, error = %e, "Failed to fetch from source");
            Vec::new()
        }
    }
}

/// Strip markup from feed text, collapse whitespace and cap the length.
pub fn clean_text(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_SUMMARY_CHARS)
        .collect()
}
