use async_trait::async_trait;
use atom_syndication::{Entry, Feed};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{clean_text, Collector, Lookback};
use crate::error::FetchError;
use crate::relevance::RelevanceFilter;
use crate::types::{NewsItem, SourceKind};

pub const DEFAULT_ARXIV_BASE_URL: &str = "https://export.arxiv.org/api/query";

#[derive(Debug, Clone)]
pub struct ArxivConfig {
    pub base_url: String,
    pub category: String,
    pub page_size: usize,
    pub max_pages: usize,
    /// arXiv asks clients to wait between consecutive API calls
    pub page_delay: Duration,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARXIV_BASE_URL.to_string(),
            category: "cs.AI".to_string(),
            page_size: 100,
            max_pages: 10,
            page_delay: Duration::from_secs(3),
        }
    }
}

/// Recent `cs.AI` submissions with medical relevance
pub struct ArxivCollector {
    http: reqwest::Client,
    config: ArxivConfig,
    filter: RelevanceFilter,
}

struct Page {
    items: Vec<NewsItem>,
    entries: usize,
    /// An entry older than the window was seen; later pages are older still
    reached_end: bool,
}

impl ArxivCollector {
    pub fn new(http: reqwest::Client, config: ArxivConfig, filter: RelevanceFilter) -> Self {
        Self { http, config, filter }
    }

    fn page_url(&self, start: usize) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| FetchError::RequestFailed(format!("Invalid arXiv URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("search_query", &format!("cat:{}", self.config.category))
            .append_pair("sortBy", "submittedDate")
            .append_pair("sortOrder", "descending")
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &self.config.page_size.to_string());
        Ok(url)
    }

    #[instrument(skip(self, window))]
    async fn fetch_page(&self, start: usize, window: &Lookback) -> Result<Page, FetchError> {
        let res = self.http.get(self.page_url(start)?).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::ApiError {
                status: status.as_u16(),
                message: res.text().await.unwrap_or_default(),
            });
        }

        let content = res.bytes().await?;
        let feed = Feed::read_from(&content[..]).map_err(|e| FetchError::ParseError(e.to_string()))?;
        Ok(self.parse_feed(&feed, window))
    }

    fn parse_feed(&self, feed: &Feed, window: &Lookback) -> Page {
        let mut items = Vec::new();
        let mut reached_end = false;
        let mut irrelevant = 0;

        for entry in feed.entries() {
            let published = entry_published(entry);
            if !window.contains(published) {
                // Sorted newest first, so nothing after this is in range
                reached_end = true;
                break;
            }

            let title = clean_text(&entry.title().value);
            let summary = entry.summary().map(|s| clean_text(&s.value)).unwrap_or_default();

            let text = format!("{} {}", title, summary);
            if !self.filter.is_relevant(&text) {
                irrelevant += 1;
                continue;
            }
            debug!(id = entry.id(), keywords = ?self.filter.matches(&text), "Relevant paper");

            let authors = entry_authors(entry);
            let raw_summary = if authors.is_empty() {
                summary
            } else {
                format!("Authors: {}\n{}", authors, summary)
            };

            items.push(NewsItem::new(
                title,
                entry.id().trim(),
                raw_summary,
                SourceKind::Arxiv,
                "arXiv",
                published.date_naive(),
            ));
        }

        debug!(kept = items.len(), irrelevant, "Parsed arXiv page");
        Page {
            items,
            entries: feed.entries().len(),
            reached_end,
        }
    }
}

/// Author names joined with commas, empty when the entry lists none
fn entry_authors(entry: &Entry) -> String {
    entry
        .authors()
        .iter()
        .map(|p| clean_text(p.name()))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn entry_published(entry: &Entry) -> DateTime<Utc> {
    entry
        .published()
        .unwrap_or_else(|| entry.updated())
        .with_timezone(&Utc)
}

#[async_trait]
impl Collector for ArxivCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    async fn collect(&self, window: &Lookback) -> Result<Vec<NewsItem>, FetchError> {
        let mut papers = Vec::new();
        let mut exhausted = true;

        for page in 0..self.config.max_pages {
            if page > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let result = self.fetch_page(page * self.config.page_size, window).await?;
            papers.extend(result.items);

            if result.reached_end || result.entries < self.config.page_size {
                exhausted = false;
                break;
            }
        }

        if exhausted {
            warn!(
                max_pages = self.config.max_pages,
                page_size = self.config.page_size,
                "arXiv page limit reached inside the lookback window, older papers skipped"
            );
        }

        info!(count = papers.len(), category = %self.config.category, "Fetched arXiv papers");
        Ok(papers)
    }
}
