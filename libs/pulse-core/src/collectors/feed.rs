use async_trait::async_trait;
use atom_syndication::Feed;
use chrono::{DateTime, Utc};
use rss::Channel;
use tracing::{debug, info, instrument, warn};

use super::{clean_text, Collector, Lookback};
use crate::error::{ConfigError, FetchError, StoreError};
use crate::store::SheetsClient;
use crate::types::{NewsItem, SourceConfig, SourceKind};

/// Maximum number of items to take from each feed
const MAX_ITEMS_PER_FEED: usize = 10;

/// Medical and health-tech outlets used when no feed list is configured
pub fn default_feeds() -> Vec<SourceConfig> {
    [
        ("STAT News", "https://www.statnews.com/feed/"),
        ("MedicalXpress", "https://medicalxpress.com/rss-feed/"),
        ("Healthcare IT News", "https://www.healthcareitnews.com/home/feed"),
        ("The Lancet Digital Health", "https://www.thelancet.com/rssfeed/landig_current.xml"),
        ("npj Digital Medicine", "https://www.nature.com/npjdigitalmed.rss"),
    ]
    .into_iter()
    .map(|(name, url)| SourceConfig {
        name: name.to_string(),
        source_type: "rss".to_string(),
        url: url.to_string(),
    })
    .collect()
}

/// Parse a JSON array of `{name, url, type?}` feed entries
pub fn feeds_from_json(path: &str, json: &str) -> Result<Vec<SourceConfig>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::InvalidJson {
        path: path.to_string(),
        error: e.to_string(),
    })
}

/// Read the feed list from a sources spreadsheet.
///
/// The first row is a header naming a `url` column and a `source` (or `name`)
/// column; rows missing either value are skipped.
pub async fn feeds_from_sheet(client: &SheetsClient, spreadsheet_id: &str) -> Result<Vec<SourceConfig>, StoreError> {
    let rows = client.values(spreadsheet_id, "A:Z").await?;
    let mut rows = rows.into_iter();

    let header: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let column = |names: &[&str]| header.iter().position(|h| names.contains(&h.as_str()));

    let (name_col, url_col) = match (column(&["source", "name"]), column(&["url"])) {
        (Some(n), Some(u)) => (n, u),
        _ => {
            return Err(StoreError::ParseError(
                "sources sheet needs 'source' and 'url' header columns".to_string(),
            ))
        }
    };

    let feeds = rows
        .filter_map(|row| {
            let name = row.get(name_col)?.trim();
            let url = row.get(url_col)?.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(SourceConfig {
                name: name.to_string(),
                source_type: "rss".to_string(),
                url: url.to_string(),
            })
        })
        .collect::<Vec<_>>();

    info!(count = feeds.len(), "Loaded feed list from sheet");
    Ok(feeds)
}

/// Collects from a list of RSS 2.0 or Atom feeds
pub struct RssCollector {
    http: reqwest::Client,
    feeds: Vec<SourceConfig>,
}

impl RssCollector {
    pub fn new(http: reqwest::Client, feeds: Vec<SourceConfig>) -> Self {
        Self { http, feeds }
    }

    pub fn feeds(&self) -> &[SourceConfig] {
        &self.feeds
    }

    #[instrument(skip(self, window), fields(source = %feed.name))]
    async fn fetch_feed(&self, feed: &SourceConfig, window: &Lookback) -> Result<Vec<NewsItem>, FetchError> {
        let res = self.http.get(&feed.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::ApiError {
                status: status.as_u16(),
                message: format!("feed returned {}", status),
            });
        }

        let content = res.bytes().await?;
        parse_feed(&content, feed, window)
    }
}

/// Parse a feed body as RSS first, then as Atom.
pub fn parse_feed(content: &[u8], feed: &SourceConfig, window: &Lookback) -> Result<Vec<NewsItem>, FetchError> {
    let outlet = if feed.name.trim().is_empty() {
        llm_client::extract_domain(&feed.url)
    } else {
        feed.name.clone()
    };

    let entries = match Channel::read_from(content) {
        Ok(channel) => rss_entries(&channel),
        Err(rss_err) => match Feed::read_from(content) {
            Ok(atom) => atom_entries(&atom),
            Err(atom_err) => {
                return Err(FetchError::ParseError(format!(
                    "not RSS ({}) or Atom ({})",
                    rss_err, atom_err
                )))
            }
        },
    };

    let mut items = Vec::new();
    let mut skipped_dates = 0;

    for entry in entries.into_iter().take(MAX_ITEMS_PER_FEED) {
        let Some(published) = entry.published else {
            skipped_dates += 1;
            continue;
        };

        if entry.title.is_empty() || entry.link.is_empty() || !window.contains(published) {
            continue;
        }

        items.push(NewsItem::new(
            entry.title,
            entry.link,
            entry.summary,
            SourceKind::Rss,
            outlet.clone(),
            published.date_naive(),
        ));
    }

    if skipped_dates > 0 {
        warn!(source = %feed.name, skipped = skipped_dates, "Skipped entries with unparseable dates");
    }
    debug!(source = %feed.name, count = items.len(), "Parsed feed entries");

    Ok(items)
}

/// Feed entry reduced to the fields the pipeline needs
struct Entry {
    title: String,
    link: String,
    summary: String,
    published: Option<DateTime<Utc>>,
}

fn rss_entries(channel: &Channel) -> Vec<Entry> {
    channel
        .items()
        .iter()
        .map(|item| {
            let summary = item
                .description()
                .or_else(|| item.content())
                .unwrap_or_default();
            Entry {
                title: clean_text(item.title().unwrap_or_default()),
                link: item.link().unwrap_or_default().trim().to_string(),
                summary: clean_text(summary),
                published: item
                    .pub_date()
                    .or_else(|| item.dublin_core_ext().and_then(|dc| dc.dates().first().map(String::as_str)))
                    .and_then(parse_date),
            }
        })
        .collect()
}

fn atom_entries(feed: &Feed) -> Vec<Entry> {
    feed.entries()
        .iter()
        .map(|entry| {
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href().trim().to_string())
                .unwrap_or_default();
            let summary = entry
                .summary()
                .map(|s| s.value.as_str())
                .or_else(|| entry.content().and_then(|c| c.value()))
                .unwrap_or_default();
            Entry {
                title: clean_text(&entry.title().value),
                link,
                summary: clean_text(summary),
                published: Some(entry.published().unwrap_or_else(|| entry.updated()).with_timezone(&Utc)),
            }
        })
        .collect()
}

/// RSS dates are usually RFC 2822; some feeds use RFC 3339
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl Collector for RssCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    async fn collect(&self, window: &Lookback) -> Result<Vec<NewsItem>, FetchError> {
        let mut items = Vec::new();

        for feed in &self.feeds {
            match self.fetch_feed(feed, window).await {
                Ok(mut found) => {
                    debug!(source = %feed.name, count = found.len(), "Fetched feed");
                    items.append(&mut found);
                }
                Err(e) => warn!(source = %feed.name, error = %e, "Failed to fetch feed"),
            }
        }

        info!(feeds = self.feeds.len(), count = items.len(), "Fetched RSS items");
        Ok(items)
    }
}
