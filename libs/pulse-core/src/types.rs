use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which collector produced an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Arxiv,
    NewsApi,
    Rss,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Arxiv, SourceKind::NewsApi, SourceKind::Rss];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Arxiv => "arxiv",
            SourceKind::NewsApi => "newsapi",
            SourceKind::Rss => "rss",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => Ok(SourceKind::Arxiv),
            "newsapi" => Ok(SourceKind::NewsApi),
            "rss" => Ok(SourceKind::Rss),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// Configuration for one RSS/Atom feed
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_feed_type")]
    pub source_type: String,
    pub url: String,
}

fn default_feed_type() -> String {
    "rss".to_string()
}

/// A normalized article or paper moving through the pipeline.
///
/// Collectors fill the first six fields; `category`, `enriched_summary`
/// and `project` are set downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub raw_summary: String,
    pub source: SourceKind,
    /// Feed, journal or publisher the item came from
    pub outlet: String,
    pub published_date: NaiveDate,
    pub category: Option<String>,
    pub enriched_summary: Option<String>,
    pub project: Option<String>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        raw_summary: impl Into<String>,
        source: SourceKind,
        outlet: impl Into<String>,
        published_date: NaiveDate,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            raw_summary: raw_summary.into(),
            source,
            outlet: outlet.into(),
            published_date,
            category: None,
            enriched_summary: None,
            project: None,
        }
    }
}

pub const STORE_HEADER: [&str; 9] = [
    "Title",
    "Link",
    "Summary",
    "Category",
    "Project",
    "Source",
    "Outlet",
    "Published",
    "Scraped At",
];

/// One persisted spreadsheet row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRow {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub category: String,
    pub project: String,
    pub source: String,
    pub outlet: String,
    pub published: String,
    pub scraped_at: String,
}

impl StoreRow {
    /// Freeze an item for persistence. Missing enrichment falls back to the raw summary.
    pub fn from_item(item: &NewsItem, scraped_at: DateTime<Utc>) -> Self {
        Self {
            title: item.title.clone(),
            link: item.link.clone(),
            summary: item
                .enriched_summary
                .clone()
                .unwrap_or_else(|| item.raw_summary.clone()),
            category: item.category.clone().unwrap_or_default(),
            project: item.project.clone().unwrap_or_default(),
            source: item.source.to_string(),
            outlet: item.outlet.clone(),
            published: item.published_date.format("%Y-%m-%d").to_string(),
            scraped_at: scraped_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn category(&self) -> Option<&str> {
        let category = self.category.trim();
        (!category.is_empty()).then_some(category)
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.link.clone(),
            self.summary.clone(),
            self.category.clone(),
            self.project.clone(),
            self.source.clone(),
            self.outlet.clone(),
            self.published.clone(),
            self.scraped_at.clone(),
        ]
    }

    /// Rebuild a row from sheet cells. Sheets omits trailing empty cells, so short rows are padded.
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            title: cell(0),
            link: cell(1),
            summary: cell(2),
            category: cell(3),
            project: cell(4),
            source: cell(5),
            outlet: cell(6),
            published: cell(7),
            scraped_at: cell(8),
        }
    }

    pub fn is_header(cells: &[String]) -> bool {
        cells.first().map(String::as_str) == Some(STORE_HEADER[0])
            && cells.get(1).map(String::as_str) == Some(STORE_HEADER[1])
    }
}
