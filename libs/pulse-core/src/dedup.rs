//! Duplicate detection against rows already in the store.

use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{tab_name, NewsStore};
use crate::types::{NewsItem, StoreRow};

/// Lowercase, keep alphanumeric words, join them with single spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Links and normalized titles already persisted
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    links: HashSet<String>,
    titles: HashSet<String>,
}

impl DedupIndex {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a StoreRow>) -> Self {
        let mut index = Self::default();
        for row in rows {
            index.insert(&row.link, &row.title);
        }
        index
    }

    /// Read the run-date tab and the `window_days - 1` tabs before it.
    /// A missing tab is skipped; any other read failure aborts the load.
    pub async fn load(store: &dyn NewsStore, run_date: NaiveDate, window_days: u32) -> Result<Self, StoreError> {
        let mut index = Self::default();

        for offset in 0..window_days.max(1) {
            let tab = tab_name(run_date - Duration::days(i64::from(offset)));
            match store.read_rows(&tab).await? {
                Some(rows) => {
                    debug!(tab = %tab, rows = rows.len(), "Loaded existing rows");
                    for row in &rows {
                        index.insert(&row.link, &row.title);
                    }
                }
                None => debug!(tab = %tab, "No tab for date, skipping"),
            }
        }

        info!(links = index.links.len(), "Deduplication index ready");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.titles.is_empty()
    }

    pub fn is_duplicate(&self, item: &NewsItem) -> bool {
        let link = item.link.trim();
        if !link.is_empty() && self.links.contains(link) {
            return true;
        }
        let title = normalize_title(&item.title);
        !title.is_empty() && self.titles.contains(&title)
    }

    /// Remember an item written during this run
    pub fn record(&mut self, item: &NewsItem) {
        self.insert(&item.link, &item.title);
    }

    fn insert(&mut self, link: &str, title: &str) {
        let link = link.trim();
        if !link.is_empty() {
            self.links.insert(link.to_string());
        }
        let title = normalize_title(title);
        if !title.is_empty() {
            self.titles.insert(title);
        }
    }
}

/// Drop later items whose link repeats an earlier one in the same batch
pub fn dedup_batch(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.link.trim().to_string()))
        .collect()
}
