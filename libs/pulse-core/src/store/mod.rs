//! Spreadsheet-backed persistence: one tab per run date.

mod sheets;

pub use sheets::{SheetsAuth, SheetsClient, SheetsConfig, SheetsStore, DEFAULT_SHEETS_BASE_URL};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;
use crate::types::StoreRow;

/// Tab title for a run date, e.g. `2025-05-01`
pub fn tab_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Data rows of `tab` (header excluded), or `None` when the tab does not exist
    async fn read_rows(&self, tab: &str) -> Result<Option<Vec<StoreRow>>, StoreError>;

    /// Create `tab` with a header row unless it already exists
    async fn ensure_tab(&self, tab: &str) -> Result<(), StoreError>;

    async fn append_row(&self, tab: &str, row: &StoreRow) -> Result<(), StoreError>;
}
