// In-memory fakes for the pipeline seams. Each test binary uses a subset.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use llm_client::BoxError;
use pulse_core::chat::ChatSink;
use pulse_core::collectors::{Collector, Lookback};
use pulse_core::enricher::Summarizer;
use pulse_core::error::{ChatError, FetchError, StoreError};
use pulse_core::store::NewsStore;
use pulse_core::types::{NewsItem, SourceKind, StoreRow};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Spreadsheet stand-in: tab name -> data rows.
/// The failure switches can be flipped between runs.
#[derive(Default)]
pub struct MemoryStore {
    pub tabs: Mutex<BTreeMap<String, Vec<StoreRow>>>,
    pub fail_reads: AtomicBool,
    pub fail_appends: AtomicBool,
}

fn unavailable() -> StoreError {
    StoreError::ApiError {
        status: 503,
        message: "unavailable".into(),
    }
}

impl MemoryStore {
    pub fn with_rows(tab: &str, rows: Vec<StoreRow>) -> Self {
        let store = Self::default();
        store.tabs.lock().unwrap().insert(tab.to_string(), rows);
        store
    }

    pub fn rows(&self, tab: &str) -> Vec<StoreRow> {
        self.tabs.lock().unwrap().get(tab).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn read_rows(&self, tab: &str) -> Result<Option<Vec<StoreRow>>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.tabs.lock().unwrap().get(tab).cloned())
    }

    async fn ensure_tab(&self, tab: &str) -> Result<(), StoreError> {
        self.tabs.lock().unwrap().entry(tab.to_string()).or_default();
        Ok(())
    }

    async fn append_row(&self, tab: &str, row: &StoreRow) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.tabs
            .lock()
            .unwrap()
            .entry(tab.to_string())
            .or_default()
            .push(row.clone());
        Ok(())
    }
}

/// Returns a fixed batch, or fails when `items` is `None`
pub struct FakeCollector {
    pub kind: SourceKind,
    pub items: Option<Vec<NewsItem>>,
}

#[async_trait]
impl Collector for FakeCollector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn collect(&self, _window: &Lookback) -> Result<Vec<NewsItem>, FetchError> {
        self.items
            .clone()
            .ok_or_else(|| FetchError::RequestFailed("connection refused".into()))
    }
}

/// Replies with the same JSON for every prompt, or always errors
pub struct FakeSummarizer {
    pub reply: Result<String, String>,
}

impl FakeSummarizer {
    pub fn ok(project: &str) -> Self {
        Self {
            reply: Ok(format!(
                r#"{{"bullet_summary": ["• Enriched point"], "project": "{}"}}"#,
                project
            )),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err("HTTP 503 Service Unavailable".into()),
        }
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn complete(&self, _prompt: String) -> Result<String, BoxError> {
        self.reply.clone().map_err(Into::into)
    }
}

/// Captures every message sent
#[derive(Default)]
pub struct RecordingChat {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingChat {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send_message(&self, content: &str) -> Result<(), ChatError> {
        self.messages.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

/// Records delivered messages; the `fail_on`-th call (1-based) is rejected
pub struct FlakyChat {
    pub fail_on: usize,
    pub calls: AtomicUsize,
    pub messages: Mutex<Vec<String>>,
}

impl FlakyChat {
    pub fn failing_on(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for FlakyChat {
    async fn send_message(&self, content: &str) -> Result<(), ChatError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(ChatError::ApiError {
                status: 500,
                message: "internal error".into(),
            });
        }
        self.messages.lock().unwrap().push(content.to_string());
        Ok(())
    }
}

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 4).unwrap()
}

pub fn item(title: &str, link: &str, summary: &str, source: SourceKind) -> NewsItem {
    NewsItem::new(title, link, summary, source, "Test Outlet", NaiveDate::from_ymd_opt(2025, 5, 3).unwrap())
}
