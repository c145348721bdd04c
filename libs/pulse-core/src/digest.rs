//! Daily digest: read the run-date tab and post it to chat, one message per category.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::categorizer::CategoryRules;
use crate::chat::{split_message, ChatSink, DISCORD_MESSAGE_LIMIT};
use crate::enricher::FALLBACK_PROJECT;
use crate::error::StoreError;
use crate::store::{tab_name, NewsStore};
use crate::types::StoreRow;

pub const EMPTY_DIGEST_MESSAGE: &str = "No items yet.";
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Outcome of one digest post
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DigestReport {
    pub items: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Group rows by category: configured priority order first, then unknown
/// categories alphabetically, then uncategorized rows.
pub fn group_by_category<'a>(rows: &'a [StoreRow], rules: &CategoryRules) -> Vec<(String, Vec<&'a StoreRow>)> {
    let mut known: Vec<(String, Vec<&StoreRow>)> = rules.names().map(|n| (n.to_string(), Vec::new())).collect();
    let mut unknown: BTreeMap<String, Vec<&StoreRow>> = BTreeMap::new();
    let mut uncategorized = Vec::new();

    for row in rows {
        match row.category() {
            None => uncategorized.push(row),
            Some(category) => match known.iter_mut().find(|(name, _)| name.as_str() == category) {
                Some((_, group)) => group.push(row),
                None => unknown.entry(category.to_string()).or_default().push(row),
            },
        }
    }

    let mut groups: Vec<_> = known.into_iter().filter(|(_, rows)| !rows.is_empty()).collect();
    groups.extend(unknown);
    if !uncategorized.is_empty() {
        groups.push((UNCATEGORIZED.to_string(), uncategorized));
    }
    groups
}

fn format_row(row: &StoreRow) -> String {
    let mut line = format!("• **{}**", row.title.trim());
    if !row.outlet.trim().is_empty() {
        line.push_str(&format!(" ({})", row.outlet.trim()));
    }
    let project = row.project.trim();
    if !project.is_empty() && project != FALLBACK_PROJECT {
        line.push_str(&format!(" [{}]", project));
    }
    // Angle brackets suppress link previews
    line.push_str(&format!("\n  <{}>", row.link.trim()));
    line
}

/// Render the digest as a list of messages, each within the chat length limit.
pub fn format_digest(date: NaiveDate, rows: &[StoreRow], rules: &CategoryRules) -> Vec<String> {
    if rows.is_empty() {
        return vec![EMPTY_DIGEST_MESSAGE.to_string()];
    }

    let mut messages = vec![format!(
        "**Medical AI digest for {}**: {} new item{}",
        tab_name(date),
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    )];

    for (category, group) in group_by_category(rows, rules) {
        let mut text = format!("__{}__ ({})", category, group.len());
        for row in group {
            text.push('\n');
            text.push_str(&format_row(row));
        }
        messages.extend(split_message(&text, DISCORD_MESSAGE_LIMIT));
    }

    messages
}

pub struct DigestBot {
    store: Arc<dyn NewsStore>,
    chat: Arc<dyn ChatSink>,
    categories: CategoryRules,
}

impl DigestBot {
    pub fn new(store: Arc<dyn NewsStore>, chat: Arc<dyn ChatSink>, categories: CategoryRules) -> Self {
        Self {
            store,
            chat,
            categories,
        }
    }

    /// Rows of the run-date tab; a missing tab reads as empty
    async fn rows_for(&self, date: NaiveDate) -> Result<Vec<StoreRow>, StoreError> {
        Ok(self.store.read_rows(&tab_name(date)).await?.unwrap_or_default())
    }

    /// Post the digest for `date`. Send failures are logged and counted, never retried.
    #[instrument(skip(self))]
    pub async fn post(&self, date: NaiveDate) -> Result<DigestReport, StoreError> {
        let rows = self.rows_for(date).await?;
        let messages = format_digest(date, &rows, &self.categories);

        let mut report = DigestReport {
            items: rows.len(),
            ..Default::default()
        };

        for (i, message) in messages.iter().enumerate() {
            match self.chat.send_message(message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(index = i, error = %e, "Failed to send digest message");
                    report.failed += 1;
                }
            }
        }

        info!(items = report.items, sent = report.sent, failed = report.failed, "Digest posted");
        Ok(report)
    }
}
