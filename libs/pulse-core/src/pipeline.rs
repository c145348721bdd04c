//! The collection run: collect, categorize, deduplicate, enrich, store.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::categorizer::CategoryRules;
use crate::collectors::{collect_guarded, Collector, Lookback};
use crate::dedup::{dedup_batch, DedupIndex};
use crate::enricher::Enricher;
use crate::store::{tab_name, NewsStore};
use crate::types::{NewsItem, SourceKind, StoreRow};

/// Immutable run settings, built once at startup
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lookback_days: u32,
    pub dedup_window_days: u32,
    pub llm_timeout: Duration,
    pub source_timeout: Duration,
    pub sources: Vec<SourceKind>,
    pub categories: CategoryRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 3,
            dedup_window_days: 3,
            llm_timeout: Duration::from_secs(60),
            source_timeout: Duration::from_secs(300),
            sources: SourceKind::ALL.to_vec(),
            categories: CategoryRules::default(),
        }
    }
}

/// Counters for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub duplicates: usize,
    pub written: usize,
    pub failed: usize,
    pub enrichment_fallbacks: usize,
}

pub struct Pipeline {
    collectors: Vec<Box<dyn Collector>>,
    store: Arc<dyn NewsStore>,
    enricher: Enricher,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        store: Arc<dyn NewsStore>,
        enricher: Enricher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            collectors,
            store,
            enricher,
            config,
        }
    }

    /// Collectors not enabled in `sources` are skipped
    async fn collect(&self, now: DateTime<Utc>) -> Vec<NewsItem> {
        let window = Lookback::new(self.config.lookback_days, now);
        let mut items = Vec::new();

        for collector in &self.collectors {
            if !self.config.sources.contains(&collector.kind()) {
                debug!(source = %collector.kind(), "Source disabled, skipping");
                continue;
            }
            items.extend(collect_guarded(collector.as_ref(), &window, self.config.source_timeout).await);
        }

        dedup_batch(items)
    }

    /// One full run writing into the tab for `run_date`.
    #[instrument(skip(self, now))]
    pub async fn run(&self, run_date: NaiveDate, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::default();
        let tab = tab_name(run_date);

        let mut items = self.collect(now).await;
        report.fetched = items.len();
        info!(count = items.len(), "Collected items from all sources");

        for item in items.iter_mut() {
            self.config.categories.categorize(item);
        }

        let mut index = match DedupIndex::load(self.store.as_ref(), run_date, self.config.dedup_window_days).await {
            Ok(index) => index,
            Err(e) => {
                error!(tab = %tab, error = %e, "Cannot read existing rows, skipping writes");
                report.failed = report.fetched;
                return report;
            }
        };
        let fresh: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| {
                let duplicate = index.is_duplicate(item);
                if duplicate {
                    debug!(link = %item.link, "Skipping duplicate");
                }
                !duplicate
            })
            .collect();
        report.duplicates = report.fetched - fresh.len();

        if fresh.is_empty() {
            info!(duplicates = report.duplicates, "No new items to store");
            return report;
        }

        if let Err(e) = self.store.ensure_tab(&tab).await {
            error!(tab = %tab, error = %e, "Cannot prepare worksheet, skipping writes");
            report.failed = fresh.len();
            return report;
        }

        for mut item in fresh {
            // Earlier items of this run may have claimed the title
            if index.is_duplicate(&item) {
                report.duplicates += 1;
                continue;
            }

            if !self.enricher.enrich(&mut item).await {
                report.enrichment_fallbacks += 1;
            }

            let row = StoreRow::from_item(&item, Utc::now());
            match self.store.append_row(&tab, &row).await {
                Ok(()) => {
                    index.record(&item);
                    report.written += 1;
                }
                Err(e) => {
                    warn!(link = %item.link, error = %e, "Failed to store item");
                    report.failed += 1;
                }
            }
        }

        info!(
            fetched = report.fetched,
            duplicates = report.duplicates,
            written = report.written,
            failed = report.failed,
            enrichment_fallbacks = report.enrichment_fallbacks,
            tab = %tab,
            "Run complete"
        );
        report
    }
}
