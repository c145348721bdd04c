use chrono::Utc;
use llm_client::{init_logging, GeminiClient};
use pulse_core::collectors::feed::{default_feeds, feeds_from_sheet};
use pulse_core::collectors::{create_http_client, ArxivCollector, Collector, NewsApiCollector, RssCollector};
use pulse_core::config::{CollectorConfig, FeedList};
use pulse_core::enricher::Enricher;
use pulse_core::pipeline::Pipeline;
use pulse_core::relevance::RelevanceFilter;
use pulse_core::store::{SheetsAuth, SheetsClient, SheetsStore};
use pulse_core::types::{SourceConfig, SourceKind};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Feed list for this run. A sources sheet that cannot be read falls back to the built-in feeds.
async fn resolve_feeds(feeds: &FeedList, sheets: &SheetsClient) -> Vec<SourceConfig> {
    match feeds {
        FeedList::Static(feeds) => feeds.clone(),
        FeedList::Sheet(id) => match feeds_from_sheet(sheets, id).await {
            Ok(feeds) if !feeds.is_empty() => feeds,
            Ok(_) => {
                warn!(sheet = %id, "Sources sheet lists no feeds, using built-in feeds");
                default_feeds()
            }
            Err(e) => {
                warn!(sheet = %id, error = %e, "Failed to load sources sheet, using built-in feeds");
                default_feeds()
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = CollectorConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    let now = Utc::now();
    let run_date = now.date_naive();
    info!(
        run_date = %run_date,
        sources = ?config.pipeline.sources,
        lookback_days = config.pipeline.lookback_days,
        model = %config.gemini.model,
        "Starting collector agent"
    );

    // Feeds and APIs share one pooled client; Gemini gets its own longer timeout
    let fetch_client = create_http_client()?;
    let llm_client = reqwest::Client::builder()
        .timeout(config.pipeline.llm_timeout)
        .build()?;

    let auth = SheetsAuth::resolve(config.sheets.access_token.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to obtain Google credentials");
            e
        })?;
    let sheets = SheetsClient::new(fetch_client.clone(), &config.sheets.base_url, auth);
    let store = Arc::new(SheetsStore::new(sheets.clone(), &config.sheets.spreadsheet_id));

    let mut collectors: Vec<Box<dyn Collector>> = vec![Box::new(ArxivCollector::new(
        fetch_client.clone(),
        config.arxiv.clone(),
        RelevanceFilter::medical()?,
    ))];
    if let Some(newsapi) = &config.newsapi {
        collectors.push(Box::new(NewsApiCollector::new(fetch_client.clone(), newsapi.clone())));
    }
    if config.pipeline.sources.contains(&SourceKind::Rss) {
        let feeds = resolve_feeds(&config.feeds, &sheets).await;
        info!(count = feeds.len(), "Using RSS feeds");
        collectors.push(Box::new(RssCollector::new(fetch_client.clone(), feeds)));
    }

    let enricher = Enricher::new(
        Box::new(GeminiClient::new(llm_client, config.gemini.clone())),
        config.projects.clone(),
        config.pipeline.llm_timeout,
    );

    let report = Pipeline::new(collectors, store, enricher, config.pipeline)
        .run(run_date, now)
        .await;

    if report.failed > 0 {
        warn!(failed = report.failed, "Some items could not be stored and will be retried next run");
    }
    info!(written = report.written, "Collector agent completed");

    Ok(())
}
