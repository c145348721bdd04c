mod common;

use chrono::{TimeZone, Utc};
use common::{item, run_date, FakeCollector, FakeSummarizer, FlakyChat, MemoryStore, RecordingChat};
use pulse_core::categorizer::{CategoryRule, CategoryRules};
use pulse_core::collectors::Collector;
use pulse_core::digest::DigestBot;
use pulse_core::enricher::{Enricher, ProjectCatalog, FALLBACK_PROJECT};
use pulse_core::pipeline::{Pipeline, PipelineConfig};
use pulse_core::types::{NewsItem, SourceKind, StoreRow};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const TODAY: &str = "2025-05-04";
const YESTERDAY: &str = "2025-05-03";

fn rules() -> CategoryRules {
    CategoryRules::new(vec![
        CategoryRule {
            name: "Clinical Applications".into(),
            keywords: vec!["diagnos".into(), "sepsis".into()],
        },
        CategoryRule {
            name: "Research & Development".into(),
            keywords: vec!["benchmark".into(), "model".into()],
        },
    ])
}

fn projects() -> ProjectCatalog {
    let mut map = BTreeMap::new();
    map.insert("Sepsis Watch".to_string(), "Sepsis early warning".to_string());
    ProjectCatalog::new(map)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        categories: rules(),
        llm_timeout: Duration::from_secs(5),
        source_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}

fn pipeline(collectors: Vec<Box<dyn Collector>>, store: Arc<MemoryStore>, summarizer: FakeSummarizer) -> Pipeline {
    let enricher = Enricher::new(Box::new(summarizer), projects(), Duration::from_secs(5));
    Pipeline::new(collectors, store, enricher, config())
}

fn existing_row(item: &NewsItem) -> StoreRow {
    StoreRow::from_item(item, Utc.with_ymd_and_hms(2025, 5, 3, 6, 0, 0).unwrap())
}

fn abc() -> (NewsItem, NewsItem, NewsItem) {
    (
        item(
            "Hospital adopts AI scribe",
            "https://news.example.com/a",
            "Ambient documentation rollout.",
            SourceKind::Rss,
        ),
        item(
            "AI model diagnoses sepsis hours earlier",
            "https://news.example.com/b",
            "Retrospective ICU study.",
            SourceKind::NewsApi,
        ),
        item(
            "A benchmark for medical LLMs",
            "http://arxiv.org/abs/2505.00001v1",
            "We release an evaluation suite.",
            SourceKind::Arxiv,
        ),
    )
}

fn collectors(items: Vec<NewsItem>) -> Vec<Box<dyn Collector>> {
    let by_kind = |kind: SourceKind| -> Box<dyn Collector> {
        Box::new(FakeCollector {
            kind,
            items: Some(items.iter().filter(|i| i.source == kind).cloned().collect()),
        })
    };
    vec![by_kind(SourceKind::Arxiv), by_kind(SourceKind::NewsApi), by_kind(SourceKind::Rss)]
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 4, 7, 0, 0).unwrap()
}

#[tokio::test]
async fn test_end_to_end_skips_existing_and_digests_new_items() {
    let (a, b, c) = abc();
    let store = Arc::new(MemoryStore::with_rows(YESTERDAY, vec![existing_row(&a)]));

    let report = pipeline(
        collectors(vec![a.clone(), b.clone(), c.clone()]),
        store.clone(),
        FakeSummarizer::ok("Sepsis Watch"),
    )
    .run(run_date(), now())
    .await;

    assert_eq!(report.fetched, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.written, 2);
    assert_eq!(report.failed, 0);

    let rows = store.rows(TODAY);
    let links: Vec<_> = rows.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(links.len(), 2);
    assert!(links.contains(&b.link.as_str()));
    assert!(links.contains(&c.link.as_str()));

    let row_b = rows.iter().find(|r| r.link == b.link).unwrap();
    let row_c = rows.iter().find(|r| r.link == c.link).unwrap();
    assert_eq!(row_b.category, "Clinical Applications");
    assert_eq!(row_c.category, "Research & Development");
    assert_eq!(row_b.summary, "• Enriched point");
    assert_eq!(row_b.project, "Sepsis Watch");
    assert_eq!(row_b.source, "newsapi");
    assert_eq!(row_b.published, "2025-05-03");

    // The digest lists exactly B and C
    let chat = Arc::new(RecordingChat::default());
    let digest = DigestBot::new(store.clone(), chat.clone(), rules());
    let sent = digest.post(run_date()).await.unwrap();
    assert_eq!(sent.items, 2);
    assert_eq!(sent.failed, 0);

    let text = chat.messages().join("\n");
    assert!(text.contains(&b.title));
    assert!(text.contains(&c.title));
    assert!(!text.contains(&a.title));
    assert!(text.find("Clinical Applications").unwrap() < text.find("Research & Development").unwrap());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let (a, b, c) = abc();
    let store = Arc::new(MemoryStore::default());
    let items = vec![a, b, c];

    let first = pipeline(collectors(items.clone()), store.clone(), FakeSummarizer::ok("Sepsis Watch"))
        .run(run_date(), now())
        .await;
    assert_eq!(first.written, 3);
    let after_first = store.rows(TODAY);

    let second = pipeline(collectors(items), store.clone(), FakeSummarizer::ok("Sepsis Watch"))
        .run(run_date(), now())
        .await;
    assert_eq!(second.written, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(store.rows(TODAY), after_first);
}

#[tokio::test]
async fn test_enrichment_failure_keeps_raw_summary() {
    let (_, b, _) = abc();
    let store = Arc::new(MemoryStore::default());

    let report = pipeline(collectors(vec![b.clone()]), store.clone(), FakeSummarizer::failing())
        .run(run_date(), now())
        .await;

    assert_eq!(report.written, 1);
    assert_eq!(report.enrichment_fallbacks, 1);

    let row = &store.rows(TODAY)[0];
    assert_eq!(row.summary, b.raw_summary);
    assert_eq!(row.project, FALLBACK_PROJECT);
}

#[tokio::test]
async fn test_unknown_project_label_falls_back() {
    let (_, b, _) = abc();
    let store = Arc::new(MemoryStore::default());

    pipeline(collectors(vec![b]), store.clone(), FakeSummarizer::ok("Moonshot"))
        .run(run_date(), now())
        .await;

    assert_eq!(store.rows(TODAY)[0].project, FALLBACK_PROJECT);
}

#[tokio::test]
async fn test_failing_source_does_not_abort_run() {
    let (_, b, _) = abc();
    let store = Arc::new(MemoryStore::default());
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(FakeCollector { kind: SourceKind::Arxiv, items: None }),
        Box::new(FakeCollector { kind: SourceKind::NewsApi, items: Some(vec![b]) }),
    ];

    let report = pipeline(collectors, store.clone(), FakeSummarizer::ok("Sepsis Watch"))
        .run(run_date(), now())
        .await;

    assert_eq!(report.fetched, 1);
    assert_eq!(report.written, 1);
}

#[tokio::test]
async fn test_same_title_from_two_sources_is_written_once() {
    let store = Arc::new(MemoryStore::default());
    let first = item("FDA clears AI stroke triage", "https://a.example.com/1", "", SourceKind::Rss);
    let second = item("FDA Clears AI Stroke Triage!", "https://b.example.com/2", "", SourceKind::NewsApi);

    let report = pipeline(collectors(vec![first, second]), store.clone(), FakeSummarizer::ok("x"))
        .run(run_date(), now())
        .await;

    assert_eq!(report.written, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.rows(TODAY).len(), 1);
}

#[tokio::test]
async fn test_uncategorized_item_still_stored() {
    let store = Arc::new(MemoryStore::default());
    let plain = item("Weekly roundup", "https://news.example.com/r", "Assorted links.", SourceKind::Rss);

    pipeline(collectors(vec![plain]), store.clone(), FakeSummarizer::ok("x"))
        .run(run_date(), now())
        .await;

    let rows = store.rows(TODAY);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "");
}

#[tokio::test]
async fn test_disabled_source_is_not_collected() {
    let (a, b, _) = abc();
    let store = Arc::new(MemoryStore::default());
    let enricher = Enricher::new(Box::new(FakeSummarizer::ok("x")), projects(), Duration::from_secs(5));
    let config = PipelineConfig {
        sources: vec![SourceKind::NewsApi],
        ..config()
    };

    let report = Pipeline::new(collectors(vec![a, b.clone()]), store.clone(), enricher, config)
        .run(run_date(), now())
        .await;

    assert_eq!(report.fetched, 1);
    assert_eq!(store.rows(TODAY)[0].link, b.link);
}

#[tokio::test]
async fn test_failed_writes_are_retried_next_run() {
    let (_, b, _) = abc();
    let store = Arc::new(MemoryStore::default());
    store.fail_appends.store(true, Ordering::SeqCst);

    let report = pipeline(collectors(vec![b.clone()]), store.clone(), FakeSummarizer::ok("x"))
        .run(run_date(), now())
        .await;
    assert_eq!(report.written, 0);
    assert_eq!(report.failed, 1);
    assert!(store.rows(TODAY).is_empty());

    // Nothing was persisted, so the rerun against the same store writes the item once
    store.fail_appends.store(false, Ordering::SeqCst);
    let report = pipeline(collectors(vec![b.clone()]), store.clone(), FakeSummarizer::ok("x"))
        .run(run_date(), now())
        .await;
    assert_eq!(report.written, 1);
    assert_eq!(report.duplicates, 0);

    let rows = store.rows(TODAY);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].link, b.link);
}

#[tokio::test]
async fn test_unreadable_store_skips_all_writes() {
    let (a, b, _) = abc();
    let store = Arc::new(MemoryStore::with_rows(TODAY, vec![existing_row(&a)]));
    store.fail_reads.store(true, Ordering::SeqCst);

    let report = pipeline(collectors(vec![a.clone(), b]), store.clone(), FakeSummarizer::ok("x"))
        .run(run_date(), now())
        .await;

    assert_eq!(report.fetched, 2);
    assert_eq!(report.written, 0);
    assert_eq!(report.failed, 2);

    // A is not appended a second time and B waits for a readable store
    let rows = store.rows(TODAY);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].link, a.link);
}

#[tokio::test]
async fn test_digest_send_failure_is_counted_and_rest_still_sent() {
    let (_, mut b, mut c) = abc();
    b.category = Some("Clinical Applications".into());
    c.category = Some("Research & Development".into());
    let store = Arc::new(MemoryStore::with_rows(TODAY, vec![existing_row(&b), existing_row(&c)]));

    // Header, then one message per category; the Clinical one is rejected
    let chat = Arc::new(FlakyChat::failing_on(2));
    let report = DigestBot::new(store, chat.clone(), rules()).post(run_date()).await.unwrap();

    assert_eq!(report.items, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 2);
    assert_eq!(chat.calls.load(Ordering::SeqCst), 3);

    let delivered = chat.messages();
    assert_eq!(delivered.len(), 2);
    assert!(delivered[0].contains("2025-05-04"));
    assert!(!delivered.iter().any(|m| m.contains(&b.title)));
    assert!(delivered[1].contains(&c.title));
}

#[tokio::test]
async fn test_digest_for_missing_tab() {
    let store = Arc::new(MemoryStore::default());
    let chat = Arc::new(RecordingChat::default());

    let report = DigestBot::new(store, chat.clone(), rules()).post(run_date()).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(chat.messages(), vec!["No items yet.".to_string()]);
}
