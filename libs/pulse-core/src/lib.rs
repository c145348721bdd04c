//! Medical AI news pipeline: collect, categorize, deduplicate, enrich,
//! persist to a spreadsheet, and post a chat digest.

pub mod categorizer;
pub mod chat;
pub mod collectors;
pub mod config;
pub mod dedup;
pub mod digest;
pub mod enricher;
pub mod error;
pub mod pipeline;
pub mod relevance;
pub mod store;
pub mod types;

pub use categorizer::{CategoryRule, CategoryRules};
pub use chat::{ChatSink, DiscordChannel, DiscordConfig};
pub use collectors::{collect_guarded, create_http_client, Collector, Lookback};
pub use config::{CollectorConfig, DigestConfig, FeedList};
pub use dedup::DedupIndex;
pub use digest::{DigestBot, DigestReport};
pub use enricher::{Enricher, ProjectCatalog, Summarizer, FALLBACK_PROJECT};
pub use error::{ChatError, ConfigError, EnrichError, FetchError, StoreError};
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
pub use relevance::RelevanceFilter;
pub use store::{tab_name, NewsStore, SheetsAuth, SheetsClient, SheetsStore};
pub use types::{NewsItem, SourceConfig, SourceKind, StoreRow};
