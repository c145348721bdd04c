//! Environment configuration for both agents.
//!
//! Everything is read once at startup into plain structs. Missing required
//! variables and unreadable rule files are the only fatal errors.

use llm_client::{GeminiConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::categorizer::CategoryRules;
use crate::chat::{DiscordConfig, DEFAULT_DISCORD_BASE_URL};
use crate::collectors::feed::{default_feeds, feeds_from_json};
use crate::collectors::newsapi::DEFAULT_NEWSAPI_BASE_URL;
use crate::collectors::{ArxivConfig, NewsApiConfig};
use crate::enricher::ProjectCatalog;
use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;
use crate::store::{SheetsConfig, DEFAULT_SHEETS_BASE_URL};
use crate::types::{SourceConfig, SourceKind};

/// Where the RSS collector gets its feed list
#[derive(Debug, Clone, PartialEq)]
pub enum FeedList {
    /// Read at run time from a sources spreadsheet
    Sheet(String),
    /// Loaded from `RSS_SOURCES_PATH` or the built-in defaults
    Static(Vec<SourceConfig>),
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub pipeline: PipelineConfig,
    pub projects: ProjectCatalog,
    pub gemini: GeminiConfig,
    /// `None` when no NewsAPI.ai key is configured
    pub newsapi: Option<NewsApiConfig>,
    pub arxiv: ArxivConfig,
    pub sheets: SheetsConfig,
    pub feeds: FeedList,
}

#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub sheets: SheetsConfig,
    pub discord: DiscordConfig,
    pub categories: CategoryRules,
}

impl CollectorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let api_key = env
            .get("GEMINI_API_KEY")
            .or_else(|| env.get("GOOGLE_API_KEY"))
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
        let gemini = GeminiConfig {
            model: env.get_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            base_url: env.get_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            ..GeminiConfig::new(api_key)
        };

        let mut sources = match env.get("COLLECTOR_SOURCES") {
            Some(list) => parse_sources(&list)?,
            None => SourceKind::ALL.to_vec(),
        };

        let newsapi = env.get("NEWSAPI_AI_KEY").map(|key| NewsApiConfig {
            base_url: env.get_or("NEWSAPI_BASE_URL", DEFAULT_NEWSAPI_BASE_URL),
            ..NewsApiConfig::new(key)
        });
        if newsapi.is_none() && sources.contains(&SourceKind::NewsApi) {
            warn!("NEWSAPI_AI_KEY not set, NewsAPI.ai source disabled");
            sources.retain(|s| *s != SourceKind::NewsApi);
        }

        let categories = match env.get("CATEGORY_RULES_PATH") {
            Some(path) => CategoryRules::from_json(&read_file(&path)?).map_err(|e| invalid_json(&path, e))?,
            None => CategoryRules::default(),
        };

        let projects = match env.get("PROJECTS_PATH") {
            Some(path) => ProjectCatalog::from_json(&read_file(&path)?).map_err(|e| invalid_json(&path, e))?,
            None => {
                warn!("PROJECTS_PATH not set, every item will be labelled unassigned");
                ProjectCatalog::default()
            }
        };

        let feeds = match (env.get("SOURCES_SHEET_ID"), env.get("RSS_SOURCES_PATH")) {
            (Some(id), _) => FeedList::Sheet(id),
            (None, Some(path)) => FeedList::Static(feeds_from_json(&path, &read_file(&path)?)?),
            (None, None) => FeedList::Static(default_feeds()),
        };

        let pipeline = PipelineConfig {
            lookback_days: env.parse("LOOKBACK_DAYS", 3)?,
            dedup_window_days: env.parse("DEDUP_WINDOW_DAYS", 3)?,
            llm_timeout: Duration::from_secs(env.parse("LLM_TIMEOUT_SECS", 60)?),
            source_timeout: Duration::from_secs(env.parse("SOURCE_TIMEOUT_SECS", 300)?),
            sources,
            categories,
        };

        Ok(Self {
            pipeline,
            projects,
            gemini,
            newsapi,
            arxiv: ArxivConfig::default(),
            sheets: sheets_config(&env)?,
            feeds,
        })
    }
}

impl DigestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let bot_token = env
            .get("DISCORD_BOT_TOKEN")
            .ok_or(ConfigError::Missing("DISCORD_BOT_TOKEN"))?;
        let channel_id = env
            .get("DISCORD_CHANNEL_ID")
            .ok_or(ConfigError::Missing("DISCORD_CHANNEL_ID"))?;
        let channel_id = channel_id.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            name: "DISCORD_CHANNEL_ID",
            value: channel_id.clone(),
        })?;

        let categories = match env.get("CATEGORY_RULES_PATH") {
            Some(path) => CategoryRules::from_json(&read_file(&path)?).map_err(|e| invalid_json(&path, e))?,
            None => CategoryRules::default(),
        };

        Ok(Self {
            sheets: sheets_config(&env)?,
            discord: DiscordConfig {
                bot_token,
                channel_id,
                base_url: env.get_or("DISCORD_BASE_URL", DEFAULT_DISCORD_BASE_URL),
            },
            categories,
        })
    }
}

/// Lookup wrapper that treats blank values as unset
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value }),
            None => Ok(default),
        }
    }
}

fn sheets_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<SheetsConfig, ConfigError> {
    Ok(SheetsConfig {
        spreadsheet_id: env.get("RAW_SHEET_ID").ok_or(ConfigError::Missing("RAW_SHEET_ID"))?,
        base_url: env.get_or("SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL),
        access_token: env.get("GOOGLE_ACCESS_TOKEN"),
    })
}

/// Parse a comma list such as `arxiv,rss`
pub fn parse_sources(list: &str) -> Result<Vec<SourceKind>, ConfigError> {
    let mut sources = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = name.parse::<SourceKind>().map_err(|_| ConfigError::InvalidValue {
            name: "COLLECTOR_SOURCES",
            value: list.to_string(),
        })?;
        if !sources.contains(&kind) {
            sources.push(kind);
        }
    }
    Ok(sources)
}

fn read_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_string(),
        error: e.to_string(),
    })
}

fn invalid_json(path: &str, e: serde_json::Error) -> ConfigError {
    ConfigError::InvalidJson {
        path: path.to_string(),
        error: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    fn temp_file(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("pulse-config-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_collector_defaults() {
        let config = CollectorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g"),
            ("RAW_SHEET_ID", "sheet"),
            ("NEWSAPI_AI_KEY", "n"),
        ]))
        .unwrap();

        assert_eq!(config.pipeline.lookback_days, 3);
        assert_eq!(config.pipeline.dedup_window_days, 3);
        assert_eq!(config.pipeline.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.pipeline.sources, SourceKind::ALL.to_vec());
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.sheets.base_url, DEFAULT_SHEETS_BASE_URL);
        assert!(config.sheets.access_token.is_none());
        assert!(config.projects.is_empty());
        assert_eq!(config.feeds, FeedList::Static(default_feeds()));
    }

    #[test]
    fn test_missing_required_variables() {
        let err = CollectorConfig::from_lookup(lookup(&[("RAW_SHEET_ID", "s")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GEMINI_API_KEY")));

        let err = CollectorConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "g")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("RAW_SHEET_ID")));
    }

    #[test]
    fn test_google_api_key_fallback_and_blank_values() {
        let config = CollectorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "  "),
            ("GOOGLE_API_KEY", "google"),
            ("RAW_SHEET_ID", "s"),
        ]))
        .unwrap();
        assert_eq!(config.gemini.api_key, "google");
    }

    #[test]
    fn test_newsapi_disabled_without_key() {
        let config = CollectorConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "g"), ("RAW_SHEET_ID", "s")])).unwrap();
        assert!(config.newsapi.is_none());
        assert_eq!(config.pipeline.sources, vec![SourceKind::Arxiv, SourceKind::Rss]);
    }

    #[test]
    fn test_invalid_number() {
        let err = CollectorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g"),
            ("RAW_SHEET_ID", "s"),
            ("LOOKBACK_DAYS", "three"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "LOOKBACK_DAYS", .. }));
    }

    #[test]
    fn test_parse_sources() {
        assert_eq!(
            parse_sources("rss, arxiv,rss").unwrap(),
            vec![SourceKind::Rss, SourceKind::Arxiv]
        );
        assert!(parse_sources("arxiv,twitter").is_err());
    }

    #[test]
    fn test_rule_files_are_loaded() {
        let rules = temp_file("rules.json", r#"[{"name": "Imaging", "keywords": ["Radiolog"]}]"#);
        let projects = temp_file("projects.json", r#"{"RadReport": "Radiology reports"}"#);
        let feeds = temp_file("feeds.json", r#"[{"name": "STAT", "url": "https://www.statnews.com/feed/"}]"#);

        let config = CollectorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g"),
            ("RAW_SHEET_ID", "s"),
            ("CATEGORY_RULES_PATH", rules.as_str()),
            ("PROJECTS_PATH", projects.as_str()),
            ("RSS_SOURCES_PATH", feeds.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.pipeline.categories.names().collect::<Vec<_>>(), vec!["Imaging"]);
        assert_eq!(config.projects.resolve("radreport"), Some("RadReport"));
        match config.feeds {
            FeedList::Static(feeds) => assert_eq!(feeds[0].name, "STAT"),
            other => panic!("unexpected feed list {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_rules_file_is_fatal() {
        let err = CollectorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g"),
            ("RAW_SHEET_ID", "s"),
            ("CATEGORY_RULES_PATH", "/nonexistent/rules.json"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_sources_sheet_takes_precedence() {
        let config = CollectorConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g"),
            ("RAW_SHEET_ID", "s"),
            ("SOURCES_SHEET_ID", "feeds-sheet"),
            ("RSS_SOURCES_PATH", "/nonexistent/feeds.json"),
        ]))
        .unwrap();
        assert_eq!(config.feeds, FeedList::Sheet("feeds-sheet".into()));
    }

    #[test]
    fn test_digest_config() {
        let config = DigestConfig::from_lookup(lookup(&[
            ("RAW_SHEET_ID", "s"),
            ("DISCORD_BOT_TOKEN", "bot"),
            ("DISCORD_CHANNEL_ID", "1234"),
            ("GOOGLE_ACCESS_TOKEN", "ya29"),
        ]))
        .unwrap();
        assert_eq!(config.discord.channel_id, 1234);
        assert_eq!(config.discord.base_url, DEFAULT_DISCORD_BASE_URL);
        assert_eq!(config.sheets.access_token.as_deref(), Some("ya29"));

        let err = DigestConfig::from_lookup(lookup(&[
            ("RAW_SHEET_ID", "s"),
            ("DISCORD_BOT_TOKEN", "bot"),
            ("DISCORD_CHANNEL_ID", "general"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "DISCORD_CHANNEL_ID", .. }));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("GEMINI_API_KEY", "env-key");
        std::env::set_var("RAW_SHEET_ID", "env-sheet");
        std::env::set_var("COLLECTOR_SOURCES", "arxiv");

        let config = CollectorConfig::from_env().unwrap();
        assert_eq!(config.gemini.api_key, "env-key");
        assert_eq!(config.sheets.spreadsheet_id, "env-sheet");
        assert_eq!(config.pipeline.sources, vec![SourceKind::Arxiv]);

        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("RAW_SHEET_ID");
        std::env::remove_var("COLLECTOR_SOURCES");
    }
}
