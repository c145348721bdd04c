//! LLM enrichment: bullet summary plus a project label from a closed set.
//!
//! Exactly one completion per item. Any failure (API error, timeout,
//! unparseable reply) degrades to the raw summary and the fallback project;
//! enrichment never aborts the run.

use async_trait::async_trait;
use llm_client::{strip_code_fences, BoxError, GeminiClient};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::EnrichError;
use crate::types::NewsItem;

/// Project label stored when the LLM cannot assign one
pub const FALLBACK_PROJECT: &str = "unassigned";

/// Characters of article text sent to the model
const MAX_PROMPT_ARTICLE_CHARS: usize = 3000;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn complete(&self, prompt: String) -> Result<String, BoxError>;
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn complete(&self, prompt: String) -> Result<String, BoxError> {
        self.generate_json(prompt).await
    }
}

/// Lab projects an item may be filed under: name → description
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProjectCatalog {
    projects: BTreeMap<String, String>,
}

impl ProjectCatalog {
    pub fn new(projects: BTreeMap<String, String>) -> Self {
        Self { projects }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Canonical spelling of `label` if it names a project (case-insensitive)
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let label = label.trim();
        self.projects
            .keys()
            .find(|name| name.eq_ignore_ascii_case(label))
            .map(String::as_str)
    }

    fn prompt_listing(&self) -> String {
        if self.projects.is_empty() {
            return "- (no active projects)".to_string();
        }
        self.projects
            .iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Deserialize, Debug)]
struct EnrichmentReply {
    bullet_summary: OneOrMany,
    #[serde(default)]
    project: Option<OneOrMany>,
}

/// Parsed model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub summary: String,
    pub project: String,
}

pub struct Enricher {
    summarizer: Box<dyn Summarizer>,
    projects: ProjectCatalog,
    timeout: Duration,
}

impl Enricher {
    pub fn new(summarizer: Box<dyn Summarizer>, projects: ProjectCatalog, timeout: Duration) -> Self {
        Self {
            summarizer,
            projects,
            timeout,
        }
    }

    /// Fill `enriched_summary` and `project`, falling back to raw content on failure.
    /// Returns false when the fallback was used.
    #[instrument(skip(self, item), fields(link = %item.link))]
    pub async fn enrich(&self, item: &mut NewsItem) -> bool {
        match self.try_enrich(item).await {
            Ok(enrichment) => {
                item.enriched_summary = Some(enrichment.summary);
                item.project = Some(enrichment.project);
                true
            }
            Err(e) => {
                warn!(error = %e, "Enrichment failed, keeping raw summary");
                item.enriched_summary = Some(item.raw_summary.clone());
                item.project = Some(FALLBACK_PROJECT.to_string());
                false
            }
        }
    }

    async fn try_enrich(&self, item: &NewsItem) -> Result<Enrichment, EnrichError> {
        let prompt = self.build_prompt(item);

        let reply = tokio::time::timeout(self.timeout, self.summarizer.complete(prompt))
            .await
            .map_err(|_| EnrichError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| EnrichError::Llm(e.to_string()))?;

        let enrichment = self.parse_reply(&reply)?;
        debug!(project = %enrichment.project, "Item enriched");
        Ok(enrichment)
    }

    pub fn build_prompt(&self, item: &NewsItem) -> String {
        let article: String = format!("Title: {}\nContent: {}", item.title, item.raw_summary)
            .chars()
            .take(MAX_PROMPT_ARTICLE_CHARS)
            .collect();

        format!(
            "You are a medical AI research analyst. Summarize the article below for a lab of medical AI researchers.\n\n\
             Return ONLY valid JSON with exactly these keys:\n\
             {{\"bullet_summary\": [\"• Point 1\", \"• Point 2\", \"• Point 3\"], \"project\": \"Project Name\"}}\n\n\
             bullet_summary: 1-3 concise bullet points about the article itself.\n\
             project: the single most relevant project name from the list below, or \"{fallback}\" if none fits.\n\n\
             Projects:\n{projects}\n\n\
             Article: \"\"\"{article}\"\"\"",
            fallback = FALLBACK_PROJECT,
            projects = self.projects.prompt_listing(),
            article = article,
        )
    }

    /// Interpret the model's JSON. Unknown project labels map to the fallback.
    pub fn parse_reply(&self, reply: &str) -> Result<Enrichment, EnrichError> {
        let parsed: EnrichmentReply = serde_json::from_str(strip_code_fences(reply))
            .map_err(|e| EnrichError::InvalidResponse(e.to_string()))?;

        let bullets: Vec<String> = parsed
            .bullet_summary
            .into_vec()
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if bullets.is_empty() {
            return Err(EnrichError::InvalidResponse("empty bullet_summary".to_string()));
        }

        let project = parsed
            .project
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .find_map(|label| self.projects.resolve(label))
            .unwrap_or(FALLBACK_PROJECT)
            .to_string();

        Ok(Enrichment {
            summary: bullets.join("\n"),
            project,
        })
    }
}
