use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn, instrument};
use tracing_subscriber::{fmt, EnvFilter};
use backoff::{ExponentialBackoff, future::retry};
use std::fmt as std_fmt;
use std::time::Duration;
use url::Url;

const MAX_RETRY_ELAPSED_SECS: u64 = 120;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// --- Shared Utilities ---

/// Extract the domain/host from a URL string safely.
/// Returns "unknown" if the URL cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Strip a surrounding markdown code fence (```json ... ```) from a model reply.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Drop the opening fence together with its optional language tag
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed.trim_start_matches('`'),
    };

    body.trim_end().trim_end_matches("```").trim()
}

// --- Shared Logging ---

/// Initialize structured logging with JSON format in production (when RUST_LOG is set),
/// or pretty format for local development.
pub fn init_logging() {
    let is_production = std::env::var("RUST_LOG").is_ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if is_production {
        let _ = fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

// --- Gemini Structs ---
#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[derive(Deserialize, Debug)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiError {
    pub message: String,
}

// --- Client ---

/// Connection settings for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_retry_elapsed: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            max_retry_elapsed: Duration::from_secs(MAX_RETRY_ELAPSED_SECS),
        }
    }
}

// Keeps the key out of logs
impl std_fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std_fmt::Formatter<'_>) -> std_fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_retry_elapsed", &self.max_retry_elapsed)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: GeminiConfig) -> Self {
        Self { http, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Plain text completion with exponential backoff retry for transient failures
    pub async fn generate(&self, prompt: String) -> Result<String, BoxError> {
        self.generate_with_retry(prompt, None).await
    }

    /// Completion constrained to a JSON response body
    pub async fn generate_json(&self, prompt: String) -> Result<String, BoxError> {
        let generation_config = GenerationConfig {
            response_mime_type: "application/json".to_string(),
        };
        self.generate_with_retry(prompt, Some(generation_config)).await
    }

    #[instrument(skip(self, prompt, generation_config), fields(model = %self.config.model, prompt_len = prompt.len()))]
    async fn generate_with_retry(
        &self,
        prompt: String,
        generation_config: Option<GenerationConfig>,
    ) -> Result<String, BoxError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.config.max_retry_elapsed),
            ..Default::default()
        };

        let request = GeminiRequest {
            contents: vec![
                GeminiContent {
                    parts: vec![ GeminiPart { text: prompt } ]
                }
            ],
            generation_config,
        };
        let request = &request;

        let result = retry(backoff, move || async move {
            match self.call_gemini(request).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    let err_str = e.to_string();
                    // Retry on transient errors (network, rate limits, server errors)
                    if is_transient_error(&err_str) {
                        warn!(error = %err_str, "Transient Gemini error, retrying");
                        Err(backoff::Error::transient(e))
                    } else {
                        error!(error = %err_str, "Permanent Gemini error, not retrying");
                        Err(backoff::Error::permanent(e))
                    }
                }
            }
        }).await?;

        Ok(result)
    }

    fn endpoint(&self) -> Result<Url, BoxError> {
        let mut url = Url::parse(&self.config.base_url)?;
        url.path_segments_mut()
            .map_err(|_| format!("Gemini base URL cannot be a base: {}", self.config.base_url))?
            .pop_if_empty()
            .extend(["v1beta", "models"])
            .push(&format!("{}:generateContent", self.config.model));
        // Note: API key in URL is required by Gemini API - we redact it in logs
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    async fn call_gemini(&self, request: &GeminiRequest) -> Result<String, BoxError> {
        let url = self.endpoint()?;

        debug!("Sending request to Gemini API");

        // Drop the URL from transport errors so the key never reaches the logs
        let res = self.http.post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = res.status();
        debug!(status = %status, "Gemini API response received");

        if !status.is_success() {
            let error_body = res.text().await.unwrap_or_default();
            return Err(format!("Gemini API returned {}: {}", status, error_body).into());
        }

        let resp: GeminiResponse = res.json().await.map_err(|e| e.without_url())?;

        if let Some(error) = resp.error {
            return Err(format!("Gemini API Error: {}", error.message).into());
        }

        if let Some(candidates) = resp.candidates {
            if let Some(first) = candidates.first() {
                if let Some(part) = first.content.parts.first() {
                    return Ok(part.text.clone());
                }
            }
        }

        Err("No content returned from Gemini".into())
    }
}

fn is_transient_error(err: &str) -> bool {
    let transient_patterns = [
        "timeout",
        "timed out",
        "connection",
        "rate limit",
        "429",
        "500",
        "502",
        "503",
        "504",
        "temporarily",
        "overloaded",
    ];

    let err_lower = err.to_lowercase();
    transient_patterns.iter().any(|p| err_lower.contains(p))
}
