//! NewsAPI.ai (Event Registry) article search.
//!
//! One request per search term; results are scored for medical-AI
//! relevance and recency, thresholded, deduplicated by URL and truncated
//! to the best `max_articles`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{clean_text, Collector, Lookback};
use crate::error::FetchError;
use crate::types::{NewsItem, SourceKind};

pub const DEFAULT_NEWSAPI_BASE_URL: &str = "https://newsapi.ai/api/v1/article/getArticles";

pub const DEFAULT_SEARCH_TERMS: &[&str] = &[
    "AI healthcare",
    "AI drug discovery",
    "AI diagnosis",
    "AI radiology",
    "AI pathology",
    "AI surgery",
    "clinical AI",
    "medical artificial intelligence",
];

const HIGH_VALUE_TERMS: &[&str] = &[
    "medical ai", "clinical ai", "healthcare ai", "ai diagnosis", "ai treatment",
    "ai drug discovery", "ai clinical trial", "medical machine learning", "ai radiology",
    "ai pathology", "ai surgery", "clinical decision support", "ai electronic health",
    "medical imaging ai", "ai healthcare", "fda approval", "clinical validation",
    "ai medical device", "healthcare artificial intelligence", "medgemma",
    "medical breakthrough",
];

const MEDIUM_VALUE_TERMS: &[&str] = &[
    "hospital", "patient", "doctor", "physician", "clinical", "medical", "healthcare",
    "diagnosis", "treatment", "pharmaceutical", "drug",
];

const NEGATIVE_TERMS: &[&str] = &[
    "soccer", "football", "sports", "gaming", "entertainment", "movie", "celebrity",
    "fashion", "politics", "election", "war", "military",
];

const AI_TERMS: &[&str] = &["ai", "artificial intelligence", "machine learning"];
const MEDICAL_ANCHORS: &[&str] = &["medical", "healthcare", "clinical", "patient", "hospital"];

#[derive(Clone)]
pub struct NewsApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub search_terms: Vec<String>,
    pub articles_per_query: u32,
    pub max_articles: usize,
    /// Pause between consecutive search requests
    pub request_delay: Duration,
}

impl NewsApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_NEWSAPI_BASE_URL.to_string(),
            search_terms: DEFAULT_SEARCH_TERMS.iter().map(|s| s.to_string()).collect(),
            articles_per_query: 30,
            max_articles: 40,
            request_delay: Duration::from_secs(1),
        }
    }
}

impl fmt::Debug for NewsApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("search_terms", &self.search_terms)
            .field("max_articles", &self.max_articles)
            .finish()
    }
}

// --- API Structs ---
#[derive(Deserialize, Debug, Default)]
struct SearchResponse {
    #[serde(default)]
    articles: Option<ArticlePage>,
}

#[derive(Deserialize, Debug, Default)]
struct ArticlePage {
    #[serde(default)]
    results: Vec<ApiArticle>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct ApiArticle {
    title: String,
    url: String,
    body: String,
    date: Option<String>,
    date_time: Option<String>,
    source: Option<ApiSource>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiSource {
    title: Option<String>,
}

/// An article with its ranking scores
#[derive(Debug, Clone)]
struct Scored {
    item: NewsItem,
    relevance: f64,
    recency: f64,
}

impl Scored {
    fn combined(&self) -> f64 {
        combined_score(self.relevance, self.recency)
    }
}

pub struct NewsApiCollector {
    http: reqwest::Client,
    config: NewsApiConfig,
}

impl NewsApiCollector {
    pub fn new(http: reqwest::Client, config: NewsApiConfig) -> Self {
        Self { http, config }
    }

    fn query_url(&self, term: &str, window: &Lookback) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| FetchError::RequestFailed(format!("Invalid NewsAPI URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("apiKey", &self.config.api_key)
            .append_pair("resultType", "articles")
            .append_pair("keyword", term)
            .append_pair("lang", "eng")
            .append_pair("dateStart", &window.start().format("%Y-%m-%d").to_string())
            .append_pair("dateEnd", &window.now.format("%Y-%m-%d").to_string())
            .append_pair("articlesSortBy", "date")
            .append_pair("articlesCount", &self.config.articles_per_query.to_string())
            .append_pair("includeSourceTitle", "true");
        Ok(url)
    }

    #[instrument(skip(self, window))]
    async fn search(&self, term: &str, window: &Lookback) -> Result<Vec<Scored>, FetchError> {
        // The query string carries the API key
        let res = self
            .http
            .get(self.query_url(term, window)?)
            .send()
            .await
            .map_err(|e| FetchError::from(e.without_url()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::ApiError {
                status: status.as_u16(),
                message: res.text().await.unwrap_or_default(),
            });
        }

        let body: SearchResponse = res
            .json()
            .await
            .map_err(|e| FetchError::ParseError(e.without_url().to_string()))?;

        let results = body.articles.unwrap_or_default().results;
        let total = results.len();
        let kept: Vec<Scored> = results
            .into_iter()
            .filter_map(|article| score_article(article, window.now))
            .filter(|s| passes_threshold(s.relevance, s.recency))
            .collect();

        debug!(total, kept = kept.len(), "Scored NewsAPI results");
        Ok(kept)
    }
}

fn score_article(article: ApiArticle, now: DateTime<Utc>) -> Option<Scored> {
    let title = clean_text(&article.title);
    let link = article.url.trim().to_string();
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let content = clean_text(&article.body);
    if content.chars().count() < 100 {
        debug!(title = %title, chars = content.len(), "Short article content");
    }

    let published = parse_published(article.date_time.as_deref(), article.date.as_deref());
    let outlet = article
        .source
        .and_then(|s| s.title)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| llm_client::extract_domain(&link));

    let relevance = relevance_score(&title, &content);
    let recency = published.map_or(0.5, |p| recency_score(p, now));
    let published_date = published.map_or_else(|| now.date_naive(), |p| p.date_naive());

    Some(Scored {
        item: NewsItem::new(title, link, content, SourceKind::NewsApi, outlet, published_date),
        relevance,
        recency,
    })
}

fn parse_published(date_time: Option<&str>, date: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(dt) = date_time.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok()) {
        return Some(dt.with_timezone(&Utc));
    }
    date.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whole-word (or whole-phrase) match on lowercase text
fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(idx, m)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + m.len()..].chars().next();
        before.map_or(true, |c| !c.is_alphanumeric()) && after.map_or(true, |c| !c.is_alphanumeric())
    })
}

/// 0..=1 score: high-value phrases +0.3, medium terms +0.1, off-topic terms -0.5,
/// +0.4 when both AI and medical vocabulary appear.
pub fn relevance_score(title: &str, content: &str) -> f64 {
    let text = format!("{} {}", title, content).to_lowercase();
    let count = |terms: &[&str]| terms.iter().filter(|t| contains_term(&text, t)).count() as f64;

    let mut score = 0.3 * count(HIGH_VALUE_TERMS) + 0.1 * count(MEDIUM_VALUE_TERMS)
        - 0.5 * count(NEGATIVE_TERMS);

    let has_ai = AI_TERMS.iter().any(|t| contains_term(&text, t));
    let has_medical = MEDICAL_ANCHORS.iter().any(|t| contains_term(&text, t));
    if has_ai && has_medical {
        score += 0.4;
    }

    score.clamp(0.0, 1.0)
}

/// Stepwise freshness: 1.0 within 6h down to 0.2 beyond 72h
pub fn recency_score(published: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - published).num_minutes() as f64 / 60.0;
    match hours {
        h if h <= 6.0 => 1.0,
        h if h <= 24.0 => 0.8,
        h if h <= 48.0 => 0.6,
        h if h <= 72.0 => 0.4,
        _ => 0.2,
    }
}

pub fn combined_score(relevance: f64, recency: f64) -> f64 {
    0.7 * relevance + 0.3 * recency
}

fn passes_threshold(relevance: f64, recency: f64) -> bool {
    relevance >= 0.2 || (relevance >= 0.1 && recency >= 0.8)
}

/// Deduplicate by URL, order by combined score (stable), keep the best `limit`
fn rank(scored: Vec<Scored>, limit: usize) -> Vec<Scored> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Scored> = scored
        .into_iter()
        .filter(|s| seen.insert(s.item.link.clone()))
        .collect();
    unique.sort_by(|a, b| b.combined().total_cmp(&a.combined()));
    unique.truncate(limit);
    unique
}

#[async_trait]
impl Collector for NewsApiCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::NewsApi
    }

    async fn collect(&self, window: &Lookback) -> Result<Vec<NewsItem>, FetchError> {
        let mut scored = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for (i, term) in self.config.search_terms.iter().enumerate() {
            if i > 0 && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }

            match self.search(term, window).await {
                Ok(mut found) => {
                    info!(query = %term, count = found.len(), "Relevant articles for query");
                    scored.append(&mut found);
                }
                Err(e) => {
                    warn!(query = %term, error = %e, "NewsAPI query failed");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        // Only a total outage counts as a source failure
        if failures == self.config.search_terms.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let total = scored.len();
        let top = rank(scored, self.config.max_articles);

        if !top.is_empty() {
            let n = top.len() as f64;
            let avg_relevance = top.iter().map(|s| s.relevance).sum::<f64>() / n;
            let avg_recency = top.iter().map(|s| s.recency).sum::<f64>() / n;
            info!(
                kept = top.len(),
                total,
                avg_relevance = %format!("{:.2}", avg_relevance),
                avg_recency = %format!("{:.2}", avg_recency),
                "Ranked NewsAPI articles"
            );
        }

        Ok(top.into_iter().map(|s| s.item).collect())
    }
}
