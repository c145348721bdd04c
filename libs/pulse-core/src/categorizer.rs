//! Static keyword categorization.
//!
//! Rules are an ordered priority list: the first category with a keyword
//! present in the item's title or summary wins. Keywords match
//! case-insensitively at the start of a word, so `diagnos` matches
//! "Diagnosis" while `ehr` does not match "their".

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::NewsItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    /// Build rules, lowercasing keywords and dropping blank ones.
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule {
                name: rule.name.trim().to_string(),
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let rules: Vec<CategoryRule> = serde_json::from_str(json)?;
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Category names in priority order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First category (in priority order) with a keyword present in `text`
    pub fn classify(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| contains_word_prefix(&haystack, k)))
            .map(|rule| rule.name.as_str())
    }

    /// Set `item.category` from title + summary. Leaves it unset when nothing matches.
    pub fn categorize(&self, item: &mut NewsItem) {
        let text = format!("{} {}", item.title, item.raw_summary);
        item.category = self.classify(&text).map(str::to_string);
        debug!(link = %item.link, category = ?item.category, "Categorized item");
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        let rule = |name: &str, keywords: &[&str]| CategoryRule {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };

        Self::new(vec![
            rule(
                "Clinical Applications",
                &[
                    "diagnos", "prognos", "clinical decision support", "disease detection",
                    "outcome prediction", "personalized medicine", "precision medicine",
                    "surgical", "surgery", "treatment", "radiology", "pathology",
                    "remote monitoring", "wearable", "mental health",
                ],
            ),
            rule(
                "Research & Development",
                &[
                    "drug discovery", "drug development", "molecular design",
                    "target identification", "clinical trial", "protein", "genomic",
                    "epidemiolog", "outbreak", "disease surveillance", "public health",
                    "population health",
                ],
            ),
            rule(
                "Healthcare Operations",
                &[
                    "documentation", "scheduling", "billing", "patient flow", "ehr", "emr",
                    "electronic health record", "interoperability", "workflow",
                    "resource allocation", "administrative",
                ],
            ),
            rule(
                "Evaluation & Implementation",
                &[
                    "benchmark", "validation", "evaluation", "explainab", "interpretab",
                    "implementation", "adoption", "real-world deployment",
                ],
            ),
            rule(
                "Ethical & Societal Implications",
                &[
                    "bias", "fairness", "equity", "disparit", "privacy", "security",
                    "regulat", "fda", "policy", "liability", "consent", "sustainab",
                ],
            ),
            rule(
                "Education & Workforce",
                &[
                    "education", "literacy", "workforce", "training program", "curriculum",
                    "human-ai collaboration",
                ],
            ),
        ])
    }
}

/// True when `needle` occurs in `haystack` starting at a word boundary.
/// Both are expected to be lowercase already.
pub(crate) fn contains_word_prefix(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}
