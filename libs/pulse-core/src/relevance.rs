//! Medical vocabulary filter applied to broad AI sources (arXiv `cs.AI`).

use regex::{escape, Regex, RegexBuilder};

/// Clinical, biomedical and public-health vocabulary
pub const MEDICAL_KEYWORDS: &[&str] = &[
    // Clinical terms
    "patient", "clinic", "clinical", "hospital", "doctor", "physician", "nurse", "medical",
    "medicine", "diagnosis", "treatment", "therapy", "therapeutic", "surgery", "surgical",
    "symptom", "disease", "disorder", "syndrome", "pathology", "illness", "prognosis",
    "rehabilitation", "outpatient", "inpatient",
    // Specialties
    "cardiology", "neurology", "oncology", "pediatrics", "geriatrics", "psychiatry",
    "orthopedics", "gynecology", "urology", "dermatology", "ophthalmology", "radiology",
    "anesthesiology", "endocrinology", "gastroenterology", "hematology", "nephrology",
    "rheumatology", "pulmonology", "immunology",
    // Imaging
    "mri", "ct scan", "ultrasound", "x-ray", "radiograph", "sonography", "tomography",
    "pet scan", "mammography", "angiography",
    // Health systems
    "healthcare", "health care", "health system", "medical record", "ehr", "emr",
    "electronic health record", "telemedicine", "telehealth",
    // Procedures and pharmacology
    "biopsy", "screening", "transplant", "dialysis", "drug", "medication", "pharmaceutical",
    "prescription", "clinical trial", "vaccine", "antibiotic",
    // Biomedical
    "biomedical", "genomics", "proteomics", "dna", "rna", "protein", "antibody", "gene",
    "mutation", "genome", "microbiome", "pathogen", "virus",
    // Health metrics and public health
    "mortality", "morbidity", "blood pressure", "heart rate", "glucose", "public health",
    "epidemiology", "epidemic", "pandemic", "outbreak", "infectious disease", "vaccination",
    // Mental health
    "mental health", "psychiatric", "depression", "anxiety", "schizophrenia", "dementia",
    // Conditions
    "cancer", "tumor", "diabetes", "hypertension", "stroke", "asthma", "alzheimer",
    "parkinson", "sepsis", "infection", "obesity",
];

/// Case-insensitive whole-word keyword matcher
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    // None when built from an empty list: matches nothing
    pattern: Option<Regex>,
}

impl RelevanceFilter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let alternation = keywords
            .iter()
            .map(|k| escape(k.as_ref().trim()))
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern: Some(pattern) })
    }

    pub fn medical() -> Result<Self, regex::Error> {
        Self::new(MEDICAL_KEYWORDS)
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }

    /// Distinct keywords found in `text`, lowercased, in order of first appearance
    pub fn matches(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let Some(pattern) = &self.pattern else {
            return found;
        };
        for m in pattern.find_iter(text) {
            let keyword = m.as_str().to_lowercase();
            if !found.contains(&keyword) {
                found.push(keyword);
            }
        }
        found
    }
}
