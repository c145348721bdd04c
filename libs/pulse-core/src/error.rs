//! Error types for the pipeline

use thiserror::Error;

/// Errors raised while building configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// An environment variable holds a value that cannot be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        name: &'static str,
        value: String,
    },

    /// A rules file could not be read
    #[error("Failed to read {path}: {error}")]
    Io {
        path: String,
        error: String,
    },

    /// A rules file is not valid JSON for its schema
    #[error("Invalid JSON in {path}: {error}")]
    InvalidJson {
        path: String,
        error: String,
    },
}

/// Errors that can occur while fetching from one source
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// API returned an error response
    #[error("API error (status {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    /// Failed to parse the feed or API response
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Source did not answer within its time budget
    #[error("Timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::RequestFailed(e.to_string())
    }
}

/// Errors from the spreadsheet store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Sheets API error (status {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    #[error("Malformed Sheets response: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::RequestFailed(e.to_string())
    }
}

/// Errors from the chat channel
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Discord API error (status {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
    },
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::RequestFailed(e.to_string())
    }
}

/// Reasons an enrichment attempt falls back to raw content
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),

    #[error("Unusable LLM response: {0}")]
    InvalidResponse(String),
}
