//! Google Sheets v4 REST client

use async_trait::async_trait;
use gcloud_auth::project::Config as AuthConfig;
use gcloud_auth::token::DefaultTokenSourceProvider;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use token_source::{TokenSource, TokenSourceProvider};
use tracing::{debug, info, instrument};
use url::Url;

use super::NewsStore;
use crate::error::StoreError;
use crate::types::{StoreRow, STORE_HEADER};

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

const SHEETS_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/spreadsheets"];

/// Last column of the store layout (nine columns, A..I)
const STORE_COLUMNS: &str = "A:I";

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub base_url: String,
    /// Pre-issued OAuth access token; service-account credentials are used when absent
    pub access_token: Option<String>,
}

/// How requests are authorized
#[derive(Clone)]
pub enum SheetsAuth {
    Static(String),
    TokenSource(Arc<dyn TokenSource>),
}

impl SheetsAuth {
    /// Use `token` when given, otherwise Application Default Credentials
    /// (`GOOGLE_APPLICATION_CREDENTIALS` service account, metadata server, ...)
    pub async fn resolve(token: Option<&str>) -> Result<Self, StoreError> {
        if let Some(token) = token {
            return Ok(SheetsAuth::Static(token.to_string()));
        }

        let provider = DefaultTokenSourceProvider::new(AuthConfig::default().with_scopes(&SHEETS_SCOPES))
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        Ok(SheetsAuth::TokenSource(provider.token_source()))
    }

    async fn header_value(&self) -> Result<String, StoreError> {
        match self {
            SheetsAuth::Static(token) => Ok(format!("Bearer {}", token)),
            // Token sources already return "Bearer <token>"
            SheetsAuth::TokenSource(source) => source
                .token()
                .await
                .map_err(|e| StoreError::Auth(e.to_string())),
        }
    }
}

impl fmt::Debug for SheetsAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetsAuth::Static(_) => f.write_str("SheetsAuth::Static(<redacted>)"),
            SheetsAuth::TokenSource(_) => f.write_str("SheetsAuth::TokenSource"),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize, Debug)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize, Debug)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize, Debug)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Thin wrapper over the endpoints the pipeline needs
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    auth: SheetsAuth,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, auth: SheetsAuth) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            auth,
        }
    }

    fn url(&self, spreadsheet_id: &str, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::RequestFailed(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::RequestFailed(format!("Sheets base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(std::iter::once(spreadsheet_id).chain(tail.iter().copied()));
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let auth = self.auth.header_value().await?;
        let response = request
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Titles of all tabs in the spreadsheet
    pub async fn tab_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, StoreError> {
        let mut url = self.url(spreadsheet_id, &[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");

        let meta: SpreadsheetMeta = self
            .send(self.http.get(url))
            .await?
            .json()
            .await
            .map_err(|e| StoreError::ParseError(e.to_string()))?;

        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Cell values of `range` rendered as strings
    pub async fn values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.url(spreadsheet_id, &["values", range])?;

        let body: ValueRange = self
            .send(self.http.get(url))
            .await?
            .json()
            .await
            .map_err(|e| StoreError::ParseError(e.to_string()))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    pub async fn add_tab(&self, spreadsheet_id: &str, title: &str) -> Result<(), StoreError> {
        let url = self.url(spreadsheet_id, &[])?;
        // batchUpdate is addressed as `<id>:batchUpdate`
        let url = Url::parse(&format!("{}:batchUpdate", url))
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }

    pub async fn append(&self, spreadsheet_id: &str, range: &str, rows: Vec<Vec<String>>) -> Result<(), StoreError> {
        let mut url = self.url(spreadsheet_id, &["values", &format!("{}:append", range)])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        self.send(self.http.post(url).json(&json!({ "values": rows }))).await?;
        Ok(())
    }
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn tab_range(tab: &str) -> String {
    format!("'{}'!{}", tab.replace('\'', "''"), STORE_COLUMNS)
}

/// The news store: one spreadsheet, one tab per run date
#[derive(Debug, Clone)]
pub struct SheetsStore {
    client: SheetsClient,
    spreadsheet_id: String,
}

impl SheetsStore {
    pub fn new(client: SheetsClient, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    async fn has_tab(&self, tab: &str) -> Result<bool, StoreError> {
        let titles = self.client.tab_titles(&self.spreadsheet_id).await?;
        Ok(titles.iter().any(|t| t == tab))
    }
}

#[async_trait]
impl NewsStore for SheetsStore {
    #[instrument(skip(self))]
    async fn read_rows(&self, tab: &str) -> Result<Option<Vec<StoreRow>>, StoreError> {
        if !self.has_tab(tab).await? {
            return Ok(None);
        }

        let rows = self
            .client
            .values(&self.spreadsheet_id, &tab_range(tab))
            .await?
            .into_iter()
            .filter(|cells| !StoreRow::is_header(cells))
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|cells| StoreRow::from_cells(&cells))
            .collect::<Vec<_>>();

        debug!(rows = rows.len(), "Read rows from sheet");
        Ok(Some(rows))
    }

    #[instrument(skip(self))]
    async fn ensure_tab(&self, tab: &str) -> Result<(), StoreError> {
        if self.has_tab(tab).await? {
            return Ok(());
        }

        self.client.add_tab(&self.spreadsheet_id, tab).await?;
        let header = STORE_HEADER.iter().map(|h| h.to_string()).collect();
        self.client
            .append(&self.spreadsheet_id, &tab_range(tab), vec![header])
            .await?;

        info!(tab = %tab, "Created worksheet");
        Ok(())
    }

    #[instrument(skip(self, row), fields(link = %row.link))]
    async fn append_row(&self, tab: &str, row: &StoreRow) -> Result<(), StoreError> {
        self.client
            .append(&self.spreadsheet_id, &tab_range(tab), vec![row.to_cells()])
            .await
    }
}
