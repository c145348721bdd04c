use chrono::Utc;
use llm_client::init_logging;
use pulse_core::chat::DiscordChannel;
use pulse_core::collectors::create_http_client;
use pulse_core::config::DigestConfig;
use pulse_core::digest::DigestBot;
use pulse_core::store::{SheetsAuth, SheetsClient, SheetsStore};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = DigestConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    let run_date = Utc::now().date_naive();
    info!(run_date = %run_date, channel_id = config.discord.channel_id, "Starting digest agent");

    let http = create_http_client()?;
    let auth = SheetsAuth::resolve(config.sheets.access_token.as_deref()).await?;
    let store = Arc::new(SheetsStore::new(
        SheetsClient::new(http.clone(), &config.sheets.base_url, auth),
        &config.sheets.spreadsheet_id,
    ));
    let chat = Arc::new(DiscordChannel::new(http, config.discord.clone()));

    let report = DigestBot::new(store, chat, config.categories)
        .post(run_date)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to read today's items");
            e
        })?;

    info!(items = report.items, sent = report.sent, failed = report.failed, "Digest agent completed");
    Ok(())
}
