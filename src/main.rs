use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use frontdesk::config::AppConfig;
use frontdesk::handlers;
use frontdesk::services::ai::openai::OpenAiProvider;
use frontdesk::services::calendar::google::GoogleCalendarProvider;
use frontdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(!config.calendar_id.is_empty(), "CALENDAR_ID must be set");
    anyhow::ensure!(!config.calendar_token.is_empty(), "CALENDAR_TOKEN must be set");
    anyhow::ensure!(!config.openai_api_key.is_empty(), "OPENAI_API_KEY must be set");

    let calendar =
        GoogleCalendarProvider::new(config.calendar_token.clone(), config.calendar_id.clone())?;
    let llm = OpenAiProvider::new(config.openai_api_key.clone(), config.openai_model.clone())?;

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        calendar: Box::new(calendar),
        llm: Box::new(llm),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook", post(handlers::webhook::webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
