// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::console_api::ConsoleApi;
use crate::application::loader::{LoadOutcome, fetch_console_data};
use crate::application::session::{ConsoleSession, SessionConfig};
use crate::infrastructure::config::load_console_config;
use crate::infrastructure::log_renderer::LogRenderer;
use crate::infrastructure::pandora_api::PandoraApi;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_console_config()?;

    // Create API client (infrastructure layer)
    let api: Arc<dyn ConsoleApi> = Arc::new(PandoraApi::new(&config.base_url));

    // Initial console data
    let data = match fetch_console_data(api.clone(), config.console_id).await {
        LoadOutcome::Loaded(data) => data.decode()?,
        LoadOutcome::Failed(e) => return Err(e.into()),
        LoadOutcome::Aborted => anyhow::bail!("Initial console load was aborted"),
    };

    // Start the session (application layer)
    let session = ConsoleSession::create(
        api,
        LogRenderer::default(),
        data.properties,
        Value::Array(data.items),
        SessionConfig {
            update_interval: config.update_interval(),
            on_update: Some(Box::new(|previous, current| {
                let (before, after) = (console_name(previous), console_name(current));
                tracing::info!(target: "visual_console", "Console updated: {} -> {}", before, after);
            })),
        },
    )
    .context("Failed to create the visual console session")?;

    // Build router (presentation layer)
    let app = router(Arc::new(AppState { session })).layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("Starting visual console client on {}", config.listen_addr);
    axum::serve(tokio::net::TcpListener::bind(config.listen_addr).await?, app).await?;

    Ok(())
}

/// Display name of a console, `null` when the properties carry none
fn console_name(props: &Value) -> Value {
    props.get("name").cloned().unwrap_or_default()
}
