// HTTP request handlers
use crate::domain::link::{ClickDisposition, ItemLink};
use crate::presentation::app_state::AppState;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub disposition: ClickDisposition,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/console", get(get_console))
        .route("/console/click", post(click_item))
        .route("/console/updates/stop", post(stop_updates))
        .route("/console/updates/start", post(start_updates))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current state of the live console
pub async fn get_console(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.session.snapshot().await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Deliver a click on a console item
pub async fn click_item(
    State(state): State<Arc<AppState>>,
    Json(link): Json<ItemLink>,
) -> Json<ClickResponse> {
    Json(ClickResponse {
        disposition: state.session.click(&link),
    })
}

pub async fn stop_updates(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.stop_updates();
    StatusCode::NO_CONTENT
}

pub async fn start_updates(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.start_updates();
    StatusCode::NO_CONTENT
}
