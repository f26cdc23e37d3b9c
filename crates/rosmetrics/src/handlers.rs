//! HTTP request handlers: metrics, health and the index page.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

use rosmetrics_core::metrics::CONTENT_TYPE;

use crate::scrape::scrape;
use crate::state::AppState;

// ============================================================
// Metrics
// ============================================================

pub(crate) async fn handle_metrics(State(state): AppState) -> Response {
    match scrape(&state).await {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Index
// ============================================================

pub(crate) async fn handle_index(State(state): AppState) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>RouterOS Exporter</title></head>\n<body>\n\
         <h1>RouterOS Exporter</h1>\n\
         <p>{} devices, {} collectors</p>\n\
         <p><a href=\"{}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        state.devices.len(),
        state.registry.len(),
        state.metrics_path,
    ))
}
