//! Inbound calls from the marketplace, authenticated by the shared API key
//! carried in the body.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use terminal_infra::workflows::{AppServices, StatusCallback};

use crate::app::errors;

pub fn router() -> Router {
    Router::new().route("/status", post(status_callback))
}

pub async fn status_callback(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<StatusCallback>,
) -> axum::response::Response {
    let order_id = body.order_id;
    match services.marketplace_callback(body, Utc::now()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "marketplace callback rejected");
            errors::workflow_error_to_response(e)
        }
    }
}
