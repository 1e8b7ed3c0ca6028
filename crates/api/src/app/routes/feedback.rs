//! Customer feedback page. Public: the link is sent to the customer.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use terminal_core::OrderId;
use terminal_infra::workflows::{AppServices, FeedbackInput};

use crate::app::errors;

pub fn router() -> Router {
    Router::new().route("/:order_id", get(feedback_view).post(submit_feedback))
}

pub async fn feedback_view(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    let order_id = match order_id.parse::<OrderId>() {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };
    match services.feedback_view(order_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn submit_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
    Json(body): Json<FeedbackInput>,
) -> axum::response::Response {
    let order_id = match order_id.parse::<OrderId>() {
        Ok(id) => id,
        Err(e) => return errors::bad_request(e),
    };
    match services.submit_feedback(order_id, body, Utc::now()).await {
        Ok(success) => (StatusCode::OK, Json(json!({ "success": success }))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
