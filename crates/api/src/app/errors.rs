use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use terminal_core::DomainError;
use terminal_infra::workflows::WorkflowError;

pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    match err {
        WorkflowError::Forbidden(msg) => {
            tracing::debug!(reason = %msg, "forbidden");
            json_error(StatusCode::FORBIDDEN, "forbidden", msg)
        }
        WorkflowError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        WorkflowError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        WorkflowError::Rejected(msg) => json_error(StatusCode::BAD_REQUEST, "rejected", msg),
        WorkflowError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        WorkflowError::Upstream(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "upstream_error", msg),
        WorkflowError::Repository(e) => {
            tracing::error!(error = %e, "repository failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        WorkflowError::Export(e) => {
            tracing::error!(error = %e, "export failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "export_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed path/query values.
pub fn bad_request(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
}
