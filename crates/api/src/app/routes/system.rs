use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::StaffContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(staff): Extension<StaffContext>) -> impl IntoResponse {
    let profile = staff.profile();
    Json(serde_json::json!({
        "user_id": staff.user_id().to_string(),
        "full_name": profile.full_name,
        "role": profile.role.as_str(),
        "stores": profile.stores(),
    }))
}
