use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use terminal_auth::JwtValidator;
use terminal_infra::workflows::AppServices;

use crate::context::StaffContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub services: Arc<AppServices>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        StatusCode::UNAUTHORIZED
    })?;

    let profile = state
        .services
        .staff_profile(&claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %claims.sub, "staff lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        // Valid token, but the subject is not (or no longer) staff.
        .ok_or(StatusCode::FORBIDDEN)?;

    tracing::debug!(user_id = %profile.user_id, role = profile.role.as_str(), "authenticated");
    req.extensions_mut().insert(StaffContext::new(profile));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
