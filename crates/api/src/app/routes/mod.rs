use axum::{routing::get, Router};

pub mod feedback;
pub mod orders;
pub mod signedup;
pub mod system;

/// Router for all staff endpoints (behind the auth middleware).
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/orders", orders::router())
}

/// Endpoints reachable without a staff token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/feedback", feedback::router())
        .nest("/signedup", signedup::router())
}
