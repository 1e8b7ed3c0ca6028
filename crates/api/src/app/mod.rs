//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage, marketplace client and seed data wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: query/body DTOs and their parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use terminal_infra::workflows::AppServices;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around already wired services.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let jwt = Arc::new(terminal_auth::Hs256JwtValidator::new(
        services.config.jwt_secret.clone().into_bytes(),
    ));
    let auth_state = middleware::AuthState {
        jwt,
        services: services.clone(),
    };

    // Protected routes: require a token whose subject is known staff.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let public = routes::public_router().layer(Extension(services));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new())
}
