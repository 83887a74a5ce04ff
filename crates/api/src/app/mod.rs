//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: token service, revocation store, account collaborators
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Protected routes: require a verified, unrevoked bearer token.
    let protected = routes::protected(&services).layer(axum::middleware::from_fn_with_state(
        services.authenticator.clone(),
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public())
        .merge(protected)
        .layer(Extension(services))
}

pub use services::AppServices;
