use std::sync::Arc;

use axum::{Router, routing::post};

use crate::app::services::AppServices;

pub mod auth;
pub mod posts;
pub mod system;
pub mod users;

/// Router for endpoints that require a verified bearer token.
pub fn protected(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/auth/test-token", post(auth::test_token))
        .nest("/users", users::router())
        .merge(posts::router(services))
}

/// Router for endpoints reachable without a token.
pub fn public() -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
}
