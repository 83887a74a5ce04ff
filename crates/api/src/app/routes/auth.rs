use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use scribe_auth::RevokeOutcome;
use scribe_infra::directory::NewUser;

use crate::app::dto::{LoginRequest, MessageResponse, RegisterRequest, TokenResponse, UserResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::AuthContext;
use crate::middleware::extract_bearer;

/// POST /auth/register - self-service signup; always creates a reader.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let mut new_user = NewUser::new(body.email, body.password);
    if let Some(name) = body.full_name {
        new_user = new_user.with_full_name(name);
    }

    match services.users.register(new_user) {
        Ok(record) => (StatusCode::OK, Json(UserResponse::from(record))).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// POST /auth/login - exchange email and password for an access token.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let user = match services.users.authenticate(&body.email, &body.password) {
        Ok(user) => user,
        Err(e) => return errors::directory_error_to_response(e),
    };

    let mut extra = Map::new();
    extra.insert("role".to_string(), Value::from(user.role.as_str()));

    match services.tokens.issue(&user.email, None, extra) {
        Ok(token) => {
            tracing::info!(user = %user.id, "login succeeded");
            (StatusCode::OK, Json(TokenResponse::bearer(token))).into_response()
        }
        Err(e) => errors::token_error_to_response(e),
    }
}

/// POST /auth/logout - revoke the presented bearer token.
///
/// Revoking an already revoked or already expired token succeeds.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = extract_bearer(&headers) else {
        return errors::unauthorized("Not authenticated");
    };

    match services.tokens.revoke(token).await {
        Ok(outcome) => {
            if outcome == RevokeOutcome::AlreadyExpired {
                tracing::debug!("logout with an expired token");
            }
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Successfully logged out",
                }),
            )
                .into_response()
        }
        Err(e) => errors::revoke_error_to_response(e),
    }
}

/// POST /auth/test-token - the account behind the presented token.
pub async fn test_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> Response {
    match services.users.get(ctx.identity().id) {
        Ok(Some(record)) => (StatusCode::OK, Json(UserResponse::from(record))).into_response(),
        Ok(None) => errors::unauthorized("Could not validate credentials"),
        Err(e) => errors::directory_error_to_response(e),
    }
}
