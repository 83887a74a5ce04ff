use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use scribe_auth::{
    GuardError, LookupError, PasswordError, RevokeError, TokenError, UnauthorizedReason,
};
use scribe_core::DomainError;
use scribe_infra::directory::DirectoryError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 401 with the bearer challenge header.
pub fn unauthorized(message: impl Into<String>) -> Response {
    let mut response = json_error(StatusCode::UNAUTHORIZED, "unauthorized", message);
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

fn token_error_message(err: &TokenError) -> &'static str {
    match err {
        TokenError::Revoked => "Token has been invalidated",
        TokenError::Expired => "Token has expired",
        _ => "Could not validate credentials",
    }
}

pub fn guard_error_to_response(err: GuardError) -> Response {
    match err {
        GuardError::Unauthorized(UnauthorizedReason::Token(token)) => {
            unauthorized(token_error_message(&token))
        }
        GuardError::Unauthorized(_) => unauthorized("Could not validate credentials"),
        GuardError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
        GuardError::Infrastructure(msg) => {
            tracing::error!(error = %msg, "authorization dependency unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "authorization backend unavailable",
            )
        }
    }
}

pub fn token_error_to_response(err: TokenError) -> Response {
    match err {
        err @ (TokenError::Signing(_) | TokenError::TtlOutOfRange) => {
            tracing::error!(error = %err, "failed to issue access token");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "could not issue token",
            )
        }
        other => guard_error_to_response(other.into()),
    }
}

pub fn revoke_error_to_response(err: RevokeError) -> Response {
    match err {
        RevokeError::InvalidCredential(_) => unauthorized("Invalid token"),
        RevokeError::Store(e) => {
            tracing::error!(error = %e, "revocation store unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "revocation backend unavailable",
            )
        }
    }
}

pub fn directory_error_to_response(err: DirectoryError) -> Response {
    match err {
        DirectoryError::InvalidCredentials => unauthorized("Incorrect email or password"),
        DirectoryError::Inactive => json_error(StatusCode::BAD_REQUEST, "inactive_user", "Inactive user"),
        DirectoryError::Forbidden(e) => json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
        DirectoryError::Domain(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "User not found")
        }
        DirectoryError::Domain(DomainError::Conflict(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "conflict", msg)
        }
        DirectoryError::Domain(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        DirectoryError::Password(PasswordError::Empty) => json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            PasswordError::Empty.to_string(),
        ),
        DirectoryError::Password(e) => {
            tracing::error!(error = %e, "password hashing failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "could not process password",
            )
        }
        DirectoryError::Poisoned => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "user directory unavailable",
        ),
    }
}

pub fn lookup_error_to_response(err: LookupError) -> Response {
    tracing::error!(error = %err, "owner registry unavailable");
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "service_unavailable",
        "owner registry unavailable",
    )
}
