use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use scribe_auth::Authenticator;

use crate::app::errors;
use crate::app::services::SharedKeyStore;
use crate::context::AuthContext;

pub type AuthState = Authenticator<SharedKeyStore>;

pub async fn auth_middleware(
    State(authenticator): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map(str::to_owned);

    let authenticated = authenticator
        .authenticate(token.as_deref())
        .await
        .map_err(errors::guard_error_to_response)?;

    req.extensions_mut().insert(AuthContext::new(
        authenticated.identity,
        authenticated.claims,
        token.unwrap_or_default(),
    ));

    Ok(next.run(req).await)
}

/// Token from an `Authorization: Bearer <token>` header, if one is present.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
