//! Route-level permission guard.
//!
//! Runs after the bearer middleware (it reads the `AuthContext` that layer
//! inserts) and after routing, so ownership-qualified routes can name the
//! path parameter that identifies the addressed resource.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use scribe_auth::{Permission, PermissionGuard};
use scribe_core::{CommentId, DomainError, ResourceId};

use crate::app::errors;
use crate::context::AuthContext;

/// Path parameter naming the resource a guarded route addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceParam {
    Post(&'static str),
    Comment(&'static str),
}

impl ResourceParam {
    /// `Ok(None)` when the route carries no such parameter.
    fn resolve(&self, params: &HashMap<String, String>) -> Result<Option<ResourceId>, DomainError> {
        let resource = match self {
            ResourceParam::Post(name) => params
                .get(*name)
                .map(|raw| raw.parse().map(ResourceId::Post))
                .transpose()?,
            ResourceParam::Comment(name) => params
                .get(*name)
                .map(|raw| raw.parse::<CommentId>().map(ResourceId::Comment))
                .transpose()?,
        };
        Ok(resource)
    }
}

/// State for [`permission_middleware`]: one guard and, for ownership-qualified
/// permissions, where to find the resource id.
#[derive(Clone)]
pub struct GuardState {
    guard: PermissionGuard,
    resource: Option<ResourceParam>,
}

impl GuardState {
    pub fn new(guard: PermissionGuard) -> Self {
        Self {
            guard,
            resource: None,
        }
    }

    pub fn for_resource(mut self, param: ResourceParam) -> Self {
        self.resource = Some(param);
        self
    }

    pub fn permission(&self) -> Permission {
        self.guard.permission()
    }
}

pub async fn permission_middleware(
    State(state): State<GuardState>,
    params: Option<Path<HashMap<String, String>>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let identity = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| *ctx.identity())
        .ok_or_else(|| errors::unauthorized("Not authenticated"))?;

    let resource = match (state.resource, params) {
        (Some(param), Some(Path(params))) => param.resolve(&params).map_err(|e| {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        })?,
        _ => None,
    };

    state
        .guard
        .enforce(&identity, resource)
        .await
        .map_err(errors::guard_error_to_response)?;

    Ok(next.run(req).await)
}
