//! Account administration. Every route here requires `manage_users`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};

use scribe_auth::{Permission, PermissionGuard};
use scribe_core::UserId;

use crate::app::dto::{ActiveUpdateRequest, RoleUpdateRequest, UserResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::{GuardState, permission_middleware};
use crate::context::AuthContext;

pub fn router() -> Router {
    let guard = GuardState::new(PermissionGuard::new(Permission::ManageUsers));

    Router::new()
        .route("/", get(list_users))
        .route("/:user_id/role", put(update_role))
        .route("/:user_id/active", put(update_active))
        .route_layer(axum::middleware::from_fn_with_state(guard, permission_middleware))
}

/// GET /users
pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.users.list() {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(users)).into_response()
        }
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// PUT /users/:user_id/role
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(user_id): Path<UserId>,
    Json(body): Json<RoleUpdateRequest>,
) -> Response {
    match services.users.change_role(ctx.identity(), user_id, body.role) {
        Ok(record) => (StatusCode::OK, Json(UserResponse::from(record))).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

/// PUT /users/:user_id/active
pub async fn update_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(user_id): Path<UserId>,
    Json(body): Json<ActiveUpdateRequest>,
) -> Response {
    match services.users.set_active(ctx.identity(), user_id, body.active) {
        Ok(record) => (StatusCode::OK, Json(UserResponse::from(record))).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}
