//! Post and comment write paths. Content itself is not stored; these routes
//! create, address and remove resources so that ownership is recorded and
//! enforced.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, post, put},
};

use scribe_auth::{Permission, PermissionGuard};
use scribe_core::{CommentId, PostId, ResourceId, UserId};

use crate::app::dto::{MessageResponse, ResourceResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::{GuardState, ResourceParam, permission_middleware};
use crate::context::AuthContext;

pub fn router(services: &Arc<AppServices>) -> Router {
    let owned = |permission: Permission, param: ResourceParam| {
        let guard = PermissionGuard::new(permission).with_owner_lookup(services.owners.clone());
        GuardState::new(guard).for_resource(param)
    };
    let plain = |permission: Permission| GuardState::new(PermissionGuard::new(permission));

    let post_id = ResourceParam::Post("post_id");
    let comment_id = ResourceParam::Comment("comment_id");

    Router::new()
        .route(
            "/posts",
            post(create_post).route_layer(from_fn_with_state(
                plain(Permission::CreatePost),
                permission_middleware,
            )),
        )
        .route(
            "/posts/:post_id",
            put(update_post)
                .route_layer(from_fn_with_state(
                    owned(Permission::EditPost, post_id),
                    permission_middleware,
                ))
                .merge(delete(delete_post).route_layer(from_fn_with_state(
                    owned(Permission::DeletePost, post_id),
                    permission_middleware,
                ))),
        )
        .route(
            "/posts/:post_id/comments",
            post(create_comment).route_layer(from_fn_with_state(
                plain(Permission::CreateComment),
                permission_middleware,
            )),
        )
        .route(
            "/comments/:comment_id",
            put(update_comment)
                .route_layer(from_fn_with_state(
                    owned(Permission::EditComment, comment_id),
                    permission_middleware,
                ))
                .merge(delete(delete_comment).route_layer(from_fn_with_state(
                    owned(Permission::DeleteComment, comment_id),
                    permission_middleware,
                ))),
        )
}

fn resource_response(resource: ResourceId, owner_id: UserId) -> Response {
    (StatusCode::OK, Json(ResourceResponse { resource, owner_id })).into_response()
}

/// POST /posts
pub async fn create_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> Response {
    let id = PostId::new();
    let owner = ctx.identity().id;
    if let Err(e) = services.owners.record(id, owner) {
        return errors::lookup_error_to_response(e);
    }
    tracing::info!(post = %id, owner = %owner, "post created");
    resource_response(id.into(), owner)
}

/// PUT /posts/:post_id
pub async fn update_post(
    Extension(services): Extension<Arc<AppServices>>,
    Path(post_id): Path<PostId>,
) -> Response {
    match services.owners.owner(post_id) {
        Ok(Some(owner)) => resource_response(post_id.into(), owner),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Post not found"),
        Err(e) => errors::lookup_error_to_response(e),
    }
}

/// DELETE /posts/:post_id
pub async fn delete_post(
    Extension(services): Extension<Arc<AppServices>>,
    Path(post_id): Path<PostId>,
) -> Response {
    match services.owners.remove(post_id) {
        Ok(Some(_)) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Post deleted successfully",
            }),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Post not found"),
        Err(e) => errors::lookup_error_to_response(e),
    }
}

/// POST /posts/:post_id/comments
pub async fn create_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(post_id): Path<PostId>,
) -> Response {
    match services.owners.owner(post_id) {
        Ok(Some(_)) => {}
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "Post not found"),
        Err(e) => return errors::lookup_error_to_response(e),
    }

    let id = CommentId::new();
    let owner = ctx.identity().id;
    if let Err(e) = services.owners.record(id, owner) {
        return errors::lookup_error_to_response(e);
    }
    tracing::info!(post = %post_id, comment = %id, owner = %owner, "comment created");
    resource_response(id.into(), owner)
}

/// PUT /comments/:comment_id
pub async fn update_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(comment_id): Path<CommentId>,
) -> Response {
    match services.owners.owner(comment_id) {
        Ok(Some(owner)) => resource_response(comment_id.into(), owner),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Comment not found"),
        Err(e) => errors::lookup_error_to_response(e),
    }
}

/// DELETE /comments/:comment_id
pub async fn delete_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(comment_id): Path<CommentId>,
) -> Response {
    match services.owners.remove(comment_id) {
        Ok(Some(_)) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Comment deleted successfully",
            }),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Comment not found"),
        Err(e) => errors::lookup_error_to_response(e),
    }
}
