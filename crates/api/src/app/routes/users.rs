use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};

use eventhub_auth::{Action, Role, UserContext, validate_role_transition};
use eventhub_core::{UserId, UserRecord};

use crate::app::dto::{Acknowledgement, RoleChangeRequest};
use crate::app::{AppState, errors};
use crate::context::AuditTarget;
use crate::middleware::{AuthState, Guard, guarded};

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route("/:id", guarded(auth, Guard::user(Action::Read), get(get_user)))
        .route("/:id", guarded(auth, Guard::user(Action::Write), put(update_user)))
        .route(
            "/:id/role",
            guarded(auth, Guard::roles(&[Role::Admin, Role::Organizer]), put(change_role)),
        )
}

pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.directory.load_user(&UserId::new(id)).await {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => errors::not_found("user"),
        Err(e) => errors::store_error_response(e),
    }
}

pub async fn update_user(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    let body = Acknowledgement {
        action: "update",
        resource: "user",
        id: Some(id),
        actor_id: ctx.user_id.to_string(),
    };
    Json(body).into_response()
}

fn in_caller_organization(ctx: &UserContext, user: &UserRecord) -> bool {
    matches!(
        (&ctx.organization_id, &user.organization_id),
        (Some(caller), Some(target)) if caller == target
    )
}

pub async fn change_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<RoleChangeRequest>,
) -> Response {
    let target = match body.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => return errors::validation_error(e.to_string()),
    };

    let user = match state.directory.load_user(&UserId::new(id.as_str())).await {
        Ok(user) => user,
        Err(e) => return errors::store_error_response(e),
    };

    // Non-admins only reach users of their own organization; a missing user
    // and a foreign one are indistinguishable to them.
    let user = match user {
        Some(user) if ctx.is_admin() || in_caller_organization(&ctx, &user) => user,
        None if ctx.is_admin() => return errors::not_found("user"),
        _ => {
            let mut res = errors::json_error(
                StatusCode::FORBIDDEN,
                "access_denied",
                "you can only manage users in your own organization",
            );
            res.extensions_mut().insert(AuditTarget(Some(id)));
            return res;
        }
    };
    let current = user.role.parse::<Role>().ok();

    let mut res = match validate_role_transition(ctx.role, current, target) {
        Ok(()) => {
            tracing::info!(
                caller = %ctx.user_id,
                user = %user.id,
                from = ?current,
                to = %target,
                "role change authorized"
            );
            Json(serde_json::json!({
                "id": user.id,
                "previous_role": current,
                "role": target,
            }))
            .into_response()
        }
        Err(e) => errors::json_error(StatusCode::FORBIDDEN, "insufficient_role", e.to_string()),
    };
    res.extensions_mut().insert(AuditTarget(Some(id)));
    res
}
