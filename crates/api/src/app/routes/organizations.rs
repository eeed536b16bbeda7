use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use eventhub_auth::{Action, Resource, UserContext};
use eventhub_core::OrganizationId;

use crate::app::dto::Acknowledgement;
use crate::middleware::{AuthState, Guard, guarded};

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route(
            "/",
            guarded(auth, Guard::organization(Action::Write), post(create_organization)),
        )
        .route(
            "/:id",
            guarded(auth, Guard::read_only(Resource::Organization), get(get_organization)),
        )
        .route(
            "/:id",
            guarded(auth, Guard::organization(Action::Write), put(update_organization)),
        )
}

fn acknowledge(
    status: StatusCode,
    action: &'static str,
    id: String,
    ctx: &UserContext,
) -> Response {
    let body = Acknowledgement {
        action,
        resource: "organization",
        id: Some(id),
        actor_id: ctx.user_id.to_string(),
    };
    (status, Json(body)).into_response()
}

pub async fn create_organization(Extension(ctx): Extension<UserContext>) -> Response {
    let id = OrganizationId::generate();
    tracing::info!(organization = %id, caller = %ctx.user_id, "organization creation authorized");
    acknowledge(StatusCode::CREATED, "create", id.to_string(), &ctx)
}

pub async fn get_organization(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    acknowledge(StatusCode::OK, "read", id, &ctx)
}

pub async fn update_organization(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    acknowledge(StatusCode::OK, "update", id, &ctx)
}
