use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};

use eventhub_auth::{Action, UserContext};
use eventhub_core::EventId;

use crate::app::dto::Acknowledgement;
use crate::app::{AppState, errors};
use crate::middleware::{AuthState, Guard, guarded, public};
use crate::query::{QueryOptions, parse_query_options};

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route(
            "/",
            public(auth, get(list_events).route_layer(from_fn(parse_query_options))),
        )
        .route("/", guarded(auth, Guard::event(Action::Write), post(create_event)))
        .route("/:id", public(auth, get(get_event)))
        .route("/:id", guarded(auth, Guard::event(Action::Write), put(update_event)))
        .route("/:id", guarded(auth, Guard::event(Action::Delete), delete(delete_event)))
        .route(
            "/:id/publish",
            guarded(auth, Guard::event(Action::Publish), post(publish_event)),
        )
        .route(
            "/:id/attendees",
            guarded(auth, Guard::event(Action::ManageAttendees), post(manage_attendees)),
        )
}

fn acknowledge(
    status: StatusCode,
    action: &'static str,
    id: Option<String>,
    ctx: &UserContext,
) -> Response {
    let body = Acknowledgement {
        action,
        resource: "event",
        id,
        actor_id: ctx.user_id.to_string(),
    };
    (status, Json(body)).into_response()
}

pub async fn list_events(
    Extension(query): Extension<QueryOptions>,
    viewer: Option<Extension<UserContext>>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "items": [],
        "page": query.page,
        "limit": query.limit,
        "offset": query.offset(),
        "query": query,
        "viewer_id": viewer.map(|Extension(ctx)| ctx.user_id.to_string()),
    }))
}

pub async fn get_event(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.directory.load_event(&EventId::new(id)).await {
        Ok(Some(event)) => Json(event).into_response(),
        Ok(None) => errors::not_found("event"),
        Err(e) => errors::store_error_response(e),
    }
}

pub async fn create_event(Extension(ctx): Extension<UserContext>) -> Response {
    let id = EventId::generate();
    tracing::info!(event = %id, organizer = %ctx.user_id, "event creation authorized");
    acknowledge(StatusCode::CREATED, "create", Some(id.to_string()), &ctx)
}

pub async fn update_event(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    acknowledge(StatusCode::OK, "update", Some(id), &ctx)
}

pub async fn delete_event(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    tracing::info!(event = %id, caller = %ctx.user_id, "event deletion authorized");
    acknowledge(StatusCode::OK, "delete", Some(id), &ctx)
}

pub async fn publish_event(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    acknowledge(StatusCode::OK, "publish", Some(id), &ctx)
}

pub async fn manage_attendees(
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Response {
    acknowledge(StatusCode::OK, "manage_attendees", Some(id), &ctx)
}
