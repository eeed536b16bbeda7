use axum::Router;

use crate::middleware::AuthState;

pub mod admin;
pub mod auth;
pub mod events;
pub mod organizations;
pub mod system;
pub mod users;

/// Router for every endpoint except `/health`. Guards are attached per route.
pub fn router(auth_state: &AuthState) -> Router {
    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/events", events::router(auth_state))
        .nest("/organizations", organizations::router(auth_state))
        .nest("/users", users::router(auth_state))
        .nest("/admin", admin::router(auth_state))
}
