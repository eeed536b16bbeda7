use std::sync::Arc;

use axum::{Json, Router, extract::Extension, routing::get};

use eventhub_auth::{Role, capabilities};

use crate::app::AppState;
use crate::middleware::{AuthState, Guard, guarded};

pub fn router(auth: &AuthState) -> Router {
    Router::new().route("/stats", guarded(auth, Guard::admin_only(), get(stats)))
}

pub async fn stats(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let roles: serde_json::Map<String, serde_json::Value> = Role::ALL
        .iter()
        .map(|role| (role.as_str().to_string(), serde_json::json!(capabilities(*role))))
        .collect();

    Json(serde_json::json!({
        "roles": roles,
        "audit_dropped_entries": state.audit.dropped(),
    }))
}
