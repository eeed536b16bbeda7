//! HTTP application wiring (axum router + collaborator wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{Extension, Router, middleware::from_fn_with_state, routing::get};
use tower::ServiceBuilder;

use eventhub_auth::{AccessDecisionEngine, TokenManager};
use eventhub_core::{
    AuditSink, CredentialStore, Directory, InMemoryAuditSink, InMemoryCredentialStore,
    InMemoryDirectory, InMemorySessionStore, SessionStore,
};

use crate::audit::{AuditQueue, AuditState, record_audit};
use crate::config::ApiConfig;
use crate::middleware::AuthState;

pub mod dto;
pub mod errors;
pub mod routes;

/// External collaborators the API is wired against.
#[derive(Clone)]
pub struct Services {
    pub directory: Arc<dyn Directory>,
    pub sessions: Arc<dyn SessionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub audit_sink: Arc<dyn AuditSink>,
}

impl Services {
    /// Empty in-memory collaborators (dev mode).
    pub fn in_memory() -> Self {
        Self {
            directory: Arc::new(InMemoryDirectory::new()),
            sessions: Arc::new(InMemorySessionStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            audit_sink: Arc::new(InMemoryAuditSink::new()),
        }
    }
}

/// Shared state handed to handlers through `Extension<Arc<AppState>>`.
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub directory: Arc<dyn Directory>,
    pub sessions: Arc<dyn SessionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub audit: AuditQueue,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must be called inside a tokio runtime; the audit writer is spawned here.
pub fn build_app(config: &ApiConfig, services: Services) -> anyhow::Result<Router> {
    let tokens = Arc::new(
        TokenManager::new(config.tokens.clone()).context("invalid token configuration")?,
    );
    let engine = Arc::new(AccessDecisionEngine::new(services.directory.clone()));

    let auth = AuthState {
        tokens: tokens.clone(),
        directory: services.directory.clone(),
        engine,
    };

    let (audit, _writer) = AuditQueue::spawn(services.audit_sink, config.audit_queue_capacity);
    let audit_state = AuditState {
        queue: audit.clone(),
        critical: config.critical_routes.clone().into(),
    };

    let state = Arc::new(AppState {
        tokens,
        directory: services.directory,
        sessions: services.sessions,
        credentials: services.credentials,
        audit,
    });

    tracing::info!(
        issuer = %state.tokens.issuer(),
        audit_capacity = config.audit_queue_capacity,
        "api wired"
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(&auth))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(audit_state, record_audit))
                .layer(Extension(state)),
        ))
}
