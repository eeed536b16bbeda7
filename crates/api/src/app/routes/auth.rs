//! Session endpoints: login, rotation, status, logout.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use eventhub_auth::{Role, TokenError, TokenPair, UserContext};
use eventhub_core::{RefreshSession, UserId, UserRecord};

use crate::app::dto::{LoginRequest, RefreshRequest, TokenStatusRequest, TokenStatusResponse};
use crate::app::{AppState, errors};
use crate::context::AuditActor;
use crate::middleware::{AuthState, authenticated};

pub fn router(auth: &AuthState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/token-status", post(token_status))
        .route("/logout", authenticated(auth, post(logout)))
        .route("/me", authenticated(auth, get(me)))
}

fn invalid_credentials() -> Response {
    errors::json_error(
        StatusCode::UNAUTHORIZED,
        "invalid_credentials",
        "invalid email or password",
    )
}

fn inactive_account() -> Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "account is inactive")
}

/// Reload a user that a credential or token pointed at; it must still exist and be active.
async fn load_active_user(state: &AppState, user_id: &UserId) -> Result<UserRecord, Response> {
    match state.directory.load_user(user_id).await {
        Ok(Some(user)) if user.is_active => Ok(user),
        Ok(Some(_)) => Err(inactive_account()),
        Ok(None) => Err(invalid_credentials()),
        Err(e) => Err(errors::store_error_response(e)),
    }
}

/// Persist the refresh half of `pair` and answer with the pair.
async fn start_session(state: &AppState, user_id: &UserId, pair: TokenPair) -> Response {
    let session = RefreshSession {
        token_id: pair.refresh_token_id.clone(),
        user_id: user_id.clone(),
        expires_at: pair.refresh_expires_at,
    };
    if let Err(e) = state.sessions.record_refresh_token(session).await {
        return errors::store_error_response(e);
    }

    let mut res = (StatusCode::OK, Json(pair)).into_response();
    res.extensions_mut().insert(AuditActor(user_id.clone()));
    res
}

pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return errors::validation_error("email and password are required");
    }

    let user_id = match state.credentials.verify_password(&email, &body.password).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            tracing::info!("login rejected");
            return invalid_credentials();
        }
        Err(e) => return errors::store_error_response(e),
    };

    let user = match load_active_user(&state, &user_id).await {
        Ok(user) => user,
        Err(res) => return res,
    };

    let role = match user.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(user = %user.id, error = %e, "stored role is not recognised");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_role",
                "account role is misconfigured",
            );
        }
    };

    let pair = match state.tokens.issue_token_pair(&user.id, &user.email, role) {
        Ok(pair) => pair,
        Err(e) => return errors::token_error_response(e),
    };

    tracing::info!(user = %user.id, role = %role, "login succeeded");
    start_session(&state, &user.id, pair).await
}

pub async fn refresh(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Response {
    if body.refresh_token.is_empty() {
        return errors::token_error_response(TokenError::MissingField("refresh_token"));
    }

    let claims = match state.tokens.validate_refresh_token(&body.refresh_token) {
        Ok(claims) => claims,
        Err(e) => return errors::token_error_response(TokenError::Refresh(Box::new(e))),
    };

    match state.sessions.consume_refresh_token(&claims.token_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(user = %claims.subject, "refresh token reuse or revoked session");
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "refresh token is no longer valid",
            );
        }
        Err(e) => return errors::store_error_response(e),
    }

    let user = match load_active_user(&state, &claims.subject).await {
        Ok(user) => user,
        Err(res) => return res,
    };

    // Rotation keeps the signed role, so it must still match the stored one.
    if user.role.parse::<Role>().ok() != Some(claims.role) {
        tracing::info!(
            user = %user.id,
            token_role = %claims.role,
            "refresh rejected after role change"
        );
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "session role is out of date; log in again",
        );
    }

    let pair = match state.tokens.refresh_token_pair(&body.refresh_token) {
        Ok(pair) => pair,
        Err(e) => return errors::token_error_response(e),
    };

    tracing::debug!(user = %user.id, "session rotated");
    start_session(&state, &user.id, pair).await
}

pub async fn token_status(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<TokenStatusRequest>,
) -> Json<TokenStatusResponse> {
    let expires_at = state
        .tokens
        .peek_claims(&body.token)
        .ok()
        .map(|claims| claims.expires_at);
    let expired = state.tokens.is_token_expired(&body.token).unwrap_or(true);

    Json(TokenStatusResponse {
        valid: expires_at.is_some(),
        expired,
        expires_at,
    })
}

pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
) -> Response {
    match state.sessions.revoke_user_sessions(&ctx.user_id).await {
        Ok(revoked) => {
            tracing::info!(user = %ctx.user_id, revoked, "logged out");
            Json(serde_json::json!({ "revoked_sessions": revoked })).into_response()
        }
        Err(e) => errors::store_error_response(e),
    }
}

pub async fn me(Extension(ctx): Extension<UserContext>) -> Json<UserContext> {
    Json(ctx)
}
