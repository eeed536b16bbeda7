//! Request guard pipeline.
//!
//! Stages run strictly in composition order and abort on the first failure:
//! bearer extraction → access-token validation → active user reload →
//! caller context → (query options) → (resource guard).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use thiserror::Error;

use eventhub_auth::{
    AccessDecisionEngine, Action, BearerError, Permission, Requirement, Resource, Role,
    TokenError, TokenManager, UserContext, extract_bearer_token,
};
use eventhub_core::Directory;

use crate::app::errors::json_error;
use crate::context::{AuditActor, AuditTarget};

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenManager>,
    pub directory: Arc<dyn Directory>,
    pub engine: Arc<AccessDecisionEngine>,
}

/// Terminal rejection of a guard stage.
#[derive(Debug, Error)]
pub enum GuardRejection {
    #[error("{0}")]
    Bearer(BearerError),

    #[error("{0}")]
    Token(TokenError),

    #[error("user not found")]
    UnknownUser,

    #[error("account is inactive")]
    InactiveAccount,

    #[error("authentication could not be completed")]
    Unverifiable,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    InsufficientRole(String),

    #[error("{0}")]
    InvalidQuery(String),
}

impl GuardRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardRejection::AccessDenied(_) | GuardRejection::InsufficientRole(_) => {
                StatusCode::FORBIDDEN
            }
            GuardRejection::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GuardRejection::Bearer(BearerError::MissingHeader | BearerError::EmptyToken) => {
                "missing_token"
            }
            GuardRejection::Bearer(BearerError::InvalidScheme) => "invalid_token",
            GuardRejection::Token(e) => e.code(),
            GuardRejection::UnknownUser
            | GuardRejection::InactiveAccount
            | GuardRejection::Unverifiable
            | GuardRejection::AuthenticationRequired => "unauthorized",
            GuardRejection::AccessDenied(_) => "access_denied",
            GuardRejection::InsufficientRole(_) => "insufficient_role",
            GuardRejection::InvalidQuery(_) => "invalid_query",
        }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        json_error(self.status(), self.code(), self.to_string())
    }
}

/// A present but non-text header is a malformed credential, not a missing one.
fn authorization_header(req: &Request) -> Result<Option<String>, GuardRejection> {
    req.headers()
        .get(AUTHORIZATION)
        .map(|v| {
            v.to_str()
                .map(str::to_string)
                .map_err(|_| GuardRejection::Bearer(BearerError::InvalidScheme))
        })
        .transpose()
}

/// Run the authentication stages and build the caller context.
pub async fn authenticate(
    auth: &AuthState,
    header: Option<&str>,
) -> Result<UserContext, GuardRejection> {
    let token = extract_bearer_token(header.unwrap_or("")).map_err(GuardRejection::Bearer)?;

    let claims = auth
        .tokens
        .validate_access_token(token)
        .map_err(GuardRejection::Token)?;

    let user = match auth.directory.load_user(&claims.subject).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(GuardRejection::UnknownUser),
        Err(e) => {
            tracing::warn!(error = %e, subject = %claims.subject, "user reload failed");
            return Err(GuardRejection::Unverifiable);
        }
    };
    if !user.is_active {
        return Err(GuardRejection::InactiveAccount);
    }

    Ok(UserContext::build(&claims, &user))
}

pub async fn require_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = authorization_header(&req);
    let authenticated = match header {
        Ok(header) => authenticate(&auth, header.as_deref()).await,
        Err(rejection) => Err(rejection),
    };
    let ctx = match authenticated {
        Ok(ctx) => ctx,
        Err(rejection) => {
            tracing::debug!(code = rejection.code(), "authentication rejected");
            return rejection.into_response();
        }
    };

    let actor = AuditActor(ctx.user_id.clone());
    req.extensions_mut().insert(ctx);

    let mut res = next.run(req).await;
    res.extensions_mut().insert(actor);
    res
}

/// Like [`require_auth`], but any failure continues the request anonymously.
pub async fn optional_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = authorization_header(&req);
    let authenticated = match header {
        Ok(None) => return next.run(req).await,
        Ok(Some(header)) => authenticate(&auth, Some(header.as_str())).await,
        Err(rejection) => Err(rejection),
    };

    match authenticated {
        Ok(ctx) => {
            let actor = AuditActor(ctx.user_id.clone());
            req.extensions_mut().insert(ctx);
            let mut res = next.run(req).await;
            res.extensions_mut().insert(actor);
            res
        }
        Err(rejection) => {
            tracing::debug!(code = rejection.code(), "optional authentication skipped");
            next.run(req).await
        }
    }
}

/// Access requirement of a route plus where its resource id comes from.
///
/// When `id_param` is absent from the matched route the request is treated
/// as a creation intent (empty resource id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub requirement: Requirement,
    pub id_param: Option<&'static str>,
}

impl Guard {
    pub fn resource(permission: Permission, id_param: &'static str) -> Self {
        Self {
            requirement: Requirement::Permission(permission),
            id_param: Some(id_param),
        }
    }

    pub fn event(action: Action) -> Self {
        Self::resource(Permission::new(Resource::Event, action), "id")
    }

    pub fn organization(action: Action) -> Self {
        Self::resource(Permission::new(Resource::Organization, action), "id")
    }

    pub fn user(action: Action) -> Self {
        Self::resource(Permission::new(Resource::User, action), "id")
    }

    pub fn read_only(resource: Resource) -> Self {
        Self::resource(Permission::new(resource, Action::Read), "id")
    }

    pub fn roles(roles: &'static [Role]) -> Self {
        Self {
            requirement: Requirement::AnyRole(roles),
            id_param: None,
        }
    }

    pub fn admin_only() -> Self {
        Self::roles(&[Role::Admin])
    }
}

#[derive(Clone)]
pub struct GuardState {
    pub auth: AuthState,
    pub guard: Guard,
}

/// Authorize the authenticated caller against the route's [`Guard`].
pub async fn guard_access(
    State(state): State<GuardState>,
    params: Option<Path<HashMap<String, String>>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ctx) = req.extensions().get::<UserContext>().cloned() else {
        return GuardRejection::AuthenticationRequired.into_response();
    };

    let resource_id = match (state.guard.id_param, params) {
        (Some(name), Some(Path(params))) => params.get(name).cloned().unwrap_or_default(),
        _ => String::new(),
    };

    let decision = state
        .auth
        .engine
        .authorize_requirement(&ctx, state.guard.requirement, &resource_id)
        .await;

    let mut res = if decision.allowed {
        next.run(req).await
    } else {
        let reason = decision
            .reason
            .unwrap_or_else(|| "access denied".to_string());
        match state.guard.requirement {
            Requirement::AnyRole(_) => GuardRejection::InsufficientRole(reason),
            Requirement::Permission(_) => GuardRejection::AccessDenied(reason),
        }
        .into_response()
    };

    if !resource_id.is_empty() {
        res.extensions_mut().insert(AuditTarget(Some(resource_id)));
    }
    res
}

/// Route that requires an authenticated caller.
pub fn authenticated(auth: &AuthState, route: MethodRouter) -> MethodRouter {
    route.route_layer(from_fn_with_state(auth.clone(), require_auth))
}

/// Route that requires an authenticated caller satisfying `guard`.
pub fn guarded(auth: &AuthState, guard: Guard, route: MethodRouter) -> MethodRouter {
    let state = GuardState {
        auth: auth.clone(),
        guard,
    };
    authenticated(auth, route.route_layer(from_fn_with_state(state, guard_access)))
}

/// Route that serves anonymous callers but recognizes authenticated ones.
pub fn public(auth: &AuthState, route: MethodRouter) -> MethodRouter {
    route.route_layer(from_fn_with_state(auth.clone(), optional_auth))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{self, HeaderValue};
    use eventhub_auth::permissions::EVENT_WRITE;

    use super::*;

    #[test]
    fn event_guard_reads_the_id_parameter() {
        let guard = Guard::event(Action::Write);
        assert_eq!(guard.requirement, Requirement::Permission(EVENT_WRITE));
        assert_eq!(guard.id_param, Some("id"));
    }

    #[test]
    fn admin_only_is_a_role_requirement() {
        assert_eq!(
            Guard::admin_only().requirement,
            Requirement::AnyRole(&[Role::Admin])
        );
    }

    #[test]
    fn non_text_authorization_header_is_an_invalid_token() {
        let req = http::Request::builder()
            .header(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap())
            .body(Body::empty())
            .unwrap();
        let rejection = authorization_header(&req).unwrap_err();
        assert_eq!(rejection.code(), "invalid_token");
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);

        let req = http::Request::builder().body(Body::empty()).unwrap();
        assert!(authorization_header(&req).unwrap().is_none());

        let req = http::Request::builder()
            .header(AUTHORIZATION, "Bearer abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(authorization_header(&req).unwrap().as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn rejections_map_to_stable_codes() {
        let cases = [
            (
                GuardRejection::Bearer(BearerError::MissingHeader),
                StatusCode::UNAUTHORIZED,
                "missing_token",
            ),
            (
                GuardRejection::Token(TokenError::ExpiredToken),
                StatusCode::UNAUTHORIZED,
                "expired_token",
            ),
            (
                GuardRejection::Token(TokenError::InvalidTokenType {
                    expected: eventhub_auth::TokenKind::Access,
                }),
                StatusCode::UNAUTHORIZED,
                "invalid_token_type",
            ),
            (
                GuardRejection::InactiveAccount,
                StatusCode::UNAUTHORIZED,
                "unauthorized",
            ),
            (
                GuardRejection::AccessDenied("no".into()),
                StatusCode::FORBIDDEN,
                "access_denied",
            ),
            (
                GuardRejection::InsufficientRole("no".into()),
                StatusCode::FORBIDDEN,
                "insufficient_role",
            ),
            (
                GuardRejection::InvalidQuery("bad".into()),
                StatusCode::BAD_REQUEST,
                "invalid_query",
            ),
        ];

        for (rejection, status, code) in cases {
            assert_eq!(rejection.status(), status);
            assert_eq!(rejection.code(), code);
        }
    }
}
