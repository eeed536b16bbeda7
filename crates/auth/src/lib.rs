//! `eventhub-auth`: authentication and authorization core.
//!
//! Token issuance/validation, the static role → permission table and the
//! access decision engine. This crate is decoupled from HTTP; storage is only
//! reached through the injected [`eventhub_core::Directory`].

pub mod claims;
pub mod context;
pub mod decision;
pub mod permissions;
pub mod roles;
pub mod token;

pub use claims::{Claims, TokenKind};
pub use context::UserContext;
pub use decision::{AccessDecision, AccessDecisionEngine, Denial, Requirement};
pub use permissions::{Action, Permission, Resource, capabilities, has_permission, role_permissions};
pub use roles::{Role, RoleTransitionError, UnknownRole, can_access_role, validate_role_transition};
pub use token::{
    BearerError, TokenConfig, TokenConfigError, TokenError, TokenManager, TokenPair,
    extract_bearer_token,
};
