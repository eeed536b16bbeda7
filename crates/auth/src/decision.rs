//! Access decisions: role permissions composed with ownership checks.
//!
//! - Base permission first, from the static table.
//! - Admin bypasses ownership.
//! - Everything else is dispatched by resource kind against freshly loaded
//!   entities. Any lookup failure or missing entity denies.

use std::sync::Arc;

use serde::Serialize;

use eventhub_core::{Directory, EventId, OrganizationId, UserId, UserRecord};

use crate::permissions::has_permission;
use crate::{Permission, Resource, Role, UserContext};

/// Outcome of an authorization check.
///
/// `reason` is user-facing text only; never branch on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AccessDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// What a guarded route demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// A permission, evaluated with ownership checks.
    Permission(Permission),
    /// Role allow-list without ownership dimension.
    AnyRole(&'static [Role]),
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    MissingPermission(Permission),
    RoleNotAllowed,
    NotOrganizer,
    NoOrganization,
    OrganizationNotEligible,
    NotVerified,
    NotYourEvent,
    NotYourOrganization,
    NotYourAccount,
    Unverifiable,
}

impl Denial {
    pub fn message(&self, role: Role) -> String {
        match self {
            Denial::MissingPermission(permission) => {
                format!("role '{role}' does not have permission '{permission}'")
            }
            Denial::RoleNotAllowed => {
                format!("role '{role}' is not allowed to perform this action")
            }
            Denial::NotOrganizer => "only organizers can create events".to_string(),
            Denial::NoOrganization => {
                "you must belong to an organization to create events".to_string()
            }
            Denial::OrganizationNotEligible => {
                "your organization is not allowed to create events".to_string()
            }
            Denial::NotVerified => {
                "your account must be verified to create an organization".to_string()
            }
            // Same text whether the event is missing or owned elsewhere.
            Denial::NotYourEvent => {
                "you can only manage events that belong to your organization".to_string()
            }
            Denial::NotYourOrganization => {
                "you can only manage your own organization".to_string()
            }
            Denial::NotYourAccount => "you can only manage your own account".to_string(),
            Denial::Unverifiable => "access could not be verified".to_string(),
        }
    }
}

/// Decides whether a caller may act on a concrete or not-yet-created resource.
#[derive(Clone)]
pub struct AccessDecisionEngine {
    directory: Arc<dyn Directory>,
}

impl core::fmt::Debug for AccessDecisionEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessDecisionEngine").finish_non_exhaustive()
    }
}

impl AccessDecisionEngine {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Whether `caller_id` acting as `role` may exercise `permission` on
    /// `resource_id`. An empty `resource_id` means the resource is about to be created.
    pub async fn can_access_resource(
        &self,
        caller_id: &UserId,
        role: Role,
        permission: Permission,
        resource_id: &str,
    ) -> bool {
        self.evaluate(caller_id, role, permission, resource_id)
            .await
            .is_ok()
    }

    /// Human-readable reason for a denial, `None` when access is granted.
    pub async fn denial_reason(
        &self,
        caller_id: &UserId,
        role: Role,
        permission: Permission,
        resource_id: &str,
    ) -> Option<String> {
        self.evaluate(caller_id, role, permission, resource_id)
            .await
            .err()
            .map(|d| d.message(role))
    }

    pub async fn authorize(
        &self,
        ctx: &UserContext,
        permission: Permission,
        resource_id: &str,
    ) -> AccessDecision {
        let decision = match self
            .evaluate(&ctx.user_id, ctx.role, permission, resource_id)
            .await
        {
            Ok(()) => AccessDecision::allow(),
            Err(denial) => AccessDecision::deny(denial.message(ctx.role)),
        };

        tracing::debug!(
            caller = %ctx.user_id,
            role = %ctx.role,
            permission = %permission,
            resource_id,
            allowed = decision.allowed,
            "access decision"
        );
        decision
    }

    /// Single entry point for route guards.
    pub async fn authorize_requirement(
        &self,
        ctx: &UserContext,
        requirement: Requirement,
        resource_id: &str,
    ) -> AccessDecision {
        match requirement {
            Requirement::Permission(permission) => {
                self.authorize(ctx, permission, resource_id).await
            }
            Requirement::AnyRole(roles) if roles.contains(&ctx.role) => AccessDecision::allow(),
            Requirement::AnyRole(_) => {
                AccessDecision::deny(Denial::RoleNotAllowed.message(ctx.role))
            }
        }
    }

    pub async fn evaluate(
        &self,
        caller_id: &UserId,
        role: Role,
        permission: Permission,
        resource_id: &str,
    ) -> Result<(), Denial> {
        if !has_permission(role, permission) {
            return Err(Denial::MissingPermission(permission));
        }
        if role == Role::Admin {
            return Ok(());
        }

        match permission.resource {
            Resource::Event if resource_id.is_empty() => {
                self.check_event_creation(caller_id, role).await
            }
            Resource::Event => {
                self.check_event_ownership(caller_id, &EventId::new(resource_id))
                    .await
            }
            Resource::Organization if resource_id.is_empty() => {
                self.check_organization_creation(caller_id).await
            }
            Resource::Organization => {
                self.check_organization_membership(caller_id, &OrganizationId::new(resource_id))
                    .await
            }
            Resource::User if caller_id.as_str() == resource_id => Ok(()),
            Resource::User => Err(Denial::NotYourAccount),
            Resource::System => Ok(()),
        }
    }

    async fn check_event_creation(&self, caller_id: &UserId, role: Role) -> Result<(), Denial> {
        if role != Role::Organizer {
            return Err(Denial::NotOrganizer);
        }
        let caller = self.load_caller(caller_id).await?;
        let org_id = caller.organization_id.ok_or(Denial::NoOrganization)?;

        match self.directory.load_organization(&org_id).await {
            Ok(Some(org)) if org.can_create_events => Ok(()),
            Ok(Some(_)) => Err(Denial::OrganizationNotEligible),
            Ok(None) => {
                tracing::warn!(
                    caller = %caller_id,
                    organization = %org_id,
                    "caller organization not found"
                );
                Err(Denial::NoOrganization)
            }
            Err(e) => {
                tracing::warn!(error = %e, organization = %org_id, "organization lookup failed");
                Err(Denial::Unverifiable)
            }
        }
    }

    async fn check_event_ownership(
        &self,
        caller_id: &UserId,
        event_id: &EventId,
    ) -> Result<(), Denial> {
        let event = match self.directory.load_event(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => return Err(Denial::NotYourEvent),
            Err(e) => {
                tracing::warn!(error = %e, event = %event_id, "event lookup failed");
                return Err(Denial::Unverifiable);
            }
        };
        let caller = self.load_caller(caller_id).await?;

        if caller.organization_id.as_ref() == Some(&event.organization_id) {
            Ok(())
        } else {
            Err(Denial::NotYourEvent)
        }
    }

    async fn check_organization_creation(&self, caller_id: &UserId) -> Result<(), Denial> {
        let caller = self.load_caller(caller_id).await?;
        if caller.is_verified {
            Ok(())
        } else {
            Err(Denial::NotVerified)
        }
    }

    async fn check_organization_membership(
        &self,
        caller_id: &UserId,
        org_id: &OrganizationId,
    ) -> Result<(), Denial> {
        let caller = self.load_caller(caller_id).await?;
        if caller.organization_id.as_ref() == Some(org_id) {
            Ok(())
        } else {
            Err(Denial::NotYourOrganization)
        }
    }

    async fn load_caller(&self, caller_id: &UserId) -> Result<UserRecord, Denial> {
        match self.directory.load_user(caller_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                tracing::warn!(caller = %caller_id, "caller not found during access check");
                Err(Denial::Unverifiable)
            }
            Err(e) => {
                tracing::warn!(error = %e, caller = %caller_id, "caller lookup failed");
                Err(Denial::Unverifiable)
            }
        }
    }
}
