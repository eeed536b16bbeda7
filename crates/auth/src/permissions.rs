//! Static role → permission table.
//!
//! Permissions are declared at compile time and bound to roles here; nothing
//! creates or removes them at runtime.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Resource kinds a permission can target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    User,
    Organization,
    Event,
    System,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "user",
            Resource::Organization => "organization",
            Resource::Event => "event",
            Resource::System => "system",
        }
    }
}

/// Actions a permission can grant.
///
/// `ViewAnalytics` and `ViewAuditLog` only appear with [`Resource::System`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Write,
    Delete,
    Publish,
    ManageAttendees,
    Manage,
    ViewAnalytics,
    ViewAuditLog,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::Publish => "publish",
            Action::ManageAttendees => "manage_attendees",
            Action::Manage => "manage",
            Action::ViewAnalytics => "view_analytics",
            Action::ViewAuditLog => "view_audit_log",
        }
    }
}

/// A (resource, action) pair, rendered as `resource:action`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

pub const USER_READ: Permission = Permission::new(Resource::User, Action::Read);
pub const USER_WRITE: Permission = Permission::new(Resource::User, Action::Write);
pub const USER_DELETE: Permission = Permission::new(Resource::User, Action::Delete);
pub const USER_MANAGE: Permission = Permission::new(Resource::User, Action::Manage);

pub const ORGANIZATION_READ: Permission = Permission::new(Resource::Organization, Action::Read);
pub const ORGANIZATION_WRITE: Permission = Permission::new(Resource::Organization, Action::Write);
pub const ORGANIZATION_DELETE: Permission =
    Permission::new(Resource::Organization, Action::Delete);
pub const ORGANIZATION_MANAGE: Permission =
    Permission::new(Resource::Organization, Action::Manage);

pub const EVENT_READ: Permission = Permission::new(Resource::Event, Action::Read);
pub const EVENT_WRITE: Permission = Permission::new(Resource::Event, Action::Write);
pub const EVENT_DELETE: Permission = Permission::new(Resource::Event, Action::Delete);
pub const EVENT_PUBLISH: Permission = Permission::new(Resource::Event, Action::Publish);
pub const EVENT_MANAGE_ATTENDEES: Permission =
    Permission::new(Resource::Event, Action::ManageAttendees);
pub const EVENT_MANAGE: Permission = Permission::new(Resource::Event, Action::Manage);

pub const SYSTEM_MANAGE: Permission = Permission::new(Resource::System, Action::Manage);
pub const SYSTEM_VIEW_ANALYTICS: Permission =
    Permission::new(Resource::System, Action::ViewAnalytics);
pub const SYSTEM_VIEW_AUDIT_LOG: Permission =
    Permission::new(Resource::System, Action::ViewAuditLog);

const USER_PERMISSIONS: &[Permission] = &[USER_READ, USER_WRITE, ORGANIZATION_READ, EVENT_READ];

const ORGANIZER_PERMISSIONS: &[Permission] = &[
    USER_READ,
    USER_WRITE,
    ORGANIZATION_READ,
    ORGANIZATION_WRITE,
    EVENT_READ,
    EVENT_WRITE,
    EVENT_DELETE,
    EVENT_PUBLISH,
    EVENT_MANAGE_ATTENDEES,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    USER_READ,
    USER_WRITE,
    USER_DELETE,
    USER_MANAGE,
    ORGANIZATION_READ,
    ORGANIZATION_WRITE,
    ORGANIZATION_DELETE,
    ORGANIZATION_MANAGE,
    EVENT_READ,
    EVENT_WRITE,
    EVENT_DELETE,
    EVENT_PUBLISH,
    EVENT_MANAGE_ATTENDEES,
    EVENT_MANAGE,
    SYSTEM_MANAGE,
    SYSTEM_VIEW_ANALYTICS,
    SYSTEM_VIEW_AUDIT_LOG,
];

/// Every permission granted to `role`.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::User => USER_PERMISSIONS,
        Role::Organizer => ORGANIZER_PERMISSIONS,
        Role::Admin => ADMIN_PERMISSIONS,
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    role_permissions(role).contains(&permission)
}

/// Named capability flags for `role`, as shown to clients.
pub fn capabilities(role: Role) -> BTreeMap<&'static str, bool> {
    let flags = [
        ("can_create_events", EVENT_WRITE),
        ("can_publish_events", EVENT_PUBLISH),
        ("can_manage_attendees", EVENT_MANAGE_ATTENDEES),
        ("can_manage_organization", ORGANIZATION_WRITE),
        ("can_manage_users", USER_MANAGE),
        ("can_view_analytics", SYSTEM_VIEW_ANALYTICS),
        ("can_view_audit_log", SYSTEM_VIEW_AUDIT_LOG),
    ];

    flags
        .into_iter()
        .map(|(name, perm)| (name, has_permission(role, perm)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_render_as_resource_action() {
        assert_eq!(EVENT_MANAGE_ATTENDEES.to_string(), "event:manage_attendees");
        assert_eq!(SYSTEM_VIEW_AUDIT_LOG.to_string(), "system:view_audit_log");
    }

    #[test]
    fn higher_roles_include_lower_role_permissions() {
        for perm in role_permissions(Role::User) {
            assert!(has_permission(Role::Organizer, *perm), "organizer lacks {perm}");
        }
        for perm in role_permissions(Role::Organizer) {
            assert!(has_permission(Role::Admin, *perm), "admin lacks {perm}");
        }
    }

    #[test]
    fn users_cannot_write_events() {
        assert!(!has_permission(Role::User, EVENT_WRITE));
        assert!(has_permission(Role::Organizer, EVENT_WRITE));
    }

    #[test]
    fn system_actions_are_admin_only() {
        for role in [Role::User, Role::Organizer] {
            assert!(
                role_permissions(role)
                    .iter()
                    .all(|p| p.resource != Resource::System)
            );
        }
        assert!(has_permission(Role::Admin, SYSTEM_MANAGE));
    }

    #[test]
    fn capability_flags_follow_the_table() {
        let organizer = capabilities(Role::Organizer);
        assert_eq!(organizer["can_create_events"], true);
        assert_eq!(organizer["can_manage_users"], false);

        let admin = capabilities(Role::Admin);
        assert!(admin.values().all(|v| *v));

        let user = capabilities(Role::User);
        assert!(user.values().all(|v| !*v));
    }
}
