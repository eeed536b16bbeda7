use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a caller. Totally ordered by [`Role::hierarchy_level`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Organizer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Organizer, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Organizer => "organizer",
            Role::Admin => "admin",
        }
    }

    /// `user=1 < organizer=2 < admin=3`.
    pub fn hierarchy_level(&self) -> u8 {
        match self {
            Role::User => 1,
            Role::Organizer => 2,
            Role::Admin => 3,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "organizer" => Ok(Role::Organizer),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Whether `requester` sits at or above `target` in the hierarchy.
pub fn can_access_role(requester: Role, target: Role) -> bool {
    requester.hierarchy_level() >= target.hierarchy_level()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleTransitionError {
    #[error("only administrators can assign or modify the admin role")]
    AdminRequired,

    #[error("cannot grant role '{target}' above your own role '{requester}'")]
    AboveOwnLevel { requester: Role, target: Role },
}

/// Validate that `requester` may move an account from `current` to `target`.
///
/// `current` is `None` when the role is being assigned for the first time.
pub fn validate_role_transition(
    requester: Role,
    current: Option<Role>,
    target: Role,
) -> Result<(), RoleTransitionError> {
    let touches_admin = target == Role::Admin || current == Some(Role::Admin);
    if touches_admin && requester != Role::Admin {
        return Err(RoleTransitionError::AdminRequired);
    }
    if !can_access_role(requester, target) {
        return Err(RoleTransitionError::AboveOwnLevel { requester, target });
    }
    Ok(())
}
