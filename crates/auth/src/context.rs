use std::collections::BTreeMap;

use serde::Serialize;

use eventhub_core::{OrganizationId, UserId, UserRecord};

use crate::permissions::{capabilities, role_permissions};
use crate::{Claims, Permission, Role};

/// Per-request caller context.
///
/// Identity comes from the verified token; activity, verification and
/// organization membership come from the freshly loaded user record.
/// Built once per request and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContext {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub token_id: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub organization_id: Option<OrganizationId>,
    pub permissions: Vec<Permission>,
    pub capabilities: BTreeMap<&'static str, bool>,
}

impl UserContext {
    pub fn build(claims: &Claims, user: &UserRecord) -> Self {
        Self {
            user_id: claims.subject.clone(),
            email: claims.email.clone(),
            role: claims.role,
            token_id: claims.token_id.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            organization_id: user.organization_id.clone(),
            permissions: role_permissions(claims.role).to_vec(),
            capabilities: capabilities(claims.role),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::TokenKind;

    #[test]
    fn context_combines_token_identity_with_storage_state() {
        let claims = Claims {
            subject: UserId::new("u1"),
            email: "o@example.com".to_string(),
            role: Role::Organizer,
            token_id: "t1".to_string(),
            kind: TokenKind::Access,
            issued_at: Utc::now(),
            expires_at: Utc::now(),
        };
        let user = UserRecord {
            id: UserId::new("u1"),
            email: "o@example.com".to_string(),
            role: "organizer".to_string(),
            is_active: true,
            is_verified: false,
            organization_id: Some(OrganizationId::new("org-a")),
        };

        let ctx = UserContext::build(&claims, &user);
        assert_eq!(ctx.role, Role::Organizer);
        assert!(!ctx.is_verified);
        assert_eq!(ctx.organization_id, Some(OrganizationId::new("org-a")));
        assert!(ctx.capabilities["can_create_events"]);
        assert!(!ctx.is_admin());
    }
}
