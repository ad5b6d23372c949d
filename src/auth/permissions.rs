//! Permission resolution over a user's current role set.
//!
//! All functions here are pure over already-loaded role data; callers are
//! responsible for reading roles fresh from the store when the decision must
//! reflect current state rather than a token snapshot.

use std::collections::HashSet;

use crate::auth::role::{Role, ADMIN_ROLE_NAME};
use crate::auth::user::User;

/// Union of permissions across all roles, deduplicated by (resource, action)
/// identity.
pub fn effective_permissions(roles: &[Role]) -> HashSet<(String, String)> {
    roles
        .iter()
        .flat_map(|role| role.permissions.iter())
        .map(|p| (p.resource.clone(), p.action.clone()))
        .collect()
}

/// True iff (resource, action) is in the user's effective permission set.
pub fn authorize(roles: &[Role], resource: &str, action: &str) -> bool {
    roles
        .iter()
        .flat_map(|role| role.permissions.iter())
        .any(|p| p.key() == (resource, action))
}

/// Named capability check gating the class of admin routes. Admin access is a
/// role-level property, not a resource:action pair.
pub fn can_access_admin_features(roles: &[Role]) -> bool {
    roles.iter().any(|role| role.name == ADMIN_ROLE_NAME)
}

/// Sensitive routes require second-factor enrollment, independent of roles.
pub fn can_perform_sensitive_operations(user: &User) -> bool {
    user.otp_enabled
}
