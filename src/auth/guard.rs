//! Per-request authorization guard.
//!
//! Every protected route declares a [`RouteRequirement`]; the guard evaluates
//! it against the caller's identity and current roles. The decision is a pure
//! synchronous function over already-resolved permission data.

use crate::auth::models::CurrentUser;
use crate::auth::permissions;
use crate::errors::AuthErrorType;

/// Declared per-route authorization contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequirement {
    pub resource: Option<&'static str>,
    pub action: Option<&'static str>,
    pub requires_admin: bool,
    pub requires_sensitive: bool,
}

impl RouteRequirement {
    /// Authenticated-only route, no further checks.
    pub const fn authenticated() -> Self {
        Self { resource: None, action: None, requires_admin: false, requires_sensitive: false }
    }

    /// Route gated on a specific resource:action permission.
    pub const fn permission(resource: &'static str, action: &'static str) -> Self {
        Self {
            resource: Some(resource),
            action: Some(action),
            requires_admin: false,
            requires_sensitive: false,
        }
    }

    /// Route restricted to the admin capability.
    pub const fn admin() -> Self {
        Self { resource: None, action: None, requires_admin: true, requires_sensitive: false }
    }

    /// Route restricted to users with second-factor enrollment.
    pub const fn sensitive() -> Self {
        Self { resource: None, action: None, requires_admin: false, requires_sensitive: true }
    }
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(AuthErrorType),
}

/// Evaluate a route requirement for a caller. First matching rule wins:
/// resource+action, then admin, then sensitive, else allow. An absent caller
/// is denied before any rule runs.
pub fn decide(user: Option<&CurrentUser>, requirement: &RouteRequirement) -> Decision {
    let Some(current) = user else {
        return Decision::Deny(AuthErrorType::InvalidCredentials);
    };

    if let (Some(resource), Some(action)) = (requirement.resource, requirement.action) {
        return if permissions::authorize(&current.roles, resource, action) {
            Decision::Allow
        } else {
            Decision::Deny(AuthErrorType::PermissionDenied)
        };
    }

    if requirement.requires_admin {
        return if permissions::can_access_admin_features(&current.roles) {
            Decision::Allow
        } else {
            Decision::Deny(AuthErrorType::AdminRequired)
        };
    }

    if requirement.requires_sensitive {
        return if permissions::can_perform_sensitive_operations(&current.user) {
            Decision::Allow
        } else {
            Decision::Deny(AuthErrorType::SensitiveRequiresOtp)
        };
    }

    Decision::Allow
}
