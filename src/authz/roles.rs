//! Fixed role gate (spec §4.4 "Role gate").
//!
//! Grounded on `middleware/admin.rs`'s `admin_middleware`/
//! `superadmin_middleware`: check tenant/role, log-and-deny on failure,
//! never imply a higher role satisfies a lower one.

use crate::domain::Identity;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Put,
    Rotate,
    Get,
    List,
    Delete,
}

impl Action {
    /// The role required for this action, per the spec's fixed table.
    pub const fn required_role(self) -> &'static str {
        match self {
            Action::Create => "admin",
            Action::Put => "writer",
            Action::Rotate => "writer",
            Action::Get => "reader",
            Action::List => "reader",
            Action::Delete => "admin",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Put => "put",
            Action::Rotate => "rotate",
            Action::Get => "get",
            Action::List => "list",
            Action::Delete => "delete",
        }
    }
}

/// Checks tenant match first, then role membership. Higher roles are never
/// implied by lower ones — the exact required role name must be present.
pub fn allow_action(actor: &Identity, resource_tenant: &str, action: Action) -> CoreResult<()> {
    if actor.tenant != resource_tenant {
        tracing::warn!(
            subject = %actor.subject,
            actor_tenant = %actor.tenant,
            resource_tenant = %resource_tenant,
            "denied: tenant mismatch"
        );
        return Err(CoreError::TenantMismatch);
    }

    let required = action.required_role();
    if !actor.has_role(required) {
        tracing::warn!(subject = %actor.subject, action = action.as_str(), required, "denied: missing role");
        return Err(CoreError::MissingRole(required));
    }

    Ok(())
}
