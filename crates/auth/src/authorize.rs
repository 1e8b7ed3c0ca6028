use thiserror::Error;

use terminal_core::{DepartmentId, StoreId};

use crate::{Permission, StaffProfile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: {0} is outside the staff member's scope")]
    OutOfScope(String),
}

/// Check that the staff member's role grants `required`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(profile: &StaffProfile, required: &Permission) -> Result<(), AuthzError> {
    let granted = profile.role.permissions();
    if granted
        .iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str())
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Store scope: terminal admins see every store, multi-store roles see the
/// stores they manage, everyone else only their home store.
pub fn has_access_to_store(profile: &StaffProfile, store_id: StoreId) -> bool {
    if profile.is_terminal_admin() {
        return true;
    }
    if profile.role.is_multi_store() {
        return profile.stores().contains(&store_id);
    }
    profile.store_id == Some(store_id)
}

/// Order scope: an order is visible when it shares at least one department
/// with the staff member.
pub fn has_access_to_departments(profile: &StaffProfile, departments: &[DepartmentId]) -> bool {
    if profile.is_terminal_admin() {
        return true;
    }
    departments.iter().any(|d| profile.department_ids.contains(d))
}
