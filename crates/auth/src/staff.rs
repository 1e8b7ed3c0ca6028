use serde::{Deserialize, Serialize};

use terminal_core::{ClientId, DepartmentId, StoreId, UserId};

use crate::StaffRole;

/// A resolved staff member: identity, role and organisational scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffProfile {
    pub user_id: UserId,
    pub full_name: String,
    pub role: StaffRole,
    /// Owning client; `None` for terminal staff.
    #[serde(default)]
    pub client_id: Option<ClientId>,
    /// Home store for single-store roles.
    #[serde(default)]
    pub store_id: Option<StoreId>,
    /// Stores managed by multi-store roles.
    #[serde(default)]
    pub store_ids: Vec<StoreId>,
    /// Departments the staff member is attached to.
    #[serde(default)]
    pub department_ids: Vec<DepartmentId>,
    #[serde(default)]
    pub can_publish_orders: bool,
}

impl StaffProfile {
    pub fn is_terminal_admin(&self) -> bool {
        self.role.is_terminal_admin()
    }

    pub fn is_consultant(&self) -> bool {
        self.role.is_consultant()
    }

    /// Every store the profile is scoped to (home store first).
    pub fn stores(&self) -> Vec<StoreId> {
        let mut stores: Vec<StoreId> = self.store_id.into_iter().collect();
        for s in &self.store_ids {
            if !stores.contains(s) {
                stores.push(*s);
            }
        }
        stores
    }

    /// Owner segment used for per-user export folders.
    pub fn export_owner(&self) -> String {
        match (self.is_terminal_admin(), self.client_id) {
            (false, Some(client)) => client.to_string(),
            _ => self.user_id.to_string(),
        }
    }
}
