use serde::{Deserialize, Serialize};

use crate::Permission;

/// Staff role used for RBAC.
///
/// Terminal roles belong to the platform operator. Every other role belongs
/// to a client's staff and is scoped either to departments (consultant,
/// sales manager, department admin) or to stores (store admin, area store
/// manager, operations manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    TerminalAdmin,
    TerminalCoworker,
    Consultant,
    SalesManager,
    DepartmentAdmin,
    StoreAdmin,
    AreaStoreManager,
    OperationsManager,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::TerminalAdmin => "terminal_admin",
            StaffRole::TerminalCoworker => "terminal_coworker",
            StaffRole::Consultant => "consultant",
            StaffRole::SalesManager => "sales_manager",
            StaffRole::DepartmentAdmin => "department_admin",
            StaffRole::StoreAdmin => "store_admin",
            StaffRole::AreaStoreManager => "area_store_manager",
            StaffRole::OperationsManager => "operations_manager",
        }
    }

    pub fn is_terminal_admin(&self) -> bool {
        matches!(self, StaffRole::TerminalAdmin)
    }

    pub fn is_consultant(&self) -> bool {
        matches!(self, StaffRole::Consultant)
    }

    /// Roles that pick the store per request instead of having a home store.
    pub fn is_multi_store(&self) -> bool {
        matches!(self, StaffRole::AreaStoreManager | StaffRole::OperationsManager)
    }

    /// Roles that see every department of their store(s).
    pub fn sees_all_departments(&self) -> bool {
        matches!(
            self,
            StaffRole::TerminalAdmin | StaffRole::StoreAdmin | StaffRole::AreaStoreManager
        )
    }

    /// Permissions granted by the role.
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            StaffRole::TerminalAdmin => vec![Permission::WILDCARD],
            StaffRole::TerminalCoworker => vec![
                Permission::ORDERS_READ,
                Permission::ORDERS_WRITE,
                Permission::ORDERS_DELETE,
                Permission::ORDERS_PUBLISH,
                Permission::ORDERS_CHANGE_STATUS,
                Permission::ORDERS_SEARCH,
            ],
            StaffRole::Consultant => vec![
                Permission::ORDERS_READ,
                Permission::ORDERS_WRITE,
                Permission::ORDERS_DELETE,
                Permission::ORDERS_SEARCH,
                Permission::ORDERS_EXPORT,
            ],
            StaffRole::SalesManager
            | StaffRole::DepartmentAdmin
            | StaffRole::StoreAdmin
            | StaffRole::AreaStoreManager
            | StaffRole::OperationsManager => vec![
                Permission::ORDERS_READ,
                Permission::ORDERS_WRITE,
                Permission::ORDERS_DELETE,
                Permission::ORDERS_PUBLISH,
                Permission::ORDERS_CHANGE_STATUS,
                Permission::ORDERS_SEARCH,
                Permission::ORDERS_EXPORT,
            ],
        }
    }
}

impl core::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
