use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "orders.publish"). The wildcard `"*"`
/// is granted to terminal administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ORDERS_READ: Permission = Permission::from_static("orders.read");
    pub const ORDERS_WRITE: Permission = Permission::from_static("orders.write");
    pub const ORDERS_DELETE: Permission = Permission::from_static("orders.delete");
    pub const ORDERS_PUBLISH: Permission = Permission::from_static("orders.publish");
    pub const ORDERS_CHANGE_STATUS: Permission = Permission::from_static("orders.change_status");
    pub const ORDERS_SEARCH: Permission = Permission::from_static("orders.search");
    pub const ORDERS_EXPORT: Permission = Permission::from_static("orders.export");
    pub const ORDERS_ADMIN_LIST: Permission = Permission::from_static("orders.admin_list");
    pub const EXECUTOR_ASSIGN: Permission = Permission::from_static("orders.executor_assign");
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
