//! Strongly-typed identifiers used across the domain.
//!
//! Catalog and order records use integer keys: the order of service ids is
//! observable (relative discounts are applied by ascending service id), and
//! the marketplace refers to orders by their terminal number. Staff accounts
//! are identified by UUIDs minted by the identity provider.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! int_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(pub u64);

        impl $t {
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))
            }
        }
    };
}

int_id!(
    /// A client company operating stores on the terminal.
    ClientId,
    "ClientId"
);
int_id!(StoreId, "StoreId");
int_id!(DepartmentId, "DepartmentId");
int_id!(CityId, "CityId");
int_id!(
    /// A store service. Ordering matters for discount application.
    ServiceId,
    "ServiceId"
);
int_id!(DiscountId, "DiscountId");
int_id!(ContractorId, "ContractorId");
int_id!(CustomFieldId, "CustomFieldId");
int_id!(OrderId, "OrderId");
int_id!(CustomerId, "CustomerId");
int_id!(FeedbackId, "FeedbackId");
int_id!(LogId, "LogId");
int_id!(ExportId, "ExportId");

/// Identifier of a staff account (actor identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new identifier (UUIDv7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("UserId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Parse a comma-separated id list (`"1,2, 3"`), ignoring empty segments.
pub fn parse_id_list<T>(raw: &str) -> Result<Vec<T>, DomainError>
where
    T: FromStr<Err = DomainError>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(T::from_str)
        .collect()
}
