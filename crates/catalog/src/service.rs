use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use terminal_core::{DepartmentId, DiscountId, ServiceId, StoreId};

/// Primary services are billable work; discount services only carry
/// discount rules and contribute nothing to the base sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Primary,
    Discount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub store_id: StoreId,
    pub title: String,
    pub service_type: ServiceType,
    /// Price for the customer.
    #[serde(default)]
    pub cost: Option<Decimal>,
    /// Price charged by the marketplace.
    #[serde(default)]
    pub cost_signedup: Option<Decimal>,
    #[serde(default)]
    pub unit_name: String,
    /// Departments offering the service.
    #[serde(default)]
    pub department_ids: Vec<DepartmentId>,
    /// Marketplace subcategory titles the service maps to.
    #[serde(default)]
    pub subcategory_titles: Vec<String>,
}

impl Service {
    pub fn is_primary(&self) -> bool {
        self.service_type == ServiceType::Primary
    }

    pub fn is_discount(&self) -> bool {
        self.service_type == ServiceType::Discount
    }

    pub fn offered_by(&self, department: DepartmentId) -> bool {
        self.department_ids.contains(&department)
    }
}

/// How a discount combines with the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Added to the running total (negative values reduce it).
    Absolute,
    /// Multiplies the running total.
    Relative,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Absolute => "absolute",
            DiscountKind::Relative => "relative",
        }
    }
}

/// A discount rule owned by a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscount {
    pub id: DiscountId,
    pub service_id: ServiceId,
    pub kind: DiscountKind,
    pub value: Decimal,
}
