use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use terminal_catalog::{Service, ServiceType};
use terminal_core::{ContractorId, CustomFieldId, DepartmentId, ServiceId, round_half_even};

/// Invoice line: one service ordered through one department.
///
/// Costs are snapshotted from the catalog when the line is written, so later
/// catalog price changes do not reprice existing orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInvoice {
    pub service_id: ServiceId,
    pub service_type: ServiceType,
    pub title: String,
    pub count: f64,
    #[serde(default)]
    pub unit_name: String,
    /// Price for the customer.
    #[serde(default)]
    pub cost: Option<Decimal>,
    /// Price charged by the marketplace.
    #[serde(default)]
    pub cost_signedup: Option<Decimal>,
    /// Price paid to the contractor.
    #[serde(default)]
    pub cost_contractor: Option<Decimal>,
    pub department_id: DepartmentId,
    #[serde(default)]
    pub contractor_id: Option<ContractorId>,
}

impl OrderInvoice {
    /// Build a line for `service`. Discount services carry no prices.
    pub fn for_service(service: &Service, department_id: DepartmentId, count: f64) -> Self {
        let (cost, cost_signedup) = if service.is_primary() {
            (service.cost, service.cost_signedup)
        } else {
            (None, None)
        };
        Self {
            service_id: service.id,
            service_type: service.service_type,
            title: service.title.clone(),
            count,
            unit_name: service.unit_name.clone(),
            cost,
            cost_signedup,
            cost_contractor: None,
            department_id,
            contractor_id: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.service_type == ServiceType::Primary
    }

    /// Lines are identified by the (service, department) pair.
    pub fn key(&self) -> (ServiceId, DepartmentId) {
        (self.service_id, self.department_id)
    }

    /// Quantity rendered for humans: integers without a fraction, otherwise
    /// one decimal place.
    pub fn display_count(&self) -> String {
        if self.count.fract() == 0.0 {
            format!("{}", self.count as i64)
        } else {
            format!("{}", round_half_even(self.count, 1))
        }
    }
}

/// Value of a client custom field on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub custom_field_id: CustomFieldId,
    pub value: String,
}
