use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use terminal_catalog::{CustomField, ServiceType};
use terminal_core::{CustomFieldId, DepartmentId, ServiceId};

use crate::OrderInvoice;

/// Service entry of the order text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextService {
    pub id: ServiceId,
    pub title: String,
    pub service_type: ServiceType,
    pub count: f64,
    #[serde(default)]
    pub unit_name: String,
    #[serde(default)]
    pub cost: Option<Decimal>,
    pub department_id: DepartmentId,
}

/// Custom field entry of the order text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub id: CustomFieldId,
    pub field_name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub field_value: String,
}

/// Snapshot of what was ordered, sent to the marketplace as the task text.
///
/// Rebuilt on every create/edit so it always reflects the current lines and
/// field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderText {
    pub services: Vec<TextService>,
    pub fields: Vec<TextField>,
    /// Comma separated list of preferred dates (`YYYY-MM-DD`).
    #[serde(default)]
    pub dates: Option<String>,
}

impl OrderText {
    /// Build the text from invoice lines and `(field, value)` pairs.
    ///
    /// Fields are ordered by their form index.
    pub fn build(
        invoices: &[OrderInvoice],
        fields: &[(&CustomField, &str)],
        dates: Option<&str>,
    ) -> Self {
        let services = invoices
            .iter()
            .map(|l| TextService {
                id: l.service_id,
                title: l.title.clone(),
                service_type: l.service_type,
                count: l.count,
                unit_name: l.unit_name.clone(),
                cost: l.cost,
                department_id: l.department_id,
            })
            .collect();

        let mut sorted: Vec<_> = fields.to_vec();
        sorted.sort_by_key(|(f, _)| f.index_number);
        let fields = sorted
            .into_iter()
            .map(|(f, value)| TextField {
                id: f.id,
                field_name: f.field_name.clone(),
                label: f.label.clone(),
                field_value: value.to_string(),
            })
            .collect();

        Self {
            services,
            fields,
            dates: dates.filter(|d| !d.trim().is_empty()).map(str::to_string),
        }
    }

    pub fn field_value(&self, field_name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field_name == field_name)
            .map(|f| f.field_value.as_str())
    }

    /// Whether any field value contains `query`.
    pub fn mentions(&self, query: &str) -> bool {
        self.fields.iter().any(|f| f.field_value.contains(query))
    }

    /// Text form sent to the marketplace.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terminal_core::ClientId;

    fn field(id: u64, name: &str, index: u32) -> CustomField {
        CustomField {
            id: CustomFieldId(id),
            client_id: ClientId(1),
            field_type: "text".into(),
            field_name: name.into(),
            label: Some(name.to_uppercase()),
            size: None,
            required: true,
            archive: false,
            index_number: index,
            show_in_xls: true,
        }
    }

    #[test]
    fn fields_are_ordered_by_index_and_searchable() {
        let address = field(1, "address", 2);
        let fio = field(2, "fio", 1);
        let text = OrderText::build(
            &[],
            &[(&address, "Abay 10"), (&fio, "Ivanov")],
            Some("2026-11-01"),
        );
        assert_eq!(text.fields[0].field_name, "fio");
        assert_eq!(text.field_value("address"), Some("Abay 10"));
        assert!(text.mentions("Abay"));
        assert!(!text.mentions("Satpayev"));
        assert_eq!(text.dates.as_deref(), Some("2026-11-01"));
    }

    #[test]
    fn blank_dates_are_dropped() {
        let text = OrderText::build(&[], &[], Some("  "));
        assert_eq!(text.dates, None);
    }
}
