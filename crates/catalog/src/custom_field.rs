use serde::{Deserialize, Serialize};

use terminal_core::{ClientId, CustomFieldId};

/// Field names with a fixed meaning across clients.
pub const ADDRESS_FIELD: &str = "address";
pub const FIO_FIELD: &str = "fio";

/// A client-defined field on the order form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: CustomFieldId,
    pub client_id: ClientId,
    /// Input type rendered by the terminal UI (`text`, `date`, ...).
    #[serde(default = "default_field_type")]
    pub field_type: String,
    pub field_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub index_number: u32,
    /// Whether the field becomes a column in client exports.
    #[serde(default = "default_true")]
    pub show_in_xls: bool,
}

fn default_field_type() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl CustomField {
    /// Form description sent to the terminal UI, optionally with a value.
    pub fn describe(&self, value: Option<&str>) -> serde_json::Value {
        let mut d = serde_json::json!({
            "id": self.id,
            "index_number": self.index_number,
            "field_name": self.field_name,
            "field_type": self.field_type,
            "size": self.size,
            "label": self.label,
            "required": self.required,
        });
        if let Some(value) = value {
            // Structured values (e.g. address objects) are stored as JSON text.
            let parsed = match serde_json::from_str::<serde_json::Value>(value) {
                Ok(v @ serde_json::Value::Object(_)) => v,
                _ => serde_json::Value::String(value.to_string()),
            };
            d["field_value"] = parsed;
        }
        d
    }
}
