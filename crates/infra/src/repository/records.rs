//! Record bindings for the stored document kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use terminal_auth::StaffProfile;
use terminal_catalog::{Client, Contractor, CustomField, Department, Service, ServiceDiscount, Store};
use terminal_core::{
    AggregateRoot, ClientId, ContractorId, CustomFieldId, CustomerId, DepartmentId, DiscountId,
    ExportId, FeedbackId, LogId, OrderId, ServiceId, StoreId, UserId,
};
use terminal_orders::{Customer, Feedback, Order};

use super::Record;

/// A failure worth keeping for operators (marketplace rejections, transport
/// errors, malformed feedback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: LogId,
    pub category: String,
    pub function: String,
    pub title: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

/// A generated spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: ExportId,
    /// Raw order id filter the export was requested with.
    pub ids: String,
    pub file_type: String,
    pub path: String,
    pub link: String,
    pub created: DateTime<Utc>,
}

macro_rules! record {
    ($t:ty, $key:ty, $collection:literal, |$v:ident| $key_expr:expr) => {
        impl Record for $t {
            type Key = $key;
            const COLLECTION: &'static str = $collection;

            fn key(&self) -> $key {
                let $v = self;
                $key_expr
            }
        }
    };
}

record!(Client, ClientId, "clients", |c| c.id);
record!(Store, StoreId, "stores", |s| s.id);
record!(Department, DepartmentId, "departments", |d| d.id);
record!(Service, ServiceId, "services", |s| s.id);
record!(ServiceDiscount, DiscountId, "service_discounts", |d| d.id);
record!(Contractor, ContractorId, "contractors", |c| c.id);
record!(CustomField, CustomFieldId, "custom_fields", |f| f.id);
record!(StaffProfile, UserId, "staff", |s| s.user_id);
record!(Customer, CustomerId, "customers", |c| c.id);
record!(Feedback, FeedbackId, "feedback", |f| f.id);
record!(LogRecord, LogId, "logs", |l| l.id);
record!(ExportRecord, ExportId, "exports", |e| e.id);

impl Record for Order {
    type Key = OrderId;
    const COLLECTION: &'static str = "orders";

    fn key(&self) -> OrderId {
        self.id_typed()
    }

    fn version(&self) -> u64 {
        AggregateRoot::version(self)
    }
}
