//! Store catalog: clients, stores, departments, services and their discount
//! rules, contractors and client-defined order form fields.
//!
//! Pure data + small helpers; pricing lives with the order model.

pub mod custom_field;
pub mod organisation;
pub mod service;

pub use custom_field::{ADDRESS_FIELD, CustomField, FIO_FIELD};
pub use organisation::{City, Client, Contractor, Department, Store};
pub use service::{DiscountKind, Service, ServiceDiscount, ServiceType};
