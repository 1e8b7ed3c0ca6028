//! `terminal-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, aggregate traits and the rounding
//! helpers every price and rating computation goes through.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod rounding;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    CityId, ClientId, ContractorId, CustomFieldId, CustomerId, DepartmentId, DiscountId, ExportId,
    FeedbackId, LogId, OrderId, ServiceId, StoreId, UserId, parse_id_list,
};
pub use rounding::round_half_even;
