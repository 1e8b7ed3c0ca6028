//! Orders domain module.
//!
//! This crate contains the business rules for terminal orders, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//! the order aggregate and its status lifecycle, invoice lines, the pricing
//! engine, customer feedback and the order text snapshot sent to the
//! marketplace.

pub mod customer;
pub mod feedback;
pub mod invoice;
pub mod order;
pub mod pricing;
pub mod status;
pub mod text;

pub use customer::{Customer, normalize_phone};
pub use feedback::{Feedback, FeedbackImage, Ratings};
pub use invoice::{FieldValue, OrderInvoice};
pub use order::{
    AssignExecutor, ChangeStatus, CreateOrder, EditOrder, Order, OrderCommand, OrderEvent,
    PublishOrder, SaveDraft, StaffStamp, StatusLogEntry,
};
pub use pricing::{PriceView, line_price, order_price};
pub use status::OrderStatus;
pub use text::{OrderText, TextField, TextService};
