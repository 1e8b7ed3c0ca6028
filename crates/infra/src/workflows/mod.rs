//! Use-case orchestration.
//!
//! Each workflow follows the same pipeline:
//!
//! ```text
//! staff profile + request
//!   ↓
//! 1. access checks (role, store, departments)
//!   ↓
//! 2. load snapshots from the repositories
//!   ↓
//! 3. outbound calls (marketplace, slot calendar, SMS) where needed
//!   ↓
//! 4. aggregate.execute(command) -> events (pure decision + apply)
//!   ↓
//! 5. save with the version the aggregate was loaded at
//! ```
//!
//! Outbound failures that operators need to see are also written to the
//! `logs` collection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use terminal_auth::{AuthzError, StaffProfile, has_access_to_departments};
use terminal_catalog::{Client, Contractor, Department, ServiceDiscount, Store};
use terminal_core::{
    Aggregate, AggregateRoot, ClientId, DepartmentId, DomainError, ExpectedVersion, LogId, OrderId,
    ServiceId, StoreId,
};
use terminal_orders::{Feedback, Order, OrderCommand, OrderEvent, OrderInvoice};

use crate::config::AppConfig;
use crate::export::ExportError;
use crate::marketplace::{Marketplace, SlotCalendar, SmsSender};
use crate::repository::{LogRecord, Repositories, Repository, RepositoryError};

pub mod export;
pub mod feedback;
pub mod listing;
pub mod orders;
pub mod status;

pub use export::ExportQuery;
pub use feedback::{FeedbackInput, FeedbackView};
pub use listing::{AdminListQuery, OrderPage, OrderRow, StoreListQuery};
pub use orders::{FieldInput, LineInput, NewOrder, OrderCard, OrderForm, OrderUpdate};
pub use status::{ExecutorAssignment, StatusCallback};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// The request is well formed but cannot be carried out.
    #[error("{0}")]
    Rejected(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The marketplace failed or refused a status change.
    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => WorkflowError::Validation(msg),
            DomainError::InvariantViolation(msg) => WorkflowError::Rejected(msg),
            DomainError::Conflict(msg) => WorkflowError::Conflict(msg),
            DomainError::NotFound => WorkflowError::NotFound("order".to_string()),
        }
    }
}

impl From<AuthzError> for WorkflowError {
    fn from(value: AuthzError) -> Self {
        WorkflowError::Forbidden(value.to_string())
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Concurrency(msg) => WorkflowError::Conflict(msg),
            other => WorkflowError::Repository(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Everything the workflows need, shared by all request handlers.
#[derive(Clone)]
pub struct AppServices {
    pub repos: Repositories,
    pub marketplace: Arc<dyn Marketplace>,
    pub slots: Arc<dyn SlotCalendar>,
    pub sms: Arc<dyn SmsSender>,
    pub config: AppConfig,
}

impl AppServices {
    pub fn new(
        repos: Repositories,
        marketplace: Arc<dyn Marketplace>,
        slots: Arc<dyn SlotCalendar>,
        sms: Arc<dyn SmsSender>,
        config: AppConfig,
    ) -> Self {
        Self {
            repos,
            marketplace,
            slots,
            sms,
            config,
        }
    }

    pub async fn staff_profile(
        &self,
        user_id: &terminal_core::UserId,
    ) -> WorkflowResult<Option<StaffProfile>> {
        Ok(self.repos.staff.get(user_id).await?)
    }

    async fn load_order(&self, id: OrderId) -> WorkflowResult<Order> {
        self.repos
            .orders
            .get(&id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("order {id}")))
    }

    async fn load_store(&self, id: StoreId) -> WorkflowResult<Store> {
        self.repos
            .stores
            .get(&id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("store {id}")))
    }

    async fn load_client(&self, id: ClientId) -> WorkflowResult<Client> {
        self.repos
            .clients
            .get(&id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("client {id}")))
    }

    /// Decide and persist one command against a loaded order.
    ///
    /// The save expects the version the order had before the command, so a
    /// concurrent writer turns into a conflict. Commands that decide nothing
    /// are not written.
    async fn execute(&self, order: &mut Order, command: OrderCommand) -> WorkflowResult<Vec<OrderEvent>> {
        let expected = ExpectedVersion::Exact(AggregateRoot::version(order));
        let events = order.execute(&command)?;
        if events.is_empty() {
            return Ok(events);
        }
        self.repos.orders.save(order.clone(), expected).await?;
        for event in &events {
            tracing::debug!(
                order_id = %order.id_typed(),
                event_type = event.event_type(),
                version = AggregateRoot::version(order),
                "order event applied"
            );
        }
        Ok(events)
    }

    /// Discount rules of the given services.
    async fn discounts_for(&self, wanted: &[ServiceId]) -> WorkflowResult<Vec<ServiceDiscount>> {
        Ok(self
            .repos
            .discounts
            .list()
            .await?
            .into_iter()
            .filter(|d| wanted.contains(&d.service_id))
            .collect())
    }

    async fn aggregator(&self) -> WorkflowResult<Option<Contractor>> {
        Ok(self
            .repos
            .contractors
            .list()
            .await?
            .into_iter()
            .find(|c| c.is_aggregator))
    }

    async fn departments_by_id(&self) -> WorkflowResult<HashMap<DepartmentId, Department>> {
        Ok(self
            .repos
            .departments
            .list()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect())
    }

    async fn feedback_for(&self, order_id: OrderId) -> WorkflowResult<Option<Feedback>> {
        Ok(self
            .repos
            .feedback
            .list()
            .await?
            .into_iter()
            .find(|f| f.order_id == order_id))
    }

    async fn feedback_or_new(&self, order_id: OrderId) -> WorkflowResult<Feedback> {
        match self.feedback_for(order_id).await? {
            Some(f) => Ok(f),
            None => {
                let id = self.repos.feedback.next_id().await?;
                Ok(Feedback::new(id.into(), order_id))
            }
        }
    }

    /// Persist an operator-visible failure. Logging problems never fail the
    /// request itself.
    async fn log_failure(&self, function: &str, title: impl Into<String>, text: impl Into<String>) {
        let title = title.into();
        let text = text.into();
        tracing::warn!(function, title = %title, "recording failure");

        let id = match self.repos.logs.next_id().await {
            Ok(id) => LogId(id),
            Err(e) => {
                tracing::error!(error = %e, function, "failed to allocate log id");
                return;
            }
        };
        let record = LogRecord {
            id,
            category: "orders".to_string(),
            function: function.to_string(),
            title,
            text,
            created: Utc::now(),
        };
        if let Err(e) = self.repos.logs.upsert(record).await {
            tracing::error!(error = %e, function, "failed to store log record");
        }
    }

    async fn notify(&self, phone: &str, text: &str) {
        if let Err(e) = self.sms.send(phone, text).await {
            tracing::warn!(error = %e, "sms notification failed");
        }
    }
}

/// Staff may see an order when they share one of its departments.
fn can_access_order(profile: &StaffProfile, order: &Order) -> bool {
    has_access_to_departments(profile, order.departments())
}

/// Owned service ids of the given lines, safe to hold across an await.
fn line_services(lines: &[OrderInvoice]) -> Vec<ServiceId> {
    lines.iter().map(|l| l.service_id).collect()
}

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format(DATE_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing;
