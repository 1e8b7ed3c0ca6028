use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use terminal_catalog::ServiceDiscount;
use terminal_core::rounding::f64_to_money;
use terminal_core::{
    Aggregate, AggregateRoot, ClientId, CustomerId, DepartmentId, DomainError, OrderId, StoreId,
    UserId,
};

use crate::pricing::{PriceView, order_price};
use crate::{FieldValue, OrderInvoice, OrderStatus, OrderText};

/// Who did something to the order, and when (draft saves, publications).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffStamp {
    pub employee_id: UserId,
    pub employee_name: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub status: OrderStatus,
    pub created: DateTime<Utc>,
}

impl StatusLogEntry {
    /// Title shown in the order card. Final statuses use their short form.
    pub fn title(&self) -> &'static str {
        match self.status {
            OrderStatus::NotCompleted => "Not completed",
            OrderStatus::Cancelled => "Cancelled",
            other => other.title(),
        }
    }
}

/// Aggregate root: Order.
///
/// Stored as a snapshot; `version` is compared on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    client_id: ClientId,
    store_id: StoreId,
    customer_id: Option<CustomerId>,
    phone: String,
    status: OrderStatus,
    departments: Vec<DepartmentId>,
    invoices: Vec<OrderInvoice>,
    field_values: Vec<FieldValue>,
    text: OrderText,
    cost: Option<Decimal>,
    send_sms: bool,
    data_sent: Option<serde_json::Value>,
    marketplace_task_id: Option<String>,
    drafts: Vec<StaffStamp>,
    publishes: Vec<StaffStamp>,
    status_log: Vec<StatusLogEntry>,
    completed_time: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            client_id: ClientId(0),
            store_id: StoreId(0),
            customer_id: None,
            phone: String::new(),
            status: OrderStatus::Created,
            departments: Vec::new(),
            invoices: Vec::new(),
            field_values: Vec::new(),
            text: OrderText::default(),
            cost: None,
            send_sms: false,
            data_sent: None,
            marketplace_task_id: None,
            drafts: Vec::new(),
            publishes: Vec::new(),
            status_log: Vec::new(),
            completed_time: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn departments(&self) -> &[DepartmentId] {
        &self.departments
    }

    pub fn invoices(&self) -> &[OrderInvoice] {
        &self.invoices
    }

    pub fn invoices_mut(&mut self) -> &mut [OrderInvoice] {
        &mut self.invoices
    }

    pub fn field_values(&self) -> &[FieldValue] {
        &self.field_values
    }

    pub fn text(&self) -> &OrderText {
        &self.text
    }

    pub fn cost(&self) -> Option<Decimal> {
        self.cost
    }

    pub fn send_sms(&self) -> bool {
        self.send_sms
    }

    pub fn data_sent(&self) -> Option<&serde_json::Value> {
        self.data_sent.as_ref()
    }

    pub fn marketplace_task_id(&self) -> Option<&str> {
        self.marketplace_task_id.as_deref()
    }

    pub fn status_log(&self) -> &[StatusLogEntry] {
        &self.status_log
    }

    pub fn completed_time(&self) -> Option<DateTime<Utc>> {
        self.completed_time
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// First draft save (the order's creation).
    pub fn draft(&self) -> Option<&StaffStamp> {
        self.drafts.first()
    }

    pub fn publication(&self) -> Option<&StaffStamp> {
        self.publishes.first()
    }

    pub fn is_published(&self) -> bool {
        !self.publishes.is_empty()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.draft().map(|d| d.created).or(self.created_at)
    }

    /// Name of the employee who created the order, `?` when unknown.
    pub fn fio(&self) -> &str {
        self.draft().map_or("?", |d| d.employee_name.as_str())
    }

    pub fn publish_date(&self) -> Option<DateTime<Utc>> {
        self.publication().map(|p| p.created)
    }

    pub fn publish_fio(&self) -> Option<&str> {
        self.publication().map(|p| p.employee_name.as_str())
    }

    fn first_log(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        self.status_log
            .iter()
            .find(|l| l.status == status)
            .map(|l| l.created)
    }

    /// When an executor was found (first transfer log entry).
    pub fn date_find_executor(&self) -> Option<DateTime<Utc>> {
        self.first_log(OrderStatus::TransferredToExecutor)
    }

    /// When the order was completed (first completion log entry).
    pub fn date_completed(&self) -> Option<DateTime<Utc>> {
        self.first_log(OrderStatus::Completed)
    }

    pub fn has_department(&self, departments: &[DepartmentId]) -> bool {
        self.departments.iter().any(|d| departments.contains(d))
    }

    /// Phone or any custom-field value of the order contains `query`.
    pub fn matches_search(&self, query: &str) -> bool {
        self.phone.contains(query) || self.text.mentions(query)
    }

    pub fn price(&self, discounts: &[ServiceDiscount], view: PriceView) -> f64 {
        order_price(&self.invoices, discounts, view)
    }

    /// Lines rendered as `title count unit` rows.
    pub fn services_summary(&self) -> String {
        self.invoices
            .iter()
            .map(|l| format!("{} {} {}\n", l.title, l.display_count(), l.unit_name))
            .collect()
    }

    fn is_editable(&self) -> bool {
        !(self.status.is_closed() || self.status == OrderStatus::Completed)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub phone: String,
    pub send_sms: bool,
    pub invoices: Vec<OrderInvoice>,
    pub field_values: Vec<FieldValue>,
    pub text: OrderText,
    pub discounts: Vec<ServiceDiscount>,
    pub employee_id: UserId,
    pub employee_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditOrder.
///
/// `invoices` is the complete desired set of lines; existing lines are
/// matched by (service, department).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOrder {
    pub order_id: OrderId,
    pub phone: String,
    pub invoices: Vec<OrderInvoice>,
    pub field_values: Vec<FieldValue>,
    pub text: OrderText,
    pub discounts: Vec<ServiceDiscount>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SaveDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDraft {
    pub order_id: OrderId,
    pub employee_id: UserId,
    pub employee_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PublishOrder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOrder {
    pub order_id: OrderId,
    pub employee_id: UserId,
    pub employee_name: String,
    pub data_sent: serde_json::Value,
    pub marketplace_task_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignExecutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignExecutor {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    EditOrder(EditOrder),
    SaveDraft(SaveDraft),
    PublishOrder(PublishOrder),
    AssignExecutor(AssignExecutor),
    ChangeStatus(ChangeStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated {
        order_id: OrderId,
        client_id: ClientId,
        store_id: StoreId,
        customer_id: Option<CustomerId>,
        phone: String,
        send_sms: bool,
        invoices: Vec<OrderInvoice>,
        field_values: Vec<FieldValue>,
        text: OrderText,
        cost: Option<Decimal>,
        draft: StaffStamp,
    },
    OrderEdited {
        order_id: OrderId,
        phone: String,
        phone_changed: bool,
        invoices: Vec<OrderInvoice>,
        field_values: Vec<FieldValue>,
        text: OrderText,
        cost: Option<Decimal>,
    },
    DraftSaved {
        order_id: OrderId,
        draft: StaffStamp,
    },
    OrderPublished {
        order_id: OrderId,
        publication: StaffStamp,
        data_sent: serde_json::Value,
        marketplace_task_id: Option<String>,
    },
    StatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        occurred_at: DateTime<Utc>,
    },
    /// A final status arrived; earlier completion entries are void.
    CompletionRevoked { order_id: OrderId },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "orders.order.created",
            OrderEvent::OrderEdited { .. } => "orders.order.edited",
            OrderEvent::DraftSaved { .. } => "orders.order.draft_saved",
            OrderEvent::OrderPublished { .. } => "orders.order.published",
            OrderEvent::StatusChanged { .. } => "orders.order.status_changed",
            OrderEvent::CompletionRevoked { .. } => "orders.order.completion_revoked",
        }
    }
}

fn departments_of(invoices: &[OrderInvoice]) -> Vec<DepartmentId> {
    let mut out = Vec::new();
    for l in invoices {
        if !out.contains(&l.department_id) {
            out.push(l.department_id);
        }
    }
    out
}

fn customer_cost(invoices: &[OrderInvoice], discounts: &[ServiceDiscount]) -> Option<Decimal> {
    f64_to_money(order_price(invoices, discounts, PriceView::Customer))
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated {
                order_id,
                client_id,
                store_id,
                customer_id,
                phone,
                send_sms,
                invoices,
                field_values,
                text,
                cost,
                draft,
            } => {
                self.id = *order_id;
                self.client_id = *client_id;
                self.store_id = *store_id;
                self.customer_id = *customer_id;
                self.phone = phone.clone();
                self.send_sms = *send_sms;
                self.status = OrderStatus::Created;
                self.departments = departments_of(invoices);
                self.invoices = invoices.clone();
                self.field_values = field_values.clone();
                self.text = text.clone();
                self.cost = *cost;
                self.created_at = Some(draft.created);
                self.status_log.push(StatusLogEntry {
                    status: OrderStatus::Created,
                    created: draft.created,
                });
                self.drafts.push(draft.clone());
                self.created = true;
            }
            OrderEvent::OrderEdited {
                phone,
                invoices,
                field_values,
                text,
                cost,
                ..
            } => {
                self.phone = phone.clone();
                // Departments only accumulate.
                for d in departments_of(invoices) {
                    if !self.departments.contains(&d) {
                        self.departments.push(d);
                    }
                }
                self.invoices = invoices.clone();
                self.field_values = field_values.clone();
                self.text = text.clone();
                self.cost = *cost;
            }
            OrderEvent::DraftSaved { draft, .. } => {
                self.drafts.push(draft.clone());
            }
            OrderEvent::OrderPublished {
                publication,
                data_sent,
                marketplace_task_id,
                ..
            } => {
                self.status = OrderStatus::Published;
                self.data_sent = Some(data_sent.clone());
                if marketplace_task_id.is_some() {
                    self.marketplace_task_id = marketplace_task_id.clone();
                }
                self.status_log.push(StatusLogEntry {
                    status: OrderStatus::Published,
                    created: publication.created,
                });
                self.publishes.push(publication.clone());
            }
            OrderEvent::StatusChanged { to, occurred_at, .. } => {
                self.status = *to;
                if *to == OrderStatus::Completed {
                    self.completed_time = Some(*occurred_at);
                }
                self.status_log.push(StatusLogEntry {
                    status: *to,
                    created: *occurred_at,
                });
            }
            OrderEvent::CompletionRevoked { .. } => {
                self.status_log.retain(|l| l.status != OrderStatus::Completed);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::EditOrder(cmd) => self.handle_edit(cmd),
            OrderCommand::SaveDraft(cmd) => self.handle_save_draft(cmd),
            OrderCommand::PublishOrder(cmd) => self.handle_publish(cmd),
            OrderCommand::AssignExecutor(cmd) => self.handle_assign_executor(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.phone.trim().is_empty() {
            return Err(DomainError::validation("phone is required"));
        }
        if cmd.invoices.iter().any(|l| l.count < 0.0) {
            return Err(DomainError::validation("count must not be negative"));
        }

        Ok(vec![OrderEvent::OrderCreated {
            order_id: cmd.order_id,
            client_id: cmd.client_id,
            store_id: cmd.store_id,
            customer_id: cmd.customer_id,
            phone: cmd.phone.clone(),
            send_sms: cmd.send_sms,
            invoices: cmd.invoices.clone(),
            field_values: cmd.field_values.clone(),
            text: cmd.text.clone(),
            cost: customer_cost(&cmd.invoices, &cmd.discounts),
            draft: StaffStamp {
                employee_id: cmd.employee_id,
                employee_name: cmd.employee_name.clone(),
                created: cmd.occurred_at,
            },
        }])
    }

    fn handle_edit(&self, cmd: &EditOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if !self.is_editable() {
            return Err(DomainError::invariant(format!(
                "order in status '{}' cannot be edited",
                self.status
            )));
        }
        if cmd.invoices.iter().any(|l| l.count < 0.0) {
            return Err(DomainError::validation("count must not be negative"));
        }

        let mut merged: Vec<OrderInvoice> = self
            .invoices
            .iter()
            .filter(|old| cmd.invoices.iter().any(|new| new.key() == old.key()))
            .cloned()
            .collect();
        for new in &cmd.invoices {
            match merged.iter_mut().find(|old| old.key() == new.key()) {
                Some(old) => {
                    old.count = new.count;
                    old.cost = new.cost;
                    old.cost_signedup = new.cost_signedup;
                }
                None => merged.push(new.clone()),
            }
        }

        let cost = customer_cost(&merged, &cmd.discounts);
        Ok(vec![OrderEvent::OrderEdited {
            order_id: cmd.order_id,
            phone: cmd.phone.clone(),
            phone_changed: cmd.phone != self.phone,
            invoices: merged,
            field_values: cmd.field_values.clone(),
            text: cmd.text.clone(),
            cost,
        }])
    }

    fn handle_save_draft(&self, cmd: &SaveDraft) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        Ok(vec![OrderEvent::DraftSaved {
            order_id: cmd.order_id,
            draft: StaffStamp {
                employee_id: cmd.employee_id,
                employee_name: cmd.employee_name.clone(),
                created: cmd.occurred_at,
            },
        }])
    }

    fn handle_publish(&self, cmd: &PublishOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if !matches!(self.status, OrderStatus::Created | OrderStatus::Published) {
            return Err(DomainError::invariant(format!(
                "order in status '{}' cannot be published",
                self.status
            )));
        }
        Ok(vec![OrderEvent::OrderPublished {
            order_id: cmd.order_id,
            publication: StaffStamp {
                employee_id: cmd.employee_id,
                employee_name: cmd.employee_name.clone(),
                created: cmd.occurred_at,
            },
            data_sent: cmd.data_sent.clone(),
            marketplace_task_id: cmd.marketplace_task_id.clone(),
        }])
    }

    /// Only a published order moves on; otherwise the executor changes
    /// without a status transition.
    fn handle_assign_executor(&self, cmd: &AssignExecutor) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if self.status != OrderStatus::Published {
            return Ok(Vec::new());
        }
        Ok(vec![OrderEvent::StatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: OrderStatus::TransferredToExecutor,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        if cmd.status == OrderStatus::Created {
            return Err(DomainError::validation("an order cannot return to draft"));
        }

        let mut events = Vec::new();
        if !self.status.is_closed() {
            events.push(OrderEvent::StatusChanged {
                order_id: cmd.order_id,
                from: self.status,
                to: cmd.status,
                occurred_at: cmd.occurred_at,
            });
        }
        if cmd.status.is_closed() {
            events.push(OrderEvent::CompletionRevoked {
                order_id: cmd.order_id,
            });
        }
        Ok(events)
    }
}
