//! Order form, creation, card, update, publishing and deletion.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use terminal_auth::{Permission, StaffProfile, authorize, has_access_to_store};
use terminal_catalog::{
    CustomField, Department, DiscountKind, Service, ServiceDiscount, ServiceType, Store,
};
use terminal_core::rounding::decimal_to_f64;
use terminal_core::{ClientId, CustomFieldId, CustomerId, DepartmentId, OrderId, ServiceId, StoreId};
use terminal_orders::{
    CreateOrder, Customer, EditOrder, FieldValue, Order, OrderCommand, OrderEvent, OrderInvoice,
    OrderText, PublishOrder, SaveDraft,
};

use super::listing::DepartmentRef;
use super::{AppServices, WorkflowError, WorkflowResult, can_access_order, line_services};
use crate::repository::Repository;

/// Dates closer than this are checked against executor availability.
pub const SLOT_CHECK_HORIZON_DAYS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineInput {
    /// Service id.
    pub id: ServiceId,
    pub department_id: DepartmentId,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldInput {
    /// Custom field id.
    pub id: CustomFieldId,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewOrder {
    pub store_id: StoreId,
    pub phone: String,
    #[serde(default)]
    pub send_sms: bool,
    /// Comma separated `YYYY-MM-DD` list.
    #[serde(default)]
    pub dates: Option<String>,
    #[serde(default)]
    pub services: Vec<LineInput>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderUpdate {
    pub store_id: StoreId,
    pub phone: String,
    /// Publish right after saving instead of recording a draft.
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub dates: Option<String>,
    #[serde(default)]
    pub services: Vec<LineInput>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountEntry {
    pub kind: DiscountKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub id: ServiceId,
    pub title: String,
    pub service_type: ServiceType,
    pub unit_name: String,
    pub cost: Option<f64>,
    pub cost_signedup: Option<f64>,
    /// Ordered quantity (order card only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,
    pub discounts: Vec<DiscountEntry>,
}

impl ServiceEntry {
    fn from_service(service: &Service, discounts: &[ServiceDiscount]) -> Self {
        Self {
            id: service.id,
            title: service.title.clone(),
            service_type: service.service_type,
            unit_name: service.unit_name.clone(),
            cost: service.cost.map(decimal_to_f64),
            cost_signedup: service.cost_signedup.map(decimal_to_f64),
            count: None,
            discounts: discount_entries(service.id, discounts),
        }
    }

    fn from_line(line: &OrderInvoice, discounts: &[ServiceDiscount]) -> Self {
        Self {
            id: line.service_id,
            title: line.title.clone(),
            service_type: line.service_type,
            unit_name: line.unit_name.clone(),
            cost: line.cost.map(decimal_to_f64),
            cost_signedup: line.cost_signedup.map(decimal_to_f64),
            count: Some(line.count),
            discounts: discount_entries(line.service_id, discounts),
        }
    }

    fn is_discount(&self) -> bool {
        self.service_type == ServiceType::Discount
    }
}

fn discount_entries(service: ServiceId, discounts: &[ServiceDiscount]) -> Vec<DiscountEntry> {
    discounts
        .iter()
        .filter(|d| d.service_id == service)
        .map(|d| DiscountEntry {
            kind: d.kind,
            value: decimal_to_f64(d.value),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentServices {
    pub department_id: DepartmentId,
    pub department_title: String,
    pub department_services: Vec<ServiceEntry>,
}

fn department_group(department: &Department, mut services: Vec<ServiceEntry>) -> DepartmentServices {
    // Primary services first, discounts after; stable within each kind.
    services.sort_by_key(ServiceEntry::is_discount);
    DepartmentServices {
        department_id: department.id,
        department_title: department.title.clone(),
        department_services: services,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderForm {
    pub services: Vec<DepartmentServices>,
    pub fields: Vec<Value>,
    pub city_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLogView {
    pub status: &'static str,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub date: Option<DateTime<Utc>>,
    pub fio: String,
    pub publish_fio: Option<String>,
    pub status: &'static str,
    pub phone: String,
    pub departments: Vec<DepartmentRef>,
    pub send_sms: bool,
    pub cost: Option<f64>,
    pub client_id: ClientId,
    pub client_title: String,
    pub logs: Vec<StatusLogView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCard {
    pub services: Vec<DepartmentServices>,
    pub fields: Vec<Value>,
    pub order: OrderSummary,
    pub own_blank: bool,
    pub dates: String,
    pub executor_id: Option<u64>,
}

fn parse_dates(raw: &str) -> WorkflowResult<Vec<NaiveDate>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| WorkflowError::Validation(format!("invalid date '{s}'")))
        })
        .collect()
}

impl AppServices {
    /// Services and custom fields offered for a new order at `store_id`.
    pub async fn order_form(
        &self,
        profile: &StaffProfile,
        store_id: StoreId,
        department_id: Option<DepartmentId>,
    ) -> WorkflowResult<OrderForm> {
        authorize(profile, &Permission::ORDERS_READ)?;
        if !has_access_to_store(profile, store_id) {
            return Err(WorkflowError::Forbidden(format!("store {store_id}")));
        }
        let store = self.load_store(store_id).await?;
        let departments = self.departments_by_id().await?;

        let groups: Vec<&Department> = match department_id {
            Some(id) => {
                let department = departments
                    .get(&id)
                    .filter(|d| d.store_id == store.id)
                    .ok_or_else(|| WorkflowError::Validation(format!("department {id} not found")))?;
                if !profile.is_terminal_admin() && !profile.department_ids.contains(&id) {
                    return Err(WorkflowError::Forbidden(format!("department {id}")));
                }
                vec![department]
            }
            None => {
                let mut visible: Vec<&Department> = departments
                    .values()
                    .filter(|d| d.store_id == store.id)
                    .filter(|d| {
                        profile.role.sees_all_departments() || profile.department_ids.contains(&d.id)
                    })
                    .collect();
                visible.sort_by_key(|d| d.id);
                visible
            }
        };

        let services: Vec<Service> = self
            .repos
            .services
            .list()
            .await?
            .into_iter()
            .filter(|s| s.store_id == store.id)
            .collect();
        let service_ids: Vec<ServiceId> = services.iter().map(|s| s.id).collect();
        let discounts = self.discounts_for(&service_ids).await?;

        let services_by_department = groups
            .into_iter()
            .filter_map(|department| {
                let entries: Vec<ServiceEntry> = services
                    .iter()
                    .filter(|s| s.offered_by(department.id))
                    .map(|s| ServiceEntry::from_service(s, &discounts))
                    .collect();
                (!entries.is_empty()).then(|| department_group(department, entries))
            })
            .collect();

        let mut fields: Vec<CustomField> = self
            .repos
            .custom_fields
            .list()
            .await?
            .into_iter()
            .filter(|f| f.client_id == store.client_id && !f.archive)
            .collect();
        fields.sort_by_key(|f| f.index_number);

        Ok(OrderForm {
            services: services_by_department,
            fields: fields.iter().map(|f| f.describe(None)).collect(),
            city_id: store.city.marketplace_city_id,
        })
    }

    #[tracing::instrument(skip(self, profile, input), fields(user_id = %profile.user_id, store_id = %input.store_id), err)]
    pub async fn create_order(
        &self,
        profile: &StaffProfile,
        input: NewOrder,
        now: DateTime<Utc>,
    ) -> WorkflowResult<OrderId> {
        authorize(profile, &Permission::ORDERS_WRITE)?;
        if !has_access_to_store(profile, input.store_id) {
            return Err(WorkflowError::Forbidden(format!("store {}", input.store_id)));
        }
        let store = self.load_store(input.store_id).await?;
        if store.is_archive {
            return Err(WorkflowError::Rejected("store is archived".to_string()));
        }

        let dates = input
            .dates
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| WorkflowError::Validation("no date selected".to_string()))?;
        let requested = parse_dates(dates)?;
        let horizon = now.date_naive() + Duration::days(SLOT_CHECK_HORIZON_DAYS);
        let near: Vec<NaiveDate> = requested.iter().copied().filter(|d| *d < horizon).collect();

        let services = self.resolve_services(&input.services).await?;
        if !near.is_empty() {
            let service_ids: Vec<ServiceId> = services.iter().map(|s| s.id).collect();
            let available = self
                .slots
                .slots_available(&near, &service_ids, store.city.marketplace_city_id)
                .await
                .map_err(|e| WorkflowError::Upstream(e.to_string()))?;
            if !available {
                let listed = requested
                    .iter()
                    .map(|d| d.format("%d %B %Y").to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(WorkflowError::Rejected(format!(
                    "no free executors on these dates: {listed}"
                )));
            }
        }

        let customer = self.customer_for(&input.phone, store.client_id).await?;
        let invoices = build_invoices(&services, &input.services);
        let (field_values, text) = self
            .fields_and_text(store.client_id, &invoices, &input.fields, Some(dates))
            .await?;
        let discounts = self.discounts_for(&line_services(&invoices)).await?;

        let order_id = OrderId(self.repos.orders.next_id().await?);
        let mut order = Order::empty(order_id);
        self.execute(
            &mut order,
            OrderCommand::CreateOrder(CreateOrder {
                order_id,
                client_id: store.client_id,
                store_id: store.id,
                customer_id: Some(customer.id),
                phone: input.phone.trim().to_string(),
                send_sms: input.send_sms,
                invoices,
                field_values,
                text,
                discounts,
                employee_id: profile.user_id,
                employee_name: profile.full_name.clone(),
                occurred_at: now,
            }),
        )
        .await?;

        if order.send_sms() {
            self.notify(
                order.phone(),
                &format!("Your request No.{order_id} has been registered"),
            )
            .await;
        }
        tracing::info!(order_id = %order_id, "order created");
        Ok(order_id)
    }

    pub async fn order_card(&self, profile: &StaffProfile, order_id: OrderId) -> WorkflowResult<OrderCard> {
        authorize(profile, &Permission::ORDERS_READ)?;
        let order = self.load_order(order_id).await?;
        if !profile.is_terminal_admin()
            && !(can_access_order(profile, &order) && has_access_to_store(profile, order.store_id()))
        {
            return Err(WorkflowError::Forbidden(format!("order {order_id}")));
        }

        let client = self.load_client(order.client_id()).await?;
        let departments = self.departments_by_id().await?;
        let discounts = self.discounts_for(&line_services(order.invoices())).await?;

        // Published orders show every line; drafts only the lines of the
        // departments the user works in.
        let show_all = order.is_published() || profile.role.sees_all_departments();
        let mut grouped: Vec<(DepartmentId, Vec<ServiceEntry>)> = Vec::new();
        for line in order.invoices() {
            if !show_all && !profile.department_ids.contains(&line.department_id) {
                continue;
            }
            let entry = ServiceEntry::from_line(line, &discounts);
            match grouped.iter_mut().find(|(d, _)| *d == line.department_id) {
                Some((_, entries)) => entries.push(entry),
                None => grouped.push((line.department_id, vec![entry])),
            }
        }
        let services = grouped
            .into_iter()
            .filter_map(|(id, entries)| departments.get(&id).map(|d| department_group(d, entries)))
            .collect();

        let fields = self.field_descriptions(&order).await?;
        let feedback = self.feedback_for(order_id).await?;

        Ok(OrderCard {
            services,
            fields,
            order: OrderSummary {
                id: order_id,
                date: order.date(),
                fio: order.fio().to_string(),
                publish_fio: order.publish_fio().map(str::to_string),
                status: order.status().title(),
                phone: order.phone().to_string(),
                departments: DepartmentRef::list(order.departments(), &departments),
                send_sms: order.send_sms(),
                cost: order.cost().map(decimal_to_f64),
                client_id: client.id,
                client_title: client.title.clone(),
                logs: order
                    .status_log()
                    .iter()
                    .map(|l| StatusLogView {
                        status: l.title(),
                        created: l.created,
                    })
                    .collect(),
            },
            own_blank: client.own_blank,
            dates: order.text().dates.clone().unwrap_or_default(),
            executor_id: feedback.and_then(|f| f.executor_id),
        })
    }

    #[tracing::instrument(skip(self, profile, input), fields(user_id = %profile.user_id), err)]
    pub async fn update_order(
        &self,
        profile: &StaffProfile,
        order_id: OrderId,
        input: OrderUpdate,
        now: DateTime<Utc>,
    ) -> WorkflowResult<OrderId> {
        authorize(profile, &Permission::ORDERS_WRITE)?;
        if !has_access_to_store(profile, input.store_id) {
            return Err(WorkflowError::Forbidden(format!("store {}", input.store_id)));
        }
        let mut order = self.load_order(order_id).await?;
        if !can_access_order(profile, &order) {
            return Err(WorkflowError::Forbidden(format!("order {order_id}")));
        }
        if input.published {
            authorize(profile, &Permission::ORDERS_PUBLISH)?;
            if !profile.can_publish_orders {
                return Err(WorkflowError::Forbidden("publishing orders".to_string()));
            }
        }
        let store = self.load_store(order.store_id()).await?;
        if store.is_archive {
            return Err(WorkflowError::Rejected("store is archived".to_string()));
        }

        let dates = input
            .dates
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .or_else(|| order.text().dates.clone());
        if let Some(dates) = dates.as_deref() {
            parse_dates(dates)?;
        }

        let services = self.resolve_services(&input.services).await?;
        let invoices = build_invoices(&services, &input.services);
        let (field_values, text) = self
            .fields_and_text(order.client_id(), &invoices, &input.fields, dates.as_deref())
            .await?;
        let discounts = self.discounts_for(&line_services(&invoices)).await?;

        let events = self
            .execute(
                &mut order,
                OrderCommand::EditOrder(EditOrder {
                    order_id,
                    phone: input.phone.trim().to_string(),
                    invoices,
                    field_values,
                    text,
                    discounts,
                    occurred_at: now,
                }),
            )
            .await?;
        let phone_changed = events
            .iter()
            .any(|e| matches!(e, OrderEvent::OrderEdited { phone_changed: true, .. }));
        if phone_changed && order.send_sms() {
            self.notify(
                order.phone(),
                &format!("Your request No.{order_id} has been placed"),
            )
            .await;
        }

        if input.published {
            return self.send_to_marketplace(profile, &mut order, &store, now).await;
        }
        self.execute(
            &mut order,
            OrderCommand::SaveDraft(SaveDraft {
                order_id,
                employee_id: profile.user_id,
                employee_name: profile.full_name.clone(),
                occurred_at: now,
            }),
        )
        .await?;
        Ok(order_id)
    }

    /// Publish an existing order to the marketplace.
    #[tracing::instrument(skip(self, profile), fields(user_id = %profile.user_id), err)]
    pub async fn publish_order(
        &self,
        profile: &StaffProfile,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> WorkflowResult<OrderId> {
        authorize(profile, &Permission::ORDERS_PUBLISH)?;
        let mut order = self.load_order(order_id).await?;
        if !can_access_order(profile, &order) {
            return Err(WorkflowError::Forbidden(format!("order {order_id}")));
        }
        if !profile.can_publish_orders {
            return Err(WorkflowError::Forbidden("publishing orders".to_string()));
        }
        let store = self.load_store(order.store_id()).await?;
        if store.is_archive {
            return Err(WorkflowError::Rejected("store is archived".to_string()));
        }
        self.send_to_marketplace(profile, &mut order, &store, now).await
    }

    /// Delete the listed orders the user can access; others are skipped.
    pub async fn delete_orders(&self, profile: &StaffProfile, ids: &[OrderId]) -> WorkflowResult<usize> {
        authorize(profile, &Permission::ORDERS_DELETE)?;
        let mut deleted = 0;
        for id in ids {
            let Some(order) = self.repos.orders.get(id).await? else {
                continue;
            };
            if !can_access_order(profile, &order) {
                tracing::debug!(order_id = %id, "skipping inaccessible order");
                continue;
            }
            if self.repos.orders.remove(id).await? {
                deleted += 1;
            }
            if let Some(feedback) = self.feedback_for(*id).await? {
                self.repos.feedback.remove(&feedback.id).await?;
            }
        }
        tracing::info!(requested = ids.len(), deleted, "orders deleted");
        Ok(deleted)
    }

    async fn send_to_marketplace(
        &self,
        profile: &StaffProfile,
        order: &mut Order,
        store: &Store,
        now: DateTime<Utc>,
    ) -> WorkflowResult<OrderId> {
        let order_id = order.id_typed();
        let payload = self.publish_payload(order, store).await?;

        let response = match self.marketplace.publish_task(&payload).await {
            Ok(r) => r,
            Err(e) => {
                self.log_failure("order to signedup", e.to_string(), payload.to_string())
                    .await;
                return Err(WorkflowError::Upstream(e.to_string()));
            }
        };

        let task_id = if response.status == 201 {
            response.field_str("id")
        } else {
            self.log_failure("order to signedup", response.text.clone(), payload.to_string())
                .await;
            if !response.flag("already_exist") {
                tracing::warn!(order_id = %order_id, status = response.status, "marketplace rejected order");
                return Err(WorkflowError::Rejected("signed up error".to_string()));
            }
            None
        };

        self.execute(
            order,
            OrderCommand::PublishOrder(PublishOrder {
                order_id,
                employee_id: profile.user_id,
                employee_name: profile.full_name.clone(),
                data_sent: payload,
                marketplace_task_id: task_id,
                occurred_at: now,
            }),
        )
        .await?;
        tracing::info!(order_id = %order_id, "order published");
        Ok(order_id)
    }

    async fn publish_payload(&self, order: &Order, store: &Store) -> WorkflowResult<Value> {
        let client = self.load_client(store.client_id).await?;

        let mut subcategories = Vec::new();
        for line in order.invoices() {
            if let Some(service) = self.repos.services.get(&line.service_id).await? {
                subcategories.extend(service.subcategory_titles.iter().cloned());
            }
        }

        let mut payload = json!({
            "client_percents": client.contractors_percent.map(decimal_to_f64),
            "signedup_order_text": order.text().render(),
            "signedup_account_api_key": self.config.terminal_api_key,
            "title": format!("Corporate order from {}", client.title),
            "subcategory_titles": subcategories.join("*****"),
            "phone": order.phone(),
            "client_name": client.title,
            "client_logo": client.logo_url.clone().unwrap_or_default(),
            "client_type": client.client_type,
            "terminal_id": order.id_typed(),
            "city_id": store.city.marketplace_city_id,
            "customer": order.customer_id(),
        });
        if let Some(contractor) = store.contractor_id {
            payload["prefered_contractor_id"] = json!(contractor);
        }
        Ok(payload)
    }

    async fn resolve_services(&self, lines: &[LineInput]) -> WorkflowResult<Vec<Service>> {
        let mut services = Vec::with_capacity(lines.len());
        for line in lines {
            let service = self
                .repos
                .services
                .get(&line.id)
                .await?
                .ok_or_else(|| WorkflowError::Validation(format!("unknown service {}", line.id)))?;
            services.push(service);
        }
        Ok(services)
    }

    async fn fields_and_text(
        &self,
        client_id: ClientId,
        invoices: &[OrderInvoice],
        inputs: &[FieldInput],
        dates: Option<&str>,
    ) -> WorkflowResult<(Vec<FieldValue>, OrderText)> {
        let known: HashMap<CustomFieldId, CustomField> = self
            .repos
            .custom_fields
            .list()
            .await?
            .into_iter()
            .filter(|f| f.client_id == client_id)
            .map(|f| (f.id, f))
            .collect();

        let mut values = Vec::with_capacity(inputs.len());
        let mut pairs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let field = known
                .get(&input.id)
                .ok_or_else(|| WorkflowError::Validation(format!("unknown custom field {}", input.id)))?;
            values.push(FieldValue {
                custom_field_id: input.id,
                value: input.value.clone(),
            });
            pairs.push((field, input.value.as_str()));
        }
        let text = OrderText::build(invoices, &pairs, dates);
        Ok((values, text))
    }

    async fn field_descriptions(&self, order: &Order) -> WorkflowResult<Vec<Value>> {
        let fields: HashMap<CustomFieldId, CustomField> = self
            .repos
            .custom_fields
            .list()
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();
        let mut described: Vec<(&CustomField, &str)> = order
            .field_values()
            .iter()
            .filter_map(|v| fields.get(&v.custom_field_id).map(|f| (f, v.value.as_str())))
            .collect();
        described.sort_by_key(|(f, _)| f.index_number);
        Ok(described
            .into_iter()
            .map(|(f, value)| f.describe(Some(value)))
            .collect())
    }

    /// Customer with this phone within the client, created on first use.
    async fn customer_for(&self, phone: &str, client_id: ClientId) -> WorkflowResult<Customer> {
        let existing = self
            .repos
            .customers
            .list()
            .await?
            .into_iter()
            .find(|c| c.matches(phone, Some(client_id)));
        if let Some(customer) = existing {
            return Ok(customer);
        }
        let id = CustomerId(self.repos.customers.next_id().await?);
        let customer = Customer::new(id, phone, Some(client_id));
        self.repos.customers.upsert(customer.clone()).await?;
        Ok(customer)
    }
}

fn build_invoices(services: &[Service], lines: &[LineInput]) -> Vec<OrderInvoice> {
    services
        .iter()
        .zip(lines)
        .map(|(service, line)| OrderInvoice::for_service(service, line.department_id, line.count))
        .collect()
}
