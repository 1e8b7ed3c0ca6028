//! Spreadsheet export of completed orders.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;

use terminal_auth::{Permission, StaffProfile, authorize};
use terminal_catalog::{Contractor, CustomField, Department, ServiceDiscount, Store};
use terminal_core::rounding::decimal_to_f64;
use terminal_core::{
    ClientId, ContractorId, DepartmentId, ExportId, OrderId, ServiceId, StoreId, round_half_even,
};
use terminal_orders::{Feedback, Order, OrderInvoice, OrderStatus, PriceView, line_price};

use super::{AppServices, WorkflowResult, format_time, line_services};
use crate::export::{Cell, Sheet, write_xlsx_file};
use crate::repository::{ExportRecord, Repository};

pub const EXPORT_FILE_TYPE: &str = "orders_xls";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportQuery {
    pub order_ids: Vec<OrderId>,
    pub department_ids: Vec<DepartmentId>,
    pub store_ids: Vec<StoreId>,
    /// The first listed client also picks the custom field columns.
    pub client_ids: Vec<ClientId>,
    /// Inclusive bounds on the completion date.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub contractor_id: Option<ContractorId>,
    pub client_price: bool,
    pub aggregator_price: bool,
    pub contractor_name: bool,
    pub contractor_price: bool,
    pub executor: bool,
    /// One row per order instead of one row per line unit.
    pub concatenate: bool,
    /// Order id filter as received, kept on the export record.
    pub raw_ids: String,
}

impl Default for ExportQuery {
    fn default() -> Self {
        Self {
            order_ids: Vec::new(),
            department_ids: Vec::new(),
            store_ids: Vec::new(),
            client_ids: Vec::new(),
            date_from: None,
            date_to: None,
            contractor_id: None,
            client_price: false,
            aggregator_price: false,
            contractor_name: false,
            contractor_price: false,
            executor: false,
            concatenate: true,
            raw_ids: String::new(),
        }
    }
}

impl ExportQuery {
    fn selects(&self, order: &Order) -> bool {
        if order.status() != OrderStatus::Completed {
            return false;
        }
        if !self.order_ids.is_empty() && !self.order_ids.contains(&order.id_typed()) {
            return false;
        }
        if !self.department_ids.is_empty() && !order.has_department(&self.department_ids) {
            return false;
        }
        if !self.store_ids.is_empty() && !self.store_ids.contains(&order.store_id()) {
            return false;
        }
        if !self.client_ids.is_empty() && !self.client_ids.contains(&order.client_id()) {
            return false;
        }
        let completed = order.completed_time().map(|t| t.date_naive());
        if let Some(from) = self.date_from {
            if completed.is_none_or(|d| d < from) {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if completed.is_none_or(|d| d > to) {
                return false;
            }
        }
        if let Some(contractor) = self.contractor_id {
            let open_or_theirs = order
                .invoices()
                .iter()
                .any(|l| l.contractor_id.is_none() || l.contractor_id == Some(contractor));
            if !open_or_theirs {
                return false;
            }
        }
        true
    }
}

/// Everything a sheet needs besides the orders themselves.
#[derive(Debug, Default)]
pub struct ExportContext {
    pub departments: HashMap<DepartmentId, Department>,
    pub stores: HashMap<StoreId, Store>,
    pub contractors: HashMap<ContractorId, Contractor>,
    pub aggregator: Option<Contractor>,
    pub discounts: Vec<ServiceDiscount>,
    pub feedback: HashMap<OrderId, Feedback>,
    /// Custom field columns, already ordered.
    pub fields: Vec<CustomField>,
}

impl ExportContext {
    fn aggregator_id(&self) -> Option<ContractorId> {
        self.aggregator.as_ref().map(|a| a.id)
    }

    fn aggregator_title(&self) -> String {
        self.aggregator
            .as_ref()
            .map(|a| a.title.clone())
            .unwrap_or_default()
    }

    fn contractor_titles(&self, order: &Order) -> String {
        let mut titles: Vec<String> = Vec::new();
        for line in order.invoices() {
            if let Some(c) = line.contractor_id.and_then(|id| self.contractors.get(&id)) {
                if !titles.contains(&c.title) {
                    titles.push(c.title.clone());
                }
            }
        }
        if titles.is_empty() {
            self.aggregator_title()
        } else {
            titles.join(", ")
        }
    }
}

/// Per-line client and aggregator prices leave missing and zero amounts blank.
fn line_amount(unit_cost: Option<Decimal>, lines: &[OrderInvoice], discounts: &[ServiceDiscount]) -> Cell {
    match unit_cost.filter(|c| !c.is_zero()) {
        None => Cell::Empty,
        cost => Cell::opt_number(line_price(cost, lines, discounts)),
    }
}

/// Contractor payouts are rounded to whole units after a one-cent nudge.
fn contractor_payout(price: f64) -> f64 {
    round_half_even(price + 0.01, 0)
}

fn columns(query: &ExportQuery, fields: &[CustomField]) -> Vec<String> {
    let mut columns: Vec<String> = ["ID", "City", "Store", "Department", "Publisher", "Services"]
        .into_iter()
        .map(str::to_string)
        .collect();
    if query.client_price {
        columns.push("Client price".into());
    }
    if query.aggregator_price {
        columns.push("Aggregator price".into());
    }
    if query.contractor_name {
        columns.push("Contractor".into());
    }
    if query.contractor_price {
        columns.push("Contractor price".into());
    }
    for f in fields {
        columns.push(f.label.clone().unwrap_or_else(|| f.field_name.clone()));
    }
    columns.push("Feedback".into());
    if query.executor {
        columns.push("Executor".into());
    }
    for c in ["Status", "Created date", "Publish date", "Executor found", "Closed"] {
        columns.push(c.into());
    }
    columns
}

/// Lay out the export sheet.
pub fn build_sheet(orders: &[Order], ctx: &ExportContext, query: &ExportQuery) -> Sheet {
    let mut rows = Vec::new();
    for order in orders {
        let store = ctx.stores.get(&order.store_id());
        let feedback = ctx.feedback.get(&order.id_typed());
        let head = |department: String, services: String| -> Vec<Cell> {
            vec![
                Cell::Number(order.id_typed().get() as f64),
                Cell::text(store.map(|s| s.city.title.clone()).unwrap_or_default()),
                Cell::text(store.map(|s| s.title.clone()).unwrap_or_default()),
                Cell::text(department),
                Cell::text(order.publish_fio().unwrap_or_default()),
                Cell::text(services),
            ]
        };
        let tail = |row: &mut Vec<Cell>| {
            for f in &ctx.fields {
                let value = order
                    .field_values()
                    .iter()
                    .find(|v| v.custom_field_id == f.id)
                    .map(|v| v.value.clone())
                    .unwrap_or_default();
                row.push(Cell::Text(value));
            }
            row.push(Cell::opt_number(feedback.and_then(Feedback::rate)));
            if query.executor {
                row.push(Cell::text(
                    feedback.and_then(|f| f.executor_fio.clone()).unwrap_or_default(),
                ));
            }
            row.push(Cell::text(order.status().title()));
            row.push(Cell::text(format_time(order.date())));
            row.push(Cell::text(format_time(order.publish_date())));
            row.push(Cell::text(format_time(order.date_find_executor())));
            row.push(Cell::text(format_time(order.completed_time())));
        };

        if query.concatenate {
            let departments = order
                .departments()
                .iter()
                .filter_map(|id| ctx.departments.get(id))
                .map(|d| d.title.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut row = head(departments, order.services_summary());
            if query.client_price {
                row.push(Cell::opt_number(order.cost().map(decimal_to_f64)));
            }
            if query.aggregator_price {
                row.push(Cell::Number(order.price(&ctx.discounts, PriceView::Platform)));
            }
            if query.contractor_name {
                row.push(Cell::text(ctx.contractor_titles(order)));
            }
            if query.contractor_price {
                let price = order.price(&ctx.discounts, PriceView::Contractor {
                    aggregator_id: ctx.aggregator_id(),
                });
                row.push(Cell::Number(contractor_payout(price)));
            }
            tail(&mut row);
            rows.push(row);
            continue;
        }

        // Every row of an order names all of its contractors.
        let contractors = ctx.contractor_titles(order);
        for line in order.invoices() {
            let department = ctx
                .departments
                .get(&line.department_id)
                .map(|d| d.title.clone())
                .unwrap_or_default();
            let mut row = head(department, line.title.clone());
            if query.client_price {
                row.push(line_amount(line.cost, order.invoices(), &ctx.discounts));
            }
            if query.aggregator_price {
                row.push(line_amount(line.cost_signedup, order.invoices(), &ctx.discounts));
            }
            if query.contractor_name {
                row.push(Cell::text(contractors.clone()));
            }
            if query.contractor_price {
                let by_aggregator = line.contractor_id.is_some() && line.contractor_id == ctx.aggregator_id();
                let cell = if by_aggregator {
                    Cell::Number(0.0)
                } else {
                    Cell::opt_number(
                        line_price(line.cost_contractor, order.invoices(), &ctx.discounts)
                            .map(contractor_payout),
                    )
                };
                row.push(cell);
            }
            tail(&mut row);
            // Fractional counts are truncated.
            for _ in 0..(line.count.max(0.0) as usize) {
                rows.push(row.clone());
            }
        }
    }

    Sheet {
        columns: columns(query, &ctx.fields),
        rows,
    }
}

impl AppServices {
    /// Write the matching completed orders to a spreadsheet and return its
    /// public link.
    #[tracing::instrument(skip(self, profile, query), fields(user_id = %profile.user_id), err)]
    pub async fn export_orders(
        &self,
        profile: &StaffProfile,
        query: &ExportQuery,
        now: DateTime<Utc>,
    ) -> WorkflowResult<String> {
        authorize(profile, &Permission::ORDERS_EXPORT)?;
        let own_stores = (!profile.is_terminal_admin()).then(|| profile.stores());

        let mut orders: Vec<Order> = self
            .repos
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|o| query.selects(o))
            .filter(|o| own_stores.as_ref().is_none_or(|s| s.contains(&o.store_id())))
            .collect();
        orders.sort_by_key(Order::id_typed);

        let fields = match query.contractor_id {
            Some(_) => Vec::new(),
            None => {
                let client = query
                    .client_ids
                    .first()
                    .copied()
                    .or_else(|| orders.first().map(Order::client_id));
                let mut fields: Vec<CustomField> = self
                    .repos
                    .custom_fields
                    .list()
                    .await?
                    .into_iter()
                    .filter(|f| Some(f.client_id) == client && f.show_in_xls)
                    .collect();
                fields.sort_by_key(|f| std::cmp::Reverse(f.index_number));
                fields
            }
        };

        let service_ids: Vec<ServiceId> = orders
            .iter()
            .flat_map(|o| line_services(o.invoices()))
            .collect();
        let ctx = ExportContext {
            departments: self.departments_by_id().await?,
            stores: self
                .repos
                .stores
                .list()
                .await?
                .into_iter()
                .map(|s| (s.id, s))
                .collect(),
            contractors: self
                .repos
                .contractors
                .list()
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            aggregator: self.aggregator().await?,
            discounts: self.discounts_for(&service_ids).await?,
            feedback: self
                .repos
                .feedback
                .list()
                .await?
                .into_iter()
                .map(|f| (f.order_id, f))
                .collect(),
            fields,
        };
        let sheet = build_sheet(&orders, &ctx, query);

        let owner = profile.export_owner();
        let file_name = format!(
            "orders_{}_{:08x}.xlsx",
            now.format("%Y-%m-%d"),
            rand::thread_rng().r#gen::<u32>()
        );
        let path = self.config.export_dir.join(&owner).join(&file_name);
        write_xlsx_file(path.clone(), sheet).await?;

        let link = format!("{}{}/{}", self.config.export_base_url, owner, file_name);
        let record = ExportRecord {
            id: ExportId(self.repos.exports.next_id().await?),
            ids: query.raw_ids.clone(),
            file_type: EXPORT_FILE_TYPE.to_string(),
            path: path.display().to_string(),
            link: link.clone(),
            created: now,
        };
        self.repos.exports.upsert(record).await?;
        tracing::info!(orders = orders.len(), link = %link, "orders exported");
        Ok(link)
    }
}
