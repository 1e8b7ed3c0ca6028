//! Order lists: the operator's admin list, the store list and search.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use terminal_auth::{Permission, StaffProfile, StaffRole, authorize, has_access_to_store};
use terminal_catalog::{ADDRESS_FIELD, Client, Department, Store};
use terminal_core::{ClientId, DepartmentId, OrderId, StoreId};
use terminal_orders::{Feedback, Order, OrderStatus};

use super::{AppServices, WorkflowError, WorkflowResult};
use crate::repository::Repository;

pub const ADMIN_PAGE_SIZE: usize = 50;
pub const DEFAULT_STORE_LIST_COUNT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentRef {
    pub id: DepartmentId,
    pub title: String,
}

impl DepartmentRef {
    /// Resolve ids in order, skipping departments that no longer exist.
    pub fn list(ids: &[DepartmentId], all: &HashMap<DepartmentId, Department>) -> Vec<Self> {
        ids.iter()
            .filter_map(|id| all.get(id))
            .map(|d| DepartmentRef {
                id: d.id,
                title: d.title.clone(),
            })
            .collect()
    }
}

/// One order as shown in lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub date: Option<DateTime<Utc>>,
    pub fio: String,
    pub published: bool,
    pub send_sms: bool,
    pub status: &'static str,
    pub status_id: u8,
    pub departments: Vec<DepartmentRef>,
    pub departments_str: String,
    /// Average customer rating.
    pub feedback: Option<f64>,
    pub documents_uploaded: bool,
    pub client: String,
    pub store_title: String,
    pub city_title: String,
    pub date_completed: Option<DateTime<Utc>>,
    pub executor_fio: String,
    pub executor_id: Option<u64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPage {
    pub current_page: usize,
    pub total_pages: usize,
    pub orders: Vec<OrderRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminListQuery {
    /// Empty means every status.
    pub statuses: Vec<OrderStatus>,
    pub sort_desc: bool,
    /// `kz` keeps Kazakhstan stores; anything else excludes them.
    pub country: Option<String>,
    /// 1-based; defaults to the first page.
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreListQuery {
    /// Empty means every store of the profile.
    pub store_ids: Vec<StoreId>,
    pub published: bool,
    pub successful: bool,
    pub departments: Vec<DepartmentId>,
    /// Page size.
    pub count: Option<usize>,
    /// 1-based; defaults to the first page.
    pub page: Option<usize>,
}

/// Lookups shared by every row of a listing.
struct RowContext {
    departments: HashMap<DepartmentId, Department>,
    stores: HashMap<StoreId, Store>,
    clients: HashMap<ClientId, Client>,
    feedback: HashMap<OrderId, Feedback>,
}

impl RowContext {
    fn row(&self, order: &Order) -> OrderRow {
        let departments = DepartmentRef::list(order.departments(), &self.departments);
        let departments_str = departments
            .iter()
            .map(|d| d.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let store = self.stores.get(&order.store_id());
        let feedback = self.feedback.get(&order.id_typed());

        OrderRow {
            id: order.id_typed(),
            date: order.date(),
            fio: order.fio().to_string(),
            published: order.is_published(),
            send_sms: order.send_sms(),
            status: order.status().title(),
            status_id: order.status().code(),
            departments,
            departments_str,
            feedback: feedback.and_then(Feedback::rate),
            documents_uploaded: feedback.is_some_and(Feedback::documents_uploaded),
            client: self
                .clients
                .get(&order.client_id())
                .map(|c| c.title.clone())
                .unwrap_or_default(),
            store_title: store.map(|s| s.title.clone()).unwrap_or_default(),
            city_title: store.map(|s| s.city.title.clone()).unwrap_or_default(),
            date_completed: order.date_completed(),
            executor_fio: feedback
                .and_then(|f| f.executor_fio.clone())
                .unwrap_or_default(),
            executor_id: feedback.and_then(|f| f.executor_id),
            address: order.text().field_value(ADDRESS_FIELD).map(str::to_string),
        }
    }
}

fn paginate<T>(items: Vec<T>, page: Option<usize>, page_size: usize) -> (usize, usize, Vec<T>) {
    let total_pages = items.len().div_ceil(page_size).max(1);
    let page = page.unwrap_or(1);
    if page == 0 || page > total_pages {
        return (page, total_pages, Vec::new());
    }
    let rows = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    (page, total_pages, rows)
}

impl AppServices {
    async fn row_context(&self) -> WorkflowResult<RowContext> {
        Ok(RowContext {
            departments: self.departments_by_id().await?,
            stores: self
                .repos
                .stores
                .list()
                .await?
                .into_iter()
                .map(|s| (s.id, s))
                .collect(),
            clients: self
                .repos
                .clients
                .list()
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            feedback: self
                .repos
                .feedback
                .list()
                .await?
                .into_iter()
                .map(|f| (f.order_id, f))
                .collect(),
        })
    }

    /// Paged list of every order on the platform.
    pub async fn admin_list(&self, profile: &StaffProfile, query: &AdminListQuery) -> WorkflowResult<OrderPage> {
        authorize(profile, &Permission::ORDERS_ADMIN_LIST)?;
        let ctx = self.row_context().await?;
        let want_kz = query
            .country
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("kz"));

        let mut orders: Vec<Order> = self
            .repos
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|o| query.statuses.is_empty() || query.statuses.contains(&o.status()))
            .filter(|o| {
                ctx.stores
                    .get(&o.store_id())
                    .is_some_and(|s| s.city.is_kazakhstan() == want_kz)
            })
            .collect();
        orders.sort_by_key(Order::id_typed);
        if query.sort_desc {
            orders.reverse();
        }

        let (current_page, total_pages, page) = paginate(orders, query.page, ADMIN_PAGE_SIZE);
        Ok(OrderPage {
            current_page,
            total_pages,
            orders: page.iter().map(|o| ctx.row(o)).collect(),
        })
    }

    /// Newest orders of the profile's stores, filtered by lifecycle stage.
    pub async fn store_list(&self, profile: &StaffProfile, query: &StoreListQuery) -> WorkflowResult<OrderPage> {
        authorize(profile, &Permission::ORDERS_READ)?;
        if let [single] = query.store_ids.as_slice() {
            if !has_access_to_store(profile, *single) {
                return Err(WorkflowError::Forbidden(format!("store {single}")));
            }
        }

        let stores: Option<Vec<StoreId>> = if query.store_ids.is_empty() {
            (!profile.is_terminal_admin()).then(|| profile.stores())
        } else {
            Some(
                query
                    .store_ids
                    .iter()
                    .copied()
                    .filter(|s| has_access_to_store(profile, *s))
                    .collect(),
            )
        };
        let statuses: &[OrderStatus] = match (query.published, query.successful) {
            (true, true) => &OrderStatus::SUCCESSFUL,
            (true, false) => &OrderStatus::UNSUCCESSFUL,
            (false, _) => &[OrderStatus::Created],
        };
        let own_departments = !profile.role.sees_all_departments();

        let mut orders: Vec<Order> = self
            .repos
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|o| stores.as_ref().is_none_or(|s| s.contains(&o.store_id())))
            .filter(|o| statuses.contains(&o.status()))
            .filter(|o| query.departments.is_empty() || o.has_department(&query.departments))
            .filter(|o| !own_departments || o.has_department(&profile.department_ids))
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.id_typed()));
        let page_size = query.count.unwrap_or(DEFAULT_STORE_LIST_COUNT).max(1);
        let (current_page, total_pages, page) = paginate(orders, query.page, page_size);

        let ctx = self.row_context().await?;
        Ok(OrderPage {
            current_page,
            total_pages,
            orders: page.iter().map(|o| ctx.row(o)).collect(),
        })
    }

    /// Published orders whose phone or field values contain `query`.
    pub async fn search(&self, profile: &StaffProfile, query: &str) -> WorkflowResult<Vec<OrderRow>> {
        authorize(profile, &Permission::ORDERS_SEARCH)?;
        if !matches!(profile.role, StaffRole::TerminalAdmin | StaffRole::TerminalCoworker) {
            return Err(WorkflowError::Forbidden("search is limited to terminal staff".to_string()));
        }
        let query = query.trim();

        let mut orders: Vec<Order> = self
            .repos
            .orders
            .list()
            .await?
            .into_iter()
            .filter(|o| o.is_published() && o.matches_search(query))
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.id_typed()));

        let ctx = self.row_context().await?;
        Ok(orders.iter().map(|o| ctx.row(o)).collect())
    }
}
