use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;

use terminal_core::{DepartmentId, DomainError, OrderId, StoreId, parse_id_list};
use terminal_infra::config::parse_bool;
use terminal_infra::workflows::{AdminListQuery, ExportQuery, StoreListQuery};
use terminal_orders::OrderStatus;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct FormParams {
    pub store_id: StoreId,
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct ExecutorAssignRequest {
    pub order_id: OrderId,
    pub executor_phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "search")]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub orders_id: String,
}

impl DeleteParams {
    pub fn ids(&self) -> Result<Vec<OrderId>, DomainError> {
        parse_id_list(&self.orders_id)
    }
}

/// `GET /orders` query string. Values arrive as raw strings so that
/// malformed lists produce a JSON error instead of a bare rejection.
#[derive(Debug, Default, Deserialize)]
pub struct StoreListParams {
    pub stores_id: Option<String>,
    pub published: Option<String>,
    pub successful: Option<String>,
    pub departments_id: Option<String>,
    pub count: Option<String>,
    pub page: Option<String>,
}

impl StoreListParams {
    pub fn into_query(self) -> Result<StoreListQuery, DomainError> {
        Ok(StoreListQuery {
            store_ids: id_list(self.stores_id.as_deref())?,
            published: flag(self.published.as_deref(), false),
            successful: flag(self.successful.as_deref(), false),
            departments: id_list(self.departments_id.as_deref())?,
            count: optional(self.count.as_deref())?,
            page: page(self.page.as_deref()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    #[serde(alias = "status")]
    pub statuses: Option<String>,
    pub sort: Option<String>,
    pub country: Option<String>,
    pub page: Option<String>,
}

impl AdminListParams {
    pub fn into_query(self) -> Result<AdminListQuery, DomainError> {
        let statuses = id_list::<u8>(self.statuses.as_deref())?
            .into_iter()
            .map(|code| {
                OrderStatus::from_code(code)
                    .ok_or_else(|| DomainError::validation(format!("unknown status {code}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let sort_desc = match self.sort.as_deref().map(str::trim) {
            None | Some("") | Some("asc") => false,
            Some("desc") => true,
            Some(other) => return Err(DomainError::validation(format!("sort must be asc or desc, got '{other}'"))),
        };
        Ok(AdminListQuery {
            statuses,
            sort_desc,
            country: self.country.filter(|c| !c.trim().is_empty()),
            page: page(self.page.as_deref()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub orders_id: Option<String>,
    pub departments_id: Option<String>,
    pub store_id: Option<String>,
    pub client_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub contractor_id: Option<String>,
    #[serde(alias = "is_client_price")]
    pub client_price: Option<String>,
    #[serde(alias = "is_aggregator_price")]
    pub aggregator_price: Option<String>,
    #[serde(alias = "is_contractor_name")]
    pub contractor_name: Option<String>,
    #[serde(alias = "is_contractor_price")]
    pub contractor_price: Option<String>,
    #[serde(alias = "is_executor_fio")]
    pub executor: Option<String>,
    #[serde(alias = "is_concatenate_services")]
    pub concatenate: Option<String>,
}

impl ExportParams {
    pub fn into_query(self) -> Result<ExportQuery, DomainError> {
        Ok(ExportQuery {
            order_ids: id_list(self.orders_id.as_deref())?,
            department_ids: id_list(self.departments_id.as_deref())?,
            store_ids: id_list(self.store_id.as_deref())?,
            client_ids: id_list(self.client_id.as_deref())?,
            date_from: date(self.date_from.as_deref())?,
            date_to: date(self.date_to.as_deref())?,
            contractor_id: optional(self.contractor_id.as_deref())?,
            client_price: flag(self.client_price.as_deref(), false),
            aggregator_price: flag(self.aggregator_price.as_deref(), false),
            contractor_name: flag(self.contractor_name.as_deref(), false),
            contractor_price: flag(self.contractor_price.as_deref(), false),
            executor: flag(self.executor.as_deref(), false),
            concatenate: flag(self.concatenate.as_deref(), true),
            raw_ids: self.orders_id.unwrap_or_default(),
        })
    }
}

// -------------------------
// Parsing helpers
// -------------------------

fn id_list<T>(raw: Option<&str>) -> Result<Vec<T>, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| DomainError::invalid_id(format!("'{s}': {e}"))))
        .collect()
}

fn optional<T>(raw: Option<&str>) -> Result<Option<T>, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|e| DomainError::validation(format!("'{s}': {e}"))),
    }
}

/// A page that is not a number is treated as out of range.
fn page(raw: Option<&str>) -> Option<usize> {
    raw.map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<usize>().unwrap_or(0))
}

fn flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => default,
        Some(s) => parse_bool(s),
    }
}

fn date(raw: Option<&str>) -> Result<Option<NaiveDate>, DomainError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| DomainError::validation(format!("date must be YYYY-MM-DD, got '{s}'"))),
    }
}
