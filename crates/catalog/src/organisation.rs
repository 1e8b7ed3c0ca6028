use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use terminal_core::{CityId, ClientId, ContractorId, DepartmentId, StoreId};

/// A client company using the terminal in its stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub title: String,
    #[serde(default)]
    pub client_type: String,
    /// Share of the service price paid to contractors, in percent.
    #[serde(default)]
    pub contractors_percent: Option<Decimal>,
    /// Whether the client prints its own order blank.
    #[serde(default)]
    pub own_blank: bool,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub title: String,
    /// ISO-like country code, e.g. `"ru"`, `"kz"`.
    pub country_code: String,
    /// City identifier on the marketplace side.
    pub marketplace_city_id: u64,
}

impl City {
    pub fn is_kazakhstan(&self) -> bool {
        self.country_code.eq_ignore_ascii_case("kz")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub client_id: ClientId,
    pub title: String,
    pub city: City,
    #[serde(default)]
    pub is_archive: bool,
    /// Contractor the marketplace should prefer for this store.
    #[serde(default)]
    pub contractor_id: Option<ContractorId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub store_id: StoreId,
    pub title: String,
}

/// A company executing orders. Exactly one contractor is the platform
/// aggregator itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contractor {
    pub id: ContractorId,
    pub title: String,
    #[serde(default)]
    pub is_aggregator: bool,
    #[serde(default)]
    pub price_percents: Decimal,
}
