//! Catalog and staff records loaded from a JSON file at startup.
//!
//! The catalog (clients, stores, services, ...) is administered outside this
//! service; a seed file is how it reaches a fresh deployment or a dev box.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use terminal_auth::StaffProfile;
use terminal_catalog::{Client, Contractor, CustomField, Department, Service, ServiceDiscount, Store};

use crate::repository::{Repositories, Repository, RepositoryError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub clients: Vec<Client>,
    pub stores: Vec<Store>,
    pub departments: Vec<Department>,
    pub services: Vec<Service>,
    pub discounts: Vec<ServiceDiscount>,
    pub contractors: Vec<Contractor>,
    pub custom_fields: Vec<CustomField>,
    pub staff: Vec<StaffProfile>,
}

impl SeedData {
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Upsert every record. Returns how many were written.
    pub async fn apply(self, repos: &Repositories) -> Result<usize, SeedError> {
        let SeedData {
            clients,
            stores,
            departments,
            services,
            discounts,
            contractors,
            custom_fields,
            staff,
        } = self;
        let mut written = 0;
        macro_rules! put {
            ($field:ident) => {
                for record in $field {
                    repos.$field.upsert(record).await?;
                    written += 1;
                }
            };
        }
        put!(clients);
        put!(stores);
        put!(departments);
        put!(services);
        put!(discounts);
        put!(contractors);
        put!(custom_fields);
        put!(staff);

        tracing::info!(records = written, "seed data applied");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terminal_core::{ClientId, StoreId};

    #[tokio::test]
    async fn partial_seed_files_are_accepted() {
        let seed: SeedData = serde_json::from_value(serde_json::json!({
            "clients": [{"id": 1, "title": "Acme"}],
            "stores": [{
                "id": 10,
                "client_id": 1,
                "title": "Dostyk Plaza",
                "city": {"id": 1, "title": "Almaty", "country_code": "kz", "marketplace_city_id": 77}
            }]
        }))
        .unwrap();

        let repos = Repositories::in_memory();
        assert_eq!(seed.apply(&repos).await.unwrap(), 2);
        assert_eq!(repos.clients.get(&ClientId(1)).await.unwrap().unwrap().title, "Acme");
        assert!(repos.stores.get(&StoreId(10)).await.unwrap().unwrap().city.is_kazakhstan());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = SeedData::load(Path::new("/nonexistent/seed.json")).await.unwrap_err();
        assert!(matches!(err, SeedError::Io(_)));
    }
}
