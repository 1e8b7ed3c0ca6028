//! Document repositories.
//!
//! Every record kind lives in its own collection, addressed by its key and
//! stored as a whole document. Order writes carry an [`ExpectedVersion`] so
//! concurrent edits of the same order are detected instead of lost.
//!
//! Two backends exist:
//! - [`InMemoryRepository`] for tests/dev,
//! - `PostgresRepository` (feature `postgres`): one JSONB row per document.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use terminal_auth::StaffProfile;
use terminal_catalog::{Client, Contractor, CustomField, Department, Service, ServiceDiscount, Store};
use terminal_core::ExpectedVersion;
use terminal_orders::{Customer, Feedback, Order};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod records;

pub use in_memory::InMemoryRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRepository;
pub use records::{ExportRecord, LogRecord};

/// A document that can be stored in a repository.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    type Key: Clone + Eq + core::hash::Hash + core::fmt::Display + Send + Sync + 'static;

    /// Collection (table partition) name.
    const COLLECTION: &'static str;

    fn key(&self) -> Self::Key;

    /// Version used for optimistic concurrency. Unversioned records report 0.
    fn version(&self) -> u64 {
        0
    }
}

/// Repository operation error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("record serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Keyed document storage for one record kind.
#[async_trait]
pub trait Repository<V: Record>: Send + Sync {
    async fn get(&self, key: &V::Key) -> Result<Option<V>, RepositoryError>;

    /// Insert or overwrite without a version check.
    async fn upsert(&self, value: V) -> Result<(), RepositoryError>;

    /// Overwrite only if the stored version matches `expected`.
    ///
    /// A missing record has version 0.
    async fn save(&self, value: V, expected: ExpectedVersion) -> Result<(), RepositoryError>;

    /// Returns whether a record was removed.
    async fn remove(&self, key: &V::Key) -> Result<bool, RepositoryError>;

    /// All records of the collection in insertion order.
    async fn list(&self) -> Result<Vec<V>, RepositoryError>;

    /// Allocate the next integer id of the collection (starting at 1).
    async fn next_id(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
impl<V, R> Repository<V> for Arc<R>
where
    V: Record,
    R: Repository<V> + ?Sized,
{
    async fn get(&self, key: &V::Key) -> Result<Option<V>, RepositoryError> {
        (**self).get(key).await
    }

    async fn upsert(&self, value: V) -> Result<(), RepositoryError> {
        (**self).upsert(value).await
    }

    async fn save(&self, value: V, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        (**self).save(value, expected).await
    }

    async fn remove(&self, key: &V::Key) -> Result<bool, RepositoryError> {
        (**self).remove(key).await
    }

    async fn list(&self) -> Result<Vec<V>, RepositoryError> {
        (**self).list().await
    }

    async fn next_id(&self) -> Result<u64, RepositoryError> {
        (**self).next_id().await
    }
}

/// Shared handle to a repository of `V`.
pub type Repo<V> = Arc<dyn Repository<V>>;

/// Every collection the terminal backend uses.
#[derive(Clone)]
pub struct Repositories {
    pub clients: Repo<Client>,
    pub stores: Repo<Store>,
    pub departments: Repo<Department>,
    pub services: Repo<Service>,
    pub discounts: Repo<ServiceDiscount>,
    pub contractors: Repo<Contractor>,
    pub custom_fields: Repo<CustomField>,
    pub staff: Repo<StaffProfile>,
    pub orders: Repo<Order>,
    pub customers: Repo<Customer>,
    pub feedback: Repo<Feedback>,
    pub logs: Repo<LogRecord>,
    pub exports: Repo<ExportRecord>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            clients: Arc::new(InMemoryRepository::new()),
            stores: Arc::new(InMemoryRepository::new()),
            departments: Arc::new(InMemoryRepository::new()),
            services: Arc::new(InMemoryRepository::new()),
            discounts: Arc::new(InMemoryRepository::new()),
            contractors: Arc::new(InMemoryRepository::new()),
            custom_fields: Arc::new(InMemoryRepository::new()),
            staff: Arc::new(InMemoryRepository::new()),
            orders: Arc::new(InMemoryRepository::new()),
            customers: Arc::new(InMemoryRepository::new()),
            feedback: Arc::new(InMemoryRepository::new()),
            logs: Arc::new(InMemoryRepository::new()),
            exports: Arc::new(InMemoryRepository::new()),
        }
    }

    /// Postgres-backed collections sharing one pool. Call
    /// [`postgres::ensure_schema`] first.
    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            clients: Arc::new(PostgresRepository::new(pool.clone())),
            stores: Arc::new(PostgresRepository::new(pool.clone())),
            departments: Arc::new(PostgresRepository::new(pool.clone())),
            services: Arc::new(PostgresRepository::new(pool.clone())),
            discounts: Arc::new(PostgresRepository::new(pool.clone())),
            contractors: Arc::new(PostgresRepository::new(pool.clone())),
            custom_fields: Arc::new(PostgresRepository::new(pool.clone())),
            staff: Arc::new(PostgresRepository::new(pool.clone())),
            orders: Arc::new(PostgresRepository::new(pool.clone())),
            customers: Arc::new(PostgresRepository::new(pool.clone())),
            feedback: Arc::new(PostgresRepository::new(pool.clone())),
            logs: Arc::new(PostgresRepository::new(pool.clone())),
            exports: Arc::new(PostgresRepository::new(pool)),
        }
    }
}
