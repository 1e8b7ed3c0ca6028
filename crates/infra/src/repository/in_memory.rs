use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use terminal_core::ExpectedVersion;

use super::{Record, Repository, RepositoryError};

struct Inner<V: Record> {
    records: HashMap<V::Key, V>,
    /// Keys in first-insertion order.
    order: Vec<V::Key>,
    last_id: u64,
}

/// In-memory repository.
///
/// Intended for tests/dev. Not optimized for performance.
pub struct InMemoryRepository<V: Record> {
    inner: RwLock<Inner<V>>,
}

impl<V: Record> InMemoryRepository<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: HashMap::new(),
                order: Vec::new(),
                last_id: 0,
            }),
        }
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::Backend("lock poisoned".to_string())
    }
}

impl<V: Record> Default for InMemoryRepository<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Record> Inner<V> {
    fn insert(&mut self, value: V) {
        let key = value.key();
        // Keep id allocation ahead of explicitly keyed (seeded) records.
        if let Ok(n) = key.to_string().parse::<u64>() {
            self.last_id = self.last_id.max(n);
        }
        if self.records.insert(key.clone(), value).is_none() {
            self.order.push(key);
        }
    }
}

#[async_trait]
impl<V: Record> Repository<V> for InMemoryRepository<V> {
    async fn get(&self, key: &V::Key) -> Result<Option<V>, RepositoryError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.records.get(key).cloned())
    }

    async fn upsert(&self, value: V) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        inner.insert(value);
        Ok(())
    }

    async fn save(&self, value: V, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let current = inner
            .records
            .get(&value.key())
            .map(Record::version)
            .unwrap_or(0);
        if !expected.matches(current) {
            return Err(RepositoryError::Concurrency(format!(
                "{} {}: expected {expected:?}, found {current}",
                V::COLLECTION,
                value.key()
            )));
        }
        inner.insert(value);
        Ok(())
    }

    async fn remove(&self, key: &V::Key) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let removed = inner.records.remove(key).is_some();
        if removed {
            inner.order.retain(|k| k != key);
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<V>, RepositoryError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .order
            .iter()
            .filter_map(|k| inner.records.get(k).cloned())
            .collect())
    }

    async fn next_id(&self) -> Result<u64, RepositoryError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        inner.last_id += 1;
        Ok(inner.last_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: u64,
        version: u64,
    }

    impl Record for Doc {
        type Key = u64;
        const COLLECTION: &'static str = "docs";

        fn key(&self) -> u64 {
            self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    #[tokio::test]
    async fn save_checks_stored_version() {
        let repo = InMemoryRepository::<Doc>::new();
        repo.save(Doc { id: 1, version: 1 }, ExpectedVersion::Exact(0))
            .await
            .unwrap();
        repo.save(Doc { id: 1, version: 2 }, ExpectedVersion::Exact(1))
            .await
            .unwrap();

        let err = repo
            .save(Doc { id: 1, version: 3 }, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Concurrency(_)));
        assert_eq!(repo.get(&1).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn next_id_skips_seeded_keys() {
        let repo = InMemoryRepository::<Doc>::new();
        repo.upsert(Doc { id: 41, version: 0 }).await.unwrap();
        assert_eq!(repo.next_id().await.unwrap(), 42);
        assert_eq!(repo.next_id().await.unwrap(), 43);
    }

    #[tokio::test]
    async fn list_keeps_insertion_order_and_remove_works() {
        let repo = InMemoryRepository::<Doc>::new();
        for id in [3, 1, 2] {
            repo.upsert(Doc { id, version: 0 }).await.unwrap();
        }
        assert!(repo.remove(&1).await.unwrap());
        assert!(!repo.remove(&1).await.unwrap());
        let ids: Vec<u64> = repo.list().await.unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
