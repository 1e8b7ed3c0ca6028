//! Postgres-backed document repository.
//!
//! All collections share two tables:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection TEXT   NOT NULL,
//!     key        TEXT   NOT NULL,
//!     version    BIGINT NOT NULL DEFAULT 0,
//!     body       JSONB  NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (collection, key)
//! );
//! CREATE TABLE document_ids (
//!     collection TEXT PRIMARY KEY,
//!     last_id    BIGINT NOT NULL
//! );
//! ```
//!
//! Versioned saves run in a transaction that locks the current row
//! (`SELECT ... FOR UPDATE`) before comparing versions.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | RepositoryError |
//! |------------|------|-----------------|
//! | unique violation | `23505` | `Concurrency` (concurrent first insert) |
//! | any other | - | `Backend` |

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use terminal_core::ExpectedVersion;

use super::{Record, Repository, RepositoryError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    version BIGINT NOT NULL DEFAULT 0,
    body JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, key)
);
CREATE TABLE IF NOT EXISTS document_ids (
    collection TEXT PRIMARY KEY,
    last_id BIGINT NOT NULL
);
"#;

/// Create the document tables when missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

/// Postgres repository for one record kind.
pub struct PostgresRepository<V> {
    pool: Arc<PgPool>,
    _value: PhantomData<fn() -> V>,
}

impl<V> PostgresRepository<V> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            _value: PhantomData,
        }
    }
}

impl<V> Clone for PostgresRepository<V> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _value: PhantomData,
        }
    }
}

fn encode<V: Record>(value: &V) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn decode<V: Record>(body: serde_json::Value) -> Result<V, RepositoryError> {
    serde_json::from_value(body).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

#[async_trait]
impl<V: Record> Repository<V> for PostgresRepository<V> {
    #[instrument(skip(self), fields(collection = V::COLLECTION, key = %key), err)]
    async fn get(&self, key: &V::Key) -> Result<Option<V>, RepositoryError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND key = $2")
            .bind(V::COLLECTION)
            .bind(key.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            Some(row) => {
                let body: serde_json::Value = row
                    .try_get("body")
                    .map_err(|e| map_sqlx_error("get", e))?;
                Ok(Some(decode(body)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value), fields(collection = V::COLLECTION, key = %value.key()), err)]
    async fn upsert(&self, value: V) -> Result<(), RepositoryError> {
        let body = encode(&value)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, version, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, key)
            DO UPDATE SET
                version = EXCLUDED.version,
                body = EXCLUDED.body,
                updated_at = NOW()
            "#,
        )
        .bind(V::COLLECTION)
        .bind(value.key().to_string())
        .bind(value.version() as i64)
        .bind(body)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, value),
        fields(collection = V::COLLECTION, key = %value.key(), expected = ?expected),
        err
    )]
    async fn save(&self, value: V, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let body = encode(&value)?;
        let key = value.key().to_string();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: u64 = sqlx::query(
            "SELECT version FROM documents WHERE collection = $1 AND key = $2 FOR UPDATE",
        )
        .bind(V::COLLECTION)
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_version", e))?
        .map(|row| row.try_get::<i64, _>("version"))
        .transpose()
        .map_err(|e| map_sqlx_error("load_version", e))?
        .map(|v| v as u64)
        .unwrap_or(0);

        if !expected.matches(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(RepositoryError::Concurrency(format!(
                "{} {key}: expected {expected:?}, found {current}",
                V::COLLECTION
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, version, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, key)
            DO UPDATE SET
                version = EXCLUDED.version,
                body = EXCLUDED.body,
                updated_at = NOW()
            "#,
        )
        .bind(V::COLLECTION)
        .bind(&key)
        .bind(value.version() as i64)
        .bind(body)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = V::COLLECTION, key = %key), err)]
    async fn remove(&self, key: &V::Key) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(V::COLLECTION)
            .bind(key.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(collection = V::COLLECTION), err)]
    async fn list(&self) -> Result<Vec<V>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT body FROM documents WHERE collection = $1 ORDER BY created_at ASC, key ASC",
        )
        .bind(V::COLLECTION)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        rows.into_iter()
            .map(|row| {
                let body: serde_json::Value = row
                    .try_get("body")
                    .map_err(|e| map_sqlx_error("list", e))?;
                decode(body)
            })
            .collect()
    }

    #[instrument(skip(self), fields(collection = V::COLLECTION), err)]
    async fn next_id(&self) -> Result<u64, RepositoryError> {
        // Seeded documents may already use low ids; start above them.
        let row = sqlx::query(
            r#"
            INSERT INTO document_ids (collection, last_id)
            VALUES (
                $1,
                COALESCE((
                    SELECT MAX(key::BIGINT) FROM documents
                    WHERE collection = $1 AND key ~ '^[0-9]+$'
                ), 0) + 1
            )
            ON CONFLICT (collection)
            DO UPDATE SET last_id = document_ids.last_id + 1
            RETURNING last_id
            "#,
        )
        .bind(V::COLLECTION)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("next_id", e))?;

        let id: i64 = row
            .try_get("last_id")
            .map_err(|e| map_sqlx_error("next_id", e))?;
        Ok(id as u64)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => RepositoryError::Concurrency(msg),
                _ => RepositoryError::Backend(msg),
            }
        }
        other => RepositoryError::Backend(format!("{operation}: {other}")),
    }
}
