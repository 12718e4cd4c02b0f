//! SurrealDB implementation of [`SequenceRepository`].
//!
//! Each counter is one `sequence` record whose id is the counter key.
//! `UPSERT` increments it inside a single statement, so concurrent
//! callers never observe the same value. A caller that loses the write
//! race runs the statement again.

use archivum_core::error::ArchiveResult;
use archivum_core::repository::SequenceRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::retry_write;
use crate::error::DbError;

const ENTITY: &str = "sequence";

#[derive(Debug, SurrealValue)]
struct SequenceRow {
    value: u64,
}

#[derive(Clone)]
pub struct SurrealSequenceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSequenceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn increment(&self, key: &str, seed: u64) -> Result<u64, DbError> {
        let result = self
            .db
            .query(
                "UPSERT type::record('sequence', $key) SET \
                 value = (value ?? $seed) + 1, \
                 updated_at = time::now()",
            )
            .bind(("key", key.to_string()))
            .bind(("seed", seed))
            .await
            .map_err(|e| DbError::query(ENTITY, e))?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<SequenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: key.to_string(),
        })?;

        Ok(row.value)
    }
}

impl<C: Connection> SequenceRepository for SurrealSequenceRepository<C> {
    async fn next_value(&self, key: &str, seed: u64) -> ArchiveResult<u64> {
        let value = retry_write(ENTITY, || self.increment(key, seed)).await?;
        Ok(value)
    }
}
