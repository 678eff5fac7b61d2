//! Idempotency record repository.

use std::sync::Arc;

use crate::entities::idempotency_record;
use crate::entities::IdempotencyRecord;
use crate::repositories::db_err;
use peyda_common::AppResult;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait};

/// Idempotency record repository.
#[derive(Clone)]
pub struct IdempotencyRepository {
    db: Arc<DatabaseConnection>,
}

impl IdempotencyRepository {
    /// Create a new idempotency repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the stored record for a `(key, caller)` pair.
    pub async fn find(
        &self,
        key: &str,
        caller_id: &str,
    ) -> AppResult<Option<idempotency_record::Model>> {
        IdempotencyRecord::find_by_id((key.to_string(), caller_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert a record on the given connection, typically the transaction
    /// wrapping the guarded operation. Returns the raw database error so
    /// the guard can detect a losing duplicate-key race.
    pub async fn insert_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: idempotency_record::ActiveModel,
    ) -> Result<idempotency_record::Model, sea_orm::DbErr> {
        model.insert(conn).await
    }
}
