//! Idempotency guard for retried write requests.
//!
//! Write endpoints that declare themselves idempotent run through
//! [`IdempotencyGuard::execute`]: the first execution runs the operation
//! and stores its response inside one transaction; every retry with the
//! same `(key, caller)` replays the stored response verbatim without
//! touching the operation again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use peyda_common::{AppError, AppResult, Clock};
use peyda_db::entities::idempotency_record;
use peyda_db::repositories::{is_unique_violation, IdempotencyRepository};
use sea_orm::{DatabaseConnection, DatabaseTransaction, Set, TransactionError, TransactionTrait};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// The response captured for (and replayed to) the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub body: Value,
}

/// Future returned by a guarded operation.
pub type GuardedOp<'c> = Pin<Box<dyn Future<Output = AppResult<StoredResponse>> + Send + 'c>>;

/// Deduplicates retried write requests by client key plus caller identity.
#[derive(Clone)]
pub struct IdempotencyGuard {
    db: Arc<DatabaseConnection>,
    repo: IdempotencyRepository,
    clock: Arc<dyn Clock>,
}

impl IdempotencyGuard {
    /// Create a new idempotency guard.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo: IdempotencyRepository::new(db.clone()),
            db,
            clock,
        }
    }

    /// Run `op` at most once per `(key, caller)`.
    ///
    /// The operation receives the transaction that also persists the
    /// idempotency record: a crash between effect and record rolls both
    /// back. Two concurrent first requests race on the record's composite
    /// primary key; the loser's transaction is rolled back and the winner's
    /// stored response is replayed instead.
    pub async fn execute<F>(
        &self,
        key: Option<&str>,
        caller_id: &str,
        endpoint: &str,
        op: F,
    ) -> AppResult<StoredResponse>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> GuardedOp<'c> + Send + 'static,
    {
        let raw = key.ok_or(AppError::IdempotencyRequired)?;
        let key = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::InvalidIdempotencyKey)?
            .to_string();

        if let Some(existing) = self.repo.find(&key, caller_id).await? {
            debug!(key = %key, caller_id, "Replaying stored idempotent response");
            return Ok(stored_response(existing));
        }

        let repo = self.repo.clone();
        let record_key = key.clone();
        let caller = caller_id.to_string();
        let endpoint = endpoint.to_string();
        let created_at = self.clock.now().fixed_offset();

        let result = self
            .db
            .transaction::<_, StoredResponse, AppError>(move |txn| {
                Box::pin(async move {
                    let response = op(txn).await?;

                    let record = idempotency_record::ActiveModel {
                        key: Set(record_key),
                        caller_id: Set(caller),
                        endpoint: Set(endpoint),
                        response_status: Set(response.status as i16),
                        response_body: Set(response.body.clone()),
                        created_at: Set(created_at),
                    };

                    match repo.insert_on(txn, record).await {
                        Ok(_) => Ok(response),
                        Err(e) if is_unique_violation(&e) => Err(AppError::IdempotencyConflict),
                        Err(e) => Err(AppError::Database(e.to_string())),
                    }
                })
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(TransactionError::Transaction(AppError::IdempotencyConflict)) => {
                // Lost the insert race; the winner's record is now visible.
                let winner = self.repo.find(&key, caller_id).await?.ok_or_else(|| {
                    AppError::Database("Idempotency record missing after conflict".to_string())
                })?;
                Ok(stored_response(winner))
            }
            Err(TransactionError::Transaction(e)) => Err(e),
            Err(TransactionError::Connection(e)) => Err(AppError::Database(e.to_string())),
        }
    }
}

fn stored_response(record: idempotency_record::Model) -> StoredResponse {
    StoredResponse {
        status: record.response_status as u16,
        body: record.response_body,
    }
}
