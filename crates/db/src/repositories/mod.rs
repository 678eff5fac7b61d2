//! Database repositories.

pub mod idempotency;
pub mod mawkab;
pub mod report;
pub mod report_match;
pub mod user;

pub use idempotency::IdempotencyRepository;
pub use mawkab::MawkabRepository;
pub use report::ReportRepository;
pub use report_match::MatchRepository;
pub use user::UserRepository;

use peyda_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Whether a database error is a unique-constraint violation.
///
/// Several writes (user-by-phone, match pairs, idempotency records) treat
/// the violation as a benign race rather than a failure.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Map a database error to the application error type.
#[must_use]
pub fn db_err(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}
