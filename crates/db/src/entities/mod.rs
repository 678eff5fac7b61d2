//! Database entities.

pub mod idempotency_record;
pub mod mawkab;
pub mod report;
pub mod report_match;
pub mod user;

pub use idempotency_record::Entity as IdempotencyRecord;
pub use mawkab::Entity as Mawkab;
pub use report::Entity as Report;
pub use report_match::Entity as ReportMatch;
pub use user::Entity as User;
