//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod event_publisher;
pub mod idempotency;
pub mod matching;
pub mod mawkab;
pub mod report;

pub use auth::{
    OtpAuthService, ResendOtpResponse, SendOtpResponse, TokenClaims, VerifyOtpResponse,
};
pub use event_publisher::{
    DomainEvents, EventBus, FailingEventBus, PublishedEvent, RecordingEventBus,
};
pub use idempotency::{IdempotencyGuard, StoredResponse};
pub use matching::{MatchCandidate, MatchingService};
pub use mawkab::{CreateMawkabInput, CreateMawkabResponse, MawkabService};
pub use report::{CreateReportInput, CreateReportResponse, InitialMatch, ReportService};
