//! Error types for peyda-rs.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Validation ===
    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Idempotency key is required")]
    IdempotencyRequired,

    #[error("Invalid idempotency key format")]
    InvalidIdempotencyKey,

    #[error("Unsupported match action")]
    InvalidAction,

    #[error("Invalid report status")]
    InvalidStatus,

    #[error("At most {0} images are allowed per report")]
    TooManyImages(usize),

    // === Rate / quota ===
    #[error("Too many OTP requests for this phone")]
    TooManyRequests,

    #[error("Maximum verification attempts reached")]
    MaxAttemptsReached,

    #[error("Maximum resends reached")]
    MaxResendsReached,

    #[error("Daily report limit of {0} reached")]
    DailyLimitReached(u16),

    // === Not found ===
    #[error("Unknown or expired OTP request id")]
    InvalidRequestId,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Match not found: {0}")]
    MatchNotFound(String),

    // === Access ===
    #[error("Entered code is not correct")]
    InvalidOtp,

    #[error("Only owners of the paired reports may act on a match")]
    ActionAccessDenied,

    #[error("Only the report owner may change its status")]
    StatusChangeDenied,

    // === State conflicts ===
    #[error("Match was already rejected")]
    AlreadyRejected,

    #[error("Report was already resolved")]
    AlreadyResolved,

    #[error("Suspended reports cannot be changed")]
    ReportSuspended,

    #[error("User already owns a mawkab")]
    MawkabAlreadyExists,

    /// Internal marker for a lost idempotency insert race. Converted to a
    /// replay of the winning record before reaching callers.
    #[error("Concurrent request with the same idempotency key")]
    IdempotencyConflict,

    // === Server errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP-style status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidPhone
            | Self::Validation(_)
            | Self::IdempotencyRequired
            | Self::InvalidIdempotencyKey
            | Self::InvalidAction
            | Self::InvalidStatus
            | Self::TooManyImages(_)
            | Self::InvalidOtp => 400,

            Self::ActionAccessDenied | Self::StatusChangeDenied => 403,

            Self::InvalidRequestId
            | Self::UserNotFound(_)
            | Self::ReportNotFound(_)
            | Self::MatchNotFound(_) => 404,

            Self::AlreadyRejected
            | Self::AlreadyResolved
            | Self::ReportSuspended
            | Self::MawkabAlreadyExists
            | Self::IdempotencyConflict => 409,

            Self::TooManyRequests
            | Self::MaxAttemptsReached
            | Self::MaxResendsReached
            | Self::DailyLimitReached(_) => 429,

            Self::Database(_)
            | Self::Redis(_)
            | Self::Broker(_)
            | Self::Config(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPhone => "INVALID_PHONE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::IdempotencyRequired => "IDEMPOTENCY_REQUIRED",
            Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
            Self::InvalidAction => "INVALID_ACTION",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::TooManyImages(_) => "TOO_MANY_IMAGES",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::MaxAttemptsReached => "MAX_ATTEMPTS_REACHED",
            Self::MaxResendsReached => "MAX_RESENDS_REACHED",
            Self::DailyLimitReached(_) => "DAILY_LIMIT_REACHED",
            Self::InvalidRequestId => "INVALID_REQUEST_ID",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Self::MatchNotFound(_) => "MATCH_NOT_FOUND",
            Self::InvalidOtp => "INVALID_OTP",
            Self::ActionAccessDenied => "ACTION_ACCESS_DENIED",
            Self::StatusChangeDenied => "STATUS_CHANGE_DENIED",
            Self::AlreadyRejected => "ALREADY_REJECTED",
            Self::AlreadyResolved => "ALREADY_RESOLVED",
            Self::ReportSuspended => "REPORT_SUSPENDED",
            Self::MawkabAlreadyExists => "MAWKAB_ALREADY_EXISTS",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Broker(_) => "BROKER_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::TooManyRequests.error_code(), "TOO_MANY_REQUESTS");
        assert_eq!(
            AppError::InvalidRequestId.error_code(),
            "INVALID_REQUEST_ID"
        );
        assert_eq!(
            AppError::ActionAccessDenied.error_code(),
            "ACTION_ACCESS_DENIED"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::TooManyRequests.status_code(), 429);
        assert_eq!(AppError::MatchNotFound("m1".into()).status_code(), 404);
        assert_eq!(AppError::StatusChangeDenied.status_code(), 403);
        assert!(AppError::Broker("down".into()).is_server_error());
        assert!(!AppError::InvalidOtp.is_server_error());
    }
}
