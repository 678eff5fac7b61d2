//! OTP authentication service.
//!
//! Turns a phone number into a short-lived verification session and, on a
//! correct code, a signed session token. All mutable state (sessions,
//! rate-limit counters, the token blacklist) lives in the cache with TTLs
//! as the only lifecycle; nothing OTP-related touches durable storage
//! except the user record itself.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use peyda_common::config::AuthConfig;
use peyda_common::{AppError, AppResult, Cache, CacheJson, Clock, IdGenerator};
use peyda_db::repositories::UserRepository;
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::services::event_publisher::DomainEvents;

/// OTP code length (digits).
const OTP_LENGTH: usize = 4;

/// Session lifetime; also the TTL of the cache entry backing it.
const OTP_EXPIRY_SECS: i64 = 300;

/// Verification attempts per session.
const MAX_ATTEMPTS: u32 = 3;

/// Resends per session.
const MAX_RESENDS: u32 = 3;

/// Codes a single phone may request per trailing hour.
const MAX_SENDS_PER_HOUR: u32 = 5;

const RATE_WINDOW_SECS: i64 = 3600;

/// Response for a successfully issued code.
#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub request_id: String,
    pub expires_in: i64,
    pub max_attempts: u32,
    pub max_resends: u32,
}

/// Response for a successful verification.
#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    /// Signed session token.
    pub token: String,
    pub user_id: String,
    /// Whether this phone just created its account.
    pub is_new_user: bool,
}

/// Response for a successful resend.
#[derive(Debug, Serialize)]
pub struct ResendOtpResponse {
    pub request_id: String,
    pub expires_in: i64,
    pub remaining_resends: u32,
}

/// Session token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub phone: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Cache-resident verification session, keyed `otp:<request_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OtpSession {
    otp: String,
    phone: String,
    attempts: u32,
    resends: u32,
    created_at: String,
}

/// OTP-based authentication service.
#[derive(Clone)]
pub struct OtpAuthService {
    user_repo: UserRepository,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    events: DomainEvents,
    id_gen: IdGenerator,
    token_secret: String,
    token_ttl_days: i64,
}

impl OtpAuthService {
    /// Create a new OTP authentication service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
        events: DomainEvents,
        config: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            cache,
            clock,
            events,
            id_gen: IdGenerator::new(),
            token_secret: config.token_secret.clone(),
            token_ttl_days: config.token_ttl_days,
        }
    }

    /// Issue a verification code for a phone number.
    ///
    /// The code itself leaves the system only inside the
    /// `otp.send_requested` event; out-of-band delivery is an external
    /// collaborator's job.
    pub async fn send_code(
        &self,
        phone: &str,
        country_code: &str,
    ) -> AppResult<SendOtpResponse> {
        let national = normalize_phone(phone).ok_or(AppError::InvalidPhone)?;
        let full_phone = format!("{country_code}{national}");

        self.check_rate_limit(&full_phone).await?;

        let otp = generate_otp();
        let request_id = self.id_gen.generate_request_id();

        let session = OtpSession {
            otp: otp.clone(),
            phone: full_phone.clone(),
            attempts: 0,
            resends: 0,
            created_at: self.clock.now().to_rfc3339(),
        };
        self.cache
            .set_json(&session_key(&request_id), &session, OTP_EXPIRY_SECS)
            .await?;

        self.events
            .emit(
                "otp.send_requested",
                json!({
                    "request_id": request_id,
                    "phone": full_phone,
                    "otp": otp,
                    "expires_in": OTP_EXPIRY_SECS,
                }),
            )
            .await;

        info!(phone = %mask_phone(&full_phone), "OTP issued");

        Ok(SendOtpResponse {
            request_id,
            expires_in: OTP_EXPIRY_SECS,
            max_attempts: MAX_ATTEMPTS,
            max_resends: MAX_RESENDS,
        })
    }

    /// Verify a code and mint a session token.
    pub async fn verify_code(&self, request_id: &str, otp: &str) -> AppResult<VerifyOtpResponse> {
        let key = session_key(request_id);

        let Some(mut session) = self.cache.get_json::<OtpSession>(&key).await? else {
            return Err(AppError::InvalidRequestId);
        };

        if session.attempts >= MAX_ATTEMPTS {
            return Err(AppError::MaxAttemptsReached);
        }

        // Persist the incremented counter before comparing: every guess
        // costs an attempt no matter how the comparison ends.
        session.attempts += 1;
        self.cache.set_json(&key, &session, OTP_EXPIRY_SECS).await?;

        if session.otp != otp {
            return Err(AppError::InvalidOtp);
        }

        let now = self.clock.now().fixed_offset();
        let (user, is_new_user) = self
            .user_repo
            .get_or_create_by_phone(&session.phone, self.id_gen.generate(), now)
            .await?;

        let token = self.mint_token(&user)?;
        self.cache.delete(&key).await?;

        info!(user_id = %user.id, "User authenticated via OTP");

        Ok(VerifyOtpResponse {
            token,
            user_id: user.id,
            is_new_user,
        })
    }

    /// Re-issue a code for an existing session.
    pub async fn resend_code(&self, request_id: &str) -> AppResult<ResendOtpResponse> {
        let key = session_key(request_id);

        let Some(mut session) = self.cache.get_json::<OtpSession>(&key).await? else {
            return Err(AppError::InvalidRequestId);
        };

        if session.resends >= MAX_RESENDS {
            return Err(AppError::MaxResendsReached);
        }

        session.otp = generate_otp();
        session.resends += 1;
        // A fresh code gets a clean guessing budget.
        session.attempts = 0;
        self.cache.set_json(&key, &session, OTP_EXPIRY_SECS).await?;

        self.events
            .emit(
                "otp.send_requested",
                json!({
                    "request_id": request_id,
                    "phone": session.phone,
                    "otp": session.otp,
                    "expires_in": OTP_EXPIRY_SECS,
                }),
            )
            .await;

        Ok(ResendOtpResponse {
            request_id: request_id.to_string(),
            expires_in: OTP_EXPIRY_SECS,
            remaining_resends: MAX_RESENDS - session.resends,
        })
    }

    /// Blacklist a session token for the remainder of its lifetime.
    ///
    /// The blacklist entry's TTL equals the token's remaining validity, so
    /// it self-expires exactly when the token would anyway become invalid.
    /// Malformed or already-expired tokens return `false` — the signature
    /// check is the authority for validity.
    pub async fn logout(&self, token: &str) -> AppResult<bool> {
        let Some(claims) = self.decode_claims(token) else {
            return Ok(false);
        };

        let remaining = claims.exp - self.clock.now_unix();
        if remaining <= 0 {
            return Ok(false);
        }

        self.cache
            .set_json(&blacklist_key(token), &true, remaining)
            .await?;

        info!(user_id = %claims.user_id, "Session token blacklisted");
        Ok(true)
    }

    /// Whether a token has been blacklisted.
    pub async fn is_blacklisted(&self, token: &str) -> AppResult<bool> {
        self.cache.exists(&blacklist_key(token)).await
    }

    async fn check_rate_limit(&self, full_phone: &str) -> AppResult<()> {
        let key = rate_key(full_phone);
        let count: u32 = self.cache.get_json(&key).await?.unwrap_or(0);

        if count >= MAX_SENDS_PER_HOUR {
            return Err(AppError::TooManyRequests);
        }

        self.cache
            .set_json(&key, &(count + 1), RATE_WINDOW_SECS)
            .await?;
        Ok(())
    }

    fn mint_token(&self, user: &peyda_db::entities::user::Model) -> AppResult<String> {
        let iat = self.clock.now_unix();
        let claims = TokenClaims {
            user_id: user.id.clone(),
            phone: user.phone.clone(),
            role: user.role.as_str().to_string(),
            iat,
            exp: iat + self.token_ttl_days * 86_400,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.token_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign session token: {e}")))
    }

    /// Verify the signature and return the claims.
    ///
    /// Expiry is deliberately checked by callers against the injected
    /// clock, not by the JWT library against the wall clock.
    fn decode_claims(&self, token: &str) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.token_secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|data| data.claims)
    }
}

/// Normalize to the 10-digit national form (`9xxxxxxxxx`).
///
/// Accepts `+98`/`98` prefixes and leading zeros; anything that does not
/// reduce to ten digits starting with `9` is rejected.
fn normalize_phone(phone: &str) -> Option<String> {
    let mut digits = phone.trim();
    if let Some(rest) = digits.strip_prefix("+98") {
        digits = rest;
    } else if let Some(rest) = digits.strip_prefix("98") {
        digits = rest;
    }
    let digits = digits.trim_start_matches('0');

    if digits.len() == 10 && digits.starts_with('9') && digits.bytes().all(|b| b.is_ascii_digit())
    {
        Some(digits.to_string())
    } else {
        None
    }
}

/// Generate a fixed-length numeric code from the OS random source.
fn generate_otp() -> String {
    let mut rng = OsRng;
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn session_key(request_id: &str) -> String {
    format!("otp:{request_id}")
}

fn rate_key(full_phone: &str) -> String {
    format!("otp_rate:{:x}", md5::compute(full_phone.as_bytes()))
}

fn blacklist_key(token: &str) -> String {
    format!("blacklist:{}", hex::encode(Sha256::digest(token.as_bytes())))
}

fn mask_phone(full_phone: &str) -> String {
    let visible: String = full_phone.chars().take(5).collect();
    format!("{visible}***")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::RecordingEventBus;
    use peyda_common::{FakeClock, InMemoryCache};
    use peyda_db::entities::user::{self, UserRole};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    struct Harness {
        service: OtpAuthService,
        cache: Arc<InMemoryCache>,
        clock: Arc<FakeClock>,
        bus: RecordingEventBus,
    }

    fn auth_config() -> AuthConfig {
        AuthConfig {
            token_secret: "test-secret".to_string(),
            token_ttl_days: 30,
            default_country_code: "+98".to_string(),
        }
    }

    fn harness(db: DatabaseConnection) -> Harness {
        let cache = Arc::new(InMemoryCache::new());
        let clock = Arc::new(FakeClock::new());
        let bus = RecordingEventBus::new();
        let events = DomainEvents::new(Arc::new(bus.clone()), clock.clone());

        let service = OtpAuthService::new(
            UserRepository::new(Arc::new(db)),
            cache.clone(),
            clock.clone(),
            events,
            &auth_config(),
        );

        Harness {
            service,
            cache,
            clock,
            bus,
        }
    }

    fn harness_without_db() -> Harness {
        harness(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn existing_user(clock: &FakeClock) -> user::Model {
        user::Model {
            id: "u1".to_string(),
            phone: "+989123456789".to_string(),
            role: UserRole::User,
            mawkab_id: None,
            is_active: true,
            is_banned: false,
            ban_reason: None,
            daily_report_count: 0,
            daily_report_date: None,
            created_at: clock.now().fixed_offset(),
            last_activity_at: None,
        }
    }

    /// The issued code is only observable through the published event.
    fn issued_code(bus: &RecordingEventBus) -> String {
        bus.events_of_type("otp.send_requested")
            .last()
            .unwrap()
            .payload["otp"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(
            normalize_phone("9123456789").as_deref(),
            Some("9123456789")
        );
        assert_eq!(
            normalize_phone("+989123456789").as_deref(),
            Some("9123456789")
        );
        assert_eq!(
            normalize_phone("09123456789").as_deref(),
            Some("9123456789")
        );
        assert_eq!(normalize_phone("8123456789"), None);
        assert_eq!(normalize_phone("912345678"), None);
        assert_eq!(normalize_phone("912345678x"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_generate_otp_shape() {
        let otp = generate_otp();
        assert_eq!(otp.len(), OTP_LENGTH);
        assert!(otp.bytes().all(|b| b.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_send_code_stores_session_and_publishes() {
        let h = harness_without_db();

        let response = h.service.send_code("9123456789", "+98").await.unwrap();
        assert!(response.request_id.starts_with("req_"));
        assert_eq!(response.expires_in, 300);
        assert_eq!(response.max_attempts, 3);
        assert_eq!(response.max_resends, 3);

        let event = h.bus.last_event().unwrap();
        assert_eq!(event.event_type, "otp.send_requested");
        assert_eq!(event.payload["phone"], "+989123456789");
        assert_eq!(event.payload["request_id"], response.request_id.as_str());
        assert_eq!(event.payload["timestamp"], h.clock.now_unix());

        assert!(h
            .cache
            .exists(&session_key(&response.request_id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_send_code_rejects_invalid_phone() {
        let h = harness_without_db();
        let err = h.service.send_code("12345", "+98").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPhone));
        assert!(h.bus.is_empty());
    }

    #[tokio::test]
    async fn test_sixth_send_within_hour_is_rate_limited() {
        let h = harness_without_db();

        for _ in 0..5 {
            h.service.send_code("9123456789", "+98").await.unwrap();
        }

        let err = h.service.send_code("9123456789", "+98").await.unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests));

        // Different spellings of the same phone share the budget.
        let err = h.service.send_code("09123456789", "+98").await.unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests));

        // The window expires; the phone may request again.
        h.cache.advance(RATE_WINDOW_SECS);
        assert!(h.service.send_code("9123456789", "+98").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_unknown_request_id() {
        let h = harness_without_db();
        let err = h.service.verify_code("req_missing", "1234").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequestId));
    }

    #[tokio::test]
    async fn test_verify_expired_session() {
        let h = harness_without_db();
        let sent = h.service.send_code("9123456789", "+98").await.unwrap();

        h.cache.advance(OTP_EXPIRY_SECS);

        let err = h
            .service
            .verify_code(&sent.request_id, &issued_code(&h.bus))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequestId));
    }

    #[tokio::test]
    async fn test_wrong_code_counts_attempts_until_exhausted() {
        let h = harness_without_db();
        let sent = h.service.send_code("9123456789", "+98").await.unwrap();
        let code = issued_code(&h.bus);
        let wrong = if code == "0000" { "1111" } else { "0000" };

        for _ in 0..3 {
            let err = h
                .service
                .verify_code(&sent.request_id, wrong)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidOtp));
        }

        // Even the correct code is refused once attempts are exhausted.
        let err = h
            .service
            .verify_code(&sent.request_id, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MaxAttemptsReached));
    }

    #[tokio::test]
    async fn test_verify_success_mints_token_and_burns_session() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_user(&FakeClock::new())]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let h = harness(db);

        let sent = h.service.send_code("9123456789", "+98").await.unwrap();
        let code = issued_code(&h.bus);

        let verified = h.service.verify_code(&sent.request_id, &code).await.unwrap();
        assert_eq!(verified.user_id, "u1");
        assert!(!verified.is_new_user);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let claims = decode::<TokenClaims>(
            &verified.token,
            &DecodingKey::from_secret(b"test-secret"),
            &validation,
        )
        .unwrap()
        .claims;
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.phone, "+989123456789");
        assert_eq!(claims.role, "user");
        assert_eq!(claims.iat, h.clock.now_unix());
        assert_eq!(claims.exp, claims.iat + 30 * 86_400);

        // The session is gone: verification succeeds exactly once.
        let err = h
            .service
            .verify_code(&sent.request_id, &code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequestId));
    }

    #[tokio::test]
    async fn test_resend_resets_attempts_and_counts_resends() {
        let h = harness_without_db();
        let sent = h.service.send_code("9123456789", "+98").await.unwrap();
        let first_code = issued_code(&h.bus);
        let wrong = if first_code == "0000" { "1111" } else { "0000" };

        h.service.verify_code(&sent.request_id, wrong).await.unwrap_err();
        h.service.verify_code(&sent.request_id, wrong).await.unwrap_err();

        let resent = h.service.resend_code(&sent.request_id).await.unwrap();
        assert_eq!(resent.request_id, sent.request_id);
        assert_eq!(resent.remaining_resends, 2);

        // Attempts were reset: three fresh wrong guesses are allowed again.
        let new_code = issued_code(&h.bus);
        let wrong = if new_code == "0000" { "1111" } else { "0000" };
        for _ in 0..3 {
            let err = h
                .service
                .verify_code(&sent.request_id, wrong)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidOtp));
        }

        h.service.resend_code(&sent.request_id).await.unwrap();
        let last = h.service.resend_code(&sent.request_id).await.unwrap();
        assert_eq!(last.remaining_resends, 0);

        let err = h.service.resend_code(&sent.request_id).await.unwrap_err();
        assert!(matches!(err, AppError::MaxResendsReached));
    }

    #[tokio::test]
    async fn test_resend_unknown_request_id() {
        let h = harness_without_db();
        let err = h.service.resend_code("req_missing").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequestId));
    }

    #[tokio::test]
    async fn test_logout_blacklists_until_token_expiry() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_user(&FakeClock::new())]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let h = harness(db);

        let sent = h.service.send_code("9123456789", "+98").await.unwrap();
        let verified = h
            .service
            .verify_code(&sent.request_id, &issued_code(&h.bus))
            .await
            .unwrap();

        assert!(!h.service.is_blacklisted(&verified.token).await.unwrap());
        assert!(h.service.logout(&verified.token).await.unwrap());
        assert!(h.service.is_blacklisted(&verified.token).await.unwrap());

        // The blacklist entry lives exactly as long as the token would.
        h.cache.advance(30 * 86_400);
        assert!(!h.service.is_blacklisted(&verified.token).await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_rejects_expired_and_malformed_tokens() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_user(&FakeClock::new())]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let h = harness(db);

        let sent = h.service.send_code("9123456789", "+98").await.unwrap();
        let verified = h
            .service
            .verify_code(&sent.request_id, &issued_code(&h.bus))
            .await
            .unwrap();

        assert!(!h.service.logout("not-a-token").await.unwrap());

        h.clock.advance_days(31);
        assert!(!h.service.logout(&verified.token).await.unwrap());
    }
}
