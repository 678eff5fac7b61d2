//! End-to-end walk of the OTP authentication flow against in-memory
//! infrastructure: issue a code, resend it, verify it, log out.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use peyda_common::config::AuthConfig;
use peyda_common::{AppError, Clock, FakeClock, InMemoryCache};
use peyda_core::{DomainEvents, OtpAuthService, RecordingEventBus};
use peyda_db::entities::user::{self, UserRole};
use peyda_db::repositories::UserRepository;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

fn new_user(clock: &FakeClock) -> user::Model {
    user::Model {
        id: "u-fresh".to_string(),
        phone: "+989123456789".to_string(),
        role: UserRole::User,
        mawkab_id: None,
        is_active: true,
        is_banned: false,
        ban_reason: None,
        daily_report_count: 0,
        daily_report_date: None,
        created_at: clock.now().fixed_offset(),
        last_activity_at: Some(clock.now().fixed_offset()),
    }
}

#[tokio::test]
async fn test_full_otp_flow_for_a_first_login() {
    let cache = Arc::new(InMemoryCache::new());
    let clock = Arc::new(FakeClock::new());
    let bus = RecordingEventBus::new();

    // This phone has never logged in: the lookup misses and the insert
    // creates the account.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()])
        .append_query_results([vec![new_user(&clock)]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let service = OtpAuthService::new(
        UserRepository::new(Arc::new(db)),
        cache.clone(),
        clock.clone(),
        DomainEvents::new(Arc::new(bus.clone()), clock.clone()),
        &AuthConfig {
            token_secret: "integration-secret".to_string(),
            token_ttl_days: 30,
            default_country_code: "+98".to_string(),
        },
    );

    // Issue a code.
    let sent = service.send_code("09123456789", "+98").await.unwrap();
    assert_eq!(sent.expires_in, 300);

    let first_event = bus.events_of_type("otp.send_requested").pop().unwrap();
    assert_eq!(first_event.payload["request_id"], sent.request_id.as_str());
    assert_eq!(first_event.payload["phone"], "+989123456789");

    // The user waits a bit, then asks for a fresh code.
    clock.advance_minutes(2);
    cache.advance(120);

    let resent = service.resend_code(&sent.request_id).await.unwrap();
    assert_eq!(resent.remaining_resends, 2);

    let events = bus.events_of_type("otp.send_requested");
    assert_eq!(events.len(), 2);
    let code = events.last().unwrap().payload["otp"].as_str().unwrap().to_string();

    // Verify with the resent code; the original code is dead.
    let verified = service.verify_code(&sent.request_id, &code).await.unwrap();
    assert_eq!(verified.user_id, "u-fresh");
    assert!(verified.is_new_user);
    assert!(!verified.token.is_empty());

    // The session was deleted on success: the same request id is spent.
    let err = service
        .verify_code(&sent.request_id, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequestId));

    // Logout blacklists the token for its remaining lifetime.
    assert!(!service.is_blacklisted(&verified.token).await.unwrap());
    assert!(service.logout(&verified.token).await.unwrap());
    assert!(service.is_blacklisted(&verified.token).await.unwrap());
}
