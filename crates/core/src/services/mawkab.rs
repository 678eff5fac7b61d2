//! Mawkab registration service.

use std::sync::Arc;

use peyda_common::{AppError, AppResult, Clock, IdGenerator};
use peyda_db::entities::mawkab::{self, MawkabStatus};
use peyda_db::repositories::{MawkabRepository, UserRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::services::event_publisher::DomainEvents;

/// Input for registering a mawkab.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMawkabInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 200))]
    pub owner_name: String,

    pub owner_phone: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[serde(default)]
    pub address: String,
}

/// Response for a registered mawkab.
#[derive(Debug, Serialize)]
pub struct CreateMawkabResponse {
    pub mawkab_id: String,
}

/// Mawkab registration service.
#[derive(Clone)]
pub struct MawkabService {
    mawkab_repo: MawkabRepository,
    user_repo: UserRepository,
    events: DomainEvents,
    clock: Arc<dyn Clock>,
    id_gen: IdGenerator,
}

impl MawkabService {
    /// Create a new mawkab service.
    #[must_use]
    pub fn new(
        mawkab_repo: MawkabRepository,
        user_repo: UserRepository,
        events: DomainEvents,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mawkab_repo,
            user_repo,
            events,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new mawkab, pending approval.
    ///
    /// The user is linked immediately; the role upgrade happens at approval
    /// time, outside this service.
    pub async fn create_mawkab(
        &self,
        user_id: &str,
        input: CreateMawkabInput,
    ) -> AppResult<CreateMawkabResponse> {
        input.validate()?;

        if self.mawkab_repo.exists_for_owner(user_id).await? {
            return Err(AppError::MawkabAlreadyExists);
        }

        let model = mawkab::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            owner_name: Set(input.owner_name),
            owner_phone: Set(input.owner_phone),
            owner_user_id: Set(user_id.to_string()),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            address: Set(input.address),
            status: Set(MawkabStatus::Pending),
            rejection_reason: Set(None),
            total_reports: Set(0),
            resolved_reports: Set(0),
            created_at: Set(self.clock.now().fixed_offset()),
        };
        let created = self.mawkab_repo.create(model).await?;

        self.user_repo.set_mawkab(user_id, &created.id).await?;

        self.events
            .emit(
                "mawkab.created",
                json!({
                    "mawkab_id": created.id,
                    "user_id": user_id,
                    "name": created.name,
                    "owner_name": created.owner_name,
                }),
            )
            .await;

        info!(mawkab_id = %created.id, user_id, "Mawkab created");

        Ok(CreateMawkabResponse {
            mawkab_id: created.id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::RecordingEventBus;
    use maplit::btreemap;
    use peyda_common::FakeClock;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};

    fn valid_input() -> CreateMawkabInput {
        CreateMawkabInput {
            name: "Mawkab al-Hussein".to_string(),
            owner_name: "Hossein".to_string(),
            owner_phone: "+989123456789".to_string(),
            latitude: 32.6160,
            longitude: 44.0249,
            address: String::new(),
        }
    }

    fn stored_mawkab(clock: &FakeClock) -> mawkab::Model {
        mawkab::Model {
            id: "mk1".to_string(),
            name: "Mawkab al-Hussein".to_string(),
            owner_name: "Hossein".to_string(),
            owner_phone: "+989123456789".to_string(),
            owner_user_id: "u1".to_string(),
            latitude: 32.6160,
            longitude: 44.0249,
            address: String::new(),
            status: MawkabStatus::Pending,
            rejection_reason: None,
            total_reports: 0,
            resolved_reports: 0,
            created_at: clock.now().fixed_offset(),
        }
    }

    fn service(db: DatabaseConnection) -> (MawkabService, RecordingEventBus) {
        let db = Arc::new(db);
        let clock = Arc::new(FakeClock::new());
        let bus = RecordingEventBus::new();
        let events = DomainEvents::new(Arc::new(bus.clone()), clock.clone());

        (
            MawkabService::new(
                MawkabRepository::new(db.clone()),
                UserRepository::new(db),
                events,
                clock,
            ),
            bus,
        )
    }

    fn count_result(count: i64) -> Vec<std::collections::BTreeMap<String, Value>> {
        vec![btreemap! {
            "num_items".to_string() => Value::BigInt(Some(count)),
        }]
    }

    #[tokio::test]
    async fn test_second_mawkab_for_owner_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count_result(1)])
            .into_connection();
        let (service, bus) = service(db);

        let err = service.create_mawkab("u1", valid_input()).await.unwrap_err();
        assert!(matches!(err, AppError::MawkabAlreadyExists));
        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn test_create_mawkab_links_user_and_publishes() {
        let clock = FakeClock::new();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count_result(0)])
            .append_query_results([vec![stored_mawkab(&clock)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let (service, bus) = service(db);

        let response = service.create_mawkab("u1", valid_input()).await.unwrap();
        assert_eq!(response.mawkab_id, "mk1");

        let event = bus.last_event().unwrap();
        assert_eq!(event.event_type, "mawkab.created");
        assert_eq!(event.payload["mawkab_id"], "mk1");
        assert_eq!(event.payload["user_id"], "u1");
        assert_eq!(event.payload["name"], "Mawkab al-Hussein");
    }
}
