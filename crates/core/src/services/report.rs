//! Report command service.
//!
//! Creating a report is the write that drives the whole pipeline: it
//! consumes the submitter's daily budget, triggers the matching scan and
//! announces itself on the bus. Resolution closes the loop.

use std::sync::Arc;

use chrono::Datelike;
use peyda_common::config::ReportConfig;
use peyda_common::{AppError, AppResult, Clock, IdGenerator};
use peyda_db::entities::report::{self, Gender, ReportStatus, ReportType};
use peyda_db::repositories::{MawkabRepository, ReportRepository, UserRepository};
use rand::Rng;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::services::event_publisher::DomainEvents;
use crate::services::matching::MatchingService;

/// Input for creating a report.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportInput {
    pub report_type: ReportType,

    #[validate(length(min = 1, max = 200))]
    pub person_name: String,

    #[validate(range(min = 0, max = 150))]
    pub age: Option<i16>,

    pub gender: Option<Gender>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub address: String,

    pub contact_phone: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// A match surfaced to the submitter right at creation time.
#[derive(Debug, Serialize)]
pub struct InitialMatch {
    pub id: String,
    pub similarity_score: u8,
    pub status: String,
}

/// Response for a created report.
#[derive(Debug, Serialize)]
pub struct CreateReportResponse {
    pub report_id: String,
    pub tracking_code: String,
    pub initial_matches: Vec<InitialMatch>,
}

/// Report command service.
#[derive(Clone)]
pub struct ReportService {
    report_repo: ReportRepository,
    user_repo: UserRepository,
    mawkab_repo: MawkabRepository,
    matching: MatchingService,
    events: DomainEvents,
    clock: Arc<dyn Clock>,
    id_gen: IdGenerator,
    config: ReportConfig,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub fn new(
        report_repo: ReportRepository,
        user_repo: UserRepository,
        mawkab_repo: MawkabRepository,
        matching: MatchingService,
        events: DomainEvents,
        clock: Arc<dyn Clock>,
        config: ReportConfig,
    ) -> Self {
        Self {
            report_repo,
            user_repo,
            mawkab_repo,
            matching,
            events,
            clock,
            id_gen: IdGenerator::new(),
            config,
        }
    }

    /// Create a lost/found report and scan for initial matches.
    pub async fn create_report(
        &self,
        user_id: &str,
        input: CreateReportInput,
    ) -> AppResult<CreateReportResponse> {
        input.validate()?;

        if input.image_urls.len() > self.config.max_images {
            return Err(AppError::TooManyImages(self.config.max_images));
        }

        let user = self.user_repo.get_by_id(user_id).await?;

        // Mawkab owners report on behalf of many families and are exempt
        // from the daily budget.
        let today = self.clock.now().date_naive();
        if !user.is_verified_mawkab_owner() {
            let current = if user.daily_report_date == Some(today) {
                user.daily_report_count
            } else {
                0
            };

            if current >= self.config.daily_report_limit as i16 {
                return Err(AppError::DailyLimitReached(self.config.daily_report_limit));
            }

            self.user_repo
                .set_daily_report_count(user_id, current + 1, today)
                .await?;
        }

        let now = self.clock.now().fixed_offset();
        let tracking_code = generate_tracking_code(self.clock.now().year());
        let mawkab_id = if user.is_verified_mawkab_owner() {
            user.mawkab_id.clone()
        } else {
            None
        };

        let model = report::ActiveModel {
            id: Set(self.id_gen.generate()),
            report_type: Set(input.report_type),
            status: Set(ReportStatus::Active),
            name: Set(input.person_name),
            age: Set(input.age),
            gender: Set(input.gender),
            description: Set(input.description),
            image_urls: Set(json!(input.image_urls)),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            address: Set(input.address),
            contact_phone: Set(input.contact_phone),
            user_id: Set(user_id.to_string()),
            mawkab_id: Set(mawkab_id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            resolved_at: Set(None),
            suspended_at: Set(None),
        };
        let created = self.report_repo.create(model).await?;

        if let Some(mawkab_id) = &mawkab_id {
            self.mawkab_repo.increment_total_reports(mawkab_id).await?;
        }

        // Matching is best effort here; a scan failure must not lose the
        // report that was just persisted.
        let initial_matches = match self.matching.find_matches_for_report(&created.id).await {
            Ok(candidates) => candidates
                .into_iter()
                .map(|c| InitialMatch {
                    id: c.report_id,
                    similarity_score: c.similarity_score,
                    status: "pending".to_string(),
                })
                .collect(),
            Err(e) => {
                warn!(report_id = %created.id, error = %e, "Failed to find initial matches");
                Vec::new()
            }
        };

        self.events
            .emit(
                "report.created",
                json!({
                    "report_id": created.id,
                    "report_type": created.report_type,
                    "user_id": user_id,
                }),
            )
            .await;

        info!(
            report_id = %created.id,
            tracking_code = %tracking_code,
            "Report created"
        );

        Ok(CreateReportResponse {
            report_id: created.id,
            tracking_code,
            initial_matches,
        })
    }

    /// Change a report's status. Users may only resolve their own reports;
    /// suspension is administrative tooling outside this service.
    pub async fn update_status(
        &self,
        report_id: &str,
        user_id: &str,
        new_status: &str,
        reason: &str,
    ) -> AppResult<()> {
        let Some(found) = self.report_repo.find_by_id(report_id).await? else {
            return Err(AppError::ReportNotFound(report_id.to_string()));
        };

        if found.user_id != user_id {
            return Err(AppError::StatusChangeDenied);
        }

        if new_status != "resolved" {
            return Err(AppError::InvalidStatus);
        }

        match found.status {
            ReportStatus::Resolved => return Err(AppError::AlreadyResolved),
            ReportStatus::Suspended => return Err(AppError::ReportSuspended),
            ReportStatus::Active => {}
        }

        let report_type = found.report_type;
        let mawkab_id = found.mawkab_id.clone();

        self.report_repo
            .mark_resolved(found, self.clock.now().fixed_offset())
            .await?;

        if let Some(mawkab_id) = &mawkab_id {
            self.mawkab_repo
                .increment_resolved_reports(mawkab_id)
                .await?;
        }

        self.events
            .emit(
                "report.resolved",
                json!({
                    "report_id": report_id,
                    "report_type": report_type,
                    "user_id": user_id,
                    "reason": reason,
                }),
            )
            .await;

        info!(report_id, user_id, "Report resolved");

        Ok(())
    }
}

/// Tracking code shown to submitters, e.g. `PYD-2024-12345`.
fn generate_tracking_code(year: i32) -> String {
    let number: u32 = rand::thread_rng().gen_range(10_000..100_000);
    format!("PYD-{year}-{number}")
}
