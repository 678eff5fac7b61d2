//! Matching engine.
//!
//! Pairs a new report with all active reports of the opposite type by a
//! weighted similarity score, records the pairs that clear the display
//! threshold, and decides which side gets notified. Two thresholds keep
//! notification fatigue down: everything at or above 40 is created and
//! queryable, only scores at or above 60 push a `match.found` event.

use std::sync::Arc;

use peyda_common::config::MatchingConfig;
use peyda_common::{AppError, AppResult, Clock, IdGenerator};
use peyda_db::entities::report::{self, Gender, ReportType};
use peyda_db::entities::report_match::{self, MatchStatus};
use peyda_db::repositories::{db_err, is_unique_violation, MatchRepository, ReportRepository};
use sea_orm::Set;
use serde_json::json;
use tracing::{info, warn};

use crate::services::event_publisher::DomainEvents;

/// A retained match candidate for a report.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    /// The candidate (pre-existing) report.
    pub report_id: String,
    /// Owner of the candidate report; the notification target.
    pub user_id: String,
    /// Truncated weighted score in [0, 100].
    pub similarity_score: u8,
}

/// Matching service for lost/found reports.
#[derive(Clone)]
pub struct MatchingService {
    report_repo: ReportRepository,
    match_repo: MatchRepository,
    events: DomainEvents,
    clock: Arc<dyn Clock>,
    id_gen: IdGenerator,
    config: MatchingConfig,
}

impl MatchingService {
    /// Create a new matching service.
    #[must_use]
    pub fn new(
        report_repo: ReportRepository,
        match_repo: MatchRepository,
        events: DomainEvents,
        clock: Arc<dyn Clock>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            report_repo,
            match_repo,
            events,
            clock,
            id_gen: IdGenerator::new(),
            config,
        }
    }

    /// Find, record and (when warranted) announce matches for a report.
    ///
    /// Detection is commutative: whichever side of a pair is created last
    /// finds the same pair with the same score.
    pub async fn find_matches_for_report(
        &self,
        report_id: &str,
    ) -> AppResult<Vec<MatchCandidate>> {
        let Some(new_report) = self.report_repo.find_by_id(report_id).await? else {
            warn!(report_id, "Matching requested for unknown report");
            return Ok(Vec::new());
        };

        // Withdrawn or resolved reports must not spawn new pairings.
        if !new_report.is_active() {
            return Ok(Vec::new());
        }

        let candidates = self
            .report_repo
            .find_match_candidates(
                new_report.report_type.opposite(),
                new_report.gender,
                self.config.max_candidates,
            )
            .await?;

        let mut matches = Vec::new();
        for candidate in candidates {
            if self
                .match_repo
                .exists_for_pair(&new_report.id, &candidate.id)
                .await?
            {
                continue;
            }

            let score = similarity_score(&new_report, &candidate);
            if score >= self.config.display_threshold {
                matches.push(MatchCandidate {
                    report_id: candidate.id,
                    user_id: candidate.user_id,
                    similarity_score: score,
                });
            }
        }

        // Candidates arrive newest-first; the stable sort keeps that order
        // within equal scores.
        matches.sort_by(|a, b| b.similarity_score.cmp(&a.similarity_score));
        matches.truncate(self.config.max_matches);

        self.create_matches(&new_report, &matches).await?;

        Ok(matches)
    }

    /// Reject a pending match.
    ///
    /// Only the owner of the lost-side report may reject; the found-side
    /// owner can view the match but not act on it.
    pub async fn reject_match(
        &self,
        match_id: &str,
        acting_user_id: &str,
        action: &str,
        notes: &str,
    ) -> AppResult<()> {
        if action != "rejected" {
            return Err(AppError::InvalidAction);
        }

        let Some(found_match) = self.match_repo.find_by_id(match_id).await? else {
            return Err(AppError::MatchNotFound(match_id.to_string()));
        };

        let lost_report = self
            .report_repo
            .get_by_id(&found_match.report_lost_id)
            .await?;
        let found_report = self
            .report_repo
            .get_by_id(&found_match.report_found_id)
            .await?;

        let is_lost_owner = lost_report.user_id == acting_user_id;
        let is_found_owner = found_report.user_id == acting_user_id;

        if !is_lost_owner && !is_found_owner {
            return Err(AppError::ActionAccessDenied);
        }
        if !is_lost_owner {
            return Err(AppError::ActionAccessDenied);
        }

        if found_match.status == MatchStatus::Rejected {
            return Err(AppError::AlreadyRejected);
        }

        let report_lost_id = found_match.report_lost_id.clone();
        let report_found_id = found_match.report_found_id.clone();

        self.match_repo
            .mark_rejected(
                found_match,
                acting_user_id,
                self.clock.now().fixed_offset(),
            )
            .await?;

        self.events
            .emit(
                "match.rejected",
                json!({
                    "match_id": match_id,
                    "report_lost_id": report_lost_id,
                    "report_found_id": report_found_id,
                    "rejected_by_user_id": acting_user_id,
                    "notes": notes,
                }),
            )
            .await;

        info!(match_id, user_id = acting_user_id, "Match rejected");

        Ok(())
    }

    async fn create_matches(
        &self,
        new_report: &report::Model,
        candidates: &[MatchCandidate],
    ) -> AppResult<()> {
        for candidate in candidates {
            // The candidate is always the pre-existing side: its owner is
            // still waiting, while the new report's owner just submitted.
            let (report_lost_id, report_found_id) = match new_report.report_type {
                ReportType::Lost => (new_report.id.clone(), candidate.report_id.clone()),
                ReportType::Found => (candidate.report_id.clone(), new_report.id.clone()),
            };

            let model = report_match::ActiveModel {
                id: Set(self.id_gen.generate()),
                report_lost_id: Set(report_lost_id),
                report_found_id: Set(report_found_id),
                similarity_score: Set(i16::from(candidate.similarity_score)),
                status: Set(MatchStatus::Pending),
                notified_report_id: Set(Some(candidate.report_id.clone())),
                created_at: Set(self.clock.now().fixed_offset()),
                rejected_at: Set(None),
                rejected_by_user_id: Set(None),
            };

            let created = match self.match_repo.try_create(model).await {
                Ok(created) => created,
                // A concurrent scan from the other side won the unique
                // pair index; that row is the same match.
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(db_err(e)),
            };

            if candidate.similarity_score >= self.config.notify_threshold {
                self.events
                    .emit(
                        "match.found",
                        json!({
                            "match_id": created.id,
                            "report_lost_id": created.report_lost_id,
                            "report_found_id": created.report_found_id,
                            "notified_user_id": candidate.user_id,
                            "similarity_score": candidate.similarity_score,
                        }),
                    )
                    .await;
            }

            info!(
                match_id = %created.id,
                score = candidate.similarity_score,
                "Match created"
            );
        }

        Ok(())
    }
}

/// Weighted similarity between two reports, truncated to an integer.
///
/// Gender 40%, age 35%, location 25%; sub-scores stay real-valued until the
/// single final truncation.
#[must_use]
pub fn similarity_score(a: &report::Model, b: &report::Model) -> u8 {
    let gender = f64::from(gender_score(a.gender, b.gender));
    let age = f64::from(age_score(a.age, b.age));
    let location = f64::from(location_score(haversine_km(
        a.latitude,
        a.longitude,
        b.latitude,
        b.longitude,
    )));

    (gender * 0.40 + age * 0.35 + location * 0.25) as u8
}

/// Gender sub-score; a missing gender on either side is unknown, not a
/// mismatch.
#[must_use]
pub fn gender_score(a: Option<Gender>, b: Option<Gender>) -> u32 {
    match (a, b) {
        (Some(a), Some(b)) => {
            if a == b {
                100
            } else {
                0
            }
        }
        _ => 50,
    }
}

/// Age sub-score by absolute difference in years.
#[must_use]
pub fn age_score(a: Option<i16>, b: Option<i16>) -> u32 {
    let (Some(a), Some(b)) = (a, b) else {
        return 50;
    };

    match (a - b).unsigned_abs() {
        0 => 100,
        1..=2 => 90,
        3..=5 => 70,
        6..=10 => 40,
        _ => 10,
    }
}

/// Location sub-score by great-circle distance.
#[must_use]
pub fn location_score(distance_km: f64) -> u32 {
    if distance_km <= 0.5 {
        100
    } else if distance_km <= 1.0 {
        90
    } else if distance_km <= 2.0 {
        70
    } else if distance_km <= 5.0 {
        50
    } else if distance_km <= 10.0 {
        30
    } else {
        10
    }
}

/// Haversine distance between two coordinates in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let (lat1, lng1) = (lat1.to_radians(), lng1.to_radians());
    let (lat2, lng2) = (lat2.to_radians(), lng2.to_radians());

    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
