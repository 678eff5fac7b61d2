//! Match repository.

use std::sync::Arc;

use crate::entities::report_match::{self, MatchStatus};
use crate::entities::ReportMatch;
use crate::repositories::db_err;
use peyda_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

/// Match repository for database operations.
#[derive(Clone)]
pub struct MatchRepository {
    db: Arc<DatabaseConnection>,
}

impl MatchRepository {
    /// Create a new match repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a match by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report_match::Model>> {
        ReportMatch::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Whether a match already exists between two reports, in either
    /// orientation.
    pub async fn exists_for_pair(&self, report_a: &str, report_b: &str) -> AppResult<bool> {
        let count = ReportMatch::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(report_match::Column::ReportLostId.eq(report_a))
                            .add(report_match::Column::ReportFoundId.eq(report_b)),
                    )
                    .add(
                        Condition::all()
                            .add(report_match::Column::ReportLostId.eq(report_b))
                            .add(report_match::Column::ReportFoundId.eq(report_a)),
                    ),
            )
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(count > 0)
    }

    /// Create a new match.
    pub async fn create(&self, model: report_match::ActiveModel) -> AppResult<report_match::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Create a new match, returning the raw database error so callers can
    /// distinguish a unique-pair race from other failures.
    pub async fn try_create(
        &self,
        model: report_match::ActiveModel,
    ) -> Result<report_match::Model, sea_orm::DbErr> {
        model.insert(self.db.as_ref()).await
    }

    /// Matches referencing a report on either side, best score first.
    pub async fn find_for_report(&self, report_id: &str) -> AppResult<Vec<report_match::Model>> {
        ReportMatch::find()
            .filter(
                Condition::any()
                    .add(report_match::Column::ReportLostId.eq(report_id))
                    .add(report_match::Column::ReportFoundId.eq(report_id)),
            )
            .order_by_desc(report_match::Column::SimilarityScore)
            .order_by_desc(report_match::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Mark a match rejected, recording actor and time.
    pub async fn mark_rejected(
        &self,
        model: report_match::Model,
        rejected_by_user_id: &str,
        rejected_at: sea_orm::prelude::DateTimeWithTimeZone,
    ) -> AppResult<report_match::Model> {
        let mut active: report_match::ActiveModel = model.into();
        active.status = Set(MatchStatus::Rejected);
        active.rejected_at = Set(Some(rejected_at));
        active.rejected_by_user_id = Set(Some(rejected_by_user_id.to_string()));
        active.update(self.db.as_ref()).await.map_err(db_err)
    }
}
