//! Report repository.

use std::sync::Arc;

use crate::entities::report::{self, Gender, ReportStatus, ReportType};
use crate::entities::Report;
use crate::repositories::db_err;
use peyda_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a report by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<report::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))
    }

    /// Create a new report.
    pub async fn create(&self, model: report::ActiveModel) -> AppResult<report::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Candidate scan for the matching engine: active reports of the given
    /// type, gender equal or unknown when a filter gender is supplied,
    /// newest first, bounded.
    pub async fn find_match_candidates(
        &self,
        report_type: ReportType,
        gender: Option<Gender>,
        limit: u64,
    ) -> AppResult<Vec<report::Model>> {
        let mut query = Report::find()
            .filter(report::Column::ReportType.eq(report_type))
            .filter(report::Column::Status.eq(ReportStatus::Active));

        // Gender is a coarse pre-filter; null on either side is a wildcard.
        if let Some(g) = gender {
            query = query.filter(
                Condition::any()
                    .add(report::Column::Gender.eq(g))
                    .add(report::Column::Gender.is_null()),
            );
        }

        query
            .order_by_desc(report::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Mark a report resolved.
    pub async fn mark_resolved(
        &self,
        model: report::Model,
        resolved_at: sea_orm::prelude::DateTimeWithTimeZone,
    ) -> AppResult<report::Model> {
        let mut active: report::ActiveModel = model.into();
        active.status = Set(ReportStatus::Resolved);
        active.resolved_at = Set(Some(resolved_at));
        active.updated_at = Set(resolved_at);
        active.update(self.db.as_ref()).await.map_err(db_err)
    }
}
