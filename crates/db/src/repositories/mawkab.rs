//! Mawkab repository.

use std::sync::Arc;

use crate::entities::mawkab;
use crate::entities::Mawkab;
use crate::repositories::db_err;
use peyda_common::AppResult;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};

/// Mawkab repository for database operations.
#[derive(Clone)]
pub struct MawkabRepository {
    db: Arc<DatabaseConnection>,
}

impl MawkabRepository {
    /// Create a new mawkab repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a mawkab by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<mawkab::Model>> {
        Mawkab::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Whether a user already registered a mawkab.
    pub async fn exists_for_owner(&self, owner_user_id: &str) -> AppResult<bool> {
        let count = Mawkab::find()
            .filter(mawkab::Column::OwnerUserId.eq(owner_user_id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Create a new mawkab.
    pub async fn create(&self, model: mawkab::ActiveModel) -> AppResult<mawkab::Model> {
        model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Atomically bump the total-reports counter.
    pub async fn increment_total_reports(&self, id: &str) -> AppResult<()> {
        Mawkab::update_many()
            .filter(mawkab::Column::Id.eq(id))
            .col_expr(
                mawkab::Column::TotalReports,
                Expr::col(mawkab::Column::TotalReports).add(1),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Atomically bump the resolved-reports counter.
    pub async fn increment_resolved_reports(&self, id: &str) -> AppResult<()> {
        Mawkab::update_many()
            .filter(mawkab::Column::Id.eq(id))
            .col_expr(
                mawkab::Column::ResolvedReports,
                Expr::col(mawkab::Column::ResolvedReports).add(1),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
