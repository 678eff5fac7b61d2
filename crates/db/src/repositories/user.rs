//! User repository.

use std::sync::Arc;

use crate::entities::user::{self, UserRole};
use crate::entities::User;
use crate::repositories::{db_err, is_unique_violation};
use peyda_common::{AppError, AppResult};
use sea_orm::prelude::{Date, DateTimeWithTimeZone};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a user by phone number.
    pub async fn find_by_phone(&self, phone: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Phone.eq(phone))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Resolve or create the account for a phone number.
    ///
    /// Concurrent first logins from the same phone converge on the unique
    /// phone index: the losing insert falls back to selecting the winner.
    /// Returns the user and whether it was newly created.
    pub async fn get_or_create_by_phone(
        &self,
        phone: &str,
        id: String,
        now: DateTimeWithTimeZone,
    ) -> AppResult<(user::Model, bool)> {
        if let Some(mut existing) = self.find_by_phone(phone).await? {
            self.touch_last_activity(&existing.id, now).await?;
            existing.last_activity_at = Some(now);
            return Ok((existing, false));
        }

        let model = user::ActiveModel {
            id: Set(id),
            phone: Set(phone.to_string()),
            role: Set(UserRole::User),
            mawkab_id: Set(None),
            is_active: Set(true),
            is_banned: Set(false),
            ban_reason: Set(None),
            daily_report_count: Set(0),
            daily_report_date: Set(None),
            created_at: Set(now),
            last_activity_at: Set(Some(now)),
        };

        match model.insert(self.db.as_ref()).await {
            Ok(created) => Ok((created, true)),
            Err(e) if is_unique_violation(&e) => {
                let winner = self.find_by_phone(phone).await?.ok_or_else(|| {
                    AppError::Database("User vanished after unique-phone conflict".to_string())
                })?;
                Ok((winner, false))
            }
            Err(e) => Err(db_err(e)),
        }
    }

    /// Update the user's last-activity timestamp.
    pub async fn touch_last_activity(
        &self,
        user_id: &str,
        now: DateTimeWithTimeZone,
    ) -> AppResult<()> {
        User::update_many()
            .filter(user::Column::Id.eq(user_id))
            .col_expr(user::Column::LastActivityAt, Expr::value(Some(now)))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Persist the user's daily report counter and its date.
    pub async fn set_daily_report_count(
        &self,
        user_id: &str,
        count: i16,
        date: Date,
    ) -> AppResult<()> {
        User::update_many()
            .filter(user::Column::Id.eq(user_id))
            .col_expr(user::Column::DailyReportCount, Expr::value(count))
            .col_expr(user::Column::DailyReportDate, Expr::value(Some(date)))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Link a user to the mawkab they registered.
    pub async fn set_mawkab(&self, user_id: &str, mawkab_id: &str) -> AppResult<()> {
        User::update_many()
            .filter(user::Column::Id.eq(user_id))
            .col_expr(
                user::Column::MawkabId,
                Expr::value(Some(mawkab_id.to_string())),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
