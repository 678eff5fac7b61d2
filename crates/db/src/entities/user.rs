//! User entity (phone-authenticated account).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "mawkab_owner")]
    MawkabOwner,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl UserRole {
    /// Role name as carried in session token claims.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::MawkabOwner => "mawkab_owner",
            Self::Admin => "admin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Full international phone number. Unique.
    #[sea_orm(unique)]
    pub phone: String,

    pub role: UserRole,

    #[sea_orm(nullable)]
    pub mawkab_id: Option<String>,

    pub is_active: bool,

    pub is_banned: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub ban_reason: Option<String>,

    /// Reports submitted on `daily_report_date`.
    pub daily_report_count: i16,

    #[sea_orm(nullable)]
    pub daily_report_date: Option<Date>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub last_activity_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this user owns an approved mawkab and is exempt from the
    /// daily report limit.
    #[must_use]
    pub fn is_verified_mawkab_owner(&self) -> bool {
        self.role == UserRole::MawkabOwner && self.mawkab_id.is_some()
    }
}
