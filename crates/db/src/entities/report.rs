//! Report entity (lost/found person submission).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Report types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[sea_orm(string_value = "lost")]
    Lost,
    #[sea_orm(string_value = "found")]
    Found,
}

impl ReportType {
    /// The type this report is matched against.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Lost => Self::Found,
            Self::Found => Self::Lost,
        }
    }
}

/// Person gender. `None` on the report acts as a wildcard during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[sea_orm(string_value = "male")]
    Male,
    #[sea_orm(string_value = "female")]
    Female,
}

/// Report status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[sea_orm(string_value = "active")]
    Active,
    /// Terminal: the person was reunited. `resolved_at` must be set.
    #[sea_orm(string_value = "resolved")]
    Resolved,
    /// Terminal for users; only administrative tooling can lift it.
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub report_type: ReportType,

    pub status: ReportStatus,

    /// Name of the missing/found person.
    pub name: String,

    #[sea_orm(nullable)]
    pub age: Option<i16>,

    #[sea_orm(nullable)]
    pub gender: Option<Gender>,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Image URLs (at most 5 per report).
    #[sea_orm(column_type = "JsonBinary")]
    pub image_urls: Json,

    pub latitude: f64,

    pub longitude: f64,

    #[sea_orm(column_type = "Text")]
    pub address: String,

    pub contact_phone: String,

    /// Submitting user.
    pub user_id: String,

    /// Set when the report was submitted on behalf of a mawkab.
    #[sea_orm(nullable)]
    pub mawkab_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub suspended_at: Option<DateTimeWithTimeZone>,
}

/// Matches reference reports one-directionally; reverse lookups go through
/// indexed queries on the match table, not stored back-pointers.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this report can still participate in matching.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ReportStatus::Active
    }
}
