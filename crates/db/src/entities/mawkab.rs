//! Mawkab entity (registered aid station).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mawkab approval status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum MawkabStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mawkab")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    pub owner_name: String,

    pub owner_phone: String,

    /// One mawkab per owner. Unique.
    #[sea_orm(unique)]
    pub owner_user_id: String,

    pub latitude: f64,

    pub longitude: f64,

    #[sea_orm(column_type = "Text")]
    pub address: String,

    pub status: MawkabStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,

    /// Lifetime report counters, updated atomically in the store.
    pub total_reports: i32,

    pub resolved_reports: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
