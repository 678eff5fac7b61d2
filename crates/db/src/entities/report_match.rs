//! Match entity (proposed pairing between one lost and one found report).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Match status. Rejection is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// The schema enforces uniqueness on the `(report_lost_id, report_found_id)`
/// pair; the engine additionally checks both orientations before insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report_match")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub report_lost_id: String,

    pub report_found_id: String,

    /// Similarity score in [0, 100].
    pub similarity_score: i16,

    pub status: MatchStatus,

    /// The pre-existing report whose owner receives the notification.
    #[sea_orm(nullable)]
    pub notified_report_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub rejected_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub rejected_by_user_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::ReportLostId",
        to = "super::report::Column::Id",
        on_delete = "Cascade"
    )]
    LostReport,

    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::ReportFoundId",
        to = "super::report::Column::Id",
        on_delete = "Cascade"
    )]
    FoundReport,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this match is still awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == MatchStatus::Pending
    }
}
