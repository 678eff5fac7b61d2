//! Idempotency record entity.
//!
//! Stores the first response produced for a `(key, caller)` pair so retries
//! replay it verbatim. The composite primary key is the at-most-once
//! guarantee: a second insert for the same pair is a constraint violation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "idempotency_record")]
pub struct Model {
    /// Client-supplied idempotency key (UUID, canonical form).
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub caller_id: String,

    /// `METHOD:path` of the guarded endpoint.
    pub endpoint: String,

    pub response_status: i16,

    #[sea_orm(column_type = "JsonBinary")]
    pub response_body: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
