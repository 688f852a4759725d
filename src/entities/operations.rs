//! SeaORM Entity for operations table
//!
//! One row per fleet-wide action. Exactly one of `group_id` / `target_id`
//! names the entity whose `running` flag the operation owns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: String,
    pub status: String,
    pub group_id: Option<i32>,
    pub target_id: Option<i32>,
    pub started_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::operation_records::Entity")]
    OperationRecords,
}

impl Related<super::operation_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OperationRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
