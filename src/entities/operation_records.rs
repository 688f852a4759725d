//! SeaORM Entity for operation_records table
//!
//! One row per (operation, assignment); assignment-less kinds get a single
//! row with `assignment_id = NULL`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub operation_id: i32,
    pub assignment_id: Option<i32>,
    pub status: String,
    pub step: String,
    pub step_updated_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::operations::Entity",
        from = "Column::OperationId",
        to = "super::operations::Column::Id"
    )]
    Operations,
    #[sea_orm(
        belongs_to = "super::assignments::Entity",
        from = "Column::AssignmentId",
        to = "super::assignments::Column::Id"
    )]
    Assignments,
    #[sea_orm(has_many = "super::operation_record_errors::Entity")]
    OperationRecordErrors,
}

impl Related<super::operations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operations.def()
    }
}

impl Related<super::assignments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl Related<super::operation_record_errors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OperationRecordErrors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
