//! SeaORM Entity for operation_record_errors table (append-only)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_record_errors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub record_id: i32,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::operation_records::Entity",
        from = "Column::RecordId",
        to = "super::operation_records::Column::Id"
    )]
    OperationRecords,
}

impl Related<super::operation_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OperationRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
