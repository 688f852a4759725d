//! SeaORM Entity for assignments table
//!
//! Binds a target to one worker host. Clustered targets carry a 0-based
//! node ordinal; node 0 is the distinguished node for restore aggregation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "assignments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub target_id: i32,
    pub worker_id: i32,
    pub node: Option<i32>,
    pub deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::targets::Entity",
        from = "Column::TargetId",
        to = "super::targets::Column::Id"
    )]
    Targets,
    #[sea_orm(
        belongs_to = "super::workers::Entity",
        from = "Column::WorkerId",
        to = "super::workers::Column::Id"
    )]
    Workers,
    #[sea_orm(has_many = "super::operation_records::Entity")]
    OperationRecords,
}

impl Related<super::targets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Targets.def()
    }
}

impl Related<super::workers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workers.def()
    }
}

impl Related<super::operation_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OperationRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
