//! SeaORM Entity for targets table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "targets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub group_id: i32,
    pub name: String,
    /// Derived status, see `models::target::TargetStatus`
    pub status: String,
    /// SINGLE or CLUSTERED
    pub topology: String,
    /// Number of cluster nodes (0 for SINGLE targets)
    pub node_count: i32,
    /// Set while an operation scoped to this target alone is in flight
    pub running: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::target_groups::Entity",
        from = "Column::GroupId",
        to = "super::target_groups::Column::Id"
    )]
    TargetGroups,
    #[sea_orm(has_many = "super::assignments::Entity")]
    Assignments,
}

impl Related<super::target_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TargetGroups.def()
    }
}

impl Related<super::assignments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
