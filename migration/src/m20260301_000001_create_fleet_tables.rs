//! Migration to create groups, targets, workers and assignments
//!
//! Targets belong to a group (wave); assignments bind a target to a worker
//! host, with a node ordinal for clustered targets.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TargetGroups::Table)
                    .if_not_exists()
                    .col(pk_auto(TargetGroups::Id))
                    .col(string_uniq(TargetGroups::Name))
                    .col(boolean(TargetGroups::Running).default(false))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Targets::Table)
                    .if_not_exists()
                    .col(pk_auto(Targets::Id))
                    .col(integer(Targets::GroupId))
                    .col(string(Targets::Name))
                    .col(string(Targets::Status).default("NOT_DEPLOYED"))
                    .col(string(Targets::Topology).default("SINGLE"))
                    .col(integer(Targets::NodeCount).default(0))
                    .col(boolean(Targets::Running).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_targets_group")
                            .from(Targets::Table, Targets::GroupId)
                            .to(TargetGroups::Table, TargetGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for listing the targets of a group
        manager
            .create_index(
                Index::create()
                    .name("idx_targets_group_id")
                    .table(Targets::Table)
                    .col(Targets::GroupId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Workers::Table)
                    .if_not_exists()
                    .col(pk_auto(Workers::Id))
                    .col(string_uniq(Workers::Hostname))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Assignments::Table)
                    .if_not_exists()
                    .col(pk_auto(Assignments::Id))
                    .col(integer(Assignments::TargetId))
                    .col(integer(Assignments::WorkerId))
                    .col(integer_null(Assignments::Node))
                    .col(boolean(Assignments::Deleted).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignments_target")
                            .from(Assignments::Table, Assignments::TargetId)
                            .to(Targets::Table, Targets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignments_worker")
                            .from(Assignments::Table, Assignments::WorkerId)
                            .to(Workers::Table, Workers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One assignment per (target, worker)
        manager
            .create_index(
                Index::create()
                    .name("idx_assignments_target_worker")
                    .table(Assignments::Table)
                    .col(Assignments::TargetId)
                    .col(Assignments::WorkerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assignments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Targets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TargetGroups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TargetGroups {
    Table,
    Id,
    Name,
    Running,
}

#[derive(DeriveIden)]
pub enum Targets {
    Table,
    Id,
    GroupId,
    Name,
    Status,
    Topology,
    NodeCount,
    Running,
}

#[derive(DeriveIden)]
enum Workers {
    Table,
    Id,
    Hostname,
}

#[derive(DeriveIden)]
pub enum Assignments {
    Table,
    Id,
    TargetId,
    WorkerId,
    Node,
    Deleted,
}
