//! Migration to create operations, their per-assignment records and the
//! append-only record error log

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260301_000001_create_fleet_tables::{Assignments, TargetGroups, Targets};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Operations::Table)
                    .if_not_exists()
                    .col(pk_auto(Operations::Id))
                    .col(string(Operations::Kind))
                    .col(string(Operations::Status))
                    .col(integer_null(Operations::GroupId))
                    .col(integer_null(Operations::TargetId))
                    .col(timestamp_with_time_zone(Operations::StartedAt))
                    .col(timestamp_with_time_zone_null(Operations::CompletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operations_group")
                            .from(Operations::Table, Operations::GroupId)
                            .to(TargetGroups::Table, TargetGroups::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operations_target")
                            .from(Operations::Table, Operations::TargetId)
                            .to(Targets::Table, Targets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for querying in-flight operations
        manager
            .create_index(
                Index::create()
                    .name("idx_operations_status")
                    .table(Operations::Table)
                    .col(Operations::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OperationRecords::Table)
                    .if_not_exists()
                    .col(pk_auto(OperationRecords::Id))
                    .col(integer(OperationRecords::OperationId))
                    .col(integer_null(OperationRecords::AssignmentId))
                    .col(string(OperationRecords::Status))
                    .col(string(OperationRecords::Step))
                    .col(timestamp_with_time_zone_null(OperationRecords::StepUpdatedAt))
                    .col(timestamp_with_time_zone_null(OperationRecords::CompletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operation_records_operation")
                            .from(OperationRecords::Table, OperationRecords::OperationId)
                            .to(Operations::Table, Operations::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operation_records_assignment")
                            .from(OperationRecords::Table, OperationRecords::AssignmentId)
                            .to(Assignments::Table, Assignments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for loading the records of one operation
        manager
            .create_index(
                Index::create()
                    .name("idx_operation_records_operation_id")
                    .table(OperationRecords::Table)
                    .col(OperationRecords::OperationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OperationRecordErrors::Table)
                    .if_not_exists()
                    .col(pk_auto(OperationRecordErrors::Id))
                    .col(integer(OperationRecordErrors::RecordId))
                    .col(text(OperationRecordErrors::Message))
                    .col(timestamp_with_time_zone(OperationRecordErrors::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operation_record_errors_record")
                            .from(OperationRecordErrors::Table, OperationRecordErrors::RecordId)
                            .to(OperationRecords::Table, OperationRecords::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OperationRecordErrors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OperationRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Operations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Operations {
    Table,
    Id,
    Kind,
    Status,
    GroupId,
    TargetId,
    StartedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum OperationRecords {
    Table,
    Id,
    OperationId,
    AssignmentId,
    Status,
    Step,
    StepUpdatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum OperationRecordErrors {
    Table,
    Id,
    RecordId,
    Message,
    CreatedAt,
}
