pub use super::assignments::Entity as Assignments;
pub use super::operation_record_errors::Entity as OperationRecordErrors;
pub use super::operation_records::Entity as OperationRecords;
pub use super::operations::Entity as Operations;
pub use super::target_groups::Entity as TargetGroups;
pub use super::targets::Entity as Targets;
pub use super::workers::Entity as Workers;
