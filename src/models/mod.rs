pub mod api;
pub mod operation;
pub mod status_message;
pub mod target;
