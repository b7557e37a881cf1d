// m204-common: domain types, endpoint paths and view state for the M204
// migration console.

pub mod artifacts;
pub mod dashboard;
pub mod endpoints;
pub mod inventory;
pub mod listing;
pub mod nav;
pub mod requirements;
pub mod source_files;
pub mod types;
