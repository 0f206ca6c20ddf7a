pub mod backup_exchange;
pub mod core;
pub mod dashboard;
pub mod dataset;
pub mod filters;
pub mod setup;
