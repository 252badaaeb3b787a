pub mod config;
pub mod database_validator;
pub mod measurement_diff;
pub mod measurement_merge;
pub mod measurement_sync;
