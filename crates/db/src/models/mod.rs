//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the insert DTOs the repositories accept.

pub mod audit;
pub mod build_job;
pub mod build_task;
pub mod chart_definition;
pub mod chart_version;
pub mod dataset;
pub mod status;
