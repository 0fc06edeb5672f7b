//! Pure domain logic for the chart control plane.
//!
//! Nothing in this crate touches the database or the network: the formula
//! engine, payload contracts, diff statuses and throughput arithmetic are
//! shared by the persistence, pipeline and API crates.

pub mod audit;
pub mod diff;
pub mod error;
pub mod formula;
pub mod payload;
pub mod throughput;
pub mod types;
