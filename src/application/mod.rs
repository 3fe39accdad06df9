//! Application services: the admission pipeline, error taxonomy, telemetry

pub mod admission;
pub mod errors;
pub mod telemetry;
