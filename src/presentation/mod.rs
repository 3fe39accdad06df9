//! HTTP-facing surface: the admission request filter and response models

pub mod middleware;
pub mod models;

pub use middleware::{AdmissionFilterState, admission_middleware};
pub use models::ErrorResponse;
