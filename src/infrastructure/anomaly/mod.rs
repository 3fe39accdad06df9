//! Behavioral anomaly detectors built on the escalation primitive
//!
//! These never reject the triggering action: violations accumulate toward
//! an investigation flag consumed by an external review process.

pub mod economy;
pub mod movement;

pub use economy::EconomyMonitor;
pub use movement::{MovementMonitor, MovementVerdict};
