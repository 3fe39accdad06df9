//! Core domain types shared across the engine
//!
//! Pure data: limit keys, inbound events, admission outcomes. Nothing in
//! this module touches the store or performs I/O.

pub mod admission;
pub mod events;
pub mod keys;
