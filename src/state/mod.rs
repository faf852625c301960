//! progress.json Management Module
//!
//! Handles persistence and validation of engine state, including:
//! - Atomic, deterministic saves
//! - Schema and invariant validation on every load

mod schema;
mod store;

pub use schema::validate_state;
pub use store::StateStore;
