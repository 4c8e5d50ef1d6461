// Core state module - the moderation aggregate and the store that guards it.

pub mod state_models;
pub mod state_store;

pub use state_models::*;
pub use state_store::{SnapshotStore, StateStore, StoreError};
