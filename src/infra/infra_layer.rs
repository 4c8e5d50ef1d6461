// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "snapshot/mod.rs"]
pub mod snapshot;

#[path = "gateway/mod.rs"]
pub mod gateway;
