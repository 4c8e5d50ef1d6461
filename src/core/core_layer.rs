// The core module contains all business logic.
// Each feature gets its own submodule; none of them know about the transport.

#[path = "state/mod.rs"]
pub mod state;

#[path = "messaging/messenger.rs"]
pub mod messaging;

#[path = "authorization/authorization_service.rs"]
pub mod authorization;

#[path = "policy/policy_service.rs"]
pub mod policy;

#[path = "escalation/escalation_service.rs"]
pub mod escalation;

#[path = "rentals/rental_service.rs"]
pub mod rentals;
