// Messaging gateway infra.
// - `gateway_models.rs` holds the wire shapes.
// - `http_gateway.rs` implements the core `Messenger` port over HTTP.

pub mod gateway_models;
pub mod http_gateway;

pub use http_gateway::{GatewayError, HttpGateway};
