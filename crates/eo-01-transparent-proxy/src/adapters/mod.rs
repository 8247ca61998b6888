//! Adapters for the authorization ports.

pub mod api_keys;
pub mod auth_agent;
pub mod authorizers;

pub use api_keys::ApiKeySet;
pub use auth_agent::AuthAgentClient;
pub use authorizers::{BooleanValidator, ExchangingValidator};
