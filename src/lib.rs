//! Broker Tool Gateway
//!
//! Lets a language model operate a brokerage account through a fixed catalog
//! of tools:
//! - one authenticated broker session shared by every tool call
//! - safety checks (order-quantity ceiling, dry-run mode) before any mutation
//! - tool schemas sanitized for the model's function-calling contract
//! - automatic search → quote chaining for price questions
//!
//! QUERY → MODEL → DISPATCH → CHAIN? → NARRATE → ANSWER

pub mod agent;
pub mod api;
pub mod broker;
pub mod chain;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod safety;
pub mod schema;
pub mod session;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use error::{GatewayError, Result};

// Re-export common types
pub use models::*;
