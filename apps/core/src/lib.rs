//! Scripted outbound-sales chat agent.
//!
//! The core is the script execution engine: a per-conversation state machine
//! that emits timed message bursts, waits for a classified reply, branches,
//! and records captured leads. The transport and the lead sheet sit behind
//! the traits in [`actors::traits`].

pub mod actors;
pub mod brain;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs_manager;
pub mod models;
pub mod pacing;
pub mod script;
pub mod sheet;
pub mod telegram;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use error::AppError;
