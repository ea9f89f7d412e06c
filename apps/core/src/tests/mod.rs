//! Test Module
//!
//! Crate-level test suite. Unit tests for pure helpers live next to their code.
//!
//! ## Test Categories
//! - `engine_tests`: Run-state transitions and the script driver
//! - `scheduler_tests`: Run lifecycle through the scheduler actor
//! - `commands_tests`: Operator command execution
//! - `sheet_tests`: CSV lead sheet upserts
//! - `telegram_tests`: Bot API client against a mock server
//! - `config_tests`: Environment configuration

mod support;

pub mod sheet_tests;
