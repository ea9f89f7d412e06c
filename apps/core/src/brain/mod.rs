//! # Brain Module
//!
//! Text handling for the script engine, no I/O.
//!
//! ## Components
//! - `intent`: yes/no reply classification by phrase prefix
//! - `template`: `{{name}}` placeholder rendering

pub mod intent;
pub mod template;

pub use intent::{Intent, PhraseSet, ReplyClassifier};
pub use template::render;
