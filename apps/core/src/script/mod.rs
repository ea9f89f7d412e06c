//! Declarative sales script: model, validation and the reloadable store.

pub mod model;
pub mod store;

pub use model::{Defaults, Expect, Script, Step};
pub use store::ScriptStore;
