//! Script execution engine.
//!
//! - `state`: pure run-state transitions
//! - `driver`: async execution of a script run (pacing, sending, recording)
//! - `continuous`: the repeating random-word emitter

pub mod continuous;
pub mod driver;
pub mod state;

pub use driver::EngineContext;
pub use state::{
    Next, Notice, Phase, Reply, RunState, RunStatus, ScriptRunState, Terminal, Transition,
};
