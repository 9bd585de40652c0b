//! # Process Orchestration
//!
//! Sequential execution of compiled command lines in an external shell.
//!
//! - [`environment`] - Where commands run and how the GROMACS environment is set up.
//! - [`events`] - The event stream a run reports through, and the run state.
//! - [`orchestrator`] - The queue runner itself.

pub mod environment;
pub mod events;
pub mod orchestrator;

pub use environment::{ConfigError, ExecutionEnvironment, ExecutionEnvironmentBuilder};
pub use events::{ProcessEvent, RunState};
pub use orchestrator::{ExecutionError, ProcessOrchestrator, STOPPED_MESSAGE};
