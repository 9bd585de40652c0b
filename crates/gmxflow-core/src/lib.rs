//! # gmxflow Core Library
//!
//! The engine behind a node-graph editor for GROMACS molecular dynamics
//! pipelines: each node is one preparation or simulation step, edges carry file
//! artifacts between steps, and the graph compiles to the shell commands that
//! run the pipeline.
//!
//! ## Architectural Philosophy
//!
//! The library is layered so each part can be used and tested on its own.
//!
//! - **[`core`]: The Model.** The node catalogue (`PortTypeRegistry`), the
//!   pipeline graph (`GraphModel`) and the propagation rules that keep file names
//!   consistent along edges. Entirely synchronous.
//!
//! - **[`compiler`]: Rendering.** Fills command templates and renders the
//!   flag-pair preview, ordered horizontally or by dependencies.
//!
//! - **[`process`]: Execution.** Runs compiled commands one at a time in a
//!   configured shell environment and reports through an event channel.
//!
//! - **[`session`]: Persistence.** JSON snapshots of the graph plus opaque
//!   front-end state.
//!
//! - **[`workflows`]: The Public API.** Ties the layers together behind the
//!   events a front end produces: property edits, connections, run requests.

pub mod compiler;
pub mod core;
pub mod process;
pub mod session;
pub mod workflows;
