//! # Workflows Module
//!
//! High-level entry points for front ends.
//!
//! - **Editing** ([`editor`]) - A [`Pipeline`] receives property-changed,
//!   connect and move events, applies propagation and hands back the refreshed
//!   command preview.
//! - **Execution** ([`execute`]) - Drives a process orchestrator through a
//!   compiled command list with optional cancellation.

pub mod editor;
pub mod execute;

pub use editor::{EditorUpdate, Pipeline, PipelineError, SessionIndex};
pub use execute::{RunOutcome, execute};
