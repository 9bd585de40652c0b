//! # Core Module
//!
//! The pipeline data model and the rules that keep it consistent.
//!
//! - **Node catalogue** ([`registry`]) - Node type declarations loaded from TOML:
//!   properties, optional properties, typed ports and command templates.
//! - **Data structures** ([`models`]) - Node instances, ports, properties and edges.
//! - **Graph** ([`graph`]) - The mutable pipeline graph and its edge invariants.
//! - **Propagation** ([`propagation`]) - One-shot copying of file names along edges.
//! - **Errors** ([`error`]) - Failures of graph mutations.

pub mod error;
pub mod graph;
pub mod models;
pub mod propagation;
pub mod registry;
