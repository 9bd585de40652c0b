//! # Graph Models Module
//!
//! Data structures describing one pipeline graph: node instances, their typed
//! ports, their ordered property stores, and the connections between ports.
//!
//! ## Key Components
//!
//! - [`ids`] - Stable keys for node instances
//! - [`property`] - Property values and the text/combo distinction
//! - [`port`] - Data kinds, port directions, port references and connections
//! - [`node`] - A single configured processing step
//!
//! A port never owns a value itself: it is a typed view onto one property of
//! its node, which is what makes property propagation a plain copy between
//! two property stores.

pub mod ids;
pub mod node;
pub mod port;
pub mod property;
