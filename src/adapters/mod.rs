//! Adapters for external systems.

pub mod process;
