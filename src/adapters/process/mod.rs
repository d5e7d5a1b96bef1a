//! Fitting program adapters.

pub mod child;
#[cfg(test)]
pub mod scripted;

pub use child::{ChildProcess, ProgramLauncher};
#[cfg(test)]
pub use scripted::{ScriptedFit, ScriptedLauncher, ScriptedProcess, ScriptedStats};
