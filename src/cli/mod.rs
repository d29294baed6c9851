//! Command line interface module
//!
//! Argument parsing and the runner that loads the desired state, builds the
//! registry client and drives one reconciliation pass.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
