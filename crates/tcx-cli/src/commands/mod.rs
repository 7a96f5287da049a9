//! Command handlers for the `tcx` binary.

pub mod bars;
pub mod run;
