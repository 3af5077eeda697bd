//! C6 — Hill-Climbing Engine: steepest-ascent local search over the
//! node-allocation space, driven by the oracle and bounded by the dual
//! budgets.

mod engine;

pub use engine::{
    ConvergenceReason, Metric, MutationLogEntry, OptimizationConfig, OptimizationOutcome, ProgressSnapshot,
    climb,
};
