//! Error taxonomy for the compilation pipeline (spec §7).
//!
//! The pipeline is a batch compiler: every error is fatal and terminates
//! the run. There is no local recovery, so this module only needs to
//! classify *why* compilation failed, not how to continue.

use thiserror::Error;

/// A fatal condition raised anywhere in the compilation pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The parser (or, here, the `TaskSpec` IR) produced a malformed tree:
    /// a reference to an unknown fluent, or a cycle in the CPF dependency
    /// graph.
    #[error("structural error: {0}")]
    Structural(String),

    /// A state-action constraint simplified to the constant `0`: the task
    /// has no legal actions in some state and is declared infeasible.
    #[error("infeasible precondition: {0}")]
    Infeasible(String),

    /// The solver oracle returned `unsat` where satisfiability was
    /// required, answered `unknown`, or timed out.
    #[error("solver failure: {0}")]
    Solver(String),

    /// A cache or enumeration exceeded its configured size bound.
    #[error("resource limit exceeded: {0}")]
    Resource(String),

    /// An internal invariant did not hold (hash-key non-negativity, index
    /// consistency, replacement-map uniqueness). Indicates a bug in this
    /// crate rather than a problem with the input task.
    #[error("internal assertion failed: {0}")]
    Assertion(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
