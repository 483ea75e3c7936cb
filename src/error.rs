//! Error types returned by problem construction, finalization, and
//! optimizer configuration.

use thiserror::Error;

/// Errors produced by the crate's fallible operations.
///
/// Problem-construction and configuration errors are surfaced to the
/// caller immediately. Errors raised *inside* an optimizer attempt (for
/// instance a cost term producing `NaN`) are instead contained by the
/// attempt that produced them and recorded on the relevant
/// [`crate::solution::SolutionStore`]; see
/// [`crate::solution::SolutionStore::errors`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CfnError {
  /// A mutation was attempted on a problem or term after `finalize()`.
  #[error("attempted to mutate a finalized problem")]
  FinalizedViolation,

  /// An assignment's length did not match the number of variable nodes.
  #[error(
    "assignment has {actual} entries, but the problem has {expected} \
     variable nodes"
  )]
  ArityMismatch {
    /// Expected number of entries (the number of variable nodes).
    expected: usize,
    /// Number of entries the caller supplied.
    actual: usize,
  },

  /// A two-body key `(i, j)` was supplied with `i >= j`.
  #[error("two-body key ({i}, {j}) does not satisfy i < j")]
  KeyOrderViolation {
    /// The first (row) node index supplied.
    i: usize,
    /// The second (column) node index supplied.
    j: usize,
  },

  /// An assignment contained a choice index outside the valid range for
  /// its node.
  #[error(
    "choice {choice} is out of range for variable node {node} with \
     {n_choices} choices"
  )]
  ChoiceOutOfRange {
    /// The variable node index (in the canonical variable-node order).
    node: usize,
    /// The offending choice index.
    choice: usize,
    /// The number of candidate choices at that node.
    n_choices: usize,
  },

  /// An optimizer configuration value was rejected.
  #[error("invalid configuration: {reason}")]
  InvalidConfiguration {
    /// Human-readable explanation of which value was rejected and why.
    reason: String,
  },

  /// An iterative sub-algorithm exceeded its iteration budget and
  /// `throw_if_exceeded` was set.
  ///
  /// No operation in this crate currently produces this variant: greedy
  /// descent and Monte Carlo annealing both run to a fixed, non-iterative
  /// step budget rather than iterating to convergence. It is kept for
  /// external callers that layer an iterate-to-convergence wrapper on
  /// top of these optimizers, per the optional hook acknowledged in the
  /// concurrency model.
  #[error("iteration budget of {budget} exceeded")]
  IterationBudgetExceeded {
    /// The iteration budget that was exceeded.
    budget: usize,
  },
}

/// Convenience alias for results of this crate's fallible operations.
pub type Result<T> = std::result::Result<T, CfnError>;
