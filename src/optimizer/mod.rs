//! Parallel optimizers consuming a finalized [`crate::problem::CfnProblem`]
//! and producing one [`SolutionStore`] per input problem.

pub mod greedy;
pub mod monte_carlo;

use rayon::ThreadPool;

use crate::{problem::CfnProblem, solution::SolutionStore};

/// Score improvements smaller than this are treated as noise rather
/// than genuine progress, matching the delta-consistency tolerance
/// this crate's scoring guarantees.
pub(crate) const EPS: f64 = 1e-9;

/// Consumes a batch of finalized problems and an optimizer-specific
/// configuration, producing one [`SolutionStore`] per problem.
pub trait Optimizer {
  /// Runs this optimizer against every problem in `problems`,
  /// returning their solution stores in the same order.
  fn optimize(&self, problems: &[CfnProblem]) -> Vec<SolutionStore>;
}

/// Builds the thread pool an optimizer runs its attempts on.
/// `cpu_threads_to_request == 0` requests rayon's default (all
/// available cores).
pub(crate) fn build_thread_pool(cpu_threads_to_request: usize) -> ThreadPool {
  let mut builder = rayon::ThreadPoolBuilder::new();
  if cpu_threads_to_request != 0 {
    builder = builder.num_threads(cpu_threads_to_request);
  }
  builder.build().expect("failed to build rayon thread pool")
}

/// Draws an assignment uniformly at random from each variable node's
/// choice range.
pub(crate) fn random_assignment(
  problem: &CfnProblem,
  rng: &mut impl rand::Rng,
) -> crate::assignment::Assignment {
  (0..problem.num_variable_nodes())
    .map(|k| rng.gen_range(0..problem.num_choices(k)))
    .collect()
}
