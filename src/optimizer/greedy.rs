//! Greedy steepest-descent refinement: from a seed assignment, repeatedly
//! apply the single best-improving flip until none improves.

use rayon::prelude::*;
use typed_builder::TypedBuilder;

use crate::{
  assignment::Assignment,
  error::{CfnError, Result},
  optimizer::{build_thread_pool, random_assignment, Optimizer, EPS},
  problem::CfnProblem,
  scratch::ScratchSpace,
  solution::{SolutionStore, StorageMode},
};

/// Repeatedly flips the single variable node and choice that improves
/// the score the most, until no flip improves it by more than
/// [`EPS`]. Returns the locally optimal assignment and its score.
///
/// Shared by [`GreedyOptimizer`] and by
/// [`crate::optimizer::monte_carlo::MonteCarloOptimizer`]'s optional
/// post-refinement step.
pub(crate) fn descend(
  problem: &CfnProblem,
  mut x: Assignment,
  mut score: f64,
  scratch: &mut ScratchSpace,
) -> Result<(Assignment, f64)> {
  loop {
    let mut best_delta = 0.0;
    let mut best_move: Option<(usize, usize)> = None;
    for k in 0..problem.num_variable_nodes() {
      let current = x[k];
      for c in 0..problem.num_choices(k) {
        if c == current {
          continue;
        }
        let x_candidate = x.with_choice(k, c);
        let delta = problem.delta(&x, &x_candidate, scratch)?;
        if delta.is_nan() {
          return Err(CfnError::InvalidConfiguration {
            reason: "cost term produced NaN during greedy descent".to_string(),
          });
        }
        if delta < best_delta {
          best_delta = delta;
          best_move = Some((k, c));
        }
      }
    }
    match best_move {
      Some((k, c)) if best_delta < -EPS => {
        // scratch's pending state tracks whichever candidate `delta` was
        // last called with, which may not be this move: recompute once
        // more against the winning move so `accept_last_move` commits
        // the right pending state.
        let x_new = x.with_choice(k, c);
        let delta = problem.delta(&x, &x_new, scratch)?;
        x = x_new;
        score += delta;
        scratch.accept_last_move();
      }
      _ => return Ok((x, score)),
    }
  }
}

/// Configuration for [`GreedyOptimizer`].
#[derive(TypedBuilder, Debug, Clone)]
pub struct GreedyConfig {
  /// Explicit seed assignments to descend from. If empty,
  /// `n_random_starting_states` random seeds are generated instead.
  #[builder(default)]
  pub starting_states: Vec<Assignment>,

  /// Number of random seeds to generate when `starting_states` is
  /// empty.
  #[builder(default = 1, setter(transform = |n: usize| {
    assert!(n > 0, "n_random_starting_states must be at least 1");
    n
  }))]
  pub n_random_starting_states: usize,

  /// `0` requests all available cores.
  #[builder(default = 0)]
  pub cpu_threads_to_request: usize,

  /// Weight added to an assignment's times-seen counter each time a
  /// duplicate recurs.
  #[builder(default = 1, setter(transform = |n: u64| {
    assert!(n > 0, "n_times_seen_multiplier must be at least 1");
    n
  }))]
  pub n_times_seen_multiplier: u64,

  /// Master seed used to generate random starting states when none are
  /// supplied. `0` means time-derived.
  #[builder(default = 0)]
  pub rng_seed: u64,
}

/// For each seed assignment, runs steepest single-flip descent to a
/// local optimum, in parallel across the configured thread pool.
#[derive(Debug, Clone)]
pub struct GreedyOptimizer {
  config: GreedyConfig,
}

impl GreedyOptimizer {
  /// Builds an optimizer from a validated configuration.
  pub fn new(config: GreedyConfig) -> Self {
    Self { config }
  }

  fn seeds(&self, problem: &CfnProblem) -> Vec<Assignment> {
    if !self.config.starting_states.is_empty() {
      return self.config.starting_states.clone();
    }
    let master_seed = crate::rng::resolve_master_seed(self.config.rng_seed);
    (0..self.config.n_random_starting_states)
      .map(|i| {
        let mut rng = crate::rng::attempt_rng(master_seed, i);
        random_assignment(problem, &mut rng)
      })
      .collect()
  }

  fn optimize_one(&self, problem: &CfnProblem) -> SolutionStore {
    let pool = build_thread_pool(self.config.cpu_threads_to_request);
    let seeds = self.seeds(problem);
    let store = std::sync::Mutex::new(SolutionStore::new(
      seeds.len().max(1),
      StorageMode::CheckOnFinalOnly,
      self.config.n_times_seen_multiplier,
    ));
    pool.install(|| {
      seeds.into_par_iter().for_each(|x| {
        if let Err(e) = problem.validate_assignment(&x) {
          store.lock().unwrap().record_error(e.to_string());
          return;
        }
        let mut scratch = problem.new_scratch();
        let score = match problem.score(&x) {
          Ok(s) if !s.is_nan() => s,
          Ok(_) => {
            store.lock().unwrap().record_error("seed score was NaN");
            return;
          }
          Err(e) => {
            store.lock().unwrap().record_error(e.to_string());
            return;
          }
        };
        match descend(problem, x, score, &mut scratch) {
          Ok((x_final, score_final)) => {
            store.lock().unwrap().offer(x_final, score_final);
          }
          Err(e) => store.lock().unwrap().record_error(e.to_string()),
        }
      });
    });
    store.into_inner().unwrap()
  }
}

impl Optimizer for GreedyOptimizer {
  fn optimize(&self, problems: &[CfnProblem]) -> Vec<SolutionStore> {
    problems.iter().map(|p| self.optimize_one(p)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_trivial_one_node_problem() {
    let mut b = crate::problem::CfnProblemBuilder::new();
    b.set_onebody(0, 0, 2.0);
    b.set_onebody(0, 1, -1.0);
    b.set_onebody(0, 2, 0.5);
    let problem = b.finalize().unwrap();

    let config = GreedyConfig::builder().n_random_starting_states(4).build();
    let optimizer = GreedyOptimizer::new(config);
    let stores = optimizer.optimize(std::slice::from_ref(&problem));
    let best = stores[0].best().unwrap();
    assert_eq!(*best.assignment, [1]);
    assert!((best.score - (-1.0)).abs() < 1e-12);
  }

  #[test]
  fn test_explicit_starting_state_is_used() {
    let mut b = crate::problem::CfnProblemBuilder::new();
    b.set_onebody(0, 0, 0.0);
    b.set_onebody(0, 1, 0.0);
    b.set_onebody(1, 0, 0.0);
    b.set_onebody(1, 1, 0.0);
    b.set_twobody((0, 1), (0, 0), 1.0).unwrap();
    b.set_twobody((0, 1), (1, 1), 1.0).unwrap();
    let problem = b.finalize().unwrap();

    let config = GreedyConfig::builder()
      .starting_states(vec![Assignment::new(vec![0, 0])])
      .build();
    let optimizer = GreedyOptimizer::new(config);
    let stores = optimizer.optimize(std::slice::from_ref(&problem));
    let best = stores[0].best().unwrap();
    assert_eq!(best.score, 0.0);
  }

  #[test]
  #[should_panic(expected = "n_random_starting_states must be at least 1")]
  fn test_zero_random_starts_panics_in_builder() {
    GreedyConfig::builder().n_random_starting_states(0).build();
  }
}
