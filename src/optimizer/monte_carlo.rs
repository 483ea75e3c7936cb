//! Parallel Metropolis / simulated-annealing optimizer.

use std::sync::Mutex;

use rand::Rng;
use rayon::prelude::*;
use typed_builder::TypedBuilder;

use crate::{
  optimizer::{build_thread_pool, greedy::descend, random_assignment, Optimizer, EPS},
  problem::CfnProblem,
  rng::{attempt_rng, resolve_master_seed},
  schedule::AnnealingSchedule,
  solution::{SolutionStore, StorageMode},
};

/// Configuration for [`MonteCarloOptimizer`].
#[derive(TypedBuilder, Debug, Clone)]
pub struct MonteCarloConfig {
  /// Temperature source; cloned fresh for every attempt.
  pub annealing_schedule: AnnealingSchedule,

  /// Hard step budget per attempt.
  #[builder(setter(transform = |n: usize| {
    assert!(n > 0, "annealing_steps_per_attempt must be at least 1");
    n
  }))]
  pub annealing_steps_per_attempt: usize,

  /// Number of independent attempts run per problem.
  #[builder(default = 1, setter(transform = |n: usize| {
    assert!(n > 0, "attempts_per_problem must be at least 1");
    n
  }))]
  pub attempts_per_problem: usize,

  /// `0` requests all available cores.
  #[builder(default = 0)]
  pub cpu_threads_to_request: usize,

  /// Which intermediate states get offered to the solution store.
  #[builder(default = StorageMode::CheckOnAcceptance)]
  pub solution_storage_mode: StorageMode,

  /// Best-*N* heap capacity per problem.
  #[builder(default = 10, setter(transform = |n: usize| {
    assert!(n > 0, "n_solutions_to_store_per_problem must be at least 1");
    n
  }))]
  pub n_solutions_to_store_per_problem: usize,

  /// If set, each attempt's best assignment is additionally refined by
  /// greedy descent before being pushed to the store.
  #[builder(default = false)]
  pub greedy_refine_after_mc: bool,

  /// 64-bit master seed; per-attempt RNGs are deterministic functions
  /// of `(rng_seed, attempt_index)`. `0` means time-derived.
  #[builder(default = 0)]
  pub rng_seed: u64,
}

/// Runs independent Metropolis/simulated-annealing trajectories per
/// problem, in parallel across the configured thread pool.
#[derive(Debug, Clone)]
pub struct MonteCarloOptimizer {
  config: MonteCarloConfig,
}

impl MonteCarloOptimizer {
  /// Builds an optimizer from a validated configuration.
  pub fn new(config: MonteCarloConfig) -> Self {
    Self { config }
  }

  fn run_attempt(&self, problem: &CfnProblem, attempt_index: usize, store: &Mutex<SolutionStore>) {
    let mut rng = attempt_rng(resolve_master_seed(self.config.rng_seed), attempt_index);
    let mut schedule = self.config.annealing_schedule.clone();
    schedule.set_call_count_final(self.config.annealing_steps_per_attempt);

    let mut x = random_assignment(problem, &mut rng);
    let mut scratch = problem.new_scratch();
    let mut score = match problem.score(&x) {
      Ok(s) if !s.is_nan() => s,
      Ok(_) => {
        store.lock().unwrap().record_error("initial score was NaN");
        return;
      }
      Err(e) => {
        store.lock().unwrap().record_error(e.to_string());
        return;
      }
    };
    let mut best_x = x.clone();
    let mut best_score = score;
    let mode = self.config.solution_storage_mode;

    for _ in 0..self.config.annealing_steps_per_attempt {
      if problem.num_variable_nodes() == 0 {
        break;
      }
      let k = rng.gen_range(0..problem.num_variable_nodes());
      let n_choices = problem.num_choices(k);
      if n_choices <= 1 {
        continue;
      }
      let mut c = rng.gen_range(0..n_choices - 1);
      if c >= x[k] {
        c += 1;
      }
      let x_candidate = x.with_choice(k, c);
      let delta = match problem.delta(&x, &x_candidate, &mut scratch) {
        Ok(d) if !d.is_nan() => d,
        Ok(_) => {
          store.lock().unwrap().record_error("delta evaluated to NaN");
          return;
        }
        Err(e) => {
          store.lock().unwrap().record_error(e.to_string());
          return;
        }
      };

      if mode == StorageMode::CheckEveryStep {
        store.lock().unwrap().offer(x_candidate.clone(), score + delta);
      }

      let temperature = schedule.temperature();
      let accept = delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp();
      if accept {
        x = x_candidate;
        score += delta;
        scratch.accept_last_move();
        if mode == StorageMode::CheckOnAcceptance {
          store.lock().unwrap().offer(x.clone(), score);
        }
        if score < best_score - EPS {
          best_score = score;
          best_x = x.clone();
        }
      }
    }

    if self.config.greedy_refine_after_mc {
      // `scratch`'s accepted baseline tracks `x`, the loop's last
      // accepted state, which is usually not `best_x`: descend from a
      // fresh scratch so its baseline matches the state being refined.
      let mut refine_scratch = problem.new_scratch();
      match descend(problem, best_x.clone(), best_score, &mut refine_scratch) {
        Ok((x_refined, score_refined)) => {
          best_x = x_refined;
          best_score = score_refined;
        }
        Err(e) => store.lock().unwrap().record_error(e.to_string()),
      }
    }

    store.lock().unwrap().offer(best_x, best_score);
  }

  fn optimize_one(&self, problem: &CfnProblem) -> SolutionStore {
    let pool = build_thread_pool(self.config.cpu_threads_to_request);
    let store = Mutex::new(SolutionStore::new(
      self.config.n_solutions_to_store_per_problem,
      self.config.solution_storage_mode,
      1,
    ));
    pool.install(|| {
      (0..self.config.attempts_per_problem).into_par_iter().for_each(|attempt_index| {
        self.run_attempt(problem, attempt_index, &store);
      });
    });
    store.into_inner().unwrap()
  }
}

impl Optimizer for MonteCarloOptimizer {
  fn optimize(&self, problems: &[CfnProblem]) -> Vec<SolutionStore> {
    problems.iter().map(|p| self.optimize_one(p)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::CfnProblemBuilder;

  #[test]
  fn test_trivial_one_node_finds_ground_state() {
    let mut b = CfnProblemBuilder::new();
    b.set_onebody(0, 0, 2.0);
    b.set_onebody(0, 1, -1.0);
    b.set_onebody(0, 2, 0.5);
    let problem = b.finalize().unwrap();

    let config = MonteCarloConfig::builder()
      .annealing_schedule(AnnealingSchedule::constant(1.0, 100).unwrap())
      .annealing_steps_per_attempt(100)
      .attempts_per_problem(1)
      .build();
    let optimizer = MonteCarloOptimizer::new(config);
    let stores = optimizer.optimize(std::slice::from_ref(&problem));
    let best = stores[0].best().unwrap();
    assert_eq!(*best.assignment, [1]);
    assert!((best.score - (-1.0)).abs() < 1e-9);
  }

  #[test]
  fn test_xor_ground_state_found_in_top_n() {
    let mut b = CfnProblemBuilder::new();
    b.set_onebody(0, 0, 0.0);
    b.set_onebody(0, 1, 0.0);
    b.set_onebody(1, 0, 0.0);
    b.set_onebody(1, 1, 0.0);
    b.set_twobody((0, 1), (0, 0), 1.0).unwrap();
    b.set_twobody((0, 1), (1, 1), 1.0).unwrap();
    let problem = b.finalize().unwrap();

    let config = MonteCarloConfig::builder()
      .annealing_schedule(AnnealingSchedule::linear(5.0, 0.05, 200).unwrap())
      .annealing_steps_per_attempt(200)
      .attempts_per_problem(10)
      .solution_storage_mode(StorageMode::CheckOnFinalOnly)
      .rng_seed(1234)
      .build();
    let optimizer = MonteCarloOptimizer::new(config);
    let stores = optimizer.optimize(std::slice::from_ref(&problem));
    let ground_states = [vec![0usize, 1], vec![1, 0]];
    assert!(stores[0]
      .solutions()
      .iter()
      .any(|s| ground_states.contains(&s.assignment.to_vec()) && s.score.abs() < 1e-9));
  }

  #[test]
  fn test_deterministic_replay_same_seed_same_attempt() {
    let mut b = CfnProblemBuilder::new();
    b.set_onebody(0, 0, 1.0);
    b.set_onebody(0, 1, -2.0);
    b.set_onebody(1, 0, 0.5);
    b.set_onebody(1, 1, -0.5);
    b.set_twobody((0, 1), (0, 0), 0.3).unwrap();
    b.set_twobody((0, 1), (1, 1), -0.1).unwrap();
    let problem = b.finalize().unwrap();

    let config = MonteCarloConfig::builder()
      .annealing_schedule(AnnealingSchedule::linear(2.0, 0.1, 50).unwrap())
      .annealing_steps_per_attempt(50)
      .attempts_per_problem(1)
      .rng_seed(99)
      .build();
    let optimizer = MonteCarloOptimizer::new(config);
    let best1 = optimizer.optimize(std::slice::from_ref(&problem))[0].best().unwrap();
    let best2 = optimizer.optimize(std::slice::from_ref(&problem))[0].best().unwrap();
    assert_eq!(best1.assignment, best2.assignment);
    assert_eq!(best1.score, best2.score);
  }

  #[test]
  #[should_panic(expected = "attempts_per_problem must be at least 1")]
  fn test_zero_attempts_panics_in_builder() {
    MonteCarloConfig::builder()
      .annealing_schedule(AnnealingSchedule::constant(1.0, 1).unwrap())
      .annealing_steps_per_attempt(10)
      .attempts_per_problem(0)
      .build();
  }
}
