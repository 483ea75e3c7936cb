//! Two nodes, two choices each, with a two-body table that penalizes
//! agreement: an XOR-shaped problem with two equally good ground
//! states. Runs several annealing attempts and reports the best found.

use cfnopt::optimizer::{monte_carlo::MonteCarloConfig, monte_carlo::MonteCarloOptimizer, Optimizer};
use cfnopt::problem::CfnProblemBuilder;
use cfnopt::schedule::AnnealingSchedule;
use cfnopt::solution::StorageMode;

fn main() {
  env_logger::init();

  let mut builder = CfnProblemBuilder::new();
  builder.set_onebody(0, 0, 0.0);
  builder.set_onebody(0, 1, 0.0);
  builder.set_onebody(1, 0, 0.0);
  builder.set_onebody(1, 1, 0.0);
  builder.set_twobody((0, 1), (0, 0), 1.0).unwrap();
  builder.set_twobody((0, 1), (1, 1), 1.0).unwrap();
  let problem = builder.finalize().expect("problem is well-formed");

  let config = MonteCarloConfig::builder()
    .annealing_schedule(AnnealingSchedule::linear(5.0, 0.05, 200).expect("valid temperatures"))
    .annealing_steps_per_attempt(200)
    .attempts_per_problem(10)
    .solution_storage_mode(StorageMode::CheckOnFinalOnly)
    .build();
  let optimizer = MonteCarloOptimizer::new(config);
  let stores = optimizer.optimize(std::slice::from_ref(&problem));

  for solution in stores[0].solutions() {
    println!(
      "assignment: {:?}, score: {}, times_seen: {}",
      &*solution.assignment, solution.score, solution.times_seen
    );
  }
}
