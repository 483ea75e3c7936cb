//! Smallest possible problem: one node, three choices, no interaction
//! terms. Greedy descent from any seed finds the minimum by inspection.

use cfnopt::optimizer::{greedy::GreedyConfig, greedy::GreedyOptimizer, Optimizer};
use cfnopt::problem::CfnProblemBuilder;

fn main() {
  env_logger::init();

  let mut builder = CfnProblemBuilder::new();
  builder.set_onebody(0, 0, 2.0);
  builder.set_onebody(0, 1, -1.0);
  builder.set_onebody(0, 2, 0.5);
  let problem = builder.finalize().expect("problem is well-formed");

  let config = GreedyConfig::builder().n_random_starting_states(4).build();
  let optimizer = GreedyOptimizer::new(config);
  let stores = optimizer.optimize(std::slice::from_ref(&problem));
  let best = stores[0].best().expect("at least one seed was scored");

  println!("best assignment: {:?}, score: {}", &*best.assignment, best.score);
}
