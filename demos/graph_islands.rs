//! Three nodes whose first choice forms a path graph. A graph-based
//! term rewards collapsing the induced subgraph into a single large
//! island rather than several small ones.

use cfnopt::optimizer::{greedy::GreedyConfig, greedy::GreedyOptimizer, Optimizer};
use cfnopt::problem::CfnProblemBuilder;
use cfnopt::term::graph::{GraphFunctional, GraphTerm};

fn main() {
  env_logger::init();

  let mut builder = CfnProblemBuilder::new();
  for node in 0..3 {
    builder.set_onebody(node, 0, -0.1);
    builder.set_onebody(node, 1, 0.0);
  }

  let mut islands = GraphTerm::new(2.0, GraphFunctional::IslandCount, 2.0);
  islands.add_edge(0, 0, 1, 0, 1.0);
  islands.add_edge(1, 0, 2, 0, 1.0);
  builder.add_term(islands);

  let problem = builder.finalize().expect("problem is well-formed");

  let config = GreedyConfig::builder().n_random_starting_states(8).build();
  let optimizer = GreedyOptimizer::new(config);
  let stores = optimizer.optimize(std::slice::from_ref(&problem));
  let best = stores[0].best().expect("at least one seed was scored");

  println!("best assignment: {:?}, score: {}", &*best.assignment, best.score);
}
