//! The graph-based cost term: a functional of the subgraph induced by
//! currently-selected (node, choice) pairs.

use std::collections::{HashMap, HashSet};

use crate::{assignment::Assignment, error::CfnError};

/// Which functional of the induced subgraph's connected components the
/// term reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphFunctional {
  /// Negated count of components at or above `threshold`.
  IslandCount,
  /// Negated sum of `sqrt(size - threshold + 1)` over components at or
  /// above `threshold`.
  SquareRootIslandCount,
  /// Negated square of the component count at or above `threshold`.
  SquareIslandCount,
}

impl GraphFunctional {
  fn evaluate(&self, component_sizes: &[usize], threshold: f64) -> f64 {
    match self {
      GraphFunctional::IslandCount => {
        let count = component_sizes
          .iter()
          .filter(|&&s| s as f64 >= threshold)
          .count();
        -(count as f64)
      }
      GraphFunctional::SquareRootIslandCount => {
        let sum: f64 = component_sizes
          .iter()
          .filter(|&&s| s as f64 >= threshold)
          .map(|&s| (s as f64 - threshold + 1.0).max(0.0).sqrt())
          .sum();
        -sum
      }
      GraphFunctional::SquareIslandCount => {
        let count = component_sizes
          .iter()
          .filter(|&&s| s as f64 >= threshold)
          .count();
        -((count as f64).powi(2))
      }
    }
  }
}

/// A weighted graph keyed by choice pairs: an edge between `(i, c_i)`
/// and `(j, c_j)` is present in the induced subgraph iff node `i`
/// currently holds choice `c_i` and node `j` currently holds choice
/// `c_j`.
#[derive(Debug, Clone)]
pub struct GraphTerm {
  weight: f64,
  functional: GraphFunctional,
  threshold: f64,
  edges: HashMap<(usize, usize, usize, usize), f64>,
  adjacency_var: Vec<Vec<(usize, usize, usize)>>,
}

impl GraphTerm {
  /// Builds an empty graph term. Call [`GraphTerm::add_edge`] to
  /// populate it.
  pub fn new(weight: f64, functional: GraphFunctional, threshold: f64) -> Self {
    Self {
      weight,
      functional,
      threshold,
      edges: HashMap::new(),
      adjacency_var: Vec::new(),
    }
  }

  /// Adds (or overwrites) a weighted edge between `(node_a, choice_a)`
  /// and `(node_b, choice_b)`, given in absolute node indices.
  pub fn add_edge(
    &mut self,
    node_a: usize,
    choice_a: usize,
    node_b: usize,
    choice_b: usize,
    edge_weight: f64,
  ) {
    let key = if node_a <= node_b {
      (node_a, choice_a, node_b, choice_b)
    } else {
      (node_b, choice_b, node_a, choice_a)
    };
    self.edges.insert(key, edge_weight);
  }

  pub(crate) fn weight(&self) -> f64 {
    self.weight
  }

  pub(crate) fn finalize(
    &mut self,
    var_nodes: &[usize],
  ) -> Result<(), CfnError> {
    let abs_to_var: HashMap<usize, usize> = var_nodes
      .iter()
      .enumerate()
      .map(|(k, &abs)| (abs, k))
      .collect();
    // Edge weights do not feed the functional (it is a function of
    // component *size*, not edge weight), so only connectivity survives
    // finalize: for each variable node, the (this_choice, other_var,
    // other_choice) triples that make it adjacent to another node.
    let mut adjacency: Vec<Vec<(usize, usize, usize)>> =
      vec![Vec::new(); var_nodes.len()];
    for &(na, ca, nb, cb) in self.edges.keys() {
      let (Some(&va), Some(&vb)) =
        (abs_to_var.get(&na), abs_to_var.get(&nb))
      else {
        return Err(CfnError::InvalidConfiguration {
          reason: "graph term references a node with a single choice"
            .to_string(),
        });
      };
      adjacency[va].push((ca, vb, cb));
      adjacency[vb].push((cb, va, ca));
    }
    self.adjacency_var = adjacency;
    Ok(())
  }

  /// Variable nodes currently adjacent (edge present under `x`) to `k`.
  fn active_neighbors(&self, x: &Assignment, k: usize) -> Vec<usize> {
    self.adjacency_var[k]
      .iter()
      .filter(|&&(this_choice, _, _)| this_choice == x[k])
      .filter_map(|&(_, other, other_choice)| {
        (x[other] == other_choice).then_some(other)
      })
      .collect()
  }

  fn build_adjacency(&self, x: &Assignment) -> Vec<HashSet<usize>> {
    let n = self.adjacency_var.len();
    let mut adj = vec![HashSet::new(); n];
    for k in 0..n {
      for l in self.active_neighbors(x, k) {
        adj[k].insert(l);
        adj[l].insert(k);
      }
    }
    adj
  }

  fn component_sizes(adjacency: &[HashSet<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let mut visited = vec![false; n];
    let mut sizes = Vec::new();
    for start in 0..n {
      if visited[start] {
        continue;
      }
      let mut stack = vec![start];
      visited[start] = true;
      let mut size = 0;
      while let Some(node) = stack.pop() {
        size += 1;
        for &neighbor in &adjacency[node] {
          if !visited[neighbor] {
            visited[neighbor] = true;
            stack.push(neighbor);
          }
        }
      }
      sizes.push(size);
    }
    sizes
  }

  fn score_adjacency(&self, adjacency: &[HashSet<usize>]) -> f64 {
    let sizes = Self::component_sizes(adjacency);
    self.functional.evaluate(&sizes, self.threshold)
  }

  pub(crate) fn full(&self, x: &Assignment) -> f64 {
    self.score_adjacency(&self.build_adjacency(x))
  }

  pub(crate) fn delta(
    &self,
    x_old: &Assignment,
    x_new: &Assignment,
    scratch: &mut GraphScratch,
  ) -> f64 {
    let before_adjacency = scratch
      .accepted
      .get_or_insert_with(|| self.build_adjacency(x_old));
    let before_score = self.score_adjacency(before_adjacency);

    let mut pending = before_adjacency.clone();
    for &k in &x_old.changed_indices(x_new) {
      // drop edges that existed under x_old and no longer match
      for l in self.active_neighbors(x_old, k) {
        if !self.active_neighbors(x_new, k).contains(&l) {
          pending[k].remove(&l);
          pending[l].remove(&k);
        }
      }
    }
    for &k in &x_old.changed_indices(x_new) {
      for l in self.active_neighbors(x_new, k) {
        pending[k].insert(l);
        pending[l].insert(k);
      }
    }
    let after_score = self.score_adjacency(&pending);
    scratch.pending = Some(pending);
    after_score - before_score
  }

  pub(crate) fn new_scratch(&self) -> GraphScratch {
    GraphScratch::default()
  }
}

/// Thread-local scratch for [`GraphTerm`]: adjacency of the induced
/// subgraph under the last-accepted assignment, plus a pending
/// candidate built by the most recent `delta` call.
#[derive(Debug, Clone, Default)]
pub struct GraphScratch {
  accepted: Option<Vec<HashSet<usize>>>,
  pending: Option<Vec<HashSet<usize>>>,
}

impl GraphScratch {
  pub(crate) fn accept_last_move(&mut self) {
    if let Some(pending) = self.pending.take() {
      self.accepted = Some(pending);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn two_node_term() -> GraphTerm {
    let mut t = GraphTerm::new(1.0, GraphFunctional::IslandCount, 2.0);
    t.add_edge(0, 0, 1, 0, 1.0);
    t.finalize(&[0, 1]).unwrap();
    t
  }

  #[test]
  fn test_full_counts_island_when_edge_active() {
    let t = two_node_term();
    assert_eq!(t.full(&Assignment::new(vec![0, 0])), -1.0);
    assert_eq!(t.full(&Assignment::new(vec![1, 0])), 0.0);
    assert_eq!(t.full(&Assignment::new(vec![0, 1])), 0.0);
  }

  #[test]
  fn test_delta_consistency() {
    let t = two_node_term();
    let x_old = Assignment::new(vec![0, 1]);
    let x_new = Assignment::new(vec![0, 0]);
    let mut scratch = t.new_scratch();
    let d = t.delta(&x_old, &x_new, &mut scratch);
    assert!((d - (t.full(&x_new) - t.full(&x_old))).abs() < 1e-12);
  }

  #[test]
  fn test_accept_then_next_delta_uses_new_baseline() {
    let t = two_node_term();
    let x0 = Assignment::new(vec![1, 1]);
    let x1 = Assignment::new(vec![0, 0]);
    let x2 = Assignment::new(vec![0, 1]);
    let mut scratch = t.new_scratch();
    t.delta(&x0, &x1, &mut scratch);
    scratch.accept_last_move();
    let d = t.delta(&x1, &x2, &mut scratch);
    assert!((d - (t.full(&x2) - t.full(&x1))).abs() < 1e-12);
  }

  #[test]
  fn test_square_root_island_functional() {
    let mut t = GraphTerm::new(1.0, GraphFunctional::SquareRootIslandCount, 2.0);
    t.add_edge(0, 0, 1, 0, 1.0);
    t.add_edge(1, 0, 2, 0, 1.0);
    t.finalize(&[0, 1, 2]).unwrap();
    // all three nodes selected into one component of size 3.
    let x = Assignment::new(vec![0, 0, 0]);
    let expected = -((3.0 - 2.0 + 1.0_f64).sqrt());
    assert!((t.full(&x) - expected).abs() < 1e-12);
  }
}
