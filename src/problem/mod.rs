//! Pairwise-precomputed cost function network problems.
//!
//! A problem is built through [`CfnProblemBuilder`] in a mutable
//! "building" state, then consumed by
//! [`CfnProblemBuilder::finalize`] into an immutable [`CfnProblem`].
//! Because `finalize` takes `self` by value, a caller can never retain
//! a handle to the builder once the problem is finalized: mutation
//! after finalization is a compile error rather than a runtime one,
//! which is why [`crate::error::CfnError::FinalizedViolation`] has no
//! code path that reaches it in this crate.

pub mod arena;

use std::collections::HashMap;

use log::debug;

use crate::{
  assignment::Assignment,
  error::{CfnError, Result},
  problem::arena::{Matrix, MatrixArena},
  scratch::ScratchSpace,
  term::CostTerm,
};

/// A link from one variable node to a neighboring variable node's
/// interaction matrix in the arena.
#[derive(Debug, Clone, Copy)]
struct NeighborLink {
  /// The neighboring variable node's index.
  neighbor: usize,
  /// Handle into the problem's [`MatrixArena`].
  arena_idx: usize,
  /// `false` if the matrix is stored `(this, neighbor)` (this node's
  /// choice indexes rows); `true` if it is stored `(neighbor, this)`
  /// and must be read transposed.
  transposed: bool,
}

/// A cost function network problem under construction: one- and
/// two-body tables plus extra cost terms, all mutable until
/// [`CfnProblemBuilder::finalize`] is called.
#[derive(Debug, Clone, Default)]
pub struct CfnProblemBuilder {
  num_nodes: usize,
  e1: HashMap<usize, Vec<f64>>,
  e2: HashMap<(usize, usize), Matrix>,
  terms: Vec<CostTerm>,
  background_offset: f64,
}

impl CfnProblemBuilder {
  /// Creates an empty problem with no nodes.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the total absolute node count. Node indices up to this value
  /// need not all be touched by [`CfnProblemBuilder::set_onebody`] or
  /// [`CfnProblemBuilder::set_twobody`]; untouched nodes default to a
  /// single choice contributing nothing.
  pub fn set_num_nodes(&mut self, num_nodes: usize) {
    self.num_nodes = self.num_nodes.max(num_nodes);
  }

  /// Sets a constant offset added to every assignment's score.
  pub fn set_background_offset(&mut self, offset: f64) {
    self.background_offset = offset;
  }

  /// Sets `E1[node][choice]`, creating the node and growing its choice
  /// table on demand. Calling this repeatedly at the same key overwrites
  /// the earlier value.
  pub fn set_onebody(&mut self, node: usize, choice: usize, energy: f64) {
    self.num_nodes = self.num_nodes.max(node + 1);
    let row = self.e1.entry(node).or_default();
    if row.len() <= choice {
      row.resize(choice + 1, 0.0);
    }
    row[choice] = energy;
  }

  /// Sets `E2[(i, j)][(c_i, c_j)]`. Requires `i < j`.
  pub fn set_twobody(
    &mut self,
    nodes: (usize, usize),
    choices: (usize, usize),
    energy: f64,
  ) -> Result<()> {
    let (i, j) = nodes;
    if i >= j {
      return Err(CfnError::KeyOrderViolation { i, j });
    }
    self.num_nodes = self.num_nodes.max(j + 1);
    let (ci, cj) = choices;
    let matrix = self.e2.entry((i, j)).or_insert_with(|| Matrix::zeros(1, 1));
    matrix.set_grow(ci, cj, energy);
    // A two-body entry at (ci, cj) implies nodes i and j have at least
    // ci+1 and cj+1 choices respectively, even if no one-body entry at
    // that choice was ever set; keep e1's row lengths in sync so
    // `num_choices` does not mistake either node for single-choice.
    let row_i = self.e1.entry(i).or_default();
    if row_i.len() < matrix.rows() {
      row_i.resize(matrix.rows(), 0.0);
    }
    let row_j = self.e1.entry(j).or_default();
    if row_j.len() < matrix.cols() {
      row_j.resize(matrix.cols(), 0.0);
    }
    Ok(())
  }

  /// Adds a cost function term to the problem.
  pub fn add_term(&mut self, term: impl Into<CostTerm>) {
    self.terms.push(term.into());
  }

  /// The number of candidate choices currently recorded for `node`
  /// (1 if the node has not been touched).
  pub fn num_choices(&self, node: usize) -> usize {
    self.e1.get(&node).map_or(1, |row| row.len().max(1))
  }

  /// Transitions the problem to its immutable, shareable, read-only
  /// state: folds single-choice nodes into the constant offset, builds
  /// the variable-node index space and neighbor lists, and finalizes
  /// every cost term.
  pub fn finalize(mut self) -> Result<CfnProblem> {
    let var_nodes: Vec<usize> =
      (0..self.num_nodes).filter(|&n| self.num_choices(n) > 1).collect();
    let var_index: HashMap<usize, usize> =
      var_nodes.iter().enumerate().map(|(k, &n)| (n, k)).collect();

    let mut offset_fixed = 0.0;
    for n in 0..self.num_nodes {
      if self.num_choices(n) == 1 {
        offset_fixed += self.e1.get(&n).and_then(|r| r.first()).copied().unwrap_or(0.0);
      }
    }

    // Fold edges touching a single-choice node into the other
    // endpoint's one-body table (or into the constant offset if both
    // endpoints are single-choice), then drop the edge.
    let mut folded_e2: HashMap<(usize, usize), Matrix> = HashMap::new();
    for ((i, j), matrix) in self.e2.drain() {
      let i_var = var_index.get(&i).copied();
      let j_var = var_index.get(&j).copied();
      match (i_var, j_var) {
        (Some(_), Some(_)) => {
          folded_e2.insert((i, j), matrix);
        }
        (None, Some(_)) => {
          let fixed_choice = 0;
          let row = self.e1.entry(j).or_default();
          for c in 0..matrix.cols().max(row.len()) {
            if row.len() <= c {
              row.resize(c + 1, 0.0);
            }
            row[c] += matrix.get(fixed_choice, c);
          }
        }
        (Some(_), None) => {
          let fixed_choice = 0;
          let row = self.e1.entry(i).or_default();
          for r in 0..matrix.rows().max(row.len()) {
            if row.len() <= r {
              row.resize(r + 1, 0.0);
            }
            row[r] += matrix.get(r, fixed_choice);
          }
        }
        (None, None) => {
          offset_fixed += matrix.get(0, 0);
        }
      }
    }

    debug!(
      "finalizing cfn problem: {} absolute nodes, {} variable nodes, \
       {} two-body edges retained, offset_fixed={offset_fixed}",
      self.num_nodes,
      var_nodes.len(),
      folded_e2.len()
    );

    let e1_var: Vec<Vec<f64>> = var_nodes
      .iter()
      .map(|&n| {
        let mut row = self.e1.get(&n).cloned().unwrap_or_default();
        let k = self.num_choices(n);
        if row.len() < k {
          row.resize(k, 0.0);
        }
        row
      })
      .collect();

    let mut arena = MatrixArena::new();
    let mut neighbors: Vec<Vec<NeighborLink>> = vec![Vec::new(); var_nodes.len()];
    for ((i, j), matrix) in folded_e2 {
      let vi = var_index[&i];
      let vj = var_index[&j];
      let handle = arena.push(matrix);
      neighbors[vi].push(NeighborLink { neighbor: vj, arena_idx: handle, transposed: false });
      neighbors[vj].push(NeighborLink { neighbor: vi, arena_idx: handle, transposed: true });
    }

    let n_choices: Vec<usize> = var_nodes.iter().map(|&n| self.num_choices(n)).collect();

    let mut terms = self.terms;
    for term in &mut terms {
      term.finalize(&var_nodes)?;
    }

    Ok(CfnProblem {
      num_absolute_nodes: self.num_nodes,
      var_nodes,
      n_choices,
      e1_var,
      arena,
      neighbors,
      terms,
      background_offset: self.background_offset + offset_fixed,
    })
  }
}

/// An immutable, finalized cost function network problem, freely
/// shareable by reference across threads.
#[derive(Debug)]
pub struct CfnProblem {
  num_absolute_nodes: usize,
  var_nodes: Vec<usize>,
  n_choices: Vec<usize>,
  e1_var: Vec<Vec<f64>>,
  arena: MatrixArena,
  neighbors: Vec<Vec<NeighborLink>>,
  terms: Vec<CostTerm>,
  background_offset: f64,
}

impl CfnProblem {
  /// The number of variable nodes (nodes with more than one candidate
  /// choice); also the required length of any [`Assignment`] scored
  /// against this problem.
  pub fn num_variable_nodes(&self) -> usize {
    self.var_nodes.len()
  }

  /// The number of candidate choices at variable node `var_index`.
  pub fn num_choices(&self, var_index: usize) -> usize {
    self.n_choices[var_index]
  }

  /// The absolute node index (in the original construction-time
  /// numbering) backing variable node `var_index`.
  pub fn absolute_node(&self, var_index: usize) -> usize {
    self.var_nodes[var_index]
  }

  /// The number of absolute nodes the problem was constructed with,
  /// including single-choice nodes folded away at finalize time.
  pub fn num_absolute_nodes(&self) -> usize {
    self.num_absolute_nodes
  }

  pub(crate) fn terms(&self) -> &[CostTerm] {
    &self.terms
  }

  /// Allocates a fresh, thread-private scratch space with one slot per
  /// cost term.
  pub fn new_scratch(&self) -> ScratchSpace {
    ScratchSpace::new(self)
  }

  /// Checks that every entry of `x` is in range for its variable node.
  /// Optimizers call this once, at assignment-seed time; `score` and
  /// `delta` trust the invariant afterwards rather than re-checking it
  /// on every call.
  pub fn validate_assignment(&self, x: &Assignment) -> Result<()> {
    self.check_arity(x)?;
    for (k, &c) in x.iter().enumerate() {
      let n = self.n_choices[k];
      if c >= n {
        return Err(CfnError::ChoiceOutOfRange { node: k, choice: c, n_choices: n });
      }
    }
    Ok(())
  }

  fn check_arity(&self, x: &Assignment) -> Result<()> {
    if x.len() != self.num_variable_nodes() {
      return Err(CfnError::ArityMismatch {
        expected: self.num_variable_nodes(),
        actual: x.len(),
      });
    }
    Ok(())
  }

  /// The exact objective value of `x`.
  pub fn score(&self, x: &Assignment) -> Result<f64> {
    self.check_arity(x)?;
    let mut total = self.background_offset;
    for (k, &c) in x.iter().enumerate() {
      total += self.e1_var[k][c];
    }
    for (k, links) in self.neighbors.iter().enumerate() {
      for link in links {
        if link.transposed {
          continue;
        }
        let matrix = self.arena.get(link.arena_idx);
        total += matrix.get(x[k], x[link.neighbor]);
      }
    }
    for term in &self.terms {
      total += term.weight() * term.full(x);
    }
    Ok(total)
  }

  /// `score(x_new) - score(x_old)`, computed by visiting only the
  /// indices at which `x_old` and `x_new` differ. `scratch` should have
  /// last been passed to a call consistent with `x_old` (or be freshly
  /// allocated).
  pub fn delta(
    &self,
    x_old: &Assignment,
    x_new: &Assignment,
    scratch: &mut ScratchSpace,
  ) -> Result<f64> {
    self.check_arity(x_old)?;
    self.check_arity(x_new)?;

    let changed = x_old.changed_indices(x_new);
    let mut total = 0.0;
    let mut visited = std::collections::HashSet::with_capacity(changed.len());
    for &k in &changed {
      let old_k = x_old[k];
      let new_k = x_new[k];
      total += self.e1_var[k][new_k] - self.e1_var[k][old_k];
      for link in &self.neighbors[k] {
        let l = link.neighbor;
        let partner_choice = if visited.contains(&l) { x_new[l] } else { x_old[l] };
        let matrix = self.arena.get(link.arena_idx);
        let (before, after) = if link.transposed {
          (matrix.get(partner_choice, old_k), matrix.get(partner_choice, new_k))
        } else {
          (matrix.get(old_k, partner_choice), matrix.get(new_k, partner_choice))
        };
        total += after - before;
      }
      visited.insert(k);
    }

    for (term, term_scratch) in self.terms.iter().zip(scratch.term_scratches()) {
      total += term.weight() * term.delta(x_old, x_new, term_scratch);
    }

    Ok(total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::term::choice_penalty::{ChoicePenaltyTerm, PenaltyShape};

  #[test]
  fn test_single_node_problem() {
    let mut b = CfnProblemBuilder::new();
    b.set_onebody(0, 0, 2.0);
    b.set_onebody(0, 1, -1.0);
    b.set_onebody(0, 2, 0.5);
    let p = b.finalize().unwrap();
    assert_eq!(p.num_variable_nodes(), 1);
    let x = Assignment::new(vec![1]);
    assert_eq!(p.score(&x).unwrap(), -1.0);
  }

  #[test]
  fn test_xor_like_problem_ground_states() {
    let mut b = CfnProblemBuilder::new();
    b.set_onebody(0, 0, 0.0);
    b.set_onebody(0, 1, 0.0);
    b.set_onebody(1, 0, 0.0);
    b.set_onebody(1, 1, 0.0);
    b.set_twobody((0, 1), (0, 0), 1.0).unwrap();
    b.set_twobody((0, 1), (1, 1), 1.0).unwrap();
    let p = b.finalize().unwrap();
    assert_eq!(p.score(&Assignment::new(vec![0, 1])).unwrap(), 0.0);
    assert_eq!(p.score(&Assignment::new(vec![1, 0])).unwrap(), 0.0);
    assert_eq!(p.score(&Assignment::new(vec![0, 0])).unwrap(), 1.0);
    assert_eq!(p.score(&Assignment::new(vec![1, 1])).unwrap(), 1.0);
  }

  #[test]
  fn test_key_order_violation() {
    let mut b = CfnProblemBuilder::new();
    let err = b.set_twobody((1, 0), (0, 0), 1.0).unwrap_err();
    assert_eq!(err, CfnError::KeyOrderViolation { i: 1, j: 0 });
  }

  #[test]
  fn test_arity_mismatch() {
    let mut b = CfnProblemBuilder::new();
    b.set_onebody(0, 0, 1.0);
    b.set_onebody(0, 1, 2.0);
    let p = b.finalize().unwrap();
    let err = p.score(&Assignment::new(vec![0, 0])).unwrap_err();
    assert_eq!(err, CfnError::ArityMismatch { expected: 1, actual: 2 });
  }

  #[test]
  fn test_folding_invariance_against_manually_folded_problem() {
    // N=3, K=(2,1,2): node 1 has a single choice and should fold away.
    let mut full = CfnProblemBuilder::new();
    full.set_onebody(0, 0, 1.0);
    full.set_onebody(0, 1, -1.0);
    full.set_onebody(1, 0, 4.0);
    full.set_onebody(2, 0, 0.5);
    full.set_onebody(2, 1, 2.0);
    full.set_twobody((0, 1), (0, 0), 0.25).unwrap();
    full.set_twobody((0, 1), (1, 0), -0.75).unwrap();
    full.set_twobody((0, 2), (0, 0), 1.5).unwrap();
    full.set_twobody((0, 2), (1, 1), -0.5).unwrap();
    full.set_twobody((1, 2), (0, 0), 3.0).unwrap();
    full.set_twobody((1, 2), (0, 1), -2.0).unwrap();
    let full = full.finalize().unwrap();

    // Manually folded: node 1 dropped; its E1 and its edges become
    // constants/updates to node 0 and node 2's tables.
    let mut folded = CfnProblemBuilder::new();
    folded.set_onebody(0, 0, 1.0 + 0.25); // + E2(0:0,1:0)
    folded.set_onebody(0, 1, -1.0 - 0.75); // + E2(0:1,1:0)
    folded.set_onebody(1, 0, 0.5 + 3.0); // + E2(1:0 i.e. old node2 c0, old node1 fixed c0)
    folded.set_onebody(1, 1, 2.0 - 2.0); // + E2(old node2 c1, old node1 fixed c0)
    folded.set_twobody((0, 1), (0, 0), 1.5).unwrap();
    folded.set_twobody((0, 1), (1, 1), -0.5).unwrap();
    folded.set_background_offset(4.0); // E1[1][0]
    let folded = folded.finalize().unwrap();

    for &c0 in &[0usize, 1] {
      for &c2 in &[0usize, 1] {
        let xf = Assignment::new(vec![c0, c2]);
        let xfull = Assignment::new(vec![c0, 0, c2]);
        assert!(
          (full.score(&xfull).unwrap() - folded.score(&xf).unwrap()).abs()
            < 1e-12
        );
      }
    }
  }

  #[test]
  fn test_delta_consistency_random_problem() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut b = CfnProblemBuilder::new();
    let mut rng = StdRng::seed_from_u64(42);
    let n = 8;
    let k_range = 2..=5;
    let mut ks = Vec::new();
    for i in 0..n {
      let k = rng.gen_range(k_range.clone());
      ks.push(k);
      for c in 0..k {
        b.set_onebody(i, c, rng.gen_range(-5.0..5.0));
      }
    }
    for i in 0..n {
      for j in (i + 1)..n {
        for ci in 0..ks[i] {
          for cj in 0..ks[j] {
            b.set_twobody((i, j), (ci, cj), rng.gen_range(-2.0..2.0)).unwrap();
          }
        }
      }
    }
    let mut penalty = ChoicePenaltyTerm::new(1.0, PenaltyShape::Square { offset: 0.0 });
    for i in 0..n {
      for c in 0..ks[i] {
        penalty.set_penalty(i, c, rng.gen_range(-1.0..1.0));
      }
    }
    b.add_term(penalty);
    let p = b.finalize().unwrap();

    for _ in 0..1000 {
      let x_old: Assignment =
        (0..n).map(|k| rng.gen_range(0..p.num_choices(k))).collect();
      let x_new: Assignment =
        (0..n).map(|k| rng.gen_range(0..p.num_choices(k))).collect();
      let mut scratch = p.new_scratch();
      let delta = p.delta(&x_old, &x_new, &mut scratch).unwrap();
      let expected = p.score(&x_new).unwrap() - p.score(&x_old).unwrap();
      assert!(
        (delta - expected).abs() < 1e-9 * expected.abs().max(1.0),
        "delta {delta} != expected {expected}"
      );
    }
  }
}
