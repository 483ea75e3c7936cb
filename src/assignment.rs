//! Choice assignments over a problem's variable nodes.

use std::ops::{Deref, DerefMut};

/// An ordered sequence of choice indices, one per variable node, in the
/// canonical variable-node order established by
/// [`crate::problem::CfnProblem::finalize`].
///
/// Assignments are plain values: cheap to copy-construct from a slice,
/// swap, or clone, and never owned by the problem they are scored
/// against. The hot path only ever needs this dense representation;
/// sparse or map-based assignments are not provided.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Assignment(Vec<usize>);

impl Assignment {
  /// Builds an assignment from a vector of per-variable-node choice
  /// indices.
  pub fn new(choices: Vec<usize>) -> Self {
    Self(choices)
  }

  /// Returns the number of variable nodes this assignment covers.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Returns `true` if this assignment covers no variable nodes.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Returns a copy of `self` with the choice at `var_index` replaced by
  /// `choice`.
  pub fn with_choice(&self, var_index: usize, choice: usize) -> Self {
    let mut next = self.0.clone();
    next[var_index] = choice;
    Self(next)
  }

  /// Returns the indices at which `self` and `other` disagree.
  ///
  /// Panics if the two assignments have different lengths; callers in
  /// this crate always compare assignments of the same finalized
  /// problem.
  pub fn changed_indices(&self, other: &Self) -> Vec<usize> {
    assert_eq!(self.0.len(), other.0.len(), "assignment length mismatch");
    self
      .0
      .iter()
      .zip(&other.0)
      .enumerate()
      .filter_map(|(k, (a, b))| (a != b).then_some(k))
      .collect()
  }
}

impl Deref for Assignment {
  type Target = [usize];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl DerefMut for Assignment {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.0
  }
}

impl From<Vec<usize>> for Assignment {
  fn from(choices: Vec<usize>) -> Self {
    Self(choices)
  }
}

impl FromIterator<usize> for Assignment {
  fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_with_choice_does_not_mutate_original() {
    let a = Assignment::new(vec![0, 1, 2]);
    let b = a.with_choice(1, 4);
    assert_eq!(*a, [0, 1, 2]);
    assert_eq!(*b, [0, 4, 2]);
  }

  #[test]
  fn test_changed_indices() {
    let a = Assignment::new(vec![0, 1, 2, 3]);
    let b = Assignment::new(vec![0, 4, 2, 5]);
    assert_eq!(a.changed_indices(&b), vec![1, 3]);
    assert_eq!(a.changed_indices(&a), Vec::<usize>::new());
  }
}
