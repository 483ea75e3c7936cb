//! Thread-local scratch state: one slot per cost term, bundled per
//! attempt.

use crate::{
  problem::CfnProblem,
  term::{
    choice_penalty::ChoicePenaltyScratch, feature::FeatureScratch,
    graph::GraphScratch,
  },
};

/// Scratch state for one cost term, parallel to [`crate::term::CostTerm`].
#[derive(Debug, Clone)]
pub enum TermScratch {
  /// Scratch for [`crate::term::choice_penalty::ChoicePenaltyTerm`].
  ChoicePenalty(ChoicePenaltyScratch),
  /// Scratch for [`crate::term::graph::GraphTerm`].
  Graph(GraphScratch),
  /// Scratch for [`crate::term::feature::FeatureTerm`].
  Feature(FeatureScratch),
}

impl TermScratch {
  /// Commits whatever this term's most recent `delta` call computed as
  /// its tentative next state, for when the optimizer accepts that
  /// move.
  pub fn accept_last_move(&mut self) {
    match self {
      TermScratch::ChoicePenalty(s) => s.accept_last_move(),
      TermScratch::Graph(s) => s.accept_last_move(),
      TermScratch::Feature(s) => s.accept_last_move(),
    }
  }
}

/// A thread-private bundle of one [`TermScratch`] per term on a
/// problem, owned exclusively by one optimizer attempt for its
/// lifetime.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
  term_scratches: Vec<TermScratch>,
}

impl ScratchSpace {
  pub(crate) fn new(problem: &CfnProblem) -> Self {
    Self {
      term_scratches: problem.terms().iter().map(|t| t.new_scratch()).collect(),
    }
  }

  /// The per-term scratch slots, in the same order as the problem's
  /// cost terms.
  pub fn term_scratches(&mut self) -> &mut [TermScratch] {
    &mut self.term_scratches
  }

  /// Commits the pending state of every term's scratch.
  pub fn accept_last_move(&mut self) {
    for scratch in &mut self.term_scratches {
      scratch.accept_last_move();
    }
  }
}
