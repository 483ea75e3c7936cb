//! Cost function terms: additional, not-necessarily-pairwise
//! contributions to a problem's score.
//!
//! The source this crate's problem model is based on represents terms
//! as a class hierarchy with virtual dispatch. Here they are a tagged
//! enum instead, per the recommendation to prefer closed, exhaustively
//! matchable variants over a trait-object hierarchy when the set of
//! shapes is fixed and known up front.

pub mod choice_penalty;
pub mod feature;
pub mod graph;

use crate::{
  assignment::Assignment,
  error::CfnError,
  scratch::TermScratch,
  term::{
    choice_penalty::ChoicePenaltyTerm, feature::FeatureTerm, graph::GraphTerm,
  },
};

/// A cost function term contributing `weight * full(x)` to a problem's
/// score, with an incremental `delta` and a term-specific scratch type.
#[derive(Debug, Clone)]
pub enum CostTerm {
  /// Choice-penalty sum, optionally passed through a nonlinear shape.
  ChoicePenalty(ChoicePenaltyTerm),
  /// Functional of the subgraph induced by currently-selected choices.
  Graph(GraphTerm),
  /// Count of unsatisfied connection features.
  Feature(FeatureTerm),
}

impl CostTerm {
  /// The scalar multiplier applied to this term's `full`/`delta`
  /// output.
  pub fn weight(&self) -> f64 {
    match self {
      CostTerm::ChoicePenalty(t) => t.weight(),
      CostTerm::Graph(t) => t.weight(),
      CostTerm::Feature(t) => t.weight(),
    }
  }

  pub(crate) fn finalize(
    &mut self,
    var_nodes: &[usize],
  ) -> Result<(), CfnError> {
    match self {
      CostTerm::ChoicePenalty(t) => t.finalize(var_nodes),
      CostTerm::Graph(t) => t.finalize(var_nodes),
      CostTerm::Feature(t) => t.finalize(var_nodes),
    }
  }

  /// Scores the full assignment, unweighted.
  pub fn full(&self, x: &Assignment) -> f64 {
    match self {
      CostTerm::ChoicePenalty(t) => t.full(x),
      CostTerm::Graph(t) => t.full(x),
      CostTerm::Feature(t) => t.full(x),
    }
  }

  /// Computes `full(x_new) - full(x_old)`, unweighted, reusing `scratch`
  /// where the term caches derived state.
  ///
  /// Panics if `scratch` is not the variant this term produces; callers
  /// always pair a term with the [`TermScratch`] its own
  /// [`CostTerm::new_scratch`] returned.
  pub fn delta(
    &self,
    x_old: &Assignment,
    x_new: &Assignment,
    scratch: &mut TermScratch,
  ) -> f64 {
    match (self, scratch) {
      (CostTerm::ChoicePenalty(t), TermScratch::ChoicePenalty(s)) => {
        t.delta(x_old, x_new, s)
      }
      (CostTerm::Graph(t), TermScratch::Graph(s)) => t.delta(x_old, x_new, s),
      (CostTerm::Feature(t), TermScratch::Feature(s)) => {
        t.delta(x_old, x_new, s)
      }
      _ => panic!("cost term paired with a scratch from a different term"),
    }
  }

  /// Allocates a fresh, thread-private scratch for this term.
  pub fn new_scratch(&self) -> TermScratch {
    match self {
      CostTerm::ChoicePenalty(t) => TermScratch::ChoicePenalty(t.new_scratch()),
      CostTerm::Graph(t) => TermScratch::Graph(t.new_scratch()),
      CostTerm::Feature(t) => TermScratch::Feature(t.new_scratch()),
    }
  }
}

impl From<ChoicePenaltyTerm> for CostTerm {
  fn from(t: ChoicePenaltyTerm) -> Self {
    CostTerm::ChoicePenalty(t)
  }
}

impl From<GraphTerm> for CostTerm {
  fn from(t: GraphTerm) -> Self {
    CostTerm::Graph(t)
  }
}

impl From<FeatureTerm> for CostTerm {
  fn from(t: FeatureTerm) -> Self {
    CostTerm::Feature(t)
  }
}
