//! Annealing schedules: stateful temperature sources consumed by
//! Metropolis acceptance.

use crate::error::{CfnError, Result};

/// The non-repeating shape family: constant, linear, or logarithmic
/// interpolation between `t_init` and `t_final` over `call_count_final`
/// calls.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
  Constant,
  Linear,
  Logarithmic,
}

impl Shape {
  fn at(&self, t_init: f64, t_final: f64, f: f64) -> f64 {
    match self {
      Shape::Constant => t_init,
      Shape::Linear => (1.0 - f) * t_init + f * t_final,
      Shape::Logarithmic => {
        ((1.0 - f) * t_init.ln() + f * t_final.ln()).exp()
      }
    }
  }
}

/// A stateful map from call index to temperature. `temperature()`
/// reads the current index, computes `T`, advances the index, and
/// returns `T`; `temperature_at(i)` computes the same function without
/// mutating state.
///
/// Optimizer attempts each clone a configured template schedule and set
/// its [`AnnealingSchedule::set_call_count_final`] to their own step
/// budget; the clone's counter starts wherever the template's was,
/// typically zero.
#[derive(Debug, Clone)]
pub struct AnnealingSchedule {
  shape: Shape,
  t_init: f64,
  t_final: f64,
  call_count_final: usize,
  n_repeats: usize,
  call_count: usize,
  default_t_init: f64,
  default_t_final: f64,
  default_call_count_final: usize,
  default_n_repeats: usize,
}

impl AnnealingSchedule {
  fn new(shape: Shape, t_init: f64, t_final: f64, call_count_final: usize, n_repeats: usize) -> Self {
    Self {
      shape,
      t_init,
      t_final,
      call_count_final,
      n_repeats,
      call_count: 0,
      default_t_init: t_init,
      default_t_final: t_final,
      default_call_count_final: call_count_final,
      default_n_repeats: n_repeats,
    }
  }

  fn validate_temperatures(t_init: f64, t_final: f64) -> Result<()> {
    if t_init <= 0.0 || t_final <= 0.0 {
      return Err(CfnError::InvalidConfiguration {
        reason: "annealing temperatures must be strictly positive".to_string(),
      });
    }
    Ok(())
  }

  /// A schedule holding `t0` at every call index. `t0` must be strictly
  /// positive.
  pub fn constant(t0: f64, call_count_final: usize) -> Result<Self> {
    Self::validate_temperatures(t0, t0)?;
    Ok(Self::new(Shape::Constant, t0, t0, call_count_final, 1))
  }

  /// A schedule interpolating linearly from `t_init` to `t_final` over
  /// `call_count_final` calls. Both endpoints must be strictly positive.
  pub fn linear(t_init: f64, t_final: f64, call_count_final: usize) -> Result<Self> {
    Self::validate_temperatures(t_init, t_final)?;
    Ok(Self::new(Shape::Linear, t_init, t_final, call_count_final, 1))
  }

  /// A schedule interpolating the logarithm of the temperature linearly
  /// from `t_init` to `t_final` over `call_count_final` calls. Both
  /// endpoints must be strictly positive.
  pub fn logarithmic(t_init: f64, t_final: f64, call_count_final: usize) -> Result<Self> {
    Self::validate_temperatures(t_init, t_final)?;
    Ok(Self::new(Shape::Logarithmic, t_init, t_final, call_count_final, 1))
  }

  /// A linear schedule that repeats its ramp `n_repeats` times across
  /// `call_count_final` total calls, producing a sawtooth.
  pub fn linear_repeat(
    t_init: f64,
    t_final: f64,
    call_count_final: usize,
    n_repeats: usize,
  ) -> Result<Self> {
    Self::validate_temperatures(t_init, t_final)?;
    Self::validate_repeats(n_repeats)?;
    Ok(Self::new(Shape::Linear, t_init, t_final, call_count_final, n_repeats))
  }

  /// A logarithmic schedule that repeats its ramp `n_repeats` times
  /// across `call_count_final` total calls, producing a sawtooth.
  pub fn logarithmic_repeat(
    t_init: f64,
    t_final: f64,
    call_count_final: usize,
    n_repeats: usize,
  ) -> Result<Self> {
    Self::validate_temperatures(t_init, t_final)?;
    Self::validate_repeats(n_repeats)?;
    Ok(Self::new(Shape::Logarithmic, t_init, t_final, call_count_final, n_repeats))
  }

  fn validate_repeats(n_repeats: usize) -> Result<()> {
    if n_repeats == 0 {
      return Err(CfnError::InvalidConfiguration {
        reason: "n_repeats must be at least 1".to_string(),
      });
    }
    Ok(())
  }

  /// Sets the total number of calls this schedule expects to service,
  /// without resetting the call counter. Optimizer attempts call this
  /// right after cloning the template, with their own step budget.
  pub fn set_call_count_final(&mut self, call_count_final: usize) {
    self.call_count_final = call_count_final;
  }

  /// Sets the initial temperature.
  pub fn set_t_init(&mut self, t_init: f64) {
    self.t_init = t_init;
  }

  /// Sets the final temperature.
  ///
  /// The source this schedule is modeled on has a setter that writes
  /// the new "final" value into the *initial* temperature field
  /// instead; that looks like a copy-paste bug rather than an
  /// intentional design, so this setter writes where its name says it
  /// does.
  pub fn set_t_final(&mut self, t_final: f64) {
    self.t_final = t_final;
  }

  /// Computes the temperature at the current call index, advances the
  /// index, and returns the value.
  pub fn temperature(&mut self) -> f64 {
    let t = self.temperature_at(self.call_count);
    self.call_count += 1;
    t
  }

  /// Computes the temperature at call index `i` without mutating state.
  pub fn temperature_at(&self, i: usize) -> f64 {
    let period = self.call_count_final.div_ceil(self.n_repeats).max(1);
    let i_in_period = i % period;
    let denom = (period - 1).max(1) as f64;
    let f = (i_in_period as f64 / denom).min(1.0);
    self.shape.at(self.t_init, self.t_final, f)
  }

  /// Returns the call counter to zero, leaving all parameters
  /// untouched.
  pub fn reset_call_count(&mut self) {
    self.call_count = 0;
  }

  /// Restores the call counter and all parameters to the values this
  /// schedule was constructed with.
  pub fn reset(&mut self) {
    self.call_count = 0;
    self.t_init = self.default_t_init;
    self.t_final = self.default_t_final;
    self.call_count_final = self.default_call_count_final;
    self.n_repeats = self.default_n_repeats;
  }
}
