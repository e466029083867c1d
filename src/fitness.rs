//! Fitness values attached to individuals.
//!
//! A [`Fitness`] is whatever a [`Problem`](crate::problem::Problem) writes
//! into an individual: it must be comparable, summarizable as a single `f64`
//! for statistics, and it carries a [`Trials`] accumulator used by grouped
//! (coevolutionary) evaluation. Single objective runs use [`ScalarFitness`];
//! multi-objective fitnesses live in [`pareto`].

pub mod pareto;

use std::fmt::Debug;

/// A comparable quality value of an individual.
pub trait Fitness: Clone + Debug + Default + Send + Sync + 'static {
  /// Returns `true` if `self` is strictly better than `other`.
  fn better_than(&self, other: &Self) -> bool;

  /// Returns `true` if neither fitness is better than the other.
  fn equivalent(&self, other: &Self) -> bool {
    !self.better_than(other) && !other.better_than(self)
  }

  /// A single number summarizing this fitness, used by statistics and
  /// fitness-proportionate selection. Higher is better.
  fn value(&self) -> f64;

  /// Returns `true` if this fitness is the best one attainable.
  fn is_ideal(&self) -> bool {
    false
  }

  /// Pareto front index assigned by a ranking pass, for fitnesses that
  /// have one.
  fn front_rank(&self) -> Option<usize> {
    None
  }

  /// Trials accumulated by grouped evaluation.
  fn trials(&self) -> &Trials;

  /// Mutable access to the trial accumulator.
  fn trials_mut(&mut self) -> &mut Trials;
}

/// A co-participant of a grouped trial.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Partner {
  /// Individual `index` of subpopulation `subpop` in the evaluated population.
  Member {
    /// Subpopulation index.
    subpop: usize,
    /// Individual index.
    index: usize,
  },
  /// The `rank`-th best individual of subpopulation `subpop` in the previous
  /// generation.
  Elite {
    /// Subpopulation index.
    subpop: usize,
    /// Position among the kept elites, best first.
    rank: usize,
  },
}

impl Partner {
  /// Subpopulation the partner comes from.
  pub fn subpop(&self) -> usize {
    match *self {
      Partner::Member { subpop, .. } | Partner::Elite { subpop, .. } => subpop,
    }
  }
}

/// Trial scores accumulated for one individual during grouped evaluation.
///
/// Higher trial scores are better. `context` holds the other participants of
/// the best trial so far.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Trials {
  scores: Vec<f64>,
  best: Option<f64>,
  context: Vec<Partner>,
}

impl Trials {
  /// Forgets every recorded trial and the context.
  pub fn clear(&mut self) {
    self.scores.clear();
    self.best = None;
    self.context.clear();
  }

  /// Appends a trial without context.
  pub fn push(&mut self, score: f64) {
    self.record(score, &[]);
  }

  /// Appends a trial. The context is replaced only when `score` is strictly
  /// better than every trial recorded before. Non-finite scores are kept
  /// but never become the best.
  ///
  /// Returns `true` if the context was replaced.
  pub fn record(&mut self, score: f64, context: &[Partner]) -> bool {
    self.scores.push(score);
    if !score.is_finite() {
      return false;
    }
    match self.best {
      Some(best) if score <= best => false,
      _ => {
        self.best = Some(score);
        self.context.clear();
        self.context.extend_from_slice(context);
        true
      }
    }
  }

  /// All trial scores in recording order.
  pub fn scores(&self) -> &[f64] {
    &self.scores
  }

  /// Number of recorded trials.
  pub fn len(&self) -> usize {
    self.scores.len()
  }

  /// Returns `true` if no trial was recorded.
  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }

  /// The best trial score so far.
  pub fn best(&self) -> Option<f64> {
    self.best
  }

  /// Mean of the trial scores.
  pub fn mean(&self) -> Option<f64> {
    (!self.scores.is_empty())
      .then(|| self.scores.iter().sum::<f64>() / self.scores.len() as f64)
  }

  /// Participants of the best trial so far.
  pub fn context(&self) -> &[Partner] {
    &self.context
  }
}

/// A single-objective fitness. Higher values are better.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ScalarFitness {
  value: f64,
  ideal: bool,
  trials: Trials,
}

impl ScalarFitness {
  /// Creates a fitness with the given value.
  pub fn new(value: f64) -> Self {
    Self {
      value,
      ..Self::default()
    }
  }

  /// Sets the value and whether it is ideal. Trials are left untouched.
  pub fn set(&mut self, value: f64, ideal: bool) {
    self.value = value;
    self.ideal = ideal;
  }

  /// Sets the value to the best recorded trial.
  ///
  /// Returns `false`, leaving the value untouched, if there are no trials.
  pub fn set_from_trials(&mut self, ideal: bool) -> bool {
    match self.trials.best() {
      Some(best) => {
        self.set(best, ideal);
        true
      }
      None => false,
    }
  }
}

impl Fitness for ScalarFitness {
  fn better_than(&self, other: &Self) -> bool {
    self.value > other.value
  }

  fn equivalent(&self, other: &Self) -> bool {
    self.value == other.value
  }

  fn value(&self) -> f64 {
    self.value
  }

  fn is_ideal(&self) -> bool {
    self.ideal
  }

  fn trials(&self) -> &Trials {
    &self.trials
  }

  fn trials_mut(&mut self) -> &mut Trials {
    &mut self.trials
  }
}
