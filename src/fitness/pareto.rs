//! Multi-objective fitnesses and Pareto dominance.

use std::cmp::Ordering;

use super::{Fitness, Trials};

/// Whether objectives are maximized or minimized.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Direction {
  /// Larger objective values are better.
  #[default]
  Maximize,
  /// Smaller objective values are better.
  Minimize,
}

impl Direction {
  /// Compares two objective values, returning `Less` if `a` is better.
  fn compare(self, a: f64, b: f64) -> Option<Ordering> {
    match self {
      Direction::Maximize => b.partial_cmp(&a),
      Direction::Minimize => a.partial_cmp(&b),
    }
  }
}

/// Describes Pareto dominance for slices of objective values.
pub(crate) trait ParetoDominance {
  /// Returns `Less` if `self` dominates `other`, `Greater` if `other`
  /// dominates `self`, otherwise `Equal`. `self` dominates `other` if it is
  /// no worse in every objective and strictly better in at least one.
  /// A NaN makes both values mutually non-dominated.
  fn dominance(&self, other: &Self, direction: Direction) -> Ordering;
}

impl ParetoDominance for [f64] {
  fn dominance(&self, other: &Self, direction: Direction) -> Ordering {
    let mut ord = Ordering::Equal;
    for (a, b) in self.iter().zip(other) {
      let Some(next_ord) = direction.compare(*a, *b) else {
        return Ordering::Equal;
      };
      match (ord, next_ord) {
        (Ordering::Equal, next_ord) => ord = next_ord,
        (Ordering::Greater, Ordering::Less)
        | (Ordering::Less, Ordering::Greater) => return Ordering::Equal,
        _ => {}
      }
    }
    ord
  }
}

/// A fitness made of several objective values.
pub trait ParetoFitness: Fitness {
  /// Objective values.
  fn objectives(&self) -> &[f64];

  /// Direction shared by all objectives.
  fn direction(&self) -> Direction;

  /// Returns `true` if `self` Pareto-dominates `other`.
  fn dominates(&self, other: &Self) -> bool {
    self.dominance(other) == Ordering::Less
  }

  /// See [`ParetoDominance::dominance`].
  fn dominance(&self, other: &Self) -> Ordering {
    self
      .objectives()
      .dominance(other.objectives(), self.direction())
  }
}

/// Rank (front index, `0` is best) and sparsity (crowding distance, larger is
/// more valuable) assigned by a ranking pass.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Ranking {
  /// Pareto front index.
  pub rank: usize,
  /// Crowding distance within the front.
  pub sparsity: f64,
}

impl Ranking {
  /// `Less` if `self` is better: lower rank first, then higher sparsity.
  pub fn compare(&self, other: &Ranking) -> Ordering {
    self
      .rank
      .cmp(&other.rank)
      .then_with(|| other.sparsity.total_cmp(&self.sparsity))
  }
}

/// A [`ParetoFitness`] that can carry a [`Ranking`].
pub trait RankedFitness: ParetoFitness {
  /// The ranking of the last ranking pass, if any.
  fn ranking(&self) -> Option<Ranking>;

  /// Replaces the ranking.
  fn set_ranking(&mut self, ranking: Option<Ranking>);
}

/// A fitness holding several objective values sharing one [`Direction`].
#[derive(Clone, PartialEq, Debug, Default)]
pub struct MultiObjectiveFitness {
  objectives: Vec<f64>,
  direction: Direction,
  trials: Trials,
}

impl MultiObjectiveFitness {
  /// Creates a fitness from objective values.
  pub fn new(objectives: Vec<f64>, direction: Direction) -> Self {
    Self {
      objectives,
      direction,
      trials: Trials::default(),
    }
  }

  /// Replaces the objective values.
  pub fn set_objectives(&mut self, objectives: Vec<f64>) {
    self.objectives = objectives;
  }

  /// Replaces the direction.
  pub fn set_direction(&mut self, direction: Direction) {
    self.direction = direction;
  }
}

impl Fitness for MultiObjectiveFitness {
  fn better_than(&self, other: &Self) -> bool {
    self.dominates(other)
  }

  /// The best single objective, sign adjusted so that higher is better.
  fn value(&self) -> f64 {
    match self.direction {
      Direction::Maximize => {
        self.objectives.iter().copied().fold(f64::NEG_INFINITY, f64::max)
      }
      Direction::Minimize => {
        -self.objectives.iter().copied().fold(f64::INFINITY, f64::min)
      }
    }
  }

  fn trials(&self) -> &Trials {
    &self.trials
  }

  fn trials_mut(&mut self) -> &mut Trials {
    &mut self.trials
  }
}

impl ParetoFitness for MultiObjectiveFitness {
  fn objectives(&self) -> &[f64] {
    &self.objectives
  }

  fn direction(&self) -> Direction {
    self.direction
  }
}

/// The NSGA-II fitness: objective values plus the [`Ranking`] assigned by
/// [`MultiObjectiveRanker`](crate::breeder::nsga::MultiObjectiveRanker).
///
/// Until a ranking pass runs, comparisons fall back to Pareto dominance on
/// raw objective values. Setting new objectives discards the ranking.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Nsga2Fitness {
  inner: MultiObjectiveFitness,
  ranking: Option<Ranking>,
}

impl Nsga2Fitness {
  /// Creates an unranked fitness from objective values.
  pub fn new(objectives: Vec<f64>, direction: Direction) -> Self {
    Self {
      inner: MultiObjectiveFitness::new(objectives, direction),
      ranking: None,
    }
  }

  /// Replaces the objective values and discards the ranking.
  pub fn set_objectives(&mut self, objectives: Vec<f64>) {
    self.inner.set_objectives(objectives);
    self.ranking = None;
  }

  /// Replaces the direction and discards the ranking.
  pub fn set_direction(&mut self, direction: Direction) {
    self.inner.set_direction(direction);
    self.ranking = None;
  }

  /// Pareto front index, if ranked.
  pub fn rank(&self) -> Option<usize> {
    self.ranking.map(|r| r.rank)
  }

  /// Crowding distance, if ranked.
  pub fn sparsity(&self) -> Option<f64> {
    self.ranking.map(|r| r.sparsity)
  }
}

impl Fitness for Nsga2Fitness {
  fn better_than(&self, other: &Self) -> bool {
    match (self.ranking, other.ranking) {
      (Some(a), Some(b)) => a.compare(&b) == Ordering::Less,
      _ => self.dominates(other),
    }
  }

  fn value(&self) -> f64 {
    self.inner.value()
  }

  fn front_rank(&self) -> Option<usize> {
    self.rank()
  }

  fn trials(&self) -> &Trials {
    self.inner.trials()
  }

  fn trials_mut(&mut self) -> &mut Trials {
    self.inner.trials_mut()
  }
}

impl ParetoFitness for Nsga2Fitness {
  fn objectives(&self) -> &[f64] {
    self.inner.objectives()
  }

  fn direction(&self) -> Direction {
    self.inner.direction()
  }
}

impl RankedFitness for Nsga2Fitness {
  fn ranking(&self) -> Option<Ranking> {
    self.ranking
  }

  fn set_ranking(&mut self, ranking: Option<Ranking>) {
    self.ranking = ranking;
  }
}
