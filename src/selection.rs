//! Selection methods, the leaves of breeding trees.
//!
//! A [`SelectionMethod`] picks the index of one individual of a
//! subpopulation. [`SelectionSource`] turns a method into a
//! [`BreedingSource`] that emits shallow duplicates of the picked
//! individuals, so pipelines above it can vary them without touching the
//! subpopulation.

use std::fmt::Debug;

use rand::prelude::*;

use crate::{
  breeding::{Arity, BreedContext, BreedingSource},
  config::{Key, Parameters},
  error::{Error, Result, SetupErrors},
  execution::EvoRng,
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::Subpopulation,
};

/// Picks individuals of a subpopulation.
pub trait SelectionMethod: Clone + Debug + Send + 'static {
  /// Name used in configuration and error messages.
  fn name(&self) -> &'static str;

  /// Reports this method's setting errors.
  fn check(&self, _path: &Key, _errors: &mut SetupErrors) {}

  /// Called once per generation and subpopulation before any
  /// [`select`](Self::select).
  fn prepare<G: Genome, F: Fitness>(
    &mut self,
    _subpop: &Subpopulation<G, F>,
    _subpop_index: usize,
  ) -> Result<()> {
    Ok(())
  }

  /// Returns the index of the picked individual.
  fn select<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
    rng: &mut EvoRng,
  ) -> Result<usize>;
}

fn ensure_not_empty<G: Genome, F: Fitness>(
  subpop: &Subpopulation<G, F>,
  subpop_index: usize,
) -> Result<()> {
  if subpop.is_empty() {
    return Err(Error::EmptySubpopulation {
      subpop: subpop_index,
    });
  }
  Ok(())
}

/// Tournament selection: draws `size` individuals uniformly with
/// replacement and picks the best (or the worst) of them. The first drawn
/// individual wins ties.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Tournament {
  /// Number of individuals drawn per tournament.
  pub size: usize,
  /// Pick the worst instead of the best.
  pub pick_worst: bool,
}

impl Tournament {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "select.tournament";

  /// A tournament of `size` picking the best.
  pub fn new(size: usize) -> Self {
    Self {
      size,
      pick_worst: false,
    }
  }

  /// Reads `size` and `pick-worst` under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let size = errors.collect(params.get_int(
      &base.push("size"),
      Some(&default.push("size")),
      1,
    ));
    let pick_worst = errors.collect(params.get_bool(
      &base.push("pick-worst"),
      Some(&default.push("pick-worst")),
      false,
    ));
    Some(Self {
      size: size? as usize,
      pick_worst: pick_worst?,
    })
  }
}

impl SelectionMethod for Tournament {
  fn name(&self) -> &'static str {
    "tournament"
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    if self.size == 0 {
      errors.report(path.push("size"), "must be at least 1");
    }
  }

  fn select<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
    rng: &mut EvoRng,
  ) -> Result<usize> {
    ensure_not_empty(subpop, subpop_index)?;
    let len = subpop.len();
    let mut best = rng.gen_range(0..len);
    for _ in 1..self.size {
      let candidate = rng.gen_range(0..len);
      let (candidate_ind, best_ind) = (&subpop[candidate], &subpop[best]);
      let wins = if self.pick_worst {
        best_ind.better_than(candidate_ind)
      } else {
        candidate_ind.better_than(best_ind)
      };
      if wins {
        best = candidate;
      }
    }
    Ok(best)
  }
}

/// Roulette wheel selection on [`Fitness::value`].
///
/// Values must be finite and non-negative. If they all are zero, selection
/// falls back to uniform.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct FitnessProportionate {
  cumulative: Vec<f64>,
}

impl FitnessProportionate {
  /// Creates the method. Its wheel is built by
  /// [`prepare`](SelectionMethod::prepare).
  pub fn new() -> Self {
    Self::default()
  }
}

impl SelectionMethod for FitnessProportionate {
  fn name(&self) -> &'static str {
    "fitness-proportionate"
  }

  fn prepare<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    subpop.ensure_evaluated(subpop_index)?;
    self.cumulative.clear();
    let mut total = 0.0;
    for (index, ind) in subpop.individuals().iter().enumerate() {
      let value = ind.fitness.value();
      if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidFitness(format!(
          "fitness-proportionate selection needs finite non-negative \
           values, individual {index} of subpopulation {subpop_index} has \
           {value}"
        )));
      }
      total += value;
      self.cumulative.push(total);
    }
    if total == 0.0 && !subpop.is_empty() {
      tracing::warn!(
        subpop = subpop_index,
        "all fitness values are zero, selecting uniformly"
      );
    }
    Ok(())
  }

  fn select<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
    rng: &mut EvoRng,
  ) -> Result<usize> {
    ensure_not_empty(subpop, subpop_index)?;
    if self.cumulative.len() != subpop.len() {
      self.prepare(subpop, subpop_index)?;
    }
    let total = self.cumulative.last().copied().unwrap_or(0.0);
    if total <= 0.0 {
      return Ok(rng.gen_range(0..subpop.len()));
    }
    let spin = rng.gen::<f64>() * total;
    let index = self.cumulative.partition_point(|&c| c <= spin);
    Ok(index.min(subpop.len() - 1))
  }
}

/// Tournament selection restricted to the `n` best individuals.
///
/// "Best" follows [`Individual::better_than`], so for ranked multi-objective
/// fitnesses the pool is the front-0, least crowded members.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Best {
  /// Size of the pool of best individuals.
  pub n: usize,
  /// Tournament size inside the pool.
  pub tournament: usize,
  pool: Vec<usize>,
}

impl Best {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "select.best";

  /// Selects among the `n` best with tournaments of `tournament`.
  pub fn new(n: usize, tournament: usize) -> Self {
    Self {
      n,
      tournament,
      pool: Vec::new(),
    }
  }

  /// Reads `n` and `size` under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let n = errors.collect(params.get_int(
      &base.push("n"),
      Some(&default.push("n")),
      1,
    ));
    let size = errors.collect(params.get_usize_or(
      &base.push("size"),
      Some(&default.push("size")),
      1,
    ));
    Some(Self::new(n? as usize, size?))
  }
}

impl SelectionMethod for Best {
  fn name(&self) -> &'static str {
    "best"
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    if self.n == 0 {
      errors.report(path.push("n"), "must be at least 1");
    }
    if self.tournament == 0 {
      errors.report(path.push("size"), "must be at least 1");
    }
  }

  fn prepare<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    subpop.ensure_evaluated(subpop_index)?;
    self.pool = subpop.ranked_indices();
    self.pool.truncate(self.n.max(1));
    Ok(())
  }

  fn select<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
    rng: &mut EvoRng,
  ) -> Result<usize> {
    ensure_not_empty(subpop, subpop_index)?;
    if self.pool.is_empty() || self.pool.iter().any(|&i| i >= subpop.len()) {
      self.prepare(subpop, subpop_index)?;
    }
    // the pool is sorted best first, so the lowest drawn position wins
    let position = (0..self.tournament.max(1))
      .map(|_| rng.gen_range(0..self.pool.len()))
      .min()
      .unwrap_or(0);
    Ok(self.pool[position])
  }
}

/// Uniform random selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Uniform;

impl SelectionMethod for Uniform {
  fn name(&self) -> &'static str {
    "uniform"
  }

  fn select<G: Genome, F: Fitness>(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
    rng: &mut EvoRng,
  ) -> Result<usize> {
    ensure_not_empty(subpop, subpop_index)?;
    Ok(rng.gen_range(0..subpop.len()))
  }
}

/// A breeding tree leaf emitting shallow duplicates of selected individuals.
#[derive(Clone, Debug)]
pub struct SelectionSource<M> {
  method: M,
}

impl<M: SelectionMethod> SelectionSource<M> {
  /// Wraps `method`.
  pub fn new(method: M) -> Self {
    Self { method }
  }

  /// The wrapped method.
  pub fn method(&self) -> &M {
    &self.method
  }
}

impl<G, F, M> BreedingSource<G, F> for SelectionSource<M>
where
  G: Genome,
  F: Fitness,
  M: SelectionMethod,
{
  fn name(&self) -> &'static str {
    self.method.name()
  }

  fn arity(&self) -> Arity {
    Arity::Exactly(0)
  }

  fn typical_outputs(&self) -> usize {
    1
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    self.method.check(path, errors);
  }

  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    self.method.prepare(subpop, subpop_index)
  }

  fn produce(
    &mut self,
    min: usize,
    _max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize> {
    for _ in 0..min {
      let index = self.method.select(subpop, subpop_index, ctx.rng)?;
      out.push(subpop[index].shallow_duplicate());
    }
    Ok(min)
  }

  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
    Box::new(self.clone())
  }
}
