//! Termination operators.
//!
//! A [`Terminator`] looks at the whole evaluated population once per
//! generation. A [`Termination`] looks at single individuals; wrap it in
//! [`AnyIndividual`] to stop as soon as one individual satisfies it.
//!
//! # Examples
//! ```
//! use evobreed::{
//!   fitness::ScalarFitness,
//!   individual::Individual,
//!   population::Population,
//!   termination::{AnyIndividual, Terminator},
//! };
//!
//! // stop once any genome sums up to 10
//! let mut t = AnyIndividual(|ind: &Individual<Vec<i64>, ScalarFitness>| {
//!   ind.genome().iter().sum::<i64>() == 10
//! });
//! let population = Population::new(vec![]);
//! assert!(!t.terminate(0, &population));
//! ```

use rayon::prelude::*;

use crate::{
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::Population,
};

/// Decides after each evaluation whether the run should stop.
///
/// **Note that you always can implement this trait instead of using
/// closures.**
pub trait Terminator<G: Genome, F: Fitness> {
  /// If returns `true`, the run stops after generation `generation`.
  fn terminate(
    &mut self,
    generation: usize,
    population: &Population<G, F>,
  ) -> bool;
}

impl<G, F, T> Terminator<G, F> for T
where
  G: Genome,
  F: Fitness,
  T: FnMut(usize, &Population<G, F>) -> bool,
{
  fn terminate(
    &mut self,
    generation: usize,
    population: &Population<G, F>,
  ) -> bool {
    self(generation, population)
  }
}

/// A condition on a single individual.
pub trait Termination<G: Genome, F: Fitness> {
  /// Returns `true` if `individual` is good enough to stop the run.
  fn terminate(&self, individual: &Individual<G, F>) -> bool;
}

impl<G, F, T> Termination<G, F> for T
where
  G: Genome,
  F: Fitness,
  T: Fn(&Individual<G, F>) -> bool,
{
  fn terminate(&self, individual: &Individual<G, F>) -> bool {
    self(individual)
  }
}

/// Stops when any evaluated individual satisfies the wrapped
/// [`Termination`]. Individuals are checked in parallel.
#[derive(Clone, Copy, Debug)]
pub struct AnyIndividual<T>(pub T);

impl<G, F, T> Terminator<G, F> for AnyIndividual<T>
where
  G: Genome,
  F: Fitness,
  T: Termination<G, F> + Sync,
{
  fn terminate(&mut self, _: usize, population: &Population<G, F>) -> bool {
    let termination = &self.0;
    population
      .subpops()
      .par_iter()
      .flat_map_iter(|subpop| subpop.individuals())
      .any(|ind| ind.evaluated && termination.terminate(ind))
  }
}

/// A `Terminator` that stops the run once a certain number of generations
/// have been evaluated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GenerationTerminator(pub usize);

impl<G: Genome, F: Fitness> Terminator<G, F> for GenerationTerminator {
  fn terminate(&mut self, generation: usize, _: &Population<G, F>) -> bool {
    generation + 1 >= self.0
  }
}

/// Stops as soon as an evaluated individual reports an ideal fitness.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct IdealTerminator;

impl<G: Genome, F: Fitness> Terminator<G, F> for IdealTerminator {
  fn terminate(&mut self, _: usize, population: &Population<G, F>) -> bool {
    population
      .subpops()
      .iter()
      .flat_map(|subpop| subpop.individuals())
      .any(|ind| ind.evaluated && ind.fitness.is_ideal())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{fitness::ScalarFitness, population::Subpopulation};

  type G = Vec<i64>;
  type F = ScalarFitness;

  fn population(fitness: &[f64]) -> Population<G, F> {
    let mut subpop: Subpopulation<G, F> =
      Subpopulation::generate(fitness.len(), |i| vec![i as i64; 3]).unwrap();
    for (ind, &f) in subpop.individuals_mut().iter_mut().zip(fitness) {
      ind.fitness.set(f, f >= 1.0);
      ind.evaluated = true;
    }
    Population::new(vec![subpop])
  }

  fn takes_terminator<T: Terminator<G, F>>(
    t: &mut T,
    generation: usize,
    population: &Population<G, F>,
  ) -> bool {
    t.terminate(generation, population)
  }

  #[test]
  fn test_terminator_from_closure() {
    let pop = population(&[0.1, 0.2]);
    let mut calls = 0;
    let mut terminator = |_: usize, p: &Population<G, F>| {
      calls += 1;
      p[0].len() > 5
    };
    assert!(!takes_terminator(&mut terminator, 0, &pop));
    assert_eq!(calls, 1);
  }

  #[test]
  fn test_generation_terminator() {
    let pop = population(&[0.0]);
    let mut t = GenerationTerminator(3);
    assert!(!takes_terminator(&mut t, 0, &pop));
    assert!(!takes_terminator(&mut t, 1, &pop));
    assert!(takes_terminator(&mut t, 2, &pop));
  }

  #[test]
  fn test_ideal_terminator() {
    assert!(!takes_terminator(&mut IdealTerminator, 0, &population(&[0.5])));
    assert!(takes_terminator(
      &mut IdealTerminator,
      0,
      &population(&[0.5, 1.0])
    ));
  }

  #[test]
  fn test_any_individual() {
    let pop = population(&[0.0, 0.0, 0.0, 0.0]);
    let mut t = AnyIndividual(|ind: &Individual<G, F>| ind.genome()[0] == 3);
    assert!(takes_terminator(&mut t, 0, &pop));
    let mut t = AnyIndividual(|ind: &Individual<G, F>| ind.genome()[0] == 9);
    assert!(!takes_terminator(&mut t, 0, &pop));
  }
}
