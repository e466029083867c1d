//! Subpopulations and populations.

use std::ops::{Index, IndexMut};

use crate::{
  error::{Error, Result},
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
};

/// An ordered collection of individuals sharing one species.
#[derive(Clone, Debug)]
pub struct Subpopulation<G, F> {
  individuals: Vec<Individual<G, F>>,
  size: usize,
  species: Option<&'static str>,
}

impl<G: Genome, F: Fitness> Subpopulation<G, F> {
  /// Creates an empty subpopulation whose configured size is `size`.
  pub fn new(size: usize) -> Self {
    Self {
      individuals: Vec::with_capacity(size),
      size,
      species: None,
    }
  }

  /// Creates a subpopulation from individuals. The configured size becomes
  /// their number.
  pub fn from_individuals(individuals: Vec<Individual<G, F>>) -> Result<Self> {
    let mut subpop = Self::new(individuals.len());
    for ind in individuals {
      subpop.push(ind)?;
    }
    Ok(subpop)
  }

  /// Creates `size` individuals from the genomes produced by `genome`.
  pub fn generate(
    size: usize,
    mut genome: impl FnMut(usize) -> G,
  ) -> Result<Self> {
    let mut subpop = Self::new(size);
    for i in 0..size {
      subpop.push(Individual::new(genome(i)))?;
    }
    Ok(subpop)
  }

  /// Configured number of individuals between generations.
  pub fn size(&self) -> usize {
    self.size
  }

  /// Current number of individuals.
  pub fn len(&self) -> usize {
    self.individuals.len()
  }

  /// Returns `true` if the subpopulation holds no individual.
  pub fn is_empty(&self) -> bool {
    self.individuals.is_empty()
  }

  /// Species tag shared by all individuals, once known.
  pub fn species(&self) -> Option<&'static str> {
    self.species
  }

  /// Individuals in order.
  pub fn individuals(&self) -> &[Individual<G, F>] {
    &self.individuals
  }

  /// Mutable individuals in order.
  pub fn individuals_mut(&mut self) -> &mut [Individual<G, F>] {
    &mut self.individuals
  }

  /// Appends an individual.
  ///
  /// # Errors
  ///
  /// Fails with [`Error::SpeciesMismatch`] if its species differs from the
  /// species of the individuals already present.
  pub fn push(&mut self, individual: Individual<G, F>) -> Result<()> {
    let found = individual.species();
    match self.species {
      Some(expected) if expected != found => {
        return Err(Error::SpeciesMismatch { expected, found })
      }
      Some(_) => {}
      None => self.species = Some(found),
    }
    self.individuals.push(individual);
    Ok(())
  }

  /// Appends several individuals. See [`push`](Self::push).
  pub fn extend(
    &mut self,
    individuals: impl IntoIterator<Item = Individual<G, F>>,
  ) -> Result<()> {
    individuals.into_iter().try_for_each(|ind| self.push(ind))
  }

  /// Moves all individuals out, keeping size and species.
  pub fn take_individuals(&mut self) -> Vec<Individual<G, F>> {
    std::mem::take(&mut self.individuals)
  }

  /// An empty subpopulation with the same size and species.
  pub fn empty_like(&self) -> Self {
    Self {
      individuals: Vec::with_capacity(self.size),
      size: self.size,
      species: self.species,
    }
  }

  /// Index of the best evaluated individual.
  pub fn best_index(&self) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, ind) in self.individuals.iter().enumerate() {
      if !ind.evaluated {
        continue;
      }
      match best {
        Some(b) if !ind.better_than(&self.individuals[b]) => {}
        _ => best = Some(i),
      }
    }
    best
  }

  /// Indices of evaluated individuals, best first. Ties keep their order.
  pub fn ranked_indices(&self) -> Vec<usize> {
    best_first(&self.individuals)
  }

  /// Returns an error naming the first unevaluated individual, if any.
  pub fn ensure_evaluated(&self, subpop: usize) -> Result<()> {
    match self.individuals.iter().position(|ind| !ind.evaluated) {
      Some(index) => Err(Error::MissingFitness { subpop, index }),
      None => Ok(()),
    }
  }
}

/// Indices of the evaluated `individuals`, best first. Ties keep their
/// order.
pub(crate) fn best_first<G: Genome, F: Fitness>(
  individuals: &[Individual<G, F>],
) -> Vec<usize> {
  // insertion, as `better_than` may only be a partial order
  let mut ranked: Vec<usize> = Vec::with_capacity(individuals.len());
  for (i, ind) in individuals.iter().enumerate() {
    if !ind.evaluated {
      continue;
    }
    let at = ranked
      .iter()
      .position(|&r| ind.better_than(&individuals[r]))
      .unwrap_or(ranked.len());
    ranked.insert(at, i);
  }
  ranked
}

impl<G, F> Index<usize> for Subpopulation<G, F> {
  type Output = Individual<G, F>;

  fn index(&self, index: usize) -> &Self::Output {
    &self.individuals[index]
  }
}

impl<G, F> IndexMut<usize> for Subpopulation<G, F> {
  fn index_mut(&mut self, index: usize) -> &mut Self::Output {
    &mut self.individuals[index]
  }
}

/// Subpopulations evolved together. Subpopulation `i` keeps its role for the
/// whole run.
#[derive(Clone, Debug)]
pub struct Population<G, F> {
  subpops: Vec<Subpopulation<G, F>>,
}

impl<G: Genome, F: Fitness> Population<G, F> {
  /// Creates a population from subpopulations.
  pub fn new(subpops: Vec<Subpopulation<G, F>>) -> Self {
    Self { subpops }
  }

  /// Subpopulations in order.
  pub fn subpops(&self) -> &[Subpopulation<G, F>] {
    &self.subpops
  }

  /// Mutable subpopulations in order.
  pub fn subpops_mut(&mut self) -> &mut [Subpopulation<G, F>] {
    &mut self.subpops
  }

  /// Number of subpopulations.
  pub fn len(&self) -> usize {
    self.subpops.len()
  }

  /// Returns `true` if there is no subpopulation.
  pub fn is_empty(&self) -> bool {
    self.subpops.is_empty()
  }

  /// Total number of individuals.
  pub fn individual_count(&self) -> usize {
    self.subpops.iter().map(Subpopulation::len).sum()
  }

  /// Number of individuals waiting for evaluation.
  pub fn unevaluated_count(&self) -> usize {
    self
      .subpops
      .iter()
      .flat_map(|s| s.individuals())
      .filter(|ind| !ind.evaluated)
      .count()
  }

  /// Consumes the population, returning its subpopulations.
  pub fn into_subpops(self) -> Vec<Subpopulation<G, F>> {
    self.subpops
  }
}

impl<G, F> Index<usize> for Population<G, F> {
  type Output = Subpopulation<G, F>;

  fn index(&self, index: usize) -> &Self::Output {
    &self.subpops[index]
  }
}

impl<G, F> IndexMut<usize> for Population<G, F> {
  fn index_mut(&mut self, index: usize) -> &mut Self::Output {
    &mut self.subpops[index]
  }
}
