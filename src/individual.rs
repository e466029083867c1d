//! Individuals: a genome, its fitness and an evaluated flag.
//!
//! Genomes are reference counted. [`Individual::shallow_duplicate`] shares
//! the genome with the original, which is what selection hands to breeding
//! pipelines; [`Individual::genome_mut`] copies a shared genome before
//! handing out a mutable reference and clears the evaluated flag. A pipeline
//! therefore cannot modify a parent that still lives in the population.

use std::sync::Arc;

use crate::{fitness::Fitness, genome::Genome};

/// One candidate solution.
#[derive(Debug)]
pub struct Individual<G, F> {
  genome: Arc<G>,
  /// Fitness assigned by the last evaluation.
  pub fitness: F,
  /// `false` whenever the genome changed since the last evaluation.
  pub evaluated: bool,
}

impl<G: Genome, F: Fitness> Individual<G, F> {
  /// Creates an unevaluated individual with a default fitness.
  pub fn new(genome: G) -> Self {
    Self {
      genome: Arc::new(genome),
      fitness: F::default(),
      evaluated: false,
    }
  }

  /// Creates an evaluated individual.
  pub fn with_fitness(genome: G, fitness: F) -> Self {
    Self {
      genome: Arc::new(genome),
      fitness,
      evaluated: true,
    }
  }

  /// The genome.
  pub fn genome(&self) -> &G {
    &self.genome
  }

  /// Mutable genome access. Copies the genome first if it is shared with
  /// another individual, and marks this individual for re-evaluation.
  pub fn genome_mut(&mut self) -> &mut G {
    self.evaluated = false;
    Arc::make_mut(&mut self.genome)
  }

  /// Replaces the genome and marks this individual for re-evaluation.
  pub fn set_genome(&mut self, genome: G) {
    self.genome = Arc::new(genome);
    self.evaluated = false;
  }

  /// Species of the genome.
  pub fn species(&self) -> &'static str {
    self.genome.species()
  }

  /// A copy sharing the genome with `self`. Cheap; any later
  /// [`genome_mut`](Self::genome_mut) on either copy detaches it.
  pub fn shallow_duplicate(&self) -> Self {
    Self {
      genome: Arc::clone(&self.genome),
      fitness: self.fitness.clone(),
      evaluated: self.evaluated,
    }
  }

  /// A copy owning its own genome.
  pub fn deep_duplicate(&self) -> Self {
    Self {
      genome: Arc::new(G::clone(&self.genome)),
      fitness: self.fitness.clone(),
      evaluated: self.evaluated,
    }
  }

  /// Returns `true` if both genomes are equal, regardless of fitness.
  pub fn genome_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.genome, &other.genome) || self.genome == other.genome
  }

  /// Returns `true` if both individuals share the same genome allocation.
  pub fn shares_genome_with(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.genome, &other.genome)
  }

  /// Returns `true` if `self` is evaluated and better than `other`, or if
  /// only `self` is evaluated.
  pub fn better_than(&self, other: &Self) -> bool {
    match (self.evaluated, other.evaluated) {
      (true, true) => self.fitness.better_than(&other.fitness),
      (evaluated, _) => evaluated && !other.evaluated,
    }
  }
}

/// Same as [`Individual::shallow_duplicate`].
impl<G, F: Clone> Clone for Individual<G, F> {
  fn clone(&self) -> Self {
    Self {
      genome: Arc::clone(&self.genome),
      fitness: self.fitness.clone(),
      evaluated: self.evaluated,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fitness::ScalarFitness;

  type Ind = Individual<Vec<u8>, ScalarFitness>;

  #[test]
  fn test_genome_mut_detaches_shared_genome() {
    let parent = Ind::with_fitness(vec![1, 2, 3], ScalarFitness::new(1.0));
    let mut child = parent.shallow_duplicate();
    assert!(child.shares_genome_with(&parent));
    assert!(child.evaluated);

    child.genome_mut()[0] = 9;
    assert!(!child.evaluated);
    assert!(parent.evaluated);
    assert_eq!(parent.genome(), &vec![1, 2, 3]);
    assert_eq!(child.genome(), &vec![9, 2, 3]);
    assert!(!child.shares_genome_with(&parent));
  }

  #[test]
  fn test_deep_duplicate_owns_genome() {
    let a = Ind::new(vec![4, 5]);
    let b = a.deep_duplicate();
    assert!(!b.shares_genome_with(&a));
    assert!(b.genome_eq(&a));
  }

  #[test]
  fn test_better_than_prefers_evaluated() {
    let good = Ind::with_fitness(vec![], ScalarFitness::new(1.0));
    let better = Ind::with_fitness(vec![], ScalarFitness::new(2.0));
    let fresh = Ind::new(vec![]);
    assert!(better.better_than(&good));
    assert!(good.better_than(&fresh));
    assert!(!fresh.better_than(&good));
    assert!(!fresh.better_than(&fresh.shallow_duplicate()));
  }
}
