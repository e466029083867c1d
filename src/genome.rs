//! Genome contract and the capabilities stock pipelines rely on.
//!
//! The engine treats a genome as an opaque, cloneable, comparable value.
//! Pipelines that recombine or perturb genomes additionally need the
//! [`Linear`] or [`Mutate`] capability; both are implemented for a few plain
//! vector encodings so that simple GA runs work out of the box.

use std::fmt::Debug;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::execution::EvoRng;

/// A candidate solution's encoding.
pub trait Genome: Clone + PartialEq + Debug + Send + Sync + 'static {
  /// Compatibility tag shared by every genome of a subpopulation.
  fn species(&self) -> &'static str {
    std::any::type_name::<Self>()
  }
}

impl<T> Genome for Vec<T> where
  T: Clone + PartialEq + Debug + Send + Sync + 'static
{
}

/// A genome made of a flat sequence of genes, suitable for cut-point
/// crossover.
pub trait Linear: Genome {
  /// Type of a single gene.
  type Gene: Clone;

  /// Genes in order.
  fn genes(&self) -> &[Self::Gene];

  /// Mutable genes in order.
  fn genes_mut(&mut self) -> &mut [Self::Gene];
}

impl<T> Linear for Vec<T>
where
  T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
  type Gene = T;

  fn genes(&self) -> &[T] {
    self
  }

  fn genes_mut(&mut self) -> &mut [T] {
    self
  }
}

/// How [`crossover`] exchanges genes between two parents.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum CrossoverKind {
  /// Swap every gene before a random cut point.
  #[default]
  OnePoint,
  /// Swap every gene between two random cut points.
  TwoPoint,
  /// Swap each gene independently with the given probability.
  Uniform(f64),
}

impl CrossoverKind {
  /// Parses a configuration name (`one`, `two`, `any`).
  pub fn from_name(name: &str, uniform_probability: f64) -> Option<Self> {
    match name {
      "one" | "one-point" => Some(Self::OnePoint),
      "two" | "two-point" => Some(Self::TwoPoint),
      "any" | "uniform" => Some(Self::Uniform(uniform_probability)),
      _ => None,
    }
  }
}

/// Recombines two linear genomes in place over their common length.
///
/// Returns `true` if at least one gene was exchanged.
pub fn crossover<G: Linear>(
  a: &mut G,
  b: &mut G,
  kind: CrossoverKind,
  rng: &mut EvoRng,
) -> bool {
  let (a, b) = (a.genes_mut(), b.genes_mut());
  let len = a.len().min(b.len());
  if len < 2 {
    return false;
  }
  let range = match kind {
    CrossoverKind::OnePoint => 0..rng.gen_range(1..len),
    CrossoverKind::TwoPoint => {
      let x = rng.gen_range(0..len);
      let y = rng.gen_range(0..len);
      x.min(y)..x.max(y) + 1
    }
    CrossoverKind::Uniform(p) => {
      let mut swapped = false;
      for i in 0..len {
        if rng.gen_bool(p) {
          std::mem::swap(&mut a[i], &mut b[i]);
          swapped = true;
        }
      }
      return swapped;
    }
  };
  let swapped = !range.is_empty();
  a[range.clone()].swap_with_slice(&mut b[range]);
  swapped
}

/// Parameters handed to [`Mutate::mutate`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct MutationParams {
  /// Probability of mutating each gene.
  pub per_gene: f64,
  /// Standard deviation of Gaussian perturbations.
  pub sigma: f64,
  /// Inclusive gene bounds, if any.
  pub bounds: Option<(f64, f64)>,
}

impl Default for MutationParams {
  fn default() -> Self {
    Self {
      per_gene: 0.05,
      sigma: 1.0,
      bounds: None,
    }
  }
}

/// A genome that can perturb itself.
pub trait Mutate: Genome {
  /// Mutates the genome in place, returning `true` if anything changed.
  fn mutate(&mut self, params: &MutationParams, rng: &mut EvoRng) -> bool;
}

/// Bit flip mutation.
impl Mutate for Vec<bool> {
  fn mutate(&mut self, params: &MutationParams, rng: &mut EvoRng) -> bool {
    let mut changed = false;
    for gene in self.iter_mut() {
      if rng.gen_bool(params.per_gene) {
        *gene = !*gene;
        changed = true;
      }
    }
    changed
  }
}

/// Gaussian mutation, clamped to the bounds if there are any.
impl Mutate for Vec<f64> {
  fn mutate(&mut self, params: &MutationParams, rng: &mut EvoRng) -> bool {
    let Ok(normal) = Normal::new(0.0, params.sigma) else {
      return false;
    };
    let mut changed = false;
    for gene in self.iter_mut() {
      if rng.gen_bool(params.per_gene) {
        let mut value = *gene + normal.sample(rng);
        if let Some((lo, hi)) = params.bounds {
          value = value.clamp(lo, hi);
        }
        changed |= value != *gene;
        *gene = value;
      }
    }
    changed
  }
}

/// Reset mutation inside the bounds, or a `±1` step without bounds.
impl Mutate for Vec<i64> {
  fn mutate(&mut self, params: &MutationParams, rng: &mut EvoRng) -> bool {
    let mut changed = false;
    for gene in self.iter_mut() {
      if rng.gen_bool(params.per_gene) {
        let value = match params.bounds {
          Some((lo, hi)) if lo.ceil() > hi.floor() => *gene,
          Some((lo, hi)) => rng.gen_range(lo.ceil() as i64..=hi.floor() as i64),
          None if rng.gen_bool(0.5) => gene.saturating_add(1),
          None => gene.saturating_sub(1),
        };
        changed |= value != *gene;
        *gene = value;
      }
    }
    changed
  }
}
