//! Composable breeding sources.
//!
//! A breeding tree is made of [`BreedingSource`] nodes. Leaves are selection
//! methods wrapped in a
//! [`SelectionSource`](crate::selection::SelectionSource); interior nodes
//! are the pipelines of [`pipelines`], which pull individuals from their
//! child sources, vary them and pass them on. A tree is checked once by
//! [`validate`] before the first generation, and every worker thread breeds
//! with its own clone of it.
//!
//! Sources never modify the individuals of the subpopulation they read from.
//! Selection hands out shallow duplicates and pipelines only change genomes
//! through [`Individual::genome_mut`], which copies shared genomes first.

pub mod pipelines;

use std::fmt::{self, Debug};

use crate::{
  config::Key,
  error::{Error, Result, SetupErrors},
  execution::EvoRng,
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::Subpopulation,
};

/// Number of child sources a node accepts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arity {
  /// Exactly this many.
  Exactly(usize),
  /// This many or more.
  AtLeast(usize),
}

impl Arity {
  /// Returns `true` if `count` child sources are acceptable.
  pub fn accepts(self, count: usize) -> bool {
    match self {
      Arity::Exactly(n) => count == n,
      Arity::AtLeast(n) => count >= n,
    }
  }

  /// The smallest acceptable number of child sources.
  pub fn minimum(self) -> usize {
    match self {
      Arity::Exactly(n) | Arity::AtLeast(n) => n,
    }
  }
}

impl fmt::Display for Arity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Arity::Exactly(n) => write!(f, "exactly {n}"),
      Arity::AtLeast(n) => write!(f, "at least {n}"),
    }
  }
}

/// Per-call state handed to breeding sources.
#[derive(Debug)]
pub struct BreedContext<'a> {
  /// Index of the worker thread breeding.
  pub thread: usize,
  /// Current generation.
  pub generation: usize,
  /// The worker's random number stream.
  pub rng: &'a mut EvoRng,
}

/// A node of a breeding tree.
pub trait BreedingSource<G: Genome, F: Fitness>: Send + Debug {
  /// Name used in configuration and error messages.
  fn name(&self) -> &'static str;

  /// Number of child sources this node needs.
  fn arity(&self) -> Arity;

  /// Child sources in order.
  fn sources(&self) -> &[Box<dyn BreedingSource<G, F>>] {
    &[]
  }

  /// Number of individuals a call to [`produce`](Self::produce) typically
  /// yields when unconstrained.
  fn typical_outputs(&self) -> usize;

  /// Reports this node's own setting errors (probabilities, sizes). Child
  /// sources are checked by [`validate`].
  fn check(&self, _path: &Key, _errors: &mut SetupErrors) {}

  /// Called once per generation and subpopulation before any
  /// [`produce`](Self::produce). Must forward to child sources.
  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()>;

  /// Appends between `min` and `max` new individuals to `out`, breeding from
  /// `subpop`, and returns how many were appended.
  fn produce(
    &mut self,
    min: usize,
    max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize>;

  /// Returns an independent deep copy of this node and its children.
  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>>;
}

impl<G: Genome, F: Fitness> Clone for Box<dyn BreedingSource<G, F>> {
  fn clone(&self) -> Self {
    self.box_clone()
  }
}

/// Walks the tree under `source` and reports every node whose child count
/// violates its arity, together with every node's own setting errors.
///
/// Error keys are tree paths rooted at `path`, such as
/// `pop.subpop.0.pipe.source.1`.
pub fn validate<G: Genome, F: Fitness>(
  source: &dyn BreedingSource<G, F>,
  path: &Key,
  errors: &mut SetupErrors,
) {
  let arity = source.arity();
  let count = source.sources().len();
  if !arity.accepts(count) {
    errors.report(
      path,
      format!(
        "`{}` needs {arity} source(s), but {count} are connected",
        source.name()
      ),
    );
  }
  if source.typical_outputs() == 0 {
    errors
      .report(path, format!("`{}` never produces anything", source.name()));
  }
  source.check(path, errors);
  for (i, child) in source.sources().iter().enumerate() {
    validate(child.as_ref(), &path.push("source").push(i), errors);
  }
}

/// Calls [`BreedingSource::produce`] and verifies the production contract.
///
/// Fails with [`Error::Breeding`] if `min > max`, or if the source returned
/// a count outside `min..=max` or appended a different number of
/// individuals than it reported.
pub fn produce_checked<G: Genome, F: Fitness>(
  source: &mut dyn BreedingSource<G, F>,
  min: usize,
  max: usize,
  subpop_index: usize,
  subpop: &Subpopulation<G, F>,
  out: &mut Vec<Individual<G, F>>,
  ctx: &mut BreedContext<'_>,
) -> Result<usize> {
  if min > max {
    return Err(Error::Breeding {
      source_name: source.name(),
      message: format!("asked for at least {min} but at most {max}"),
    });
  }
  let before = out.len();
  let produced = source.produce(min, max, subpop_index, subpop, out, ctx)?;
  let appended = out.len() - before;
  if produced < min || produced > max || produced != appended {
    return Err(Error::Breeding {
      source_name: source.name(),
      message: format!(
        "reported {produced} and appended {appended} individual(s), \
         expected {min}..={max}"
      ),
    });
  }
  Ok(produced)
}

/// Pulls exactly one individual from `source`.
pub(crate) fn produce_one<G: Genome, F: Fitness>(
  source: &mut dyn BreedingSource<G, F>,
  subpop_index: usize,
  subpop: &Subpopulation<G, F>,
  ctx: &mut BreedContext<'_>,
) -> Result<Individual<G, F>> {
  let mut buffer = Vec::with_capacity(1);
  produce_checked(source, 1, 1, subpop_index, subpop, &mut buffer, ctx)?;
  buffer.pop().ok_or_else(|| Error::Breeding {
    source_name: source.name(),
    message: "produced nothing".to_owned(),
  })
}

/// Forwards [`BreedingSource::prepare_to_produce`] to every source.
pub(crate) fn prepare_sources<G: Genome, F: Fitness>(
  sources: &mut [Box<dyn BreedingSource<G, F>>],
  subpop: &Subpopulation<G, F>,
  subpop_index: usize,
) -> Result<()> {
  sources
    .iter_mut()
    .try_for_each(|s| s.prepare_to_produce(subpop, subpop_index))
}

/// Reports `value`, stored under `path.name`, unless it lies in `[0, 1]`.
pub(crate) fn check_probability(
  path: &Key,
  name: &str,
  value: f64,
  errors: &mut SetupErrors,
) {
  if !(0.0..=1.0).contains(&value) {
    errors.report(
      path.push(name),
      format!("{value} is not a probability in [0, 1]"),
    );
  }
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;

  use super::*;
  use crate::fitness::ScalarFitness;

  type G = Vec<bool>;
  type F = ScalarFitness;

  /// Claims to produce `min` individuals but appends `appended`.
  #[derive(Clone, Debug)]
  struct Liar {
    appended: usize,
  }

  impl BreedingSource<G, F> for Liar {
    fn name(&self) -> &'static str {
      "liar"
    }

    fn arity(&self) -> Arity {
      Arity::Exactly(0)
    }

    fn typical_outputs(&self) -> usize {
      1
    }

    fn prepare_to_produce(
      &mut self,
      _subpop: &Subpopulation<G, F>,
      _subpop_index: usize,
    ) -> Result<()> {
      Ok(())
    }

    fn produce(
      &mut self,
      min: usize,
      _max: usize,
      _subpop_index: usize,
      _subpop: &Subpopulation<G, F>,
      out: &mut Vec<Individual<G, F>>,
      _ctx: &mut BreedContext<'_>,
    ) -> Result<usize> {
      out.extend((0..self.appended).map(|_| Individual::new(vec![true])));
      Ok(min)
    }

    fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
      Box::new(self.clone())
    }
  }

  #[test]
  fn test_arity() {
    assert!(Arity::Exactly(2).accepts(2));
    assert!(!Arity::Exactly(2).accepts(1));
    assert!(Arity::AtLeast(1).accepts(4));
    assert!(!Arity::AtLeast(1).accepts(0));
    assert_eq!(Arity::AtLeast(3).to_string(), "at least 3");
  }

  #[test]
  fn test_produce_contract_is_enforced() {
    let subpop = Subpopulation::<G, F>::new(0);
    let mut rng = EvoRng::seed_from_u64(0);
    let mut ctx = BreedContext {
      thread: 0,
      generation: 0,
      rng: &mut rng,
    };
    let mut out = Vec::new();

    let mut honest = Liar { appended: 2 };
    assert_eq!(
      produce_checked(&mut honest, 2, 4, 0, &subpop, &mut out, &mut ctx),
      Ok(2)
    );

    let mut liar = Liar { appended: 3 };
    let err = produce_checked(&mut liar, 2, 4, 0, &subpop, &mut out, &mut ctx)
      .unwrap_err();
    assert!(matches!(err, Error::Breeding { source_name: "liar", .. }));

    let err = produce_checked(&mut honest, 3, 2, 0, &subpop, &mut out, &mut ctx)
      .unwrap_err();
    assert!(err.to_string().contains("at most 2"));
  }

  #[test]
  fn test_check_probability() {
    let mut errors = SetupErrors::new();
    check_probability(&Key::new("p"), "likelihood", 0.5, &mut errors);
    check_probability(&Key::new("p"), "likelihood", 1.5, &mut errors);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.errors()[0].key.as_str(), "p.likelihood");
  }
}
