//! Breeders turn an evaluated population into the next one.
//!
//! Both breeders run one breeding tree per subpopulation. The slots to fill
//! are split into contiguous ranges, one per worker, and worker `i` fills its
//! range with its own clone of the tree and its own RNG. Children are
//! concatenated in worker order, so the result does not depend on
//! scheduling.

pub mod nsga;

use rayon::prelude::*;

use crate::{
  breeding::{produce_checked, validate, BreedContext, BreedingSource},
  config::{Key, Parameters},
  error::{Error, Result, SetupErrors},
  execution::{split_ranges, Workers},
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::{Population, Subpopulation},
};

/// Produces the next population.
pub trait Breed<G: Genome, F: Fitness> {
  /// Reports configuration errors for breeding `population`.
  fn validate(&self, population: &Population<G, F>, errors: &mut SetupErrors);

  /// Called after every evaluation pass, before statistics are taken.
  fn post_evaluation(
    &mut self,
    _population: &mut Population<G, F>,
    _generation: usize,
  ) -> Result<()> {
    Ok(())
  }

  /// Breeds the population of generation `generation + 1`.
  fn breed(
    &mut self,
    population: &Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<Population<G, F>>;
}

/// One breeding tree per subpopulation plus the per-worker clones of each.
#[derive(Debug)]
pub(crate) struct Pipelines<G: Genome, F: Fitness> {
  prototypes: Vec<Box<dyn BreedingSource<G, F>>>,
  // [subpop][thread]
  clones: Vec<Vec<Box<dyn BreedingSource<G, F>>>>,
}

impl<G: Genome, F: Fitness> Pipelines<G, F> {
  pub(crate) fn new(prototypes: Vec<Box<dyn BreedingSource<G, F>>>) -> Self {
    Self {
      prototypes,
      clones: Vec::new(),
    }
  }

  pub(crate) fn validate(
    &self,
    population: &Population<G, F>,
    errors: &mut SetupErrors,
  ) {
    if self.prototypes.len() != population.len() {
      errors.report(
        "breed",
        format!(
          "{} breeding pipeline(s) for {} subpopulation(s)",
          self.prototypes.len(),
          population.len()
        ),
      );
    }
    for (i, pipe) in self.prototypes.iter().enumerate() {
      validate(pipe.as_ref(), &pipeline_key(i), errors);
    }
  }

  fn ensure_clones(&mut self, threads: usize) {
    let stale = self.clones.len() != self.prototypes.len()
      || self.clones.iter().any(|c| c.len() != threads);
    if stale {
      tracing::debug!(threads, "cloning breeding pipelines for workers");
      self.clones = self
        .prototypes
        .iter()
        .map(|p| (0..threads).map(|_| p.box_clone()).collect())
        .collect();
    }
  }

  /// Breeds `count` children from `subpop` with the pipeline of
  /// `subpop_index`.
  pub(crate) fn breed_children(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
    count: usize,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<Vec<Individual<G, F>>> {
    self.ensure_clones(workers.threads());
    let ranges = split_ranges(count, workers.threads());
    let Some(pipes) = self.clones.get_mut(subpop_index) else {
      return Err(Error::Breeding {
        source_name: "breeder",
        message: format!("no pipeline for subpopulation {subpop_index}"),
      });
    };
    let results: Vec<Result<Vec<_>>> = workers.install(|rngs| {
      ranges
        .par_iter()
        .zip(pipes.par_iter_mut())
        .zip(rngs.par_iter_mut())
        .enumerate()
        .map(|(thread, ((range, pipe), rng))| {
          pipe.prepare_to_produce(subpop, subpop_index)?;
          let mut ctx = BreedContext {
            thread,
            generation,
            rng,
          };
          let wanted = range.len();
          let mut out = Vec::with_capacity(wanted);
          while out.len() < wanted {
            let remaining = wanted - out.len();
            produce_checked(
              pipe.as_mut(),
              1,
              remaining,
              subpop_index,
              subpop,
              &mut out,
              &mut ctx,
            )?;
          }
          Ok(out)
        })
        .collect()
    });

    let mut children = Vec::with_capacity(count);
    for result in results {
      children.extend(result?);
    }
    Ok(children)
  }
}

/// Key under which the pipeline of subpopulation `subpop` is configured.
pub fn pipeline_key(subpop: usize) -> Key {
  Key::new("pop.subpop").push(subpop).push("pipe")
}

/// The generational breeder: every subpopulation is replaced by its elites
/// plus freshly bred children.
#[derive(Debug)]
pub struct SimpleBreeder<G: Genome, F: Fitness> {
  pipelines: Pipelines<G, F>,
  elites: Vec<usize>,
  reevaluate_elites: Vec<bool>,
}

impl<G: Genome, F: Fitness> SimpleBreeder<G, F> {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "breed";

  /// Creates a breeder with one breeding tree per subpopulation and no
  /// elites.
  pub fn new(pipelines: Vec<Box<dyn BreedingSource<G, F>>>) -> Self {
    Self {
      pipelines: Pipelines::new(pipelines),
      elites: Vec::new(),
      reevaluate_elites: Vec::new(),
    }
  }

  /// Keeps the `elites[i]` best individuals of subpopulation `i`.
  pub fn with_elites(mut self, elites: Vec<usize>) -> Self {
    self.elites = elites;
    self
  }

  /// Marks the elites of subpopulation `i` for re-evaluation if `flags[i]`
  /// is set.
  pub fn reevaluating_elites(mut self, flags: Vec<bool>) -> Self {
    self.reevaluate_elites = flags;
    self
  }

  /// Reads `elite.<i>` and `reevaluate-elites.<i>` for `subpops`
  /// subpopulations under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    pipelines: Vec<Box<dyn BreedingSource<G, F>>>,
    subpops: usize,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let mut elites = Vec::with_capacity(subpops);
    let mut reevaluate = Vec::with_capacity(subpops);
    let mut ok = true;
    for i in 0..subpops {
      let count = errors.collect(params.get_usize_or(
        &base.push("elite").push(i),
        None,
        0,
      ));
      let flag = errors.collect(params.get_bool(
        &base.push("reevaluate-elites").push(i),
        None,
        false,
      ));
      match (count, flag) {
        (Some(count), Some(flag)) => {
          elites.push(count);
          reevaluate.push(flag);
        }
        _ => ok = false,
      }
    }
    ok.then(|| {
      Self::new(pipelines)
        .with_elites(elites)
        .reevaluating_elites(reevaluate)
    })
  }

  /// Number of elites kept in subpopulation `subpop`.
  pub fn elites(&self, subpop: usize) -> usize {
    self.elites.get(subpop).copied().unwrap_or(0)
  }

  fn reevaluates_elites(&self, subpop: usize) -> bool {
    self.reevaluate_elites.get(subpop).copied().unwrap_or(false)
  }
}

impl<G: Genome, F: Fitness> Breed<G, F> for SimpleBreeder<G, F> {
  fn validate(&self, population: &Population<G, F>, errors: &mut SetupErrors) {
    self.pipelines.validate(population, errors);
    for (i, subpop) in population.subpops().iter().enumerate() {
      let elites = self.elites(i);
      if elites > subpop.size() {
        errors.report(
          Key::new(Self::DEFAULT_BASE).push("elite").push(i),
          format!(
            "{elites} elites do not fit in a subpopulation of {}",
            subpop.size()
          ),
        );
      }
    }
  }

  fn breed(
    &mut self,
    population: &Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<Population<G, F>> {
    let mut next = Vec::with_capacity(population.len());
    for (i, subpop) in population.subpops().iter().enumerate() {
      let mut bred = subpop.empty_like();
      let ranked = subpop.ranked_indices();
      let elites = self.elites(i).min(subpop.size()).min(ranked.len());
      let reevaluate = self.reevaluates_elites(i);
      bred.extend(ranked[..elites].iter().map(|&e| {
        let mut elite = subpop[e].shallow_duplicate();
        if reevaluate {
          elite.evaluated = false;
        }
        elite
      }))?;

      let count = subpop.size() - elites;
      let children = self
        .pipelines
        .breed_children(subpop, i, count, generation, workers)?;
      bred.extend(children)?;
      tracing::debug!(subpop = i, elites, children = count, "bred");
      next.push(bred);
    }
    Ok(Population::new(next))
  }
}
