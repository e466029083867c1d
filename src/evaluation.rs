//! Population evaluation.
//!
//! [`SimpleEvaluator`] runs a [`Problem`] over every individual that is not
//! evaluated yet. The pending individuals are split into contiguous chunks,
//! one per worker, and each worker evaluates its chunk with its own problem
//! clone and its own RNG. Grouped evaluation lives in [`coevolution`].

pub mod coevolution;

use rayon::prelude::*;

use crate::{
  config::{Key, Parameters},
  error::{Error, Result, SetupErrors},
  execution::{chunk_size, Workers},
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::Population,
  problem::{EvalContext, Problem},
};

/// What an evaluation pass did.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct EvaluationReport {
  /// Number of problem invocations: individuals for plain problems, groups
  /// for grouped problems.
  pub evaluations: usize,
}

/// Assigns fitness to a population.
pub trait Evaluate<G: Genome, F: Fitness> {
  /// Reads the evaluator's and its problem's parameters.
  fn setup(
    &mut self,
    _params: &dyn Parameters,
    _base: &Key,
    _errors: &mut SetupErrors,
  ) {
  }

  /// Evaluates `population` in generation `generation`.
  ///
  /// Every individual is evaluated once this returns `Ok`.
  fn evaluate_population(
    &mut self,
    population: &mut Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<EvaluationReport>;

  /// Returns `true` if some evaluated individual has an ideal fitness.
  fn ideal_found(&self, population: &Population<G, F>) -> bool {
    population
      .subpops()
      .iter()
      .flat_map(|s| s.individuals())
      .any(|ind| ind.evaluated && ind.fitness.is_ideal())
  }
}

/// Evaluates individuals one at a time with per-worker problem clones.
pub struct SimpleEvaluator<G: Genome, F: Fitness> {
  problem: Box<dyn Problem<G, F>>,
  clones: Vec<Box<dyn Problem<G, F>>>,
}

impl<G: Genome, F: Fitness> SimpleEvaluator<G, F> {
  /// Creates an evaluator for `problem`.
  pub fn new(problem: impl Problem<G, F> + 'static) -> Self {
    Self::from_boxed(Box::new(problem))
  }

  /// Creates an evaluator for an already boxed problem.
  pub fn from_boxed(problem: Box<dyn Problem<G, F>>) -> Self {
    Self {
      problem,
      clones: Vec::new(),
    }
  }

  /// The prototype problem the worker clones are made from.
  pub fn problem(&self) -> &dyn Problem<G, F> {
    self.problem.as_ref()
  }

  fn ensure_clones(&mut self, threads: usize) {
    if self.clones.len() != threads {
      tracing::debug!(threads, "cloning problem for workers");
      self.clones = (0..threads).map(|_| self.problem.box_clone()).collect();
    }
  }
}

impl<G: Genome, F: Fitness> std::fmt::Debug for SimpleEvaluator<G, F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SimpleEvaluator")
      .field("clones", &self.clones.len())
      .finish_non_exhaustive()
  }
}

// subpopulation index, individual index
type Slot = (usize, usize);

impl<G: Genome, F: Fitness> Evaluate<G, F> for SimpleEvaluator<G, F> {
  fn setup(
    &mut self,
    params: &dyn Parameters,
    base: &Key,
    errors: &mut SetupErrors,
  ) {
    self.problem.setup(params, &base.push("problem"), errors);
    self.clones.clear();
  }

  /// Problems work on shallow duplicates. The population is only written
  /// once every worker succeeded, so a failed pass leaves it untouched.
  fn evaluate_population(
    &mut self,
    population: &mut Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<EvaluationReport> {
    let threads = workers.threads();
    self.ensure_clones(threads);

    let pending: Vec<Slot> = population
      .subpops()
      .iter()
      .enumerate()
      .flat_map(|(s, subpop)| {
        subpop
          .individuals()
          .iter()
          .enumerate()
          .filter(|(_, ind)| !ind.evaluated)
          .map(move |(i, _)| (s, i))
      })
      .collect();
    if pending.is_empty() {
      return Ok(EvaluationReport::default());
    }

    let size = chunk_size(pending.len(), threads);
    let problems = &mut self.clones;
    let view = &*population;
    let results: Vec<Result<Vec<Individual<G, F>>>> =
      workers.install(|rngs| {
        pending
          .par_chunks(size)
          .zip(problems.par_iter_mut())
          .zip(rngs.par_iter_mut())
          .enumerate()
          .map(|(thread, ((chunk, problem), rng))| {
            let mut ctx = EvalContext {
              thread,
              generation,
              rng,
            };
            chunk
              .iter()
              .map(|&(subpop, index)| -> Result<Individual<G, F>> {
                let mut ind = view[subpop][index].shallow_duplicate();
                problem
                  .evaluate(&mut ind, subpop, &mut ctx)
                  .map_err(|source| Error::Problem { thread, source })?;
                if !ind.evaluated {
                  return Err(Error::NotEvaluated { subpop, index });
                }
                Ok(ind)
              })
              .collect::<Result<Vec<_>>>()
          })
          .collect()
      });

    let mut evaluated = Vec::with_capacity(pending.len());
    for result in results {
      evaluated.extend(result?);
    }
    for (&(subpop, index), ind) in pending.iter().zip(evaluated) {
      population[subpop][index] = ind;
    }
    let report = EvaluationReport {
      evaluations: pending.len(),
    };
    tracing::debug!(generation, evaluations = report.evaluations, "evaluated");
    Ok(report)
  }
}
