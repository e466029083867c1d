//! The generational loop.
//!
//! An [`EvolutionState`] owns everything a run needs: the population, the
//! evaluator, the breeder, the worker pool and the statistics gathered so
//! far. Every generation it
//! 1. evaluates the individuals that are not evaluated yet,
//! 2. lets the breeder post-process the evaluated population,
//! 3. records statistics and the best individuals of the run,
//! 4. checks whether the run is over and otherwise
//! 5. breeds the next population.
//!
//! The first fatal error stops the run. It is kept in the state, so that
//! further calls to [`EvolutionState::evolve`] fail with it again.

use std::fmt;

use typed_builder::TypedBuilder;

use crate::{
  breeder::{pipeline_key, Breed},
  config::{Key, ParameterDatabase, Parameters},
  error::{Error, Result, SetupErrors},
  evaluation::Evaluate,
  execution::{EvoRng, Workers},
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::{Population, Subpopulation},
  registry::Registry,
  statistics::{BestOfRun, GenerationStatistics},
  termination::Terminator,
};

/// Why a run stopped.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Finish {
  /// An ideal individual was found and the run quits on ideals.
  IdealFound,
  /// The configured number of generations was evaluated.
  MaxGenerations,
  /// The user's [`Terminator`] asked to stop.
  Terminated,
}

/// Result of one call to [`EvolutionState::evolve`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Progress {
  /// The next population was bred.
  Continue,
  /// The run is over. The population stays the last evaluated one.
  Finished(Finish),
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct RunOutcome<G, F> {
  /// The last evaluated population.
  pub population: Population<G, F>,
  /// The best individual of each subpopulation over the whole run.
  pub best_of_run: Vec<Option<Individual<G, F>>>,
  /// Number of evaluated generations.
  pub generations: usize,
  /// Statistics of every evaluated generation.
  pub statistics: Vec<GenerationStatistics>,
  /// Why the run stopped.
  pub finish: Finish,
}

impl<G, F> RunOutcome<G, F> {
  /// Returns `true` if the run stopped on an ideal individual.
  pub fn ideal_found(&self) -> bool {
    self.finish == Finish::IdealFound
  }
}

/// State of a run.
///
/// Build it with [`EvolutionState::builder`] or read it from parameters with
/// [`EvolutionState::from_parameters`].
#[derive(TypedBuilder)]
pub struct EvolutionState<G: Genome, F: Fitness> {
  /// The initial population.
  population: Population<G, F>,
  /// Assigns fitness every generation.
  evaluator: Box<dyn Evaluate<G, F>>,
  /// Produces every next generation.
  breeder: Box<dyn Breed<G, F>>,
  /// Number of generations to evaluate at most.
  max_generations: usize,
  /// Seed of the worker RNGs. Worker `i` is seeded with `seed + i`.
  #[builder(default = 0)]
  seed: u64,
  /// Number of worker threads.
  #[builder(default = 1)]
  threads: usize,
  /// Extra termination condition, checked after every evaluation.
  #[builder(default, setter(strip_option))]
  terminator: Option<Box<dyn Terminator<G, F>>>,
  /// Stop as soon as the evaluator reports an ideal individual.
  #[builder(default = true)]
  quit_on_ideal: bool,
  #[builder(setter(skip), default)]
  workers: Option<Workers>,
  #[builder(setter(skip), default)]
  configured: bool,
  #[builder(setter(skip), default)]
  ready: bool,
  #[builder(setter(skip), default)]
  generation: usize,
  #[builder(setter(skip), default)]
  finished: Option<Finish>,
  #[builder(setter(skip), default)]
  statistics: Vec<GenerationStatistics>,
  #[builder(setter(skip), default = BestOfRun::new(0))]
  best_of_run: BestOfRun<G, F>,
  #[builder(setter(skip), default)]
  first_error: Option<Error>,
}

impl<G: Genome, F: Fitness> EvolutionState<G, F> {
  /// Reads a run from `params`, building the configured components through
  /// `registry`. `init` creates the initial genome of every individual of a
  /// subpopulation.
  ///
  /// Reads `seed`, `threads`, `generations`, `quit-on-run-complete`,
  /// `pop.subpops`, `pop.subpop.<i>.size` and `pop.subpop.<i>.pipe`, then
  /// the breeder under `breed` and the evaluator under `eval`. Every
  /// configuration error is reported in one [`Error::Setup`].
  pub fn from_parameters(
    params: &dyn Parameters,
    registry: &Registry<G, F>,
    mut init: impl FnMut(usize, &mut EvoRng) -> G,
  ) -> Result<Self> {
    let mut errors = SetupErrors::new();
    let seed = errors.collect(params.get_int_or(&Key::new("seed"), None, 0));
    let threads =
      errors.collect(params.get_usize_or(&Key::new("threads"), None, 1));
    let max_generations =
      errors.collect(params.get_int(&Key::new("generations"), None, 1));
    let quit_on_ideal = errors.collect(params.get_bool(
      &Key::new("quit-on-run-complete"),
      None,
      true,
    ));
    let subpops =
      errors.collect(params.get_int(&Key::new("pop.subpops"), None, 1));
    let mut workers = match (seed, threads) {
      (Some(seed), Some(threads)) => {
        errors.collect(Workers::new(threads, seed as u64))
      }
      _ => None,
    };

    let subpops = subpops.unwrap_or(0) as usize;
    let default_size = Key::new("pop.subpop.default.size");
    let mut initial = Vec::with_capacity(subpops);
    let mut pipelines = Vec::with_capacity(subpops);
    for i in 0..subpops {
      let key = Key::new("pop.subpop").push(i).push("size");
      let size =
        errors.collect(params.get_int(&key, Some(&default_size), 1));
      if let (Some(size), Some(workers)) = (size, workers.as_mut()) {
        let rng = workers.main_rng();
        match Subpopulation::generate(size as usize, |_| init(i, rng)) {
          Ok(subpop) => initial.push(subpop),
          Err(e) => errors.report(key, e.to_string()),
        }
      }
      let pipe = registry.build_source(params, &pipeline_key(i), &mut errors);
      pipelines.extend(pipe);
    }

    let breeder = if pipelines.len() == subpops {
      registry.build_breeder(
        params,
        &Key::new("breed"),
        pipelines,
        subpops,
        &mut errors,
      )
    } else {
      None
    };
    let eval = Key::new("eval");
    let mut evaluator = registry.build_evaluator(params, &eval, &mut errors);
    if let Some(evaluator) = evaluator.as_mut() {
      evaluator.setup(params, &eval, &mut errors);
    }

    match (workers, evaluator, breeder, max_generations, quit_on_ideal) {
      (
        Some(workers),
        Some(evaluator),
        Some(breeder),
        Some(max_generations),
        Some(quit_on_ideal),
      ) if errors.is_empty() && initial.len() == subpops => Ok(Self {
        population: Population::new(initial),
        evaluator,
        breeder,
        max_generations: max_generations as usize,
        seed: workers.seed(),
        threads: workers.threads(),
        terminator: None,
        quit_on_ideal,
        workers: Some(workers),
        configured: true,
        ready: false,
        generation: 0,
        finished: None,
        statistics: Vec::new(),
        best_of_run: BestOfRun::new(subpops),
        first_error: None,
      }),
      _ => {
        if errors.is_empty() {
          errors.report("pop.subpops", "the run could not be built");
        }
        Err(Error::Setup(errors))
      }
    }
  }

  /// Validates the run and spawns the worker pool. Called by
  /// [`evolve`](Self::evolve) if it was not called before; later calls do
  /// nothing.
  ///
  /// Components of a state that was not read from parameters are set up
  /// with an empty parameter set.
  pub fn setup(&mut self) -> Result<()> {
    if self.ready {
      return Ok(());
    }
    let mut errors = SetupErrors::new();
    if !self.configured {
      self.evaluator.setup(
        &ParameterDatabase::new(),
        &Key::new("eval"),
        &mut errors,
      );
    }
    if self.population.is_empty() {
      errors.report("pop.subpops", "there must be at least one subpopulation");
    }
    for (i, subpop) in self.population.subpops().iter().enumerate() {
      if subpop.size() == 0 {
        errors.report(
          Key::new("pop.subpop").push(i).push("size"),
          "must be at least 1",
        );
      }
    }
    if self.max_generations == 0 {
      errors.report("generations", "must be at least 1");
    }
    self.breeder.validate(&self.population, &mut errors);
    if self.workers.is_none() {
      self.workers = errors.collect(Workers::new(self.threads, self.seed));
    }
    errors.finish()?;

    self.configured = true;
    self.ready = true;
    self.best_of_run = BestOfRun::new(self.population.len());
    Ok(())
  }

  /// Runs one generation: evaluation, statistics, the termination check
  /// and, unless the run is over, breeding.
  ///
  /// Fails with the first fatal error of the run, also if that error
  /// happened in an earlier call.
  pub fn evolve(&mut self) -> Result<Progress> {
    if let Some(error) = &self.first_error {
      return Err(error.clone());
    }
    if let Some(finish) = self.finished {
      return Ok(Progress::Finished(finish));
    }
    let result = self.generation_step();
    if let Err(error) = &result {
      if error.is_fatal() {
        tracing::error!(generation = self.generation, %error, "run failed");
        self.first_error = Some(error.clone());
      }
    }
    result
  }

  fn generation_step(&mut self) -> Result<Progress> {
    self.setup()?;
    let Some(workers) = self.workers.as_mut() else {
      return Err(Error::Setup(SetupErrors::new()));
    };

    let report = self.evaluator.evaluate_population(
      &mut self.population,
      self.generation,
      workers,
    )?;
    self
      .breeder
      .post_evaluation(&mut self.population, self.generation)?;

    let stats = GenerationStatistics::collect(
      self.generation,
      report.evaluations,
      &self.population,
    );
    stats.log();
    self.statistics.push(stats);
    if self.best_of_run.update(&self.population) {
      tracing::debug!(generation = self.generation, "new best of run");
    }

    let finish = if self.quit_on_ideal
      && self.evaluator.ideal_found(&self.population)
    {
      Some(Finish::IdealFound)
    } else if self.generation + 1 >= self.max_generations {
      Some(Finish::MaxGenerations)
    } else if self
      .terminator
      .as_mut()
      .is_some_and(|t| t.terminate(self.generation, &self.population))
    {
      Some(Finish::Terminated)
    } else {
      None
    };
    if let Some(finish) = finish {
      tracing::info!(generation = self.generation, ?finish, "run finished");
      self.finished = Some(finish);
      return Ok(Progress::Finished(finish));
    }

    self.population =
      self.breeder.breed(&self.population, self.generation, workers)?;
    self.generation += 1;
    Ok(Progress::Continue)
  }

  /// Runs generations until the run finishes or fails.
  pub fn run(mut self) -> Result<RunOutcome<G, F>> {
    self.setup()?;
    tracing::info!(
      seed = self.seed,
      threads = self.threads,
      subpops = self.population.len(),
      generations = self.max_generations,
      "run started"
    );
    loop {
      if let Progress::Finished(finish) = self.evolve()? {
        return Ok(RunOutcome {
          population: self.population,
          best_of_run: self.best_of_run.into_vec(),
          generations: self.generation + 1,
          statistics: self.statistics,
          finish,
        });
      }
    }
  }

  /// Current generation number, starting at `0`.
  pub fn generation(&self) -> usize {
    self.generation
  }

  /// The current population.
  pub fn population(&self) -> &Population<G, F> {
    &self.population
  }

  /// Statistics of every generation evaluated so far.
  pub fn statistics(&self) -> &[GenerationStatistics] {
    &self.statistics
  }

  /// The best individuals seen so far.
  pub fn best_of_run(&self) -> &BestOfRun<G, F> {
    &self.best_of_run
  }

  /// The fatal error that stopped the run, if any.
  pub fn first_error(&self) -> Option<&Error> {
    self.first_error.as_ref()
  }
}

impl<G: Genome, F: Fitness> fmt::Debug for EvolutionState<G, F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EvolutionState")
      .field("generation", &self.generation)
      .field("max_generations", &self.max_generations)
      .field("seed", &self.seed)
      .field("threads", &self.threads)
      .field("subpops", &self.population.len())
      .field("finished", &self.finished)
      .field("first_error", &self.first_error)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use rand::Rng;

  use super::*;
  use crate::{
    breeder::{nsga::Nsga2Breeder, SimpleBreeder},
    breeding::{pipelines::MutationPipeline, BreedingSource},
    error::ProblemError,
    evaluation::SimpleEvaluator,
    fitness::{
      pareto::{Direction, Nsga2Fitness},
      ScalarFitness,
    },
    genome::MutationParams,
    problem::{EvalContext, Problem},
    selection::{SelectionSource, Tournament},
    termination::GenerationTerminator,
  };

  type G = Vec<bool>;
  type F = ScalarFitness;

  fn onemax(g: &G) -> F {
    let ones = g.iter().filter(|&&b| b).count();
    let mut fitness = ScalarFitness::default();
    fitness.set(ones as f64, ones == g.len());
    fitness
  }

  fn mutating() -> Box<dyn BreedingSource<G, F>> {
    let select = Box::new(SelectionSource::new(Tournament::new(2)));
    let params = MutationParams {
      per_gene: 0.05,
      ..MutationParams::default()
    };
    Box::new(MutationPipeline::new(params, select))
  }

  fn state(
    seed: u64,
    threads: usize,
    generations: usize,
  ) -> EvolutionState<G, F> {
    let mut rng: EvoRng = rand::SeedableRng::seed_from_u64(seed);
    let subpop =
      Subpopulation::generate(20, |_| (0..32).map(|_| rng.gen()).collect())
        .unwrap();
    EvolutionState::builder()
      .population(Population::new(vec![subpop]))
      .evaluator(Box::new(SimpleEvaluator::new(onemax)))
      .breeder(Box::new(SimpleBreeder::new(vec![mutating()])))
      .max_generations(generations)
      .seed(seed)
      .threads(threads)
      .build()
  }

  fn genomes(outcome: &RunOutcome<G, F>) -> Vec<(G, f64)> {
    outcome.population[0]
      .individuals()
      .iter()
      .map(|ind| (ind.genome().clone(), ind.fitness.value()))
      .collect()
  }

  #[test]
  fn test_same_seed_same_run() {
    let a = state(7, 3, 15).run().unwrap();
    let b = state(7, 3, 15).run().unwrap();
    assert_eq!(genomes(&a), genomes(&b));
    assert_eq!(a.statistics, b.statistics);
  }

  #[test]
  fn test_runs_until_max_generations() {
    let outcome = state(1, 2, 4).run().unwrap();
    assert_eq!(outcome.finish, Finish::MaxGenerations);
    assert_eq!(outcome.generations, 4);
    assert_eq!(outcome.statistics.len(), 4);
    assert_eq!(outcome.statistics[0].evaluations, 20);
    assert!(outcome.population[0].individuals().iter().all(|i| i.evaluated));
    assert!(outcome.best_of_run[0].is_some());
  }

  #[test]
  fn test_best_of_run_never_worsens() {
    let outcome = state(3, 2, 10).run().unwrap();
    let best = outcome.best_of_run[0].as_ref().unwrap().fitness.value();
    let max = outcome
      .statistics
      .iter()
      .filter_map(|s| s.subpops[0].best)
      .fold(f64::MIN, f64::max);
    assert_eq!(best, max);
  }

  #[test]
  fn test_quits_on_ideal() {
    let subpop = Subpopulation::generate(4, |i| vec![i == 3; 8]).unwrap();
    let outcome = EvolutionState::builder()
      .population(Population::new(vec![subpop]))
      .evaluator(Box::new(SimpleEvaluator::new(onemax)))
      .breeder(Box::new(SimpleBreeder::new(vec![mutating()])))
      .max_generations(50)
      .build()
      .run()
      .unwrap();
    assert!(outcome.ideal_found());
    assert_eq!(outcome.generations, 1);
  }

  #[test]
  fn test_terminator_stops_run() {
    let mut state = state(5, 1, 100);
    state.terminator = Some(Box::new(GenerationTerminator(3)));
    state.quit_on_ideal = false;
    let outcome = state.run().unwrap();
    assert_eq!(outcome.finish, Finish::Terminated);
    assert_eq!(outcome.generations, 3);
  }

  // x^2 and (x - 2)^2, both minimized
  fn schaffer(seed: u64) -> RunOutcome<Vec<f64>, Nsga2Fitness> {
    let mut rng: EvoRng = rand::SeedableRng::seed_from_u64(seed);
    let subpop =
      Subpopulation::generate(12, |_| vec![rng.gen_range(-10.0..10.0)])
        .unwrap();
    let objectives = |g: &Vec<f64>| {
      let (x, y) = (g[0], g[0] - 2.0);
      Nsga2Fitness::new(vec![x * x, y * y], Direction::Minimize)
    };
    let params = MutationParams {
      per_gene: 1.0,
      sigma: 0.5,
      bounds: Some((-10.0, 10.0)),
    };
    let select = Box::new(SelectionSource::new(Tournament::new(2)));
    let mutate: Box<dyn BreedingSource<Vec<f64>, Nsga2Fitness>> =
      Box::new(MutationPipeline::new(params, select));
    EvolutionState::builder()
      .population(Population::new(vec![subpop]))
      .evaluator(Box::new(SimpleEvaluator::new(objectives)))
      .breeder(Box::new(Nsga2Breeder::new(vec![mutate])))
      .max_generations(8)
      .threads(3)
      .seed(seed)
      .build()
      .run()
      .unwrap()
  }

  #[test]
  fn test_nsga2_run_keeps_archive_size_and_is_reproducible() {
    let a = schaffer(13);
    assert_eq!(a.finish, Finish::MaxGenerations);
    assert_eq!(a.statistics.len(), 8);
    for stats in &a.statistics {
      assert_eq!(stats.subpops[0].size, 12);
      assert!(stats.subpops[0].front_size.is_some_and(|n| n >= 1));
    }
    assert_eq!(a.population[0].len(), 12);

    let ranked = |outcome: &RunOutcome<Vec<f64>, Nsga2Fitness>| {
      outcome.population[0]
        .individuals()
        .iter()
        .map(|ind| {
          let fitness = &ind.fitness;
          (ind.genome().clone(), fitness.rank(), fitness.sparsity())
        })
        .collect::<Vec<_>>()
    };
    let first = ranked(&a);
    assert!(first.iter().all(|(_, rank, _)| rank.is_some()));
    assert_eq!(first, ranked(&schaffer(13)));
  }

  #[derive(Clone)]
  struct FailsAt(usize);

  impl Problem<G, F> for FailsAt {
    fn evaluate(
      &mut self,
      individual: &mut Individual<G, F>,
      _: usize,
      ctx: &mut EvalContext<'_>,
    ) -> std::result::Result<(), ProblemError> {
      if ctx.generation == self.0 {
        return Err(ProblemError::new("boom"));
      }
      individual.fitness = onemax(individual.genome());
      individual.evaluated = true;
      Ok(())
    }

    fn box_clone(&self) -> Box<dyn Problem<G, F>> {
      Box::new(self.clone())
    }
  }

  #[test]
  fn test_first_fatal_error_is_kept() {
    let mut state = state(2, 2, 10);
    state.evaluator = Box::new(SimpleEvaluator::new(FailsAt(1)));
    state.quit_on_ideal = false;
    assert_eq!(state.evolve(), Ok(Progress::Continue));
    let error = state.evolve().unwrap_err();
    assert!(matches!(error, Error::Problem { .. }));
    assert_eq!(state.first_error(), Some(&error));
    assert_eq!(state.evolve(), Err(error));
    assert_eq!(state.generation(), 1);
  }

  #[test]
  fn test_setup_reports_every_error() {
    let subpop = Subpopulation::generate(4, |_| vec![false; 4]).unwrap();
    let result = EvolutionState::builder()
      .population(Population::new(vec![subpop]))
      .evaluator(Box::new(SimpleEvaluator::new(onemax)))
      .breeder(Box::new(
        SimpleBreeder::new(vec![mutating()]).with_elites(vec![9]),
      ))
      .max_generations(0)
      .threads(0)
      .build()
      .run();
    let Err(Error::Setup(errors)) = result else {
      panic!("expected setup errors");
    };
    let keys: Vec<_> =
      errors.errors().iter().map(|e| e.key.as_str().to_owned()).collect();
    assert_eq!(keys, ["generations", "breed.elite.0", "threads"]);
  }

  fn registry() -> Registry<G, F> {
    fn onemax_problem(
      _: &dyn Parameters,
      _: &Key,
      _: &mut SetupErrors,
    ) -> Option<Box<dyn Problem<G, F>>> {
      Some(Box::new(onemax))
    }
    let mut registry = Registry::standard();
    registry.register_problem("onemax", onemax_problem);
    registry
  }

  const CONFIG: &str = "
    seed = 11
    threads = 2
    generations = 5
    quit-on-run-complete = false
    pop.subpops = 1
    pop.subpop.0.size = 16
    pop.subpop.0.pipe = mutation
    pop.subpop.0.pipe.per-gene = 0.1
    pop.subpop.0.pipe.source.0 = tournament
    pop.subpop.0.pipe.source.0.size = 2
    breed.elite.0 = 1
    eval.problem = onemax
  ";

  #[test]
  fn test_from_parameters() {
    let params: ParameterDatabase = CONFIG.parse().unwrap();
    let run = || {
      EvolutionState::from_parameters(&params, &registry(), |_, rng| {
        (0..16).map(|_| rng.gen_bool(0.5)).collect()
      })
      .unwrap()
      .run()
      .unwrap()
    };
    let outcome = run();
    assert_eq!(outcome.generations, 5);
    assert_eq!(outcome.population[0].len(), 16);
    assert_eq!(genomes(&outcome), genomes(&run()));
  }

  #[test]
  fn test_from_parameters_reports_every_error() {
    let params: ParameterDatabase = CONFIG.parse().unwrap();
    let params = params
      .with("threads", 0)
      .with("pop.subpop.0.size", "many")
      .with("pop.subpop.0.pipe", "nope")
      .with("eval.problem", "missing");
    let result =
      EvolutionState::from_parameters(&params, &registry(), |_, _| vec![]);
    let Err(Error::Setup(errors)) = result else {
      panic!("expected setup errors");
    };
    let keys: Vec<_> =
      errors.errors().iter().map(|e| e.key.as_str().to_owned()).collect();
    assert_eq!(
      keys,
      ["threads", "pop.subpop.0.size", "pop.subpop.0.pipe", "eval.problem"]
    );
  }
}
