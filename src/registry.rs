//! Name to constructor maps for everything a run builds from parameters.
//!
//! Breeding trees are read recursively. The value stored at a tree key names
//! the node (`pop.subpop.0.pipe = mutation`); its children live under
//! `<key>.source.<i>`, and their number is read from `<key>.num-sources`,
//! defaulting to what the node needs. A child whose value is `same` is a
//! clone of the child before it.
//!
//! # Examples
//! ```
//! use evobreed::{
//!   config::{Key, ParameterDatabase},
//!   error::SetupErrors,
//!   fitness::ScalarFitness,
//!   registry::Registry,
//! };
//!
//! let params: ParameterDatabase = "
//!   pipe = crossover
//!   pipe.source.0 = tournament
//!   pipe.source.0.size = 3
//!   pipe.source.1 = same
//! "
//! .parse()
//! .unwrap();
//! let registry = Registry::<Vec<bool>, ScalarFitness>::standard();
//! let mut errors = SetupErrors::new();
//! let pipe = registry.build_source(&params, &Key::new("pipe"), &mut errors);
//! assert!(errors.is_empty());
//! assert_eq!(pipe.unwrap().sources().len(), 2);
//! ```

use std::collections::BTreeMap;

use crate::{
  breeder::{nsga::Nsga2Breeder, Breed, SimpleBreeder},
  breeding::{
    pipelines::{
      CrossoverPipeline,
      MultiBreedingPipeline,
      MutationPipeline,
      ReproductionPipeline,
      TruncationPipeline,
    },
    BreedingSource,
  },
  config::{Key, Parameters},
  error::SetupErrors,
  evaluation::{
    coevolution::{CompetitionStyle, CompetitiveEvaluator, CooperativeEvaluator},
    Evaluate,
    SimpleEvaluator,
  },
  fitness::{pareto::RankedFitness, Fitness},
  genome::{Genome, Linear, Mutate},
  problem::{GroupedProblem, Problem},
  selection::{
    Best,
    FitnessProportionate,
    SelectionSource,
    Tournament,
    Uniform,
  },
};

/// Builds a breeding source stored at a key. Child sources are built
/// through the registry that is passed in.
pub type SourceConstructor<G, F> = fn(
  &Registry<G, F>,
  &dyn Parameters,
  &Key,
  &mut SetupErrors,
) -> Option<Box<dyn BreedingSource<G, F>>>;

/// Builds a problem from the parameters under a key.
pub type ProblemConstructor<G, F> =
  fn(&dyn Parameters, &Key, &mut SetupErrors) -> Option<Box<dyn Problem<G, F>>>;

/// Builds a grouped problem from the parameters under a key.
pub type GroupedProblemConstructor<G, F> = fn(
  &dyn Parameters,
  &Key,
  &mut SetupErrors,
) -> Option<Box<dyn GroupedProblem<G, F>>>;

/// Builds a breeder from the parameters under a key, given one breeding
/// tree per subpopulation.
pub type BreederConstructor<G, F> = fn(
  &dyn Parameters,
  &Key,
  Vec<Box<dyn BreedingSource<G, F>>>,
  usize,
  &mut SetupErrors,
) -> Option<Box<dyn Breed<G, F>>>;

/// Maps configuration names to constructors.
pub struct Registry<G: Genome, F: Fitness> {
  sources: BTreeMap<&'static str, SourceConstructor<G, F>>,
  problems: BTreeMap<&'static str, ProblemConstructor<G, F>>,
  grouped_problems: BTreeMap<&'static str, GroupedProblemConstructor<G, F>>,
  breeders: BTreeMap<&'static str, BreederConstructor<G, F>>,
}

impl<G: Genome, F: Fitness> Default for Registry<G, F> {
  fn default() -> Self {
    Self {
      sources: BTreeMap::new(),
      problems: BTreeMap::new(),
      grouped_problems: BTreeMap::new(),
      breeders: BTreeMap::new(),
    }
  }
}

impl<G: Genome, F: Fitness> std::fmt::Debug for Registry<G, F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("sources", &self.sources.keys().collect::<Vec<_>>())
      .field("problems", &self.problems.keys().collect::<Vec<_>>())
      .field(
        "grouped_problems",
        &self.grouped_problems.keys().collect::<Vec<_>>(),
      )
      .field("breeders", &self.breeders.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl<G: Genome, F: Fitness> Registry<G, F> {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with every selection method, the pipelines that work on
  /// any genome (`reproduction`, `truncation` and `multi`) and the `simple`
  /// breeder.
  pub fn generic() -> Self {
    let mut registry = Self::new();
    registry
      .register_breeder("simple", build_simple_breeder)
      .register_source("tournament", build_tournament)
      .register_source("fitness-proportionate", build_fitness_proportionate)
      .register_source("best", build_best)
      .register_source("uniform", build_uniform)
      .register_source("reproduction", build_reproduction)
      .register_source("truncation", build_truncation)
      .register_source("multi", build_multi);
    registry
  }

  /// Registers a breeding source, replacing any previous one of that name.
  pub fn register_source(
    &mut self,
    name: &'static str,
    constructor: SourceConstructor<G, F>,
  ) -> &mut Self {
    self.sources.insert(name, constructor);
    self
  }

  /// Registers a problem.
  pub fn register_problem(
    &mut self,
    name: &'static str,
    constructor: ProblemConstructor<G, F>,
  ) -> &mut Self {
    self.problems.insert(name, constructor);
    self
  }

  /// Registers a grouped problem.
  pub fn register_grouped_problem(
    &mut self,
    name: &'static str,
    constructor: GroupedProblemConstructor<G, F>,
  ) -> &mut Self {
    self.grouped_problems.insert(name, constructor);
    self
  }

  /// Registers a breeder.
  pub fn register_breeder(
    &mut self,
    name: &'static str,
    constructor: BreederConstructor<G, F>,
  ) -> &mut Self {
    self.breeders.insert(name, constructor);
    self
  }

  /// Registered breeding source names.
  pub fn source_names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.sources.keys().copied()
  }

  /// Builds the breeding tree rooted at `key`.
  pub fn build_source(
    &self,
    params: &dyn Parameters,
    key: &Key,
    errors: &mut SetupErrors,
  ) -> Option<Box<dyn BreedingSource<G, F>>> {
    let name = errors.collect(params.get_string(key, None))?;
    match self.sources.get(name.as_str()) {
      Some(constructor) => constructor(self, params, key, errors),
      None => {
        errors.report(key, format!("unknown breeding source `{name}`"));
        None
      }
    }
  }

  /// Builds the children of the node at `key`. Reads `num-sources`,
  /// falling back to `count`.
  pub fn build_sources(
    &self,
    params: &dyn Parameters,
    key: &Key,
    count: usize,
    errors: &mut SetupErrors,
  ) -> Option<Sources<G, F>> {
    let count = errors.collect(params.get_usize_or(
      &key.push("num-sources"),
      None,
      count,
    ))?;
    let mut sources: Sources<G, F> = Vec::with_capacity(count);
    let mut ok = true;
    for i in 0..count {
      let child = key.push("source").push(i);
      if params.lookup(&child, None) == Some("same") {
        match sources.last() {
          Some(previous) => sources.push(previous.box_clone()),
          None if ok => {
            errors.report(&child, "`same` needs a preceding source");
            ok = false;
          }
          None => {}
        }
        continue;
      }
      match self.build_source(params, &child, errors) {
        Some(source) => sources.push(source),
        None => ok = false,
      }
    }
    ok.then_some(sources)
  }

  /// Builds the problem named at `key`.
  pub fn build_problem(
    &self,
    params: &dyn Parameters,
    key: &Key,
    errors: &mut SetupErrors,
  ) -> Option<Box<dyn Problem<G, F>>> {
    let name = errors.collect(params.get_string(key, None))?;
    match self.problems.get(name.as_str()) {
      Some(constructor) => constructor(params, key, errors),
      None => {
        errors.report(key, format!("unknown problem `{name}`"));
        None
      }
    }
  }

  /// Builds the grouped problem named at `key`.
  pub fn build_grouped_problem(
    &self,
    params: &dyn Parameters,
    key: &Key,
    errors: &mut SetupErrors,
  ) -> Option<Box<dyn GroupedProblem<G, F>>> {
    let name = errors.collect(params.get_string(key, None))?;
    match self.grouped_problems.get(name.as_str()) {
      Some(constructor) => constructor(params, key, errors),
      None => {
        errors.report(key, format!("unknown grouped problem `{name}`"));
        None
      }
    }
  }

  /// Builds the breeder named at `key` (`simple` if unset) around
  /// `pipelines`.
  pub fn build_breeder(
    &self,
    params: &dyn Parameters,
    key: &Key,
    pipelines: Vec<Box<dyn BreedingSource<G, F>>>,
    subpops: usize,
    errors: &mut SetupErrors,
  ) -> Option<Box<dyn Breed<G, F>>> {
    let name = params.lookup(key, None).unwrap_or("simple");
    match self.breeders.get(name) {
      Some(constructor) => constructor(params, key, pipelines, subpops, errors),
      None => {
        errors.report(key, format!("unknown breeder `{name}`"));
        None
      }
    }
  }

  /// Builds the evaluator configured at `base`: `simple` (the default),
  /// `competitive` or `cooperative`, with its problem at `base.problem`.
  ///
  /// `competitive` reads `style` (`round-robin`, `single-elimination`,
  /// `random`) and `num-opponents`; `cooperative` reads `num-elites` and
  /// `num-random`.
  pub fn build_evaluator(
    &self,
    params: &dyn Parameters,
    base: &Key,
    errors: &mut SetupErrors,
  ) -> Option<Box<dyn Evaluate<G, F>>> {
    let kind = params.lookup(base, None).unwrap_or("simple");
    let problem = base.push("problem");
    match kind {
      "simple" => {
        let problem = self.build_problem(params, &problem, errors)?;
        Some(Box::new(SimpleEvaluator::from_boxed(problem)))
      }
      "competitive" => {
        let opponents = errors.collect(params.get_usize_or(
          &base.push("num-opponents"),
          None,
          1,
        ));
        let name = params
          .lookup(&base.push("style"), None)
          .unwrap_or("round-robin");
        let style = CompetitionStyle::from_name(name, opponents.unwrap_or(1));
        if style.is_none() {
          errors.report(
            base.push("style"),
            format!("unknown competition style `{name}`"),
          );
        }
        let problem = self.build_grouped_problem(params, &problem, errors);
        Some(Box::new(CompetitiveEvaluator::from_boxed(problem?, style?)))
      }
      "cooperative" => {
        let elites = errors.collect(params.get_usize_or(
          &base.push("num-elites"),
          None,
          1,
        ));
        let random = errors.collect(params.get_usize_or(
          &base.push("num-random"),
          None,
          0,
        ));
        let problem = self.build_grouped_problem(params, &problem, errors);
        Some(Box::new(CooperativeEvaluator::from_boxed(
          problem?, elites?, random?,
        )))
      }
      other => {
        errors.report(base, format!("unknown evaluator `{other}`"));
        None
      }
    }
  }
}

impl<G: Linear + Mutate, F: Fitness> Registry<G, F> {
  /// [`generic`](Self::generic) plus `crossover` and `mutation`.
  pub fn standard() -> Self {
    let mut registry = Self::generic();
    registry
      .register_source("crossover", build_crossover)
      .register_source("mutation", build_mutation);
    registry
  }
}

impl<G: Genome, F: RankedFitness> Registry<G, F> {
  /// Registers the `nsga2` breeder.
  pub fn register_nsga2(&mut self) -> &mut Self {
    self.register_breeder("nsga2", build_nsga2_breeder)
  }
}

type Sources<G, F> = Vec<Box<dyn BreedingSource<G, F>>>;
type Built<G, F> = Option<Box<dyn BreedingSource<G, F>>>;

fn selection<G: Genome, F: Fitness>(
  method: Option<impl crate::selection::SelectionMethod>,
) -> Built<G, F> {
  Some(Box::new(SelectionSource::new(method?)))
}

fn build_tournament<G: Genome, F: Fitness>(
  _: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  selection(Tournament::from_parameters(params, key, errors))
}

fn build_fitness_proportionate<G: Genome, F: Fitness>(
  _: &Registry<G, F>,
  _: &dyn Parameters,
  _: &Key,
  _: &mut SetupErrors,
) -> Built<G, F> {
  selection(Some(FitnessProportionate::new()))
}

fn build_best<G: Genome, F: Fitness>(
  _: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  selection(Best::from_parameters(params, key, errors))
}

fn build_uniform<G: Genome, F: Fitness>(
  _: &Registry<G, F>,
  _: &dyn Parameters,
  _: &Key,
  _: &mut SetupErrors,
) -> Built<G, F> {
  selection(Some(Uniform))
}

fn build_simple_breeder<G: Genome, F: Fitness>(
  params: &dyn Parameters,
  key: &Key,
  pipelines: Sources<G, F>,
  subpops: usize,
  errors: &mut SetupErrors,
) -> Option<Box<dyn Breed<G, F>>> {
  let breeder =
    SimpleBreeder::from_parameters(params, key, pipelines, subpops, errors)?;
  Some(Box::new(breeder))
}

fn build_nsga2_breeder<G: Genome, F: RankedFitness>(
  params: &dyn Parameters,
  key: &Key,
  pipelines: Sources<G, F>,
  subpops: usize,
  errors: &mut SetupErrors,
) -> Option<Box<dyn Breed<G, F>>> {
  let breeder =
    Nsga2Breeder::from_parameters(params, key, pipelines, subpops, errors)?;
  Some(Box::new(breeder))
}

/// Builds the children of `key` first, then the node itself, so that the
/// errors of both are reported.
fn with_sources<G, F, P>(
  registry: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  count: usize,
  errors: &mut SetupErrors,
  build: impl FnOnce(Sources<G, F>, &mut SetupErrors) -> Option<P>,
) -> Built<G, F>
where
  G: Genome,
  F: Fitness,
  P: BreedingSource<G, F> + 'static,
{
  let sources = registry.build_sources(params, key, count, errors);
  let complete = sources.is_some();
  let pipe = build(sources.unwrap_or_default(), errors)?;
  complete.then(|| Box::new(pipe) as Box<dyn BreedingSource<G, F>>)
}

fn build_crossover<G: Linear, F: Fitness>(
  registry: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  with_sources(registry, params, key, 2, errors, |sources, errors| {
    CrossoverPipeline::from_parameters(params, key, sources, errors)
  })
}

fn build_mutation<G: Mutate, F: Fitness>(
  registry: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  with_sources(registry, params, key, 1, errors, |sources, errors| {
    MutationPipeline::from_parameters(params, key, sources, errors)
  })
}

fn build_reproduction<G: Genome, F: Fitness>(
  registry: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  with_sources(registry, params, key, 1, errors, |sources, errors| {
    ReproductionPipeline::from_parameters(params, key, sources, errors)
  })
}

fn build_truncation<G: Genome, F: Fitness>(
  registry: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  with_sources(registry, params, key, 1, errors, |sources, errors| {
    TruncationPipeline::from_parameters(params, key, sources, errors)
  })
}

fn build_multi<G: Genome, F: Fitness>(
  registry: &Registry<G, F>,
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Built<G, F> {
  with_sources(registry, params, key, 1, errors, |sources, errors| {
    MultiBreedingPipeline::from_parameters(params, key, sources, errors)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    breeding::validate,
    config::ParameterDatabase,
    fitness::ScalarFitness,
    individual::Individual,
  };

  type G = Vec<bool>;
  type F = ScalarFitness;

  fn build(
    text: &str,
  ) -> (Option<Box<dyn BreedingSource<G, F>>>, SetupErrors) {
    let params: ParameterDatabase = text.parse().unwrap();
    let mut errors = SetupErrors::new();
    let source = Registry::<G, F>::standard().build_source(
      &params,
      &Key::new("pipe"),
      &mut errors,
    );
    (source, errors)
  }

  #[test]
  fn test_standard_names() {
    let registry = Registry::<G, F>::standard();
    let names: Vec<_> = registry.source_names().collect();
    assert_eq!(
      names,
      [
        "best",
        "crossover",
        "fitness-proportionate",
        "multi",
        "mutation",
        "reproduction",
        "tournament",
        "truncation",
        "uniform",
      ]
    );
  }

  #[test]
  fn test_nested_tree() {
    let (source, errors) = build(
      "
      pipe = mutation
      pipe.per-gene = 0.2
      pipe.source.0 = crossover
      pipe.source.0.type = two
      pipe.source.0.source.0 = tournament
      pipe.source.0.source.0.size = 2
      pipe.source.0.source.1 = best
      pipe.source.0.source.1.n = 4
      ",
    );
    assert!(errors.is_empty(), "{errors}");
    let source = source.unwrap();
    assert_eq!(source.name(), "mutation");
    let crossover = &source.sources()[0];
    assert_eq!(crossover.name(), "crossover");
    assert_eq!(crossover.sources()[1].name(), "best");
  }

  #[test]
  fn test_same_clones_previous_source() {
    let (source, errors) = build(
      "
      pipe = multi
      pipe.num-sources = 3
      pipe.source.0 = uniform
      pipe.source.1 = same
      pipe.source.2 = same
      ",
    );
    assert!(errors.is_empty(), "{errors}");
    let source = source.unwrap();
    assert!(source.sources().iter().all(|s| s.name() == "uniform"));
    assert_eq!(source.sources().len(), 3);
  }

  #[test]
  fn test_one_source_crossover_fails_validation() {
    let (source, errors) = build(
      "
      pipe = crossover
      pipe.num-sources = 1
      pipe.source.0 = tournament
      pipe.source.0.size = 2
      ",
    );
    assert!(errors.is_empty(), "{errors}");
    let mut errors = SetupErrors::new();
    validate(source.unwrap().as_ref(), &Key::new("pipe"), &mut errors);
    assert_eq!(errors.len(), 1);
    assert!(errors.errors()[0].message.contains("exactly 2"));
  }

  #[test]
  fn test_every_error_is_reported() {
    let (source, errors) = build(
      "
      pipe = crossover
      pipe.likelihood = 3
      pipe.source.0 = roulette
      pipe.source.1 = same
      ",
    );
    assert!(source.is_none());
    let keys: Vec<_> =
      errors.errors().iter().map(|e| e.key.as_str().to_owned()).collect();
    assert_eq!(keys, ["pipe.source.0", "pipe.likelihood"]);
  }

  #[test]
  fn test_problems_by_name() {
    fn onemax(
      _: &dyn Parameters,
      _: &Key,
      _: &mut SetupErrors,
    ) -> Option<Box<dyn Problem<G, F>>> {
      let problem = |g: &G| {
        ScalarFitness::new(g.iter().filter(|&&b| b).count() as f64)
      };
      Some(Box::new(problem))
    }

    let mut registry = Registry::<G, F>::standard();
    registry.register_problem("onemax", onemax);
    let params: ParameterDatabase =
      "eval.problem = onemax\nother.problem = nope".parse().unwrap();
    let mut errors = SetupErrors::new();
    let evaluator =
      registry.build_evaluator(&params, &Key::new("eval"), &mut errors);
    assert!(evaluator.is_some());
    assert!(errors.is_empty());

    assert!(registry
      .build_problem(&params, &Key::new("other.problem"), &mut errors)
      .is_none());
    assert_eq!(errors.errors()[0].message, "unknown problem `nope`");

    let mut problem = registry
      .build_problem(&params, &Key::new("eval.problem"), &mut errors)
      .unwrap();
    let mut ind = Individual::new(vec![true, false, true]);
    let mut rng = rand::SeedableRng::seed_from_u64(0);
    let mut ctx = crate::problem::EvalContext {
      thread: 0,
      generation: 0,
      rng: &mut rng,
    };
    problem.evaluate(&mut ind, 0, &mut ctx).unwrap();
    assert_eq!(ind.fitness.value(), 2.0);
  }

  #[test]
  fn test_breeders_by_name() {
    use crate::fitness::pareto::Nsga2Fitness;

    type Reals = Vec<f64>;
    let pipes = || -> Vec<Box<dyn BreedingSource<Reals, Nsga2Fitness>>> {
      vec![Box::new(SelectionSource::new(Uniform))]
    };
    let params: ParameterDatabase =
      "a = nsga2\nb = nsga2\nb.elite.0 = 1\nc = steady".parse().unwrap();
    let mut registry = Registry::<Reals, Nsga2Fitness>::standard();
    let mut errors = SetupErrors::new();
    let mut build = |registry: &Registry<_, _>, key: &str| {
      registry.build_breeder(&params, &Key::new(key), pipes(), 1, &mut errors)
    };

    assert!(build(&registry, "a").is_none());
    registry.register_nsga2();
    assert!(build(&registry, "a").is_some());
    assert!(build(&registry, "b").is_none());
    assert!(build(&registry, "c").is_none());
    assert!(build(&registry, "unset").is_some());
    let keys: Vec<_> =
      errors.errors().iter().map(|e| e.key.as_str().to_owned()).collect();
    assert_eq!(keys, ["a", "b.elite.0", "c"]);
  }
}
