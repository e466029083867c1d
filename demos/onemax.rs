//! OneMax: evolve bit strings towards all ones, configured from parameters.

use evobreed::{
  config::{Key, ParameterDatabase, Parameters},
  error::SetupErrors,
  fitness::{Fitness, ScalarFitness},
  problem::Problem,
  registry::Registry,
  state::EvolutionState,
};
use rand::Rng;

type Genome = Vec<bool>;

const PARAMETERS: &str = "
  seed = 4357
  threads = 4
  generations = 200
  pop.subpops = 1
  pop.subpop.0.size = 100
  # mutate the children of a two-point crossover between tournament winners
  pop.subpop.0.pipe = mutation
  pop.subpop.0.pipe.per-gene = 0.01
  pop.subpop.0.pipe.source.0 = crossover
  pop.subpop.0.pipe.source.0.type = two
  pop.subpop.0.pipe.source.0.source.0 = tournament
  pop.subpop.0.pipe.source.0.source.0.size = 2
  pop.subpop.0.pipe.source.0.source.1 = same
  breed.elite.0 = 2
  eval.problem = onemax
  eval.problem.length = 100
";

/// Reads the genome length so that strings of ones can be reported ideal.
fn onemax(
  params: &dyn Parameters,
  key: &Key,
  errors: &mut SetupErrors,
) -> Option<Box<dyn Problem<Genome, ScalarFitness>>> {
  let length = errors.collect(params.get_int(&key.push("length"), None, 1))?;
  let length = length as usize;
  let problem = move |g: &Genome| {
    let ones = g.iter().filter(|b| **b).count();
    let mut fitness = ScalarFitness::default();
    fitness.set(ones as f64, ones == length);
    fitness
  };
  Some(Box::new(problem))
}

fn main() {
  tracing_subscriber::fmt::init();

  let params: ParameterDatabase = PARAMETERS.parse().unwrap();
  let mut registry = Registry::standard();
  registry.register_problem("onemax", onemax);

  // random initial bit strings of length 100
  let state = EvolutionState::from_parameters(&params, &registry, |_, rng| {
    (0..100).map(|_| rng.gen_bool(0.5)).collect()
  })
  .unwrap_or_else(|e| panic!("{e}"));

  let outcome = state.run().unwrap();
  let best = outcome.best_of_run[0].as_ref().unwrap();
  println!(
    "best after {} generations: {} ones (ideal: {})",
    outcome.generations,
    best.fitness.value(),
    outcome.ideal_found(),
  );
}
