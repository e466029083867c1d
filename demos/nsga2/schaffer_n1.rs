//! Schaffer's Problem No.1 solution using NSGA-II.

use std::{fs::File, io::Write, path::Path};

use evobreed::{
  breeder::nsga::Nsga2Breeder,
  breeding::{pipelines::MutationPipeline, BreedingSource},
  evaluation::SimpleEvaluator,
  fitness::pareto::{Direction, Nsga2Fitness, ParetoFitness},
  genome::MutationParams,
  population::{Population, Subpopulation},
  selection::{SelectionSource, Tournament},
  state::EvolutionState,
};
use rand::{seq::IteratorRandom, Rng, SeedableRng};

type Genome = Vec<f64>;

fn main() {
  tracing_subscriber::fmt::init();

  // initial solutions lie between -100 and 100
  let mut rng = rand::rngs::StdRng::seed_from_u64(1);
  let subpop =
    Subpopulation::generate(100, |_| vec![rng.gen_range(-100.0..100.0)])
      .unwrap();
  // objective functions `f1(x) = x^2` and `f2(x) = (x - 2)^2`, minimized
  let test = |g: &Genome| {
    let x = g[0];
    Nsga2Fitness::new(
      vec![x.powf(2.0), (x - 2.0).powf(2.0)],
      Direction::Minimize,
    )
  };
  // gaussian steps on tournament winners; the tournament compares ranks and
  // then sparsity
  let params = MutationParams {
    per_gene: 1.0,
    sigma: 0.5,
    bounds: Some((-100.0, 100.0)),
  };
  let select = Box::new(SelectionSource::new(Tournament::new(2)));
  let mutate: Box<dyn BreedingSource<Genome, Nsga2Fitness>> =
    Box::new(MutationPipeline::new(params, select));

  let outcome = EvolutionState::builder()
    .population(Population::new(vec![subpop]))
    .evaluator(Box::new(SimpleEvaluator::new(test)))
    .breeder(Box::new(Nsga2Breeder::new(vec![mutate])))
    .max_generations(100)
    .threads(4)
    .seed(1)
    .build()
    .run()
    .unwrap();

  // the first front of the final archive
  let front = outcome.population[0]
    .individuals()
    .iter()
    .filter(|ind| ind.fitness.rank() == Some(0))
    .collect::<Vec<_>>();

  // write the front to file in demos/nsga2/schaffer_n1.csv
  let _ = File::create(Path::new(file!()).with_file_name("schaffer_n1.csv"))
    .unwrap()
    .write_all(
      front
        .iter()
        .map(|ind| {
          let objectives = ind.fitness.objectives();
          format!("{} {}", objectives[0], objectives[1])
        })
        .collect::<Vec<_>>()
        .join("\n")
        .as_bytes(),
    );

  // print 10 random solutions of the front
  println!("{} solutions on the first front", front.len());
  for ind in front.into_iter().choose_multiple(&mut rng, 10) {
    println!("{:.4}", ind.genome()[0]);
  }
  println!("  ...  ");
}
