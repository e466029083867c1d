//! Competitive coevolution on an intransitive numbers game.
//!
//! Every genome is a point in the plane. When two points meet, they are
//! compared on the axis where they are closest and the larger value wins, so
//! there is no single best strategy. A shuffled single elimination
//! tournament decides who gets to breed.

use evobreed::{
  breeder::SimpleBreeder,
  breeding::{pipelines::MutationPipeline, BreedingSource},
  error::ProblemError,
  evaluation::coevolution::{CompetitionStyle, CompetitiveEvaluator},
  fitness::{Fitness, ScalarFitness},
  genome::MutationParams,
  individual::Individual,
  population::{Population, Subpopulation},
  problem::{EvalContext, GroupedProblem},
  selection::{SelectionSource, Tournament},
  state::EvolutionState,
};
use rand::{Rng, SeedableRng};

type Genome = Vec<i64>;
type Fit = ScalarFitness;

#[derive(Clone, Copy, Debug)]
struct NumbersGame;

impl GroupedProblem<Genome, Fit> for NumbersGame {
  fn evaluate_group(
    &mut self,
    group: &[&Individual<Genome, Fit>],
    _subpops: &[usize],
    _update: &[bool],
    _ctx: &mut EvalContext<'_>,
  ) -> Result<Vec<f64>, ProblemError> {
    let [a, b] = group else {
      return Err(ProblemError::new("the game is played by two"));
    };
    let (a, b) = (a.genome(), b.genome());
    let closest = (0..a.len())
      .min_by_key(|&i| (a[i] - b[i]).abs())
      .ok_or_else(|| ProblemError::new("empty genome"))?;
    Ok(match a[closest].cmp(&b[closest]) {
      std::cmp::Ordering::Greater => vec![1.0, 0.0],
      std::cmp::Ordering::Less => vec![0.0, 1.0],
      std::cmp::Ordering::Equal => vec![0.5, 0.5],
    })
  }

  /// The fitness is the share of won trials.
  fn postprocess(
    &mut self,
    population: &mut Population<Genome, Fit>,
    assess: &[bool],
  ) -> Result<(), ProblemError> {
    for (subpop, _) in population
      .subpops_mut()
      .iter_mut()
      .zip(assess)
      .filter(|(_, assess)| **assess)
    {
      for ind in subpop.individuals_mut() {
        let mean = ind.fitness.trials().mean().unwrap_or(0.0);
        ind.fitness.set(mean, false);
        ind.evaluated = true;
      }
    }
    Ok(())
  }

  fn box_clone(&self) -> Box<dyn GroupedProblem<Genome, Fit>> {
    Box::new(*self)
  }
}

fn main() {
  tracing_subscriber::fmt::init();

  let mut rng = rand::rngs::StdRng::seed_from_u64(7);
  let subpop = Subpopulation::generate(64, |_| {
    vec![rng.gen_range(0..10), rng.gen_range(0..10)]
  })
  .unwrap();

  // `±1` steps on one of the axes on average
  let params = MutationParams {
    per_gene: 0.5,
    ..MutationParams::default()
  };
  let select = Box::new(SelectionSource::new(Tournament::new(2)));
  let mutate: Box<dyn BreedingSource<Genome, Fit>> =
    Box::new(MutationPipeline::new(params, select));

  let outcome = EvolutionState::builder()
    .population(Population::new(vec![subpop]))
    .evaluator(Box::new(CompetitiveEvaluator::new(
      NumbersGame,
      CompetitionStyle::SingleElimination,
    )))
    .breeder(Box::new(SimpleBreeder::new(vec![mutate])))
    .max_generations(50)
    .threads(4)
    .seed(7)
    .quit_on_ideal(false)
    .build()
    .run()
    .unwrap();

  for stats in outcome.statistics.iter().step_by(10) {
    println!(
      "generation {:>3}: mean share of wins {:.3}",
      stats.generation,
      stats.subpops[0].mean.unwrap_or_default(),
    );
  }
  let best = outcome.best_of_run[0].as_ref().unwrap();
  println!("best of run: {:?}", best.genome());
}
