//! The fitness evaluation contracts implemented outside the engine.
//!
//! A [`Problem`] evaluates one individual at a time. Every worker thread owns
//! its own clone (see [`Problem::box_clone`]), so a problem may keep mutable
//! scratch state between evaluations.
//!
//! A [`GroupedProblem`] evaluates individuals jointly, as coevolution needs.
//! A generation of grouped evaluation is bracketed by
//! [`preprocess`](GroupedProblem::preprocess), which resets trial
//! accumulators, and [`postprocess`](GroupedProblem::postprocess), which turns
//! accumulated trials into final fitnesses. In between,
//! [`evaluate_group`](GroupedProblem::evaluate_group) only reports trial
//! scores; it cannot touch the individuals.
//!
//! # Examples
//! Any cloneable closure mapping a genome to a fitness is a [`Problem`]:
//! ```
//! use evobreed::{fitness::ScalarFitness, problem::Problem};
//!
//! let onemax = |g: &Vec<bool>| {
//!   ScalarFitness::new(g.iter().filter(|b| **b).count() as f64)
//! };
//! let boxed: Box<dyn Problem<Vec<bool>, ScalarFitness>> = Box::new(onemax);
//! # let _ = boxed;
//! ```

use crate::{
  config::{Key, Parameters},
  error::{ProblemError, SetupErrors},
  execution::EvoRng,
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::Population,
};

/// Per-call information handed to problems.
#[derive(Debug)]
pub struct EvalContext<'a> {
  /// Index of the worker thread running the evaluation.
  pub thread: usize,
  /// Current generation.
  pub generation: usize,
  /// The worker's random number stream.
  pub rng: &'a mut EvoRng,
}

/// Evaluates single individuals.
pub trait Problem<G: Genome, F: Fitness>: Send {
  /// Reads the problem's parameters under `base`. Errors are pushed into
  /// `errors` so that setup can report all of them at once.
  fn setup(
    &mut self,
    _params: &dyn Parameters,
    _base: &Key,
    _errors: &mut SetupErrors,
  ) {
  }

  /// Evaluates `individual`, which belongs to subpopulation `subpop`.
  ///
  /// Must assign `individual.fitness` and set `individual.evaluated`.
  fn evaluate(
    &mut self,
    individual: &mut Individual<G, F>,
    subpop: usize,
    ctx: &mut EvalContext<'_>,
  ) -> Result<(), ProblemError>;

  /// Returns an independent copy for another worker thread.
  fn box_clone(&self) -> Box<dyn Problem<G, F>>;
}

impl<G, F, C> Problem<G, F> for C
where
  G: Genome,
  F: Fitness,
  C: Fn(&G) -> F + Clone + Send + 'static,
{
  fn evaluate(
    &mut self,
    individual: &mut Individual<G, F>,
    _subpop: usize,
    _ctx: &mut EvalContext<'_>,
  ) -> Result<(), ProblemError> {
    individual.fitness = self(individual.genome());
    individual.evaluated = true;
    Ok(())
  }

  fn box_clone(&self) -> Box<dyn Problem<G, F>> {
    Box::new(self.clone())
  }
}

/// Evaluates groups of individuals jointly.
pub trait GroupedProblem<G: Genome, F: Fitness>: Send {
  /// See [`Problem::setup`].
  fn setup(
    &mut self,
    _params: &dyn Parameters,
    _base: &Key,
    _errors: &mut SetupErrors,
  ) {
  }

  /// Resets the trial accumulators of every subpopulation flagged in
  /// `prepare`.
  fn preprocess(
    &mut self,
    population: &mut Population<G, F>,
    prepare: &[bool],
  ) -> Result<(), ProblemError> {
    for (subpop, _) in population
      .subpops_mut()
      .iter_mut()
      .zip(prepare)
      .filter(|(_, prepare)| **prepare)
    {
      for ind in subpop.individuals_mut() {
        ind.fitness.trials_mut().clear();
      }
    }
    Ok(())
  }

  /// Plays one group. `group[i]` comes from subpopulation `subpops[i]`.
  ///
  /// Returns one trial score per participant, higher is better. Scores of
  /// participants whose `update` flag is `false` are discarded.
  fn evaluate_group(
    &mut self,
    group: &[&Individual<G, F>],
    subpops: &[usize],
    update: &[bool],
    ctx: &mut EvalContext<'_>,
  ) -> Result<Vec<f64>, ProblemError>;

  /// Reduces the trials of every subpopulation flagged in `assess` to a final
  /// fitness and marks those individuals evaluated.
  fn postprocess(
    &mut self,
    population: &mut Population<G, F>,
    assess: &[bool],
  ) -> Result<(), ProblemError>;

  /// Returns an independent copy for another worker thread.
  fn box_clone(&self) -> Box<dyn GroupedProblem<G, F>>;
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;

  use super::*;
  use crate::fitness::ScalarFitness;

  #[test]
  fn test_closure_problem_sets_fitness_and_flag() {
    let problem = |g: &Vec<bool>| {
      ScalarFitness::new(g.iter().filter(|b| **b).count() as f64)
    };
    let mut boxed: Box<dyn Problem<Vec<bool>, ScalarFitness>> =
      Box::new(problem);
    let mut clone = boxed.box_clone();

    let mut rng = EvoRng::seed_from_u64(0);
    let mut ctx = EvalContext {
      thread: 0,
      generation: 0,
      rng: &mut rng,
    };
    let mut ind = Individual::new(vec![true, false, true]);
    boxed.evaluate(&mut ind, 0, &mut ctx).unwrap();
    assert!(ind.evaluated);
    assert_eq!(ind.fitness.value(), 2.0);

    let mut other = Individual::new(vec![true]);
    clone.evaluate(&mut other, 0, &mut ctx).unwrap();
    assert_eq!(other.fitness.value(), 1.0);
  }
}
