//! **evobreed** is a generational breeding-and-evaluation engine for
//! evolutionary computation. It runs the classic loop of evolutionary
//! algorithms over one or several subpopulations, in parallel, and yields the
//! same results for the same seed no matter how many times you run it.
//!
//! Here's a [quick start example](#example) for the impatient.
//!
//! Every generation, an [`EvolutionState`]
//! 1. **evaluates** individuals that have no fitness yet with an
//!    [`Evaluate`] implementation,
//! 2. records **statistics** and the best individuals of the run,
//! 3. checks **termination**: the generation limit, an ideal individual or a
//!    user supplied [`Terminator`],
//! 4. **breeds** the next population with a [`Breed`] implementation.
//!
//! # Evaluation
//!
//! Fitness comes from user code. A [`Problem`] evaluates one individual at a
//! time and is run by the [`SimpleEvaluator`]. A [`GroupedProblem`] plays
//! groups of individuals against (or together with) each other and is run by
//! the [`CompetitiveEvaluator`] or the [`CooperativeEvaluator`]. Any
//! cloneable closure `Fn(&G) -> F` is a [`Problem`].
//!
//! # Breeding
//!
//! Each subpopulation is bred by a tree of [`BreedingSource`]s. Leaves are
//! [selection methods](crate::selection), inner nodes are
//! [pipelines](crate::breeding::pipelines) such as crossover or mutation. The
//! [`SimpleBreeder`] replaces a subpopulation with its elites plus fresh
//! children, the [`Nsga2Breeder`] keeps a Pareto archive and breeds from it.
//!
//! Trees can be assembled in code or read from a [`ParameterDatabase`]
//! through a [`Registry`], which maps names like `tournament` or `crossover`
//! to constructors. Configuration errors are collected and reported all at
//! once rather than one at a time.
//!
//! # Parallelization
//!
//! Evaluation and breeding run on a fixed pool of worker threads. Work is cut
//! into contiguous chunks and chunk `i` is always handled by worker `i`,
//! with its own random number stream and its own clone of the problem or
//! the breeding tree. That is what makes runs reproducible.
//!
//! # Example
//!
//! *OneMax*: evolve bit strings towards all ones.
//! ```
//! use evobreed::{
//!   breeder::SimpleBreeder,
//!   breeding::{pipelines::MutationPipeline, BreedingSource},
//!   evaluation::SimpleEvaluator,
//!   fitness::{Fitness, ScalarFitness},
//!   genome::MutationParams,
//!   population::{Population, Subpopulation},
//!   selection::{SelectionSource, Tournament},
//!   state::EvolutionState,
//! };
//!
//! // 64 individuals of 16 zero bits
//! let subpop = Subpopulation::generate(64, |_| vec![false; 16]).unwrap();
//! // fitness is the number of ones, a string of ones is ideal
//! let onemax = |g: &Vec<bool>| {
//!   let ones = g.iter().filter(|b| **b).count();
//!   let mut fitness = ScalarFitness::default();
//!   fitness.set(ones as f64, ones == g.len());
//!   fitness
//! };
//! // flip every bit with 1/16 probability in tournament winners
//! let params = MutationParams {
//!   per_gene: 1.0 / 16.0,
//!   ..MutationParams::default()
//! };
//! let select = Box::new(SelectionSource::new(Tournament::new(2)));
//! let mutate: Box<dyn BreedingSource<Vec<bool>, ScalarFitness>> =
//!   Box::new(MutationPipeline::new(params, select));
//! let breeder = SimpleBreeder::new(vec![mutate]).with_elites(vec![1]);
//! let outcome = EvolutionState::builder()
//!   .population(Population::new(vec![subpop]))
//!   .evaluator(Box::new(SimpleEvaluator::new(onemax)))
//!   .breeder(Box::new(breeder))
//!   .max_generations(200)
//!   .threads(2)
//!   .seed(42)
//!   .build()
//!   .run()
//!   .unwrap();
//! let best = outcome.best_of_run[0].as_ref().unwrap();
//! assert!(best.fitness.value() > 0.0);
//! ```
//!
//! More complete programs live in the *demos* folder in the root of the
//! project.
//!
//! [`EvolutionState`]: crate::state::EvolutionState
//! [`Evaluate`]: crate::evaluation::Evaluate
//! [`Terminator`]: crate::termination::Terminator
//! [`Breed`]: crate::breeder::Breed
//! [`Problem`]: crate::problem::Problem
//! [`GroupedProblem`]: crate::problem::GroupedProblem
//! [`SimpleEvaluator`]: crate::evaluation::SimpleEvaluator
//! [`CompetitiveEvaluator`]: crate::evaluation::coevolution::CompetitiveEvaluator
//! [`CooperativeEvaluator`]: crate::evaluation::coevolution::CooperativeEvaluator
//! [`BreedingSource`]: crate::breeding::BreedingSource
//! [`SimpleBreeder`]: crate::breeder::SimpleBreeder
//! [`Nsga2Breeder`]: crate::breeder::nsga::Nsga2Breeder
//! [`ParameterDatabase`]: crate::config::ParameterDatabase
//! [`Registry`]: crate::registry::Registry

#![warn(missing_docs)]

pub mod breeder;
pub mod breeding;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod fitness;
pub mod genome;
pub mod individual;
pub mod population;
pub mod problem;
pub mod registry;
pub mod selection;
pub mod state;
pub mod statistics;
pub mod termination;
