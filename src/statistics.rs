//! Per-generation statistics and best-of-run tracking.

use crate::{
  fitness::Fitness,
  genome::Genome,
  individual::Individual,
  population::{Population, Subpopulation},
};

/// Summary of one subpopulation after evaluation.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SubpopStatistics {
  /// Number of individuals.
  pub size: usize,
  /// Index of the best evaluated individual.
  pub best_index: Option<usize>,
  /// [`Fitness::value`] of the best individual.
  pub best: Option<f64>,
  /// Mean [`Fitness::value`] over evaluated individuals.
  pub mean: Option<f64>,
  /// Number of individuals on the first Pareto front, for ranked fitnesses.
  pub front_size: Option<usize>,
}

impl SubpopStatistics {
  /// Summarizes `subpop`.
  pub fn collect<G: Genome, F: Fitness>(subpop: &Subpopulation<G, F>) -> Self {
    let evaluated: Vec<f64> = subpop
      .individuals()
      .iter()
      .filter(|ind| ind.evaluated)
      .map(|ind| ind.fitness.value())
      .collect();
    let mean = (!evaluated.is_empty())
      .then(|| evaluated.iter().sum::<f64>() / evaluated.len() as f64);
    let best_index = subpop.best_index();
    let ranks: Vec<usize> = subpop
      .individuals()
      .iter()
      .filter_map(|ind| ind.fitness.front_rank())
      .collect();
    Self {
      size: subpop.len(),
      best_index,
      best: best_index.map(|i| subpop[i].fitness.value()),
      mean,
      front_size: (!ranks.is_empty())
        .then(|| ranks.iter().filter(|&&r| r == 0).count()),
    }
  }
}

/// Summary of one generation.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GenerationStatistics {
  /// Generation number, starting at `0`.
  pub generation: usize,
  /// Problem invocations spent on this generation.
  pub evaluations: usize,
  /// One entry per subpopulation.
  pub subpops: Vec<SubpopStatistics>,
}

impl GenerationStatistics {
  /// Summarizes `population` after generation `generation` was evaluated.
  pub fn collect<G: Genome, F: Fitness>(
    generation: usize,
    evaluations: usize,
    population: &Population<G, F>,
  ) -> Self {
    Self {
      generation,
      evaluations,
      subpops: population
        .subpops()
        .iter()
        .map(SubpopStatistics::collect)
        .collect(),
    }
  }

  /// Logs the summary, one line per subpopulation.
  pub fn log(&self) {
    for (i, s) in self.subpops.iter().enumerate() {
      tracing::info!(
        generation = self.generation,
        subpop = i,
        evaluations = self.evaluations,
        best = s.best,
        mean = s.mean,
        front = s.front_size,
        "generation finished"
      );
    }
  }
}

/// The best individual seen so far in every subpopulation.
#[derive(Clone, Debug)]
pub struct BestOfRun<G, F> {
  best: Vec<Option<Individual<G, F>>>,
}

impl<G: Genome, F: Fitness> BestOfRun<G, F> {
  /// Tracks `subpops` subpopulations.
  pub fn new(subpops: usize) -> Self {
    Self {
      best: vec![None; subpops],
    }
  }

  /// Compares the best individual of each subpopulation against the record
  /// and keeps a shallow duplicate of it if it is strictly better. Returns
  /// `true` if any record changed.
  pub fn update(&mut self, population: &Population<G, F>) -> bool {
    if self.best.len() < population.len() {
      self.best.resize(population.len(), None);
    }
    let mut improved = false;
    for (record, subpop) in self.best.iter_mut().zip(population.subpops()) {
      let Some(i) = subpop.best_index() else {
        continue;
      };
      let candidate = &subpop[i];
      let better = match record {
        Some(current) => candidate.better_than(current),
        None => true,
      };
      if better {
        *record = Some(candidate.shallow_duplicate());
        improved = true;
      }
    }
    improved
  }

  /// Best individual of subpopulation `subpop`.
  pub fn get(&self, subpop: usize) -> Option<&Individual<G, F>> {
    self.best.get(subpop).and_then(Option::as_ref)
  }

  /// Records in subpopulation order.
  pub fn into_vec(self) -> Vec<Option<Individual<G, F>>> {
    self.best
  }
}
