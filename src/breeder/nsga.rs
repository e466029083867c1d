//! NSGA-II ranking and breeding.
//!
//! The archive of generation `g` is bred into `size` children, and the
//! breeder hands back `archive ++ children`. Once the children are evaluated,
//! [`Nsga2Breeder::post_evaluation`] ranks the union with
//! [`MultiObjectiveRanker`] and truncates it back to `size`.

use std::cmp::Ordering;

use super::{Breed, Pipelines};
use crate::{
  breeding::BreedingSource,
  config::{Key, Parameters},
  error::{Error, Result, SetupErrors},
  execution::Workers,
  fitness::pareto::{ParetoFitness, RankedFitness, Ranking},
  genome::Genome,
  population::{Population, Subpopulation},
};

/// Splits `fitnesses` into Pareto fronts of indices, best front first.
///
/// Uses the dominance counter sweep: every pair is compared once, each
/// individual remembers whom it dominates and by how many it is dominated.
pub fn non_dominated_sort<F: ParetoFitness>(
  fitnesses: &[&F],
) -> Vec<Vec<usize>> {
  let n = fitnesses.len();
  let mut dominance_lists: Vec<Vec<usize>> = vec![Vec::new(); n];
  let mut dominance_counters: Vec<usize> = vec![0; n];

  for p in 0..n {
    for q in p + 1..n {
      match fitnesses[p].dominance(fitnesses[q]) {
        // `p` dominates `q`
        Ordering::Less => {
          dominance_lists[p].push(q);
          dominance_counters[q] += 1;
        }
        // `q` dominates `p`
        Ordering::Greater => {
          dominance_lists[q].push(p);
          dominance_counters[p] += 1;
        }
        Ordering::Equal => {}
      }
    }
  }

  let mut fronts = Vec::new();
  let mut front: Vec<usize> =
    (0..n).filter(|&p| dominance_counters[p] == 0).collect();
  while !front.is_empty() {
    let mut next = Vec::new();
    for &p in &front {
      for &q in &dominance_lists[p] {
        dominance_counters[q] -= 1;
        if dominance_counters[q] == 0 {
          next.push(q);
        }
      }
    }
    next.sort_unstable();
    fronts.push(front);
    front = next;
  }
  fronts
}

/// Crowding distance of every member of `front`, in front order.
///
/// Per objective the members at either end get an infinite distance;
/// interior members accumulate `(next - prev) / (max - min)`. An objective
/// whose values are all equal adds nothing.
pub fn assign_sparsity<F: ParetoFitness>(
  fitnesses: &[&F],
  front: &[usize],
) -> Vec<f64> {
  let mut sparsity = vec![0.0; front.len()];
  let Some(&first) = front.first() else {
    return sparsity;
  };
  let objectives = fitnesses[first].objectives().len();
  let mut order: Vec<usize> = (0..front.len()).collect();
  for o in 0..objectives {
    let value = |k: usize| fitnesses[front[k]].objectives()[o];
    order.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

    let (lo, hi) = (order[0], order[order.len() - 1]);
    sparsity[lo] = f64::INFINITY;
    sparsity[hi] = f64::INFINITY;
    let range = value(hi) - value(lo);
    if !(range > 0.0 && range.is_finite()) {
      continue;
    }
    for w in order.windows(3) {
      sparsity[w[1]] += (value(w[2]) - value(w[0])) / range;
    }
  }
  sparsity
}

/// Assigns NSGA-II rank and sparsity and truncates to an archive.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MultiObjectiveRanker;

impl MultiObjectiveRanker {
  /// Computes the fronts of `subpop` and stores every individual's
  /// [`Ranking`] in its fitness. Returns the fronts.
  ///
  /// # Errors
  ///
  /// [`Error::MissingFitness`] if an individual is not evaluated and
  /// [`Error::ObjectiveMismatch`] if objective counts differ.
  pub fn rank<G: Genome, F: RankedFitness>(
    &self,
    subpop: &mut Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<Vec<Vec<usize>>> {
    subpop.ensure_evaluated(subpop_index)?;
    let fitnesses: Vec<&F> =
      subpop.individuals().iter().map(|ind| &ind.fitness).collect();
    if let Some(first) = fitnesses.first() {
      let expected = first.objectives().len();
      if let Some(other) =
        fitnesses.iter().find(|f| f.objectives().len() != expected)
      {
        return Err(Error::ObjectiveMismatch {
          expected,
          found: other.objectives().len(),
        });
      }
    }

    let fronts = non_dominated_sort(&fitnesses);
    let mut rankings = vec![None; fitnesses.len()];
    for (rank, front) in fronts.iter().enumerate() {
      let sparsity = assign_sparsity(&fitnesses, front);
      for (&i, sparsity) in front.iter().zip(sparsity) {
        rankings[i] = Some(Ranking { rank, sparsity });
      }
    }
    for (ind, ranking) in subpop.individuals_mut().iter_mut().zip(rankings) {
      ind.fitness.set_ranking(ranking);
    }
    Ok(fronts)
  }

  /// Ranks `subpop` and keeps the `target` best individuals: whole fronts
  /// in rank order, then the least crowded members of the front that does
  /// not fit. The survivors are stored best first.
  pub fn rank_and_truncate<G: Genome, F: RankedFitness>(
    &self,
    subpop: &mut Subpopulation<G, F>,
    subpop_index: usize,
    target: usize,
  ) -> Result<()> {
    let fronts = self.rank(subpop, subpop_index)?;
    let individuals = subpop.take_individuals();
    let rankings: Vec<Ranking> = individuals
      .iter()
      .map(|ind| ind.fitness.ranking().unwrap_or(UNRANKED))
      .collect();

    let target = target.min(individuals.len());
    let mut survivors: Vec<usize> = Vec::with_capacity(target);
    for mut front in fronts {
      let room = target - survivors.len();
      if room == 0 {
        break;
      }
      if front.len() > room {
        // least crowded first; stable, so ties keep index order
        front.sort_by(|&a, &b| rankings[a].compare(&rankings[b]));
        front.truncate(room);
      }
      survivors.append(&mut front);
    }
    survivors.sort_by(|&a, &b| rankings[a].compare(&rankings[b]));
    tracing::debug!(
      subpop = subpop_index,
      from = individuals.len(),
      to = survivors.len(),
      "truncated archive"
    );

    let mut individuals: Vec<_> = individuals.into_iter().map(Some).collect();
    subpop.extend(survivors.into_iter().filter_map(|i| individuals[i].take()))
  }
}

const UNRANKED: Ranking = Ranking {
  rank: usize::MAX,
  sparsity: 0.0,
};

/// The NSGA-II breeder.
///
/// Elitism is implicit in the parent and child union, so no elites are
/// configured.
#[derive(Debug)]
pub struct Nsga2Breeder<G: Genome, F: RankedFitness> {
  pipelines: Pipelines<G, F>,
  ranker: MultiObjectiveRanker,
}

impl<G: Genome, F: RankedFitness> Nsga2Breeder<G, F> {
  /// Creates a breeder with one breeding tree per subpopulation.
  pub fn new(pipelines: Vec<Box<dyn BreedingSource<G, F>>>) -> Self {
    Self {
      pipelines: Pipelines::new(pipelines),
      ranker: MultiObjectiveRanker,
    }
  }

  /// Rejects `elite.<i>` and `reduce-by.<i>` under `base`, which have no
  /// meaning for NSGA-II.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    pipelines: Vec<Box<dyn BreedingSource<G, F>>>,
    subpops: usize,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let before = errors.len();
    for i in 0..subpops {
      for name in ["elite", "reduce-by"] {
        let key = base.push(name).push(i);
        if params.contains(&key, None) {
          errors.report(key, format!("`{name}` is not supported by nsga2"));
        }
      }
    }
    (errors.len() == before).then(|| Self::new(pipelines))
  }
}

impl<G: Genome, F: RankedFitness> Breed<G, F> for Nsga2Breeder<G, F> {
  fn validate(&self, population: &Population<G, F>, errors: &mut SetupErrors) {
    self.pipelines.validate(population, errors);
  }

  fn post_evaluation(
    &mut self,
    population: &mut Population<G, F>,
    _generation: usize,
  ) -> Result<()> {
    for (i, subpop) in population.subpops_mut().iter_mut().enumerate() {
      let target = subpop.size();
      self.ranker.rank_and_truncate(subpop, i, target)?;
    }
    Ok(())
  }

  fn breed(
    &mut self,
    population: &Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<Population<G, F>> {
    let mut next = Vec::with_capacity(population.len());
    for (i, archive) in population.subpops().iter().enumerate() {
      let children = self.pipelines.breed_children(
        archive,
        i,
        archive.size(),
        generation,
        workers,
      )?;
      let mut union = archive.clone();
      union.extend(children)?;
      tracing::debug!(subpop = i, union = union.len(), "bred");
      next.push(union);
    }
    Ok(Population::new(next))
  }
}

#[cfg(test)]
mod tests {
  use rand::{Rng, SeedableRng};

  use super::*;
  use crate::{
    execution::EvoRng,
    fitness::pareto::{Direction, Nsga2Fitness},
    individual::Individual,
    selection::{SelectionSource, Tournament},
  };

  type G = Vec<f64>;
  type F = Nsga2Fitness;

  fn subpop(objectives: &[[f64; 2]]) -> Subpopulation<G, F> {
    Subpopulation::from_individuals(
      objectives
        .iter()
        .map(|o| {
          let fitness = Nsga2Fitness::new(o.to_vec(), Direction::Maximize);
          let mut ind = Individual::with_fitness(o.to_vec(), fitness);
          ind.evaluated = true;
          ind
        })
        .collect(),
    )
    .unwrap()
  }

  fn random_subpop(len: usize, rng: &mut EvoRng) -> Subpopulation<G, F> {
    let objectives: Vec<[f64; 2]> = (0..len)
      .map(|_| [rng.gen_range(0..5) as f64, rng.gen_range(0..5) as f64])
      .collect();
    subpop(&objectives)
  }

  #[test]
  fn test_mutually_non_dominated_four() {
    let mut s = subpop(&[[1.0, 4.0], [2.0, 3.0], [3.0, 2.0], [4.0, 1.0]]);
    let fronts = MultiObjectiveRanker.rank(&mut s, 0).unwrap();
    assert_eq!(fronts, vec![vec![0, 1, 2, 3]]);
    let fitness: Vec<_> = s.individuals().iter().map(|i| &i.fitness).collect();
    assert!(fitness.iter().all(|f| f.rank() == Some(0)));
    assert_eq!(fitness[0].sparsity(), Some(f64::INFINITY));
    assert_eq!(fitness[3].sparsity(), Some(f64::INFINITY));
    let interior = fitness[1].sparsity().unwrap();
    assert!((interior - 4.0 / 3.0).abs() < 1e-12);
    assert_eq!(fitness[2].sparsity(), fitness[1].sparsity());
  }

  #[test]
  fn test_fronts_follow_dominance() {
    let mut s = subpop(&[[1.0, 1.0], [2.0, 2.0], [3.0, 0.0], [0.0, 0.0]]);
    let fronts = MultiObjectiveRanker.rank(&mut s, 0).unwrap();
    assert_eq!(fronts, vec![vec![1, 2], vec![0], vec![3]]);
    assert_eq!(s[3].fitness.rank(), Some(2));
  }

  #[test]
  fn test_ranking_respects_non_domination() {
    let mut rng = EvoRng::seed_from_u64(3);
    for _ in 0..20 {
      let mut s = random_subpop(16, &mut rng);
      MultiObjectiveRanker.rank(&mut s, 0).unwrap();
      let inds = s.individuals();
      for a in inds {
        let rank = a.fitness.rank().unwrap();
        for b in inds {
          if b.fitness.dominates(&a.fitness) {
            assert!(b.fitness.rank().unwrap() < rank);
          }
        }
        if rank > 0 {
          let previous = Some(rank - 1);
          assert!(inds.iter().any(|b| {
            b.fitness.rank() == previous && b.fitness.dominates(&a.fitness)
          }));
        }
      }
    }
  }

  #[test]
  fn test_archive_has_target_size() {
    let mut rng = EvoRng::seed_from_u64(8);
    for n in 1..=12 {
      let mut s = random_subpop(2 * n, &mut rng);
      MultiObjectiveRanker.rank_and_truncate(&mut s, 0, n).unwrap();
      assert_eq!(s.len(), n);
      let ranks: Vec<_> =
        s.individuals().iter().map(|i| i.fitness.rank().unwrap()).collect();
      assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    }
  }

  #[test]
  fn test_truncation_keeps_least_crowded() {
    let mut s = subpop(&[[1.0, 4.0], [2.0, 3.0], [3.0, 2.0], [4.0, 1.0]]);
    MultiObjectiveRanker.rank_and_truncate(&mut s, 0, 2).unwrap();
    let kept: Vec<_> = s.individuals().iter().map(|i| i.genome()[0]).collect();
    assert_eq!(kept, [1.0, 4.0]);
  }

  #[test]
  fn test_boundary_sparsity() {
    let a = Nsga2Fitness::new(vec![0.0, 5.0], Direction::Minimize);
    let b = Nsga2Fitness::new(vec![5.0, 0.0], Direction::Minimize);
    let sparsity = assign_sparsity(&[&a, &b], &[0, 1]);
    assert_eq!(sparsity, [f64::INFINITY, f64::INFINITY]);

    let same = Nsga2Fitness::new(vec![1.0, 1.0], Direction::Minimize);
    let sparsity = assign_sparsity(&[&same, &same, &same], &[0, 1, 2]);
    assert_eq!(sparsity[1], 0.0);
    assert_eq!(sparsity.iter().filter(|s| s.is_infinite()).count(), 2);
  }

  #[test]
  fn test_missing_fitness_is_fatal() {
    let mut s = subpop(&[[1.0, 4.0], [2.0, 3.0]]);
    s[1].evaluated = false;
    let err = MultiObjectiveRanker.rank(&mut s, 4).unwrap_err();
    assert_eq!(err, Error::MissingFitness { subpop: 4, index: 1 });
    assert!(err.is_fatal());

    let mut s = subpop(&[[1.0, 4.0], [2.0, 3.0]]);
    s[1].fitness.set_objectives(vec![1.0, 2.0, 3.0]);
    let err = MultiObjectiveRanker.rank(&mut s, 0).unwrap_err();
    assert_eq!(err, Error::ObjectiveMismatch { expected: 2, found: 3 });
  }

  #[test]
  fn test_breeder_doubles_then_truncates() {
    let mut rng = EvoRng::seed_from_u64(1);
    let mut pop = Population::new(vec![random_subpop(6, &mut rng)]);
    let mut workers = Workers::new(2, 0).unwrap();
    let select: Box<dyn BreedingSource<G, F>> =
      Box::new(SelectionSource::new(Tournament::new(2)));
    let mut breeder = Nsga2Breeder::new(vec![select]);

    breeder.post_evaluation(&mut pop, 0).unwrap();
    assert!(pop[0].individuals().iter().all(|i| i.fitness.rank().is_some()));
    let mut union = breeder.breed(&pop, 0, &mut workers).unwrap();
    assert_eq!(union[0].len(), 12);
    assert_eq!(union[0].size(), 6);
    breeder.post_evaluation(&mut union, 1).unwrap();
    assert_eq!(union[0].len(), 6);
    assert!(union[0][0].fitness.rank() <= union[0][5].fitness.rank());
  }

  #[test]
  fn test_elites_are_rejected() {
    let params: crate::config::ParameterDatabase =
      "breed.elite.0 = 1\nbreed.reduce-by.1 = 2".parse().unwrap();
    let mut errors = SetupErrors::new();
    let breeder = Nsga2Breeder::<G, F>::from_parameters(
      &params,
      &Key::new("breed"),
      Vec::new(),
      2,
      &mut errors,
    );
    assert!(breeder.is_none());
    assert_eq!(errors.len(), 2);
    assert_eq!(errors.errors()[1].key.as_str(), "breed.reduce-by.1");
  }
}
