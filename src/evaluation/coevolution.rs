//! Grouped evaluation for competitive and cooperative coevolution.
//!
//! Both evaluators follow the same cycle every generation:
//! [`preprocess`](GroupedProblem::preprocess), a number of batches of groups
//! played in parallel, then [`postprocess`](GroupedProblem::postprocess).
//! Groups are split into contiguous chunks, one per worker, and played with
//! per-worker problem clones. A group only reports trial scores; the scores
//! are appended to the participants after the batch is joined, in group
//! order, so the outcome does not depend on scheduling.

use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use rayon::prelude::*;

use crate::{
  config::{Key, Parameters},
  error::{Error, ProblemError, Result, SetupErrors},
  execution::{chunk_size, EvoRng, Workers},
  fitness::{Fitness, Partner},
  genome::Genome,
  individual::Individual,
  population::Population,
  problem::{EvalContext, GroupedProblem},
};

use super::{EvaluationReport, Evaluate};

/// One group to be played.
#[derive(Clone, PartialEq, Debug)]
struct Group {
  members: Vec<Partner>,
  update: Vec<bool>,
}

impl Group {
  fn new(members: Vec<Partner>, update: Vec<bool>) -> Self {
    Self { members, update }
  }
}

/// Per-worker problem clones plus the batch runner shared by both
/// evaluators.
struct GroupRunner<G: Genome, F: Fitness> {
  problem: Box<dyn GroupedProblem<G, F>>,
  clones: Vec<Box<dyn GroupedProblem<G, F>>>,
}

impl<G: Genome, F: Fitness> GroupRunner<G, F> {
  fn new(problem: Box<dyn GroupedProblem<G, F>>) -> Self {
    Self {
      problem,
      clones: Vec::new(),
    }
  }

  fn ensure_clones(&mut self, threads: usize) {
    if self.clones.len() != threads {
      self.clones = (0..threads).map(|_| self.problem.box_clone()).collect();
    }
  }

  /// Plays `groups` in parallel and returns their scores in group order.
  fn play<'p>(
    &mut self,
    groups: &[Group],
    resolve: impl Fn(Partner) -> Option<&'p Individual<G, F>> + Sync,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<Vec<Vec<f64>>> {
    if groups.is_empty() {
      return Ok(Vec::new());
    }
    self.ensure_clones(workers.threads());
    let size = chunk_size(groups.len(), workers.threads());
    let problems = &mut self.clones;
    let resolve = &resolve;
    let chunks: Vec<Result<Vec<Vec<f64>>>> = workers.install(|rngs| {
      groups
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
            .map(|group| {
              let members = group
                .members
                .iter()
                .map(|&partner| {
                  resolve(partner).ok_or(Error::UnknownPartner { partner })
                })
                .collect::<Result<Vec<&Individual<G, F>>>>()?;
              let subpops: Vec<usize> =
                group.members.iter().map(Partner::subpop).collect();
              let scores = problem
                .evaluate_group(&members, &subpops, &group.update, &mut ctx)
                .map_err(|source| Error::Problem { thread, source })?;
              if scores.len() != members.len() {
                return Err(Error::Problem {
                  thread,
                  source: ProblemError::new(format!(
                    "returned {} scores for a group of {}",
                    scores.len(),
                    members.len()
                  )),
                });
              }
              Ok(scores)
            })
            .collect::<Result<Vec<_>>>()
        })
        .collect()
    });

    let mut scores = Vec::with_capacity(groups.len());
    for chunk in chunks {
      scores.extend(chunk?);
    }
    Ok(scores)
  }
}

/// Appends every flagged participant's score to its trials.
fn record_trials<G: Genome, F: Fitness>(
  population: &mut Population<G, F>,
  groups: &[Group],
  scores: &[Vec<f64>],
) {
  for (group, scores) in groups.iter().zip(scores) {
    for (k, &member) in group.members.iter().enumerate() {
      let Partner::Member { subpop, index } = member else {
        continue;
      };
      if !group.update[k] {
        continue;
      }
      let context: Vec<Partner> = group
        .members
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != k)
        .map(|(_, &p)| p)
        .collect();
      population[subpop][index]
        .fitness
        .trials_mut()
        .record(scores[k], &context);
    }
  }
}

fn ensure_all_evaluated<G: Genome, F: Fitness>(
  population: &Population<G, F>,
  assess: &[bool],
) -> Result<()> {
  for (subpop, s) in population.subpops().iter().enumerate() {
    if !assess[subpop] {
      continue;
    }
    if let Some(index) = s.individuals().iter().position(|i| !i.evaluated) {
      return Err(Error::NotEvaluated { subpop, index });
    }
  }
  Ok(())
}

/// How individuals of one subpopulation are paired against each other.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompetitionStyle {
  /// Every unordered pair plays once; both sides record the trial.
  RoundRobin,
  /// A shuffled knockout bracket. Winners advance; an odd one out gets a
  /// bye. Ties go to the first listed participant.
  SingleElimination,
  /// Each individual plays this many uniformly drawn opponents. Only the
  /// drawing side records the trial.
  RandomOpponents(usize),
}

impl CompetitionStyle {
  /// Parses a configuration name (`round-robin`, `single-elimination`,
  /// `random`). `opponents` is used by the random style.
  pub fn from_name(name: &str, opponents: usize) -> Option<Self> {
    match name {
      "round-robin" => Some(Self::RoundRobin),
      "single-elimination" => Some(Self::SingleElimination),
      "random" | "random-opponents" => Some(Self::RandomOpponents(opponents)),
      _ => None,
    }
  }
}

/// Pits individuals of the same subpopulation against each other, in
/// pairs, independently for every subpopulation.
pub struct CompetitiveEvaluator<G: Genome, F: Fitness> {
  runner: GroupRunner<G, F>,
  style: CompetitionStyle,
}

impl<G: Genome, F: Fitness> CompetitiveEvaluator<G, F> {
  /// Creates an evaluator playing `problem` in the given style.
  pub fn new(
    problem: impl GroupedProblem<G, F> + 'static,
    style: CompetitionStyle,
  ) -> Self {
    Self::from_boxed(Box::new(problem), style)
  }

  /// Creates an evaluator for an already boxed problem.
  pub fn from_boxed(
    problem: Box<dyn GroupedProblem<G, F>>,
    style: CompetitionStyle,
  ) -> Self {
    Self {
      runner: GroupRunner::new(problem),
      style,
    }
  }

  /// The pairing style.
  pub fn style(&self) -> CompetitionStyle {
    self.style
  }

  fn round_robin(subpop: usize, len: usize) -> Vec<Group> {
    (0..len)
      .tuple_combinations()
      .map(|(a, b)| {
        Group::new(
          vec![
            Partner::Member { subpop, index: a },
            Partner::Member { subpop, index: b },
          ],
          vec![true, true],
        )
      })
      .collect()
  }

  fn random_opponents(
    subpop: usize,
    len: usize,
    opponents: usize,
    rng: &mut EvoRng,
  ) -> Vec<Group> {
    if len < 2 {
      return Vec::new();
    }
    let mut groups = Vec::with_capacity(len * opponents);
    for index in 0..len {
      for _ in 0..opponents {
        // draw from everyone but `index`
        let mut other = rng.gen_range(0..len - 1);
        if other >= index {
          other += 1;
        }
        groups.push(Group::new(
          vec![
            Partner::Member { subpop, index },
            Partner::Member {
              subpop,
              index: other,
            },
          ],
          vec![true, false],
        ));
      }
    }
    groups
  }

  fn single_elimination(
    &mut self,
    population: &mut Population<G, F>,
    subpop: usize,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<usize> {
    let mut alive: Vec<usize> = (0..population[subpop].len()).collect();
    alive.shuffle(workers.main_rng());
    let mut played = 0;
    while alive.len() > 1 {
      let groups: Vec<Group> = alive
        .chunks_exact(2)
        .map(|pair| {
          Group::new(
            pair
              .iter()
              .map(|&index| Partner::Member { subpop, index })
              .collect(),
            vec![true, true],
          )
        })
        .collect();
      let view = &*population;
      let scores = self.runner.play(
        &groups,
        |p| member(view, p),
        generation,
        workers,
      )?;
      record_trials(population, &groups, &scores);
      played += groups.len();

      let bye = (alive.len() % 2 == 1).then(|| alive[alive.len() - 1]);
      alive = alive
        .chunks_exact(2)
        .zip(&scores)
        .map(|(pair, s)| if s[0] >= s[1] { pair[0] } else { pair[1] })
        .chain(bye)
        .collect();
    }
    Ok(played)
  }
}

// Competitive groups only hold members of the evaluated population.
fn member<G, F>(
  population: &Population<G, F>,
  p: Partner,
) -> Option<&Individual<G, F>>
where
  G: Genome,
  F: Fitness,
{
  match p {
    Partner::Member { subpop, index } => {
      population.subpops().get(subpop)?.individuals().get(index)
    }
    Partner::Elite { .. } => None,
  }
}

impl<G: Genome, F: Fitness> std::fmt::Debug for CompetitiveEvaluator<G, F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CompetitiveEvaluator")
      .field("style", &self.style)
      .finish_non_exhaustive()
  }
}

impl<G: Genome, F: Fitness> Evaluate<G, F> for CompetitiveEvaluator<G, F> {
  fn setup(
    &mut self,
    params: &dyn Parameters,
    base: &Key,
    errors: &mut SetupErrors,
  ) {
    if self.style == CompetitionStyle::RandomOpponents(0) {
      errors.report(base.push("num-opponents"), "must be at least 1");
    }
    self.runner.problem.setup(params, &base.push("problem"), errors);
    self.runner.clones.clear();
  }

  fn evaluate_population(
    &mut self,
    population: &mut Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<EvaluationReport> {
    let flags = vec![true; population.len()];
    self
      .runner
      .problem
      .preprocess(population, &flags)
      .map_err(|source| Error::Problem { thread: 0, source })?;

    let mut report = EvaluationReport::default();
    for subpop in 0..population.len() {
      let len = population[subpop].len();
      let groups = match self.style {
        CompetitionStyle::SingleElimination => {
          report.evaluations +=
            self.single_elimination(population, subpop, generation, workers)?;
          continue;
        }
        CompetitionStyle::RoundRobin => Self::round_robin(subpop, len),
        CompetitionStyle::RandomOpponents(k) => {
          Self::random_opponents(subpop, len, k, workers.main_rng())
        }
      };
      let view = &*population;
      let scores = self
        .runner
        .play(&groups, |p| member(view, p), generation, workers)?;
      record_trials(population, &groups, &scores);
      report.evaluations += groups.len();
    }

    self
      .runner
      .problem
      .postprocess(population, &flags)
      .map_err(|source| Error::Problem { thread: 0, source })?;
    ensure_all_evaluated(population, &flags)?;
    tracing::debug!(generation, groups = report.evaluations, "competition");
    Ok(report)
  }
}

/// Evaluates each individual together with partners drawn from every other
/// subpopulation.
///
/// Every individual plays `num_elites` groups whose partners are the best
/// individuals of the previous generation, and `num_random` groups with
/// random partners from the current generation. Until elites are known the
/// elite slots also use random partners. Only the individual under
/// assessment records the trial.
pub struct CooperativeEvaluator<G: Genome, F: Fitness> {
  runner: GroupRunner<G, F>,
  num_elites: usize,
  num_random: usize,
  elites: Vec<Vec<Individual<G, F>>>,
}

impl<G: Genome, F: Fitness> CooperativeEvaluator<G, F> {
  /// Creates an evaluator for `problem`.
  pub fn new(
    problem: impl GroupedProblem<G, F> + 'static,
    num_elites: usize,
    num_random: usize,
  ) -> Self {
    Self::from_boxed(Box::new(problem), num_elites, num_random)
  }

  /// Creates an evaluator for an already boxed problem.
  pub fn from_boxed(
    problem: Box<dyn GroupedProblem<G, F>>,
    num_elites: usize,
    num_random: usize,
  ) -> Self {
    Self {
      runner: GroupRunner::new(problem),
      num_elites,
      num_random,
      elites: Vec::new(),
    }
  }

  /// Best individuals of subpopulation `subpop` kept from the previous
  /// generation, best first. [`Partner::Elite`] ranks index into this.
  pub fn elites(&self, subpop: usize) -> &[Individual<G, F>] {
    self.elites.get(subpop).map_or(&[], Vec::as_slice)
  }

  fn groups(
    &self,
    population: &Population<G, F>,
    rng: &mut EvoRng,
  ) -> Vec<Group> {
    let subpops = population.len();
    let trials = self.num_elites + self.num_random;
    let mut groups = Vec::new();
    for (s, assessed) in population.subpops().iter().enumerate() {
      for index in 0..assessed.len() {
        for trial in 0..trials {
          let members = (0..subpops)
            .map(|p| {
              if p == s {
                return Partner::Member { subpop: s, index };
              }
              let elites = self.elites(p);
              if trial < self.num_elites && !elites.is_empty() {
                Partner::Elite {
                  subpop: p,
                  rank: trial % elites.len(),
                }
              } else {
                Partner::Member {
                  subpop: p,
                  index: rng.gen_range(0..population[p].len()),
                }
              }
            })
            .collect();
          let update = (0..subpops).map(|p| p == s).collect();
          groups.push(Group::new(members, update));
        }
      }
    }
    groups
  }

  fn keep_elites(&mut self, population: &Population<G, F>) {
    self.elites = population
      .subpops()
      .iter()
      .map(|subpop| {
        subpop
          .ranked_indices()
          .into_iter()
          .take(self.num_elites)
          .map(|i| subpop[i].shallow_duplicate())
          .collect()
      })
      .collect();
  }
}

impl<G: Genome, F: Fitness> std::fmt::Debug for CooperativeEvaluator<G, F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CooperativeEvaluator")
      .field("num_elites", &self.num_elites)
      .field("num_random", &self.num_random)
      .finish_non_exhaustive()
  }
}

impl<G: Genome, F: Fitness> Evaluate<G, F> for CooperativeEvaluator<G, F> {
  fn setup(
    &mut self,
    params: &dyn Parameters,
    base: &Key,
    errors: &mut SetupErrors,
  ) {
    if self.num_elites + self.num_random == 0 {
      errors.report(
        base.push("num-random"),
        "num-elites and num-random cannot both be 0",
      );
    }
    self.runner.problem.setup(params, &base.push("problem"), errors);
    self.runner.clones.clear();
  }

  fn evaluate_population(
    &mut self,
    population: &mut Population<G, F>,
    generation: usize,
    workers: &mut Workers,
  ) -> Result<EvaluationReport> {
    if let Some(subpop) = population.subpops().iter().position(|s| s.is_empty())
    {
      return Err(Error::EmptySubpopulation { subpop });
    }
    let flags = vec![true; population.len()];
    self
      .runner
      .problem
      .preprocess(population, &flags)
      .map_err(|source| Error::Problem { thread: 0, source })?;

    let groups = self.groups(population, workers.main_rng());
    let view = &*population;
    let elites = &self.elites;
    let scores = self.runner.play(
      &groups,
      |p| match p {
        Partner::Member { .. } => member(view, p),
        Partner::Elite { subpop, rank } => elites.get(subpop)?.get(rank),
      },
      generation,
      workers,
    )?;
    record_trials(population, &groups, &scores);

    self
      .runner
      .problem
      .postprocess(population, &flags)
      .map_err(|source| Error::Problem { thread: 0, source })?;
    ensure_all_evaluated(population, &flags)?;
    self.keep_elites(population);
    tracing::debug!(generation, groups = groups.len(), "cooperation");
    Ok(EvaluationReport {
      evaluations: groups.len(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{fitness::ScalarFitness, population::Subpopulation};

  type Ind = Individual<Vec<i64>, ScalarFitness>;
  type Pop = Population<Vec<i64>, ScalarFitness>;

  fn population(subpops: &[&[i64]]) -> Pop {
    Population::new(
      subpops
        .iter()
        .map(|values| {
          Subpopulation::from_individuals(
            values.iter().map(|&v| Ind::new(vec![v])).collect(),
          )
          .unwrap()
        })
        .collect(),
    )
  }

  /// Scores each participant with its own gene minus the others' genes.
  #[derive(Clone)]
  struct Duel;

  impl GroupedProblem<Vec<i64>, ScalarFitness> for Duel {
    fn evaluate_group(
      &mut self,
      group: &[&Ind],
      subpops: &[usize],
      _update: &[bool],
      _ctx: &mut EvalContext<'_>,
    ) -> Result<Vec<f64>, ProblemError> {
      assert_eq!(group.len(), subpops.len());
      let total: i64 = group.iter().map(|ind| ind.genome()[0]).sum();
      Ok(
        group
          .iter()
          .map(|ind| (2 * ind.genome()[0] - total) as f64)
          .collect(),
      )
    }

    fn postprocess(
      &mut self,
      population: &mut Pop,
      assess: &[bool],
    ) -> Result<(), ProblemError> {
      for (subpop, _) in population
        .subpops_mut()
        .iter_mut()
        .zip(assess)
        .filter(|(_, a)| **a)
      {
        for ind in subpop.individuals_mut() {
          let mean = ind.fitness.trials().mean().unwrap_or(0.0);
          ind.fitness.set(mean, false);
          ind.evaluated = true;
        }
      }
      Ok(())
    }

    fn box_clone(&self) -> Box<dyn GroupedProblem<Vec<i64>, ScalarFitness>> {
      Box::new(self.clone())
    }
  }

  #[test]
  fn test_round_robin_plays_every_pair_once() {
    let mut workers = Workers::new(2, 3).unwrap();
    let mut pop = population(&[&[1, 2, 3, 4]]);
    let mut evaluator =
      CompetitiveEvaluator::new(Duel, CompetitionStyle::RoundRobin);
    let report = evaluator.evaluate_population(&mut pop, 0, &mut workers);
    assert_eq!(report, Ok(EvaluationReport { evaluations: 6 }));

    for ind in pop[0].individuals() {
      assert!(ind.evaluated);
      assert_eq!(ind.fitness.trials().len(), 3);
    }
    // 4 beats everybody: trials 1, 2, 3
    assert_eq!(pop[0][3].fitness.trials().scores(), &[3.0, 2.0, 1.0]);
    assert_eq!(pop[0][3].fitness.value(), 2.0);
    assert_eq!(
      pop[0][3].fitness.trials().context(),
      &[Partner::Member {
        subpop: 0,
        index: 0
      }]
    );
  }

  #[test]
  fn test_trials_are_reset_each_generation() {
    let mut workers = Workers::new(3, 3).unwrap();
    let mut pop = population(&[&[1, 2, 3]]);
    let mut evaluator =
      CompetitiveEvaluator::new(Duel, CompetitionStyle::RoundRobin);
    evaluator.evaluate_population(&mut pop, 0, &mut workers).unwrap();
    evaluator.evaluate_population(&mut pop, 1, &mut workers).unwrap();
    assert!(pop[0].individuals().iter().all(|i| i.fitness.trials().len() == 2));
  }

  #[test]
  fn test_single_elimination_bracket() {
    let mut workers = Workers::new(2, 9).unwrap();
    let mut pop = population(&[&[5, 1, 4, 2, 3]]);
    let mut evaluator = CompetitiveEvaluator::new(
      Duel,
      CompetitionStyle::SingleElimination,
    );
    let report = evaluator.evaluate_population(&mut pop, 0, &mut workers);
    // n - 1 matches for n entrants
    assert_eq!(report, Ok(EvaluationReport { evaluations: 4 }));
    // the strongest entrant never loses, so it plays every round it is in
    let champion = &pop[0][0];
    assert!(champion.fitness.trials().scores().iter().all(|s| *s > 0.0));
    let total: usize =
      pop[0].individuals().iter().map(|i| i.fitness.trials().len()).sum();
    assert_eq!(total, 8);
  }

  #[test]
  fn test_random_opponents_update_only_the_drawing_side() {
    let mut workers = Workers::new(4, 1).unwrap();
    let mut pop = population(&[&[1, 2, 3, 4, 5, 6]]);
    let mut evaluator = CompetitiveEvaluator::new(
      Duel,
      CompetitionStyle::RandomOpponents(3),
    );
    let report = evaluator.evaluate_population(&mut pop, 0, &mut workers);
    assert_eq!(report, Ok(EvaluationReport { evaluations: 18 }));
    for (i, ind) in pop[0].individuals().iter().enumerate() {
      assert_eq!(ind.fitness.trials().len(), 3);
      for partner in ind.fitness.trials().context() {
        assert_ne!(*partner, Partner::Member { subpop: 0, index: i });
      }
    }
  }

  #[test]
  fn test_random_opponents_needs_opponents() {
    let mut errors = SetupErrors::new();
    let mut evaluator = CompetitiveEvaluator::new(
      Duel,
      CompetitionStyle::RandomOpponents(0),
    );
    evaluator.setup(
      &crate::config::ParameterDatabase::new(),
      &Key::new("eval"),
      &mut errors,
    );
    assert_eq!(errors.errors()[0].key.as_str(), "eval.num-opponents");
  }

  #[test]
  fn test_cooperative_uses_previous_elites() {
    let mut workers = Workers::new(2, 4).unwrap();
    let mut pop = population(&[&[1, 2, 3], &[10, 20]]);
    let mut evaluator = CooperativeEvaluator::new(Duel, 1, 2);
    let report = evaluator.evaluate_population(&mut pop, 0, &mut workers);
    assert_eq!(report, Ok(EvaluationReport { evaluations: 15 }));
    assert!(pop[0].individuals().iter().all(|i| i.fitness.trials().len() == 3));
    assert_eq!(evaluator.elites(0).len(), 1);
    assert_eq!(evaluator.elites(1).len(), 1);

    // best of each subpopulation last generation
    let best_second = evaluator.elites(1)[0].genome()[0];
    assert_eq!(best_second, 20);

    let mut next = population(&[&[7, 8], &[30]]);
    evaluator.evaluate_population(&mut next, 1, &mut workers).unwrap();
    for ind in next[0].individuals() {
      let score = ind.fitness.trials().scores()[0];
      // first trial is played with the kept elite, genome 20
      assert_eq!(score, (ind.genome()[0] - 20) as f64);
    }
  }

  #[test]
  fn test_unknown_partner_is_fatal() {
    let pop = population(&[&[1, 2]]);
    let elite = Partner::Elite { subpop: 0, rank: 0 };
    assert!(member(&pop, elite).is_none());
    assert!(member(&pop, Partner::Member { subpop: 0, index: 2 }).is_none());

    let mut workers = Workers::new(2, 0).unwrap();
    let mut runner = GroupRunner::new(Box::new(Duel));
    let groups = vec![Group::new(
      vec![Partner::Member { subpop: 0, index: 0 }, elite],
      vec![true, false],
    )];
    let err = runner
      .play(&groups, |p| member(&pop, p), 0, &mut workers)
      .unwrap_err();
    assert_eq!(err, Error::UnknownPartner { partner: elite });
  }

  #[test]
  fn test_wrong_score_count_is_fatal() {
    #[derive(Clone)]
    struct Mute;
    impl GroupedProblem<Vec<i64>, ScalarFitness> for Mute {
      fn evaluate_group(
        &mut self,
        _group: &[&Ind],
        _subpops: &[usize],
        _update: &[bool],
        _ctx: &mut EvalContext<'_>,
      ) -> Result<Vec<f64>, ProblemError> {
        Ok(Vec::new())
      }

      fn postprocess(
        &mut self,
        _population: &mut Pop,
        _assess: &[bool],
      ) -> Result<(), ProblemError> {
        Ok(())
      }

      fn box_clone(&self) -> Box<dyn GroupedProblem<Vec<i64>, ScalarFitness>> {
        Box::new(self.clone())
      }
    }

    let mut workers = Workers::new(1, 0).unwrap();
    let mut pop = population(&[&[1, 2]]);
    let err = CompetitiveEvaluator::new(Mute, CompetitionStyle::RoundRobin)
      .evaluate_population(&mut pop, 0, &mut workers)
      .unwrap_err();
    assert!(matches!(err, Error::Problem { thread: 0, .. }));
  }
}
