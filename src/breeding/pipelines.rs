//! Stock breeding pipelines.
//!
//! Every pipeline has a `likelihood` of applying its operation. When the
//! operation is skipped the pipeline passes on what its sources produced.

use rand::Rng;

use super::{
  check_probability,
  prepare_sources,
  produce_checked,
  produce_one,
  Arity,
  BreedContext,
  BreedingSource,
};
use crate::{
  config::{Key, Parameters},
  error::{Error, Result, SetupErrors},
  execution::EvoRng,
  fitness::Fitness,
  genome::{crossover, CrossoverKind, Genome, Linear, Mutate, MutationParams},
  individual::Individual,
  population::{best_first, Subpopulation},
};

type Sources<G, F> = Vec<Box<dyn BreedingSource<G, F>>>;

/// Reads `<base>.<name>` falling back to `<default>.<name>`, as a
/// probability defaulting to `fallback`.
pub(crate) fn read_probability(
  params: &dyn Parameters,
  base: &Key,
  default: &Key,
  name: &str,
  fallback: f64,
  errors: &mut SetupErrors,
) -> Option<f64> {
  errors.collect(params.get_double_range(
    &base.push(name),
    Some(&default.push(name)),
    0.0,
    1.0,
    fallback,
  ))
}

fn missing_source(name: &'static str, index: usize) -> Error {
  Error::Breeding {
    source_name: name,
    message: format!("source {index} is not connected"),
  }
}

/// Recombines pairs of individuals from two sources.
///
/// Emits both children, or only the first one with `toss_second`.
#[derive(Clone, Debug)]
pub struct CrossoverPipeline<G: Genome, F: Fitness> {
  sources: Sources<G, F>,
  /// Gene exchange scheme.
  pub kind: CrossoverKind,
  /// Probability of recombining a pair.
  pub likelihood: f64,
  /// Emit one child per pair instead of two.
  pub toss_second: bool,
}

impl<G: Linear, F: Fitness> CrossoverPipeline<G, F> {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "xover";

  /// Creates a pipeline recombining individuals of `sources`, which must
  /// hold two sources.
  pub fn new(kind: CrossoverKind, sources: Sources<G, F>) -> Self {
    Self {
      sources,
      kind,
      likelihood: 1.0,
      toss_second: false,
    }
  }

  /// Sets the likelihood.
  pub fn with_likelihood(mut self, likelihood: f64) -> Self {
    self.likelihood = likelihood;
    self
  }

  /// Emit one child per pair.
  pub fn tossing_second(mut self) -> Self {
    self.toss_second = true;
    self
  }

  /// Reads `type` (`one`, `two`, `any`), `prob` (per-gene swap
  /// probability of `any`), `likelihood` and `toss` under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    sources: Sources<G, F>,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let probability =
      read_probability(params, base, &default, "prob", 0.5, errors);
    let likelihood =
      read_probability(params, base, &default, "likelihood", 1.0, errors);
    let toss = errors.collect(params.get_bool(
      &base.push("toss"),
      Some(&default.push("toss")),
      false,
    ));
    let name = params
      .lookup(&base.push("type"), Some(&default.push("type")))
      .unwrap_or("one");
    let kind = CrossoverKind::from_name(name, probability.unwrap_or(0.5));
    if kind.is_none() {
      errors.report(
        base.push("type"),
        format!("unknown crossover type `{name}`, expected one, two or any"),
      );
    }
    Some(Self {
      sources,
      kind: kind?,
      likelihood: likelihood?,
      toss_second: toss?,
    })
  }
}

impl<G: Linear, F: Fitness> BreedingSource<G, F> for CrossoverPipeline<G, F> {
  fn name(&self) -> &'static str {
    "crossover"
  }

  fn arity(&self) -> Arity {
    Arity::Exactly(2)
  }

  fn sources(&self) -> &[Box<dyn BreedingSource<G, F>>] {
    &self.sources
  }

  fn typical_outputs(&self) -> usize {
    if self.toss_second {
      1
    } else {
      2
    }
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    check_probability(path, "likelihood", self.likelihood, errors);
    if let CrossoverKind::Uniform(p) = self.kind {
      check_probability(path, "prob", p, errors);
    }
  }

  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    prepare_sources(&mut self.sources, subpop, subpop_index)
  }

  fn produce(
    &mut self,
    min: usize,
    max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize> {
    let n = self.typical_outputs().max(min).min(max);
    let mut produced = 0;
    while produced < n {
      let [first, second] = &mut self.sources[..] else {
        return Err(missing_source(self.name(), self.sources.len()));
      };
      let mut a = produce_one(first.as_mut(), subpop_index, subpop, ctx)?;
      let mut b = produce_one(second.as_mut(), subpop_index, subpop, ctx)?;
      if ctx.rng.gen_bool(self.likelihood) {
        crossover(a.genome_mut(), b.genome_mut(), self.kind, ctx.rng);
      }
      out.push(a);
      produced += 1;
      if produced < n && !self.toss_second {
        out.push(b);
        produced += 1;
      }
    }
    Ok(n)
  }

  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
    Box::new(self.clone())
  }
}

/// Mutates the individuals of one source.
///
/// Only individuals whose genome actually changed need re-evaluation.
#[derive(Clone, Debug)]
pub struct MutationPipeline<G: Genome, F: Fitness> {
  sources: Sources<G, F>,
  /// Parameters handed to [`Mutate::mutate`].
  pub params: MutationParams,
  /// Probability of mutating an individual.
  pub likelihood: f64,
}

impl<G: Mutate, F: Fitness> MutationPipeline<G, F> {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "mutate";

  /// Creates a pipeline mutating the individuals of `source`.
  pub fn new(
    params: MutationParams,
    source: Box<dyn BreedingSource<G, F>>,
  ) -> Self {
    Self {
      sources: vec![source],
      params,
      likelihood: 1.0,
    }
  }

  /// Sets the likelihood.
  pub fn with_likelihood(mut self, likelihood: f64) -> Self {
    self.likelihood = likelihood;
    self
  }

  /// Reads `per-gene`, `sigma`, `min-gene`/`max-gene` and `likelihood`
  /// under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    sources: Sources<G, F>,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let fallback = MutationParams::default();
    let per_gene = read_probability(
      params,
      base,
      &default,
      "per-gene",
      fallback.per_gene,
      errors,
    );
    let likelihood =
      read_probability(params, base, &default, "likelihood", 1.0, errors);
    // Some(None) when unset, None when invalid
    let optional = |name: &str, min: f64, errors: &mut SetupErrors| {
      let key = base.push(name);
      let default = default.push(name);
      if params.contains(&key, Some(&default)) {
        errors
          .collect(params.get_double(&key, Some(&default), min))
          .map(Some)
      } else {
        Some(None)
      }
    };
    let sigma =
      optional("sigma", 0.0, errors).map(|s| s.unwrap_or(fallback.sigma));
    let bounds = match (
      optional("min-gene", f64::MIN, errors),
      optional("max-gene", f64::MIN, errors),
    ) {
      (Some(Some(lo)), Some(Some(hi))) if lo > hi => {
        errors.report(
          base.push("max-gene"),
          format!("{hi} is smaller than min-gene {lo}"),
        );
        None
      }
      (Some(Some(lo)), Some(Some(hi))) => Some(Some((lo, hi))),
      (Some(None), Some(None)) => Some(None),
      (Some(_), Some(_)) => {
        errors.report(
          base.push("max-gene"),
          "min-gene and max-gene must be set together",
        );
        None
      }
      _ => None,
    };
    Some(Self {
      sources,
      params: MutationParams {
        per_gene: per_gene?,
        sigma: sigma?,
        bounds: bounds?,
      },
      likelihood: likelihood?,
    })
  }
}

impl<G: Mutate, F: Fitness> BreedingSource<G, F> for MutationPipeline<G, F> {
  fn name(&self) -> &'static str {
    "mutation"
  }

  fn arity(&self) -> Arity {
    Arity::Exactly(1)
  }

  fn sources(&self) -> &[Box<dyn BreedingSource<G, F>>] {
    &self.sources
  }

  fn typical_outputs(&self) -> usize {
    self.sources.first().map_or(1, |s| s.typical_outputs())
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    check_probability(path, "likelihood", self.likelihood, errors);
    check_probability(path, "per-gene", self.params.per_gene, errors);
    let sigma = self.params.sigma;
    if !sigma.is_finite() || sigma < 0.0 {
      errors.report(
        path.push("sigma"),
        format!("{sigma} is not a valid standard deviation"),
      );
    }
  }

  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    prepare_sources(&mut self.sources, subpop, subpop_index)
  }

  fn produce(
    &mut self,
    min: usize,
    max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize> {
    let name = self.name();
    let source = self
      .sources
      .first_mut()
      .ok_or_else(|| missing_source(name, 0))?;
    let start = out.len();
    let n = produce_checked(
      source.as_mut(),
      min,
      max,
      subpop_index,
      subpop,
      out,
      ctx,
    )?;
    for child in &mut out[start..] {
      if !ctx.rng.gen_bool(self.likelihood) {
        continue;
      }
      let evaluated = child.evaluated;
      if !child.genome_mut().mutate(&self.params, ctx.rng) {
        child.evaluated = evaluated;
      }
    }
    Ok(n)
  }

  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
    Box::new(self.clone())
  }
}

/// Passes individuals through, optionally as deep copies.
#[derive(Clone, Debug)]
pub struct ReproductionPipeline<G: Genome, F: Fitness> {
  sources: Sources<G, F>,
  /// Emit deep copies instead of genome-sharing duplicates.
  pub must_clone: bool,
}

impl<G: Genome, F: Fitness> ReproductionPipeline<G, F> {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "reproduce";

  /// Creates a pipeline passing on the individuals of `source`.
  pub fn new(source: Box<dyn BreedingSource<G, F>>) -> Self {
    Self {
      sources: vec![source],
      must_clone: false,
    }
  }

  /// Emit deep copies.
  pub fn cloning(mut self) -> Self {
    self.must_clone = true;
    self
  }

  /// Reads `must-clone` under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    sources: Sources<G, F>,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let must_clone = errors.collect(params.get_bool(
      &base.push("must-clone"),
      Some(&default.push("must-clone")),
      false,
    ));
    Some(Self {
      sources,
      must_clone: must_clone?,
    })
  }
}

impl<G: Genome, F: Fitness> BreedingSource<G, F>
  for ReproductionPipeline<G, F>
{
  fn name(&self) -> &'static str {
    "reproduction"
  }

  fn arity(&self) -> Arity {
    Arity::Exactly(1)
  }

  fn sources(&self) -> &[Box<dyn BreedingSource<G, F>>] {
    &self.sources
  }

  fn typical_outputs(&self) -> usize {
    self.sources.first().map_or(1, |s| s.typical_outputs())
  }

  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    prepare_sources(&mut self.sources, subpop, subpop_index)
  }

  fn produce(
    &mut self,
    min: usize,
    max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize> {
    let name = self.name();
    let source = self
      .sources
      .first_mut()
      .ok_or_else(|| missing_source(name, 0))?;
    let start = out.len();
    let n = produce_checked(
      source.as_mut(),
      min,
      max,
      subpop_index,
      subpop,
      out,
      ctx,
    )?;
    if self.must_clone {
      for child in &mut out[start..] {
        *child = child.deep_duplicate();
      }
    }
    Ok(n)
  }

  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
    Box::new(self.clone())
  }
}

/// Pulls a pool of evaluated individuals and passes on only the best ones.
#[derive(Clone, Debug)]
pub struct TruncationPipeline<G: Genome, F: Fitness> {
  sources: Sources<G, F>,
  /// Number of individuals pulled per call.
  pub pool: usize,
  /// Number of individuals passed on per call.
  pub keep: usize,
}

impl<G: Genome, F: Fitness> TruncationPipeline<G, F> {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "truncate";

  /// Keeps the best `keep` of every `pool` individuals of `source`.
  pub fn new(
    pool: usize,
    keep: usize,
    source: Box<dyn BreedingSource<G, F>>,
  ) -> Self {
    Self {
      sources: vec![source],
      pool,
      keep,
    }
  }

  /// Reads `pool` and `keep` under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    sources: Sources<G, F>,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let pool = errors.collect(params.get_int(
      &base.push("pool"),
      Some(&default.push("pool")),
      1,
    ));
    let keep = errors.collect(params.get_usize_or(
      &base.push("keep"),
      Some(&default.push("keep")),
      1,
    ));
    Some(Self {
      sources,
      pool: pool? as usize,
      keep: keep?,
    })
  }
}

impl<G: Genome, F: Fitness> BreedingSource<G, F> for TruncationPipeline<G, F> {
  fn name(&self) -> &'static str {
    "truncation"
  }

  fn arity(&self) -> Arity {
    Arity::Exactly(1)
  }

  fn sources(&self) -> &[Box<dyn BreedingSource<G, F>>] {
    &self.sources
  }

  fn typical_outputs(&self) -> usize {
    self.keep
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    if self.keep > self.pool {
      errors.report(
        path.push("keep"),
        format!("{} is larger than the pool of {}", self.keep, self.pool),
      );
    }
  }

  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    prepare_sources(&mut self.sources, subpop, subpop_index)
  }

  fn produce(
    &mut self,
    min: usize,
    max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize> {
    let name = self.name();
    let n = self.keep.max(min).min(max);
    let wanted = self.pool.max(n);
    let source = self
      .sources
      .first_mut()
      .ok_or_else(|| missing_source(name, 0))?;
    let mut pool = Vec::with_capacity(wanted);
    while pool.len() < wanted {
      let remaining = wanted - pool.len();
      produce_checked(
        source.as_mut(),
        1,
        remaining,
        subpop_index,
        subpop,
        &mut pool,
        ctx,
      )?;
    }
    if pool.iter().any(|ind| !ind.evaluated) {
      return Err(Error::Breeding {
        source_name: name,
        message: "can only rank evaluated individuals".to_owned(),
      });
    }
    // equally good individuals keep their pull order
    let order = best_first(&pool);
    let mut pool: Vec<_> = pool.into_iter().map(Some).collect();
    out.extend(order.into_iter().take(n).filter_map(|i| pool[i].take()));
    Ok(n)
  }

  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
    Box::new(self.clone())
  }
}

/// Delegates each call to one of its sources, picked at random in
/// proportion to the source weights.
#[derive(Clone, Debug)]
pub struct MultiBreedingPipeline<G: Genome, F: Fitness> {
  sources: Sources<G, F>,
  weights: Vec<f64>,
  /// Ask the picked source for the maximum number of individuals.
  pub generate_max: bool,
}

impl<G: Genome, F: Fitness> MultiBreedingPipeline<G, F> {
  /// Default parameter base.
  pub const DEFAULT_BASE: &'static str = "multi";

  /// Creates a pipeline over `(weight, source)` pairs.
  pub fn new(
    weighted: impl IntoIterator<Item = (f64, Box<dyn BreedingSource<G, F>>)>,
  ) -> Self {
    let (weights, sources) = weighted.into_iter().unzip();
    Self {
      sources,
      weights,
      generate_max: false,
    }
  }

  /// Always produce the maximum number of individuals.
  pub fn generating_max(mut self) -> Self {
    self.generate_max = true;
    self
  }

  /// Relative source weights.
  pub fn weights(&self) -> &[f64] {
    &self.weights
  }

  /// Reads `generate-max` and the weights `source.<i>.prob` (default 1)
  /// under `base`.
  pub fn from_parameters(
    params: &dyn Parameters,
    base: &Key,
    sources: Sources<G, F>,
    errors: &mut SetupErrors,
  ) -> Option<Self> {
    let default = Key::new(Self::DEFAULT_BASE);
    let generate_max = errors.collect(params.get_bool(
      &base.push("generate-max"),
      Some(&default.push("generate-max")),
      false,
    ));
    let weights: Vec<Option<f64>> = (0..sources.len())
      .map(|i| {
        let key = base.push("source").push(i).push("prob");
        if params.contains(&key, None) {
          errors.collect(params.get_double(&key, None, 0.0))
        } else {
          Some(1.0)
        }
      })
      .collect();
    Some(Self {
      sources,
      weights: weights.into_iter().collect::<Option<_>>()?,
      generate_max: generate_max?,
    })
  }

  fn pick(&self, rng: &mut EvoRng) -> usize {
    let total: f64 = self.weights.iter().sum();
    let mut spin = rng.gen::<f64>() * total;
    for (i, &w) in self.weights.iter().enumerate() {
      if spin < w {
        return i;
      }
      spin -= w;
    }
    // rounding left the spin past the last weight
    self.weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
  }
}

impl<G: Genome, F: Fitness> BreedingSource<G, F>
  for MultiBreedingPipeline<G, F>
{
  fn name(&self) -> &'static str {
    "multi"
  }

  fn arity(&self) -> Arity {
    Arity::AtLeast(1)
  }

  fn sources(&self) -> &[Box<dyn BreedingSource<G, F>>] {
    &self.sources
  }

  fn typical_outputs(&self) -> usize {
    let outputs = self.sources.iter().map(|s| s.typical_outputs());
    let typical = if self.generate_max {
      outputs.max()
    } else {
      outputs.min()
    };
    typical.unwrap_or(1)
  }

  fn check(&self, path: &Key, errors: &mut SetupErrors) {
    for (i, &w) in self.weights.iter().enumerate() {
      if !w.is_finite() || w < 0.0 {
        errors.report(
          path.push("source").push(i).push("prob"),
          format!("{w} is not a valid weight"),
        );
      }
    }
    if self.weights.iter().sum::<f64>() <= 0.0 {
      errors.report(path, "source weights sum to zero");
    }
  }

  fn prepare_to_produce(
    &mut self,
    subpop: &Subpopulation<G, F>,
    subpop_index: usize,
  ) -> Result<()> {
    prepare_sources(&mut self.sources, subpop, subpop_index)
  }

  fn produce(
    &mut self,
    min: usize,
    max: usize,
    subpop_index: usize,
    subpop: &Subpopulation<G, F>,
    out: &mut Vec<Individual<G, F>>,
    ctx: &mut BreedContext<'_>,
  ) -> Result<usize> {
    if self.sources.is_empty() {
      return Err(missing_source(self.name(), 0));
    }
    let picked = self.pick(ctx.rng);
    let source = self.sources[picked].as_mut();
    if !self.generate_max {
      return produce_checked(source, min, max, subpop_index, subpop, out, ctx);
    }
    let mut produced = 0;
    while produced < max {
      produced += produce_checked(
        source,
        1,
        max - produced,
        subpop_index,
        subpop,
        out,
        ctx,
      )?;
    }
    Ok(produced)
  }

  fn box_clone(&self) -> Box<dyn BreedingSource<G, F>> {
    Box::new(self.clone())
  }
}

#[cfg(test)]
mod tests {
  use rand::SeedableRng;

  use super::*;
  use crate::{
    breeding::validate,
    fitness::ScalarFitness,
    selection::{SelectionSource, Tournament, Uniform},
  };

  type G = Vec<bool>;
  type F = ScalarFitness;
  type Source = Box<dyn BreedingSource<G, F>>;

  fn uniform() -> Source {
    Box::new(SelectionSource::new(Uniform))
  }

  fn subpop(genomes: &[Vec<bool>]) -> Subpopulation<G, F> {
    Subpopulation::from_individuals(
      genomes
        .iter()
        .map(|g| {
          let ones = g.iter().filter(|b| **b).count() as f64;
          Individual::with_fitness(g.clone(), ScalarFitness::new(ones))
        })
        .collect(),
    )
    .unwrap()
  }

  fn breed(
    source: &mut dyn BreedingSource<G, F>,
    subpop: &Subpopulation<G, F>,
    min: usize,
    max: usize,
  ) -> Result<Vec<Individual<G, F>>> {
    let mut rng = EvoRng::seed_from_u64(21);
    let mut ctx = BreedContext {
      thread: 0,
      generation: 0,
      rng: &mut rng,
    };
    source.prepare_to_produce(subpop, 0)?;
    let mut out = Vec::new();
    produce_checked(source, min, max, 0, subpop, &mut out, &mut ctx)?;
    Ok(out)
  }

  #[test]
  fn test_crossover_with_one_source_fails_validation() {
    let pipe = CrossoverPipeline::new(CrossoverKind::OnePoint, vec![uniform()]);
    let mut errors = SetupErrors::new();
    validate::<G, F>(&pipe, &Key::new("pop.subpop.0.pipe"), &mut errors);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.errors()[0].key.as_str(), "pop.subpop.0.pipe");
    assert!(errors.errors()[0].message.contains("exactly 2"));
  }

  #[test]
  fn test_validation_reports_every_problem() {
    let bad_crossover =
      CrossoverPipeline::<G, F>::new(CrossoverKind::TwoPoint, vec![])
        .with_likelihood(1.5);
    let pipe = MutationPipeline::new(
      MutationParams {
        per_gene: -0.1,
        ..MutationParams::default()
      },
      Box::new(bad_crossover),
    );
    let mut errors = SetupErrors::new();
    validate::<G, F>(&pipe, &Key::new("pipe"), &mut errors);
    let keys: Vec<&str> =
      errors.errors().iter().map(|e| e.key.as_str()).collect();
    assert_eq!(
      keys,
      vec!["pipe.per-gene", "pipe.source.0", "pipe.source.0.likelihood"]
    );
  }

  #[test]
  fn test_crossover_children() {
    let s = subpop(&[vec![true; 6], vec![false; 6]]);
    let mut pipe = CrossoverPipeline::new(
      CrossoverKind::OnePoint,
      vec![uniform(), uniform()],
    );
    let out = breed(&mut pipe, &s, 1, 10).unwrap();
    assert_eq!(out.len(), 2);

    let mut tossing = pipe.clone().tossing_second();
    assert_eq!(breed(&mut tossing, &s, 1, 10).unwrap().len(), 1);
    assert_eq!(breed(&mut tossing, &s, 3, 3).unwrap().len(), 3);
    assert_eq!(breed(&mut pipe, &s, 3, 3).unwrap().len(), 3);
  }

  #[test]
  fn test_crossover_not_applied_passes_parents_through() {
    let s = subpop(&[vec![true; 6], vec![false; 6]]);
    let mut pipe = CrossoverPipeline::new(
      CrossoverKind::Uniform(0.5),
      vec![uniform(), uniform()],
    )
    .with_likelihood(0.0);
    for child in breed(&mut pipe, &s, 2, 2).unwrap() {
      assert!(child.evaluated);
      assert!(s.individuals().iter().any(|p| p.shares_genome_with(&child)));
    }
  }

  #[test]
  fn test_mutation_never_touches_parents() {
    let s = subpop(&[vec![false; 8], vec![false; 8]]);
    let mut pipe = MutationPipeline::new(
      MutationParams {
        per_gene: 1.0,
        ..MutationParams::default()
      },
      uniform(),
    );
    let out = breed(&mut pipe, &s, 4, 4).unwrap();
    for child in &out {
      assert_eq!(child.genome(), &vec![true; 8]);
      assert!(!child.evaluated);
    }
    for parent in s.individuals() {
      assert_eq!(parent.genome(), &vec![false; 8]);
      assert!(parent.evaluated);
    }
  }

  #[test]
  fn test_unchanged_mutants_stay_evaluated() {
    let s = subpop(&[vec![true; 3]]);
    let mut pipe = MutationPipeline::new(
      MutationParams {
        per_gene: 0.0,
        ..MutationParams::default()
      },
      uniform(),
    );
    assert!(breed(&mut pipe, &s, 2, 2)
      .unwrap()
      .iter()
      .all(|child| child.evaluated));
  }

  #[test]
  fn test_reproduction_must_clone() {
    let s = subpop(&[vec![true, false]]);
    let mut shallow = ReproductionPipeline::new(uniform());
    let child = &breed(&mut shallow, &s, 1, 1).unwrap()[0];
    assert!(child.shares_genome_with(&s[0]));

    let mut deep = ReproductionPipeline::new(uniform()).cloning();
    let child = &breed(&mut deep, &s, 1, 1).unwrap()[0];
    assert!(!child.shares_genome_with(&s[0]));
    assert!(child.genome_eq(&s[0]));
    assert!(child.evaluated);
  }

  #[test]
  fn test_truncation_keeps_the_best() {
    let s = subpop(&[
      vec![false, false],
      vec![true, false],
      vec![true, true],
    ]);
    let source = Box::new(SelectionSource::new(Tournament::new(1)));
    let mut pipe = TruncationPipeline::new(30, 1, source);
    let out = breed(&mut pipe, &s, 1, 1).unwrap();
    assert_eq!(out[0].genome(), &vec![true, true]);
  }

  #[test]
  fn test_truncation_needs_evaluated_individuals() {
    let mut s = subpop(&[vec![true]]);
    s[0].evaluated = false;
    let mut pipe = TruncationPipeline::new(2, 1, uniform());
    let err = breed(&mut pipe, &s, 1, 1).unwrap_err();
    assert!(matches!(err, Error::Breeding { source_name: "truncation", .. }));
  }

  #[test]
  fn test_multi_respects_weights() {
    let s = subpop(&[vec![true; 4]]);
    let mut pipe = MultiBreedingPipeline::new([
      (0.0, uniform()),
      (1.0, Box::new(ReproductionPipeline::new(uniform()).cloning()) as Source),
    ]);
    for child in breed(&mut pipe, &s, 5, 5).unwrap() {
      assert!(!child.shares_genome_with(&s[0]));
    }
    assert_eq!(pipe.weights(), &[0.0, 1.0]);

    let mut greedy = pipe.clone().generating_max();
    assert_eq!(breed(&mut greedy, &s, 1, 7).unwrap().len(), 7);
  }

  #[test]
  fn test_crossover_from_parameters() {
    let params: crate::config::ParameterDatabase = "
      pipe.type = any
      pipe.likelihood = 0.9
      xover.prob = 0.3
      xover.toss = true
    "
    .parse()
    .unwrap();
    let mut errors = SetupErrors::new();
    let pipe = CrossoverPipeline::<G, F>::from_parameters(
      &params,
      &Key::new("pipe"),
      vec![uniform(), uniform()],
      &mut errors,
    )
    .unwrap();
    assert!(errors.is_empty());
    assert_eq!(pipe.kind, CrossoverKind::Uniform(0.3));
    assert_eq!(pipe.likelihood, 0.9);
    assert!(pipe.toss_second);

    let bad: crate::config::ParameterDatabase =
      "pipe.type = three\npipe.likelihood = 2".parse().unwrap();
    let mut errors = SetupErrors::new();
    let pipe = CrossoverPipeline::<G, F>::from_parameters(
      &bad,
      &Key::new("pipe"),
      vec![],
      &mut errors,
    );
    assert!(pipe.is_none());
    assert_eq!(errors.len(), 2);
  }

  #[test]
  fn test_invalid_sigma_fails_validation() {
    for sigma in [-1.0, f64::NAN, f64::INFINITY] {
      let params = MutationParams {
        sigma,
        ..MutationParams::default()
      };
      let pipe = MutationPipeline::<Vec<f64>, F>::new(
        params,
        Box::new(SelectionSource::new(Uniform)),
      );
      let mut errors = SetupErrors::new();
      validate::<Vec<f64>, F>(&pipe, &Key::new("pipe"), &mut errors);
      assert_eq!(errors.len(), 1);
      assert_eq!(errors.errors()[0].key.as_str(), "pipe.sigma");
    }
  }

  #[test]
  fn test_negative_keep_is_reported() {
    let params: crate::config::ParameterDatabase =
      "t.pool = 4\nt.keep = -1".parse().unwrap();
    let mut errors = SetupErrors::new();
    let pipe = TruncationPipeline::<G, F>::from_parameters(
      &params,
      &Key::new("t"),
      vec![uniform()],
      &mut errors,
    );
    assert!(pipe.is_none());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.errors()[0].key.as_str(), "t.keep");
  }

  #[test]
  fn test_mutation_bounds_from_parameters() {
    let params: crate::config::ParameterDatabase =
      "m.min-gene = 1\nm.max-gene = 0".parse().unwrap();
    let mut errors = SetupErrors::new();
    let pipe = MutationPipeline::<Vec<f64>, F>::from_parameters(
      &params,
      &Key::new("m"),
      vec![],
      &mut errors,
    );
    assert!(pipe.is_none());
    assert_eq!(errors.errors()[0].key.as_str(), "m.max-gene");
  }
}
