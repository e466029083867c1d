//! Worker threads and their random number streams.
//!
//! A run owns one fixed-size [rayon] pool and one RNG per worker. Work is
//! always split into contiguous chunks, and chunk `i` is always processed
//! with worker `i`'s RNG (and worker `i`'s problem or pipeline clone), so
//! results do not depend on how the pool schedules its threads.

use std::ops::Range;

use rand::{rngs::StdRng, SeedableRng};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::SetupError;

/// Random number generator type used across the crate.
pub type EvoRng = StdRng;

/// The fixed worker pool of a run.
pub struct Workers {
  pool: ThreadPool,
  rngs: Vec<EvoRng>,
  main: EvoRng,
  seed: u64,
}

impl Workers {
  /// Builds a pool of `threads` workers whose RNGs are seeded with
  /// `seed + thread_index`. The main RNG is seeded with `seed + threads`.
  pub fn new(threads: usize, seed: u64) -> Result<Self, SetupError> {
    if threads == 0 {
      return Err(SetupError::new("threads", "must be at least 1"));
    }
    let pool = ThreadPoolBuilder::new()
      .num_threads(threads)
      .thread_name(|i| format!("evobreed-worker-{i}"))
      .build()
      .map_err(|e| SetupError::new("threads", e.to_string()))?;
    Ok(Self {
      pool,
      rngs: seed_rngs(threads, seed),
      main: EvoRng::seed_from_u64(seed.wrapping_add(threads as u64)),
      seed,
    })
  }

  /// Number of workers.
  pub fn threads(&self) -> usize {
    self.rngs.len()
  }

  /// The run seed.
  pub fn seed(&self) -> u64 {
    self.seed
  }

  /// RNG for work done on the calling thread between parallel phases. It
  /// shares no stream with the workers.
  pub fn main_rng(&mut self) -> &mut EvoRng {
    &mut self.main
  }

  /// Runs `op` inside the pool, handing it every worker's RNG.
  pub fn install<R, Op>(&mut self, op: Op) -> R
  where
    R: Send,
    Op: FnOnce(&mut [EvoRng]) -> R + Send,
  {
    let rngs = &mut self.rngs;
    self.pool.install(move || op(rngs.as_mut_slice()))
  }
}

impl std::fmt::Debug for Workers {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Workers")
      .field("threads", &self.threads())
      .field("seed", &self.seed)
      .finish()
  }
}

/// Creates `threads` RNGs, seeding stream `i` with `seed + i`.
pub fn seed_rngs(threads: usize, seed: u64) -> Vec<EvoRng> {
  (0..threads)
    .map(|i| EvoRng::seed_from_u64(seed.wrapping_add(i as u64)))
    .collect()
}

/// Splits `0..len` into at most `parts` contiguous, non-empty ranges whose
/// lengths differ by at most one. Earlier ranges are the longer ones.
pub fn split_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
  let parts = parts.max(1).min(len);
  if parts == 0 {
    return Vec::new();
  }
  let (base, extra) = (len / parts, len % parts);
  let mut start = 0;
  (0..parts)
    .map(|i| {
      let size = base + usize::from(i < extra);
      let range = start..start + size;
      start += size;
      range
    })
    .collect()
}

/// Chunk size that splits `len` items into at most `parts` chunks.
pub fn chunk_size(len: usize, parts: usize) -> usize {
  len.div_ceil(parts.max(1)).max(1)
}
