//! Error types shared by every stage of a run.
//!
//! There are two severities. A [`SetupError`] is recoverable: setup routines
//! push it into a [`SetupErrors`] accumulator and keep validating, so that a
//! broken configuration is reported in one go. Everything else in [`Error`]
//! is fatal and stops the run after all worker threads have been joined.

use std::fmt;

use crate::{config::Key, fitness::Partner};

/// An alias for results produced by the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A recoverable error found while validating a run's setup.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("{key}: {message}")]
pub struct SetupError {
  /// Parameter (or pipeline path) the error refers to.
  pub key: Key,
  /// Human readable description.
  pub message: String,
}

impl SetupError {
  /// Creates a new setup error for `key`.
  pub fn new(key: impl Into<Key>, message: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      message: message.into(),
    }
  }
}

/// Accumulates [`SetupError`]s so that all of them can be reported together.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SetupErrors(Vec<SetupError>);

impl SetupErrors {
  /// Creates an empty accumulator.
  pub fn new() -> Self {
    Self::default()
  }

  /// Records an error.
  pub fn push(&mut self, error: SetupError) {
    tracing::debug!(key = %error.key, message = %error.message, "setup error");
    self.0.push(error);
  }

  /// Records an error for `key`.
  pub fn report(&mut self, key: impl Into<Key>, message: impl Into<String>) {
    self.push(SetupError::new(key, message));
  }

  /// Moves all errors of `other` into `self`.
  pub fn extend(&mut self, other: SetupErrors) {
    self.0.extend(other.0);
  }

  /// Records the error of `result` if there is one and returns its value.
  pub fn collect<T>(&mut self, result: Result<T, SetupError>) -> Option<T> {
    match result {
      Ok(value) => Some(value),
      Err(error) => {
        self.push(error);
        None
      }
    }
  }

  /// Returns `true` if no error was recorded.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Number of recorded errors.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Recorded errors in the order they were found.
  pub fn errors(&self) -> &[SetupError] {
    &self.0
  }

  /// Fails with [`Error::Setup`] if any error was recorded.
  pub fn finish(self) -> Result<()> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(Error::Setup(self))
    }
  }
}

impl fmt::Display for SetupErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} setup error(s)", self.0.len())?;
    for error in &self.0 {
      write!(f, "\n  {error}")?;
    }
    Ok(())
  }
}

/// An error reported by a [`Problem`](crate::problem::Problem) that the
/// problem cannot recover from.
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
#[error("{0}")]
pub struct ProblemError(pub String);

impl ProblemError {
  /// Creates a problem error with the given message.
  pub fn new(message: impl Into<String>) -> Self {
    Self(message.into())
  }
}

/// Errors that stop a run.
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum Error {
  /// Setup validation failed. Holds every error found.
  #[error("{0}")]
  Setup(SetupErrors),
  /// A problem failed while evaluating on a worker thread.
  #[error("problem failed on thread {thread}: {source}")]
  Problem {
    /// Index of the worker thread.
    thread: usize,
    /// The problem's error.
    source: ProblemError,
  },
  /// An individual without fitness reached a stage that requires one.
  #[error("individual {index} of subpopulation {subpop} has no fitness")]
  MissingFitness {
    /// Subpopulation index.
    subpop: usize,
    /// Individual index inside the subpopulation.
    index: usize,
  },
  /// Multi-objective fitnesses with different numbers of objectives met.
  #[error("expected {expected} objectives, found {found}")]
  ObjectiveMismatch {
    /// Objective count of the first individual.
    expected: usize,
    /// Offending objective count.
    found: usize,
  },
  /// An individual of the wrong species entered a subpopulation.
  #[error("species mismatch: expected `{expected}`, found `{found}`")]
  SpeciesMismatch {
    /// Species of the subpopulation.
    expected: &'static str,
    /// Species of the individual.
    found: &'static str,
  },
  /// A subpopulation that must provide individuals is empty.
  #[error("subpopulation {subpop} is empty")]
  EmptySubpopulation {
    /// Subpopulation index.
    subpop: usize,
  },
  /// A fitness value cannot be used by the requesting operator.
  #[error("invalid fitness: {0}")]
  InvalidFitness(String),
  /// A problem returned without marking the individual evaluated.
  #[error(
    "problem left individual {index} of subpopulation {subpop} unevaluated"
  )]
  NotEvaluated {
    /// Subpopulation index.
    subpop: usize,
    /// Individual index inside the subpopulation.
    index: usize,
  },
  /// A grouped trial refers to an individual that does not exist.
  #[error("no individual for group member {partner:?}")]
  UnknownPartner {
    /// The unresolvable participant.
    partner: Partner,
  },
  /// A breeding source broke its production contract.
  #[error("breeding failed in `{source_name}`: {message}")]
  Breeding {
    /// Name of the offending breeding source.
    source_name: &'static str,
    /// What went wrong.
    message: String,
  },
}

impl Error {
  /// Returns `true` for errors that abort a running generation loop, i.e.
  /// everything except setup errors.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, Error::Setup(_))
  }
}

impl From<SetupErrors> for Error {
  fn from(errors: SetupErrors) -> Self {
    Error::Setup(errors)
  }
}
