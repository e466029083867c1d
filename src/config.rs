//! Typed access to run parameters.
//!
//! Loading parameter files is not this crate's business. Components only need
//! the [`Parameters`] capability: look up a string by hierarchical [`Key`],
//! falling back to a default key, and convert it to the type they expect.
//! [`ParameterDatabase`] is a small in-memory implementation that is good
//! enough for tests, demos and programs that assemble their parameters in
//! code.
//!
//! Every typed getter returns a [`SetupError`] naming the key that was looked
//! up, so callers can push it into a
//! [`SetupErrors`](crate::error::SetupErrors) accumulator and keep validating.

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::SetupError;

/// A hierarchical, dot separated parameter key such as `pop.subpop.0.size`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Key(String);

impl Key {
  /// Creates a key from its dotted representation.
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  /// Returns a new key with `segment` appended.
  pub fn push(&self, segment: impl fmt::Display) -> Self {
    if self.0.is_empty() {
      Self(segment.to_string())
    } else {
      Self(format!("{}.{}", self.0, segment))
    }
  }

  /// Dotted representation of the key.
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Key {
  fn from(key: &str) -> Self {
    Self::new(key)
  }
}

impl From<String> for Key {
  fn from(key: String) -> Self {
    Self(key)
  }
}

impl From<&Key> for Key {
  fn from(key: &Key) -> Self {
    key.clone()
  }
}

/// Read access to a store of run parameters.
///
/// Only [`get_str`](Parameters::get_str) must be implemented. Typed getters
/// look up `key` first and `default` second; the key reported in errors is
/// always the primary one.
pub trait Parameters {
  /// Returns the raw value stored under `key`.
  fn get_str(&self, key: &Key) -> Option<&str>;

  /// Returns `true` if `key` or `default` holds a value.
  fn contains(&self, key: &Key, default: Option<&Key>) -> bool {
    self.lookup(key, default).is_some()
  }

  /// Returns the raw value of `key`, or of `default` if `key` is absent.
  fn lookup(&self, key: &Key, default: Option<&Key>) -> Option<&str> {
    self
      .get_str(key)
      .or_else(|| default.and_then(|d| self.get_str(d)))
      .map(str::trim)
  }

  /// Reads a required string.
  fn get_string(
    &self,
    key: &Key,
    default: Option<&Key>,
  ) -> Result<String, SetupError> {
    self
      .lookup(key, default)
      .map(str::to_owned)
      .ok_or_else(|| SetupError::new(key, "missing required parameter"))
  }

  /// Reads a required integer that must be at least `min`.
  fn get_int(
    &self,
    key: &Key,
    default: Option<&Key>,
    min: i64,
  ) -> Result<i64, SetupError> {
    let raw = self
      .lookup(key, default)
      .ok_or_else(|| SetupError::new(key, "missing required integer"))?;
    let value = raw.parse::<i64>().map_err(|_| {
      SetupError::new(key, format!("`{raw}` is not an integer"))
    })?;
    if value < min {
      return Err(SetupError::new(
        key,
        format!("{value} is smaller than the minimum {min}"),
      ));
    }
    Ok(value)
  }

  /// Reads an optional integer, returning `fallback` if neither key is set.
  fn get_int_or(
    &self,
    key: &Key,
    default: Option<&Key>,
    fallback: i64,
  ) -> Result<i64, SetupError> {
    match self.lookup(key, default) {
      None => Ok(fallback),
      Some(raw) => raw.parse::<i64>().map_err(|_| {
        SetupError::new(key, format!("`{raw}` is not an integer"))
      }),
    }
  }

  /// Reads a non-negative count, returning `fallback` if neither key is set.
  fn get_usize_or(
    &self,
    key: &Key,
    default: Option<&Key>,
    fallback: usize,
  ) -> Result<usize, SetupError> {
    if !self.contains(key, default) {
      return Ok(fallback);
    }
    self.get_int(key, default, 0).map(|v| v as usize)
  }

  /// Reads a boolean (`true`/`false`), returning `fallback` if neither key is
  /// set.
  fn get_bool(
    &self,
    key: &Key,
    default: Option<&Key>,
    fallback: bool,
  ) -> Result<bool, SetupError> {
    match self.lookup(key, default) {
      None => Ok(fallback),
      Some(raw) => raw.to_ascii_lowercase().parse::<bool>().map_err(|_| {
        SetupError::new(key, format!("`{raw}` is not a boolean"))
      }),
    }
  }

  /// Reads a required finite float that must be at least `min`.
  fn get_double(
    &self,
    key: &Key,
    default: Option<&Key>,
    min: f64,
  ) -> Result<f64, SetupError> {
    let raw = self
      .lookup(key, default)
      .ok_or_else(|| SetupError::new(key, "missing required number"))?;
    let value = raw
      .parse::<f64>()
      .ok()
      .filter(|v| v.is_finite())
      .ok_or_else(|| SetupError::new(key, format!("`{raw}` is not a number")))?;
    if value < min {
      return Err(SetupError::new(
        key,
        format!("{value} is smaller than the minimum {min}"),
      ));
    }
    Ok(value)
  }

  /// Reads a float in `[min, max]`, returning `fallback` if neither key is
  /// set.
  fn get_double_range(
    &self,
    key: &Key,
    default: Option<&Key>,
    min: f64,
    max: f64,
    fallback: f64,
  ) -> Result<f64, SetupError> {
    if !self.contains(key, default) {
      return Ok(fallback);
    }
    let value = self.get_double(key, default, min)?;
    if value > max {
      return Err(SetupError::new(
        key,
        format!("{value} is larger than the maximum {max}"),
      ));
    }
    Ok(value)
  }
}

/// An in-memory [`Parameters`] store.
///
/// Can be parsed from `key = value` lines; empty lines and lines starting
/// with `#` are skipped.
///
/// # Examples
/// ```
/// use evobreed::config::{Key, ParameterDatabase, Parameters};
///
/// let params: ParameterDatabase = "
///   ## two threads
///   threads = 2
///   pop.subpop.0.size = 50
/// "
/// .parse()
/// .unwrap();
/// assert_eq!(params.get_int(&Key::new("threads"), None, 1), Ok(2));
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ParameterDatabase {
  values: BTreeMap<Key, String>,
}

impl ParameterDatabase {
  /// Creates an empty database.
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets `key` to `value`, replacing any previous value.
  pub fn set(&mut self, key: impl Into<Key>, value: impl fmt::Display) {
    self.values.insert(key.into(), value.to_string());
  }

  /// Builder flavoured [`set`](Self::set).
  pub fn with(mut self, key: impl Into<Key>, value: impl fmt::Display) -> Self {
    self.set(key, value);
    self
  }

  /// Number of stored parameters.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  /// Returns `true` if no parameter is stored.
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

impl Parameters for ParameterDatabase {
  fn get_str(&self, key: &Key) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }
}

impl<K: Into<Key>, V: fmt::Display> FromIterator<(K, V)> for ParameterDatabase {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    let mut db = Self::new();
    for (k, v) in iter {
      db.set(k, v);
    }
    db
  }
}

impl FromStr for ParameterDatabase {
  type Err = SetupError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut db = Self::new();
    for (number, line) in s.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let (key, value) = line.split_once('=').ok_or_else(|| {
        SetupError::new(
          format!("line {}", number + 1),
          format!("expected `key = value`, found `{line}`"),
        )
      })?;
      db.set(key.trim(), value.trim());
    }
    Ok(db)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn db() -> ParameterDatabase {
    "
    threads = 4
    ratio = 0.25
    flag = TRUE
    bad = abc
    select.tournament.size = 7
    "
    .parse()
    .unwrap()
  }

  #[test]
  fn test_key_push() {
    let key = Key::new("pop").push("subpop").push(0).push("size");
    assert_eq!(key.as_str(), "pop.subpop.0.size");
    assert_eq!(Key::default().push("seed").as_str(), "seed");
  }

  #[test]
  fn test_typed_getters() {
    let db = db();
    assert_eq!(db.get_int(&"threads".into(), None, 1), Ok(4));
    assert_eq!(db.get_double(&"ratio".into(), None, 0.0), Ok(0.25));
    assert_eq!(db.get_bool(&"flag".into(), None, false), Ok(true));
    assert_eq!(db.get_bool(&"missing".into(), None, true), Ok(true));
    assert_eq!(db.get_int_or(&"missing".into(), None, 9), Ok(9));
  }

  #[test]
  fn test_default_key_fallback() {
    let db = db();
    let size = db.get_int(
      &"pop.subpop.0.pipe.size".into(),
      Some(&"select.tournament.size".into()),
      1,
    );
    assert_eq!(size, Ok(7));
  }

  #[test]
  fn test_errors_name_primary_key() {
    let db = db();
    let err = db.get_int(&"threads".into(), None, 8).unwrap_err();
    assert_eq!(err.key.as_str(), "threads");
    let err = db.get_int(&"bad".into(), None, 0).unwrap_err();
    assert!(err.message.contains("not an integer"));
    let err = db.get_double(&"nope".into(), None, 0.0).unwrap_err();
    assert!(err.message.contains("missing"));
    let err = db
      .get_double_range(&"ratio".into(), None, 0.0, 0.1, 0.0)
      .unwrap_err();
    assert!(err.message.contains("maximum"));
  }

  #[test]
  fn test_parse_rejects_garbage() {
    let err = "a = 1\nnot a pair".parse::<ParameterDatabase>().unwrap_err();
    assert_eq!(err.key.as_str(), "line 2");
  }
}
