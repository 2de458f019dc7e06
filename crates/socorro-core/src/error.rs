//! Error types for `socorro-core`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

/// An accumulated list of field errors.
///
/// Validation collects every problem it finds before failing, so callers can
/// show the whole list at once instead of one error per round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  /// A list holding exactly one error.
  pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.push(field, message);
    errors
  }

  pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.push(FieldError { field: field.into(), message: message.into() });
  }

  /// Record `message` against `field` when `value` is blank.
  pub fn require(&mut self, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
      self.push(field, message);
    }
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn fields(&self) -> &[FieldError] { &self.0 }

  /// `Ok(())` when nothing was recorded, otherwise [`Error::Validation`].
  pub fn into_result(self) -> Result<()> {
    if self.is_empty() { Ok(()) } else { Err(Error::Validation(self)) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .0
      .iter()
      .map(|e| format!("{}: {}", e.field, e.message))
      .collect();
    f.write_str(&parts.join("; "))
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("{entity} {id} cannot move from {from} to {to}")]
  InvalidTransition {
    entity: &'static str,
    id:     Uuid,
    from:   String,
    to:     String,
  },

  #[error("permission denied: missing {0:?}")]
  PermissionDenied(String),

  #[error(
    "insufficient stock for supply {supply_id}: requested {requested}, available {available}"
  )]
  InsufficientStock {
    supply_id: Uuid,
    requested: i64,
    available: i64,
  },

  #[error("role {0:?} is protected and cannot be modified")]
  ProtectedRole(String),

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }

  pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Validation(ValidationErrors::single(field, message))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_list_is_ok() {
    assert!(ValidationErrors::new().into_result().is_ok());
  }

  #[test]
  fn require_flags_whitespace_only_values() {
    let mut errors = ValidationErrors::new();
    errors.require("first_name", "   ", "first name is required");
    errors.require("last_name", "Pérez", "last name is required");
    assert_eq!(errors.fields().len(), 1);
    assert_eq!(errors.fields()[0].field, "first_name");
  }

  #[test]
  fn display_joins_every_field() {
    let mut errors = ValidationErrors::new();
    errors.push("a", "bad");
    errors.push("b", "worse");
    assert_eq!(errors.to_string(), "a: bad; b: worse");
  }
}
