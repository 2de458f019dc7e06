//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use socorro_core::{Error as DomainError, store::StoreError};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthenticated,

  #[error(transparent)]
  Domain(#[from] DomainError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Split a backend error into its domain part, if any.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    match err.into_domain() {
      Ok(domain) => Self::Domain(domain),
      Err(other) => Self::Store(Box::new(other)),
    }
  }

  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::Domain(DomainError::not_found(entity, id))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Unauthenticated => StatusCode::UNAUTHORIZED,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Self::Domain(e) => match e {
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidTransition { .. } | DomainError::InsufficientStock { .. } => {
          StatusCode::CONFLICT
        }
        DomainError::PermissionDenied(_) | DomainError::ProtectedRole(_) => StatusCode::FORBIDDEN,
        DomainError::UnknownDiscriminant { .. } | DomainError::Serialization(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::Domain(DomainError::Validation(errors)) => {
        json!({ "error": "validation failed", "fields": errors })
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        json!({ "error": "internal error" })
      }
      ApiError::Domain(e) if status.is_server_error() => {
        tracing::error!(error = %e, "corrupt stored data");
        json!({ "error": "internal error" })
      }
      other => json!({ "error": other.to_string() }),
    };

    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"socorro\""));
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use socorro_core::ValidationErrors;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn domain_errors_map_to_statuses() {
    let cases = [
      (DomainError::Validation(ValidationErrors::single("name", "required")), 422),
      (DomainError::not_found("case", Uuid::nil()), 404),
      (
        DomainError::InsufficientStock { supply_id: Uuid::nil(), requested: 5, available: 1 },
        409,
      ),
      (DomainError::PermissionDenied("review cases".into()), 403),
      (DomainError::ProtectedRole("super-admin".into()), 403),
    ];
    for (err, code) in cases {
      assert_eq!(ApiError::from(err).status().as_u16(), code);
    }
  }

  #[test]
  fn unauthenticated_carries_challenge() {
    let res = ApiError::Unauthenticated.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
