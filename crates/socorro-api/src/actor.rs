//! The authenticated principal, as seen by handlers.

use axum::{extract::FromRequestParts, http::request::Parts};
use socorro_core::access::Actor;

use crate::error::ApiError;

/// Extracts the [`Actor`] an authentication layer placed in the request
/// extensions. Requests that reach a handler without one get a 401.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<St: Send + Sync> FromRequestParts<St> for CurrentActor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Actor>()
      .cloned()
      .map(CurrentActor)
      .ok_or(ApiError::Unauthenticated)
  }
}
