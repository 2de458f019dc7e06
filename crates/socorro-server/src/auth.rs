//! HTTP Basic authentication against stored users.
//!
//! [`require_auth`] runs in front of every API route. On success the resolved
//! [`Actor`] is placed in the request extensions, where
//! `socorro_api::actor::CurrentActor` picks it up.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use socorro_api::{ApiError, AppState};
use socorro_core::{
  access::Actor,
  store::{AccessStore, Store},
};

/// Decode `Authorization: Basic …` into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let encoded = value.strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (username, password) = creds.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Check `password` against an argon2 PHC string. Unparseable hashes never
/// match.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Resolve the actor behind the request's credentials.
pub async fn authenticate<S: Store>(
  state: &AppState<S>,
  headers: &HeaderMap,
) -> Result<Actor, ApiError> {
  let (username, password) = basic_credentials(headers).ok_or(ApiError::Unauthenticated)?;

  let Some(credentials) =
    state.store.user_credentials(&username).await.map_err(ApiError::from_store)?
  else {
    tracing::warn!(%username, "login for unknown user");
    return Err(ApiError::Unauthenticated);
  };
  if !credentials.active {
    tracing::warn!(%username, "login for inactive user");
    return Err(ApiError::Unauthenticated);
  }
  if !verify_password(&password, &credentials.password_hash) {
    tracing::warn!(%username, "wrong password");
    return Err(ApiError::Unauthenticated);
  }

  state
    .permissions
    .actor(state.store.as_ref(), &credentials)
    .await
    .map_err(ApiError::from_store)
}

/// Middleware: authenticate, then hand the request on with its actor.
pub async fn require_auth<S: Store + 'static>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Response {
  match authenticate(&state, req.headers()).await {
    Ok(actor) => {
      req.extensions_mut().insert(actor);
      next.run(req).await
    }
    Err(err) => err.into_response(),
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::BTreeSet, sync::Arc};

  use axum::http::HeaderValue;
  use socorro_api::access::hash_password;
  use socorro_core::access::{NewUser, RoleInput, perm};
  use socorro_store_sqlite::SqliteStore;

  use super::*;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.seed_access("super-admin").await.unwrap();
    let role = store
      .create_role(RoleInput {
        name:        "clerk".into(),
        description: None,
        permissions: [perm::VIEW_CITIZENS.to_string()].into(),
      })
      .await
      .unwrap();
    store
      .create_user(NewUser {
        username:      "user".into(),
        display_name:  "Clerk".into(),
        password_hash: hash_password(password).unwrap(),
        role_ids:      BTreeSet::from([role.role_id]),
      })
      .await
      .unwrap();
    AppState::new(Arc::new(store))
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let encoded = B64.encode(format!("{user}:{pass}"));
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Basic {encoded}")).unwrap());
    headers
  }

  #[tokio::test]
  async fn correct_credentials() {
    let state = make_state("secret").await;
    let actor = authenticate(&state, &basic("user", "secret")).await.unwrap();
    assert_eq!(actor.username, "user");
    assert!(actor.can(perm::VIEW_CITIZENS));
    assert!(!actor.can(perm::CREATE_CITIZENS));
    assert_eq!(state.permissions.len(), 1);
  }

  #[tokio::test]
  async fn wrong_password() {
    let state = make_state("secret").await;
    let err = authenticate(&state, &basic("user", "wrong")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));
  }

  #[tokio::test]
  async fn unknown_user() {
    let state = make_state("secret").await;
    let err = authenticate(&state, &basic("nobody", "secret")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));
  }

  #[tokio::test]
  async fn deactivated_user_is_locked_out() {
    let state = make_state("secret").await;
    authenticate(&state, &basic("user", "secret")).await.unwrap();
    let user_id = state.store.user_credentials("user").await.unwrap().unwrap().user_id;

    state.store.set_user_active(user_id, false).await.unwrap();
    let err = authenticate(&state, &basic("user", "secret")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));

    state.store.set_user_active(user_id, true).await.unwrap();
    assert!(authenticate(&state, &basic("user", "secret")).await.is_ok());
  }

  #[tokio::test]
  async fn missing_header() {
    let state = make_state("secret").await;
    let err = authenticate(&state, &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));
  }

  #[test]
  fn invalid_base64() {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!not-base64!!!"));
    assert!(basic_credentials(&headers).is_none());
  }

  #[test]
  fn passwords_may_contain_colons() {
    let (user, pass) = basic_credentials(&basic("user", "a:b:c")).unwrap();
    assert_eq!((user.as_str(), pass.as_str()), ("user", "a:b:c"));
  }

  #[test]
  fn garbage_hashes_never_match() {
    assert!(!verify_password("secret", "not-a-phc-string"));
  }
}
