//! HTTP server for Socorro.
//!
//! Wraps [`socorro_api::api_router`] with Basic authentication and request
//! tracing, and knows how to prepare a fresh database for first use.

pub mod auth;

use std::{collections::BTreeSet, path::PathBuf};

use axum::{Router, middleware};
use serde::Deserialize;
use socorro_api::{AppState, LookupConfig, api_router};
use socorro_core::{
  access::NewUser,
  store::{AccessStore, Store},
};
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_super_role() -> String { "super-admin".to_owned() }

fn default_lookup_timeout() -> u64 { 10 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `SOCORRO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub database_path:       PathBuf,
  pub admin_username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub admin_password_hash: String,
  #[serde(default = "default_super_role")]
  pub super_role:          String,
  #[serde(default)]
  pub lookup_url:          Option<String>,
  #[serde(default)]
  pub lookup_token:        Option<String>,
  #[serde(default = "default_lookup_timeout")]
  pub lookup_timeout_secs: u64,
}

impl ServerConfig {
  /// Person directory settings, if a directory is configured.
  pub fn lookup(&self) -> Option<LookupConfig> {
    self.lookup_url.as_ref().map(|url| LookupConfig {
      url:          url.clone(),
      token:        self.lookup_token.clone(),
      timeout_secs: self.lookup_timeout_secs,
    })
  }
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Install the permission catalogue and the super-role, then make sure the
/// configured admin exists and holds that role. Safe to run on every start.
pub async fn bootstrap<S: Store>(store: &S, config: &ServerConfig) -> Result<(), S::Error> {
  let super_role = store.seed_access(&config.super_role).await?;

  match store.user_credentials(&config.admin_username).await? {
    None => {
      let user = store
        .create_user(NewUser {
          username:      config.admin_username.clone(),
          display_name:  config.admin_username.clone(),
          password_hash: config.admin_password_hash.clone(),
          role_ids:      BTreeSet::from([super_role.role_id]),
        })
        .await?;
      tracing::info!(username = %user.username, "admin user created");
    }
    Some(existing) => {
      let mut role_ids = store
        .get_user(existing.user_id)
        .await?
        .map(|u| u.role_ids)
        .unwrap_or_default();
      if role_ids.insert(super_role.role_id) {
        store.set_user_roles(existing.user_id, role_ids).await?;
        tracing::info!(username = %existing.username, role = %super_role.name, "admin role restored");
      }
    }
  }
  Ok(())
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S: Store + 'static>(state: AppState<S>) -> Router {
  api_router(state.clone())
    .layer(middleware::from_fn_with_state(state, auth::require_auth::<S>))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use socorro_api::access::hash_password;
  use socorro_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  fn config(password_hash: String) -> ServerConfig {
    ServerConfig {
      host:                "127.0.0.1".into(),
      port:                8080,
      database_path:       PathBuf::from(":memory:"),
      admin_username:      "admin".into(),
      admin_password_hash: password_hash,
      super_role:          default_super_role(),
      lookup_url:          None,
      lookup_token:        None,
      lookup_timeout_secs: default_lookup_timeout(),
    }
  }

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    bootstrap(&store, &config(hash_password(password).unwrap())).await.unwrap();
    AppState::new(Arc::new(store))
  }

  async fn get(state: AppState<SqliteStore>, uri: &str, auth: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    router(state).oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[tokio::test]
  async fn bootstrap_is_idempotent() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cfg = config(hash_password("secret").unwrap());
    bootstrap(&store, &cfg).await.unwrap();
    bootstrap(&store, &cfg).await.unwrap();

    let users = store.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    let roles = store.list_roles().await.unwrap();
    assert_eq!(roles.len(), 1);
    assert!(roles[0].is_protected);
    assert!(users[0].role_ids.contains(&roles[0].role_id));
  }

  #[tokio::test]
  async fn bootstrap_restores_the_admin_role() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cfg = config(hash_password("secret").unwrap());
    bootstrap(&store, &cfg).await.unwrap();
    let admin = store.list_users().await.unwrap().remove(0);
    store.set_user_roles(admin.user_id, BTreeSet::new()).await.unwrap();

    bootstrap(&store, &cfg).await.unwrap();
    let admin = store.get_user(admin.user_id).await.unwrap().unwrap();
    assert_eq!(admin.role_ids.len(), 1);
  }

  #[tokio::test]
  async fn unauthenticated_requests_are_challenged() {
    let state = make_state("secret").await;
    let resp = get(state, "/me", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert_eq!(challenge, "Basic realm=\"socorro\"");
  }

  #[tokio::test]
  async fn wrong_password_is_rejected() {
    let state = make_state("secret").await;
    let resp = get(state, "/me", Some(&basic("admin", "nope"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn admin_holds_every_permission() {
    let state = make_state("secret").await;
    let resp = get(state.clone(), "/me", Some(&basic("admin", "secret"))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let me: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(me["username"], "admin");
    assert_eq!(
      me["permissions"].as_array().unwrap().len(),
      socorro_core::access::CATALOGUE.len()
    );

    let resp = get(state, "/roles", Some(&basic("admin", "secret"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
