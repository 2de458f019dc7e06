//! Handlers for permissions, roles and users.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/me` | The authenticated actor |
//! | `GET`    | `/permissions` | Grouped by module |
//! | `GET`    | `/roles` | |
//! | `POST`   | `/roles` | |
//! | `GET`    | `/roles/{id}` | |
//! | `PUT`    | `/roles/{id}` | 403 for protected roles |
//! | `DELETE` | `/roles/{id}` | 403 for protected roles |
//! | `GET`    | `/users` | |
//! | `POST`   | `/users` | Body carries a plaintext password |
//! | `GET`    | `/users/{id}` | |
//! | `PUT`    | `/users/{id}/roles` | Body: `{"role_ids":[…]}` |
//! | `PUT`    | `/users/{id}/active` | Body: `{"active":false}` |
//!
//! Role changes drop the whole permission cache; a role-set or activation
//! change drops only that user's entry.

use std::collections::BTreeSet;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rand_core::OsRng;
use serde::Deserialize;
use socorro_core::{
  Error as DomainError,
  access::{self, Actor, NewUser, PermissionGroup, Role, RoleInput, User, perm},
  store::Store,
};
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

/// Argon2 PHC string for `password`, with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// `GET /me`
pub async fn me(CurrentActor(actor): CurrentActor) -> Json<Actor> { Json(actor) }

/// `GET /permissions`
pub async fn list_permissions<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<PermissionGroup>>, ApiError> {
  actor.require(perm::MANAGE_ROLES)?;
  let names = app.store.list_permissions().await.map_err(ApiError::from_store)?;
  Ok(Json(access::group_by_module(names.iter().map(String::as_str))))
}

// ─── Roles ───────────────────────────────────────────────────────────────────

/// `GET /roles`
pub async fn list_roles<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Role>>, ApiError> {
  actor.require(perm::MANAGE_ROLES)?;
  Ok(Json(app.store.list_roles().await.map_err(ApiError::from_store)?))
}

/// `POST /roles`
pub async fn create_role<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<RoleInput>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_ROLES)?;
  let role = app.store.create_role(body).await.map_err(ApiError::from_store)?;
  app.permissions.clear();
  tracing::info!(role = %role.name, by = %actor.username, "role created");
  Ok((StatusCode::CREATED, Json(role)))
}

/// `GET /roles/{id}`
pub async fn get_role<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<Role>, ApiError> {
  actor.require(perm::MANAGE_ROLES)?;
  let role = app
    .store
    .get_role(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("role", id))?;
  Ok(Json(role))
}

/// `PUT /roles/{id}`
pub async fn update_role<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleInput>,
) -> Result<Json<Role>, ApiError> {
  actor.require(perm::MANAGE_ROLES)?;
  let role = app.store.update_role(id, body).await.map_err(ApiError::from_store)?;
  app.permissions.clear();
  tracing::info!(role = %role.name, by = %actor.username, "role updated");
  Ok(Json(role))
}

/// `DELETE /roles/{id}`
pub async fn delete_role<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  actor.require(perm::MANAGE_ROLES)?;
  app.store.delete_role(id).await.map_err(ApiError::from_store)?;
  app.permissions.clear();
  tracing::info!(role_id = %id, by = %actor.username, "role deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserBody {
  pub username:     String,
  pub display_name: String,
  pub password:     String,
  #[serde(default)]
  pub role_ids:     BTreeSet<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RolesBody {
  pub role_ids: BTreeSet<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// `GET /users`
pub async fn list_users<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<User>>, ApiError> {
  actor.require(perm::MANAGE_USERS)?;
  Ok(Json(app.store.list_users().await.map_err(ApiError::from_store)?))
}

/// `POST /users`
pub async fn create_user<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<UserBody>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_USERS)?;
  if body.password.is_empty() {
    return Err(DomainError::invalid("password", "password is required").into());
  }
  let password_hash =
    hash_password(&body.password).map_err(|e| ApiError::Store(e.to_string().into()))?;

  let user = app
    .store
    .create_user(NewUser {
      username: body.username,
      display_name: body.display_name,
      password_hash,
      role_ids: body.role_ids,
    })
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(user = %user.username, by = %actor.username, "user created");
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/{id}`
pub async fn get_user<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
  actor.require(perm::MANAGE_USERS)?;
  let user = app
    .store
    .get_user(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("user", id))?;
  Ok(Json(user))
}

/// `PUT /users/{id}/roles`
pub async fn set_user_roles<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<RolesBody>,
) -> Result<Json<User>, ApiError> {
  actor.require(perm::MANAGE_USERS)?;
  let user = app.store.set_user_roles(id, body.role_ids).await.map_err(ApiError::from_store)?;
  app.permissions.invalidate(id);
  tracing::info!(user = %user.username, by = %actor.username, "user roles replaced");
  Ok(Json(user))
}

/// `PUT /users/{id}/active`
pub async fn set_user_active<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<User>, ApiError> {
  actor.require(perm::MANAGE_USERS)?;
  if id == actor.user_id && !body.active {
    return Err(DomainError::invalid("active", "you cannot deactivate your own account").into());
  }
  let user = app.store.set_user_active(id, body.active).await.map_err(ApiError::from_store)?;
  app.permissions.invalidate(id);
  tracing::info!(
    user = %user.username,
    active = user.active,
    by = %actor.username,
    "user activation changed"
  );
  Ok(Json(user))
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHash, PasswordVerifier};

  use super::*;

  #[test]
  fn hashes_verify_and_are_salted() {
    let a = hash_password("hunter2").unwrap();
    let b = hash_password("hunter2").unwrap();
    assert_ne!(a, b);
    let parsed = PasswordHash::new(&a).unwrap();
    assert!(Argon2::default().verify_password(b"hunter2", &parsed).is_ok());
    assert!(Argon2::default().verify_password(b"hunter3", &parsed).is_err());
  }
}
