//! Roles, users and the permission catalogue.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use socorro_core::{
  Error as CoreError, ValidationErrors,
  access::{CATALOGUE, Credentials, NewUser, Role, RoleInput, User},
  store::AccessStore,
};
use uuid::Uuid;

use super::SqliteStore;
use crate::{
  Result,
  encode::{decode_dt, decode_uuid, encode_dt, encode_uuid},
};

// ─── Roles ───────────────────────────────────────────────────────────────────

fn role_permissions(conn: &Connection, role_id: Uuid) -> Result<BTreeSet<String>> {
  let mut stmt = conn.prepare("SELECT permission FROM role_permissions WHERE role_id = ?1")?;
  let perms = stmt
    .query_map(params![encode_uuid(role_id)], |row| row.get(0))?
    .collect::<rusqlite::Result<BTreeSet<String>>>()?;
  Ok(perms)
}

fn get_role(conn: &Connection, id: Uuid) -> Result<Option<Role>> {
  let row = conn
    .query_row(
      "SELECT name, description, is_protected FROM roles WHERE role_id = ?1",
      params![encode_uuid(id)],
      |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, bool>(2)?))
      },
    )
    .optional()?;
  let Some((name, description, is_protected)) = row else {
    return Ok(None);
  };
  Ok(Some(Role {
    role_id: id,
    name,
    description,
    is_protected,
    permissions: role_permissions(conn, id)?,
  }))
}

fn role_id_by_name(conn: &Connection, name: &str) -> Result<Option<Uuid>> {
  let id: Option<String> = conn
    .query_row("SELECT role_id FROM roles WHERE name = ?1", params![name], |row| row.get(0))
    .optional()?;
  id.as_deref().map(decode_uuid).transpose()
}

fn list_roles(conn: &Connection) -> Result<Vec<Role>> {
  let mut stmt = conn.prepare("SELECT role_id FROM roles ORDER BY name")?;
  let ids = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
  let mut roles = Vec::with_capacity(ids.len());
  for id in ids {
    let id = decode_uuid(&id)?;
    if let Some(role) = get_role(conn, id)? {
      roles.push(role);
    }
  }
  Ok(roles)
}

fn grant_all(conn: &Connection, role_id: Uuid, permissions: &BTreeSet<String>) -> Result<()> {
  let mut stmt = conn
    .prepare("INSERT OR IGNORE INTO role_permissions (role_id, permission) VALUES (?1, ?2)")?;
  for p in permissions {
    stmt.execute(params![encode_uuid(role_id), p])?;
  }
  Ok(())
}

fn check_role_name(conn: &Connection, name: &str, self_id: Option<Uuid>) -> Result<()> {
  if let Some(holder) = role_id_by_name(conn, name)?
    && Some(holder) != self_id
  {
    return Err(CoreError::invalid("name", format!("role {name:?} already exists")).into());
  }
  Ok(())
}

fn create_role(conn: &mut Connection, input: RoleInput) -> Result<Role> {
  input.validate()?;
  let name = input.name.trim().to_owned();

  let tx = conn.transaction()?;
  check_role_name(&tx, &name, None)?;

  let role = Role {
    role_id: Uuid::new_v4(),
    name,
    description: input.description,
    is_protected: false,
    permissions: input.permissions,
  };
  tx.execute(
    "INSERT INTO roles (role_id, name, description, is_protected) VALUES (?1, ?2, ?3, 0)",
    params![encode_uuid(role.role_id), role.name, role.description],
  )?;
  grant_all(&tx, role.role_id, &role.permissions)?;
  tx.commit()?;

  tracing::debug!(role_id = %role.role_id, name = %role.name, "role created");
  Ok(role)
}

fn update_role(conn: &mut Connection, id: Uuid, input: RoleInput) -> Result<Role> {
  let tx = conn.transaction()?;
  let current = get_role(&tx, id)?.ok_or_else(|| CoreError::not_found("role", id))?;
  current.ensure_editable()?;
  input.validate()?;

  let name = input.name.trim().to_owned();
  check_role_name(&tx, &name, Some(id))?;

  tx.execute(
    "UPDATE roles SET name = ?2, description = ?3 WHERE role_id = ?1",
    params![encode_uuid(id), name, input.description],
  )?;
  tx.execute("DELETE FROM role_permissions WHERE role_id = ?1", params![encode_uuid(id)])?;
  grant_all(&tx, id, &input.permissions)?;
  tx.commit()?;

  Ok(Role {
    role_id: id,
    name,
    description: input.description,
    is_protected: false,
    permissions: input.permissions,
  })
}

fn delete_role(conn: &mut Connection, id: Uuid) -> Result<()> {
  let tx = conn.transaction()?;
  let current = get_role(&tx, id)?.ok_or_else(|| CoreError::not_found("role", id))?;
  current.ensure_editable()?;
  tx.execute("DELETE FROM roles WHERE role_id = ?1", params![encode_uuid(id)])?;
  tx.commit()?;

  tracing::debug!(role_id = %id, name = %current.name, "role deleted");
  Ok(())
}

/// Install the permission catalogue and the protected role holding all of
/// it. Safe to run at every startup.
fn seed(conn: &mut Connection, super_role: &str) -> Result<Role> {
  let tx = conn.transaction()?;
  {
    let mut stmt = tx.prepare("INSERT OR IGNORE INTO permissions (name, module) VALUES (?1, ?2)")?;
    for (module, name) in CATALOGUE {
      stmt.execute(params![name, module])?;
    }
  }

  let role_id = match role_id_by_name(&tx, super_role)? {
    Some(id) => {
      tx.execute("UPDATE roles SET is_protected = 1 WHERE role_id = ?1", params![encode_uuid(id)])?;
      id
    }
    None => {
      let id = Uuid::new_v4();
      tx.execute(
        "INSERT INTO roles (role_id, name, description, is_protected) VALUES (?1, ?2, ?3, 1)",
        params![encode_uuid(id), super_role, "Holds every permission"],
      )?;
      tracing::info!(role = super_role, "created protected role");
      id
    }
  };

  let all: BTreeSet<String> = CATALOGUE.iter().map(|(_, p)| (*p).to_owned()).collect();
  grant_all(&tx, role_id, &all)?;

  let role = get_role(&tx, role_id)?.ok_or_else(|| CoreError::not_found("role", role_id))?;
  tx.commit()?;
  Ok(role)
}

fn list_permissions(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn.prepare("SELECT name FROM permissions ORDER BY module, name")?;
  let names = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(names)
}

// ─── Users ───────────────────────────────────────────────────────────────────

fn user_role_ids(conn: &Connection, user_id: Uuid) -> Result<BTreeSet<Uuid>> {
  let mut stmt = conn.prepare("SELECT role_id FROM user_roles WHERE user_id = ?1")?;
  let ids = stmt
    .query_map(params![encode_uuid(user_id)], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

fn get_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
  let row = conn
    .query_row(
      "SELECT username, display_name, active, created_at FROM users WHERE user_id = ?1",
      params![encode_uuid(id)],
      |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, bool>(2)?,
          row.get::<_, String>(3)?,
        ))
      },
    )
    .optional()?;
  let Some((username, display_name, active, created_at)) = row else {
    return Ok(None);
  };
  Ok(Some(User {
    user_id: id,
    username,
    display_name,
    active,
    role_ids: user_role_ids(conn, id)?,
    created_at: decode_dt(&created_at)?,
  }))
}

fn list_users(conn: &Connection) -> Result<Vec<User>> {
  let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY username")?;
  let ids = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
  let mut users = Vec::with_capacity(ids.len());
  for id in ids {
    if let Some(user) = get_user(conn, decode_uuid(&id)?)? {
      users.push(user);
    }
  }
  Ok(users)
}

fn check_roles_exist(conn: &Connection, role_ids: &BTreeSet<Uuid>) -> Result<()> {
  let mut errors = ValidationErrors::new();
  for id in role_ids {
    if get_role(conn, *id)?.is_none() {
      errors.push("role_ids", format!("role {id} does not exist"));
    }
  }
  Ok(errors.into_result()?)
}

fn assign_roles(conn: &Connection, user_id: Uuid, role_ids: &BTreeSet<Uuid>) -> Result<()> {
  conn.execute("DELETE FROM user_roles WHERE user_id = ?1", params![encode_uuid(user_id)])?;
  let mut stmt = conn.prepare("INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2)")?;
  for role_id in role_ids {
    stmt.execute(params![encode_uuid(user_id), encode_uuid(*role_id)])?;
  }
  Ok(())
}

fn create_user(conn: &mut Connection, input: NewUser, now: DateTime<Utc>) -> Result<User> {
  input.validate()?;
  let username = input.username.trim().to_owned();

  let tx = conn.transaction()?;
  let taken = tx
    .query_row("SELECT 1 FROM users WHERE username = ?1", params![username], |_| Ok(()))
    .optional()?
    .is_some();
  if taken {
    return Err(CoreError::invalid("username", format!("username {username:?} is taken")).into());
  }
  check_roles_exist(&tx, &input.role_ids)?;

  let user = User {
    user_id: Uuid::new_v4(),
    username,
    display_name: input.display_name.trim().to_owned(),
    active: true,
    role_ids: input.role_ids,
    created_at: now,
  };
  tx.execute(
    "INSERT INTO users (user_id, username, display_name, password_hash, active, created_at)
     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
    params![
      encode_uuid(user.user_id),
      user.username,
      user.display_name,
      input.password_hash,
      encode_dt(user.created_at),
    ],
  )?;
  assign_roles(&tx, user.user_id, &user.role_ids)?;
  tx.commit()?;

  tracing::debug!(user_id = %user.user_id, username = %user.username, "user created");
  Ok(user)
}

fn set_roles(conn: &mut Connection, id: Uuid, role_ids: BTreeSet<Uuid>) -> Result<User> {
  let tx = conn.transaction()?;
  let mut user = get_user(&tx, id)?.ok_or_else(|| CoreError::not_found("user", id))?;
  check_roles_exist(&tx, &role_ids)?;
  assign_roles(&tx, id, &role_ids)?;
  tx.commit()?;

  user.role_ids = role_ids;
  Ok(user)
}

fn set_active(conn: &mut Connection, id: Uuid, active: bool) -> Result<User> {
  let tx = conn.transaction()?;
  let changed = tx.execute(
    "UPDATE users SET active = ?2 WHERE user_id = ?1",
    params![encode_uuid(id), active],
  )?;
  if changed == 0 {
    return Err(CoreError::not_found("user", id).into());
  }
  let user = get_user(&tx, id)?.ok_or_else(|| CoreError::not_found("user", id))?;
  tx.commit()?;

  tracing::debug!(user_id = %id, active, "user activation changed");
  Ok(user)
}

fn credentials(conn: &Connection, username: &str) -> Result<Option<Credentials>> {
  let row = conn
    .query_row(
      "SELECT user_id, username, password_hash, active FROM users WHERE username = ?1",
      params![username],
      |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, bool>(3)?,
        ))
      },
    )
    .optional()?;
  row
    .map(|(user_id, username, password_hash, active)| {
      Ok(Credentials { user_id: decode_uuid(&user_id)?, username, password_hash, active })
    })
    .transpose()
}

fn permissions_of(conn: &Connection, user_id: Uuid) -> Result<BTreeSet<String>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT rp.permission FROM user_roles ur
     JOIN role_permissions rp ON rp.role_id = ur.role_id
     WHERE ur.user_id = ?1",
  )?;
  let perms = stmt
    .query_map(params![encode_uuid(user_id)], |row| row.get(0))?
    .collect::<rusqlite::Result<BTreeSet<String>>>()?;
  Ok(perms)
}

// ─── AccessStore impl ────────────────────────────────────────────────────────

impl AccessStore for SqliteStore {
  async fn seed_access(&self, super_role: &str) -> Result<Role> {
    let super_role = super_role.to_owned();
    self.run(move |conn| seed(conn, &super_role)).await
  }

  async fn list_permissions(&self) -> Result<Vec<String>> {
    self.run(|conn| list_permissions(conn)).await
  }

  async fn create_role(&self, input: RoleInput) -> Result<Role> {
    self.run(move |conn| create_role(conn, input)).await
  }

  async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
    self.run(move |conn| get_role(conn, id)).await
  }

  async fn list_roles(&self) -> Result<Vec<Role>> {
    self.run(|conn| list_roles(conn)).await
  }

  async fn update_role(&self, id: Uuid, input: RoleInput) -> Result<Role> {
    self.run(move |conn| update_role(conn, id, input)).await
  }

  async fn delete_role(&self, id: Uuid) -> Result<()> {
    self.run(move |conn| delete_role(conn, id)).await
  }

  async fn create_user(&self, input: NewUser) -> Result<User> {
    self.run(move |conn| create_user(conn, input, Utc::now())).await
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    self.run(move |conn| get_user(conn, id)).await
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    self.run(|conn| list_users(conn)).await
  }

  async fn set_user_roles(&self, id: Uuid, role_ids: BTreeSet<Uuid>) -> Result<User> {
    self.run(move |conn| set_roles(conn, id, role_ids)).await
  }

  async fn set_user_active(&self, id: Uuid, active: bool) -> Result<User> {
    self.run(move |conn| set_active(conn, id, active)).await
  }

  async fn user_credentials(&self, username: &str) -> Result<Option<Credentials>> {
    let username = username.to_owned();
    self.run(move |conn| credentials(conn, &username)).await
  }

  async fn user_permissions(&self, user_id: Uuid) -> Result<BTreeSet<String>> {
    self.run(move |conn| permissions_of(conn, user_id)).await
  }
}
