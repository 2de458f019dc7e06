//! Permissions, roles, users and the acting principal.
//!
//! Permissions are flat strings. A role is a named bundle of permissions and
//! a user holds roles; authorisation is set membership on the union.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, ValidationErrors};

// ─── Permission catalogue ────────────────────────────────────────────────────

pub mod perm {
  pub const VIEW_CITIZENS: &str = "view citizens";
  pub const CREATE_CITIZENS: &str = "create citizens";
  pub const EDIT_CITIZENS: &str = "edit citizens";
  pub const LOOKUP_CITIZENS: &str = "lookup citizens";

  pub const VIEW_CATALOG: &str = "view catalog";
  pub const MANAGE_CATALOG: &str = "manage catalog";

  pub const VIEW_CASES: &str = "view cases";
  pub const CREATE_CASES: &str = "create cases";
  pub const ASSIGN_CASES: &str = "assign cases";
  pub const REVIEW_CASES: &str = "review cases";
  pub const FULFILL_CASES: &str = "fulfill cases";
  pub const CLOSE_CASES: &str = "close cases";
  pub const DELETE_CASES: &str = "delete cases";
  /// See every case, not only those created by or assigned to the actor.
  pub const MANAGE_CASES: &str = "manage cases";

  pub const VIEW_INVENTORY: &str = "view inventory";
  pub const MANAGE_INVENTORY: &str = "manage inventory";

  pub const MANAGE_ROLES: &str = "manage roles";
  pub const MANAGE_USERS: &str = "manage users";
}

/// Every known permission with the module it is displayed under.
pub const CATALOGUE: &[(&str, &str)] = &[
  ("citizens", perm::VIEW_CITIZENS),
  ("citizens", perm::CREATE_CITIZENS),
  ("citizens", perm::EDIT_CITIZENS),
  ("citizens", perm::LOOKUP_CITIZENS),
  ("catalog", perm::VIEW_CATALOG),
  ("catalog", perm::MANAGE_CATALOG),
  ("cases", perm::VIEW_CASES),
  ("cases", perm::CREATE_CASES),
  ("cases", perm::ASSIGN_CASES),
  ("cases", perm::REVIEW_CASES),
  ("cases", perm::FULFILL_CASES),
  ("cases", perm::CLOSE_CASES),
  ("cases", perm::DELETE_CASES),
  ("cases", perm::MANAGE_CASES),
  ("inventory", perm::VIEW_INVENTORY),
  ("inventory", perm::MANAGE_INVENTORY),
  ("administration", perm::MANAGE_ROLES),
  ("administration", perm::MANAGE_USERS),
];

pub fn is_known(permission: &str) -> bool {
  CATALOGUE.iter().any(|(_, p)| *p == permission)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
  pub module:      String,
  pub permissions: Vec<String>,
}

/// Group permission names by module, keeping catalogue order. Names missing
/// from the catalogue are listed under `other`.
pub fn group_by_module<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<PermissionGroup> {
  let mut groups: Vec<PermissionGroup> = Vec::new();
  for name in names {
    let module = CATALOGUE
      .iter()
      .find(|(_, p)| *p == name)
      .map_or("other", |(m, _)| *m);
    match groups.iter_mut().find(|g| g.module == module) {
      Some(g) => g.permissions.push(name.to_owned()),
      None => groups.push(PermissionGroup {
        module:      module.to_owned(),
        permissions: vec![name.to_owned()],
      }),
    }
  }
  groups
}

// ─── Roles and users ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub role_id:      Uuid,
  pub name:         String,
  pub description:  Option<String>,
  /// Protected roles cannot be edited or deleted.
  pub is_protected: bool,
  pub permissions:  BTreeSet<String>,
}

impl Role {
  pub fn ensure_editable(&self) -> Result<()> {
    if self.is_protected {
      return Err(Error::ProtectedRole(self.name.clone()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInput {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub permissions: BTreeSet<String>,
}

impl RoleInput {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &self.name, "role name is required");
    for p in &self.permissions {
      if !is_known(p) {
        errors.push("permissions", format!("unknown permission {p:?}"));
      }
    }
    errors.into_result()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:      Uuid,
  pub username:     String,
  pub display_name: String,
  pub active:       bool,
  pub role_ids:     BTreeSet<Uuid>,
  pub created_at:   DateTime<Utc>,
}

/// Input for creating a user. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub display_name:  String,
  pub password_hash: String,
  pub role_ids:      BTreeSet<Uuid>,
}

impl NewUser {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("username", &self.username, "username is required");
    if self.username.contains(':') || self.username.chars().any(char::is_whitespace) {
      errors.push("username", "username cannot contain spaces or colons");
    }
    errors.require("display_name", &self.display_name, "display name is required");
    errors.require("password", &self.password_hash, "password is required");
    errors.into_result()
  }
}

/// What authentication needs to know about a user.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user_id:       Uuid,
  pub username:      String,
  pub password_hash: String,
  pub active:        bool,
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// The authenticated principal performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id:     Uuid,
  pub username:    String,
  pub permissions: BTreeSet<String>,
}

impl Actor {
  pub fn can(&self, permission: &str) -> bool { self.permissions.contains(permission) }

  pub fn require(&self, permission: &str) -> Result<()> {
    if self.can(permission) {
      Ok(())
    } else {
      Err(Error::PermissionDenied(permission.to_owned()))
    }
  }

  /// The user a case listing must be scoped to, or `None` for managers.
  pub fn case_scope(&self) -> Option<Uuid> {
    (!self.can(perm::MANAGE_CASES)).then_some(self.user_id)
  }
}
