//! In-process cache of each user's resolved permission set.
//!
//! Owned by [`crate::AppState`]. Handlers that change roles or role
//! assignments invalidate it; nothing expires on its own.
//!
//! Every invalidation bumps a generation counter. A load that started before
//! an invalidation still answers its caller but is not cached, so a revoked
//! permission cannot be written back after the entry was dropped.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{PoisonError, RwLock},
};

use socorro_core::{
  access::{Actor, Credentials},
  store::AccessStore,
};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Entries {
  generation: u64,
  users:      HashMap<Uuid, BTreeSet<String>>,
}

#[derive(Debug, Default)]
pub struct PermissionCache {
  entries: RwLock<Entries>,
}

impl PermissionCache {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, user_id: Uuid) -> Option<BTreeSet<String>> {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).users.get(&user_id).cloned()
  }

  /// Cached permissions for `user_id`, loading them from `store` on a miss.
  pub async fn resolve<S: AccessStore>(
    &self,
    store: &S,
    user_id: Uuid,
  ) -> Result<BTreeSet<String>, S::Error> {
    let generation = {
      let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
      if let Some(hit) = entries.users.get(&user_id) {
        return Ok(hit.clone());
      }
      entries.generation
    };

    let permissions = store.user_permissions(user_id).await?;

    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    if entries.generation == generation {
      entries.users.insert(user_id, permissions.clone());
    } else {
      tracing::debug!(%user_id, "permission cache invalidated during load; not caching");
    }
    Ok(permissions)
  }

  /// Build the acting principal for an authenticated user.
  pub async fn actor<S: AccessStore>(
    &self,
    store: &S,
    credentials: &Credentials,
  ) -> Result<Actor, S::Error> {
    Ok(Actor {
      user_id:     credentials.user_id,
      username:    credentials.username.clone(),
      permissions: self.resolve(store, credentials.user_id).await?,
    })
  }

  /// Forget one user, after their role set changed.
  pub fn invalidate(&self, user_id: Uuid) {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    entries.generation += 1;
    entries.users.remove(&user_id);
  }

  /// Forget everyone, after a role's permissions changed.
  pub fn clear(&self) {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    entries.generation += 1;
    entries.users.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).users.len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
  use socorro_core::{
    access::{NewUser, Role, RoleInput, User, perm},
    store::{AccessStore, Backend},
  };
  use socorro_store_sqlite::SqliteStore;
  use tokio::sync::Notify;

  use super::*;

  /// A store with one `clerk` user holding `view cases`.
  async fn clerk_store() -> (SqliteStore, Uuid) {
    let store = SqliteStore::open_in_memory().await.expect("in-memory store");
    store.seed_access("super-admin").await.unwrap();
    let role = store
      .create_role(RoleInput {
        name:        "clerk".into(),
        description: None,
        permissions: [perm::VIEW_CASES.to_string()].into(),
      })
      .await
      .unwrap();
    let user = store
      .create_user(NewUser {
        username:      "clerk".into(),
        display_name:  "Clerk".into(),
        password_hash: "$argon2id$stub".into(),
        role_ids:      [role.role_id].into(),
      })
      .await
      .unwrap();
    (store, user.user_id)
  }

  /// Holds every permission load open, after the read, until released.
  struct HeldLoads {
    inner:   SqliteStore,
    loaded:  Notify,
    release: Notify,
  }

  impl Backend for HeldLoads {
    type Error = socorro_store_sqlite::Error;
  }

  impl AccessStore for HeldLoads {
    async fn seed_access(&self, super_role: &str) -> Result<Role, Self::Error> {
      self.inner.seed_access(super_role).await
    }

    async fn list_permissions(&self) -> Result<Vec<String>, Self::Error> {
      self.inner.list_permissions().await
    }

    async fn create_role(&self, input: RoleInput) -> Result<Role, Self::Error> {
      self.inner.create_role(input).await
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>, Self::Error> {
      self.inner.get_role(id).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, Self::Error> { self.inner.list_roles().await }

    async fn update_role(&self, id: Uuid, input: RoleInput) -> Result<Role, Self::Error> {
      self.inner.update_role(id, input).await
    }

    async fn delete_role(&self, id: Uuid) -> Result<(), Self::Error> {
      self.inner.delete_role(id).await
    }

    async fn create_user(&self, input: NewUser) -> Result<User, Self::Error> {
      self.inner.create_user(input).await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, Self::Error> {
      self.inner.get_user(id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, Self::Error> { self.inner.list_users().await }

    async fn set_user_roles(&self, id: Uuid, role_ids: BTreeSet<Uuid>) -> Result<User, Self::Error> {
      self.inner.set_user_roles(id, role_ids).await
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<User, Self::Error> {
      self.inner.set_user_active(id, active).await
    }

    async fn user_credentials(&self, username: &str) -> Result<Option<Credentials>, Self::Error> {
      self.inner.user_credentials(username).await
    }

    async fn user_permissions(&self, user_id: Uuid) -> Result<BTreeSet<String>, Self::Error> {
      let permissions = self.inner.user_permissions(user_id).await?;
      self.loaded.notify_one();
      self.release.notified().await;
      Ok(permissions)
    }
  }

  #[tokio::test]
  async fn hits_skip_the_store_until_invalidated() {
    let (store, user_id) = clerk_store().await;

    let cache = PermissionCache::new();
    assert_eq!(cache.resolve(&store, user_id).await.unwrap().len(), 1);
    assert_eq!(cache.len(), 1);

    store.set_user_roles(user_id, BTreeSet::new()).await.unwrap();
    // Stale until told otherwise.
    assert_eq!(cache.resolve(&store, user_id).await.unwrap().len(), 1);

    cache.invalidate(user_id);
    assert!(cache.resolve(&store, user_id).await.unwrap().is_empty());

    cache.clear();
    assert!(cache.is_empty());
  }
  #[tokio::test]
  async fn invalidation_during_a_load_is_not_overwritten() {
    let (inner, user_id) = clerk_store().await;
    let store = HeldLoads { inner, loaded: Notify::new(), release: Notify::new() };
    let cache = PermissionCache::new();

    let revoke = async {
      store.loaded.notified().await;
      store.inner.set_user_roles(user_id, BTreeSet::new()).await.unwrap();
      cache.invalidate(user_id);
      store.release.notify_one();
    };
    let (stale, ()) = tokio::join!(cache.resolve(&store, user_id), revoke);

    // The in-flight caller gets what it read, but it is not cached.
    assert!(stale.unwrap().contains(perm::VIEW_CASES));
    assert!(cache.get(user_id).is_none());
    assert!(cache.resolve(&store.inner, user_id).await.unwrap().is_empty());
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn clear_during_a_load_is_not_overwritten() {
    let (inner, user_id) = clerk_store().await;
    let store = HeldLoads { inner, loaded: Notify::new(), release: Notify::new() };
    let cache = PermissionCache::new();

    let clear = async {
      store.loaded.notified().await;
      cache.clear();
      store.release.notify_one();
    };
    let (loaded, ()) = tokio::join!(cache.resolve(&store, user_id), clear);
    assert_eq!(loaded.unwrap().len(), 1);
    assert!(cache.is_empty());
  }
}
