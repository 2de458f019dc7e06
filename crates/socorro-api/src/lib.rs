//! JSON REST API for Socorro.
//!
//! Exposes an axum [`Router`] backed by any [`socorro_core::store::Store`].
//! Authentication is the caller's responsibility: some outer layer must put
//! an [`socorro_core::access::Actor`] into the request extensions, otherwise
//! every route answers 401.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", socorro_api::api_router(state.clone()))
//! ```

pub mod access;
pub mod actor;
pub mod cache;
pub mod cases;
pub mod catalog;
pub mod citizens;
pub mod error;
pub mod lookup;
pub mod stock;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use socorro_core::store::Store;

pub use cache::PermissionCache;
pub use error::ApiError;
pub use lookup::{LookupClient, LookupConfig};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub permissions: Arc<PermissionCache>,
  pub lookup:      Option<LookupClient>,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      permissions: Arc::clone(&self.permissions),
      lookup:      self.lookup.clone(),
    }
  }
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, permissions: Arc::new(PermissionCache::new()), lookup: None }
  }

  pub fn with_lookup(mut self, client: LookupClient) -> Self {
    self.lookup = Some(client);
    self
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: Store + 'static,
{
  Router::new()
    // Identity and access
    .route("/me", get(access::me))
    .route("/permissions", get(access::list_permissions::<S>))
    .route("/roles", get(access::list_roles::<S>).post(access::create_role::<S>))
    .route(
      "/roles/{id}",
      get(access::get_role::<S>).put(access::update_role::<S>).delete(access::delete_role::<S>),
    )
    .route("/users", get(access::list_users::<S>).post(access::create_user::<S>))
    .route("/users/{id}", get(access::get_user::<S>))
    .route("/users/{id}/roles", put(access::set_user_roles::<S>))
    .route("/users/{id}/active", put(access::set_user_active::<S>))
    // Citizens
    .route("/citizens", get(citizens::list::<S>).post(citizens::create::<S>))
    .route("/citizens/{id}", get(citizens::get_one::<S>).put(citizens::update::<S>))
    .route("/citizens/{id}/health", get(citizens::get_health::<S>).put(citizens::put_health::<S>))
    .route("/citizens/{id}/photo", put(citizens::put_photo::<S>))
    .route("/citizens/{id}/profile-status", get(citizens::profile_status::<S>))
    .route("/lookup/{national_id}", get(citizens::lookup::<S>))
    .route("/lookup/{national_id}/import", post(citizens::import::<S>))
    // Catalog
    .route("/categories", get(catalog::list_categories::<S>).post(catalog::create_category::<S>))
    .route("/categories/tree", get(catalog::category_tree::<S>))
    .route("/categories/{id}", get(catalog::get_category::<S>))
    .route("/supplies", get(catalog::list_supplies::<S>).post(catalog::create_supply::<S>))
    .route("/supplies/low-stock", get(stock::low_stock::<S>))
    .route("/supplies/{id}", get(catalog::get_supply::<S>).put(catalog::update_supply::<S>))
    .route(
      "/supplies/{id}/movements",
      get(stock::list_movements::<S>).post(stock::post_movement::<S>),
    )
    .route("/supplies/{id}/stock", get(stock::stock_level::<S>))
    .route("/supplies/{id}/recompute", post(stock::recompute::<S>))
    .route(
      "/institutions",
      get(catalog::list_institutions::<S>).post(catalog::create_institution::<S>),
    )
    .route("/services", get(catalog::list_services::<S>).post(catalog::create_service::<S>))
    .route("/services/{id}", get(catalog::get_service::<S>))
    // Cases
    .route("/cases", get(cases::list::<S>).post(cases::create::<S>))
    .route("/cases/stats", get(cases::stats::<S>))
    .route("/cases/{id}", get(cases::get_one::<S>).delete(cases::delete::<S>))
    .route("/cases/{id}/assign", post(cases::assign::<S>))
    .route("/cases/{id}/close", post(cases::close::<S>))
    .route("/cases/{id}/items/{item_id}/review", post(cases::review::<S>))
    .route("/cases/{id}/items/{item_id}/fulfill", post(cases::fulfill::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
