//! Storage traits.
//!
//! Implemented by storage backends (e.g. `socorro-store-sqlite`). The HTTP
//! layer depends on these abstractions, not on any concrete backend.
//!
//! Every mutating method is atomic: it validates the transition against the
//! current stored state and writes the new state, including derived counters
//! such as a supply's `current_stock`, in one unit. A failed call leaves no
//! partial effects.

use std::{collections::BTreeSet, future::Future};

use uuid::Uuid;

use crate::{
  Error,
  access::{Credentials, NewUser, Role, RoleInput, User},
  case::{CaseDetail, CaseItem, CaseQuery, CaseStats, Fulfillment, NewCase, Review, SocialCase},
  catalog::{
    Category, Institution, MedicalService, NewCategory, NewInstitution, NewMedicalService,
    Supply, SupplyInput, SupplyQuery,
  },
  citizen::{Citizen, CitizenQuery, HealthData, HealthProfile, NewCitizen},
  stock::{NewMovement, StockLevel, StockMovement},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A backend error that may carry a domain [`Error`].
pub trait StoreError: std::error::Error + Send + Sync + Sized + 'static {
  /// Surrender the domain error, if this is one; otherwise give `self` back.
  fn into_domain(self) -> Result<Error, Self>;
}

/// Shared error type for every storage trait of one backend.
pub trait Backend: Send + Sync {
  type Error: StoreError;
}

// ─── Citizens ────────────────────────────────────────────────────────────────

pub trait CitizenStore: Backend {
  /// Fails with a validation error when the identification value is taken.
  fn create_citizen(
    &self,
    input: NewCitizen,
  ) -> impl Future<Output = Result<Citizen, Self::Error>> + Send + '_;

  fn get_citizen(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Citizen>, Self::Error>> + Send + '_;

  /// Look a citizen up by identification value (digits only).
  fn find_citizen<'a>(
    &'a self,
    identification_value: &'a str,
  ) -> impl Future<Output = Result<Option<Citizen>, Self::Error>> + Send + 'a;

  fn list_citizens<'a>(
    &'a self,
    query: &'a CitizenQuery,
  ) -> impl Future<Output = Result<Vec<Citizen>, Self::Error>> + Send + 'a;

  /// Replace the editable fields of a citizen.
  fn update_citizen(
    &self,
    id: Uuid,
    input: NewCitizen,
  ) -> impl Future<Output = Result<Citizen, Self::Error>> + Send + '_;

  fn set_photo(
    &self,
    id: Uuid,
    photo_path: String,
  ) -> impl Future<Output = Result<Citizen, Self::Error>> + Send + '_;

  fn upsert_health_profile(
    &self,
    citizen_id: Uuid,
    data: HealthData,
  ) -> impl Future<Output = Result<HealthProfile, Self::Error>> + Send + '_;

  fn get_health_profile(
    &self,
    citizen_id: Uuid,
  ) -> impl Future<Output = Result<Option<HealthProfile>, Self::Error>> + Send + '_;
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub trait CatalogStore: Backend {
  fn create_category(
    &self,
    input: NewCategory,
  ) -> impl Future<Output = Result<Category, Self::Error>> + Send + '_;

  fn get_category(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Category>, Self::Error>> + Send + '_;

  fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>, Self::Error>> + Send + '_;

  /// New supplies start with zero stock.
  fn create_supply(
    &self,
    input: SupplyInput,
  ) -> impl Future<Output = Result<Supply, Self::Error>> + Send + '_;

  fn get_supply(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Supply>, Self::Error>> + Send + '_;

  fn list_supplies<'a>(
    &'a self,
    query: &'a SupplyQuery,
  ) -> impl Future<Output = Result<Vec<Supply>, Self::Error>> + Send + 'a;

  /// Update metadata only; `current_stock` is owned by the ledger.
  fn update_supply(
    &self,
    id: Uuid,
    input: SupplyInput,
  ) -> impl Future<Output = Result<Supply, Self::Error>> + Send + '_;

  fn create_institution(
    &self,
    input: NewInstitution,
  ) -> impl Future<Output = Result<Institution, Self::Error>> + Send + '_;

  fn list_institutions(
    &self,
  ) -> impl Future<Output = Result<Vec<Institution>, Self::Error>> + Send + '_;

  fn create_service(
    &self,
    input: NewMedicalService,
  ) -> impl Future<Output = Result<MedicalService, Self::Error>> + Send + '_;

  fn get_service(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MedicalService>, Self::Error>> + Send + '_;

  fn list_services(
    &self,
  ) -> impl Future<Output = Result<Vec<MedicalService>, Self::Error>> + Send + '_;
}

// ─── Cases ───────────────────────────────────────────────────────────────────

pub trait CaseStore: Backend {
  /// Validate every reference, number the case and insert it with all of its
  /// items in `pending`.
  fn create_case(
    &self,
    input: NewCase,
    created_by: Uuid,
  ) -> impl Future<Output = Result<CaseDetail, Self::Error>> + Send + '_;

  /// Soft-deleted cases are reported as missing.
  fn get_case(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CaseDetail>, Self::Error>> + Send + '_;

  fn list_cases<'a>(
    &'a self,
    query: &'a CaseQuery,
  ) -> impl Future<Output = Result<Vec<SocialCase>, Self::Error>> + Send + 'a;

  fn assign_case(
    &self,
    id: Uuid,
    assignee: Uuid,
  ) -> impl Future<Output = Result<SocialCase, Self::Error>> + Send + '_;

  fn review_item(
    &self,
    case_id: Uuid,
    item_id: Uuid,
    review: Review,
    reviewer: Uuid,
  ) -> impl Future<Output = Result<CaseItem, Self::Error>> + Send + '_;

  /// Deliver an approved item, posting the stock exit for supplies.
  fn fulfill_item(
    &self,
    case_id: Uuid,
    item_id: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<Fulfillment, Self::Error>> + Send + '_;

  fn close_case(&self, id: Uuid) -> impl Future<Output = Result<SocialCase, Self::Error>> + Send + '_;

  fn delete_case(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn case_stats(
    &self,
    visible_to: Option<Uuid>,
  ) -> impl Future<Output = Result<CaseStats, Self::Error>> + Send + '_;
}

// ─── Stock ledger ────────────────────────────────────────────────────────────

pub trait StockLedger: Backend {
  /// Append a movement and apply it to the supply's stock.
  fn post_movement(
    &self,
    input: NewMovement,
  ) -> impl Future<Output = Result<(StockMovement, StockLevel), Self::Error>> + Send + '_;

  /// Newest first.
  fn list_movements(
    &self,
    supply_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StockMovement>, Self::Error>> + Send + '_;

  fn stock_level(
    &self,
    supply_id: Uuid,
  ) -> impl Future<Output = Result<StockLevel, Self::Error>> + Send + '_;

  /// Rebuild `current_stock` from the ledger sum.
  fn recompute_stock(
    &self,
    supply_id: Uuid,
  ) -> impl Future<Output = Result<StockLevel, Self::Error>> + Send + '_;

  /// Supplies at or below their reorder threshold.
  fn low_stock(&self) -> impl Future<Output = Result<Vec<Supply>, Self::Error>> + Send + '_;
}

// ─── Access control ──────────────────────────────────────────────────────────

pub trait AccessStore: Backend {
  /// Idempotently install the permission catalogue and the protected
  /// all-permissions role named `super_role`.
  fn seed_access<'a>(
    &'a self,
    super_role: &'a str,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + 'a;

  fn list_permissions(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn create_role(
    &self,
    input: RoleInput,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  fn get_role(&self, id: Uuid)
  -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  fn list_roles(&self) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  /// Rejects protected roles.
  fn update_role(
    &self,
    id: Uuid,
    input: RoleInput,
  ) -> impl Future<Output = Result<Role, Self::Error>> + Send + '_;

  /// Rejects protected roles.
  fn delete_role(&self, id: Uuid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(&self, id: Uuid)
  -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(&self) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Replace the user's role set.
  fn set_user_roles(
    &self,
    id: Uuid,
    role_ids: BTreeSet<Uuid>,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Enable or disable sign-in for the user. Roles are kept either way.
  fn set_user_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn user_credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + 'a;

  /// Union of the permissions of every role the user holds.
  fn user_permissions(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>> + Send + '_;
}

// ─── Everything ──────────────────────────────────────────────────────────────

/// A backend implementing every storage trait.
pub trait Store: CitizenStore + CatalogStore + CaseStore + StockLedger + AccessStore {}

impl<T> Store for T where T: CitizenStore + CatalogStore + CaseStore + StockLedger + AccessStore {}
