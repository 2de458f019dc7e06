//! Handlers for the reference catalog: categories, supplies, institutions and
//! medical services.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use socorro_core::{
  access::perm,
  catalog::{
    self, Category, CategoryNode, Institution, MedicalService, NewCategory, NewInstitution,
    NewMedicalService, Supply, SupplyInput, SupplyQuery, SupplyStatus,
  },
  store::Store,
};
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

// ─── Categories ──────────────────────────────────────────────────────────────

/// `GET /categories`
pub async fn list_categories<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Category>>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  Ok(Json(app.store.list_categories().await.map_err(ApiError::from_store)?))
}

/// `GET /categories/tree`
pub async fn category_tree<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<CategoryNode>>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  let all = app.store.list_categories().await.map_err(ApiError::from_store)?;
  Ok(Json(catalog::build_tree(all)))
}

/// `POST /categories`
pub async fn create_category<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<NewCategory>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_CATALOG)?;
  let category = app.store.create_category(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(category)))
}

/// `GET /categories/{id}`
pub async fn get_category<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  let category = app
    .store
    .get_category(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("category", id))?;
  Ok(Json(category))
}

// ─── Supplies ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SupplyParams {
  pub category_id: Option<Uuid>,
  pub status:      Option<SupplyStatus>,
  pub text:        Option<String>,
}

/// `GET /supplies[?category_id=&status=&text=]`
pub async fn list_supplies<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Query(params): Query<SupplyParams>,
) -> Result<Json<Vec<Supply>>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  let query =
    SupplyQuery { category_id: params.category_id, status: params.status, text: params.text };
  Ok(Json(app.store.list_supplies(&query).await.map_err(ApiError::from_store)?))
}

/// `POST /supplies`
pub async fn create_supply<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<SupplyInput>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_CATALOG)?;
  let supply = app.store.create_supply(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(supply)))
}

/// `GET /supplies/{id}`
pub async fn get_supply<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<Supply>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  let supply = app
    .store
    .get_supply(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("supply", id))?;
  Ok(Json(supply))
}

/// `PUT /supplies/{id}`: metadata only, stock moves through the ledger.
pub async fn update_supply<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<SupplyInput>,
) -> Result<Json<Supply>, ApiError> {
  actor.require(perm::MANAGE_CATALOG)?;
  Ok(Json(app.store.update_supply(id, body).await.map_err(ApiError::from_store)?))
}

// ─── Institutions and services ───────────────────────────────────────────────

/// `GET /institutions`
pub async fn list_institutions<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Institution>>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  Ok(Json(app.store.list_institutions().await.map_err(ApiError::from_store)?))
}

/// `POST /institutions`
pub async fn create_institution<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<NewInstitution>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_CATALOG)?;
  let institution = app.store.create_institution(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(institution)))
}

/// `GET /services`
pub async fn list_services<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<MedicalService>>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  Ok(Json(app.store.list_services().await.map_err(ApiError::from_store)?))
}

/// `POST /services`
pub async fn create_service<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<NewMedicalService>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_CATALOG)?;
  let service = app.store.create_service(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(service)))
}

/// `GET /services/{id}`
pub async fn get_service<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<MedicalService>, ApiError> {
  actor.require(perm::VIEW_CATALOG)?;
  let service = app
    .store
    .get_service(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("medical service", id))?;
  Ok(Json(service))
}
