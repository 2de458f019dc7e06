//! Handlers for `/citizens` and `/lookup` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/citizens` | `?text=&limit=&offset=` |
//! | `POST` | `/citizens` | 422 on duplicate identification |
//! | `GET`  | `/citizens/{id}` | |
//! | `PUT`  | `/citizens/{id}` | Replaces the editable fields |
//! | `GET`  | `/citizens/{id}/health` | 404 until a profile is recorded |
//! | `PUT`  | `/citizens/{id}/health` | Upsert |
//! | `PUT`  | `/citizens/{id}/photo` | Body: `{"photo_path":"…"}` |
//! | `GET`  | `/citizens/{id}/profile-status` | Completeness report |
//! | `GET`  | `/lookup/{national_id}` | External directory, 404 when unknown |
//! | `POST` | `/lookup/{national_id}/import` | Register from the directory |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use socorro_core::{
  Error as DomainError,
  access::perm,
  citizen::{Citizen, CitizenQuery, HealthData, HealthProfile, Identification, NewCitizen},
  lookup::PersonRecord,
  profile::{self, ProfileReport},
  store::Store,
};
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

// ─── Citizens ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub text:   Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /citizens`
pub async fn list<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Citizen>>, ApiError> {
  actor.require(perm::VIEW_CITIZENS)?;
  let query = CitizenQuery { text: params.text, limit: params.limit, offset: params.offset };
  let citizens = app.store.list_citizens(&query).await.map_err(ApiError::from_store)?;
  Ok(Json(citizens))
}

/// `POST /citizens`
pub async fn create<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<NewCitizen>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::CREATE_CITIZENS)?;
  let citizen = app.store.create_citizen(body).await.map_err(ApiError::from_store)?;
  tracing::info!(citizen_id = %citizen.citizen_id, by = %actor.username, "citizen registered");
  Ok((StatusCode::CREATED, Json(citizen)))
}

pub(crate) async fn load<S: Store>(app: &AppState<S>, id: Uuid) -> Result<Citizen, ApiError> {
  app
    .store
    .get_citizen(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("citizen", id))
}

/// `GET /citizens/{id}`
pub async fn get_one<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<Citizen>, ApiError> {
  actor.require(perm::VIEW_CITIZENS)?;
  Ok(Json(load(&app, id).await?))
}

/// `PUT /citizens/{id}`
pub async fn update<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<NewCitizen>,
) -> Result<Json<Citizen>, ApiError> {
  actor.require(perm::EDIT_CITIZENS)?;
  let citizen = app.store.update_citizen(id, body).await.map_err(ApiError::from_store)?;
  Ok(Json(citizen))
}

// ─── Health, photo, completeness ─────────────────────────────────────────────

/// `GET /citizens/{id}/health`
pub async fn get_health<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<HealthProfile>, ApiError> {
  actor.require(perm::VIEW_CITIZENS)?;
  let profile = app
    .store
    .get_health_profile(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::not_found("health profile", id))?;
  Ok(Json(profile))
}

/// `PUT /citizens/{id}/health`
pub async fn put_health<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<HealthData>,
) -> Result<Json<HealthProfile>, ApiError> {
  actor.require(perm::EDIT_CITIZENS)?;
  let profile = app.store.upsert_health_profile(id, body).await.map_err(ApiError::from_store)?;
  Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct PhotoBody {
  pub photo_path: String,
}

/// `PUT /citizens/{id}/photo`
pub async fn put_photo<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<PhotoBody>,
) -> Result<Json<Citizen>, ApiError> {
  actor.require(perm::EDIT_CITIZENS)?;
  let path = body.photo_path.trim();
  if path.is_empty() {
    return Err(DomainError::invalid("photo_path", "photo path is required").into());
  }
  let citizen = app.store.set_photo(id, path.to_owned()).await.map_err(ApiError::from_store)?;
  Ok(Json(citizen))
}

#[derive(Debug, Serialize)]
pub struct ProfileStatus {
  pub citizen_id: Uuid,
  pub complete:   bool,
  #[serde(flatten)]
  pub report:     ProfileReport,
}

/// Completeness report for a citizen, as of today.
async fn profile_report<S: Store>(
  app: &AppState<S>,
  citizen: &Citizen,
) -> Result<ProfileReport, ApiError> {
  let health = app
    .store
    .get_health_profile(citizen.citizen_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(profile::check(citizen, health.as_ref(), Utc::now().date_naive()))
}

/// `GET /citizens/{id}/profile-status`
pub async fn profile_status<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<ProfileStatus>, ApiError> {
  actor.require(perm::VIEW_CITIZENS)?;
  let citizen = load(&app, id).await?;
  let report = profile_report(&app, &citizen).await?;
  Ok(Json(ProfileStatus { citizen_id: id, complete: report.is_complete(), report }))
}

// ─── External lookup ─────────────────────────────────────────────────────────

async fn lookup_record<S: Store>(
  app: &AppState<S>,
  national_id: &str,
) -> Result<(Identification, Option<PersonRecord>), ApiError> {
  let id: Identification = national_id.parse()?;
  let record = match &app.lookup {
    Some(client) => client.lookup(&id).await,
    None => {
      tracing::debug!("person lookup is not configured");
      None
    }
  };
  Ok((id, record))
}

/// `GET /lookup/{national_id}`
pub async fn lookup<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(national_id): Path<String>,
) -> Result<Json<PersonRecord>, ApiError> {
  actor.require(perm::LOOKUP_CITIZENS)?;
  let (id, record) = lookup_record(&app, &national_id).await?;
  record.map(Json).ok_or_else(|| ApiError::not_found("person", id))
}

/// `POST /lookup/{national_id}/import`
pub async fn import<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(national_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::LOOKUP_CITIZENS)?;
  actor.require(perm::CREATE_CITIZENS)?;

  let (id, record) = lookup_record(&app, &national_id).await?;
  if app.store.find_citizen(&id.value).await.map_err(ApiError::from_store)?.is_some() {
    return Err(
      DomainError::invalid("identification", format!("{id} is already registered")).into(),
    );
  }
  let record = record.ok_or_else(|| ApiError::not_found("person", &id))?;

  let citizen =
    app.store.create_citizen(record.into_new_citizen()).await.map_err(ApiError::from_store)?;
  tracing::info!(citizen_id = %citizen.citizen_id, identification = %id, "citizen imported");
  Ok((StatusCode::CREATED, Json(citizen)))
}
