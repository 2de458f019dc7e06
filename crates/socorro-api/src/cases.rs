//! Handlers for `/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/cases` | `?status=&citizen_id=&assigned_to=&text=&limit=&offset=` |
//! | `POST`   | `/cases` | Beneficiary profile must be complete |
//! | `GET`    | `/cases/stats` | Counts per case and item status |
//! | `GET`    | `/cases/{id}` | Case with items |
//! | `DELETE` | `/cases/{id}` | Soft delete |
//! | `POST`   | `/cases/{id}/assign` | Body: `{"assigned_to":"<uuid>"}` |
//! | `POST`   | `/cases/{id}/close` | Only decided cases |
//! | `POST`   | `/cases/{id}/items/{item_id}/review` | Body: [`Review`] |
//! | `POST`   | `/cases/{id}/items/{item_id}/fulfill` | Body ignored |
//!
//! Actors without `manage cases` only see cases they created or are assigned
//! to; anything else reads as 404.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use socorro_core::{
  access::{Actor, perm},
  case::{
    CaseDetail, CaseItem, CaseQuery, CaseStats, CaseStatus, Fulfillment, NewCase, Review,
    SocialCase,
  },
  store::Store,
};
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

fn visible(actor: &Actor, case: &SocialCase) -> bool {
  match actor.case_scope() {
    None => true,
    Some(me) => case.created_by == me || case.assigned_to == Some(me),
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status:      Option<CaseStatus>,
  pub citizen_id:  Option<Uuid>,
  pub assigned_to: Option<Uuid>,
  pub text:        Option<String>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// `GET /cases`
pub async fn list<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SocialCase>>, ApiError> {
  actor.require(perm::VIEW_CASES)?;
  let query = CaseQuery {
    status:      params.status,
    citizen_id:  params.citizen_id,
    assigned_to: params.assigned_to,
    text:        params.text,
    visible_to:  actor.case_scope(),
    limit:       params.limit,
    offset:      params.offset,
  };
  Ok(Json(app.store.list_cases(&query).await.map_err(ApiError::from_store)?))
}

/// `GET /cases/{id}`
pub async fn get_one<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<CaseDetail>, ApiError> {
  actor.require(perm::VIEW_CASES)?;
  let detail = app
    .store
    .get_case(id)
    .await
    .map_err(ApiError::from_store)?
    .filter(|d| visible(&actor, &d.case))
    .ok_or_else(|| ApiError::not_found("case", id))?;
  Ok(Json(detail))
}

/// `GET /cases/stats`
pub async fn stats<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<CaseStats>, ApiError> {
  actor.require(perm::VIEW_CASES)?;
  Ok(Json(app.store.case_stats(actor.case_scope()).await.map_err(ApiError::from_store)?))
}

// ─── Intake ──────────────────────────────────────────────────────────────────

/// `POST /cases`
pub async fn create<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(body): Json<NewCase>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::CREATE_CASES)?;

  let detail = app.store.create_case(body, actor.user_id).await.map_err(ApiError::from_store)?;
  tracing::info!(
    case_number = %detail.case.case_number,
    items = detail.items.len(),
    by = %actor.username,
    "case opened"
  );
  Ok((StatusCode::CREATED, Json(detail)))
}

// ─── Workflow ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub assigned_to: Uuid,
}

/// `POST /cases/{id}/assign`
pub async fn assign<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<AssignBody>,
) -> Result<Json<SocialCase>, ApiError> {
  actor.require(perm::ASSIGN_CASES)?;
  Ok(Json(app.store.assign_case(id, body.assigned_to).await.map_err(ApiError::from_store)?))
}

/// `POST /cases/{id}/items/{item_id}/review`
pub async fn review<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path((id, item_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<Review>,
) -> Result<Json<CaseItem>, ApiError> {
  actor.require(perm::REVIEW_CASES)?;
  let item =
    app.store.review_item(id, item_id, body, actor.user_id).await.map_err(ApiError::from_store)?;
  Ok(Json(item))
}

/// `POST /cases/{id}/items/{item_id}/fulfill`
pub async fn fulfill<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Fulfillment>, ApiError> {
  actor.require(perm::FULFILL_CASES)?;
  let done = app.store.fulfill_item(id, item_id, actor.user_id).await.map_err(ApiError::from_store)?;
  tracing::info!(case_id = %id, item_id = %item_id, by = %actor.username, "item fulfilled");
  Ok(Json(done))
}

/// `POST /cases/{id}/close`
pub async fn close<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<SocialCase>, ApiError> {
  actor.require(perm::CLOSE_CASES)?;
  Ok(Json(app.store.close_case(id).await.map_err(ApiError::from_store)?))
}

/// `DELETE /cases/{id}`
pub async fn delete<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  actor.require(perm::DELETE_CASES)?;
  app.store.delete_case(id).await.map_err(ApiError::from_store)?;
  tracing::info!(case_id = %id, by = %actor.username, "case deleted");
  Ok(StatusCode::NO_CONTENT)
}
