//! Handlers for the stock ledger under `/supplies`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/supplies/low-stock` | Active supplies at or below `min_stock` |
//! | `GET`  | `/supplies/{id}/movements` | Newest first |
//! | `POST` | `/supplies/{id}/movements` | 409 when an exit exceeds stock |
//! | `GET`  | `/supplies/{id}/stock` | |
//! | `POST` | `/supplies/{id}/recompute` | Rebuild the cache from the ledger |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use socorro_core::{
  access::perm,
  catalog::Supply,
  stock::{MovementReason, MovementReference, MovementType, NewMovement, StockLevel, StockMovement},
  store::Store,
};
use uuid::Uuid;

use crate::{AppState, actor::CurrentActor, error::ApiError};

/// `GET /supplies/low-stock`
pub async fn low_stock<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Supply>>, ApiError> {
  actor.require(perm::VIEW_INVENTORY)?;
  Ok(Json(app.store.low_stock().await.map_err(ApiError::from_store)?))
}

/// `GET /supplies/{id}/movements`
pub async fn list_movements<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
  actor.require(perm::VIEW_INVENTORY)?;
  Ok(Json(app.store.list_movements(id).await.map_err(ApiError::from_store)?))
}

#[derive(Debug, Deserialize)]
pub struct MovementBody {
  pub movement_type: MovementType,
  pub quantity:      i64,
  pub reason:        MovementReason,
  #[serde(default)]
  pub reference:     Option<MovementReference>,
  #[serde(default)]
  pub notes:         Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Posted {
  pub movement:    StockMovement,
  pub stock_level: StockLevel,
}

/// `POST /supplies/{id}/movements`
pub async fn post_movement<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
  Json(body): Json<MovementBody>,
) -> Result<impl IntoResponse, ApiError> {
  actor.require(perm::MANAGE_INVENTORY)?;
  let (movement, stock_level) = app
    .store
    .post_movement(NewMovement {
      supply_id:     id,
      movement_type: body.movement_type,
      quantity:      body.quantity,
      reason:        body.reason,
      reference:     body.reference,
      actor_id:      actor.user_id,
      notes:         body.notes,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(Posted { movement, stock_level })))
}

/// `GET /supplies/{id}/stock`
pub async fn stock_level<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<StockLevel>, ApiError> {
  actor.require(perm::VIEW_INVENTORY)?;
  Ok(Json(app.store.stock_level(id).await.map_err(ApiError::from_store)?))
}

/// `POST /supplies/{id}/recompute`
pub async fn recompute<S: Store>(
  State(app): State<AppState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(id): Path<Uuid>,
) -> Result<Json<StockLevel>, ApiError> {
  actor.require(perm::MANAGE_INVENTORY)?;
  Ok(Json(app.store.recompute_stock(id).await.map_err(ApiError::from_store)?))
}
