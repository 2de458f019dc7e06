//! The append-only stock ledger and the `current_stock` cache it drives.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use socorro_core::{
  Error as CoreError,
  catalog::Supply,
  stock::{self, NewMovement, StockLevel, StockMovement},
  store::StockLedger,
};
use uuid::Uuid;

use super::{SqliteStore, catalog::get_supply};
use crate::{
  Result,
  encode::{MOVEMENT_COLUMNS, RawMovement, RawSupply, SUPPLY_COLUMNS, encode_dt, encode_uuid},
};

/// Append `input` and move the supply's stock in the caller's transaction.
///
/// The caller commits. An exit that would take the stock below zero fails
/// before anything is written.
pub(super) fn apply_movement(
  tx: &Connection,
  input: NewMovement,
  now: DateTime<Utc>,
) -> Result<(StockMovement, StockLevel)> {
  input.validate()?;

  let mut supply =
    get_supply(tx, input.supply_id)?.ok_or_else(|| CoreError::not_found("supply", input.supply_id))?;
  let next = stock::project(supply.supply_id, supply.current_stock, input.movement_type, input.quantity)?;

  let changed = tx.execute(
    "UPDATE supplies SET current_stock = ?2 WHERE supply_id = ?1 AND current_stock = ?3",
    params![encode_uuid(supply.supply_id), next, supply.current_stock],
  )?;
  if changed == 0 {
    // Someone else moved the stock between our read and write.
    return Err(
      CoreError::InsufficientStock {
        supply_id: supply.supply_id,
        requested: input.quantity,
        available: supply.current_stock,
      }
      .into(),
    );
  }

  let movement = StockMovement {
    movement_id:   Uuid::new_v4(),
    supply_id:     input.supply_id,
    movement_type: input.movement_type,
    quantity:      input.quantity,
    reason:        input.reason,
    reference:     input.reference,
    actor_id:      input.actor_id,
    notes:         input.notes,
    created_at:    now,
  };
  tx.execute(
    &format!(
      "INSERT INTO stock_movements ({MOVEMENT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    ),
    params![
      encode_uuid(movement.movement_id),
      encode_uuid(movement.supply_id),
      movement.movement_type.as_ref(),
      movement.quantity,
      movement.reason.as_ref(),
      movement.reference.map(|r| r.kind()),
      movement.reference.map(|r| encode_uuid(r.id())),
      encode_uuid(movement.actor_id),
      movement.notes,
      encode_dt(movement.created_at),
    ],
  )?;

  supply.current_stock = next;
  tracing::debug!(
    supply_id = %supply.supply_id,
    movement = movement.movement_type.as_ref(),
    quantity = movement.quantity,
    stock = next,
    "stock moved"
  );
  if supply.is_low_stock() {
    tracing::info!(supply_id = %supply.supply_id, stock = next, min = supply.min_stock, "supply is low on stock");
  }

  Ok((movement, StockLevel::from(&supply)))
}

fn post(conn: &mut Connection, input: NewMovement, now: DateTime<Utc>) -> Result<(StockMovement, StockLevel)> {
  let tx = conn.transaction()?;
  let posted = apply_movement(&tx, input, now)?;
  tx.commit()?;
  Ok(posted)
}

fn list(conn: &Connection, supply_id: Uuid) -> Result<Vec<StockMovement>> {
  if get_supply(conn, supply_id)?.is_none() {
    return Err(CoreError::not_found("supply", supply_id).into());
  }
  let mut stmt = conn.prepare(&format!(
    "SELECT {MOVEMENT_COLUMNS} FROM stock_movements
     WHERE supply_id = ?1
     ORDER BY created_at DESC, rowid DESC"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(supply_id)], RawMovement::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMovement::into_movement).collect()
}

fn level(conn: &Connection, supply_id: Uuid) -> Result<StockLevel> {
  let supply = get_supply(conn, supply_id)?.ok_or_else(|| CoreError::not_found("supply", supply_id))?;
  Ok(StockLevel::from(&supply))
}

fn recompute(conn: &mut Connection, supply_id: Uuid) -> Result<StockLevel> {
  let tx = conn.transaction()?;
  let mut supply =
    get_supply(&tx, supply_id)?.ok_or_else(|| CoreError::not_found("supply", supply_id))?;

  let balance: i64 = tx.query_row(
    "SELECT COALESCE(SUM(CASE movement_type WHEN 'entry' THEN quantity ELSE -quantity END), 0)
     FROM stock_movements WHERE supply_id = ?1",
    params![encode_uuid(supply_id)],
    |row| row.get(0),
  )?;

  if balance != supply.current_stock {
    tracing::warn!(
      supply_id = %supply_id,
      cached = supply.current_stock,
      ledger = balance,
      "stock cache drifted from ledger; repairing"
    );
    tx.execute(
      "UPDATE supplies SET current_stock = ?2 WHERE supply_id = ?1",
      params![encode_uuid(supply_id), balance],
    )?;
    supply.current_stock = balance;
  }
  tx.commit()?;
  Ok(StockLevel::from(&supply))
}

fn low_stock(conn: &Connection) -> Result<Vec<Supply>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SUPPLY_COLUMNS} FROM supplies
     WHERE status = 'active' AND current_stock <= min_stock
     ORDER BY current_stock - min_stock, name"
  ))?;
  let raws = stmt.query_map([], RawSupply::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSupply::into_supply).collect()
}

impl StockLedger for SqliteStore {
  async fn post_movement(&self, input: NewMovement) -> Result<(StockMovement, StockLevel)> {
    self.run(move |conn| post(conn, input, Utc::now())).await
  }

  async fn list_movements(&self, supply_id: Uuid) -> Result<Vec<StockMovement>> {
    self.run(move |conn| list(conn, supply_id)).await
  }

  async fn stock_level(&self, supply_id: Uuid) -> Result<StockLevel> {
    self.run(move |conn| level(conn, supply_id)).await
  }

  async fn recompute_stock(&self, supply_id: Uuid) -> Result<StockLevel> {
    self.run(move |conn| recompute(conn, supply_id)).await
  }

  async fn low_stock(&self) -> Result<Vec<Supply>> {
    self.run(|conn| low_stock(conn)).await
  }
}
