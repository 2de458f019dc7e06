//! The stock ledger: append-only movements and the stock level they imply.
//!
//! The ledger is the source of truth. A supply's `current_stock` is a cache
//! of `sum(entries) - sum(exits)` and is updated in the same transaction as
//! every movement insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result, ValidationErrors, catalog::Supply};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MovementType {
  Entry,
  Exit,
}

impl MovementType {
  /// `+1` for entries, `-1` for exits.
  pub fn sign(self) -> i64 {
    match self {
      Self::Entry => 1,
      Self::Exit => -1,
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MovementReason {
  Purchase,
  Donation,
  /// Handed out to a beneficiary; posted by case-item fulfilment.
  Delivery,
  Adjustment,
  Loss,
}

/// What caused a movement, when it was not a manual inventory operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MovementReference {
  Case(Uuid),
  CaseItem(Uuid),
}

impl MovementReference {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Case(_) => "case",
      Self::CaseItem(_) => "case_item",
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Case(id) | Self::CaseItem(id) => *id,
    }
  }

  pub fn from_parts(kind: &str, id: Uuid) -> Result<Self> {
    match kind {
      "case" => Ok(Self::Case(id)),
      "case_item" => Ok(Self::CaseItem(id)),
      other => Err(Error::UnknownDiscriminant {
        kind:  "movement reference",
        value: other.to_owned(),
      }),
    }
  }
}

/// One ledger row. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
  pub movement_id:   Uuid,
  pub supply_id:     Uuid,
  pub movement_type: MovementType,
  pub quantity:      i64,
  pub reason:        MovementReason,
  pub reference:     Option<MovementReference>,
  pub actor_id:      Uuid,
  pub notes:         Option<String>,
  pub created_at:    DateTime<Utc>,
}

impl StockMovement {
  pub fn signed_quantity(&self) -> i64 { self.movement_type.sign() * self.quantity }
}

/// Input for posting a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
  pub supply_id:     Uuid,
  pub movement_type: MovementType,
  pub quantity:      i64,
  pub reason:        MovementReason,
  #[serde(default)]
  pub reference:     Option<MovementReference>,
  pub actor_id:      Uuid,
  #[serde(default)]
  pub notes:         Option<String>,
}

impl NewMovement {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    if self.quantity <= 0 {
      errors.push("quantity", "quantity must be greater than zero");
    }
    errors.into_result()
  }
}

/// The stock that results from applying a movement to `current`.
///
/// Exits may not drive stock below zero.
pub fn project(
  supply_id: Uuid,
  current: i64,
  movement_type: MovementType,
  quantity: i64,
) -> Result<i64> {
  if quantity <= 0 {
    return Err(Error::invalid("quantity", "quantity must be greater than zero"));
  }
  let next = current + movement_type.sign() * quantity;
  if next < 0 {
    return Err(Error::InsufficientStock {
      supply_id,
      requested: quantity,
      available: current,
    });
  }
  Ok(next)
}

/// Signed sum of a movement history.
pub fn ledger_balance<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> i64 {
  movements.into_iter().map(StockMovement::signed_quantity).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
  pub supply_id:     Uuid,
  pub current_stock: i64,
  pub min_stock:     i64,
  pub low_stock:     bool,
}

impl From<&Supply> for StockLevel {
  fn from(s: &Supply) -> Self {
    Self {
      supply_id:     s.supply_id,
      current_stock: s.current_stock,
      min_stock:     s.min_stock,
      low_stock:     s.is_low_stock(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entries_add_and_exits_subtract() {
    let id = Uuid::new_v4();
    assert_eq!(project(id, 10, MovementType::Entry, 5).unwrap(), 15);
    assert_eq!(project(id, 10, MovementType::Exit, 8).unwrap(), 2);
    assert_eq!(project(id, 10, MovementType::Exit, 10).unwrap(), 0);
  }

  #[test]
  fn exit_below_zero_is_insufficient() {
    let id = Uuid::new_v4();
    match project(id, 3, MovementType::Exit, 4) {
      Err(Error::InsufficientStock { requested, available, .. }) => {
        assert_eq!((requested, available), (4, 3));
      }
      other => panic!("expected insufficient stock, got {other:?}"),
    }
  }

  #[test]
  fn non_positive_quantities_are_rejected() {
    let id = Uuid::new_v4();
    assert!(matches!(project(id, 3, MovementType::Entry, 0), Err(Error::Validation(_))));
    assert!(matches!(project(id, 3, MovementType::Exit, -2), Err(Error::Validation(_))));
  }

  #[test]
  fn reference_serialises_as_tagged_pair() {
    let id = Uuid::nil();
    let json = serde_json::to_value(MovementReference::CaseItem(id)).unwrap();
    assert_eq!(json["kind"], "case_item");
    assert_eq!(json["id"], id.to_string());
    let back = MovementReference::from_parts("case_item", id).unwrap();
    assert_eq!(back, MovementReference::CaseItem(id));
    assert!(MovementReference::from_parts("invoice", id).is_err());
  }

  #[test]
  fn balance_is_signed_sum() {
    let supply_id = Uuid::new_v4();
    let mv = |t, q| StockMovement {
      movement_id: Uuid::new_v4(),
      supply_id,
      movement_type: t,
      quantity: q,
      reason: MovementReason::Adjustment,
      reference: None,
      actor_id: Uuid::nil(),
      notes: None,
      created_at: Utc::now(),
    };
    let history = [mv(MovementType::Entry, 20), mv(MovementType::Exit, 8), mv(MovementType::Entry, 1)];
    assert_eq!(ledger_balance(&history), 13);
  }
}
