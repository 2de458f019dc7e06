//! Social cases, their requested items, and the rules that move them through
//! review and fulfilment.
//!
//! Item lifecycle: `pending → {approved, rejected}`, `approved → fulfilled`.
//! The case status is never set directly by review or fulfilment; it is
//! recomputed from the item statuses by [`aggregate_status`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result, ValidationErrors, stock::StockLevel};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseStatus {
  Open,
  InProgress,
  Approved,
  Rejected,
  Closed,
}

/// How the request reached the office.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
  InPerson,
  Phone,
  Email,
  SocialMedia,
  Referral,
  FieldVisit,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
  Pending,
  Approved,
  Rejected,
  Fulfilled,
}

/// What a case item asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Itemable {
  Supply(Uuid),
  MedicalService(Uuid),
}

impl Itemable {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Supply(_) => "supply",
      Self::MedicalService(_) => "medical_service",
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Supply(id) | Self::MedicalService(id) => *id,
    }
  }

  pub fn from_parts(kind: &str, id: Uuid) -> Result<Self> {
    match kind {
      "supply" => Ok(Self::Supply(id)),
      "medical_service" => Ok(Self::MedicalService(id)),
      other => Err(Error::UnknownDiscriminant { kind: "itemable", value: other.to_owned() }),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialCase {
  pub case_id:        Uuid,
  /// Human-facing number, `CS-<year>-<seq>`.
  pub case_number:    String,
  pub citizen_id:     Uuid,
  pub applicant_id:   Uuid,
  pub beneficiary_id: Uuid,
  pub created_by:     Uuid,
  pub assigned_to:    Option<Uuid>,
  pub category_id:    Uuid,
  pub subcategory_id: Option<Uuid>,
  pub channel:        Channel,
  pub description:    String,
  pub status:         CaseStatus,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
  pub deleted_at:     Option<DateTime<Utc>>,
}

impl SocialCase {
  /// Hand the case to `assignee`. Opens work on a fresh case.
  pub fn assign(&mut self, assignee: Uuid) -> Result<()> {
    if self.status == CaseStatus::Closed {
      return Err(self.transition_error(CaseStatus::InProgress));
    }
    self.assigned_to = Some(assignee);
    if self.status == CaseStatus::Open {
      self.status = CaseStatus::InProgress;
    }
    Ok(())
  }

  /// Close a decided case.
  pub fn close(&mut self) -> Result<()> {
    match self.status {
      CaseStatus::Approved | CaseStatus::Rejected => {
        self.status = CaseStatus::Closed;
        Ok(())
      }
      _ => Err(self.transition_error(CaseStatus::Closed)),
    }
  }

  fn transition_error(&self, to: CaseStatus) -> Error {
    Error::InvalidTransition {
      entity: "case",
      id:     self.case_id,
      from:   self.status.as_ref().to_owned(),
      to:     to.as_ref().to_owned(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseItem {
  pub item_id:           Uuid,
  pub case_id:           Uuid,
  pub itemable:          Itemable,
  /// Requested quantity.
  pub quantity:          i64,
  /// Set only when the item is approved.
  pub approved_quantity: Option<i64>,
  pub status:            ItemStatus,
  pub notes:             Option<String>,
  pub reviewed_by:       Option<Uuid>,
  pub reviewed_at:       Option<DateTime<Utc>>,
  pub review_note:       Option<String>,
  pub fulfilled_at:      Option<DateTime<Utc>>,
  pub fulfilled_by:      Option<Uuid>,
  pub created_at:        DateTime<Utc>,
}

impl CaseItem {
  /// Apply a review decision. Only pending items can be reviewed.
  pub fn review(&mut self, review: &Review, reviewer: Uuid, at: DateTime<Utc>) -> Result<()> {
    let target = review.status.item_status();
    if self.status != ItemStatus::Pending {
      return Err(self.transition_error(target));
    }

    match review.status {
      ReviewDecision::Approved => {
        let approved = review.approved_quantity.ok_or_else(|| {
          Error::invalid("approved_quantity", "approved quantity is required when approving")
        })?;
        if approved <= 0 || approved > self.quantity {
          return Err(Error::invalid(
            "approved_quantity",
            format!("approved quantity must be between 1 and {}", self.quantity),
          ));
        }
        self.approved_quantity = Some(approved);
      }
      ReviewDecision::Rejected => self.approved_quantity = None,
    }

    self.status = target;
    self.reviewed_by = Some(reviewer);
    self.reviewed_at = Some(at);
    self.review_note = review.review_note.clone().filter(|n| !n.trim().is_empty());
    Ok(())
  }

  /// Mark an approved item as delivered and return the quantity handed out.
  ///
  /// Fulfilment always uses the approved quantity; an approved item without
  /// one is rejected rather than falling back to the requested quantity.
  pub fn fulfill(&mut self, actor: Uuid, at: DateTime<Utc>) -> Result<i64> {
    if self.status != ItemStatus::Approved {
      return Err(self.transition_error(ItemStatus::Fulfilled));
    }
    let quantity = self.approved_quantity.ok_or_else(|| {
      Error::invalid("approved_quantity", "approved item has no approved quantity")
    })?;
    self.status = ItemStatus::Fulfilled;
    self.fulfilled_at = Some(at);
    self.fulfilled_by = Some(actor);
    Ok(quantity)
  }

  fn transition_error(&self, to: ItemStatus) -> Error {
    Error::InvalidTransition {
      entity: "case item",
      id:     self.item_id,
      from:   self.status.as_ref().to_owned(),
      to:     to.as_ref().to_owned(),
    }
  }
}

/// A case with its items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDetail {
  #[serde(flatten)]
  pub case:  SocialCase,
  pub items: Vec<CaseItem>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCaseItem {
  pub itemable: Itemable,
  pub quantity: i64,
  #[serde(default)]
  pub notes:    Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCase {
  pub citizen_id:     Uuid,
  /// Defaults to `citizen_id`.
  #[serde(default)]
  pub applicant_id:   Option<Uuid>,
  /// Defaults to `citizen_id`.
  #[serde(default)]
  pub beneficiary_id: Option<Uuid>,
  pub category_id:    Uuid,
  #[serde(default)]
  pub subcategory_id: Option<Uuid>,
  pub channel:        Channel,
  pub description:    String,
  pub items:          Vec<NewCaseItem>,
}

impl NewCase {
  /// Checks that need no storage access.
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("description", &self.description, "description is required");
    if self.items.is_empty() {
      errors.push("items", "at least one item must be requested");
    }
    for (i, item) in self.items.iter().enumerate() {
      if item.quantity <= 0 {
        errors.push(format!("items.{i}.quantity"), "quantity must be greater than zero");
      }
    }
    errors.into_result()
  }

  pub fn applicant(&self) -> Uuid { self.applicant_id.unwrap_or(self.citizen_id) }

  pub fn beneficiary(&self) -> Uuid { self.beneficiary_id.unwrap_or(self.citizen_id) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
  Approved,
  Rejected,
}

impl ReviewDecision {
  pub fn item_status(self) -> ItemStatus {
    match self {
      Self::Approved => ItemStatus::Approved,
      Self::Rejected => ItemStatus::Rejected,
    }
  }
}

/// A reviewer's decision on one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
  pub status:            ReviewDecision,
  #[serde(default)]
  pub approved_quantity: Option<i64>,
  #[serde(default)]
  pub review_note:       Option<String>,
}

/// The outcome of fulfilling an item: the updated item and, for supplies,
/// the stock left afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fulfillment {
  pub item:        CaseItem,
  pub stock_level: Option<StockLevel>,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Derive a case's status from its items.
///
/// - a closed case stays closed;
/// - a case without items keeps its status;
/// - while any item is pending, the case is `in_progress` once it is
///   assigned or some item has been decided, and `open` otherwise;
/// - once nothing is pending, the case is `approved` if any item was approved
///   (or already fulfilled) and `rejected` if every item was rejected.
pub fn aggregate_status(current: CaseStatus, assigned: bool, items: &[ItemStatus]) -> CaseStatus {
  if current == CaseStatus::Closed || items.is_empty() {
    return current;
  }
  let pending = items.iter().filter(|s| **s == ItemStatus::Pending).count();
  if pending > 0 {
    return if assigned || pending < items.len() {
      CaseStatus::InProgress
    } else {
      CaseStatus::Open
    };
  }
  if items.iter().any(|s| matches!(s, ItemStatus::Approved | ItemStatus::Fulfilled)) {
    CaseStatus::Approved
  } else {
    CaseStatus::Rejected
  }
}

/// `CS-2026-000042`.
pub fn format_case_number(year: i32, sequence: u32) -> String {
  format!("CS-{year}-{sequence:06}")
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for listing cases.
#[derive(Debug, Clone, Default)]
pub struct CaseQuery {
  pub status:      Option<CaseStatus>,
  pub citizen_id:  Option<Uuid>,
  pub assigned_to: Option<Uuid>,
  /// Matches the case number or description.
  pub text:        Option<String>,
  /// Restrict to cases created by or assigned to this user.
  pub visible_to:  Option<Uuid>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// Counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseStats {
  pub cases: BTreeMap<CaseStatus, u64>,
  pub items: BTreeMap<ItemStatus, u64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(quantity: i64) -> CaseItem {
    CaseItem {
      item_id: Uuid::new_v4(),
      case_id: Uuid::new_v4(),
      itemable: Itemable::Supply(Uuid::new_v4()),
      quantity,
      approved_quantity: None,
      status: ItemStatus::Pending,
      notes: None,
      reviewed_by: None,
      reviewed_at: None,
      review_note: None,
      fulfilled_at: None,
      fulfilled_by: None,
      created_at: Utc::now(),
    }
  }

  fn approve(qty: Option<i64>) -> Review {
    Review { status: ReviewDecision::Approved, approved_quantity: qty, review_note: None }
  }

  fn reject() -> Review {
    Review {
      status:            ReviewDecision::Rejected,
      approved_quantity: Some(3),
      review_note:       Some("duplicate request".into()),
    }
  }

  #[test]
  fn approval_records_reviewer_and_quantity() {
    let mut it = item(10);
    let reviewer = Uuid::new_v4();
    it.review(&approve(Some(8)), reviewer, Utc::now()).unwrap();
    assert_eq!(it.status, ItemStatus::Approved);
    assert_eq!(it.approved_quantity, Some(8));
    assert_eq!(it.reviewed_by, Some(reviewer));
    assert!(it.reviewed_at.is_some());
  }

  #[test]
  fn approval_requires_quantity_within_request() {
    let mut it = item(10);
    assert!(matches!(it.review(&approve(None), Uuid::nil(), Utc::now()), Err(Error::Validation(_))));
    assert!(matches!(it.review(&approve(Some(11)), Uuid::nil(), Utc::now()), Err(Error::Validation(_))));
    assert!(matches!(it.review(&approve(Some(0)), Uuid::nil(), Utc::now()), Err(Error::Validation(_))));
    assert_eq!(it.status, ItemStatus::Pending);
  }

  #[test]
  fn rejection_never_sets_approved_quantity() {
    let mut it = item(10);
    it.review(&reject(), Uuid::nil(), Utc::now()).unwrap();
    assert_eq!(it.status, ItemStatus::Rejected);
    assert_eq!(it.approved_quantity, None);
    assert_eq!(it.review_note.as_deref(), Some("duplicate request"));
  }

  #[test]
  fn reviewing_twice_is_an_invalid_transition() {
    let mut it = item(10);
    it.review(&approve(Some(5)), Uuid::nil(), Utc::now()).unwrap();
    let before = it.clone();
    assert!(matches!(
      it.review(&reject(), Uuid::nil(), Utc::now()),
      Err(Error::InvalidTransition { .. })
    ));
    assert_eq!(it, before);
  }

  #[test]
  fn fulfilment_needs_approval() {
    let mut it = item(4);
    assert!(matches!(it.fulfill(Uuid::nil(), Utc::now()), Err(Error::InvalidTransition { .. })));

    it.review(&approve(Some(3)), Uuid::nil(), Utc::now()).unwrap();
    let actor = Uuid::new_v4();
    assert_eq!(it.fulfill(actor, Utc::now()).unwrap(), 3);
    assert_eq!(it.status, ItemStatus::Fulfilled);
    assert_eq!(it.fulfilled_by, Some(actor));

    assert!(matches!(it.fulfill(actor, Utc::now()), Err(Error::InvalidTransition { .. })));
  }

  #[test]
  fn approved_item_without_quantity_cannot_be_fulfilled() {
    let mut it = item(4);
    it.status = ItemStatus::Approved;
    assert!(matches!(it.fulfill(Uuid::nil(), Utc::now()), Err(Error::Validation(_))));
    assert_eq!(it.status, ItemStatus::Approved);
  }

  #[test]
  fn aggregation_rules() {
    use CaseStatus as C;
    use ItemStatus as I;

    assert_eq!(aggregate_status(C::Open, false, &[]), C::Open);
    assert_eq!(aggregate_status(C::Open, false, &[I::Pending, I::Pending]), C::Open);
    assert_eq!(aggregate_status(C::Open, true, &[I::Pending]), C::InProgress);
    assert_eq!(aggregate_status(C::Open, false, &[I::Approved, I::Pending]), C::InProgress);
    assert_eq!(aggregate_status(C::InProgress, true, &[I::Approved, I::Rejected]), C::Approved);
    assert_eq!(aggregate_status(C::InProgress, true, &[I::Rejected, I::Rejected]), C::Rejected);
    assert_eq!(aggregate_status(C::Approved, true, &[I::Fulfilled, I::Rejected]), C::Approved);
    assert_eq!(aggregate_status(C::Closed, true, &[I::Pending]), C::Closed);
  }

  #[test]
  fn assignment_moves_open_cases_forward() {
    let mut case = SocialCase {
      case_id:        Uuid::new_v4(),
      case_number:    format_case_number(2026, 1),
      citizen_id:     Uuid::new_v4(),
      applicant_id:   Uuid::new_v4(),
      beneficiary_id: Uuid::new_v4(),
      created_by:     Uuid::new_v4(),
      assigned_to:    None,
      category_id:    Uuid::new_v4(),
      subcategory_id: None,
      channel:        Channel::InPerson,
      description:    "wheelchair".into(),
      status:         CaseStatus::Open,
      created_at:     Utc::now(),
      updated_at:     Utc::now(),
      deleted_at:     None,
    };
    assert_eq!(case.case_number, "CS-2026-000001");

    assert!(case.close().is_err());
    case.assign(Uuid::new_v4()).unwrap();
    assert_eq!(case.status, CaseStatus::InProgress);

    case.status = CaseStatus::Rejected;
    case.close().unwrap();
    assert_eq!(case.status, CaseStatus::Closed);
    assert!(matches!(case.assign(Uuid::new_v4()), Err(Error::InvalidTransition { .. })));
  }

  #[test]
  fn parties_default_to_citizen() {
    let citizen = Uuid::new_v4();
    let input = NewCase {
      citizen_id:     citizen,
      applicant_id:   None,
      beneficiary_id: None,
      category_id:    Uuid::new_v4(),
      subcategory_id: None,
      channel:        Channel::Phone,
      description:    "glucometer strips".into(),
      items:          vec![NewCaseItem {
        itemable: Itemable::Supply(Uuid::new_v4()),
        quantity: 2,
        notes:    None,
      }],
    };
    assert_eq!(input.applicant(), citizen);
    assert_eq!(input.beneficiary(), citizen);
    assert!(input.validate().is_ok());
  }

  #[test]
  fn new_case_requires_items_with_quantity() {
    let input = NewCase {
      citizen_id:     Uuid::new_v4(),
      applicant_id:   None,
      beneficiary_id: None,
      category_id:    Uuid::new_v4(),
      subcategory_id: None,
      channel:        Channel::Phone,
      description:    "".into(),
      items:          vec![NewCaseItem {
        itemable: Itemable::MedicalService(Uuid::new_v4()),
        quantity: 0,
        notes:    None,
      }],
    };
    match input.validate() {
      Err(Error::Validation(e)) => {
        let fields: Vec<_> = e.fields().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, ["description", "items.0.quantity"]);
      }
      other => panic!("expected validation error, got {other:?}"),
    }
  }

  #[test]
  fn itemable_is_tagged() {
    let id = Uuid::nil();
    let json = serde_json::to_value(Itemable::MedicalService(id)).unwrap();
    assert_eq!(json["kind"], "medical_service");
    assert_eq!(Itemable::from_parts("supply", id).unwrap(), Itemable::Supply(id));
  }
}
