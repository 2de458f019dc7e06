//! Social cases: intake, review, fulfilment and the case-status roll-up.
//!
//! Every operation loads the current rows inside one transaction, applies the
//! matching rule from `socorro_core::case`, writes the result back with an
//! update guarded on the status it was loaded in, and re-aggregates the case
//! status before committing.

use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use socorro_core::{
  Error as CoreError, ValidationErrors,
  case::{
    CaseDetail, CaseItem, CaseQuery, CaseStats, CaseStatus, Fulfillment, ItemStatus, Itemable,
    NewCase, Review, SocialCase, aggregate_status, format_case_number,
  },
  catalog::SupplyStatus,
  profile,
  stock::{MovementReason, MovementReference, MovementType, NewMovement},
  store::CaseStore,
};
use uuid::Uuid;

use super::{
  SqliteStore,
  catalog::{get_category, get_service, get_supply},
  citizens,
  stock::apply_movement,
};
use crate::{
  Result,
  encode::{
    CASE_COLUMNS, ITEM_COLUMNS, RawCase, RawItem, decode_enum, encode_dt, encode_uuid,
  },
};

// ─── Loading ─────────────────────────────────────────────────────────────────

/// A live (not soft-deleted) case.
fn load_case(conn: &Connection, id: Uuid) -> Result<SocialCase> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {CASE_COLUMNS} FROM social_cases WHERE case_id = ?1 AND deleted_at IS NULL"
      ),
      params![encode_uuid(id)],
      RawCase::from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("case", id))?;
  raw.into_case()
}

fn load_items(conn: &Connection, case_id: Uuid) -> Result<Vec<CaseItem>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ITEM_COLUMNS} FROM case_items WHERE case_id = ?1 ORDER BY created_at, rowid"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(case_id)], RawItem::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawItem::into_item).collect()
}

fn load_item(conn: &Connection, case_id: Uuid, item_id: Uuid) -> Result<CaseItem> {
  let raw = conn
    .query_row(
      &format!("SELECT {ITEM_COLUMNS} FROM case_items WHERE item_id = ?1 AND case_id = ?2"),
      params![encode_uuid(item_id), encode_uuid(case_id)],
      RawItem::from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::not_found("case item", item_id))?;
  raw.into_item()
}

fn get_detail(conn: &Connection, id: Uuid) -> Result<Option<CaseDetail>> {
  match load_case(conn, id) {
    Ok(case) => {
      let items = load_items(conn, id)?;
      Ok(Some(CaseDetail { case, items }))
    }
    Err(crate::Error::Core(CoreError::NotFound { .. })) => Ok(None),
    Err(e) => Err(e),
  }
}

// ─── Writing ─────────────────────────────────────────────────────────────────

/// Persist the mutable columns of `case`, guarded on the status it had when
/// loaded.
fn write_case(conn: &Connection, case: &SocialCase, loaded_as: CaseStatus) -> Result<()> {
  let changed = conn.execute(
    "UPDATE social_cases SET assigned_to = ?2, status = ?3, updated_at = ?4, deleted_at = ?5
     WHERE case_id = ?1 AND status = ?6 AND deleted_at IS NULL",
    params![
      encode_uuid(case.case_id),
      case.assigned_to.map(encode_uuid),
      case.status.as_ref(),
      encode_dt(case.updated_at),
      case.deleted_at.map(encode_dt),
      loaded_as.as_ref(),
    ],
  )?;
  if changed == 0 {
    return Err(
      CoreError::InvalidTransition {
        entity: "case",
        id:     case.case_id,
        from:   loaded_as.as_ref().to_owned(),
        to:     case.status.as_ref().to_owned(),
      }
      .into(),
    );
  }
  Ok(())
}

/// Persist a reviewed or fulfilled item. Only the writer that still sees the
/// item in `loaded_as` wins.
fn write_item(conn: &Connection, item: &CaseItem, loaded_as: ItemStatus) -> Result<()> {
  let changed = conn.execute(
    "UPDATE case_items SET approved_quantity = ?2, status = ?3, reviewed_by = ?4,
       reviewed_at = ?5, review_note = ?6, fulfilled_at = ?7, fulfilled_by = ?8
     WHERE item_id = ?1 AND status = ?9",
    params![
      encode_uuid(item.item_id),
      item.approved_quantity,
      item.status.as_ref(),
      item.reviewed_by.map(encode_uuid),
      item.reviewed_at.map(encode_dt),
      item.review_note,
      item.fulfilled_at.map(encode_dt),
      item.fulfilled_by.map(encode_uuid),
      loaded_as.as_ref(),
    ],
  )?;
  if changed == 0 {
    return Err(
      CoreError::InvalidTransition {
        entity: "case item",
        id:     item.item_id,
        from:   loaded_as.as_ref().to_owned(),
        to:     item.status.as_ref().to_owned(),
      }
      .into(),
    );
  }
  Ok(())
}

/// Recompute the case status from its items and store it.
fn reaggregate(conn: &Connection, case_id: Uuid, now: DateTime<Utc>) -> Result<SocialCase> {
  let mut case = load_case(conn, case_id)?;
  let statuses: Vec<ItemStatus> = load_items(conn, case_id)?.iter().map(|i| i.status).collect();
  let loaded_as = case.status;

  case.status = aggregate_status(case.status, case.assigned_to.is_some(), &statuses);
  case.updated_at = now;
  write_case(conn, &case, loaded_as)?;

  if case.status != loaded_as {
    tracing::debug!(
      case_id = %case.case_id,
      from = loaded_as.as_ref(),
      to = case.status.as_ref(),
      "case status changed"
    );
  }
  Ok(case)
}

// ─── Intake ──────────────────────────────────────────────────────────────────

/// Reference checks that need the database. Collected so the caller sees
/// every problem at once.
fn check_references(conn: &Connection, input: &NewCase) -> Result<()> {
  let mut errors = ValidationErrors::new();

  for (field, id) in [
    ("citizen_id", input.citizen_id),
    ("applicant_id", input.applicant()),
    ("beneficiary_id", input.beneficiary()),
  ] {
    if !citizens::exists(conn, id)? {
      errors.push(field, format!("citizen {id} does not exist"));
    }
  }

  if get_category(conn, input.category_id)?.is_none() {
    errors.push("category_id", format!("category {} does not exist", input.category_id));
  }
  if let Some(sub) = input.subcategory_id {
    match get_category(conn, sub)? {
      None => errors.push("subcategory_id", format!("category {sub} does not exist")),
      Some(c) if c.parent_id != Some(input.category_id) => errors.push(
        "subcategory_id",
        format!("{} is not a subcategory of the selected category", c.name),
      ),
      Some(_) => {}
    }
  }

  for (i, item) in input.items.iter().enumerate() {
    let field = format!("items.{i}.itemable");
    match item.itemable {
      Itemable::Supply(id) => match get_supply(conn, id)? {
        None => errors.push(field, format!("supply {id} does not exist")),
        Some(s) if s.status != SupplyStatus::Active => {
          errors.push(field, format!("supply {} is inactive", s.name))
        }
        Some(_) => {}
      },
      Itemable::MedicalService(id) => match get_service(conn, id)? {
        None => errors.push(field, format!("medical service {id} does not exist")),
        Some(s) if !s.active => errors.push(field, format!("medical service {} is inactive", s.name)),
        Some(_) => {}
      },
    }
  }

  Ok(errors.into_result()?)
}

/// The beneficiary's record must pass the intake profile check as of `today`.
fn check_beneficiary(conn: &Connection, beneficiary_id: Uuid, today: NaiveDate) -> Result<()> {
  let citizen = citizens::get(conn, beneficiary_id)?
    .ok_or_else(|| CoreError::not_found("citizen", beneficiary_id))?;
  let health = citizens::get_health(conn, beneficiary_id)?;

  let mut errors = ValidationErrors::new();
  for message in profile::check(&citizen, health.as_ref(), today).errors {
    errors.push("beneficiary_id", message);
  }
  Ok(errors.into_result()?)
}

/// Next `CS-<year>-<seq>` number. Soft-deleted cases keep their numbers.
fn next_case_number(conn: &Connection, year: i32) -> Result<String> {
  let taken: i64 = conn.query_row(
    "SELECT COUNT(*) FROM social_cases WHERE case_number LIKE ?1",
    params![format!("CS-{year}-%")],
    |row| row.get(0),
  )?;
  Ok(format_case_number(year, taken as u32 + 1))
}

fn create(
  conn: &mut Connection,
  input: NewCase,
  created_by: Uuid,
  now: DateTime<Utc>,
) -> Result<CaseDetail> {
  input.validate()?;

  let tx = conn.transaction()?;
  check_references(&tx, &input)?;
  check_beneficiary(&tx, input.beneficiary(), now.date_naive())?;

  let case = SocialCase {
    case_id:        Uuid::new_v4(),
    case_number:    next_case_number(&tx, now.year())?,
    citizen_id:     input.citizen_id,
    applicant_id:   input.applicant(),
    beneficiary_id: input.beneficiary(),
    created_by,
    assigned_to:    None,
    category_id:    input.category_id,
    subcategory_id: input.subcategory_id,
    channel:        input.channel,
    description:    input.description.trim().to_owned(),
    status:         CaseStatus::Open,
    created_at:     now,
    updated_at:     now,
    deleted_at:     None,
  };
  tx.execute(
    &format!(
      "INSERT INTO social_cases ({CASE_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
    ),
    params![
      encode_uuid(case.case_id),
      case.case_number,
      encode_uuid(case.citizen_id),
      encode_uuid(case.applicant_id),
      encode_uuid(case.beneficiary_id),
      encode_uuid(case.created_by),
      case.assigned_to.map(encode_uuid),
      encode_uuid(case.category_id),
      case.subcategory_id.map(encode_uuid),
      case.channel.as_ref(),
      case.description,
      case.status.as_ref(),
      encode_dt(case.created_at),
      encode_dt(case.updated_at),
      case.deleted_at.map(encode_dt),
    ],
  )?;

  let mut items = Vec::with_capacity(input.items.len());
  for new in input.items {
    let item = CaseItem {
      item_id:           Uuid::new_v4(),
      case_id:           case.case_id,
      itemable:          new.itemable,
      quantity:          new.quantity,
      approved_quantity: None,
      status:            ItemStatus::Pending,
      notes:             new.notes,
      reviewed_by:       None,
      reviewed_at:       None,
      review_note:       None,
      fulfilled_at:      None,
      fulfilled_by:      None,
      created_at:        now,
    };
    tx.execute(
      &format!(
        "INSERT INTO case_items ({ITEM_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
      ),
      params![
        encode_uuid(item.item_id),
        encode_uuid(item.case_id),
        item.itemable.kind(),
        encode_uuid(item.itemable.id()),
        item.quantity,
        item.approved_quantity,
        item.status.as_ref(),
        item.notes,
        item.reviewed_by.map(encode_uuid),
        item.reviewed_at.map(encode_dt),
        item.review_note,
        item.fulfilled_at.map(encode_dt),
        item.fulfilled_by.map(encode_uuid),
        encode_dt(item.created_at),
      ],
    )?;
    items.push(item);
  }
  tx.commit()?;

  tracing::debug!(
    case_id = %case.case_id,
    case_number = %case.case_number,
    items = items.len(),
    "case created"
  );
  Ok(CaseDetail { case, items })
}

fn list(conn: &Connection, query: &CaseQuery) -> Result<Vec<SocialCase>> {
  let pattern = query.text.as_deref().map(|t| format!("%{}%", t.trim()));
  let limit = query.limit.unwrap_or(100) as i64;
  let offset = query.offset.unwrap_or(0) as i64;

  let mut stmt = conn.prepare(&format!(
    "SELECT {CASE_COLUMNS} FROM social_cases
     WHERE deleted_at IS NULL
       AND (?1 IS NULL OR status = ?1)
       AND (?2 IS NULL OR citizen_id = ?2)
       AND (?3 IS NULL OR assigned_to = ?3)
       AND (?4 IS NULL OR case_number LIKE ?4 OR description LIKE ?4)
       AND (?5 IS NULL OR created_by = ?5 OR assigned_to = ?5)
     ORDER BY created_at DESC, rowid DESC
     LIMIT ?6 OFFSET ?7"
  ))?;
  let raws = stmt
    .query_map(
      params![
        query.status.map(|s| s.as_ref().to_owned()),
        query.citizen_id.map(encode_uuid),
        query.assigned_to.map(encode_uuid),
        pattern,
        query.visible_to.map(encode_uuid),
        limit,
        offset,
      ],
      RawCase::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCase::into_case).collect()
}

// ─── Workflow ────────────────────────────────────────────────────────────────

fn assign(conn: &mut Connection, id: Uuid, assignee: Uuid, now: DateTime<Utc>) -> Result<SocialCase> {
  let tx = conn.transaction()?;

  let active: Option<bool> = tx
    .query_row(
      "SELECT active FROM users WHERE user_id = ?1",
      params![encode_uuid(assignee)],
      |row| row.get(0),
    )
    .optional()?;
  match active {
    Some(true) => {}
    Some(false) => {
      return Err(CoreError::invalid("assigned_to", "assignee is not an active user").into());
    }
    None => {
      return Err(CoreError::invalid("assigned_to", format!("user {assignee} does not exist")).into());
    }
  }

  let mut case = load_case(&tx, id)?;
  let loaded_as = case.status;
  case.assign(assignee)?;
  case.updated_at = now;
  write_case(&tx, &case, loaded_as)?;
  tx.commit()?;

  tracing::debug!(case_id = %id, assignee = %assignee, "case assigned");
  Ok(case)
}

fn review(
  conn: &mut Connection,
  case_id: Uuid,
  item_id: Uuid,
  review: Review,
  reviewer: Uuid,
  now: DateTime<Utc>,
) -> Result<CaseItem> {
  let tx = conn.transaction()?;
  load_case(&tx, case_id)?;

  let mut item = load_item(&tx, case_id, item_id)?;
  let loaded_as = item.status;
  item.review(&review, reviewer, now)?;
  write_item(&tx, &item, loaded_as)?;
  reaggregate(&tx, case_id, now)?;
  tx.commit()?;

  tracing::debug!(case_id = %case_id, item_id = %item_id, status = item.status.as_ref(), "item reviewed");
  Ok(item)
}

fn fulfill(
  conn: &mut Connection,
  case_id: Uuid,
  item_id: Uuid,
  actor: Uuid,
  now: DateTime<Utc>,
) -> Result<Fulfillment> {
  let tx = conn.transaction()?;
  let case = load_case(&tx, case_id)?;
  if case.status == CaseStatus::Closed {
    return Err(
      CoreError::InvalidTransition {
        entity: "case",
        id:     case_id,
        from:   case.status.as_ref().to_owned(),
        to:     ItemStatus::Fulfilled.as_ref().to_owned(),
      }
      .into(),
    );
  }

  let mut item = load_item(&tx, case_id, item_id)?;
  let loaded_as = item.status;
  let quantity = item.fulfill(actor, now)?;

  // Claim the item before touching stock so a concurrent fulfilment of the
  // same item loses here.
  write_item(&tx, &item, loaded_as)?;

  let stock_level = match item.itemable {
    Itemable::Supply(supply_id) => {
      let (_, level) = apply_movement(
        &tx,
        NewMovement {
          supply_id,
          movement_type: MovementType::Exit,
          quantity,
          reason: MovementReason::Delivery,
          reference: Some(MovementReference::CaseItem(item_id)),
          actor_id: actor,
          notes: Some(case.case_number.clone()),
        },
        now,
      )?;
      Some(level)
    }
    Itemable::MedicalService(_) => None,
  };

  reaggregate(&tx, case_id, now)?;
  tx.commit()?;

  tracing::debug!(case_id = %case_id, item_id = %item_id, quantity, "item fulfilled");
  Ok(Fulfillment { item, stock_level })
}

fn close(conn: &mut Connection, id: Uuid, now: DateTime<Utc>) -> Result<SocialCase> {
  let tx = conn.transaction()?;
  let mut case = load_case(&tx, id)?;
  let loaded_as = case.status;
  case.close()?;
  case.updated_at = now;
  write_case(&tx, &case, loaded_as)?;
  tx.commit()?;
  Ok(case)
}

fn soft_delete(conn: &mut Connection, id: Uuid, now: DateTime<Utc>) -> Result<()> {
  let tx = conn.transaction()?;
  let mut case = load_case(&tx, id)?;
  let loaded_as = case.status;
  case.deleted_at = Some(now);
  case.updated_at = now;
  write_case(&tx, &case, loaded_as)?;
  tx.commit()?;

  tracing::debug!(case_id = %id, "case deleted");
  Ok(())
}

// ─── Reporting ───────────────────────────────────────────────────────────────

fn stats(conn: &Connection, visible_to: Option<Uuid>) -> Result<CaseStats> {
  let scope = visible_to.map(encode_uuid);
  let mut out = CaseStats::default();

  let mut stmt = conn.prepare(
    "SELECT status, COUNT(*) FROM social_cases
     WHERE deleted_at IS NULL AND (?1 IS NULL OR created_by = ?1 OR assigned_to = ?1)
     GROUP BY status",
  )?;
  let rows = stmt
    .query_map(params![scope], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for (status, n) in rows {
    out.cases.insert(decode_enum("case status", &status)?, n as u64);
  }

  let mut stmt = conn.prepare(
    "SELECT i.status, COUNT(*) FROM case_items i
     JOIN social_cases c ON c.case_id = i.case_id
     WHERE c.deleted_at IS NULL AND (?1 IS NULL OR c.created_by = ?1 OR c.assigned_to = ?1)
     GROUP BY i.status",
  )?;
  let rows = stmt
    .query_map(params![scope], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  for (status, n) in rows {
    out.items.insert(decode_enum("item status", &status)?, n as u64);
  }

  Ok(out)
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  async fn create_case(&self, input: NewCase, created_by: Uuid) -> Result<CaseDetail> {
    self.run(move |conn| create(conn, input, created_by, Utc::now())).await
  }

  async fn get_case(&self, id: Uuid) -> Result<Option<CaseDetail>> {
    self.run(move |conn| get_detail(conn, id)).await
  }

  async fn list_cases(&self, query: &CaseQuery) -> Result<Vec<SocialCase>> {
    let query = query.clone();
    self.run(move |conn| list(conn, &query)).await
  }

  async fn assign_case(&self, id: Uuid, assignee: Uuid) -> Result<SocialCase> {
    self.run(move |conn| assign(conn, id, assignee, Utc::now())).await
  }

  async fn review_item(
    &self,
    case_id: Uuid,
    item_id: Uuid,
    input: Review,
    reviewer: Uuid,
  ) -> Result<CaseItem> {
    self.run(move |conn| review(conn, case_id, item_id, input, reviewer, Utc::now())).await
  }

  async fn fulfill_item(&self, case_id: Uuid, item_id: Uuid, actor: Uuid) -> Result<Fulfillment> {
    self.run(move |conn| fulfill(conn, case_id, item_id, actor, Utc::now())).await
  }

  async fn close_case(&self, id: Uuid) -> Result<SocialCase> {
    self.run(move |conn| close(conn, id, Utc::now())).await
  }

  async fn delete_case(&self, id: Uuid) -> Result<()> {
    self.run(move |conn| soft_delete(conn, id, Utc::now())).await
  }

  async fn case_stats(&self, visible_to: Option<Uuid>) -> Result<CaseStats> {
    self.run(move |conn| stats(conn, visible_to)).await
  }
}
