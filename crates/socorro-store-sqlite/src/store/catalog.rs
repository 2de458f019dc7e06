//! Categories, supplies, institutions and medical services.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use socorro_core::{
  Error as CoreError,
  catalog::{
    Category, Institution, MedicalService, NewCategory, NewInstitution, NewMedicalService, Supply,
    SupplyInput, SupplyQuery,
  },
  store::CatalogStore,
};
use uuid::Uuid;

use super::SqliteStore;
use crate::{
  Result,
  encode::{
    CATEGORY_COLUMNS, INSTITUTION_COLUMNS, RawCategory, RawInstitution, RawService, RawSupply,
    SERVICE_COLUMNS, SUPPLY_COLUMNS, encode_dt, encode_uuid,
  },
};

// ─── Categories ──────────────────────────────────────────────────────────────

pub(super) fn get_category(conn: &Connection, id: Uuid) -> Result<Option<Category>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE category_id = ?1"),
      params![encode_uuid(id)],
      RawCategory::from_row,
    )
    .optional()?;
  raw.map(RawCategory::into_category).transpose()
}

fn create_category(conn: &mut Connection, input: NewCategory, now: DateTime<Utc>) -> Result<Category> {
  input.validate()?;

  let tx = conn.transaction()?;
  if let Some(parent) = input.parent_id
    && get_category(&tx, parent)?.is_none()
  {
    return Err(CoreError::invalid("parent_id", format!("category {parent} does not exist")).into());
  }

  let category = Category {
    category_id:  Uuid::new_v4(),
    name:         input.name.trim().to_owned(),
    parent_id:    input.parent_id,
    requirements: input.requirements.iter().map(|r| r.trim().to_owned()).collect(),
    created_at:   now,
  };
  tx.execute(
    &format!("INSERT INTO categories ({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
    params![
      encode_uuid(category.category_id),
      category.name,
      category.parent_id.map(encode_uuid),
      serde_json::to_string(&category.requirements)?,
      encode_dt(category.created_at),
    ],
  )?;
  tx.commit()?;
  Ok(category)
}

fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"))?;
  let raws = stmt.query_map([], RawCategory::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCategory::into_category).collect()
}

// ─── Supplies ────────────────────────────────────────────────────────────────

pub(super) fn get_supply(conn: &Connection, id: Uuid) -> Result<Option<Supply>> {
  let raw = conn
    .query_row(
      &format!("SELECT {SUPPLY_COLUMNS} FROM supplies WHERE supply_id = ?1"),
      params![encode_uuid(id)],
      RawSupply::from_row,
    )
    .optional()?;
  raw.map(RawSupply::into_supply).transpose()
}

fn check_supply_category(conn: &Connection, input: &SupplyInput) -> Result<()> {
  if get_category(conn, input.category_id)?.is_none() {
    return Err(
      CoreError::invalid("category_id", format!("category {} does not exist", input.category_id))
        .into(),
    );
  }
  Ok(())
}

fn create_supply(conn: &mut Connection, input: SupplyInput, now: DateTime<Utc>) -> Result<Supply> {
  input.validate()?;

  let tx = conn.transaction()?;
  check_supply_category(&tx, &input)?;

  let supply = Supply {
    supply_id:     Uuid::new_v4(),
    category_id:   input.category_id,
    name:          input.name.trim().to_owned(),
    unit:          input.unit.trim().to_owned(),
    concentration: input.concentration,
    status:        input.status,
    current_stock: 0,
    min_stock:     input.min_stock,
    created_at:    now,
  };
  tx.execute(
    &format!("INSERT INTO supplies ({SUPPLY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
    params![
      encode_uuid(supply.supply_id),
      encode_uuid(supply.category_id),
      supply.name,
      supply.unit,
      supply.concentration,
      supply.status.as_ref(),
      supply.current_stock,
      supply.min_stock,
      encode_dt(supply.created_at),
    ],
  )?;
  tx.commit()?;

  tracing::debug!(supply_id = %supply.supply_id, name = %supply.name, "supply created");
  Ok(supply)
}

fn update_supply(conn: &mut Connection, id: Uuid, input: SupplyInput) -> Result<Supply> {
  input.validate()?;

  let tx = conn.transaction()?;
  check_supply_category(&tx, &input)?;

  // current_stock belongs to the ledger.
  let changed = tx.execute(
    "UPDATE supplies SET category_id = ?2, name = ?3, unit = ?4, concentration = ?5,
       status = ?6, min_stock = ?7
     WHERE supply_id = ?1",
    params![
      encode_uuid(id),
      encode_uuid(input.category_id),
      input.name.trim(),
      input.unit.trim(),
      input.concentration,
      input.status.as_ref(),
      input.min_stock,
    ],
  )?;
  if changed == 0 {
    return Err(CoreError::not_found("supply", id).into());
  }

  let supply = get_supply(&tx, id)?.ok_or_else(|| CoreError::not_found("supply", id))?;
  tx.commit()?;
  Ok(supply)
}

fn list_supplies(conn: &Connection, query: &SupplyQuery) -> Result<Vec<Supply>> {
  let pattern = query.text.as_deref().map(|t| format!("%{}%", t.trim()));
  let mut stmt = conn.prepare(&format!(
    "SELECT {SUPPLY_COLUMNS} FROM supplies
     WHERE (?1 IS NULL OR category_id = ?1)
       AND (?2 IS NULL OR status = ?2)
       AND (?3 IS NULL OR name LIKE ?3 OR concentration LIKE ?3)
     ORDER BY name"
  ))?;
  let raws = stmt
    .query_map(
      params![
        query.category_id.map(encode_uuid),
        query.status.map(|s| s.as_ref().to_owned()),
        pattern,
      ],
      RawSupply::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSupply::into_supply).collect()
}

// ─── Institutions and services ───────────────────────────────────────────────

fn get_institution(conn: &Connection, id: Uuid) -> Result<Option<Institution>> {
  let raw = conn
    .query_row(
      &format!("SELECT {INSTITUTION_COLUMNS} FROM institutions WHERE institution_id = ?1"),
      params![encode_uuid(id)],
      RawInstitution::from_row,
    )
    .optional()?;
  raw.map(RawInstitution::into_institution).transpose()
}

fn create_institution(conn: &Connection, input: NewInstitution) -> Result<Institution> {
  input.validate()?;
  let institution = Institution {
    institution_id: Uuid::new_v4(),
    name:           input.name.trim().to_owned(),
    address:        input.address,
    phone:          input.phone,
  };
  conn.execute(
    &format!("INSERT INTO institutions ({INSTITUTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
    params![
      encode_uuid(institution.institution_id),
      institution.name,
      institution.address,
      institution.phone,
    ],
  )?;
  Ok(institution)
}

fn list_institutions(conn: &Connection) -> Result<Vec<Institution>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {INSTITUTION_COLUMNS} FROM institutions ORDER BY name"))?;
  let raws =
    stmt.query_map([], RawInstitution::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawInstitution::into_institution).collect()
}

pub(super) fn get_service(conn: &Connection, id: Uuid) -> Result<Option<MedicalService>> {
  let raw = conn
    .query_row(
      &format!("SELECT {SERVICE_COLUMNS} FROM medical_services WHERE service_id = ?1"),
      params![encode_uuid(id)],
      RawService::from_row,
    )
    .optional()?;
  raw.map(RawService::into_service).transpose()
}

fn create_service(conn: &mut Connection, input: NewMedicalService) -> Result<MedicalService> {
  input.validate()?;

  let tx = conn.transaction()?;
  if let Some(institution) = input.institution_id
    && get_institution(&tx, institution)?.is_none()
  {
    return Err(
      CoreError::invalid("institution_id", format!("institution {institution} does not exist"))
        .into(),
    );
  }

  let service = MedicalService {
    service_id:     Uuid::new_v4(),
    institution_id: input.institution_id,
    name:           input.name.trim().to_owned(),
    description:    input.description,
    active:         true,
  };
  tx.execute(
    &format!("INSERT INTO medical_services ({SERVICE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
    params![
      encode_uuid(service.service_id),
      service.institution_id.map(encode_uuid),
      service.name,
      service.description,
      service.active,
    ],
  )?;
  tx.commit()?;
  Ok(service)
}

fn list_services(conn: &Connection) -> Result<Vec<MedicalService>> {
  let mut stmt =
    conn.prepare(&format!("SELECT {SERVICE_COLUMNS} FROM medical_services ORDER BY name"))?;
  let raws = stmt.query_map([], RawService::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawService::into_service).collect()
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  async fn create_category(&self, input: NewCategory) -> Result<Category> {
    self.run(move |conn| create_category(conn, input, Utc::now())).await
  }

  async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
    self.run(move |conn| get_category(conn, id)).await
  }

  async fn list_categories(&self) -> Result<Vec<Category>> {
    self.run(|conn| list_categories(conn)).await
  }

  async fn create_supply(&self, input: SupplyInput) -> Result<Supply> {
    self.run(move |conn| create_supply(conn, input, Utc::now())).await
  }

  async fn get_supply(&self, id: Uuid) -> Result<Option<Supply>> {
    self.run(move |conn| get_supply(conn, id)).await
  }

  async fn list_supplies(&self, query: &SupplyQuery) -> Result<Vec<Supply>> {
    let query = query.clone();
    self.run(move |conn| list_supplies(conn, &query)).await
  }

  async fn update_supply(&self, id: Uuid, input: SupplyInput) -> Result<Supply> {
    self.run(move |conn| update_supply(conn, id, input)).await
  }

  async fn create_institution(&self, input: NewInstitution) -> Result<Institution> {
    self.run(move |conn| create_institution(conn, input)).await
  }

  async fn list_institutions(&self) -> Result<Vec<Institution>> {
    self.run(|conn| list_institutions(conn)).await
  }

  async fn create_service(&self, input: NewMedicalService) -> Result<MedicalService> {
    self.run(move |conn| create_service(conn, input)).await
  }

  async fn get_service(&self, id: Uuid) -> Result<Option<MedicalService>> {
    self.run(move |conn| get_service(conn, id)).await
  }

  async fn list_services(&self) -> Result<Vec<MedicalService>> {
    self.run(|conn| list_services(conn)).await
  }
}
