//! Citizen registry queries.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use socorro_core::{
  ValidationErrors,
  citizen::{Citizen, CitizenQuery, HealthData, HealthProfile, NewCitizen},
  store::CitizenStore,
};
use uuid::Uuid;

use super::SqliteStore;
use crate::{
  Result,
  encode::{CITIZEN_COLUMNS, HEALTH_COLUMNS, RawCitizen, RawHealthProfile, encode_date, encode_dt,
    encode_uuid},
};

// ─── Queries ─────────────────────────────────────────────────────────────────

pub(super) fn get(conn: &Connection, id: Uuid) -> Result<Option<Citizen>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CITIZEN_COLUMNS} FROM citizens WHERE citizen_id = ?1"),
      params![encode_uuid(id)],
      RawCitizen::from_row,
    )
    .optional()?;
  raw.map(RawCitizen::into_citizen).transpose()
}

pub(super) fn exists(conn: &Connection, id: Uuid) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM citizens WHERE citizen_id = ?1",
        params![encode_uuid(id)],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn find(conn: &Connection, identification_value: &str) -> Result<Option<Citizen>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CITIZEN_COLUMNS} FROM citizens WHERE identification_value = ?1"),
      params![identification_value.trim()],
      RawCitizen::from_row,
    )
    .optional()?;
  raw.map(RawCitizen::into_citizen).transpose()
}

/// Uniqueness and representative checks. `self_id` is set on updates.
fn check_references(conn: &Connection, input: &NewCitizen, self_id: Option<Uuid>) -> Result<()> {
  let mut errors = ValidationErrors::new();

  if let Some(holder) = find(conn, &input.identification.value)?
    && Some(holder.citizen_id) != self_id
  {
    errors.push(
      "identification",
      format!("identification {} is already registered", input.identification),
    );
  }

  if let Some(rep) = input.representative_id {
    if Some(rep) == self_id {
      errors.push("representative_id", "a citizen cannot represent themselves");
    } else if !exists(conn, rep)? {
      errors.push("representative_id", format!("representative {rep} does not exist"));
    }
  }

  Ok(errors.into_result()?)
}

fn create(conn: &mut Connection, input: NewCitizen, now: DateTime<Utc>) -> Result<Citizen> {
  let input = input.normalized();
  input.validate(now.date_naive())?;

  let tx = conn.transaction()?;
  check_references(&tx, &input, None)?;

  let citizen = Citizen {
    citizen_id:        Uuid::new_v4(),
    identification:    input.identification,
    first_name:        input.first_name,
    middle_name:       input.middle_name,
    last_name:         input.last_name,
    second_last_name:  input.second_last_name,
    birth_date:        input.birth_date,
    gender:            input.gender,
    phone:             input.phone,
    email:             input.email,
    address:           input.address,
    representative_id: input.representative_id,
    photo_path:        None,
    created_at:        now,
    updated_at:        now,
  };

  tx.execute(
    &format!(
      "INSERT INTO citizens ({CITIZEN_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    ),
    params![
      encode_uuid(citizen.citizen_id),
      citizen.identification.nationality.as_ref(),
      citizen.identification.value,
      citizen.first_name,
      citizen.middle_name,
      citizen.last_name,
      citizen.second_last_name,
      citizen.birth_date.map(encode_date),
      citizen.gender.map(|g| g.as_ref().to_owned()),
      citizen.phone,
      citizen.email,
      citizen.address.as_ref().map(serde_json::to_string).transpose()?,
      citizen.representative_id.map(encode_uuid),
      citizen.photo_path,
      encode_dt(citizen.created_at),
      encode_dt(citizen.updated_at),
    ],
  )?;
  tx.commit()?;

  tracing::debug!(citizen_id = %citizen.citizen_id, identification = %citizen.identification, "citizen created");
  Ok(citizen)
}

fn update(conn: &mut Connection, id: Uuid, input: NewCitizen, now: DateTime<Utc>) -> Result<Citizen> {
  let input = input.normalized();
  input.validate(now.date_naive())?;

  let tx = conn.transaction()?;
  if !exists(&tx, id)? {
    return Err(socorro_core::Error::not_found("citizen", id).into());
  }
  check_references(&tx, &input, Some(id))?;

  tx.execute(
    "UPDATE citizens SET
       nationality = ?2, identification_value = ?3, first_name = ?4, middle_name = ?5,
       last_name = ?6, second_last_name = ?7, birth_date = ?8, gender = ?9, phone = ?10,
       email = ?11, address = ?12, representative_id = ?13, updated_at = ?14
     WHERE citizen_id = ?1",
    params![
      encode_uuid(id),
      input.identification.nationality.as_ref(),
      input.identification.value,
      input.first_name,
      input.middle_name,
      input.last_name,
      input.second_last_name,
      input.birth_date.map(encode_date),
      input.gender.map(|g| g.as_ref().to_owned()),
      input.phone,
      input.email,
      input.address.as_ref().map(serde_json::to_string).transpose()?,
      input.representative_id.map(encode_uuid),
      encode_dt(now),
    ],
  )?;

  let citizen = get(&tx, id)?.ok_or_else(|| socorro_core::Error::not_found("citizen", id))?;
  tx.commit()?;
  Ok(citizen)
}

fn set_photo(conn: &Connection, id: Uuid, path: String, now: DateTime<Utc>) -> Result<Citizen> {
  let changed = conn.execute(
    "UPDATE citizens SET photo_path = ?2, updated_at = ?3 WHERE citizen_id = ?1",
    params![encode_uuid(id), path, encode_dt(now)],
  )?;
  if changed == 0 {
    return Err(socorro_core::Error::not_found("citizen", id).into());
  }
  Ok(get(conn, id)?.ok_or_else(|| socorro_core::Error::not_found("citizen", id))?)
}

fn list(conn: &Connection, query: &CitizenQuery) -> Result<Vec<Citizen>> {
  let pattern = query.text.as_deref().map(|t| format!("%{}%", t.trim()));
  let limit = query.limit.unwrap_or(100) as i64;
  let offset = query.offset.unwrap_or(0) as i64;

  let mut stmt = conn.prepare(&format!(
    "SELECT {CITIZEN_COLUMNS} FROM citizens
     WHERE ?1 IS NULL
        OR identification_value LIKE ?1
        OR first_name || ' ' || COALESCE(middle_name, '') || ' ' || last_name || ' '
           || COALESCE(second_last_name, '') LIKE ?1
     ORDER BY last_name, first_name
     LIMIT ?2 OFFSET ?3"
  ))?;
  let raws = stmt
    .query_map(params![pattern, limit, offset], RawCitizen::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCitizen::into_citizen).collect()
}

pub(super) fn get_health(conn: &Connection, citizen_id: Uuid) -> Result<Option<HealthProfile>> {
  let raw = conn
    .query_row(
      &format!("SELECT {HEALTH_COLUMNS} FROM health_profiles WHERE citizen_id = ?1"),
      params![encode_uuid(citizen_id)],
      RawHealthProfile::from_row,
    )
    .optional()?;
  raw.map(RawHealthProfile::into_profile).transpose()
}

fn upsert_health(
  conn: &mut Connection,
  citizen_id: Uuid,
  data: HealthData,
  now: DateTime<Utc>,
) -> Result<HealthProfile> {
  data.validate()?;

  let tx = conn.transaction()?;
  if !exists(&tx, citizen_id)? {
    return Err(socorro_core::Error::not_found("citizen", citizen_id).into());
  }

  tx.execute(
    &format!(
      "INSERT INTO health_profiles ({HEALTH_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
       ON CONFLICT (citizen_id) DO UPDATE SET
         blood_type = excluded.blood_type,
         has_disability = excluded.has_disability,
         disability_detail = excluded.disability_detail,
         has_chronic_disease = excluded.has_chronic_disease,
         chronic_disease_detail = excluded.chronic_disease_detail,
         is_pregnant = excluded.is_pregnant,
         has_hypertension = excluded.has_hypertension,
         has_diabetes = excluded.has_diabetes,
         weight_kg = excluded.weight_kg,
         height_cm = excluded.height_cm,
         notes = excluded.notes,
         updated_at = excluded.updated_at"
    ),
    params![
      encode_uuid(citizen_id),
      data.blood_type.map(|b| b.as_ref().to_owned()),
      data.has_disability,
      data.disability_detail,
      data.has_chronic_disease,
      data.chronic_disease_detail,
      data.is_pregnant,
      data.has_hypertension,
      data.has_diabetes,
      data.weight_kg,
      data.height_cm,
      data.notes,
      encode_dt(now),
    ],
  )?;
  tx.commit()?;

  Ok(HealthProfile { citizen_id, data, updated_at: now })
}

// ─── CitizenStore impl ───────────────────────────────────────────────────────

impl CitizenStore for SqliteStore {
  async fn create_citizen(&self, input: NewCitizen) -> Result<Citizen> {
    self.run(move |conn| create(conn, input, Utc::now())).await
  }

  async fn get_citizen(&self, id: Uuid) -> Result<Option<Citizen>> {
    self.run(move |conn| get(conn, id)).await
  }

  async fn find_citizen(&self, identification_value: &str) -> Result<Option<Citizen>> {
    let value = identification_value.to_owned();
    self.run(move |conn| find(conn, &value)).await
  }

  async fn list_citizens(&self, query: &CitizenQuery) -> Result<Vec<Citizen>> {
    let query = query.clone();
    self.run(move |conn| list(conn, &query)).await
  }

  async fn update_citizen(&self, id: Uuid, input: NewCitizen) -> Result<Citizen> {
    self.run(move |conn| update(conn, id, input, Utc::now())).await
  }

  async fn set_photo(&self, id: Uuid, photo_path: String) -> Result<Citizen> {
    self.run(move |conn| set_photo(conn, id, photo_path, Utc::now())).await
  }

  async fn upsert_health_profile(&self, citizen_id: Uuid, data: HealthData) -> Result<HealthProfile> {
    self.run(move |conn| upsert_health(conn, citizen_id, data, Utc::now())).await
  }

  async fn get_health_profile(&self, citizen_id: Uuid) -> Result<Option<HealthProfile>> {
    self.run(move |conn| get_health(conn, citizen_id)).await
  }
}
