//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so they sort lexically. Calendar dates are `YYYY-MM-DD`. Enums are stored
//! as their snake_case names; structured fields (addresses, requirement
//! lists) as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use socorro_core::{
  case::{CaseItem, Itemable, SocialCase},
  catalog::{Category, Institution, MedicalService, Supply},
  citizen::{Citizen, HealthData, HealthProfile, Identification},
  stock::{MovementReference, StockMovement},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Parse a stored enum name.
pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::Core(socorro_core::Error::UnknownDiscriminant { kind, value: s.to_owned() })
  })
}

// ─── Citizens ────────────────────────────────────────────────────────────────

pub const CITIZEN_COLUMNS: &str = "citizen_id, nationality, identification_value, first_name, \
   middle_name, last_name, second_last_name, birth_date, gender, phone, email, address, \
   representative_id, photo_path, created_at, updated_at";

/// Raw strings read directly from a `citizens` row.
pub struct RawCitizen {
  pub citizen_id:           String,
  pub nationality:          String,
  pub identification_value: String,
  pub first_name:           String,
  pub middle_name:          Option<String>,
  pub last_name:            String,
  pub second_last_name:     Option<String>,
  pub birth_date:           Option<String>,
  pub gender:               Option<String>,
  pub phone:                Option<String>,
  pub email:                Option<String>,
  pub address:              Option<String>,
  pub representative_id:    Option<String>,
  pub photo_path:           Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawCitizen {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      citizen_id:           row.get(0)?,
      nationality:          row.get(1)?,
      identification_value: row.get(2)?,
      first_name:           row.get(3)?,
      middle_name:          row.get(4)?,
      last_name:            row.get(5)?,
      second_last_name:     row.get(6)?,
      birth_date:           row.get(7)?,
      gender:               row.get(8)?,
      phone:                row.get(9)?,
      email:                row.get(10)?,
      address:              row.get(11)?,
      representative_id:    row.get(12)?,
      photo_path:           row.get(13)?,
      created_at:           row.get(14)?,
      updated_at:           row.get(15)?,
    })
  }

  pub fn into_citizen(self) -> Result<Citizen> {
    Ok(Citizen {
      citizen_id:        decode_uuid(&self.citizen_id)?,
      identification:    Identification::new(
        decode_enum("nationality", &self.nationality)?,
        self.identification_value,
      ),
      first_name:        self.first_name,
      middle_name:       self.middle_name,
      last_name:         self.last_name,
      second_last_name:  self.second_last_name,
      birth_date:        self.birth_date.as_deref().map(decode_date).transpose()?,
      gender:            self.gender.as_deref().map(|g| decode_enum("gender", g)).transpose()?,
      phone:             self.phone,
      email:             self.email,
      address:           self.address.as_deref().map(serde_json::from_str).transpose()?,
      representative_id: decode_opt_uuid(self.representative_id)?,
      photo_path:        self.photo_path,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

pub const HEALTH_COLUMNS: &str = "citizen_id, blood_type, has_disability, disability_detail, \
   has_chronic_disease, chronic_disease_detail, is_pregnant, has_hypertension, has_diabetes, \
   weight_kg, height_cm, notes, updated_at";

pub struct RawHealthProfile {
  pub citizen_id:             String,
  pub blood_type:             Option<String>,
  pub has_disability:         bool,
  pub disability_detail:      Option<String>,
  pub has_chronic_disease:    bool,
  pub chronic_disease_detail: Option<String>,
  pub is_pregnant:            bool,
  pub has_hypertension:       bool,
  pub has_diabetes:           bool,
  pub weight_kg:              Option<f64>,
  pub height_cm:              Option<f64>,
  pub notes:                  Option<String>,
  pub updated_at:             String,
}

impl RawHealthProfile {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      citizen_id:             row.get(0)?,
      blood_type:             row.get(1)?,
      has_disability:         row.get(2)?,
      disability_detail:      row.get(3)?,
      has_chronic_disease:    row.get(4)?,
      chronic_disease_detail: row.get(5)?,
      is_pregnant:            row.get(6)?,
      has_hypertension:       row.get(7)?,
      has_diabetes:           row.get(8)?,
      weight_kg:              row.get(9)?,
      height_cm:              row.get(10)?,
      notes:                  row.get(11)?,
      updated_at:             row.get(12)?,
    })
  }

  pub fn into_profile(self) -> Result<HealthProfile> {
    Ok(HealthProfile {
      citizen_id: decode_uuid(&self.citizen_id)?,
      data:       HealthData {
        blood_type:             self
          .blood_type
          .as_deref()
          .map(|b| decode_enum("blood type", b))
          .transpose()?,
        has_disability:         self.has_disability,
        disability_detail:      self.disability_detail,
        has_chronic_disease:    self.has_chronic_disease,
        chronic_disease_detail: self.chronic_disease_detail,
        is_pregnant:            self.is_pregnant,
        has_hypertension:       self.has_hypertension,
        has_diabetes:           self.has_diabetes,
        weight_kg:              self.weight_kg,
        height_cm:              self.height_cm,
        notes:                  self.notes,
      },
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub const CATEGORY_COLUMNS: &str = "category_id, name, parent_id, requirements, created_at";

pub struct RawCategory {
  pub category_id:  String,
  pub name:         String,
  pub parent_id:    Option<String>,
  pub requirements: String,
  pub created_at:   String,
}

impl RawCategory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      category_id:  row.get(0)?,
      name:         row.get(1)?,
      parent_id:    row.get(2)?,
      requirements: row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_category(self) -> Result<Category> {
    Ok(Category {
      category_id:  decode_uuid(&self.category_id)?,
      name:         self.name,
      parent_id:    decode_opt_uuid(self.parent_id)?,
      requirements: serde_json::from_str(&self.requirements)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const SUPPLY_COLUMNS: &str = "supply_id, category_id, name, unit, concentration, status, \
   current_stock, min_stock, created_at";

pub struct RawSupply {
  pub supply_id:     String,
  pub category_id:   String,
  pub name:          String,
  pub unit:          String,
  pub concentration: Option<String>,
  pub status:        String,
  pub current_stock: i64,
  pub min_stock:     i64,
  pub created_at:    String,
}

impl RawSupply {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      supply_id:     row.get(0)?,
      category_id:   row.get(1)?,
      name:          row.get(2)?,
      unit:          row.get(3)?,
      concentration: row.get(4)?,
      status:        row.get(5)?,
      current_stock: row.get(6)?,
      min_stock:     row.get(7)?,
      created_at:    row.get(8)?,
    })
  }

  pub fn into_supply(self) -> Result<Supply> {
    Ok(Supply {
      supply_id:     decode_uuid(&self.supply_id)?,
      category_id:   decode_uuid(&self.category_id)?,
      name:          self.name,
      unit:          self.unit,
      concentration: self.concentration,
      status:        decode_enum("supply status", &self.status)?,
      current_stock: self.current_stock,
      min_stock:     self.min_stock,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const INSTITUTION_COLUMNS: &str = "institution_id, name, address, phone";

pub struct RawInstitution {
  pub institution_id: String,
  pub name:           String,
  pub address:        Option<String>,
  pub phone:          Option<String>,
}

impl RawInstitution {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      institution_id: row.get(0)?,
      name:           row.get(1)?,
      address:        row.get(2)?,
      phone:          row.get(3)?,
    })
  }

  pub fn into_institution(self) -> Result<Institution> {
    Ok(Institution {
      institution_id: decode_uuid(&self.institution_id)?,
      name:           self.name,
      address:        self.address,
      phone:          self.phone,
    })
  }
}

pub const SERVICE_COLUMNS: &str = "service_id, institution_id, name, description, active";

pub struct RawService {
  pub service_id:     String,
  pub institution_id: Option<String>,
  pub name:           String,
  pub description:    Option<String>,
  pub active:         bool,
}

impl RawService {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      service_id:     row.get(0)?,
      institution_id: row.get(1)?,
      name:           row.get(2)?,
      description:    row.get(3)?,
      active:         row.get(4)?,
    })
  }

  pub fn into_service(self) -> Result<MedicalService> {
    Ok(MedicalService {
      service_id:     decode_uuid(&self.service_id)?,
      institution_id: decode_opt_uuid(self.institution_id)?,
      name:           self.name,
      description:    self.description,
      active:         self.active,
    })
  }
}

// ─── Cases ───────────────────────────────────────────────────────────────────

pub const CASE_COLUMNS: &str = "case_id, case_number, citizen_id, applicant_id, beneficiary_id, \
   created_by, assigned_to, category_id, subcategory_id, channel, description, status, \
   created_at, updated_at, deleted_at";

pub struct RawCase {
  pub case_id:        String,
  pub case_number:    String,
  pub citizen_id:     String,
  pub applicant_id:   String,
  pub beneficiary_id: String,
  pub created_by:     String,
  pub assigned_to:    Option<String>,
  pub category_id:    String,
  pub subcategory_id: Option<String>,
  pub channel:        String,
  pub description:    String,
  pub status:         String,
  pub created_at:     String,
  pub updated_at:     String,
  pub deleted_at:     Option<String>,
}

impl RawCase {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:        row.get(0)?,
      case_number:    row.get(1)?,
      citizen_id:     row.get(2)?,
      applicant_id:   row.get(3)?,
      beneficiary_id: row.get(4)?,
      created_by:     row.get(5)?,
      assigned_to:    row.get(6)?,
      category_id:    row.get(7)?,
      subcategory_id: row.get(8)?,
      channel:        row.get(9)?,
      description:    row.get(10)?,
      status:         row.get(11)?,
      created_at:     row.get(12)?,
      updated_at:     row.get(13)?,
      deleted_at:     row.get(14)?,
    })
  }

  pub fn into_case(self) -> Result<SocialCase> {
    Ok(SocialCase {
      case_id:        decode_uuid(&self.case_id)?,
      case_number:    self.case_number,
      citizen_id:     decode_uuid(&self.citizen_id)?,
      applicant_id:   decode_uuid(&self.applicant_id)?,
      beneficiary_id: decode_uuid(&self.beneficiary_id)?,
      created_by:     decode_uuid(&self.created_by)?,
      assigned_to:    decode_opt_uuid(self.assigned_to)?,
      category_id:    decode_uuid(&self.category_id)?,
      subcategory_id: decode_opt_uuid(self.subcategory_id)?,
      channel:        decode_enum("channel", &self.channel)?,
      description:    self.description,
      status:         decode_enum("case status", &self.status)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
      deleted_at:     decode_opt_dt(self.deleted_at)?,
    })
  }
}

pub const ITEM_COLUMNS: &str = "item_id, case_id, itemable_type, itemable_id, quantity, \
   approved_quantity, status, notes, reviewed_by, reviewed_at, review_note, fulfilled_at, \
   fulfilled_by, created_at";

pub struct RawItem {
  pub item_id:           String,
  pub case_id:           String,
  pub itemable_type:     String,
  pub itemable_id:       String,
  pub quantity:          i64,
  pub approved_quantity: Option<i64>,
  pub status:            String,
  pub notes:             Option<String>,
  pub reviewed_by:       Option<String>,
  pub reviewed_at:       Option<String>,
  pub review_note:       Option<String>,
  pub fulfilled_at:      Option<String>,
  pub fulfilled_by:      Option<String>,
  pub created_at:        String,
}

impl RawItem {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      item_id:           row.get(0)?,
      case_id:           row.get(1)?,
      itemable_type:     row.get(2)?,
      itemable_id:       row.get(3)?,
      quantity:          row.get(4)?,
      approved_quantity: row.get(5)?,
      status:            row.get(6)?,
      notes:             row.get(7)?,
      reviewed_by:       row.get(8)?,
      reviewed_at:       row.get(9)?,
      review_note:       row.get(10)?,
      fulfilled_at:      row.get(11)?,
      fulfilled_by:      row.get(12)?,
      created_at:        row.get(13)?,
    })
  }

  pub fn into_item(self) -> Result<CaseItem> {
    Ok(CaseItem {
      item_id:           decode_uuid(&self.item_id)?,
      case_id:           decode_uuid(&self.case_id)?,
      itemable:          Itemable::from_parts(&self.itemable_type, decode_uuid(&self.itemable_id)?)?,
      quantity:          self.quantity,
      approved_quantity: self.approved_quantity,
      status:            decode_enum("item status", &self.status)?,
      notes:             self.notes,
      reviewed_by:       decode_opt_uuid(self.reviewed_by)?,
      reviewed_at:       decode_opt_dt(self.reviewed_at)?,
      review_note:       self.review_note,
      fulfilled_at:      decode_opt_dt(self.fulfilled_at)?,
      fulfilled_by:      decode_opt_uuid(self.fulfilled_by)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub const MOVEMENT_COLUMNS: &str = "movement_id, supply_id, movement_type, quantity, reason, \
   reference_type, reference_id, actor_id, notes, created_at";

pub struct RawMovement {
  pub movement_id:    String,
  pub supply_id:      String,
  pub movement_type:  String,
  pub quantity:       i64,
  pub reason:         String,
  pub reference_type: Option<String>,
  pub reference_id:   Option<String>,
  pub actor_id:       String,
  pub notes:          Option<String>,
  pub created_at:     String,
}

impl RawMovement {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      movement_id:    row.get(0)?,
      supply_id:      row.get(1)?,
      movement_type:  row.get(2)?,
      quantity:       row.get(3)?,
      reason:         row.get(4)?,
      reference_type: row.get(5)?,
      reference_id:   row.get(6)?,
      actor_id:       row.get(7)?,
      notes:          row.get(8)?,
      created_at:     row.get(9)?,
    })
  }

  pub fn into_movement(self) -> Result<StockMovement> {
    let reference = match (self.reference_type, self.reference_id) {
      (Some(kind), Some(id)) => Some(MovementReference::from_parts(&kind, decode_uuid(&id)?)?),
      _ => None,
    };
    Ok(StockMovement {
      movement_id: decode_uuid(&self.movement_id)?,
      supply_id: decode_uuid(&self.supply_id)?,
      movement_type: decode_enum("movement type", &self.movement_type)?,
      quantity: self.quantity,
      reason: decode_enum("movement reason", &self.reason)?,
      reference,
      actor_id: decode_uuid(&self.actor_id)?,
      notes: self.notes,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = DateTime::parse_from_rfc3339("2026-10-17T09:00:00Z").unwrap().with_timezone(&Utc);
    let b = a + chrono::Duration::microseconds(1500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2026-10-17T09:00:00.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_enum_names_are_reported() {
    let err = decode_enum::<socorro_core::case::ItemStatus>("item status", "lost").unwrap_err();
    assert!(matches!(
      err,
      Error::Core(socorro_core::Error::UnknownDiscriminant { kind: "item status", .. })
    ));
  }
}
