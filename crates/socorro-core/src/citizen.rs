//! Citizens and their health profiles.
//!
//! A citizen is identified by a national identification (`V-12345678`); the
//! numeric value is unique across the whole registry regardless of
//! nationality prefix.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Error, Result, ValidationErrors};

/// Age below which a citizen needs a representative.
pub const ADULT_AGE: u32 = 18;

// ─── Identification ──────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr,
)]
pub enum Nationality {
  /// National.
  V,
  /// Foreign resident.
  E,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identification {
  pub nationality: Nationality,
  /// Digits only; unique across the registry.
  pub value:       String,
}

impl Identification {
  /// Surrounding whitespace is dropped from `value`.
  pub fn new(nationality: Nationality, value: impl Into<String>) -> Self {
    let value = value.into();
    Self { nationality, value: value.trim().to_owned() }
  }

  fn check(&self, errors: &mut ValidationErrors) {
    let v = self.value.trim();
    if v.is_empty() {
      errors.push("identification", "identification number is required");
    } else if !v.chars().all(|c| c.is_ascii_digit()) {
      errors.push("identification", "identification number must contain only digits");
    } else if v.len() > 12 {
      errors.push("identification", "identification number is too long");
    }
  }
}

impl fmt::Display for Identification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.nationality.as_ref(), self.value)
  }
}

impl FromStr for Identification {
  type Err = Error;

  /// Accepts `V-12345678`, `V12345678` or a bare number (taken as `V`).
  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    let (nationality, rest) = match s.chars().next() {
      Some(c) if c.is_ascii_alphabetic() => {
        let nat = Nationality::from_str(&c.to_ascii_uppercase().to_string())
          .map_err(|_| Error::invalid("identification", format!("unknown nationality {c:?}")))?;
        (nat, s[1..].trim_start_matches('-'))
      }
      _ => (Nationality::V, s),
    };
    let id = Identification::new(nationality, rest);
    let mut errors = ValidationErrors::new();
    id.check(&mut errors);
    errors.into_result()?;
    Ok(id)
  }
}

// ─── Demographics ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
pub enum Gender {
  M,
  F,
}

/// Free-text address components; the geographic catalog is external.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
  pub state:        String,
  pub municipality: String,
  pub parish:       Option<String>,
  pub community:    Option<String>,
  pub street:       String,
  /// Landmark or housing description.
  pub reference:    Option<String>,
}

impl Address {
  fn check(&self, errors: &mut ValidationErrors) {
    errors.require("address.state", &self.state, "state is required");
    errors.require("address.municipality", &self.municipality, "municipality is required");
    errors.require("address.street", &self.street, "street is required");
  }
}

// ─── Citizen ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citizen {
  pub citizen_id:        Uuid,
  pub identification:    Identification,
  pub first_name:        String,
  pub middle_name:       Option<String>,
  pub last_name:         String,
  pub second_last_name:  Option<String>,
  pub birth_date:        Option<NaiveDate>,
  pub gender:            Option<Gender>,
  pub phone:             Option<String>,
  pub email:             Option<String>,
  pub address:           Option<Address>,
  /// Legal representative; required for minors.
  pub representative_id: Option<Uuid>,
  /// Reference to an externally stored photo.
  pub photo_path:        Option<String>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl Citizen {
  /// Completed years on `on`, if the birth date is known and not in the
  /// future.
  pub fn age(&self, on: NaiveDate) -> Option<u32> {
    self.birth_date.and_then(|b| on.years_since(b))
  }

  /// `false` when the birth date is unknown.
  pub fn is_minor(&self, on: NaiveDate) -> bool {
    self.age(on).is_some_and(|age| age < ADULT_AGE)
  }

  pub fn full_name(&self) -> String {
    [
      Some(self.first_name.as_str()),
      self.middle_name.as_deref(),
      Some(self.last_name.as_str()),
      self.second_last_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|p| !p.trim().is_empty())
    .collect::<Vec<_>>()
    .join(" ")
  }
}

/// Input for creating or replacing a citizen record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCitizen {
  pub identification:    Identification,
  pub first_name:        String,
  #[serde(default)]
  pub middle_name:       Option<String>,
  pub last_name:         String,
  #[serde(default)]
  pub second_last_name:  Option<String>,
  #[serde(default)]
  pub birth_date:        Option<NaiveDate>,
  #[serde(default)]
  pub gender:            Option<Gender>,
  #[serde(default)]
  pub phone:             Option<String>,
  #[serde(default)]
  pub email:             Option<String>,
  #[serde(default)]
  pub address:           Option<Address>,
  #[serde(default)]
  pub representative_id: Option<Uuid>,
}

impl NewCitizen {
  /// Trim the identification and name fields to the form they are stored in.
  pub fn normalized(self) -> Self {
    Self {
      identification: Identification::new(self.identification.nationality, self.identification.value),
      first_name: self.first_name.trim().to_owned(),
      last_name: self.last_name.trim().to_owned(),
      ..self
    }
  }

  /// Field-level checks that need no storage access. Uniqueness and
  /// representative existence are checked by the store.
  pub fn validate(&self, today: NaiveDate) -> Result<()> {
    let mut errors = ValidationErrors::new();
    self.identification.check(&mut errors);
    errors.require("first_name", &self.first_name, "first name is required");
    errors.require("last_name", &self.last_name, "last name is required");
    if let Some(b) = self.birth_date
      && b > today
    {
      errors.push("birth_date", "birth date cannot be in the future");
    }
    if let Some(email) = &self.email
      && !email.trim().is_empty()
      && !email.contains('@')
    {
      errors.push("email", "email address is malformed");
    }
    if let Some(address) = &self.address {
      address.check(&mut errors);
    }
    errors.into_result()
  }
}

/// Parameters for listing citizens.
#[derive(Debug, Clone, Default)]
pub struct CitizenQuery {
  /// Matches names or the identification number.
  pub text:   Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Health profile ──────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
pub enum BloodType {
  #[serde(rename = "A+")]
  #[strum(serialize = "A+")]
  APos,
  #[serde(rename = "A-")]
  #[strum(serialize = "A-")]
  ANeg,
  #[serde(rename = "B+")]
  #[strum(serialize = "B+")]
  BPos,
  #[serde(rename = "B-")]
  #[strum(serialize = "B-")]
  BNeg,
  #[serde(rename = "AB+")]
  #[strum(serialize = "AB+")]
  AbPos,
  #[serde(rename = "AB-")]
  #[strum(serialize = "AB-")]
  AbNeg,
  #[serde(rename = "O+")]
  #[strum(serialize = "O+")]
  OPos,
  #[serde(rename = "O-")]
  #[strum(serialize = "O-")]
  ONeg,
}

/// Health data owned one-to-one by a citizen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthData {
  #[serde(default)]
  pub blood_type:             Option<BloodType>,
  #[serde(default)]
  pub has_disability:         bool,
  #[serde(default)]
  pub disability_detail:      Option<String>,
  #[serde(default)]
  pub has_chronic_disease:    bool,
  #[serde(default)]
  pub chronic_disease_detail: Option<String>,
  #[serde(default)]
  pub is_pregnant:            bool,
  #[serde(default)]
  pub has_hypertension:       bool,
  #[serde(default)]
  pub has_diabetes:           bool,
  #[serde(default)]
  pub weight_kg:              Option<f64>,
  #[serde(default)]
  pub height_cm:              Option<f64>,
  #[serde(default)]
  pub notes:                  Option<String>,
}

impl HealthData {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    if self.weight_kg.is_some_and(|w| !(w > 0.0 && w < 500.0)) {
      errors.push("weight_kg", "weight must be between 0 and 500 kg");
    }
    if self.height_cm.is_some_and(|h| !(h > 0.0 && h < 300.0)) {
      errors.push("height_cm", "height must be between 0 and 300 cm");
    }
    if self.has_disability
      && self.disability_detail.as_deref().is_none_or(|d| d.trim().is_empty())
    {
      errors.push("disability_detail", "describe the disability");
    }
    errors.into_result()
  }

  /// Body-mass index when both weight and height are known.
  pub fn bmi(&self) -> Option<f64> {
    let (w, h) = (self.weight_kg?, self.height_cm?);
    let m = h / 100.0;
    Some(w / (m * m))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProfile {
  pub citizen_id: Uuid,
  #[serde(flatten)]
  pub data:       HealthData,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn citizen(birth: Option<NaiveDate>) -> Citizen {
    Citizen {
      citizen_id:        Uuid::new_v4(),
      identification:    Identification::new(Nationality::V, "12345678"),
      first_name:        "Ana".into(),
      middle_name:       None,
      last_name:         "Rojas".into(),
      second_last_name:  Some("Díaz".into()),
      birth_date:        birth,
      gender:            Some(Gender::F),
      phone:             None,
      email:             None,
      address:           None,
      representative_id: None,
      photo_path:        None,
      created_at:        Utc::now(),
      updated_at:        Utc::now(),
    }
  }

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn parses_prefixed_identification() {
    let id: Identification = "V-12345678".parse().unwrap();
    assert_eq!(id.nationality, Nationality::V);
    assert_eq!(id.value, "12345678");
    assert_eq!(id.to_string(), "V-12345678");

    let id: Identification = "e9876543".parse().unwrap();
    assert_eq!(id.nationality, Nationality::E);
    assert_eq!(id.value, "9876543");
  }

  #[test]
  fn bare_number_defaults_to_national() {
    let id: Identification = "20111222".parse().unwrap();
    assert_eq!(id.nationality, Nationality::V);
  }

  #[test]
  fn rejects_unknown_prefix_and_letters() {
    assert!(matches!("X-123".parse::<Identification>(), Err(Error::Validation(_))));
    assert!(matches!("V-12AB".parse::<Identification>(), Err(Error::Validation(_))));
  }

  #[test]
  fn minor_flag_follows_birthday() {
    let c = citizen(Some(date(2010, 6, 15)));
    assert!(c.is_minor(date(2028, 6, 14)));
    assert!(!c.is_minor(date(2028, 6, 15)));
    assert_eq!(c.age(date(2028, 6, 15)), Some(18));
  }

  #[test]
  fn unknown_birth_date_is_not_minor() {
    assert!(!citizen(None).is_minor(date(2026, 1, 1)));
  }

  #[test]
  fn full_name_skips_missing_parts() {
    assert_eq!(citizen(None).full_name(), "Ana Rojas Díaz");
  }

  #[test]
  fn new_citizen_collects_every_problem() {
    let input = NewCitizen {
      identification:    Identification::new(Nationality::V, ""),
      first_name:        " ".into(),
      middle_name:       None,
      last_name:         "".into(),
      second_last_name:  None,
      birth_date:        Some(date(2099, 1, 1)),
      gender:            None,
      phone:             None,
      email:             Some("nope".into()),
      address:           None,
      representative_id: None,
    };
    match input.validate(date(2026, 1, 1)) {
      Err(Error::Validation(errors)) => assert_eq!(errors.fields().len(), 5),
      other => panic!("expected validation error, got {other:?}"),
    }
  }

  #[test]
  fn blood_type_uses_clinical_notation() {
    assert_eq!(BloodType::AbNeg.as_ref(), "AB-");
    assert_eq!("O+".parse::<BloodType>().unwrap(), BloodType::OPos);
    assert_eq!(serde_json::to_string(&BloodType::APos).unwrap(), "\"A+\"");
  }

  #[test]
  fn bmi_needs_both_measures() {
    let mut h = HealthData { weight_kg: Some(72.0), ..Default::default() };
    assert!(h.bmi().is_none());
    h.height_cm = Some(180.0);
    let bmi = h.bmi().unwrap();
    assert!((bmi - 22.22).abs() < 0.01);
  }

  #[test]
  fn disability_requires_detail() {
    let h = HealthData { has_disability: true, ..Default::default() };
    assert!(h.validate().is_err());
  }
}
