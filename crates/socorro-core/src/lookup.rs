//! Normalisation of records returned by the external person directory.
//!
//! The directory answers with loosely-typed strings (dates as `dd/mm/yyyy`,
//! gender spelled out, names in separate parts). Everything here is pure; the
//! HTTP client lives in `socorro-api`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::citizen::{Gender, Identification, NewCitizen};

/// A person as the directory returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPerson {
  #[serde(default, alias = "primer_nombre")]
  pub first_name:       Option<String>,
  #[serde(default, alias = "segundo_nombre")]
  pub middle_name:      Option<String>,
  #[serde(default, alias = "primer_apellido")]
  pub last_name:        Option<String>,
  #[serde(default, alias = "segundo_apellido")]
  pub second_last_name: Option<String>,
  #[serde(default, alias = "fecha_nacimiento")]
  pub birth_date:       Option<String>,
  #[serde(default, alias = "sexo")]
  pub gender:           Option<String>,
  #[serde(default, alias = "telefono")]
  pub phone:            Option<String>,
  #[serde(default, alias = "estado_civil")]
  pub marital_status:   Option<String>,
  #[serde(default, alias = "carga_familiar")]
  pub household_size:   Option<u32>,
}

/// A directory record in the registry's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
  pub identification:   Identification,
  pub first_name:       String,
  pub middle_name:      Option<String>,
  pub last_name:        String,
  pub second_last_name: Option<String>,
  pub birth_date:       Option<NaiveDate>,
  pub gender:           Option<Gender>,
  pub phone:            Option<String>,
  pub marital_status:   Option<String>,
  pub household_size:   Option<u32>,
}

impl PersonRecord {
  pub fn into_new_citizen(self) -> NewCitizen {
    NewCitizen {
      identification:    self.identification,
      first_name:        self.first_name,
      middle_name:       self.middle_name,
      last_name:         self.last_name,
      second_last_name:  self.second_last_name,
      birth_date:        self.birth_date,
      gender:            self.gender,
      phone:             self.phone,
      email:             None,
      address:           None,
      representative_id: None,
    }
  }
}

fn clean(s: Option<String>) -> Option<String> {
  s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// `dd/mm/yyyy` (the directory's format) or an ISO date.
pub fn parse_birth_date(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  NaiveDate::parse_from_str(s, "%d/%m/%Y")
    .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
    .ok()
}

/// `M`/`F` from any spelling whose first letter says so.
pub fn parse_gender(s: &str) -> Option<Gender> {
  match s.trim().chars().next()?.to_ascii_uppercase() {
    'M' => Some(Gender::M),
    'F' => Some(Gender::F),
    _ => None,
  }
}

/// Normalise a directory answer. A record without both a first and a last
/// name is treated as not found.
pub fn normalize(identification: Identification, raw: RawPerson) -> Option<PersonRecord> {
  Some(PersonRecord {
    identification,
    first_name: clean(raw.first_name)?,
    middle_name: clean(raw.middle_name),
    last_name: clean(raw.last_name)?,
    second_last_name: clean(raw.second_last_name),
    birth_date: raw.birth_date.as_deref().and_then(parse_birth_date),
    gender: raw.gender.as_deref().and_then(parse_gender),
    phone: clean(raw.phone),
    marital_status: clean(raw.marital_status),
    household_size: raw.household_size,
  })
}
