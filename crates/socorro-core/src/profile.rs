//! Profile completeness: whether a citizen's record is ready for case intake.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::citizen::{Citizen, HealthProfile};

/// The sections of a citizen record, as grouped for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSection {
  PersonalData,
  Address,
  HealthProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileReport {
  pub errors:           Vec<String>,
  /// Sections with at least one error, in display order, without repeats.
  pub missing_sections: Vec<ProfileSection>,
}

impl ProfileReport {
  pub fn is_complete(&self) -> bool { self.errors.is_empty() }

  fn flag(&mut self, section: ProfileSection, message: &str) {
    self.errors.push(message.to_owned());
    if !self.missing_sections.contains(&section) {
      self.missing_sections.push(section);
    }
  }
}

fn blank(v: Option<&str>) -> bool { v.is_none_or(|s| s.trim().is_empty()) }

/// Check `citizen` (and its health profile, if any) as of `today`.
pub fn check(
  citizen: &Citizen,
  health: Option<&HealthProfile>,
  today: NaiveDate,
) -> ProfileReport {
  let mut report = ProfileReport::default();

  if blank(Some(&citizen.first_name)) {
    report.flag(ProfileSection::PersonalData, "First name is required.");
  }
  if blank(Some(&citizen.last_name)) {
    report.flag(ProfileSection::PersonalData, "Last name is required.");
  }
  if blank(Some(&citizen.identification.value)) {
    report.flag(ProfileSection::PersonalData, "Identification number is required.");
  }
  if citizen.birth_date.is_none() {
    report.flag(ProfileSection::PersonalData, "Birth date is required.");
  }
  if blank(citizen.phone.as_deref()) {
    report.flag(ProfileSection::PersonalData, "A contact phone is required.");
  }
  if citizen.is_minor(today) && citizen.representative_id.is_none() {
    report.flag(ProfileSection::PersonalData, "Minors must have a legal representative.");
  }

  if citizen.address.is_none() {
    report.flag(ProfileSection::Address, "An address is required.");
  }

  match health {
    None => report.flag(ProfileSection::HealthProfile, "The health profile has not been filled in."),
    Some(h) if blank(h.data.notes.as_deref()) => {
      report.flag(ProfileSection::HealthProfile, "The health profile notes are empty.")
    }
    Some(_) => {}
  }

  report
}
