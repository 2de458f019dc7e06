//! Reference data consumed by case intake: aid categories, supplies,
//! institutions and the medical services they offer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::{Result, ValidationErrors};

// ─── Categories ──────────────────────────────────────────────────────────────

/// A node in the aid taxonomy. Top-level categories have no parent;
/// subcategories point at their parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub category_id:  Uuid,
  pub name:         String,
  pub parent_id:    Option<Uuid>,
  /// Documents or conditions an applicant must provide.
  pub requirements: Vec<String>,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
  pub name:         String,
  #[serde(default)]
  pub parent_id:    Option<Uuid>,
  #[serde(default)]
  pub requirements: Vec<String>,
}

impl NewCategory {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &self.name, "category name is required");
    if self.requirements.iter().any(|r| r.trim().is_empty()) {
      errors.push("requirements", "requirements cannot be blank");
    }
    errors.into_result()
  }
}

/// A category with its children, for tree rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
  #[serde(flatten)]
  pub category: Category,
  pub children: Vec<CategoryNode>,
}

/// Arrange a flat list of categories into a forest ordered by name.
///
/// Categories whose parent is not in `categories` are treated as roots.
pub fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
  let known: std::collections::HashSet<Uuid> =
    categories.iter().map(|c| c.category_id).collect();

  let mut by_parent: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();
  for c in categories {
    let key = c.parent_id.filter(|p| known.contains(p));
    by_parent.entry(key).or_default().push(c);
  }

  fn attach(
    parent: Option<Uuid>,
    by_parent: &mut HashMap<Option<Uuid>, Vec<Category>>,
  ) -> Vec<CategoryNode> {
    let mut level = by_parent.remove(&parent).unwrap_or_default();
    level.sort_by(|a, b| a.name.cmp(&b.name));
    level
      .into_iter()
      .map(|category| {
        let children = attach(Some(category.category_id), by_parent);
        CategoryNode { category, children }
      })
      .collect()
  }

  attach(None, &mut by_parent)
}

// ─── Supplies ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SupplyStatus {
  #[default]
  Active,
  Inactive,
}

/// A stocked catalog item.
///
/// `current_stock` is a cache of the ledger sum and is only ever changed
/// together with a stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
  pub supply_id:     Uuid,
  pub category_id:   Uuid,
  pub name:          String,
  /// Dispensing unit, e.g. `box`, `vial`, `tablet`.
  pub unit:          String,
  pub concentration: Option<String>,
  pub status:        SupplyStatus,
  pub current_stock: i64,
  /// Reorder threshold.
  pub min_stock:     i64,
  pub created_at:    DateTime<Utc>,
}

impl Supply {
  pub fn is_low_stock(&self) -> bool { self.current_stock <= self.min_stock }
}

/// Supply metadata; used for both creation and updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyInput {
  pub category_id:   Uuid,
  pub name:          String,
  pub unit:          String,
  #[serde(default)]
  pub concentration: Option<String>,
  #[serde(default)]
  pub status:        SupplyStatus,
  #[serde(default)]
  pub min_stock:     i64,
}

impl SupplyInput {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &self.name, "supply name is required");
    errors.require("unit", &self.unit, "unit is required");
    if self.min_stock < 0 {
      errors.push("min_stock", "minimum stock cannot be negative");
    }
    errors.into_result()
  }
}

#[derive(Debug, Clone, Default)]
pub struct SupplyQuery {
  pub category_id: Option<Uuid>,
  pub status:      Option<SupplyStatus>,
  pub text:        Option<String>,
}

// ─── Institutions and services ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
  pub institution_id: Uuid,
  pub name:           String,
  pub address:        Option<String>,
  pub phone:          Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInstitution {
  pub name:    String,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub phone:   Option<String>,
}

impl NewInstitution {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &self.name, "institution name is required");
    errors.into_result()
  }
}

/// A service (consultation, exam, surgery…) that can be requested in a case
/// instead of a stocked supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalService {
  pub service_id:     Uuid,
  pub institution_id: Option<Uuid>,
  pub name:           String,
  pub description:    Option<String>,
  pub active:         bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedicalService {
  #[serde(default)]
  pub institution_id: Option<Uuid>,
  pub name:           String,
  #[serde(default)]
  pub description:    Option<String>,
}

impl NewMedicalService {
  pub fn validate(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.require("name", &self.name, "service name is required");
    errors.into_result()
  }
}
