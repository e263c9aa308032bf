//! Configuration lookup tables: departments, contract types, tags and the
//! clause playbook.
//!
//! # Invariants
//! - Names are unique per table (enforced by SQLite) and non-blank.
//! - Tag colors are `#RRGGBB` hex strings.

use crate::model::principal::UserId;
use crate::model::review::ClauseRiskLevel;
use crate::model::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DepartmentId = i64;
pub type ContractTypeId = i64;
pub type TagId = i64;
pub type PlaybookEntryId = i64;

pub const DEPARTMENT_NAME_MAX: usize = 255;
pub const CONTRACT_TYPE_NAME_MAX: usize = 255;
pub const TAG_NAME_MAX: usize = 100;
pub const PLAYBOOK_LABEL_MAX: usize = 255;
pub const DEFAULT_TAG_COLOR: &str = "#6c757d";

static TAG_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid tag color regex"));

/// Department / business unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Contract classification maintained by legal admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractType {
    pub id: ContractTypeId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Free-form label attached to contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub description: String,
    pub color: String,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Pre-approved clause template that can be inserted into contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClausePlaybookEntry {
    pub id: PlaybookEntryId,
    pub label: String,
    pub category: String,
    pub recommended_text: String,
    pub risk_level: ClauseRiskLevel,
    pub guidance_notes: String,
    pub active: bool,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for a new contract type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContractType {
    pub name: String,
    pub description: String,
    pub active: bool,
}

/// Input for a new tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub description: String,
    pub color: Option<String>,
    pub active: bool,
}

/// Input for a new playbook entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaybookEntry {
    pub label: String,
    pub category: String,
    pub recommended_text: String,
    pub risk_level: ClauseRiskLevel,
    pub guidance_notes: String,
    pub active: bool,
}

/// Validation failures for lookup records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupValidationError {
    BlankField(&'static str),
    TooLong { field: &'static str, max: usize },
    InvalidColor(String),
}

impl Display for LookupValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::TooLong { field, max } => {
                write!(f, "{field} must be at most {max} characters")
            }
            Self::InvalidColor(value) => {
                write!(f, "color `{value}` is not a #RRGGBB hex value")
            }
        }
    }
}

impl Error for LookupValidationError {}

/// Trims a required name and enforces its length limit.
pub fn normalize_name(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<String, LookupValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LookupValidationError::BlankField(field));
    }
    if trimmed.chars().count() > max {
        return Err(LookupValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Returns the normalized tag color, falling back to the default gray.
pub fn normalize_tag_color(value: Option<&str>) -> Result<String, LookupValidationError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_TAG_COLOR.to_string()),
        Some(color) if TAG_COLOR_RE.is_match(color) => Ok(color.to_ascii_lowercase()),
        Some(color) => Err(LookupValidationError::InvalidColor(color.to_string())),
    }
}

impl NewTag {
    pub fn validate(&self) -> Result<(String, String), LookupValidationError> {
        let name = normalize_name("tag name", &self.name, TAG_NAME_MAX)?;
        let color = normalize_tag_color(self.color.as_deref())?;
        Ok((name, color))
    }
}

impl NewPlaybookEntry {
    pub fn validate(&self) -> Result<(), LookupValidationError> {
        normalize_name("playbook label", &self.label, PLAYBOOK_LABEL_MAX)?;
        if self.recommended_text.trim().is_empty() {
            return Err(LookupValidationError::BlankField("recommended text"));
        }
        Ok(())
    }
}
