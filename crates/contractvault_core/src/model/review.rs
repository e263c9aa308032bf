//! Legal review records attached to a contract: clauses, deviations, risks
//! and signature tracking.
//!
//! # Invariants
//! - Every record belongs to exactly one contract and is removed with it.
//! - Signatory emails are syntactically valid addresses.

use crate::model::contract::ContractId;
use crate::model::lookup::PlaybookEntryId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ClauseId = i64;
pub type DeviationId = i64;
pub type RiskItemId = i64;
pub type SignatureId = i64;

pub const CLAUSE_LABEL_MAX: usize = 255;
pub const SIGNATORY_NAME_MAX: usize = 255;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$")
        .expect("valid email regex")
});

db_enum! {
    /// Risk rating of a clause.
    pub enum ClauseRiskLevel {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
}

db_enum! {
    /// Severity used by deviations and risk items.
    pub enum RiskLevel {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

db_enum! {
    pub enum RiskStatus {
        Open => "OPEN",
        Mitigated => "MITIGATED",
        Accepted => "ACCEPTED",
        Closed => "CLOSED",
    }
}

db_enum! {
    /// Signing party.
    pub enum Party {
        Customer => "CUSTOMER",
        Vendor => "VENDOR",
        Internal => "INTERNAL",
    }
}

db_enum! {
    pub enum SignType {
        Aadhaar => "AADHAAR",
        Wet => "WET",
        Esign => "ESIGN",
        Dsc => "DSC",
    }
}

impl RiskLevel {
    /// HIGH and CRITICAL count towards the dashboard high-risk figure.
    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub id: ClauseId,
    pub contract_id: ContractId,
    pub label: String,
    pub text: String,
    pub risk_level: ClauseRiskLevel,
    pub is_from_playbook: bool,
    pub playbook_entry_id: Option<PlaybookEntryId>,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Clause input. With `playbook_entry_id` set, blank label/text are filled
/// from the playbook entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClause {
    pub label: String,
    pub text: String,
    pub risk_level: ClauseRiskLevel,
    pub playbook_entry_id: Option<PlaybookEntryId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClausePatch {
    pub label: Option<String>,
    pub text: Option<String>,
    pub risk_level: Option<ClauseRiskLevel>,
}

impl ClausePatch {
    pub fn updated_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.label.is_some() {
            fields.push("label");
        }
        if self.text.is_some() {
            fields.push("text");
        }
        if self.risk_level.is_some() {
            fields.push("risk_level");
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    pub id: DeviationId,
    pub contract_id: ContractId,
    pub clause_id: Option<ClauseId>,
    pub description: String,
    pub risk_level: RiskLevel,
    pub justification: String,
    pub approved: bool,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<Timestamp>,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviation {
    pub clause_id: Option<ClauseId>,
    pub description: String,
    pub risk_level: RiskLevel,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskItem {
    pub id: RiskItemId,
    pub contract_id: ContractId,
    pub description: String,
    pub severity: RiskLevel,
    pub mitigation: String,
    pub status: RiskStatus,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRiskItem {
    pub description: String,
    pub severity: RiskLevel,
    pub mitigation: String,
    pub status: RiskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: SignatureId,
    pub contract_id: ContractId,
    pub party: Party,
    pub signatory_name: String,
    pub signatory_email: String,
    pub signatory_phone: String,
    pub signatory_designation: String,
    pub sign_type: SignType,
    pub signed_at: Option<Timestamp>,
    pub signature_reference: String,
    pub created_at: Timestamp,
}

impl SignatureRecord {
    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSignatureRecord {
    pub party: Party,
    pub signatory_name: String,
    pub signatory_email: String,
    pub signatory_phone: String,
    pub signatory_designation: String,
    pub sign_type: SignType,
}

/// Validation failures for review records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewValidationError {
    BlankField(&'static str),
    TooLong { field: &'static str, max: usize },
    InvalidEmail(String),
}

impl Display for ReviewValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::TooLong { field, max } => write!(f, "{field} must be at most {max} characters"),
            Self::InvalidEmail(value) => write!(f, "`{value}` is not a valid email address"),
        }
    }
}

impl Error for ReviewValidationError {}

fn require(field: &'static str, value: &str, max: Option<usize>) -> Result<(), ReviewValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReviewValidationError::BlankField(field));
    }
    if let Some(max) = max {
        if trimmed.chars().count() > max {
            return Err(ReviewValidationError::TooLong { field, max });
        }
    }
    Ok(())
}

impl NewClause {
    pub fn validate(&self) -> Result<(), ReviewValidationError> {
        require("clause label", &self.label, Some(CLAUSE_LABEL_MAX))?;
        require("clause text", &self.text, None)
    }
}

impl ClausePatch {
    pub fn validate(&self) -> Result<(), ReviewValidationError> {
        if let Some(label) = &self.label {
            require("clause label", label, Some(CLAUSE_LABEL_MAX))?;
        }
        if let Some(text) = &self.text {
            require("clause text", text, None)?;
        }
        Ok(())
    }
}

impl NewDeviation {
    pub fn validate(&self) -> Result<(), ReviewValidationError> {
        require("deviation description", &self.description, None)
    }
}

impl NewRiskItem {
    pub fn validate(&self) -> Result<(), ReviewValidationError> {
        require("risk description", &self.description, None)
    }
}

impl NewSignatureRecord {
    pub fn validate(&self) -> Result<(), ReviewValidationError> {
        require("signatory name", &self.signatory_name, Some(SIGNATORY_NAME_MAX))?;
        if !is_valid_email(&self.signatory_email) {
            return Err(ReviewValidationError::InvalidEmail(
                self.signatory_email.clone(),
            ));
        }
        Ok(())
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}
