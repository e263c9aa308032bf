//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::contract::ContractValidationError;
use crate::model::lookup::LookupValidationError;
use chrono::NaiveDate;
use rusqlite::ErrorCode;
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub mod approval_repo;
pub mod audit_repo;
pub mod contract_repo;
pub mod document_repo;
pub mod lookup_repo;
pub mod review_repo;
pub mod share_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Generic repository error shared by every table.
#[derive(Debug)]
pub enum RepoError {
    /// Record rejected before any SQL ran.
    Validation(String),
    Db(DbError),
    NotFound { entity: &'static str, id: String },
    InvalidData(String),
    /// Unique or check constraint rejected the write.
    Conflict(String),
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(_)
            | Self::NotFound { .. }
            | Self::InvalidData(_)
            | Self::Conflict(_) => None,
        }
    }
}

impl From<ContractValidationError> for RepoError {
    fn from(value: ContractValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<LookupValidationError> for RepoError {
    fn from(value: LookupValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == ErrorCode::ConstraintViolation
                    && matches!(
                        err.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                Self::Conflict(
                    message
                        .clone()
                        .unwrap_or_else(|| "unique constraint failed".to_string()),
                )
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

/// Parses one stored enum name using the type's `parse` function.
pub(crate) fn parse_enum<T>(
    value: &str,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<T> {
    parse(value).ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

pub(crate) fn date_to_db(value: Option<NaiveDate>) -> Option<String> {
    value.map(|date| date.format(DATE_FORMAT).to_string())
}

pub(crate) fn parse_date(value: Option<String>, column: &str) -> RepoResult<Option<NaiveDate>> {
    value
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in {column}")))
        })
        .transpose()
}

pub(crate) fn decimal_to_db(value: Option<Decimal>) -> Option<String> {
    value.map(|amount| amount.round_dp(2).to_string())
}

pub(crate) fn parse_decimal(value: Option<String>, column: &str) -> RepoResult<Option<Decimal>> {
    value
        .map(|text| {
            Decimal::from_str(&text).map_err(|_| {
                RepoError::InvalidData(format!("invalid decimal `{text}` in {column}"))
            })
        })
        .transpose()
}

pub(crate) fn parse_json_object(value: &str, column: &str) -> RepoResult<serde_json::Value> {
    let parsed: serde_json::Value = serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))?;
    if !parsed.is_object() {
        return Err(RepoError::InvalidData(format!(
            "{column} must hold a JSON object"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_and_decimals_use_canonical_text() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 3);
        assert_eq!(date_to_db(date).as_deref(), Some("2026-02-03"));
        assert_eq!(parse_date(Some("2026-02-03".to_string()), "c").unwrap(), date);
        assert!(parse_date(Some("03/02/2026".to_string()), "c").is_err());

        let amount = Decimal::from_str("1250.456").unwrap();
        assert_eq!(decimal_to_db(Some(amount)).as_deref(), Some("1250.46"));
        assert!(parse_decimal(Some("abc".to_string()), "c").is_err());
    }

    #[test]
    fn booleans_reject_out_of_range() {
        assert!(parse_bool(1, "c").unwrap());
        assert!(parse_bool(2, "c").is_err());
    }

    #[test]
    fn json_must_be_object() {
        assert!(parse_json_object("{\"a\":1}", "m").is_ok());
        assert!(parse_json_object("[1]", "m").is_err());
    }
}
