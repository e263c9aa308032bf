//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Gate every operation through the permission matrix.
//! - Commit each mutation together with its audit row.
//!
//! # Invariants
//! - A missing record is reported as `NotFound` before any permission check
//!   on it; a denied check is `PermissionDenied`.
//! - Services never panic on user input.

use crate::model::audit::RequestOrigin;
use crate::model::contract::{ContractStatus, ContractValidationError};
use crate::model::lookup::LookupValidationError;
use crate::model::principal::Principal;
use crate::model::review::ReviewValidationError;
use crate::model::{date_of, now_millis, Timestamp};
use crate::policy::{Action, Role};
use crate::repo::RepoError;
use crate::storage::StorageError;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod approval_service;
pub mod assistant;
pub mod audit_service;
pub mod config_service;
pub mod contract_service;
pub mod dashboard_service;
pub mod query_service;
pub mod report_service;
pub mod user_service;
pub mod wizard;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error shared by every use-case.
#[derive(Debug)]
pub enum ServiceError {
    /// Input rejected before persistence.
    Validation(String),
    PermissionDenied(Action),
    NotFound { entity: &'static str, id: String },
    InvalidTransition {
        from: ContractStatus,
        to: ContractStatus,
    },
    Repo(RepoError),
    Storage(StorageError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::PermissionDenied(_) => "permission_denied",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Repo(_) => "repository",
            Self::Storage(_) => "storage",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::PermissionDenied(action) => {
                write!(f, "permission denied: {}", action.as_str().to_ascii_lowercase())
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot change status from {from} to {to}")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(message) | RepoError::Conflict(message) => {
                Self::Validation(message)
            }
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(RepoError::from(value))
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Io { .. } | StorageError::OutsideRoot(_) => Self::Storage(value),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<ContractValidationError> for ServiceError {
    fn from(value: ContractValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<ReviewValidationError> for ServiceError {
    fn from(value: ReviewValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<LookupValidationError> for ServiceError {
    fn from(value: LookupValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// One request: the acting user, where the request came from and the
/// instant it is evaluated at.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub actor: Principal,
    pub origin: RequestOrigin,
    pub now: Timestamp,
}

impl RequestContext {
    pub fn new(actor: Principal) -> Self {
        Self {
            actor,
            origin: RequestOrigin::local(),
            now: now_millis(),
        }
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Pins the request clock; used for deterministic date windows.
    pub fn at(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }

    pub fn role(&self) -> Role {
        self.actor.role()
    }

    pub fn today(&self) -> NaiveDate {
        date_of(self.now)
    }
}

/// Rejects the request unless `action` is allowed without contract facts.
pub(crate) fn require_role_action(ctx: &RequestContext, action: Action) -> ServiceResult<()> {
    if crate::policy::evaluate(ctx.role(), action, &Default::default()) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(action))
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::repo::RepoError;
    use crate::storage::StorageError;

    #[test]
    fn conflicts_and_upload_rules_become_validation_errors() {
        let err = ServiceError::from(RepoError::Conflict("name taken".to_string()));
        assert_eq!(err.code(), "validation");

        let err = ServiceError::from(StorageError::DisallowedExtension("exe".to_string()));
        assert_eq!(err.code(), "validation");

        let err = ServiceError::from(RepoError::not_found("contract", "x"));
        assert_eq!(err.to_string(), "contract not found: x");
    }
}
