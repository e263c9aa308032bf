//! Contract sharing grants.
//!
//! # Invariants
//! - A share targets exactly one user or exactly one department.

use crate::model::contract::ContractId;
use crate::model::lookup::DepartmentId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use serde::{Deserialize, Serialize};

pub type ShareId = i64;

db_enum! {
    pub enum AccessLevel {
        View => "VIEW",
        Edit => "EDIT",
    }
}

/// Recipient of a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ShareTarget {
    User(UserId),
    Department(DepartmentId),
}

impl ShareTarget {
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Department(_) => None,
        }
    }

    pub fn department_id(self) -> Option<DepartmentId> {
        match self {
            Self::User(_) => None,
            Self::Department(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractShare {
    pub id: ShareId,
    pub contract_id: ContractId,
    pub target: ShareTarget,
    pub access_level: AccessLevel,
    pub shared_by: Option<UserId>,
    pub shared_at: Timestamp,
}
