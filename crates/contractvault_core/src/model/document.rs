//! Contract attachments and version history.
//!
//! # Invariants
//! - At most one file per contract has `is_primary = true`.
//! - `version_number` starts at 1 and grows by one per contract.

use crate::model::contract::ContractId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use serde::{Deserialize, Serialize};

pub type FileId = i64;
pub type VersionId = i64;

pub const INITIAL_VERSION_LABEL: &str = "Initial Version";

/// Stored attachment metadata. `stored_path` is relative to the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFile {
    pub id: FileId,
    pub contract_id: ContractId,
    pub stored_path: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub is_primary: bool,
    pub description: String,
    pub uploaded_by: Option<UserId>,
    pub uploaded_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContractFile {
    pub contract_id: ContractId,
    pub stored_path: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub is_primary: bool,
    pub description: String,
    pub uploaded_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersion {
    pub id: VersionId,
    pub contract_id: ContractId,
    pub version_number: u32,
    pub label: String,
    pub stored_path: Option<String>,
    pub notes: String,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContractVersion {
    pub contract_id: ContractId,
    pub label: String,
    pub stored_path: Option<String>,
    pub notes: String,
    pub created_by: Option<UserId>,
}

impl ContractVersion {
    /// `"v<number> - <label>"`.
    pub fn display_name(&self) -> String {
        format!("v{} - {}", self.version_number, self.label)
    }
}
