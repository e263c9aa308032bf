//! Audit trail records.
//!
//! # Invariants
//! - Audit rows are append-only; the schema rejects UPDATE/DELETE of their
//!   content.
//! - `metadata` is always a JSON object.

use crate::model::contract::ContractId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub type AuditLogId = i64;

db_enum! {
    pub enum AuditAction {
        CreateContract => "CREATE_CONTRACT",
        UpdateContract => "UPDATE_CONTRACT",
        DeleteContract => "DELETE_CONTRACT",
        ChangeStatus => "CHANGE_STATUS",
        AddFile => "ADD_FILE",
        RemoveFile => "REMOVE_FILE",
        AddVersion => "ADD_VERSION",
        CreateApproval => "CREATE_APPROVAL",
        Approve => "APPROVE",
        Reject => "REJECT",
        CancelApproval => "CANCEL_APPROVAL",
        Share => "SHARE",
        Unshare => "UNSHARE",
        AddClause => "ADD_CLAUSE",
        UpdateClause => "UPDATE_CLAUSE",
        AddDeviation => "ADD_DEVIATION",
        AddRisk => "ADD_RISK",
        AddSignature => "ADD_SIGNATURE",
        Sign => "SIGN",
        View => "VIEW",
        Download => "DOWNLOAD",
    }
}

impl AuditAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::CreateContract => "Contract Created",
            Self::UpdateContract => "Contract Updated",
            Self::DeleteContract => "Contract Deleted",
            Self::ChangeStatus => "Status Changed",
            Self::AddFile => "File Added",
            Self::RemoveFile => "File Removed",
            Self::AddVersion => "Version Added",
            Self::CreateApproval => "Approval Requested",
            Self::Approve => "Approved",
            Self::Reject => "Rejected",
            Self::CancelApproval => "Approval Cancelled",
            Self::Share => "Contract Shared",
            Self::Unshare => "Share Removed",
            Self::AddClause => "Clause Added",
            Self::UpdateClause => "Clause Updated",
            Self::AddDeviation => "Deviation Added",
            Self::AddRisk => "Risk Added",
            Self::AddSignature => "Signature Added",
            Self::Sign => "Document Signed",
            Self::View => "Contract Viewed",
            Self::Download => "File Downloaded",
        }
    }

    /// Read-only actions that do not change contract state.
    pub fn is_read(self) -> bool {
        matches!(self, Self::View | Self::Download)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub contract_id: Option<ContractId>,
    pub action: AuditAction,
    pub actor_id: Option<UserId>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: Timestamp,
}

/// Where a request came from. Empty for local CLI invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub forwarded_for: Option<String>,
    pub remote_addr: Option<String>,
    pub user_agent: String,
}

impl RequestOrigin {
    pub fn local() -> Self {
        Self::default()
    }

    /// First `X-Forwarded-For` hop when present, else the remote address.
    /// Values that do not parse as an IP address are dropped.
    pub fn client_ip(&self) -> Option<String> {
        let candidate = match self.forwarded_for.as_deref() {
            Some(header) if !header.trim().is_empty() => header.split(',').next(),
            _ => self.remote_addr.as_deref(),
        }?;
        candidate
            .trim()
            .parse::<IpAddr>()
            .ok()
            .map(|ip| ip.to_string())
    }
}
