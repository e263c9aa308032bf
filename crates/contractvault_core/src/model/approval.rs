//! Additional approval requests.
//!
//! # Invariants
//! - Lifecycle is `PENDING -> {APPROVED, REJECTED, CANCELLED}`; only PENDING
//!   requests can be decided or cancelled.
//! - `decided_at` is set exactly when status leaves PENDING.

use crate::model::contract::ContractId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type ApprovalId = i64;

db_enum! {
    pub enum ApprovalStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Cancelled => "CANCELLED",
    }
}

db_enum! {
    /// Outcome chosen by the designated approver.
    pub enum ApprovalDecision {
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

impl ApprovalDecision {
    pub fn status(self) -> ApprovalStatus {
        match self {
            Self::Approved => ApprovalStatus::Approved,
            Self::Rejected => ApprovalStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalApproval {
    pub id: ApprovalId,
    pub contract_id: ContractId,
    pub requested_by: UserId,
    pub approver_id: UserId,
    pub status: ApprovalStatus,
    pub reason: String,
    pub due_date: Option<NaiveDate>,
    pub decided_at: Option<Timestamp>,
    pub decision_comment: String,
    pub created_at: Timestamp,
}

impl AdditionalApproval {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_pending() && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApproval {
    pub approver_id: UserId,
    pub reason: String,
    pub due_date: Option<NaiveDate>,
}
