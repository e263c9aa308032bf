//! Additional approval persistence.
//!
//! # Invariants
//! - Status updates are guarded by `status = 'PENDING'`; a closed request
//!   is never reopened or closed twice.

use crate::model::approval::{AdditionalApproval, ApprovalId, ApprovalStatus, NewApproval};
use crate::model::contract::ContractId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use crate::repo::{date_to_db, parse_date, parse_enum, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const APPROVAL_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    requested_by,
    approver_id,
    status,
    reason,
    due_date,
    decided_at,
    decision_comment,
    created_at
FROM additional_approvals";

/// Filters for approval listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalListQuery {
    /// Restrict to rows where this user is approver or requester.
    pub participant: Option<UserId>,
    pub contract_id: Option<ContractId>,
    pub status: Option<ApprovalStatus>,
    pub approver_id: Option<UserId>,
    pub requested_by: Option<UserId>,
    pub limit: Option<u32>,
}

pub trait ApprovalRepository {
    fn insert_approval(
        &self,
        contract_id: ContractId,
        requested_by: UserId,
        input: &NewApproval,
        now: Timestamp,
    ) -> RepoResult<ApprovalId>;
    fn get_approval(&self, id: ApprovalId) -> RepoResult<Option<AdditionalApproval>>;
    /// Newest first.
    fn list_approvals(&self, query: &ApprovalListQuery) -> RepoResult<Vec<AdditionalApproval>>;
    fn count_approvals(&self, query: &ApprovalListQuery) -> RepoResult<u64>;
    /// Moves a PENDING row to `status`; `Conflict` if it already left PENDING.
    fn close_approval(
        &self,
        id: ApprovalId,
        status: ApprovalStatus,
        comment: &str,
        now: Timestamp,
    ) -> RepoResult<()>;
}

pub struct SqliteApprovalRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteApprovalRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ApprovalListQuery {
    fn push_filters(&self, sql: &mut String, binds: &mut Vec<Value>) {
        if let Some(user_id) = self.participant {
            sql.push_str(" AND (approver_id = ? OR requested_by = ?)");
            binds.push(Value::Integer(user_id));
            binds.push(Value::Integer(user_id));
        }
        if let Some(contract_id) = self.contract_id {
            sql.push_str(" AND contract_id = ?");
            binds.push(Value::Text(contract_id.to_string()));
        }
        if let Some(status) = self.status {
            sql.push_str(" AND status = ?");
            binds.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(approver_id) = self.approver_id {
            sql.push_str(" AND approver_id = ?");
            binds.push(Value::Integer(approver_id));
        }
        if let Some(requested_by) = self.requested_by {
            sql.push_str(" AND requested_by = ?");
            binds.push(Value::Integer(requested_by));
        }
    }
}

impl ApprovalRepository for SqliteApprovalRepository<'_> {
    fn insert_approval(
        &self,
        contract_id: ContractId,
        requested_by: UserId,
        input: &NewApproval,
        now: Timestamp,
    ) -> RepoResult<ApprovalId> {
        self.conn.execute(
            "INSERT INTO additional_approvals (
                contract_id,
                requested_by,
                approver_id,
                status,
                reason,
                due_date,
                created_at
            ) VALUES (?1, ?2, ?3, 'PENDING', ?4, ?5, ?6);",
            params![
                contract_id.to_string(),
                requested_by,
                input.approver_id,
                input.reason.trim(),
                date_to_db(input.due_date),
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_approval(&self, id: ApprovalId) -> RepoResult<Option<AdditionalApproval>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{APPROVAL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_approval_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_approvals(&self, query: &ApprovalListQuery) -> RepoResult<Vec<AdditionalApproval>> {
        let mut sql = format!("{APPROVAL_SELECT_SQL} WHERE 1 = 1");
        let mut binds = Vec::new();
        query.push_filters(&mut sql, &mut binds);
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut approvals = Vec::new();
        while let Some(row) = rows.next()? {
            approvals.push(parse_approval_row(row)?);
        }
        Ok(approvals)
    }

    fn count_approvals(&self, query: &ApprovalListQuery) -> RepoResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM additional_approvals WHERE 1 = 1");
        let mut binds = Vec::new();
        query.push_filters(&mut sql, &mut binds);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn close_approval(
        &self,
        id: ApprovalId,
        status: ApprovalStatus,
        comment: &str,
        now: Timestamp,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE additional_approvals
             SET status = ?2, decision_comment = ?3, decided_at = ?4
             WHERE id = ?1 AND status = 'PENDING';",
            params![id, status.as_str(), comment.trim(), now],
        )?;
        if changed == 0 {
            return match self.get_approval(id)? {
                Some(existing) => Err(RepoError::Conflict(format!(
                    "approval {id} is already {}",
                    existing.status
                ))),
                None => Err(RepoError::not_found("approval", id)),
            };
        }
        Ok(())
    }
}

fn parse_approval_row(row: &Row<'_>) -> RepoResult<AdditionalApproval> {
    let contract_text: String = row.get("contract_id")?;
    let status: String = row.get("status")?;
    Ok(AdditionalApproval {
        id: row.get("id")?,
        contract_id: parse_uuid(&contract_text, "additional_approvals.contract_id")?,
        requested_by: row.get("requested_by")?,
        approver_id: row.get("approver_id")?,
        status: parse_enum(&status, "additional_approvals.status", ApprovalStatus::parse)?,
        reason: row.get("reason")?,
        due_date: parse_date(row.get("due_date")?, "additional_approvals.due_date")?,
        decided_at: row.get("decided_at")?,
        decision_comment: row.get("decision_comment")?,
        created_at: row.get("created_at")?,
    })
}
