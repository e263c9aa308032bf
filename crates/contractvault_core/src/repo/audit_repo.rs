//! Append-only audit trail persistence.
//!
//! # Invariants
//! - This module exposes no update or delete path; the schema triggers
//!   reject them as well.
//! - Listings are newest first with `id DESC` as tie-breaker.

use crate::model::audit::{AuditAction, AuditLogEntry, AuditLogId};
use crate::model::contract::ContractId;
use crate::model::principal::UserId;
use crate::model::Timestamp;
use crate::repo::contract_repo::ContractScope;
use crate::repo::{parse_enum, parse_json_object, parse_uuid, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const AUDIT_SELECT_SQL: &str = "SELECT
    l.id,
    l.contract_id,
    l.action,
    l.actor_id,
    l.metadata,
    l.ip_address,
    l.user_agent,
    l.created_at
FROM audit_log l";

/// One row to append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry<'a> {
    pub contract_id: Option<ContractId>,
    pub action: AuditAction,
    pub actor_id: Option<UserId>,
    pub metadata: &'a serde_json::Value,
    pub ip_address: Option<&'a str>,
    pub user_agent: &'a str,
}

pub trait AuditRepository {
    fn append(&self, entry: &NewAuditEntry<'_>, now: Timestamp) -> RepoResult<AuditLogId>;
    fn list_for_contract(
        &self,
        contract_id: ContractId,
        limit: u32,
    ) -> RepoResult<Vec<AuditLogEntry>>;
    /// Rows on contracts in `scope`, plus rows acted by `actor_id` when set.
    fn list_recent(
        &self,
        scope: &ContractScope,
        actor_id: Option<UserId>,
        limit: u32,
    ) -> RepoResult<Vec<AuditLogEntry>>;
    fn count_for_contract(&self, contract_id: ContractId, action: AuditAction) -> RepoResult<u64>;
}

pub struct SqliteAuditRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_entries(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }
}

impl AuditRepository for SqliteAuditRepository<'_> {
    fn append(&self, entry: &NewAuditEntry<'_>, now: Timestamp) -> RepoResult<AuditLogId> {
        self.conn.execute(
            "INSERT INTO audit_log (
                contract_id,
                action,
                actor_id,
                metadata,
                ip_address,
                user_agent,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                entry.contract_id.map(|id| id.to_string()),
                entry.action.as_str(),
                entry.actor_id,
                entry.metadata.to_string(),
                entry.ip_address,
                entry.user_agent,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_for_contract(
        &self,
        contract_id: ContractId,
        limit: u32,
    ) -> RepoResult<Vec<AuditLogEntry>> {
        self.query_entries(
            &format!(
                "{AUDIT_SELECT_SQL}
                 WHERE l.contract_id = ?
                 ORDER BY l.created_at DESC, l.id DESC
                 LIMIT ?;"
            ),
            vec![
                Value::Text(contract_id.to_string()),
                Value::Integer(i64::from(limit)),
            ],
        )
    }

    fn list_recent(
        &self,
        scope: &ContractScope,
        actor_id: Option<UserId>,
        limit: u32,
    ) -> RepoResult<Vec<AuditLogEntry>> {
        let mut binds = Vec::new();
        let mut sql = String::from(AUDIT_SELECT_SQL);

        if let ContractScope::VisibleTo(_) = scope {
            let mut visible = String::from(
                "EXISTS (SELECT 1 FROM contracts c WHERE c.id = l.contract_id",
            );
            scope.push_sql("c", &mut visible, &mut binds);
            visible.push(')');

            sql.push_str(" WHERE (");
            sql.push_str(&visible);
            if let Some(actor_id) = actor_id {
                sql.push_str(" OR l.actor_id = ?");
                binds.push(Value::Integer(actor_id));
            }
            sql.push(')');
        }

        sql.push_str(" ORDER BY l.created_at DESC, l.id DESC LIMIT ?");
        binds.push(Value::Integer(i64::from(limit)));
        self.query_entries(&sql, binds)
    }

    fn count_for_contract(&self, contract_id: ContractId, action: AuditAction) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE contract_id = ?1 AND action = ?2;",
            params![contract_id.to_string(), action.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditLogEntry> {
    let contract_text: Option<String> = row.get("contract_id")?;
    let action: String = row.get("action")?;
    let metadata: String = row.get("metadata")?;
    Ok(AuditLogEntry {
        id: row.get("id")?,
        contract_id: contract_text
            .map(|text| parse_uuid(&text, "audit_log.contract_id"))
            .transpose()?,
        action: parse_enum(&action, "audit_log.action", AuditAction::parse)?,
        actor_id: row.get("actor_id")?,
        metadata: parse_json_object(&metadata, "audit_log.metadata")?,
        ip_address: row.get("ip_address")?,
        user_agent: row.get("user_agent")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{AuditRepository, NewAuditEntry, SqliteAuditRepository};
    use crate::db::open_db_in_memory;
    use crate::model::audit::AuditAction;
    use crate::repo::contract_repo::ContractScope;
    use serde_json::json;

    #[test]
    fn rows_cannot_be_rewritten_or_deleted() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteAuditRepository::new(&conn);
        let metadata = json!({"note": "x"});
        let id = repo
            .append(
                &NewAuditEntry {
                    contract_id: None,
                    action: AuditAction::View,
                    actor_id: None,
                    metadata: &metadata,
                    ip_address: Some("127.0.0.1"),
                    user_agent: "",
                },
                1,
            )
            .unwrap();

        assert!(conn
            .execute("UPDATE audit_log SET action = 'SIGN' WHERE id = ?1;", [id])
            .is_err());
        assert!(conn
            .execute("DELETE FROM audit_log WHERE id = ?1;", [id])
            .is_err());

        let recent = repo.list_recent(&ContractScope::All, None, 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].ip_address.as_deref(), Some("127.0.0.1"));
    }
}
