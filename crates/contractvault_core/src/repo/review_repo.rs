//! Clause, deviation, risk and signature persistence.
//!
//! # Invariants
//! - Every lookup is scoped by `contract_id`; a record id from another
//!   contract reads as missing.

use crate::model::contract::ContractId;
use crate::model::lookup::PlaybookEntryId;
use crate::model::principal::UserId;
use crate::model::review::{
    Clause, ClauseId, ClausePatch, ClauseRiskLevel, Deviation, DeviationId, NewDeviation,
    NewRiskItem, NewSignatureRecord, Party, RiskItem, RiskItemId, RiskLevel, RiskStatus,
    SignType, SignatureId, SignatureRecord,
};
use crate::model::Timestamp;
use crate::repo::contract_repo::ContractScope;
use crate::repo::{bool_to_int, parse_bool, parse_enum, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, params_from_iter, Connection, Row};

const CLAUSE_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    label,
    text,
    risk_level,
    is_from_playbook,
    playbook_entry_id,
    created_by,
    created_at,
    updated_at
FROM clauses";

const SIGNATURE_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    party,
    signatory_name,
    signatory_email,
    signatory_phone,
    signatory_designation,
    sign_type,
    signed_at,
    signature_reference,
    created_at
FROM signature_records";

/// Resolved clause content ready for insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseInsert<'a> {
    pub label: &'a str,
    pub text: &'a str,
    pub risk_level: ClauseRiskLevel,
    pub playbook_entry_id: Option<PlaybookEntryId>,
}

pub trait ReviewRepository {
    fn insert_clause(
        &self,
        contract_id: ContractId,
        clause: &ClauseInsert<'_>,
        created_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<ClauseId>;
    fn get_clause(&self, contract_id: ContractId, id: ClauseId) -> RepoResult<Option<Clause>>;
    fn update_clause(
        &self,
        contract_id: ContractId,
        id: ClauseId,
        patch: &ClausePatch,
        now: Timestamp,
    ) -> RepoResult<()>;
    fn list_clauses(&self, contract_id: ContractId) -> RepoResult<Vec<Clause>>;

    fn insert_deviation(
        &self,
        contract_id: ContractId,
        deviation: &NewDeviation,
        created_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<DeviationId>;
    fn list_deviations(&self, contract_id: ContractId) -> RepoResult<Vec<Deviation>>;

    fn insert_risk(
        &self,
        contract_id: ContractId,
        risk: &NewRiskItem,
        created_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<RiskItemId>;
    fn list_risks(&self, contract_id: ContractId) -> RepoResult<Vec<RiskItem>>;
    /// OPEN risks with HIGH or CRITICAL severity on contracts in scope.
    fn count_open_high_risks(&self, scope: &ContractScope) -> RepoResult<u64>;

    fn insert_signature(
        &self,
        contract_id: ContractId,
        signature: &NewSignatureRecord,
        now: Timestamp,
    ) -> RepoResult<SignatureId>;
    fn get_signature(
        &self,
        contract_id: ContractId,
        id: SignatureId,
    ) -> RepoResult<Option<SignatureRecord>>;
    fn list_signatures(&self, contract_id: ContractId) -> RepoResult<Vec<SignatureRecord>>;
    fn mark_signed(
        &self,
        contract_id: ContractId,
        id: SignatureId,
        reference: &str,
        signed_at: Timestamp,
    ) -> RepoResult<()>;
}

pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ReviewRepository for SqliteReviewRepository<'_> {
    fn insert_clause(
        &self,
        contract_id: ContractId,
        clause: &ClauseInsert<'_>,
        created_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<ClauseId> {
        self.conn.execute(
            "INSERT INTO clauses (
                contract_id,
                label,
                text,
                risk_level,
                is_from_playbook,
                playbook_entry_id,
                created_by,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                contract_id.to_string(),
                clause.label.trim(),
                clause.text.trim(),
                clause.risk_level.as_str(),
                bool_to_int(clause.playbook_entry_id.is_some()),
                clause.playbook_entry_id,
                created_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_clause(&self, contract_id: ContractId, id: ClauseId) -> RepoResult<Option<Clause>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLAUSE_SELECT_SQL} WHERE contract_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![contract_id.to_string(), id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_clause_row(row)?)),
            None => Ok(None),
        }
    }

    fn update_clause(
        &self,
        contract_id: ContractId,
        id: ClauseId,
        patch: &ClausePatch,
        now: Timestamp,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE clauses
             SET
                label = COALESCE(?3, label),
                text = COALESCE(?4, text),
                risk_level = COALESCE(?5, risk_level),
                updated_at = ?6
             WHERE contract_id = ?1 AND id = ?2;",
            params![
                contract_id.to_string(),
                id,
                patch.label.as_deref().map(str::trim),
                patch.text.as_deref().map(str::trim),
                patch.risk_level.map(ClauseRiskLevel::as_str),
                now,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("clause", id));
        }
        Ok(())
    }

    fn list_clauses(&self, contract_id: ContractId) -> RepoResult<Vec<Clause>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLAUSE_SELECT_SQL} WHERE contract_id = ?1 ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut clauses = Vec::new();
        while let Some(row) = rows.next()? {
            clauses.push(parse_clause_row(row)?);
        }
        Ok(clauses)
    }

    fn insert_deviation(
        &self,
        contract_id: ContractId,
        deviation: &NewDeviation,
        created_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<DeviationId> {
        if let Some(clause_id) = deviation.clause_id {
            if self.get_clause(contract_id, clause_id)?.is_none() {
                return Err(RepoError::not_found("clause", clause_id));
            }
        }
        self.conn.execute(
            "INSERT INTO deviations (
                contract_id,
                clause_id,
                description,
                risk_level,
                justification,
                created_by,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                contract_id.to_string(),
                deviation.clause_id,
                deviation.description.trim(),
                deviation.risk_level.as_str(),
                deviation.justification.trim(),
                created_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_deviations(&self, contract_id: ContractId) -> RepoResult<Vec<Deviation>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                contract_id,
                clause_id,
                description,
                risk_level,
                justification,
                approved,
                approved_by,
                approved_at,
                created_by,
                created_at
             FROM deviations
             WHERE contract_id = ?1
             ORDER BY created_at DESC, id DESC;",
        )?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut deviations = Vec::new();
        while let Some(row) = rows.next()? {
            let contract_text: String = row.get("contract_id")?;
            let risk: String = row.get("risk_level")?;
            deviations.push(Deviation {
                id: row.get("id")?,
                contract_id: parse_uuid(&contract_text, "deviations.contract_id")?,
                clause_id: row.get("clause_id")?,
                description: row.get("description")?,
                risk_level: parse_enum(&risk, "deviations.risk_level", RiskLevel::parse)?,
                justification: row.get("justification")?,
                approved: parse_bool(row.get("approved")?, "deviations.approved")?,
                approved_by: row.get("approved_by")?,
                approved_at: row.get("approved_at")?,
                created_by: row.get("created_by")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(deviations)
    }

    fn insert_risk(
        &self,
        contract_id: ContractId,
        risk: &NewRiskItem,
        created_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<RiskItemId> {
        self.conn.execute(
            "INSERT INTO risk_items (
                contract_id,
                description,
                severity,
                mitigation,
                status,
                created_by,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
            params![
                contract_id.to_string(),
                risk.description.trim(),
                risk.severity.as_str(),
                risk.mitigation.trim(),
                risk.status.as_str(),
                created_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_risks(&self, contract_id: ContractId) -> RepoResult<Vec<RiskItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                contract_id,
                description,
                severity,
                mitigation,
                status,
                created_by,
                created_at,
                updated_at
             FROM risk_items
             WHERE contract_id = ?1
             ORDER BY created_at DESC, id DESC;",
        )?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut risks = Vec::new();
        while let Some(row) = rows.next()? {
            let contract_text: String = row.get("contract_id")?;
            let severity: String = row.get("severity")?;
            let status: String = row.get("status")?;
            risks.push(RiskItem {
                id: row.get("id")?,
                contract_id: parse_uuid(&contract_text, "risk_items.contract_id")?,
                description: row.get("description")?,
                severity: parse_enum(&severity, "risk_items.severity", RiskLevel::parse)?,
                mitigation: row.get("mitigation")?,
                status: parse_enum(&status, "risk_items.status", RiskStatus::parse)?,
                created_by: row.get("created_by")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            });
        }
        Ok(risks)
    }

    fn count_open_high_risks(&self, scope: &ContractScope) -> RepoResult<u64> {
        let mut sql = String::from(
            "SELECT COUNT(*)
             FROM risk_items r
             INNER JOIN contracts c ON c.id = r.contract_id
             WHERE r.status = 'OPEN' AND r.severity IN ('HIGH', 'CRITICAL')",
        );
        let mut binds = Vec::new();
        scope.push_sql("c", &mut sql, &mut binds);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn insert_signature(
        &self,
        contract_id: ContractId,
        signature: &NewSignatureRecord,
        now: Timestamp,
    ) -> RepoResult<SignatureId> {
        self.conn.execute(
            "INSERT INTO signature_records (
                contract_id,
                party,
                signatory_name,
                signatory_email,
                signatory_phone,
                signatory_designation,
                sign_type,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                contract_id.to_string(),
                signature.party.as_str(),
                signature.signatory_name.trim(),
                signature.signatory_email.trim(),
                signature.signatory_phone.trim(),
                signature.signatory_designation.trim(),
                signature.sign_type.as_str(),
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_signature(
        &self,
        contract_id: ContractId,
        id: SignatureId,
    ) -> RepoResult<Option<SignatureRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SIGNATURE_SELECT_SQL} WHERE contract_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![contract_id.to_string(), id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_signature_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_signatures(&self, contract_id: ContractId) -> RepoResult<Vec<SignatureRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SIGNATURE_SELECT_SQL} WHERE contract_id = ?1 ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut signatures = Vec::new();
        while let Some(row) = rows.next()? {
            signatures.push(parse_signature_row(row)?);
        }
        Ok(signatures)
    }

    fn mark_signed(
        &self,
        contract_id: ContractId,
        id: SignatureId,
        reference: &str,
        signed_at: Timestamp,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE signature_records
             SET signed_at = ?3, signature_reference = ?4
             WHERE contract_id = ?1 AND id = ?2 AND signed_at IS NULL;",
            params![contract_id.to_string(), id, signed_at, reference.trim()],
        )?;
        if changed == 0 {
            return match self.get_signature(contract_id, id)? {
                Some(_) => Err(RepoError::Conflict(format!(
                    "signature record {id} is already signed"
                ))),
                None => Err(RepoError::not_found("signature record", id)),
            };
        }
        Ok(())
    }
}

fn parse_clause_row(row: &Row<'_>) -> RepoResult<Clause> {
    let contract_text: String = row.get("contract_id")?;
    let risk: String = row.get("risk_level")?;
    Ok(Clause {
        id: row.get("id")?,
        contract_id: parse_uuid(&contract_text, "clauses.contract_id")?,
        label: row.get("label")?,
        text: row.get("text")?,
        risk_level: parse_enum(&risk, "clauses.risk_level", ClauseRiskLevel::parse)?,
        is_from_playbook: parse_bool(row.get("is_from_playbook")?, "clauses.is_from_playbook")?,
        playbook_entry_id: row.get("playbook_entry_id")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_signature_row(row: &Row<'_>) -> RepoResult<SignatureRecord> {
    let contract_text: String = row.get("contract_id")?;
    let party: String = row.get("party")?;
    let sign_type: String = row.get("sign_type")?;
    Ok(SignatureRecord {
        id: row.get("id")?,
        contract_id: parse_uuid(&contract_text, "signature_records.contract_id")?,
        party: parse_enum(&party, "signature_records.party", Party::parse)?,
        signatory_name: row.get("signatory_name")?,
        signatory_email: row.get("signatory_email")?,
        signatory_phone: row.get("signatory_phone")?,
        signatory_designation: row.get("signatory_designation")?,
        sign_type: parse_enum(&sign_type, "signature_records.sign_type", SignType::parse)?,
        signed_at: row.get("signed_at")?,
        signature_reference: row.get("signature_reference")?,
        created_at: row.get("created_at")?,
    })
}
