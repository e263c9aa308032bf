//! Audit trail recording and listing.
//!
//! # Responsibility
//! - Append one audit row per auditable operation.
//! - Expose per-contract history and the scoped global feed.
//!
//! # Invariants
//! - `record` runs on the caller's connection or transaction so the row
//!   commits together with the mutation it describes.
//! - Log lines carry the action and ids only, never metadata values.

use crate::model::audit::{AuditAction, AuditLogEntry, AuditLogId, RequestOrigin};
use crate::model::contract::ContractId;
use crate::model::principal::Principal;
use crate::model::Timestamp;
use crate::policy::{evaluate, Action};
use crate::repo::audit_repo::{AuditRepository, NewAuditEntry, SqliteAuditRepository};
use crate::repo::contract_repo::{ContractRepository, ContractScope, SqliteContractRepository};
use crate::service::{RequestContext, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use serde_json::Value;

/// Entries shown on the contract detail page.
pub const DETAIL_HISTORY_LIMIT: u32 = 20;
pub const RECENT_ACTIVITY_LIMIT: u32 = 10;

/// Appends one audit row.
pub fn record(
    conn: &Connection,
    contract_id: Option<ContractId>,
    action: AuditAction,
    actor: Option<&Principal>,
    metadata: Value,
    origin: &RequestOrigin,
    now: Timestamp,
) -> ServiceResult<AuditLogId> {
    let metadata = match metadata {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(Default::default()),
        _ => return Err(ServiceError::validation("audit metadata must be a JSON object")),
    };
    let ip_address = origin.client_ip();
    let entry = NewAuditEntry {
        contract_id,
        action,
        actor_id: actor.map(|principal| principal.id),
        metadata: &metadata,
        ip_address: ip_address.as_deref(),
        user_agent: origin.user_agent.as_str(),
    };
    let id = SqliteAuditRepository::new(conn).append(&entry, now)?;
    info!(
        "event=audit_record module=audit status=ok action={} audit_id={}",
        action, id
    );
    Ok(id)
}

/// Shorthand for `record` with the request's actor, origin and clock.
pub(crate) fn record_for(
    conn: &Connection,
    ctx: &RequestContext,
    contract_id: Option<ContractId>,
    action: AuditAction,
    metadata: Value,
) -> ServiceResult<AuditLogId> {
    record(
        conn,
        contract_id,
        action,
        Some(&ctx.actor),
        metadata,
        &ctx.origin,
        ctx.now,
    )
}

pub struct AuditService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AuditService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// History of one contract, newest first. Requires read access.
    pub fn contract_history(
        &self,
        ctx: &RequestContext,
        contract_id: ContractId,
        limit: u32,
    ) -> ServiceResult<Vec<AuditLogEntry>> {
        let contracts = SqliteContractRepository::new(self.conn);
        let contract = contracts
            .get_contract(contract_id)?
            .ok_or_else(|| ServiceError::not_found("contract", contract_id))?;
        let facts = contracts.access_facts(&contract, &ctx.actor)?;
        if !evaluate(ctx.role(), Action::ViewContract, &facts) {
            return Err(ServiceError::PermissionDenied(Action::ViewContract));
        }
        Ok(SqliteAuditRepository::new(self.conn).list_for_contract(contract_id, limit)?)
    }

    /// Rows on contracts the actor can read, plus the actor's own rows.
    pub fn recent(&self, ctx: &RequestContext, limit: u32) -> ServiceResult<Vec<AuditLogEntry>> {
        let scope = ContractScope::for_principal(&ctx.actor);
        let actor_id = match scope {
            ContractScope::All => None,
            ContractScope::VisibleTo(_) => Some(ctx.actor.id),
        };
        Ok(SqliteAuditRepository::new(self.conn).list_recent(&scope, actor_id, limit)?)
    }
}
