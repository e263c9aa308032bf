//! Additional approval workflow.
//!
//! # Responsibility
//! - List approvals relevant to the actor.
//! - Request, decide and cancel approvals with one audit row each.
//!
//! # Invariants
//! - Only PENDING approvals are decided or cancelled.
//! - A rejection carries a non-blank comment.
//! - Non-admins only see approvals they requested or must decide.

use crate::model::approval::{
    AdditionalApproval, ApprovalDecision, ApprovalId, ApprovalStatus, NewApproval,
};
use crate::model::audit::AuditAction;
use crate::model::contract::{Contract, ContractId};
use crate::policy::{evaluate, Action, PermissionSummary};
use crate::repo::approval_repo::{ApprovalListQuery, ApprovalRepository, SqliteApprovalRepository};
use crate::repo::contract_repo::{ContractRepository, SqliteContractRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::audit_service::record_for;
use crate::service::{RequestContext, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Listing filters on top of the actor's own visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFilters {
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub assigned_to_me: bool,
    #[serde(default)]
    pub requested_by_me: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalDetail {
    pub approval: AdditionalApproval,
    pub contract: Contract,
    pub can_decide: bool,
    pub permissions: PermissionSummary,
}

pub struct ApprovalService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ApprovalService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Newest first. Admins see every approval.
    pub fn list(
        &self,
        ctx: &RequestContext,
        filters: ApprovalFilters,
    ) -> ServiceResult<Vec<AdditionalApproval>> {
        let me = ctx.actor.id;
        let query = ApprovalListQuery {
            participant: (!ctx.role().is_legal_admin()).then_some(me),
            status: filters.status,
            approver_id: filters.assigned_to_me.then_some(me),
            requested_by: filters.requested_by_me.then_some(me),
            ..ApprovalListQuery::default()
        };
        Ok(SqliteApprovalRepository::new(self.conn).list_approvals(&query)?)
    }

    /// Visible to admins, the approver and the requester.
    pub fn detail(&self, ctx: &RequestContext, id: ApprovalId) -> ServiceResult<ApprovalDetail> {
        let approval = self.fetch(id)?;
        let is_participant =
            approval.approver_id == ctx.actor.id || approval.requested_by == ctx.actor.id;
        if !ctx.role().is_legal_admin() && !is_participant {
            return Err(ServiceError::PermissionDenied(Action::ViewContract));
        }

        let contracts = SqliteContractRepository::new(self.conn);
        let contract = contracts
            .get_contract(approval.contract_id)?
            .ok_or_else(|| ServiceError::not_found("contract", approval.contract_id))?;
        let mut facts = contracts.access_facts(&contract, &ctx.actor)?;
        facts.is_designated_approver = approval.approver_id == ctx.actor.id;

        Ok(ApprovalDetail {
            can_decide: approval.is_pending()
                && evaluate(ctx.role(), Action::DecideApproval, &facts),
            permissions: PermissionSummary::build(ctx.role(), Some(&facts)),
            approval,
            contract,
        })
    }

    /// Opens a PENDING approval on `contract_id` assigned to an existing user.
    pub fn request(
        &self,
        ctx: &RequestContext,
        contract_id: ContractId,
        input: NewApproval,
    ) -> ServiceResult<AdditionalApproval> {
        let contracts = SqliteContractRepository::new(self.conn);
        let contract = contracts
            .get_contract(contract_id)?
            .ok_or_else(|| ServiceError::not_found("contract", contract_id))?;
        let facts = contracts.access_facts(&contract, &ctx.actor)?;
        if !evaluate(ctx.role(), Action::ManageApprovals, &facts) {
            return Err(ServiceError::PermissionDenied(Action::ManageApprovals));
        }
        let approver = SqliteUserRepository::new(self.conn)
            .get_user(input.approver_id)?
            .ok_or_else(|| ServiceError::not_found("user", input.approver_id))?;

        let tx = self.conn.unchecked_transaction()?;
        let approval_id = SqliteApprovalRepository::new(&tx).insert_approval(
            contract_id,
            ctx.actor.id,
            &input,
            ctx.now,
        )?;
        record_for(
            &tx,
            ctx,
            Some(contract_id),
            AuditAction::CreateApproval,
            json!({
                "approval_id": approval_id,
                "approver": approver.label(),
                "reason": input.reason.trim(),
            }),
        )?;
        tx.commit()?;

        info!(
            "event=approval_request module=approval_service status=ok approval_id={} contract_id={}",
            approval_id, contract_id
        );
        self.fetch(approval_id)
    }

    /// Records the designated approver's decision.
    pub fn decide(
        &self,
        ctx: &RequestContext,
        id: ApprovalId,
        decision: ApprovalDecision,
        comment: &str,
    ) -> ServiceResult<AdditionalApproval> {
        let approval = self.fetch(id)?;
        let contracts = SqliteContractRepository::new(self.conn);
        let contract = contracts
            .get_contract(approval.contract_id)?
            .ok_or_else(|| ServiceError::not_found("contract", approval.contract_id))?;
        let mut facts = contracts.access_facts(&contract, &ctx.actor)?;
        facts.is_designated_approver = approval.approver_id == ctx.actor.id;
        if !evaluate(ctx.role(), Action::DecideApproval, &facts) {
            return Err(ServiceError::PermissionDenied(Action::DecideApproval));
        }
        if !approval.is_pending() {
            return Err(ServiceError::validation(format!(
                "approval {id} has already been decided ({})",
                approval.status
            )));
        }
        let comment = comment.trim();
        if decision == ApprovalDecision::Rejected && comment.is_empty() {
            return Err(ServiceError::validation("a rejection requires a comment"));
        }

        let action = match decision {
            ApprovalDecision::Approved => AuditAction::Approve,
            ApprovalDecision::Rejected => AuditAction::Reject,
        };
        self.close(
            ctx,
            &approval,
            decision.status(),
            comment,
            action,
        )
    }

    /// Withdraws a PENDING approval. Allowed for the requester and admins.
    pub fn cancel(&self, ctx: &RequestContext, id: ApprovalId) -> ServiceResult<AdditionalApproval> {
        let approval = self.fetch(id)?;
        if !ctx.role().is_legal_admin() && approval.requested_by != ctx.actor.id {
            return Err(ServiceError::PermissionDenied(Action::ManageApprovals));
        }
        if !approval.is_pending() {
            return Err(ServiceError::validation(format!(
                "approval {id} is already {}",
                approval.status
            )));
        }
        self.close(
            ctx,
            &approval,
            ApprovalStatus::Cancelled,
            "",
            AuditAction::CancelApproval,
        )
    }

    fn close(
        &self,
        ctx: &RequestContext,
        approval: &AdditionalApproval,
        status: ApprovalStatus,
        comment: &str,
        action: AuditAction,
    ) -> ServiceResult<AdditionalApproval> {
        let tx = self.conn.unchecked_transaction()?;
        SqliteApprovalRepository::new(&tx).close_approval(approval.id, status, comment, ctx.now)?;
        record_for(
            &tx,
            ctx,
            Some(approval.contract_id),
            action,
            json!({"approval_id": approval.id, "comment": comment}),
        )?;
        tx.commit()?;

        info!(
            "event=approval_close module=approval_service status=ok approval_id={} result={}",
            approval.id, status
        );
        self.fetch(approval.id)
    }

    fn fetch(&self, id: ApprovalId) -> ServiceResult<AdditionalApproval> {
        SqliteApprovalRepository::new(self.conn)
            .get_approval(id)?
            .ok_or_else(|| ServiceError::not_found("approval", id))
    }
}
