mod common;

use common::{ctx, date, Vault};
use contractvault_core::model::approval::{ApprovalDecision, ApprovalStatus, NewApproval};
use contractvault_core::model::audit::AuditAction;
use contractvault_core::model::contract::ContractStatus;
use contractvault_core::model::principal::NewUser;
use contractvault_core::policy::Action;
use contractvault_core::repo::audit_repo::{AuditRepository, SqliteAuditRepository};
use contractvault_core::service::approval_service::{ApprovalFilters, ApprovalService};
use contractvault_core::ServiceError;

fn request(reason: &str, approver_id: i64) -> NewApproval {
    NewApproval {
        approver_id,
        reason: reason.to_string(),
        due_date: Some(date(2025, 6, 30)),
    }
}

#[test]
fn designated_approver_decides_once() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let approver = vault.add_user(NewUser::new("cfo").in_group("Finance Viewer"));
    let contract = vault.contract(&owner, "Reseller Agreement", ContractStatus::Pending);
    let approvals = ApprovalService::new(&vault.conn);

    let approval = approvals
        .request(&ctx(&owner), contract.id, request("Discount above 20%", approver.id))
        .unwrap();
    assert_eq!(approval.status, ApprovalStatus::Pending);
    assert_eq!(approval.requested_by, owner.id);

    let err = approvals
        .decide(&ctx(&owner), approval.id, ApprovalDecision::Approved, "")
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(Action::DecideApproval)));

    let detail = approvals.detail(&ctx(&approver), approval.id).unwrap();
    assert!(detail.can_decide);

    let decided = approvals
        .decide(&ctx(&approver), approval.id, ApprovalDecision::Approved, " ok ")
        .unwrap();
    assert_eq!(decided.status, ApprovalStatus::Approved);
    assert_eq!(decided.decision_comment, "ok");
    assert!(decided.decided_at.is_some());

    let err = approvals
        .decide(&ctx(&approver), approval.id, ApprovalDecision::Rejected, "late")
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let audit = SqliteAuditRepository::new(&vault.conn);
    assert_eq!(
        audit
            .count_for_contract(contract.id, AuditAction::CreateApproval)
            .unwrap(),
        1
    );
    assert_eq!(
        audit.count_for_contract(contract.id, AuditAction::Approve).unwrap(),
        1
    );
}

#[test]
fn rejection_requires_a_comment() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let approver = vault.legal_user("approver");
    let contract = vault.contract(&owner, "Licence", ContractStatus::Pending);
    let approvals = ApprovalService::new(&vault.conn);
    let approval = approvals
        .request(&ctx(&owner), contract.id, request("Non-standard IP terms", approver.id))
        .unwrap();

    let err = approvals
        .decide(&ctx(&approver), approval.id, ApprovalDecision::Rejected, "   ")
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let rejected = approvals
        .decide(
            &ctx(&approver),
            approval.id,
            ApprovalDecision::Rejected,
            "IP assignment too broad",
        )
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
}

#[test]
fn only_requester_or_admin_cancels_pending_requests() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let approver = vault.legal_user("approver");
    let contract = vault.contract(&owner, "Lease", ContractStatus::Pending);
    let approvals = ApprovalService::new(&vault.conn);
    let approval = approvals
        .request(&ctx(&owner), contract.id, request("Term beyond 5 years", approver.id))
        .unwrap();

    let err = approvals.cancel(&ctx(&approver), approval.id).unwrap_err();
    assert_eq!(err.code(), "permission_denied");

    let cancelled = approvals.cancel(&ctx(&owner), approval.id).unwrap();
    assert_eq!(cancelled.status, ApprovalStatus::Cancelled);

    let err = approvals.cancel(&vault.admin_ctx(), approval.id).unwrap_err();
    assert_eq!(err.code(), "validation");
}

#[test]
fn requests_need_edit_rights_and_a_real_approver() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let stranger = vault.legal_user("stranger");
    let contract = vault.contract(&owner, "Consulting", ContractStatus::Draft);
    let approvals = ApprovalService::new(&vault.conn);

    let err = approvals
        .request(&ctx(&stranger), contract.id, request("please", owner.id))
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(Action::ManageApprovals)));

    let err = approvals
        .request(&ctx(&owner), contract.id, request("please", 9_999))
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn listing_is_limited_to_participants_for_non_admins() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let approver = vault.legal_user("approver");
    let bystander = vault.legal_user("bystander");
    let contract = vault.contract(&owner, "Distribution", ContractStatus::Pending);
    let approvals = ApprovalService::new(&vault.conn);

    let first = approvals
        .request(&ctx(&owner), contract.id, request("pricing", approver.id))
        .unwrap();
    approvals
        .request(&ctx(&owner), contract.id, request("territory", approver.id))
        .unwrap();
    approvals.cancel(&ctx(&owner), first.id).unwrap();

    let mine = ApprovalFilters {
        assigned_to_me: true,
        status: Some(ApprovalStatus::Pending),
        ..ApprovalFilters::default()
    };
    let assigned = approvals.list(&ctx(&approver), mine).unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].reason, "territory");

    assert!(approvals
        .list(&ctx(&bystander), ApprovalFilters::default())
        .unwrap()
        .is_empty());
    assert_eq!(
        approvals
            .list(&vault.admin_ctx(), ApprovalFilters::default())
            .unwrap()
            .len(),
        2
    );

    let err = approvals.detail(&ctx(&bystander), first.id).unwrap_err();
    assert_eq!(err.code(), "permission_denied");

    // Approval participation makes the contract visible to legal users.
    assert!(vault.contracts().view(&ctx(&approver), contract.id).is_ok());
}
