//! Static permission matrix.
//!
//! # Responsibility
//! - Map every `(Role, Action)` pair onto a [`Grant`].
//! - Evaluate grants against an [`AccessFacts`] snapshot.
//!
//! # Invariants
//! - `LEGAL_ADMIN` is granted every action unconditionally.
//! - Conditional grants never consult storage; missing facts mean "no".

use crate::policy::role::Role;
use serde::Serialize;

db_enum! {
    /// Operations gated by the matrix.
    pub enum Action {
        CreateContract => "CREATE_CONTRACT",
        AdministerConfig => "ADMINISTER_CONFIG",
        ViewContract => "VIEW_CONTRACT",
        EditContract => "EDIT_CONTRACT",
        DeleteContract => "DELETE_CONTRACT",
        ManageApprovals => "MANAGE_APPROVALS",
        DecideApproval => "DECIDE_APPROVAL",
        UploadFile => "UPLOAD_FILE",
        AddVersion => "ADD_VERSION",
        ChangeStatus => "CHANGE_STATUS",
        ManageClauses => "MANAGE_CLAUSES",
        ManageRisks => "MANAGE_RISKS",
        ManageDeviations => "MANAGE_DEVIATIONS",
        ManageSignatures => "MANAGE_SIGNATURES",
        ShareContract => "SHARE_CONTRACT",
    }
}

/// Outcome of a matrix lookup before facts are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Allow,
    Deny,
    /// Owner, or EDIT share directly or through the actor's department.
    OwnerOrEditor,
    /// Designated approver of the approval being decided.
    DesignatedApprover,
    /// Contract visibility chain.
    Reader,
    Owner,
    /// Owner, and the contract is still DRAFT.
    OwnerOfDraft,
}

/// Relationship between the actor and one contract (and optionally one
/// approval on it). Built by the repository layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessFacts {
    pub is_owner: bool,
    pub is_creator: bool,
    pub is_draft: bool,
    pub is_confidential: bool,
    pub has_user_share: bool,
    pub has_user_edit_share: bool,
    pub has_department_share: bool,
    pub has_department_edit_share: bool,
    pub same_department: bool,
    /// Actor is approver or requester on any approval of the contract.
    pub is_approval_participant: bool,
    /// Actor is the approver of the approval under evaluation.
    pub is_designated_approver: bool,
}

impl AccessFacts {
    pub fn can_edit(&self) -> bool {
        self.is_owner || self.has_user_edit_share || self.has_department_edit_share
    }

    pub fn can_read(&self, role: Role) -> bool {
        self.is_owner
            || self.is_creator
            || self.has_user_share
            || self.has_department_share
            || self.same_department
            || (role.is_finance_viewer() && !self.is_confidential)
            || (role.is_legal_user() && self.is_approval_participant)
    }
}

/// Grant for `(role, action)`.
pub fn grant(role: Role, action: Action) -> Grant {
    use Action::*;

    match role {
        Role::LegalAdmin => Grant::Allow,
        Role::LegalUser | Role::User => match action {
            CreateContract if role == Role::LegalUser => Grant::Allow,
            CreateContract | AdministerConfig => Grant::Deny,
            ViewContract => Grant::Reader,
            EditContract | ManageApprovals | UploadFile | AddVersion | ChangeStatus
            | ManageClauses | ManageRisks | ManageDeviations | ManageSignatures => {
                Grant::OwnerOrEditor
            }
            DeleteContract => Grant::OwnerOfDraft,
            DecideApproval => Grant::DesignatedApprover,
            ShareContract => Grant::Owner,
        },
        Role::FinanceViewer => match action {
            ViewContract => Grant::Reader,
            DecideApproval => Grant::DesignatedApprover,
            _ => Grant::Deny,
        },
    }
}

/// Decides `action` for `role` given the loaded facts.
pub fn evaluate(role: Role, action: Action, facts: &AccessFacts) -> bool {
    match grant(role, action) {
        Grant::Allow => true,
        Grant::Deny => false,
        Grant::OwnerOrEditor => facts.can_edit(),
        Grant::DesignatedApprover => facts.is_designated_approver,
        Grant::Reader => facts.can_read(role),
        Grant::Owner => facts.is_owner,
        Grant::OwnerOfDraft => facts.is_owner && facts.is_draft,
    }
}

/// Every permission flag for one principal and an optional contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSummary {
    pub user_role: Option<Role>,
    pub is_legal_admin: bool,
    pub is_legal_user: bool,
    pub is_finance_viewer: bool,
    pub can_admin_contracts: bool,
    pub can_create_contract: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractPermissions>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContractPermissions {
    pub can_view_contract: bool,
    pub can_edit_contract: bool,
    pub can_delete_contract: bool,
    pub can_manage_approvals: bool,
    pub can_upload_files: bool,
    pub can_add_version: bool,
    pub can_change_status: bool,
    pub can_manage_clauses: bool,
    pub can_manage_risks: bool,
    pub can_manage_deviations: bool,
    pub can_manage_signatures: bool,
    pub can_share_contract: bool,
}

impl PermissionSummary {
    pub fn build(role: Role, facts: Option<&AccessFacts>) -> Self {
        let contract = facts.map(|facts| {
            let check = |action| evaluate(role, action, facts);
            ContractPermissions {
                can_view_contract: check(Action::ViewContract),
                can_edit_contract: check(Action::EditContract),
                can_delete_contract: check(Action::DeleteContract),
                can_manage_approvals: check(Action::ManageApprovals),
                can_upload_files: check(Action::UploadFile),
                can_add_version: check(Action::AddVersion),
                can_change_status: check(Action::ChangeStatus),
                can_manage_clauses: check(Action::ManageClauses),
                can_manage_risks: check(Action::ManageRisks),
                can_manage_deviations: check(Action::ManageDeviations),
                can_manage_signatures: check(Action::ManageSignatures),
                can_share_contract: check(Action::ShareContract),
            }
        });
        let no_facts = AccessFacts::default();

        Self {
            user_role: Some(role),
            is_legal_admin: role.is_legal_admin(),
            is_legal_user: role.is_legal_user(),
            is_finance_viewer: role.is_finance_viewer(),
            can_admin_contracts: evaluate(role, Action::AdministerConfig, &no_facts),
            can_create_contract: evaluate(role, Action::CreateContract, &no_facts),
            contract,
        }
    }
}
