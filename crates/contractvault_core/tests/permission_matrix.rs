mod common;

use common::{ctx, Vault};
use contractvault_core::model::contract::{ContractPatch, ContractStatus, NewContract};
use contractvault_core::model::principal::NewUser;
use contractvault_core::model::share::{AccessLevel, ShareTarget};
use contractvault_core::policy::{evaluate, grant, AccessFacts, Action, Grant, Role};
use contractvault_core::repo::lookup_repo::{LookupRepository, SqliteLookupRepository};
use contractvault_core::ServiceError;

fn expected_grant(role: Role, action: Action) -> Grant {
    use Action::*;
    match (role, action) {
        (Role::LegalAdmin, _) => Grant::Allow,
        (Role::LegalUser, CreateContract) => Grant::Allow,
        (Role::LegalUser | Role::User, CreateContract | AdministerConfig) => Grant::Deny,
        (Role::LegalUser | Role::User, ViewContract) => Grant::Reader,
        (Role::LegalUser | Role::User, DeleteContract) => Grant::OwnerOfDraft,
        (Role::LegalUser | Role::User, DecideApproval) => Grant::DesignatedApprover,
        (Role::LegalUser | Role::User, ShareContract) => Grant::Owner,
        (Role::LegalUser | Role::User, _) => Grant::OwnerOrEditor,
        (Role::FinanceViewer, ViewContract) => Grant::Reader,
        (Role::FinanceViewer, DecideApproval) => Grant::DesignatedApprover,
        (Role::FinanceViewer, _) => Grant::Deny,
    }
}

#[test]
fn every_role_action_pair_has_documented_grant() {
    for role in Role::ALL {
        for action in Action::ALL {
            assert_eq!(
                grant(*role, *action),
                expected_grant(*role, *action),
                "{role} / {action}"
            );
        }
    }
}

#[test]
fn refinements_read_the_right_facts() {
    let owner_draft = AccessFacts {
        is_owner: true,
        is_draft: true,
        ..AccessFacts::default()
    };
    let edit_share = AccessFacts {
        has_user_share: true,
        has_user_edit_share: true,
        ..AccessFacts::default()
    };
    let confidential = AccessFacts {
        is_confidential: true,
        ..AccessFacts::default()
    };

    assert!(evaluate(Role::User, Action::DeleteContract, &owner_draft));
    assert!(!evaluate(
        Role::User,
        Action::DeleteContract,
        &AccessFacts {
            is_draft: false,
            ..owner_draft
        }
    ));
    assert!(evaluate(Role::LegalUser, Action::EditContract, &edit_share));
    assert!(!evaluate(Role::LegalUser, Action::ShareContract, &edit_share));
    assert!(evaluate(Role::FinanceViewer, Action::ViewContract, &AccessFacts::default()));
    assert!(!evaluate(Role::FinanceViewer, Action::ViewContract, &confidential));
    assert!(!evaluate(Role::FinanceViewer, Action::EditContract, &owner_draft));
}

#[test]
fn plain_users_cannot_create_contracts() {
    let vault = Vault::new();
    let plain = vault.add_user(NewUser::new("plain"));
    let err = vault
        .contracts()
        .create(&ctx(&plain), NewContract::new("NDA", "Acme"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::PermissionDenied(Action::CreateContract)
    ));
}

#[test]
fn shares_widen_visibility_and_edit_rights() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let other = vault.legal_user("other");
    let contract = vault.contract(&owner, "Supply Agreement", ContractStatus::Draft);

    let err = vault.contracts().view(&ctx(&other), contract.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(Action::ViewContract)));

    let share = vault
        .contracts()
        .share(
            &ctx(&owner),
            contract.id,
            ShareTarget::User(other.id),
            AccessLevel::View,
        )
        .unwrap();
    let detail = vault.contracts().view(&ctx(&other), contract.id).unwrap();
    assert_eq!(detail.permissions.contract.map(|p| p.can_edit_contract), Some(false));

    let rename = ContractPatch {
        title: Some("Renamed".to_string()),
        ..ContractPatch::default()
    };
    let err = vault
        .contracts()
        .update(&ctx(&other), contract.id, rename.clone())
        .unwrap_err();
    assert_eq!(err.code(), "permission_denied");

    vault
        .contracts()
        .unshare(&ctx(&owner), contract.id, share.id)
        .unwrap();
    vault
        .contracts()
        .share(
            &ctx(&owner),
            contract.id,
            ShareTarget::User(other.id),
            AccessLevel::Edit,
        )
        .unwrap();
    let updated = vault
        .contracts()
        .update(&ctx(&other), contract.id, rename)
        .unwrap();
    assert_eq!(updated.title, "Renamed");

    let err = vault
        .contracts()
        .share(
            &ctx(&other),
            contract.id,
            ShareTarget::User(vault.admin.id),
            AccessLevel::View,
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(Action::ShareContract)));
}

#[test]
fn department_members_see_their_team_contracts() {
    let vault = Vault::new();
    let legal = SqliteLookupRepository::new(&vault.conn)
        .create_department("Legal")
        .unwrap();
    let owner = vault.legal_user("owner");
    let colleague = vault.add_user(NewUser::new("colleague").in_department(legal));
    let outsider = vault.add_user(NewUser::new("outsider"));

    let input = NewContract {
        bu_team_id: Some(legal),
        ..NewContract::new("Team MSA", "Acme")
    };
    let contract = vault.contracts().create(&ctx(&owner), input, None).unwrap();

    assert!(vault.contracts().view(&ctx(&colleague), contract.id).is_ok());
    assert!(vault.contracts().view(&ctx(&outsider), contract.id).is_err());
}

#[test]
fn finance_viewers_skip_confidential_contracts() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let finance = vault.add_user(NewUser::new("fin").in_group("Finance Viewer"));

    let open = vault.contract(&owner, "Open Deal", ContractStatus::Draft);
    let secret = vault
        .contracts()
        .create(
            &ctx(&owner),
            NewContract {
                is_confidential: true,
                ..NewContract::new("Secret Deal", "Acme")
            },
            None,
        )
        .unwrap();

    let detail = vault.contracts().view(&ctx(&finance), open.id).unwrap();
    let perms = detail.permissions.contract.unwrap();
    assert!(perms.can_view_contract);
    assert!(!perms.can_edit_contract);
    assert!(!perms.can_upload_files);
    assert!(vault.contracts().view(&ctx(&finance), secret.id).is_err());
}

#[test]
fn owners_delete_only_drafts() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let draft = vault.contract(&owner, "Draft NDA", ContractStatus::Draft);
    let active = vault.contract(&owner, "Live NDA", ContractStatus::Active);

    vault.contracts().delete(&ctx(&owner), draft.id).unwrap();
    let err = vault.contracts().delete(&ctx(&owner), active.id).unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(Action::DeleteContract)));

    vault.contracts().delete(&vault.admin_ctx(), active.id).unwrap();
    let err = vault.contracts().view(&vault.admin_ctx(), active.id).unwrap_err();
    assert_eq!(err.code(), "not_found");
}
