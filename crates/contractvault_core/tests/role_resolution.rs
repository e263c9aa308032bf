mod common;

use common::Vault;
use contractvault_core::model::principal::NewUser;
use contractvault_core::policy::{resolve_role, Role};
use contractvault_core::service::user_service::UserService;

#[test]
fn precedence_chain_covers_every_flag_combination() {
    let group_sets: [&[&str]; 5] = [
        &[],
        &["Legal Admin"],
        &["legal_user"],
        &["Finance Viewer"],
        &["finance_viewer", "Legal User"],
    ];

    for is_superuser in [false, true] {
        for is_staff in [false, true] {
            for groups in group_sets {
                let expected = if is_superuser || groups.contains(&"Legal Admin") {
                    Role::LegalAdmin
                } else if groups
                    .iter()
                    .any(|g| *g == "legal_user" || *g == "Legal User") {
                    Role::LegalUser
                } else if groups
                    .iter()
                    .any(|g| *g == "Finance Viewer" || *g == "finance_viewer") {
                    Role::FinanceViewer
                } else if is_staff {
                    Role::LegalUser
                } else {
                    Role::User
                };
                assert_eq!(
                    resolve_role(is_superuser, is_staff, groups),
                    expected,
                    "superuser={is_superuser} staff={is_staff} groups={groups:?}"
                );
            }
        }
    }
}

#[test]
fn stored_users_resolve_through_their_groups() {
    let vault = Vault::new();
    let finance = vault.add_user(NewUser::new("fin").staff().in_group("Finance Viewer"));
    let staff = vault.add_user(NewUser::new("clerk").staff());
    let plain = vault.add_user(NewUser::new("plain"));

    assert_eq!(vault.admin.role(), Role::LegalAdmin);
    assert_eq!(finance.role(), Role::FinanceViewer);
    assert_eq!(staff.role(), Role::LegalUser);
    assert_eq!(plain.role(), Role::User);

    let promoted = UserService::new(&vault.conn)
        .set_groups(&vault.admin_ctx(), plain.id, &["legal_admin".to_string()])
        .unwrap();
    assert_eq!(promoted.role(), Role::LegalAdmin);
}

#[test]
fn only_the_first_user_registers_without_an_actor() {
    let vault = Vault::new();
    let err = UserService::new(&vault.conn)
        .register(None, &NewUser::new("intruder"))
        .unwrap_err();
    assert_eq!(err.code(), "permission_denied");

    let plain = vault.add_user(NewUser::new("plain"));
    let err = UserService::new(&vault.conn)
        .register(Some(&common::ctx(&plain)), &NewUser::new("friend"))
        .unwrap_err();
    assert_eq!(err.code(), "permission_denied");
}

#[test]
fn duplicate_usernames_are_rejected() {
    let vault = Vault::new();
    vault.add_user(NewUser::new("dup"));
    let err = UserService::new(&vault.conn)
        .register(Some(&vault.admin_ctx()), &NewUser::new("dup"))
        .unwrap_err();
    assert_eq!(err.code(), "validation");
}
