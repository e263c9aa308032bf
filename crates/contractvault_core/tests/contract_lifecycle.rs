mod common;

use common::{ctx, date, Vault};
use contractvault_core::model::audit::{AuditAction, AuditLogEntry};
use contractvault_core::model::contract::{ContractId, ContractPatch, ContractStatus, NewContract};
use contractvault_core::model::review::{
    ClausePatch, ClauseRiskLevel, NewClause, NewDeviation, NewRiskItem, NewSignatureRecord,
    Party, RiskLevel, RiskStatus, SignType,
};
use contractvault_core::service::audit_service::AuditService;
use contractvault_core::service::contract_service::check_transition;
use contractvault_core::ServiceError;
use rust_decimal::Decimal;

fn history(vault: &Vault, id: ContractId) -> Vec<AuditLogEntry> {
    AuditService::new(&vault.conn)
        .contract_history(&vault.admin_ctx(), id, 100)
        .unwrap()
}

fn count(entries: &[AuditLogEntry], action: AuditAction) -> usize {
    entries.iter().filter(|entry| entry.action == action).count()
}

#[test]
fn creation_fills_defaults_and_audits_once() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let input = NewContract {
        value_amount: Some(Decimal::new(1_234_567, 3)),
        currency: "usd".to_string(),
        ..NewContract::new("  Master Services Agreement ", "Acme Corp")
    };
    let contract = vault.contracts().create(&ctx(&owner), input, None).unwrap();

    assert_eq!(contract.title, "Master Services Agreement");
    assert_eq!(contract.status, ContractStatus::Draft);
    assert_eq!(contract.owner_id, Some(owner.id));
    assert_eq!(contract.currency, "USD");
    assert_eq!(contract.value_amount, Some(Decimal::new(123_457, 2)));
    assert!(contract.contract_number.starts_with("CNT-202506-"));
    assert_eq!(contract.contract_number.len(), "CNT-202506-".len() + 8);

    let entries = history(&vault, contract.id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::CreateContract);
    assert_eq!(entries[0].actor_id, Some(owner.id));
    assert_eq!(entries[0].metadata["title"], "Master Services Agreement");

    let detail = vault.contracts().view(&ctx(&owner), contract.id).unwrap();
    assert_eq!(detail.versions.len(), 1);
    assert_eq!(detail.versions[0].version_number, 1);
    assert_eq!(detail.versions[0].label, "Initial Version");
    assert!(detail.primary_file.is_none());
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");

    let blank = vault
        .contracts()
        .create(&ctx(&owner), NewContract::new("   ", "Acme"), None)
        .unwrap_err();
    assert_eq!(blank.code(), "validation");

    let backwards = NewContract {
        effective_date: Some(date(2025, 6, 1)),
        end_date: Some(date(2025, 5, 1)),
        ..NewContract::new("Backwards", "Acme")
    };
    let err = vault
        .contracts()
        .create(&ctx(&owner), backwards, None)
        .unwrap_err();
    assert!(err.to_string().contains("end date"));

    let missing_tag = NewContract {
        tag_ids: vec![404],
        ..NewContract::new("Tagged", "Acme")
    };
    let err = vault
        .contracts()
        .create(&ctx(&owner), missing_tag, None)
        .unwrap_err();
    assert_eq!(err.code(), "not_found");

    let missing_department = NewContract {
        bu_team_id: Some(77),
        ..NewContract::new("Team", "Acme")
    };
    let err = vault
        .contracts()
        .create(&ctx(&owner), missing_department, None)
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn status_follows_the_transition_table() {
    assert!(check_transition(ContractStatus::Draft, ContractStatus::Pending).is_ok());
    assert!(check_transition(ContractStatus::Pending, ContractStatus::Draft).is_ok());
    assert!(matches!(
        check_transition(ContractStatus::Draft, ContractStatus::Archived),
        Err(ServiceError::InvalidTransition { .. })
    ));
    assert!(check_transition(ContractStatus::Archived, ContractStatus::Active).is_err());

    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let contract = vault.contract(&owner, "NDA", ContractStatus::Draft);
    let owner_ctx = ctx(&owner);

    let err = vault
        .contracts()
        .change_status(&owner_ctx, contract.id, ContractStatus::Active, "")
        .unwrap_err();
    assert_eq!(err.code(), "invalid_transition");

    for next in [
        ContractStatus::Pending,
        ContractStatus::Active,
        ContractStatus::Terminated,
        ContractStatus::Archived,
    ] {
        let updated = vault
            .contracts()
            .change_status(&owner_ctx, contract.id, next, "signed off")
            .unwrap();
        assert_eq!(updated.status, next);
    }

    let entries = history(&vault, contract.id);
    assert_eq!(count(&entries, AuditAction::ChangeStatus), 4);
    let last = entries
        .iter()
        .find(|entry| {
            entry.action == AuditAction::ChangeStatus
                && entry.metadata["new_status"] == "ARCHIVED"
        })
        .unwrap();
    assert_eq!(last.metadata["old_status"], "TERMINATED");
    assert_eq!(last.metadata["reason"], "signed off");
}

#[test]
fn updates_audit_changed_fields_and_skip_empty_patches() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let contract = vault.contract(&owner, "NDA", ContractStatus::Draft);

    let unchanged = vault
        .contracts()
        .update(&ctx(&owner), contract.id, ContractPatch::default())
        .unwrap();
    assert_eq!(unchanged, contract);
    assert_eq!(history(&vault, contract.id).len(), 1);

    let patch = ContractPatch {
        title: Some("Mutual NDA".to_string()),
        end_date: Some(Some(date(2026, 1, 31))),
        ..ContractPatch::default()
    };
    let updated = vault.contracts().update(&ctx(&owner), contract.id, patch).unwrap();
    assert_eq!(updated.title, "Mutual NDA");
    assert_eq!(updated.end_date, Some(date(2026, 1, 31)));

    let entries = history(&vault, contract.id);
    let update = entries
        .iter()
        .find(|entry| entry.action == AuditAction::UpdateContract)
        .unwrap();
    let fields = update.metadata["updated_fields"].as_array().unwrap();
    assert!(fields.iter().any(|field| field == "title"));
    assert!(fields.iter().any(|field| field == "end_date"));

    let status_patch = ContractPatch {
        status: Some(ContractStatus::Pending),
        ..ContractPatch::default()
    };
    vault
        .contracts()
        .update(&ctx(&owner), contract.id, status_patch)
        .unwrap();
    assert_eq!(count(&history(&vault, contract.id), AuditAction::ChangeStatus), 1);
}

#[test]
fn review_records_attach_to_their_contract() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let contract = vault.contract(&owner, "Vendor Agreement", ContractStatus::Pending);
    let other = vault.contract(&owner, "Other", ContractStatus::Draft);
    let owner_ctx = ctx(&owner);
    let contracts = vault.contracts();

    let clause = contracts
        .add_clause(
            &owner_ctx,
            contract.id,
            NewClause {
                label: "Limitation of Liability".to_string(),
                text: "Capped at fees paid.".to_string(),
                risk_level: ClauseRiskLevel::High,
                playbook_entry_id: None,
            },
        )
        .unwrap();
    assert!(!clause.is_from_playbook);

    let unchanged = contracts
        .update_clause(&owner_ctx, contract.id, clause.id, ClausePatch::default())
        .unwrap();
    assert_eq!(unchanged, clause);
    let revised = contracts
        .update_clause(
            &owner_ctx,
            contract.id,
            clause.id,
            ClausePatch {
                risk_level: Some(ClauseRiskLevel::Medium),
                ..ClausePatch::default()
            },
        )
        .unwrap();
    assert_eq!(revised.risk_level, ClauseRiskLevel::Medium);

    let deviation = contracts
        .add_deviation(
            &owner_ctx,
            contract.id,
            NewDeviation {
                clause_id: Some(clause.id),
                description: "Cap raised to 2x".to_string(),
                risk_level: RiskLevel::High,
                justification: "Strategic account".to_string(),
            },
        )
        .unwrap();
    assert_eq!(deviation.clause_id, Some(clause.id));
    assert!(!deviation.approved);

    let foreign = contracts
        .add_deviation(
            &owner_ctx,
            other.id,
            NewDeviation {
                clause_id: Some(clause.id),
                description: "Wrong contract".to_string(),
                risk_level: RiskLevel::Low,
                justification: String::new(),
            },
        )
        .unwrap_err();
    assert_eq!(foreign.code(), "not_found");

    contracts
        .add_risk(
            &owner_ctx,
            contract.id,
            NewRiskItem {
                description: "Unlimited indemnity".to_string(),
                severity: RiskLevel::Critical,
                mitigation: String::new(),
                status: RiskStatus::Open,
            },
        )
        .unwrap();

    let signature = contracts
        .add_signature(
            &owner_ctx,
            contract.id,
            NewSignatureRecord {
                party: Party::Vendor,
                signatory_name: "Jordan Lee".to_string(),
                signatory_email: "jordan@vendor.example".to_string(),
                signatory_phone: String::new(),
                signatory_designation: "CFO".to_string(),
                sign_type: SignType::Esign,
            },
        )
        .unwrap();
    assert!(!signature.is_signed());

    let signed = contracts
        .mark_signed(&owner_ctx, contract.id, signature.id, "ENV-42")
        .unwrap();
    assert!(signed.is_signed());
    assert_eq!(signed.signature_reference, "ENV-42");
    let again = contracts
        .mark_signed(&owner_ctx, contract.id, signature.id, "ENV-43")
        .unwrap_err();
    assert_eq!(again.code(), "validation");

    let entries = history(&vault, contract.id);
    for action in [
        AuditAction::AddClause,
        AuditAction::UpdateClause,
        AuditAction::AddDeviation,
        AuditAction::AddRisk,
        AuditAction::AddSignature,
        AuditAction::Sign,
    ] {
        assert_eq!(count(&entries, action), 1, "{action}");
    }

    let detail = contracts.view(&owner_ctx, contract.id).unwrap();
    assert_eq!(detail.clauses.len(), 1);
    assert_eq!(detail.deviations.len(), 1);
    assert_eq!(detail.risks.len(), 1);
    assert_eq!(detail.signatures.len(), 1);
}

#[test]
fn deletion_keeps_an_orphaned_audit_row() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let contract = vault.contract(&owner, "Short Lived", ContractStatus::Draft);

    vault.contracts().delete(&ctx(&owner), contract.id).unwrap();

    let recent = AuditService::new(&vault.conn)
        .recent(&vault.admin_ctx(), 10)
        .unwrap();
    let deleted = recent
        .iter()
        .find(|entry| entry.action == AuditAction::DeleteContract)
        .unwrap();
    assert_eq!(deleted.contract_id, None);
    assert_eq!(deleted.metadata["contract_number"], contract.contract_number.as_str());
    assert_eq!(deleted.metadata["title"], "Short Lived");
}

#[test]
fn viewing_records_a_view_entry() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let contract = vault.contract(&owner, "Seen", ContractStatus::Draft);

    vault.contracts().view(&ctx(&owner), contract.id).unwrap();
    vault.contracts().view(&vault.admin_ctx(), contract.id).unwrap();
    assert_eq!(count(&history(&vault, contract.id), AuditAction::View), 2);
}
