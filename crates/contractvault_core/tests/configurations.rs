mod common;

use common::{ctx, Vault};
use contractvault_core::model::contract::{ContractStatus, NewContract};
use contractvault_core::model::lookup::{
    NewContractType, NewPlaybookEntry, NewTag, DEFAULT_TAG_COLOR,
};
use contractvault_core::model::review::{ClauseRiskLevel, NewClause};
use contractvault_core::repo::lookup_repo::SqliteLookupRepository;
use contractvault_core::service::config_service::ConfigService;

fn tag(name: &str, color: Option<&str>) -> NewTag {
    NewTag {
        name: name.to_string(),
        description: String::new(),
        color: color.map(str::to_string),
        active: true,
    }
}

#[test]
fn configuration_is_admin_only() {
    let vault = Vault::new();
    let legal = vault.legal_user("legal");
    let config = ConfigService::new(SqliteLookupRepository::new(&vault.conn));

    assert_eq!(config.overview(&ctx(&legal)).unwrap_err().code(), "permission_denied");
    assert_eq!(
        config
            .add_department(&ctx(&legal), "Sales")
            .unwrap_err()
            .code(),
        "permission_denied"
    );
    assert!(config.overview(&vault.admin_ctx()).is_ok());
}

#[test]
fn names_are_unique_and_required() {
    let vault = Vault::new();
    let admin = vault.admin_ctx();
    let config = ConfigService::new(SqliteLookupRepository::new(&vault.conn));

    let legal = config.add_department(&admin, "  Legal ").unwrap();
    assert_eq!(legal.name, "Legal");
    assert_eq!(config.add_department(&admin, "Legal").unwrap_err().code(), "validation");
    assert_eq!(config.add_department(&admin, "   ").unwrap_err().code(), "validation");

    let msa = NewContractType {
        name: "MSA".to_string(),
        description: "Master services".to_string(),
        active: true,
    };
    config.add_contract_type(&admin, &msa).unwrap();
    assert_eq!(config.add_contract_type(&admin, &msa).unwrap_err().code(), "validation");
    let retired = config
        .add_contract_type(
            &admin,
            &NewContractType {
                name: "Legacy SOW".to_string(),
                description: String::new(),
                active: false,
            },
        )
        .unwrap();
    assert!(!retired.active);

    let overview = config.overview(&admin).unwrap();
    assert_eq!(overview.departments.len(), 1);
    assert_eq!(overview.contract_types.len(), 2);
}

#[test]
fn tag_colors_default_and_normalize() {
    let vault = Vault::new();
    let admin = vault.admin_ctx();
    let config = ConfigService::new(SqliteLookupRepository::new(&vault.conn));

    assert_eq!(config.add_tag(&admin, &tag("Plain", None)).unwrap().color, DEFAULT_TAG_COLOR);
    assert_eq!(
        config.add_tag(&admin, &tag("Urgent", Some("#FF0000"))).unwrap().color,
        "#ff0000"
    );
    assert_eq!(
        config
            .add_tag(&admin, &tag("Named", Some("red")))
            .unwrap_err()
            .code(),
        "validation"
    );
}

#[test]
fn deleting_lookups_detaches_contracts() {
    let vault = Vault::new();
    let admin = vault.admin_ctx();
    let owner = vault.legal_user("owner");
    let config = ConfigService::new(SqliteLookupRepository::new(&vault.conn));
    let department = config.add_department(&admin, "Finance").unwrap();
    let urgent = config.add_tag(&admin, &tag("Urgent", None)).unwrap();

    let contract = vault
        .contracts()
        .create(
            &ctx(&owner),
            NewContract {
                bu_team_id: Some(department.id),
                tag_ids: vec![urgent.id],
                ..NewContract::new("Audit engagement", "Big Four LLP")
            },
            None,
        )
        .unwrap();
    assert_eq!(contract.tag_ids, vec![urgent.id]);

    config.delete_tag(&admin, urgent.id).unwrap();
    config.delete_department(&admin, department.id).unwrap();
    assert_eq!(config.delete_tag(&admin, urgent.id).unwrap_err().code(), "not_found");

    let detail = vault.contracts().view(&ctx(&owner), contract.id).unwrap();
    assert!(detail.contract.tag_ids.is_empty());
    assert_eq!(detail.contract.bu_team_id, None);
}

#[test]
fn playbook_entries_fill_blank_clauses() {
    let vault = Vault::new();
    let admin = vault.admin_ctx();
    let owner = vault.legal_user("owner");
    let config = ConfigService::new(SqliteLookupRepository::new(&vault.conn));

    let blank_text = NewPlaybookEntry {
        label: "Limitation of liability".to_string(),
        category: "Liability".to_string(),
        recommended_text: "  ".to_string(),
        risk_level: ClauseRiskLevel::High,
        guidance_notes: String::new(),
        active: true,
    };
    assert_eq!(
        config.add_playbook_entry(&admin, &blank_text).unwrap_err().code(),
        "validation"
    );
    let entry = config
        .add_playbook_entry(
            &admin,
            &NewPlaybookEntry {
                recommended_text: "Liability is capped at fees paid in the prior 12 months."
                    .to_string(),
                ..blank_text
            },
        )
        .unwrap();
    assert_eq!(entry.created_by, Some(vault.admin.id));

    let contract = vault.contract(&owner, "Cloud hosting", ContractStatus::Draft);
    let clause = vault
        .contracts()
        .add_clause(
            &ctx(&owner),
            contract.id,
            NewClause {
                label: String::new(),
                text: String::new(),
                risk_level: ClauseRiskLevel::High,
                playbook_entry_id: Some(entry.id),
            },
        )
        .unwrap();
    assert_eq!(clause.label, "Limitation of liability");
    assert!(clause.text.starts_with("Liability is capped"));
    assert!(clause.is_from_playbook);
    assert_eq!(clause.playbook_entry_id, Some(entry.id));

    let err = vault
        .contracts()
        .add_clause(
            &ctx(&owner),
            contract.id,
            NewClause {
                label: String::new(),
                text: String::new(),
                risk_level: ClauseRiskLevel::Low,
                playbook_entry_id: Some(9_999),
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}
