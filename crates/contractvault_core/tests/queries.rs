mod common;

use common::{ctx, date, Vault};
use contractvault_core::model::approval::NewApproval;
use contractvault_core::model::contract::{Category, Contract, ContractStatus, NewContract};
use contractvault_core::model::principal::Principal;
use contractvault_core::repo::contract_repo::{ContractSort, ContractTab, SortKey};
use contractvault_core::service::approval_service::ApprovalService;
use contractvault_core::service::query_service::{ContractFilters, ContractQueryService};

fn create(vault: &Vault, owner: &Principal, input: NewContract) -> Contract {
    vault.contracts().create(&ctx(owner), input, None).unwrap()
}

fn seeded(vault: &Vault, owner: &Principal) {
    create(
        vault,
        owner,
        NewContract {
            category: Category::Nda,
            ..NewContract::new("Alpha NDA", "Umbrella Corp")
        },
    );
    let epsilon = create(vault, owner, NewContract::new("Epsilon Draft", "Stark Industries"));
    create(
        vault,
        owner,
        NewContract {
            status: ContractStatus::Pending,
            category: Category::Procurement,
            ..NewContract::new("Beta Supply", "Wayne Enterprises")
        },
    );
    create(
        vault,
        owner,
        NewContract {
            status: ContractStatus::Active,
            ..NewContract::new("Gamma Lease", "Umbrella Corp")
        },
    );
    create(
        vault,
        owner,
        NewContract {
            status: ContractStatus::Archived,
            ..NewContract::new("100% Discount", "Hooli")
        },
    );
    create(
        vault,
        owner,
        NewContract {
            status: ContractStatus::Terminated,
            ..NewContract::new("1000 Units", "Hooli")
        },
    );

    let approver = vault.legal_user("approver");
    ApprovalService::new(&vault.conn)
        .request(
            &ctx(owner),
            epsilon.id,
            NewApproval {
                approver_id: approver.id,
                reason: "Unusual indemnity".to_string(),
                due_date: None,
            },
        )
        .unwrap();
}

fn titles(contracts: &[Contract]) -> Vec<&str> {
    contracts.iter().map(|c| c.title.as_str()).collect()
}

#[test]
fn tabs_split_the_portfolio() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    seeded(&vault, &owner);
    let queries = ContractQueryService::new(&vault.conn, 20);

    let counts = queries
        .tab_counts(&ctx(&owner), &ContractFilters::default())
        .unwrap();
    assert_eq!(counts[&ContractTab::Draft], 2);
    // A draft with an open approval also shows under pending.
    assert_eq!(counts[&ContractTab::Pending], 2);
    assert_eq!(counts[&ContractTab::Repository], 3);

    let repository = queries
        .page(
            &ctx(&owner),
            Some(ContractTab::Repository),
            &ContractFilters::default(),
            ContractSort::asc(SortKey::Title),
            1,
        )
        .unwrap();
    assert_eq!(
        titles(&repository.items),
        vec!["100% Discount", "1000 Units", "Gamma Lease"]
    );
}

#[test]
fn search_and_filters_narrow_results() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    seeded(&vault, &owner);
    let queries = ContractQueryService::new(&vault.conn, 20);
    let run = |filters: ContractFilters| {
        queries
            .page(&ctx(&owner), None, &filters, ContractSort::asc(SortKey::Title), 1)
            .unwrap()
    };

    let umbrella = run(ContractFilters {
        search: Some("  UMBRELLA ".to_string()),
        ..ContractFilters::default()
    });
    assert_eq!(titles(&umbrella.items), vec!["Alpha NDA", "Gamma Lease"]);

    let literal_percent = run(ContractFilters {
        search: Some("100%".to_string()),
        ..ContractFilters::default()
    });
    assert_eq!(titles(&literal_percent.items), vec!["100% Discount"]);

    let by_number = run(ContractFilters {
        search: Some("cnt-202506".to_string()),
        ..ContractFilters::default()
    });
    assert_eq!(by_number.total, 6);

    let nda_or_procurement = run(ContractFilters {
        categories: vec![Category::Nda, Category::Procurement],
        ..ContractFilters::default()
    });
    assert_eq!(
        titles(&nda_or_procurement.items),
        vec!["Alpha NDA", "Beta Supply"]
    );

    let june = run(ContractFilters {
        created_from: Some(date(2025, 6, 15)),
        created_to: Some(date(2025, 6, 15)),
        statuses: vec![ContractStatus::Active],
        ..ContractFilters::default()
    });
    assert_eq!(titles(&june.items), vec!["Gamma Lease"]);

    let later = run(ContractFilters {
        created_from: Some(date(2025, 6, 16)),
        ..ContractFilters::default()
    });
    assert_eq!(later.total, 0);
}

#[test]
fn search_folds_case_beyond_ascii() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    create(&vault, &owner, NewContract::new("ÉCOLE Lease", "Société Générale"));
    create(&vault, &owner, NewContract::new("Ecole Supply", "Acme Corp"));
    let queries = ContractQueryService::new(&vault.conn, 20);
    let total = |needle: &str| {
        queries
            .page(
                &ctx(&owner),
                None,
                &ContractFilters {
                    search: Some(needle.to_string()),
                    ..ContractFilters::default()
                },
                ContractSort::asc(SortKey::Title),
                1,
            )
            .unwrap()
            .total
    };

    assert_eq!(total("école"), 1);
    assert_eq!(total("ÉCOLE"), 1);
    assert_eq!(total("SOCIÉTÉ"), 1);
    assert_eq!(total("société générale"), 1);
    assert_eq!(total("ecole"), 1);
}

#[test]
fn pages_are_one_based_and_bounded() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    seeded(&vault, &owner);
    let queries = ContractQueryService::new(&vault.conn, 4);
    let filters = ContractFilters::default();

    let first = queries
        .page(&ctx(&owner), None, &filters, ContractSort::default(), 1)
        .unwrap();
    assert_eq!(first.total, 6);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.items.len(), 4);

    let second = queries
        .page(&ctx(&owner), None, &filters, ContractSort::default(), 2)
        .unwrap();
    assert_eq!(second.items.len(), 2);

    let beyond = queries
        .page(&ctx(&owner), None, &filters, ContractSort::default(), 3)
        .unwrap();
    assert!(beyond.items.is_empty());

    let err = queries
        .page(&ctx(&owner), None, &filters, ContractSort::default(), 0)
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let inverted = ContractFilters {
        created_from: Some(date(2025, 7, 1)),
        created_to: Some(date(2025, 6, 1)),
        ..ContractFilters::default()
    };
    let err = queries
        .page(&ctx(&owner), None, &inverted, ContractSort::default(), 1)
        .unwrap_err();
    assert_eq!(err.code(), "validation");
}

#[test]
fn other_users_see_only_their_scope() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    seeded(&vault, &owner);
    let outsider = vault.legal_user("outsider");
    let queries = ContractQueryService::new(&vault.conn, 20);

    let page = queries
        .page(
            &ctx(&outsider),
            None,
            &ContractFilters::default(),
            ContractSort::default(),
            1,
        )
        .unwrap();
    assert_eq!(page.total, 0);

    let admin = queries
        .page(
            &vault.admin_ctx(),
            None,
            &ContractFilters::default(),
            ContractSort::default(),
            1,
        )
        .unwrap();
    assert_eq!(admin.total, 6);
}

#[test]
fn sort_text_parses_direction() {
    assert_eq!(
        ContractSort::parse("-updated_at"),
        Some(ContractSort::desc(SortKey::UpdatedAt))
    );
    assert_eq!(ContractSort::parse("title"), Some(ContractSort::asc(SortKey::Title)));
    assert_eq!(ContractSort::parse("priority"), None);
}
