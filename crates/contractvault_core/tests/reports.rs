mod common;

use common::{ctx, date, Vault};
use contractvault_core::model::contract::{Category, ContractStatus, NewContract};
use contractvault_core::repo::lookup_repo::SqliteLookupRepository;
use contractvault_core::service::config_service::ConfigService;
use contractvault_core::service::report_service::{ReportService, UNASSIGNED_DEPARTMENT};
use rust_decimal::Decimal;

#[test]
fn report_groups_the_visible_portfolio() {
    let vault = Vault::new();
    let owner = vault.legal_user("owner");
    let legal = ConfigService::new(SqliteLookupRepository::new(&vault.conn))
        .add_department(&vault.admin_ctx(), "Legal")
        .unwrap();

    let contracts = vault.contracts();
    let active_ending = |title: &str, end, value: i64| NewContract {
        status: ContractStatus::Active,
        category: Category::Service,
        effective_date: Some(date(2025, 1, 1)),
        end_date: Some(end),
        value_amount: Some(Decimal::new(value, 0)),
        ..NewContract::new(title, "Vendor")
    };
    for input in [
        active_ending("Week", date(2025, 6, 20), 100),
        active_ending("Month", date(2025, 7, 10), 200),
        active_ending("Quarter", date(2025, 9, 1), 300),
        NewContract {
            bu_team_id: Some(legal.id),
            category: Category::Legal,
            value_amount: Some(Decimal::new(50, 0)),
            ..NewContract::new("Counsel retainer", "Law LLP")
        },
    ] {
        contracts.create(&ctx(&owner), input, None).unwrap();
    }

    let reports = ReportService::new(&vault.conn);
    let report = reports.build(&ctx(&owner), None).unwrap();
    assert_eq!(report.year, 2025);
    assert_eq!(report.by_month.len(), 12);
    assert_eq!(report.by_month[&6], 4);
    assert_eq!(report.by_month[&1], 0);

    assert_eq!(report.by_category.get(&Category::Service).copied(), Some(3));
    assert_eq!(report.by_category.get(&Category::Legal).copied(), Some(1));
    assert_eq!(report.by_department["Legal"], 1);
    assert_eq!(report.by_department[UNASSIGNED_DEPARTMENT], 3);

    assert_eq!(
        report.value_by_status.get(&ContractStatus::Active).copied(),
        Some(Decimal::new(600, 0))
    );
    assert_eq!(
        report.value_by_status.get(&ContractStatus::Draft).copied(),
        Some(Decimal::new(50, 0))
    );
    assert_eq!(report.expiring[&7], 1);
    assert_eq!(report.expiring[&30], 2);
    assert_eq!(report.expiring[&90], 3);

    let previous = reports.build(&ctx(&owner), Some(2024)).unwrap();
    assert!(previous.by_month.values().all(|count| *count == 0));

    let outsider = vault.legal_user("outsider");
    let empty = reports.build(&ctx(&outsider), None).unwrap();
    assert!(empty.by_category.is_empty());
    assert!(empty.expiring.values().all(|count| *count == 0));
}
