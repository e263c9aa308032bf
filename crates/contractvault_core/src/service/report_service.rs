//! Portfolio reports.
//!
//! # Invariants
//! - Every figure is computed over the actor's visibility scope.
//! - Month buckets always cover January through December.

use crate::model::contract::{Category, ContractStatus};
use crate::repo::contract_repo::{
    ContractListQuery, ContractRepository, ContractScope, SqliteContractRepository,
};
use crate::service::dashboard_service::days_after;
use crate::service::{RequestContext, ServiceResult};
use chrono::Datelike;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Look-ahead windows of the expiry report, in days.
pub const EXPIRY_WINDOWS: [u32; 3] = [7, 30, 90];

pub const UNASSIGNED_DEPARTMENT: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub year: i32,
    pub by_month: BTreeMap<u32, u64>,
    pub by_category: BTreeMap<Category, u64>,
    pub by_department: BTreeMap<String, u64>,
    pub value_by_status: BTreeMap<ContractStatus, Decimal>,
    /// ACTIVE contracts ending within each window, keyed by window days.
    pub expiring: BTreeMap<u32, u64>,
}

pub struct ReportService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ReportService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Full report; `year` defaults to the request year.
    pub fn build(&self, ctx: &RequestContext, year: Option<i32>) -> ServiceResult<ContractReport> {
        let year = year.unwrap_or_else(|| ctx.today().year());
        let scope = ContractScope::for_principal(&ctx.actor);
        let repo = SqliteContractRepository::new(self.conn);

        let counted = repo.count_by_month(year, &scope)?;
        let by_month = (1..=12)
            .map(|month| (month, counted.get(&month).copied().unwrap_or(0)))
            .collect();

        let by_department = repo
            .count_by_department(&scope)?
            .into_iter()
            .map(|(name, total)| {
                (
                    name.unwrap_or_else(|| UNASSIGNED_DEPARTMENT.to_string()),
                    total,
                )
            })
            .collect();

        let today = ctx.today();
        let mut expiring = BTreeMap::new();
        for days in EXPIRY_WINDOWS {
            let query = ContractListQuery {
                statuses: vec![ContractStatus::Active],
                end_date_between: Some((today, days_after(today, days))),
                ..ContractListQuery::default()
            };
            expiring.insert(days, repo.count_contracts(&query, &scope)?);
        }

        Ok(ContractReport {
            year,
            by_month,
            by_category: repo.count_by_category(&scope)?,
            by_department,
            value_by_status: repo.value_by_status(&scope)?,
            expiring,
        })
    }
}
