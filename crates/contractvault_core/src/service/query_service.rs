//! Contract browser queries.
//!
//! # Responsibility
//! - Translate tab, filter and sort input into repository queries.
//! - Paginate results and report per-tab totals.
//!
//! # Invariants
//! - Every query runs under the actor's visibility scope.
//! - Page numbers are 1-based; out-of-range pages return no items.

use crate::model::contract::{Category, Contract, ContractStatus};
use crate::model::lookup::{DepartmentId, TagId};
use crate::model::principal::UserId;
use crate::repo::contract_repo::{
    ContractListQuery, ContractRepository, ContractScope, ContractSort, ContractTab,
    SqliteContractRepository,
};
use crate::service::{RequestContext, ServiceError, ServiceResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// User-facing filters; empty collections mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractFilters {
    pub search: Option<String>,
    pub statuses: Vec<ContractStatus>,
    pub categories: Vec<Category>,
    pub department_id: Option<DepartmentId>,
    pub owner_id: Option<UserId>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractPage {
    pub tab: Option<ContractTab>,
    pub items: Vec<Contract>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub tab_counts: BTreeMap<ContractTab, u64>,
}

pub struct ContractQueryService<'conn> {
    conn: &'conn Connection,
    page_size: u32,
}

impl<'conn> ContractQueryService<'conn> {
    pub fn new(conn: &'conn Connection, page_size: u32) -> Self {
        Self {
            conn,
            page_size: page_size.max(1),
        }
    }

    /// One page of `tab` (or all tabs when `None`) ordered by `sort`.
    pub fn page(
        &self,
        ctx: &RequestContext,
        tab: Option<ContractTab>,
        filters: &ContractFilters,
        sort: ContractSort,
        page: u32,
    ) -> ServiceResult<ContractPage> {
        if page == 0 {
            return Err(ServiceError::validation("page numbers start at 1"));
        }
        if let (Some(from), Some(to)) = (filters.created_from, filters.created_to) {
            if from > to {
                return Err(ServiceError::validation(
                    "created_from must not be after created_to",
                ));
            }
        }

        let scope = ContractScope::for_principal(&ctx.actor);
        let repo = SqliteContractRepository::new(self.conn);
        let mut query = build_query(tab, filters, sort);
        let total = repo.count_contracts(&query, &scope)?;

        query.limit = Some(self.page_size);
        query.offset = (page - 1).saturating_mul(self.page_size);
        let items = repo.list_contracts(&query, &scope)?;

        Ok(ContractPage {
            tab,
            items,
            page,
            page_size: self.page_size,
            total,
            total_pages: total.div_ceil(u64::from(self.page_size)) as u32,
            tab_counts: self.tab_counts(ctx, filters)?,
        })
    }

    /// Totals per tab for the same filters.
    pub fn tab_counts(
        &self,
        ctx: &RequestContext,
        filters: &ContractFilters,
    ) -> ServiceResult<BTreeMap<ContractTab, u64>> {
        let scope = ContractScope::for_principal(&ctx.actor);
        let repo = SqliteContractRepository::new(self.conn);
        let mut counts = BTreeMap::new();
        for tab in ContractTab::ALL {
            let query = build_query(Some(*tab), filters, ContractSort::default());
            counts.insert(*tab, repo.count_contracts(&query, &scope)?);
        }
        Ok(counts)
    }
}

fn build_query(
    tab: Option<ContractTab>,
    filters: &ContractFilters,
    sort: ContractSort,
) -> ContractListQuery {
    ContractListQuery {
        tab,
        search: filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_string),
        statuses: filters.statuses.clone(),
        categories: filters.categories.clone(),
        department_id: filters.department_id,
        owner_id: filters.owner_id,
        created_from: filters.created_from,
        created_to: filters.created_to,
        tag_ids: filters.tag_ids.clone(),
        sort,
        ..ContractListQuery::default()
    }
}
