//! Dashboard metrics.
//!
//! # Responsibility
//! - Compute the per-user dashboard sections in one call.
//!
//! # Invariants
//! - Non-admin sections only count contracts in the actor's visibility
//!   scope; the pending-action section is restricted to contracts the
//!   actor owns.
//! - Date windows are inclusive on both ends and anchored at the request
//!   date.

use crate::model::approval::{AdditionalApproval, ApprovalStatus};
use crate::model::audit::AuditLogEntry;
use crate::model::contract::{Contract, ContractStatus};
use crate::repo::approval_repo::{ApprovalListQuery, ApprovalRepository, SqliteApprovalRepository};
use crate::repo::contract_repo::{
    ContractListQuery, ContractRepository, ContractScope, ContractSort, SortKey,
    SqliteContractRepository,
};
use crate::repo::review_repo::{ReviewRepository, SqliteReviewRepository};
use crate::service::audit_service::AuditService;
use crate::service::{RequestContext, ServiceResult};
use chrono::{Datelike, Days, NaiveDate};
use log::info;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Windows and sizes of the dashboard sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSettings {
    pub expiring_window_days: u32,
    pub notice_window_days: u32,
    pub item_limit: u32,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            expiring_window_days: 30,
            notice_window_days: 30,
            item_limit: 10,
        }
    }
}

/// Capped item list plus the uncapped total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section<T> {
    pub count: u64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusStats {
    /// Every status is present, zero when unused.
    pub by_status: BTreeMap<ContractStatus, u64>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickStats {
    pub active_value: Decimal,
    pub created_this_month: u64,
    pub high_risk_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub pending_action: Section<Contract>,
    pub pending_approvals: Section<AdditionalApproval>,
    pub expiring_contracts: Section<Contract>,
    pub notified_contracts: Section<Contract>,
    pub contract_stats: StatusStats,
    pub quick_stats: QuickStats,
    pub recent_activity: Vec<AuditLogEntry>,
}

pub struct DashboardService<'conn> {
    conn: &'conn Connection,
    settings: DashboardSettings,
}

impl<'conn> DashboardService<'conn> {
    pub fn new(conn: &'conn Connection, settings: DashboardSettings) -> Self {
        Self { conn, settings }
    }

    pub fn overview(&self, ctx: &RequestContext) -> ServiceResult<Dashboard> {
        let dashboard = Dashboard {
            pending_action: self.pending_action(ctx)?,
            pending_approvals: self.pending_approvals(ctx)?,
            expiring_contracts: self.expiring(ctx, self.settings.expiring_window_days)?,
            notified_contracts: self.notified(ctx)?,
            contract_stats: self.status_stats(ctx)?,
            quick_stats: self.quick_stats(ctx)?,
            recent_activity: self.recent_activity(ctx)?,
        };
        info!(
            "event=dashboard_overview module=dashboard_service status=ok user_id={} pending={} expiring={}",
            ctx.actor.id, dashboard.pending_action.count, dashboard.expiring_contracts.count
        );
        Ok(dashboard)
    }

    /// DRAFT or PENDING contracts owned by the actor, latest update first.
    pub fn pending_action(&self, ctx: &RequestContext) -> ServiceResult<Section<Contract>> {
        let query = ContractListQuery {
            statuses: vec![ContractStatus::Draft, ContractStatus::Pending],
            owner_id: Some(ctx.actor.id),
            sort: ContractSort::desc(SortKey::UpdatedAt),
            ..ContractListQuery::default()
        };
        self.contract_section(&query, &ContractScope::All)
    }

    /// PENDING approvals the actor must decide.
    pub fn pending_approvals(
        &self,
        ctx: &RequestContext,
    ) -> ServiceResult<Section<AdditionalApproval>> {
        let repo = SqliteApprovalRepository::new(self.conn);
        let mut query = ApprovalListQuery {
            approver_id: Some(ctx.actor.id),
            status: Some(ApprovalStatus::Pending),
            ..ApprovalListQuery::default()
        };
        let count = repo.count_approvals(&query)?;
        query.limit = Some(self.settings.item_limit);
        Ok(Section {
            count,
            items: repo.list_approvals(&query)?,
        })
    }

    /// ACTIVE contracts ending within `[today, today + days]`.
    pub fn expiring(&self, ctx: &RequestContext, days: u32) -> ServiceResult<Section<Contract>> {
        let today = ctx.today();
        let query = ContractListQuery {
            statuses: vec![ContractStatus::Active],
            end_date_between: Some((today, days_after(today, days))),
            sort: ContractSort::asc(SortKey::EndDate),
            ..ContractListQuery::default()
        };
        self.contract_section(&query, &ContractScope::for_principal(&ctx.actor))
    }

    /// ACTIVE auto-renewing contracts whose notice date is coming up.
    pub fn notified(&self, ctx: &RequestContext) -> ServiceResult<Section<Contract>> {
        let today = ctx.today();
        let query = ContractListQuery {
            statuses: vec![ContractStatus::Active],
            auto_renewal: Some(true),
            notice_date_between: Some((
                today,
                days_after(today, self.settings.notice_window_days),
            )),
            sort: ContractSort::asc(SortKey::RenewalNoticeDate),
            ..ContractListQuery::default()
        };
        self.contract_section(&query, &ContractScope::for_principal(&ctx.actor))
    }

    pub fn status_stats(&self, ctx: &RequestContext) -> ServiceResult<StatusStats> {
        let counts = SqliteContractRepository::new(self.conn)
            .count_by_status(&ContractScope::for_principal(&ctx.actor))?;
        let by_status: BTreeMap<ContractStatus, u64> = ContractStatus::ALL
            .iter()
            .map(|status| (*status, counts.get(status).copied().unwrap_or(0)))
            .collect();
        Ok(StatusStats {
            total: by_status.values().sum(),
            by_status,
        })
    }

    pub fn quick_stats(&self, ctx: &RequestContext) -> ServiceResult<QuickStats> {
        let scope = ContractScope::for_principal(&ctx.actor);
        let contracts = SqliteContractRepository::new(self.conn);
        let active_value = contracts
            .value_by_status(&scope)?
            .get(&ContractStatus::Active)
            .copied()
            .unwrap_or(Decimal::ZERO);

        let today = ctx.today();
        let month_start = today.with_day(1).unwrap_or(today);
        let created_this_month = contracts.count_contracts(
            &ContractListQuery {
                created_from: Some(month_start),
                ..ContractListQuery::default()
            },
            &scope,
        )?;

        Ok(QuickStats {
            active_value,
            created_this_month,
            high_risk_count: SqliteReviewRepository::new(self.conn)
                .count_open_high_risks(&scope)?,
        })
    }

    pub fn recent_activity(&self, ctx: &RequestContext) -> ServiceResult<Vec<AuditLogEntry>> {
        AuditService::new(self.conn).recent(ctx, self.settings.item_limit)
    }

    fn contract_section(
        &self,
        query: &ContractListQuery,
        scope: &ContractScope,
    ) -> ServiceResult<Section<Contract>> {
        let repo = SqliteContractRepository::new(self.conn);
        let count = repo.count_contracts(query, scope)?;
        let capped = ContractListQuery {
            limit: Some(self.settings.item_limit),
            ..query.clone()
        };
        Ok(Section {
            count,
            items: repo.list_contracts(&capped, scope)?,
        })
    }
}

pub(crate) fn days_after(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::days_after;
    use chrono::NaiveDate;

    #[test]
    fn window_end_crosses_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(
            days_after(today, 30),
            NaiveDate::from_ymd_opt(2026, 2, 19).unwrap()
        );
    }
}
