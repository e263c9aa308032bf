//! Contract repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist contracts and their tag links.
//! - Answer list/count/aggregate queries under a visibility scope.
//! - Load the [`AccessFacts`] snapshot the permission matrix evaluates.
//!
//! # Invariants
//! - Writes call `Contract::validate()` first.
//! - Every list query ends with a deterministic tie-breaker on `id`.
//! - A non-admin scope expands to the same visibility chain the matrix uses
//!   for `ViewContract`.

use crate::model::contract::{Category, Contract, ContractId, ContractStatus};
use crate::model::lookup::{DepartmentId, TagId};
use crate::model::principal::{Principal, UserId};
use crate::model::{start_of_day_millis, Timestamp};
use crate::policy::matrix::AccessFacts;
use crate::repo::{
    bool_to_int, date_to_db, decimal_to_db, parse_bool, parse_date, parse_decimal, parse_enum,
    parse_json_object, parse_uuid, RepoError, RepoResult,
};
use chrono::{Days, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const CONTRACT_SELECT_SQL: &str = "SELECT
    c.id,
    c.contract_number,
    c.title,
    c.status,
    c.category,
    c.sub_category,
    c.org_entity,
    c.region_country,
    c.bu_team_id,
    c.customer_or_vendor_name,
    c.customer_or_vendor_address,
    c.contract_type_id,
    c.value_amount,
    c.currency,
    c.opportunity_id,
    c.effective_date,
    c.end_date,
    c.auto_renewal,
    c.renewal_notice_date,
    c.assignment_status,
    c.owner_id,
    c.is_confidential,
    c.extra_metadata,
    c.created_by,
    c.created_at,
    c.updated_at
FROM contracts c";

/// Which contracts a query may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractScope {
    All,
    VisibleTo(Viewer),
}

/// Non-admin viewer attributes the visibility chain needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub department_id: Option<DepartmentId>,
    pub finance_viewer: bool,
    pub legal_user: bool,
}

impl ContractScope {
    pub fn for_principal(principal: &Principal) -> Self {
        let role = principal.role();
        if role.is_legal_admin() {
            return Self::All;
        }
        Self::VisibleTo(Viewer {
            user_id: principal.id,
            department_id: principal.department_id,
            finance_viewer: role.is_finance_viewer(),
            legal_user: role.is_legal_user(),
        })
    }

    /// Appends ` AND <visibility predicate>` for contracts aliased `alias`.
    pub(crate) fn push_sql(&self, alias: &str, sql: &mut String, binds: &mut Vec<Value>) {
        let Self::VisibleTo(viewer) = self else {
            return;
        };
        let uid = Value::Integer(viewer.user_id);

        sql.push_str(&format!(
            " AND ({alias}.owner_id = ? OR {alias}.created_by = ?
                OR EXISTS (
                    SELECT 1 FROM contract_shares s
                    WHERE s.contract_id = {alias}.id AND s.shared_with_user_id = ?
                )"
        ));
        binds.extend([uid.clone(), uid.clone(), uid.clone()]);

        if let Some(department_id) = viewer.department_id {
            sql.push_str(&format!(
                " OR EXISTS (
                    SELECT 1 FROM contract_shares s
                    WHERE s.contract_id = {alias}.id AND s.shared_with_department_id = ?
                )
                OR {alias}.bu_team_id = ?"
            ));
            binds.extend([Value::Integer(department_id), Value::Integer(department_id)]);
        }
        if viewer.finance_viewer {
            sql.push_str(&format!(" OR {alias}.is_confidential = 0"));
        }
        if viewer.legal_user {
            sql.push_str(&format!(
                " OR EXISTS (
                    SELECT 1 FROM additional_approvals a
                    WHERE a.contract_id = {alias}.id AND (a.approver_id = ? OR a.requested_by = ?)
                )"
            ));
            binds.extend([uid.clone(), uid]);
        }
        sql.push(')');
    }
}

db_enum! {
    /// List tabs of the contract browser.
    pub enum ContractTab {
        Draft => "draft",
        Pending => "pending",
        Repository => "repository",
    }
}

db_enum! {
    pub enum SortKey {
        CreatedAt => "created_at",
        UpdatedAt => "updated_at",
        Title => "title",
        EndDate => "end_date",
        RenewalNoticeDate => "renewal_notice_date",
    }
}

/// Sort key plus direction; textual form is `[-]key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSort {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for ContractSort {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            descending: true,
        }
    }
}

impl ContractSort {
    pub fn asc(key: SortKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    pub fn desc(key: SortKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.strip_prefix('-') {
            Some(key) => SortKey::parse(key).map(Self::desc),
            None => SortKey::parse(value).map(Self::asc),
        }
    }

    fn order_by_sql(self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        let column = match self.key {
            SortKey::CreatedAt => "c.created_at",
            SortKey::UpdatedAt => "c.updated_at",
            SortKey::Title => "c.title COLLATE NOCASE",
            SortKey::EndDate => "c.end_date",
            SortKey::RenewalNoticeDate => "c.renewal_notice_date",
        };
        format!(" ORDER BY {column} {direction}, c.id ASC")
    }
}

/// Filters shared by list and count queries. Empty sets mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractListQuery {
    pub tab: Option<ContractTab>,
    /// Case-insensitive substring over title, number and counterparty.
    pub search: Option<String>,
    pub statuses: Vec<ContractStatus>,
    pub categories: Vec<Category>,
    pub department_id: Option<DepartmentId>,
    pub owner_id: Option<UserId>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub tag_ids: Vec<TagId>,
    /// Inclusive end-date window.
    pub end_date_between: Option<(NaiveDate, NaiveDate)>,
    /// Inclusive renewal-notice window.
    pub notice_date_between: Option<(NaiveDate, NaiveDate)>,
    pub auto_renewal: Option<bool>,
    pub sort: ContractSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ContractListQuery {
    fn push_filters(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self.tab {
            Some(ContractTab::Draft) => sql.push_str(" AND c.status = 'DRAFT'"),
            Some(ContractTab::Pending) => sql.push_str(
                " AND (c.status = 'PENDING' OR EXISTS (
                    SELECT 1 FROM additional_approvals pa
                    WHERE pa.contract_id = c.id AND pa.status = 'PENDING'
                ))",
            ),
            Some(ContractTab::Repository) => {
                sql.push_str(" AND c.status NOT IN ('DRAFT', 'PENDING')")
            }
            None => {}
        }

        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                sql.push_str(
                    " AND (casefold(c.title) LIKE ? ESCAPE '\\'
                        OR casefold(c.contract_number) LIKE ? ESCAPE '\\'
                        OR casefold(c.customer_or_vendor_name) LIKE ? ESCAPE '\\')",
                );
                let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
                for _ in 0..3 {
                    binds.push(Value::Text(pattern.clone()));
                }
            }
        }

        push_in_list(
            sql,
            binds,
            "c.status",
            self.statuses.iter().map(|status| status.as_str()),
        );
        push_in_list(
            sql,
            binds,
            "c.category",
            self.categories.iter().map(|category| category.as_str()),
        );

        if let Some(department_id) = self.department_id {
            sql.push_str(" AND c.bu_team_id = ?");
            binds.push(Value::Integer(department_id));
        }
        if let Some(owner_id) = self.owner_id {
            sql.push_str(" AND c.owner_id = ?");
            binds.push(Value::Integer(owner_id));
        }
        if let Some(from) = self.created_from {
            sql.push_str(" AND c.created_at >= ?");
            binds.push(Value::Integer(start_of_day_millis(from)));
        }
        if let Some(to) = self.created_to {
            if let Some(next_day) = to.checked_add_days(Days::new(1)) {
                sql.push_str(" AND c.created_at < ?");
                binds.push(Value::Integer(start_of_day_millis(next_day)));
            }
        }
        if !self.tag_ids.is_empty() {
            let placeholders = vec!["?"; self.tag_ids.len()].join(", ");
            sql.push_str(&format!(
                " AND EXISTS (
                    SELECT 1 FROM contract_tags ct
                    WHERE ct.contract_id = c.id AND ct.tag_id IN ({placeholders})
                )"
            ));
            binds.extend(self.tag_ids.iter().map(|id| Value::Integer(*id)));
        }
        if let Some((from, to)) = self.end_date_between {
            sql.push_str(" AND c.end_date IS NOT NULL AND c.end_date >= ? AND c.end_date <= ?");
            binds.push(Value::Text(from.format("%Y-%m-%d").to_string()));
            binds.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        if let Some((from, to)) = self.notice_date_between {
            sql.push_str(
                " AND c.renewal_notice_date IS NOT NULL
                  AND c.renewal_notice_date >= ? AND c.renewal_notice_date <= ?",
            );
            binds.push(Value::Text(from.format("%Y-%m-%d").to_string()));
            binds.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        if let Some(auto_renewal) = self.auto_renewal {
            sql.push_str(" AND c.auto_renewal = ?");
            binds.push(Value::Integer(bool_to_int(auto_renewal)));
        }
    }
}

/// Repository interface for contract persistence and queries.
pub trait ContractRepository {
    fn insert_contract(&self, contract: &Contract) -> RepoResult<ContractId>;
    fn update_contract(&self, contract: &Contract) -> RepoResult<()>;
    fn get_contract(&self, id: ContractId) -> RepoResult<Option<Contract>>;
    fn delete_contract(&self, id: ContractId) -> RepoResult<()>;
    fn list_contracts(
        &self,
        query: &ContractListQuery,
        scope: &ContractScope,
    ) -> RepoResult<Vec<Contract>>;
    /// Matching rows ignoring `limit`/`offset`.
    fn count_contracts(&self, query: &ContractListQuery, scope: &ContractScope)
        -> RepoResult<u64>;
    fn count_by_status(&self, scope: &ContractScope) -> RepoResult<BTreeMap<ContractStatus, u64>>;
    /// Sum of non-null values per status.
    fn value_by_status(
        &self,
        scope: &ContractScope,
    ) -> RepoResult<BTreeMap<ContractStatus, Decimal>>;
    /// Month number (1-12) to count for contracts created in `year`.
    fn count_by_month(&self, year: i32, scope: &ContractScope) -> RepoResult<BTreeMap<u32, u64>>;
    fn count_by_category(&self, scope: &ContractScope) -> RepoResult<BTreeMap<Category, u64>>;
    /// Department name (`None` for unassigned) to count.
    fn count_by_department(
        &self,
        scope: &ContractScope,
    ) -> RepoResult<BTreeMap<Option<String>, u64>>;
    fn access_facts(&self, contract: &Contract, actor: &Principal) -> RepoResult<AccessFacts>;
}

/// SQLite-backed contract repository.
pub struct SqliteContractRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContractRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_tags(&self, id: &str) -> RepoResult<Vec<TagId>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag_id FROM contract_tags WHERE contract_id = ?1 ORDER BY tag_id ASC;",
        )?;
        let tags = stmt
            .query_map([id], |row| row.get::<_, TagId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn replace_tags(&self, id: &str, tag_ids: &[TagId], now: Timestamp) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM contract_tags WHERE contract_id = ?1;", [id])?;
        for tag_id in tag_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO contract_tags (contract_id, tag_id, added_at)
                 VALUES (?1, ?2, ?3);",
                params![id, tag_id, now],
            )?;
        }
        Ok(())
    }

    fn query_contracts(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<Contract>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut contracts = Vec::new();
        while let Some(row) = rows.next()? {
            contracts.push(parse_contract_row(row)?);
        }
        for contract in &mut contracts {
            contract.tag_ids = self.load_tags(&contract.id.to_string())?;
        }
        Ok(contracts)
    }

    fn scoped_rows<T>(
        &self,
        select: &str,
        extra_where: &str,
        group_by: &str,
        mut binds: Vec<Value>,
        scope: &ContractScope,
        mut map: impl FnMut(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        let mut sql = format!("{select} WHERE 1 = 1{extra_where}");
        scope.push_sql("c", &mut sql, &mut binds);
        sql.push_str(group_by);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(map(row)?);
        }
        Ok(values)
    }
}

impl ContractRepository for SqliteContractRepository<'_> {
    fn insert_contract(&self, contract: &Contract) -> RepoResult<ContractId> {
        contract.validate()?;
        let id = contract.id.to_string();

        self.conn.execute(
            "INSERT INTO contracts (
                id,
                contract_number,
                title,
                status,
                category,
                sub_category,
                org_entity,
                region_country,
                bu_team_id,
                customer_or_vendor_name,
                customer_or_vendor_address,
                contract_type_id,
                value_amount,
                currency,
                opportunity_id,
                effective_date,
                end_date,
                auto_renewal,
                renewal_notice_date,
                assignment_status,
                owner_id,
                is_confidential,
                extra_metadata,
                created_by,
                created_at,
                updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
            );",
            params![
                id,
                contract.contract_number,
                contract.title,
                contract.status.as_str(),
                contract.category.as_str(),
                contract.sub_category,
                contract.org_entity,
                contract.region_country,
                contract.bu_team_id,
                contract.customer_or_vendor_name,
                contract.customer_or_vendor_address,
                contract.contract_type_id,
                decimal_to_db(contract.value_amount),
                contract.currency,
                contract.opportunity_id,
                date_to_db(contract.effective_date),
                date_to_db(contract.end_date),
                bool_to_int(contract.auto_renewal),
                date_to_db(contract.renewal_notice_date),
                contract.assignment_status.as_str(),
                contract.owner_id,
                bool_to_int(contract.is_confidential),
                contract.extra_metadata.to_string(),
                contract.created_by,
                contract.created_at,
                contract.updated_at,
            ],
        )?;
        self.replace_tags(&id, &contract.tag_ids, contract.created_at)?;

        Ok(contract.id)
    }

    fn update_contract(&self, contract: &Contract) -> RepoResult<()> {
        contract.validate()?;
        let id = contract.id.to_string();

        let changed = self.conn.execute(
            "UPDATE contracts
             SET
                title = ?2,
                status = ?3,
                category = ?4,
                sub_category = ?5,
                org_entity = ?6,
                region_country = ?7,
                bu_team_id = ?8,
                customer_or_vendor_name = ?9,
                customer_or_vendor_address = ?10,
                contract_type_id = ?11,
                value_amount = ?12,
                currency = ?13,
                opportunity_id = ?14,
                effective_date = ?15,
                end_date = ?16,
                auto_renewal = ?17,
                renewal_notice_date = ?18,
                assignment_status = ?19,
                owner_id = ?20,
                is_confidential = ?21,
                extra_metadata = ?22,
                updated_at = ?23
             WHERE id = ?1;",
            params![
                id,
                contract.title,
                contract.status.as_str(),
                contract.category.as_str(),
                contract.sub_category,
                contract.org_entity,
                contract.region_country,
                contract.bu_team_id,
                contract.customer_or_vendor_name,
                contract.customer_or_vendor_address,
                contract.contract_type_id,
                decimal_to_db(contract.value_amount),
                contract.currency,
                contract.opportunity_id,
                date_to_db(contract.effective_date),
                date_to_db(contract.end_date),
                bool_to_int(contract.auto_renewal),
                date_to_db(contract.renewal_notice_date),
                contract.assignment_status.as_str(),
                contract.owner_id,
                bool_to_int(contract.is_confidential),
                contract.extra_metadata.to_string(),
                contract.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("contract", contract.id));
        }

        self.replace_tags(&id, &contract.tag_ids, contract.updated_at)
    }

    fn get_contract(&self, id: ContractId) -> RepoResult<Option<Contract>> {
        let contracts = self.query_contracts(
            &format!("{CONTRACT_SELECT_SQL} WHERE c.id = ?;"),
            vec![Value::Text(id.to_string())],
        )?;
        Ok(contracts.into_iter().next())
    }

    fn delete_contract(&self, id: ContractId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM contracts WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("contract", id));
        }
        Ok(())
    }

    fn list_contracts(
        &self,
        query: &ContractListQuery,
        scope: &ContractScope,
    ) -> RepoResult<Vec<Contract>> {
        let mut sql = format!("{CONTRACT_SELECT_SQL} WHERE 1 = 1");
        let mut binds = Vec::new();
        query.push_filters(&mut sql, &mut binds);
        scope.push_sql("c", &mut sql, &mut binds);
        sql.push_str(&query.sort.order_by_sql());

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(i64::from(query.offset)));
        }

        self.query_contracts(&sql, binds)
    }

    fn count_contracts(
        &self,
        query: &ContractListQuery,
        scope: &ContractScope,
    ) -> RepoResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM contracts c WHERE 1 = 1");
        let mut binds = Vec::new();
        query.push_filters(&mut sql, &mut binds);
        scope.push_sql("c", &mut sql, &mut binds);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn count_by_status(&self, scope: &ContractScope) -> RepoResult<BTreeMap<ContractStatus, u64>> {
        let rows = self.scoped_rows(
            "SELECT c.status, COUNT(*) AS total FROM contracts c",
            "",
            " GROUP BY c.status",
            Vec::new(),
            scope,
            |row| {
                let status: String = row.get(0)?;
                let total: i64 = row.get(1)?;
                Ok((
                    parse_enum(&status, "contracts.status", ContractStatus::parse)?,
                    total.max(0) as u64,
                ))
            },
        )?;
        Ok(rows.into_iter().collect())
    }

    fn value_by_status(
        &self,
        scope: &ContractScope,
    ) -> RepoResult<BTreeMap<ContractStatus, Decimal>> {
        let rows = self.scoped_rows(
            "SELECT c.status, c.value_amount FROM contracts c",
            " AND c.value_amount IS NOT NULL",
            "",
            Vec::new(),
            scope,
            |row| {
                let status: String = row.get(0)?;
                let status = parse_enum(&status, "contracts.status", ContractStatus::parse)?;
                let value = parse_decimal(row.get(1)?, "contracts.value_amount")?;
                Ok((status, value.unwrap_or_default()))
            },
        )?;

        let mut totals = BTreeMap::new();
        for (status, value) in rows {
            *totals.entry(status).or_insert(Decimal::ZERO) += value;
        }
        Ok(totals)
    }

    fn count_by_month(&self, year: i32, scope: &ContractScope) -> RepoResult<BTreeMap<u32, u64>> {
        let rows = self.scoped_rows(
            "SELECT CAST(strftime('%m', c.created_at / 1000, 'unixepoch') AS INTEGER) AS month,
                    COUNT(*) AS total
             FROM contracts c",
            " AND strftime('%Y', c.created_at / 1000, 'unixepoch') = ?",
            " GROUP BY month",
            vec![Value::Text(format!("{year:04}"))],
            scope,
            |row| {
                let month: i64 = row.get(0)?;
                let total: i64 = row.get(1)?;
                Ok((month as u32, total.max(0) as u64))
            },
        )?;
        Ok(rows.into_iter().collect())
    }

    fn count_by_category(&self, scope: &ContractScope) -> RepoResult<BTreeMap<Category, u64>> {
        let rows = self.scoped_rows(
            "SELECT c.category, COUNT(*) AS total FROM contracts c",
            "",
            " GROUP BY c.category",
            Vec::new(),
            scope,
            |row| {
                let category: String = row.get(0)?;
                let total: i64 = row.get(1)?;
                Ok((
                    parse_enum(&category, "contracts.category", Category::parse)?,
                    total.max(0) as u64,
                ))
            },
        )?;
        Ok(rows.into_iter().collect())
    }

    fn count_by_department(
        &self,
        scope: &ContractScope,
    ) -> RepoResult<BTreeMap<Option<String>, u64>> {
        let rows = self.scoped_rows(
            "SELECT d.name, COUNT(*) AS total
             FROM contracts c
             LEFT JOIN departments d ON d.id = c.bu_team_id",
            "",
            " GROUP BY d.name",
            Vec::new(),
            scope,
            |row| {
                let name: Option<String> = row.get(0)?;
                let total: i64 = row.get(1)?;
                Ok((name, total.max(0) as u64))
            },
        )?;
        Ok(rows.into_iter().collect())
    }

    fn access_facts(&self, contract: &Contract, actor: &Principal) -> RepoResult<AccessFacts> {
        let (user_share, user_edit, department_share, department_edit, participant) =
            self.conn.query_row(
                "SELECT
                    EXISTS(SELECT 1 FROM contract_shares
                           WHERE contract_id = ?1 AND shared_with_user_id = ?2),
                    EXISTS(SELECT 1 FROM contract_shares
                           WHERE contract_id = ?1 AND shared_with_user_id = ?2
                             AND access_level = 'EDIT'),
                    EXISTS(SELECT 1 FROM contract_shares
                           WHERE contract_id = ?1 AND shared_with_department_id = ?3),
                    EXISTS(SELECT 1 FROM contract_shares
                           WHERE contract_id = ?1 AND shared_with_department_id = ?3
                             AND access_level = 'EDIT'),
                    EXISTS(SELECT 1 FROM additional_approvals
                           WHERE contract_id = ?1
                             AND (approver_id = ?2 OR requested_by = ?2));",
                params![contract.id.to_string(), actor.id, actor.department_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? == 1,
                        row.get::<_, i64>(1)? == 1,
                        row.get::<_, i64>(2)? == 1,
                        row.get::<_, i64>(3)? == 1,
                        row.get::<_, i64>(4)? == 1,
                    ))
                },
            )?;

        Ok(AccessFacts {
            is_owner: contract.owner_id == Some(actor.id),
            is_creator: contract.created_by == Some(actor.id),
            is_draft: contract.status == ContractStatus::Draft,
            is_confidential: contract.is_confidential,
            has_user_share: user_share,
            has_user_edit_share: user_edit,
            has_department_share: department_share,
            has_department_edit_share: department_edit,
            same_department: actor.department_id.is_some()
                && actor.department_id == contract.bu_team_id,
            is_approval_participant: participant,
            is_designated_approver: false,
        })
    }
}

fn push_in_list<'a>(
    sql: &mut String,
    binds: &mut Vec<Value>,
    column: &str,
    values: impl Iterator<Item = &'a str>,
) {
    let values: Vec<Value> = values.map(|value| Value::Text(value.to_string())).collect();
    if values.is_empty() {
        return;
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    sql.push_str(&format!(" AND {column} IN ({placeholders})"));
    binds.extend(values);
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_contract_row(row: &Row<'_>) -> RepoResult<Contract> {
    let id_text: String = row.get("id")?;
    let status: String = row.get("status")?;
    let category: String = row.get("category")?;
    let assignment: String = row.get("assignment_status")?;
    let metadata: String = row.get("extra_metadata")?;

    Ok(Contract {
        id: parse_uuid(&id_text, "contracts.id")?,
        contract_number: row.get("contract_number")?,
        title: row.get("title")?,
        status: parse_enum(&status, "contracts.status", ContractStatus::parse)?,
        category: parse_enum(&category, "contracts.category", Category::parse)?,
        sub_category: row.get("sub_category")?,
        org_entity: row.get("org_entity")?,
        region_country: row.get("region_country")?,
        bu_team_id: row.get("bu_team_id")?,
        customer_or_vendor_name: row.get("customer_or_vendor_name")?,
        customer_or_vendor_address: row.get("customer_or_vendor_address")?,
        contract_type_id: row.get("contract_type_id")?,
        value_amount: parse_decimal(row.get("value_amount")?, "contracts.value_amount")?,
        currency: row.get("currency")?,
        opportunity_id: row.get("opportunity_id")?,
        effective_date: parse_date(row.get("effective_date")?, "contracts.effective_date")?,
        end_date: parse_date(row.get("end_date")?, "contracts.end_date")?,
        auto_renewal: parse_bool(row.get("auto_renewal")?, "contracts.auto_renewal")?,
        renewal_notice_date: parse_date(
            row.get("renewal_notice_date")?,
            "contracts.renewal_notice_date",
        )?,
        assignment_status: parse_enum(
            &assignment,
            "contracts.assignment_status",
            crate::model::contract::AssignmentStatus::parse,
        )?,
        owner_id: row.get("owner_id")?,
        is_confidential: parse_bool(row.get("is_confidential")?, "contracts.is_confidential")?,
        extra_metadata: parse_json_object(&metadata, "contracts.extra_metadata")?,
        tag_ids: Vec::new(),
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
