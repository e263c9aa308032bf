//! Contract share persistence.

use crate::model::contract::ContractId;
use crate::model::principal::UserId;
use crate::model::share::{AccessLevel, ContractShare, ShareId, ShareTarget};
use crate::model::Timestamp;
use crate::repo::{parse_enum, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const SHARE_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    shared_with_user_id,
    shared_with_department_id,
    access_level,
    shared_by,
    shared_at
FROM contract_shares";

pub trait ShareRepository {
    fn insert_share(
        &self,
        contract_id: ContractId,
        target: ShareTarget,
        access_level: AccessLevel,
        shared_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<ShareId>;
    fn get_share(&self, contract_id: ContractId, id: ShareId) -> RepoResult<Option<ContractShare>>;
    fn list_shares(&self, contract_id: ContractId) -> RepoResult<Vec<ContractShare>>;
    fn delete_share(&self, contract_id: ContractId, id: ShareId) -> RepoResult<()>;
}

pub struct SqliteShareRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteShareRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ShareRepository for SqliteShareRepository<'_> {
    fn insert_share(
        &self,
        contract_id: ContractId,
        target: ShareTarget,
        access_level: AccessLevel,
        shared_by: Option<UserId>,
        now: Timestamp,
    ) -> RepoResult<ShareId> {
        self.conn.execute(
            "INSERT INTO contract_shares (
                contract_id,
                shared_with_user_id,
                shared_with_department_id,
                access_level,
                shared_by,
                shared_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                contract_id.to_string(),
                target.user_id(),
                target.department_id(),
                access_level.as_str(),
                shared_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_share(&self, contract_id: ContractId, id: ShareId) -> RepoResult<Option<ContractShare>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SHARE_SELECT_SQL} WHERE contract_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![contract_id.to_string(), id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_share_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_shares(&self, contract_id: ContractId) -> RepoResult<Vec<ContractShare>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SHARE_SELECT_SQL} WHERE contract_id = ?1 ORDER BY shared_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut shares = Vec::new();
        while let Some(row) = rows.next()? {
            shares.push(parse_share_row(row)?);
        }
        Ok(shares)
    }

    fn delete_share(&self, contract_id: ContractId, id: ShareId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM contract_shares WHERE contract_id = ?1 AND id = ?2;",
            params![contract_id.to_string(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("share", id));
        }
        Ok(())
    }
}

fn parse_share_row(row: &Row<'_>) -> RepoResult<ContractShare> {
    let contract_text: String = row.get("contract_id")?;
    let level: String = row.get("access_level")?;
    let user_id: Option<UserId> = row.get("shared_with_user_id")?;
    let department_id: Option<i64> = row.get("shared_with_department_id")?;

    let target = match (user_id, department_id) {
        (Some(user_id), None) => ShareTarget::User(user_id),
        (None, Some(department_id)) => ShareTarget::Department(department_id),
        _ => {
            return Err(RepoError::InvalidData(
                "contract_shares row must target exactly one user or department".to_string(),
            ));
        }
    };

    Ok(ContractShare {
        id: row.get("id")?,
        contract_id: parse_uuid(&contract_text, "contract_shares.contract_id")?,
        target,
        access_level: parse_enum(&level, "contract_shares.access_level", AccessLevel::parse)?,
        shared_by: row.get("shared_by")?,
        shared_at: row.get("shared_at")?,
    })
}
