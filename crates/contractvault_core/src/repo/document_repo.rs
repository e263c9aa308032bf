//! Contract files and version history persistence.
//!
//! # Invariants
//! - Marking a file primary demotes the previous primary in the same call.
//! - `next_version_number` is `MAX(version_number) + 1`, starting at 1.

use crate::model::contract::ContractId;
use crate::model::document::{
    ContractFile, ContractVersion, FileId, NewContractFile, NewContractVersion, VersionId,
};
use crate::model::Timestamp;
use crate::repo::{bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const FILE_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    stored_path,
    original_filename,
    file_size,
    mime_type,
    is_primary,
    description,
    uploaded_by,
    uploaded_at
FROM contract_files";

const VERSION_SELECT_SQL: &str = "SELECT
    id,
    contract_id,
    version_number,
    label,
    stored_path,
    notes,
    created_by,
    created_at
FROM contract_versions";

pub trait DocumentRepository {
    fn insert_file(&self, file: &NewContractFile, now: Timestamp) -> RepoResult<FileId>;
    fn get_file(&self, contract_id: ContractId, id: FileId) -> RepoResult<Option<ContractFile>>;
    fn list_files(&self, contract_id: ContractId) -> RepoResult<Vec<ContractFile>>;
    fn primary_file(&self, contract_id: ContractId) -> RepoResult<Option<ContractFile>>;
    fn delete_file(&self, contract_id: ContractId, id: FileId) -> RepoResult<()>;

    fn next_version_number(&self, contract_id: ContractId) -> RepoResult<u32>;
    /// Inserts with the next free number and returns `(id, number)`.
    fn insert_version(
        &self,
        version: &NewContractVersion,
        now: Timestamp,
    ) -> RepoResult<(VersionId, u32)>;
    /// Newest version first.
    fn list_versions(&self, contract_id: ContractId) -> RepoResult<Vec<ContractVersion>>;
}

pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_files(&self, sql: &str, contract_id: ContractId) -> RepoResult<Vec<ContractFile>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut files = Vec::new();
        while let Some(row) = rows.next()? {
            files.push(parse_file_row(row)?);
        }
        Ok(files)
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn insert_file(&self, file: &NewContractFile, now: Timestamp) -> RepoResult<FileId> {
        let contract_id = file.contract_id.to_string();
        if file.is_primary {
            self.conn.execute(
                "UPDATE contract_files SET is_primary = 0
                 WHERE contract_id = ?1 AND is_primary = 1;",
                [contract_id.as_str()],
            )?;
        }

        self.conn.execute(
            "INSERT INTO contract_files (
                contract_id,
                stored_path,
                original_filename,
                file_size,
                mime_type,
                is_primary,
                description,
                uploaded_by,
                uploaded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                contract_id,
                file.stored_path,
                file.original_filename,
                i64::try_from(file.file_size).unwrap_or(i64::MAX),
                file.mime_type,
                bool_to_int(file.is_primary),
                file.description,
                file.uploaded_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_file(&self, contract_id: ContractId, id: FileId) -> RepoResult<Option<ContractFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FILE_SELECT_SQL} WHERE contract_id = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![contract_id.to_string(), id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_file_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_files(&self, contract_id: ContractId) -> RepoResult<Vec<ContractFile>> {
        self.query_files(
            &format!(
                "{FILE_SELECT_SQL} WHERE contract_id = ?1
                 ORDER BY is_primary DESC, uploaded_at DESC, id DESC;"
            ),
            contract_id,
        )
    }

    fn primary_file(&self, contract_id: ContractId) -> RepoResult<Option<ContractFile>> {
        let files = self.query_files(
            &format!("{FILE_SELECT_SQL} WHERE contract_id = ?1 AND is_primary = 1;"),
            contract_id,
        )?;
        Ok(files.into_iter().next())
    }

    fn delete_file(&self, contract_id: ContractId, id: FileId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM contract_files WHERE contract_id = ?1 AND id = ?2;",
            params![contract_id.to_string(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("file", id));
        }
        Ok(())
    }

    fn next_version_number(&self, contract_id: ContractId) -> RepoResult<u32> {
        let current: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(version_number), 0) FROM contract_versions WHERE contract_id = ?1;",
            [contract_id.to_string()],
            |row| row.get(0),
        )?;
        u32::try_from(current + 1)
            .map_err(|_| RepoError::InvalidData(format!("version number overflow: {current}")))
    }

    fn insert_version(
        &self,
        version: &NewContractVersion,
        now: Timestamp,
    ) -> RepoResult<(VersionId, u32)> {
        let number = self.next_version_number(version.contract_id)?;
        self.conn.execute(
            "INSERT INTO contract_versions (
                contract_id,
                version_number,
                label,
                stored_path,
                notes,
                created_by,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                version.contract_id.to_string(),
                number,
                version.label.trim(),
                version.stored_path,
                version.notes,
                version.created_by,
                now,
            ],
        )?;
        Ok((self.conn.last_insert_rowid(), number))
    }

    fn list_versions(&self, contract_id: ContractId) -> RepoResult<Vec<ContractVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL} WHERE contract_id = ?1 ORDER BY version_number DESC;"
        ))?;
        let mut rows = stmt.query([contract_id.to_string()])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            let contract_text: String = row.get("contract_id")?;
            let number: i64 = row.get("version_number")?;
            versions.push(ContractVersion {
                id: row.get("id")?,
                contract_id: parse_uuid(&contract_text, "contract_versions.contract_id")?,
                version_number: u32::try_from(number).map_err(|_| {
                    RepoError::InvalidData(format!(
                        "invalid version number `{number}` in contract_versions.version_number"
                    ))
                })?,
                label: row.get("label")?,
                stored_path: row.get("stored_path")?,
                notes: row.get("notes")?,
                created_by: row.get("created_by")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(versions)
    }
}

fn parse_file_row(row: &Row<'_>) -> RepoResult<ContractFile> {
    let contract_text: String = row.get("contract_id")?;
    let size: i64 = row.get("file_size")?;
    Ok(ContractFile {
        id: row.get("id")?,
        contract_id: parse_uuid(&contract_text, "contract_files.contract_id")?,
        stored_path: row.get("stored_path")?,
        original_filename: row.get("original_filename")?,
        file_size: u64::try_from(size).map_err(|_| {
            RepoError::InvalidData(format!("invalid size `{size}` in contract_files.file_size"))
        })?,
        mime_type: row.get("mime_type")?,
        is_primary: parse_bool(row.get("is_primary")?, "contract_files.is_primary")?,
        description: row.get("description")?,
        uploaded_by: row.get("uploaded_by")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}
