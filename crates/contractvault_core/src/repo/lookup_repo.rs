//! Configuration lookup tables: departments, contract types, tags and
//! clause playbook entries.
//!
//! # Invariants
//! - Inputs are validated and normalized before insert.
//! - Deleting a lookup row nulls out contract references (schema level);
//!   tag deletes drop their contract links.

use crate::model::lookup::{
    normalize_name, ClausePlaybookEntry, ContractType, ContractTypeId, Department, DepartmentId,
    NewContractType, NewPlaybookEntry, NewTag, PlaybookEntryId, Tag, TagId,
    CONTRACT_TYPE_NAME_MAX, DEPARTMENT_NAME_MAX, PLAYBOOK_LABEL_MAX,
};
use crate::model::principal::UserId;
use crate::model::review::ClauseRiskLevel;
use crate::repo::{bool_to_int, parse_bool, parse_enum, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PLAYBOOK_SELECT_SQL: &str = "SELECT
    id,
    label,
    category,
    recommended_text,
    risk_level,
    guidance_notes,
    active,
    created_by,
    created_at,
    updated_at
FROM clause_playbook_entries";

pub trait LookupRepository {
    fn create_department(&self, name: &str) -> RepoResult<DepartmentId>;
    fn list_departments(&self) -> RepoResult<Vec<Department>>;
    fn get_department(&self, id: DepartmentId) -> RepoResult<Option<Department>>;
    fn delete_department(&self, id: DepartmentId) -> RepoResult<()>;

    fn create_contract_type(&self, input: &NewContractType) -> RepoResult<ContractTypeId>;
    fn list_contract_types(&self, active_only: bool) -> RepoResult<Vec<ContractType>>;
    fn delete_contract_type(&self, id: ContractTypeId) -> RepoResult<()>;

    fn create_tag(&self, input: &NewTag) -> RepoResult<TagId>;
    fn list_tags(&self, active_only: bool) -> RepoResult<Vec<Tag>>;
    fn delete_tag(&self, id: TagId) -> RepoResult<()>;
    /// Ids from `ids` that do not exist.
    fn missing_tags(&self, ids: &[TagId]) -> RepoResult<Vec<TagId>>;

    fn create_playbook_entry(
        &self,
        input: &NewPlaybookEntry,
        created_by: Option<UserId>,
    ) -> RepoResult<PlaybookEntryId>;
    fn list_playbook_entries(&self, active_only: bool) -> RepoResult<Vec<ClausePlaybookEntry>>;
    fn get_playbook_entry(&self, id: PlaybookEntryId) -> RepoResult<Option<ClausePlaybookEntry>>;
    fn delete_playbook_entry(&self, id: PlaybookEntryId) -> RepoResult<()>;
}

pub struct SqliteLookupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLookupRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn delete_by_id(&self, table: &'static str, entity: &'static str, id: i64) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [id])?;
        if changed == 0 {
            return Err(RepoError::not_found(entity, id));
        }
        Ok(())
    }
}

impl LookupRepository for SqliteLookupRepository<'_> {
    fn create_department(&self, name: &str) -> RepoResult<DepartmentId> {
        let name = normalize_name("department name", name, DEPARTMENT_NAME_MAX)?;
        self.conn
            .execute("INSERT INTO departments (name) VALUES (?1);", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_departments(&self) -> RepoResult<Vec<Department>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at, updated_at FROM departments ORDER BY name ASC;",
        )?;
        let departments = stmt
            .query_map([], department_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(departments)
    }

    fn get_department(&self, id: DepartmentId) -> RepoResult<Option<Department>> {
        let department = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM departments WHERE id = ?1;",
                [id],
                department_from_row,
            )
            .optional()?;
        Ok(department)
    }

    fn delete_department(&self, id: DepartmentId) -> RepoResult<()> {
        self.delete_by_id("departments", "department", id)
    }

    fn create_contract_type(&self, input: &NewContractType) -> RepoResult<ContractTypeId> {
        let name = normalize_name("contract type name", &input.name, CONTRACT_TYPE_NAME_MAX)?;
        self.conn.execute(
            "INSERT INTO contract_types (name, description, active) VALUES (?1, ?2, ?3);",
            params![name, input.description.trim(), bool_to_int(input.active)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_contract_types(&self, active_only: bool) -> RepoResult<Vec<ContractType>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, active, created_at, updated_at
             FROM contract_types
             WHERE (?1 = 0 OR active = 1)
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut types = Vec::new();
        while let Some(row) = rows.next()? {
            types.push(ContractType {
                id: row.get("id")?,
                name: row.get("name")?,
                description: row.get("description")?,
                active: parse_bool(row.get("active")?, "contract_types.active")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            });
        }
        Ok(types)
    }

    fn delete_contract_type(&self, id: ContractTypeId) -> RepoResult<()> {
        self.delete_by_id("contract_types", "contract type", id)
    }

    fn create_tag(&self, input: &NewTag) -> RepoResult<TagId> {
        let (name, color) = input.validate()?;
        self.conn.execute(
            "INSERT INTO tags (name, description, color, active) VALUES (?1, ?2, ?3, ?4);",
            params![name, input.description.trim(), color, bool_to_int(input.active)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_tags(&self, active_only: bool) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, color, active, created_at, updated_at
             FROM tags
             WHERE (?1 = 0 OR active = 1)
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(Tag {
                id: row.get("id")?,
                name: row.get("name")?,
                description: row.get("description")?,
                color: row.get("color")?,
                active: parse_bool(row.get("active")?, "tags.active")?,
                created_at: row.get("created_at")?,
                updated_at: row.get("updated_at")?,
            });
        }
        Ok(tags)
    }

    fn delete_tag(&self, id: TagId) -> RepoResult<()> {
        self.delete_by_id("tags", "tag", id)
    }

    fn missing_tags(&self, ids: &[TagId]) -> RepoResult<Vec<TagId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1);")?;
        let mut missing = Vec::new();
        for id in ids {
            let exists: i64 = stmt.query_row([id], |row| row.get(0))?;
            if exists == 0 {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    fn create_playbook_entry(
        &self,
        input: &NewPlaybookEntry,
        created_by: Option<UserId>,
    ) -> RepoResult<PlaybookEntryId> {
        input.validate()?;
        self.conn.execute(
            "INSERT INTO clause_playbook_entries (
                label,
                category,
                recommended_text,
                risk_level,
                guidance_notes,
                active,
                created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                normalize_name("playbook label", &input.label, PLAYBOOK_LABEL_MAX)?,
                input.category.trim(),
                input.recommended_text.trim(),
                input.risk_level.as_str(),
                input.guidance_notes.trim(),
                bool_to_int(input.active),
                created_by,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_playbook_entries(&self, active_only: bool) -> RepoResult<Vec<ClausePlaybookEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PLAYBOOK_SELECT_SQL}
             WHERE (?1 = 0 OR active = 1)
             ORDER BY category ASC, label ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_playbook_row(row)?);
        }
        Ok(entries)
    }

    fn get_playbook_entry(&self, id: PlaybookEntryId) -> RepoResult<Option<ClausePlaybookEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PLAYBOOK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_playbook_row(row)?)),
            None => Ok(None),
        }
    }

    fn delete_playbook_entry(&self, id: PlaybookEntryId) -> RepoResult<()> {
        self.delete_by_id("clause_playbook_entries", "playbook entry", id)
    }
}

fn department_from_row(row: &Row<'_>) -> rusqlite::Result<Department> {
    Ok(Department {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_playbook_row(row: &Row<'_>) -> RepoResult<ClausePlaybookEntry> {
    let risk_text: String = row.get("risk_level")?;
    Ok(ClausePlaybookEntry {
        id: row.get("id")?,
        label: row.get("label")?,
        category: row.get("category")?,
        recommended_text: row.get("recommended_text")?,
        risk_level: parse_enum(
            &risk_text,
            "clause_playbook_entries.risk_level",
            ClauseRiskLevel::parse,
        )?,
        guidance_notes: row.get("guidance_notes")?,
        active: parse_bool(row.get("active")?, "clause_playbook_entries.active")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{LookupRepository, SqliteLookupRepository};
    use crate::db::open_db_in_memory;
    use crate::model::lookup::{NewContractType, NewTag};
    use crate::repo::RepoError;

    #[test]
    fn invalid_input_is_a_validation_error() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteLookupRepository::new(&conn);
        let tag = NewTag {
            name: "Urgent".to_string(),
            description: String::new(),
            color: Some("red".to_string()),
            active: true,
        };
        assert!(matches!(repo.create_tag(&tag), Err(RepoError::Validation(_))));
        assert!(matches!(repo.create_department("  "), Err(RepoError::Validation(_))));
    }

    #[test]
    fn tag_color_defaults_and_unique_names_conflict() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteLookupRepository::new(&conn);
        let tag = NewTag {
            name: "Urgent".to_string(),
            description: String::new(),
            color: None,
            active: true,
        };
        repo.create_tag(&tag).unwrap();
        assert_eq!(repo.list_tags(true).unwrap()[0].color, "#6c757d");
        assert!(matches!(repo.create_tag(&tag), Err(RepoError::Conflict(_))));
    }

    #[test]
    fn inactive_types_are_filtered() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteLookupRepository::new(&conn);
        repo.create_contract_type(&NewContractType {
            name: "MSA".to_string(),
            description: String::new(),
            active: true,
        })
        .unwrap();
        repo.create_contract_type(&NewContractType {
            name: "Legacy".to_string(),
            description: String::new(),
            active: false,
        })
        .unwrap();
        assert_eq!(repo.list_contract_types(true).unwrap().len(), 1);
        assert_eq!(repo.list_contract_types(false).unwrap().len(), 2);
    }

    #[test]
    fn delete_missing_department_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteLookupRepository::new(&conn);
        assert!(matches!(
            repo.delete_department(42),
            Err(RepoError::NotFound { .. })
        ));
        let id = repo.create_department("Legal").unwrap();
        assert_eq!(repo.get_department(id).unwrap().unwrap().name, "Legal");
        assert!(repo.missing_tags(&[1, 2]).unwrap() == vec![1, 2]);
    }
}
