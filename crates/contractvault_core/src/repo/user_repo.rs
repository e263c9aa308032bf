//! User and group membership persistence.
//!
//! # Invariants
//! - Group names are normalized before they are written.
//! - A principal is always returned with its full group list.

use crate::model::principal::{normalize_groups, NewUser, Principal, UserId};
use crate::repo::{bool_to_int, parse_bool, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    display_name,
    is_superuser,
    is_staff,
    department_id
FROM users";

pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<Principal>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<Principal>>;
    fn list_users(&self) -> RepoResult<Vec<Principal>>;
    /// Replaces the whole group set of one user.
    fn set_groups(&self, id: UserId, groups: &[String]) -> RepoResult<()>;
    fn user_exists(&self, id: UserId) -> RepoResult<bool>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_groups(&self, id: UserId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_name FROM user_groups WHERE user_id = ?1 ORDER BY group_name ASC;",
        )?;
        let groups = stmt
            .query_map([id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn write_groups(&self, id: UserId, groups: &[String]) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM user_groups WHERE user_id = ?1;", [id])?;
        for group in normalize_groups(groups) {
            self.conn.execute(
                "INSERT INTO user_groups (user_id, group_name) VALUES (?1, ?2);",
                params![id, group],
            )?;
        }
        Ok(())
    }

    fn with_groups(&self, user: Option<Principal>) -> RepoResult<Option<Principal>> {
        match user {
            Some(mut user) => {
                user.groups = self.load_groups(user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId> {
        let username = user.username.trim();
        if username.is_empty() {
            return Err(RepoError::InvalidData("username must not be blank".to_string()));
        }

        self.conn.execute(
            "INSERT INTO users (
                username,
                email,
                display_name,
                is_superuser,
                is_staff,
                department_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                username,
                user.email.trim(),
                user.display_name.trim(),
                bool_to_int(user.is_superuser),
                bool_to_int(user.is_staff),
                user.department_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.write_groups(id, &user.groups)?;
        Ok(id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<Principal>> {
        let user = self
            .conn
            .query_row(&format!("{USER_SELECT_SQL} WHERE id = ?1;"), [id], |row| {
                Ok(parse_user_row(row))
            })
            .optional()?
            .transpose()?;
        self.with_groups(user)
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<Principal>> {
        let user = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE username = ?1;"),
                [username.trim()],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?
            .transpose()?;
        self.with_groups(user)
    }

    fn list_users(&self) -> RepoResult<Vec<Principal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY username ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            let mut user = parse_user_row(row)?;
            user.groups = self.load_groups(user.id)?;
            users.push(user);
        }
        Ok(users)
    }

    fn set_groups(&self, id: UserId, groups: &[String]) -> RepoResult<()> {
        if !self.user_exists(id)? {
            return Err(RepoError::not_found("user", id));
        }
        self.write_groups(id, groups)
    }

    fn user_exists(&self, id: UserId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<Principal> {
    Ok(Principal {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        is_superuser: parse_bool(row.get("is_superuser")?, "users.is_superuser")?,
        is_staff: parse_bool(row.get("is_staff")?, "users.is_staff")?,
        department_id: row.get("department_id")?,
        groups: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::{SqliteUserRepository, UserRepository};
    use crate::db::open_db_in_memory;
    use crate::model::principal::NewUser;
    use crate::policy::Role;
    use crate::repo::RepoError;

    #[test]
    fn create_and_find_user_with_groups() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteUserRepository::new(&conn);
        let id = repo
            .create_user(&NewUser::new("alice").in_group(" legal_user ").in_group("legal_user"))
            .unwrap();

        let alice = repo.find_by_username("alice").unwrap().unwrap();
        assert_eq!(alice.id, id);
        assert_eq!(alice.groups, vec!["legal_user".to_string()]);
        assert_eq!(alice.role(), Role::LegalUser);
        assert!(repo.get_user(id + 100).unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteUserRepository::new(&conn);
        repo.create_user(&NewUser::new("bob")).unwrap();
        let err = repo.create_user(&NewUser::new("bob")).unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    #[test]
    fn set_groups_replaces_membership() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteUserRepository::new(&conn);
        let id = repo.create_user(&NewUser::new("carol").in_group("legal_user")).unwrap();
        repo.set_groups(id, &["Finance Viewer".to_string()]).unwrap();
        let carol = repo.get_user(id).unwrap().unwrap();
        assert_eq!(carol.role(), Role::FinanceViewer);
        assert!(matches!(
            repo.set_groups(999, &[]),
            Err(RepoError::NotFound { .. })
        ));
    }
}
