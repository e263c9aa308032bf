//! User directory use-cases.
//!
//! # Invariants
//! - The first user of an empty database may be registered without an
//!   acting user; afterwards registration requires `AdministerConfig`.
//! - Group membership changes are admin-only.

use crate::model::principal::{NewUser, Principal, UserId};
use crate::model::review::is_valid_email;
use crate::policy::Action;
use crate::repo::lookup_repo::{LookupRepository, SqliteLookupRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::{require_role_action, RequestContext, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

pub struct UserService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> UserService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Registers a user. `ctx` may be `None` only while no user exists.
    pub fn register(&self, ctx: Option<&RequestContext>, input: &NewUser) -> ServiceResult<Principal> {
        let users = SqliteUserRepository::new(self.conn);
        match ctx {
            Some(ctx) => require_role_action(ctx, Action::AdministerConfig)?,
            None if users.list_users()?.is_empty() => {}
            None => return Err(ServiceError::PermissionDenied(Action::AdministerConfig)),
        }

        let email = input.email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            return Err(ServiceError::validation(format!(
                "`{email}` is not a valid email address"
            )));
        }
        if let Some(department_id) = input.department_id {
            SqliteLookupRepository::new(self.conn)
                .get_department(department_id)?
                .ok_or_else(|| ServiceError::not_found("department", department_id))?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let id = SqliteUserRepository::new(&tx).create_user(input)?;
        tx.commit()?;

        info!(
            "event=user_register module=user_service status=ok user_id={} bootstrap={}",
            id,
            ctx.is_none()
        );
        self.get(id)
    }

    pub fn list(&self) -> ServiceResult<Vec<Principal>> {
        Ok(SqliteUserRepository::new(self.conn).list_users()?)
    }

    pub fn get(&self, id: UserId) -> ServiceResult<Principal> {
        SqliteUserRepository::new(self.conn)
            .get_user(id)?
            .ok_or_else(|| ServiceError::not_found("user", id))
    }

    /// Resolves the acting user by login name.
    pub fn resolve(&self, username: &str) -> ServiceResult<Principal> {
        SqliteUserRepository::new(self.conn)
            .find_by_username(username)?
            .ok_or_else(|| ServiceError::not_found("user", username.trim()))
    }

    pub fn set_groups(
        &self,
        ctx: &RequestContext,
        id: UserId,
        groups: &[String],
    ) -> ServiceResult<Principal> {
        require_role_action(ctx, Action::AdministerConfig)?;
        let tx = self.conn.unchecked_transaction()?;
        SqliteUserRepository::new(&tx).set_groups(id, groups)?;
        tx.commit()?;
        self.get(id)
    }
}
