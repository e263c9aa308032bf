//! Acting user model.
//!
//! # Responsibility
//! - Describe the attributes role resolution and access checks read:
//!   superuser/staff flags, group names and department membership.
//!
//! # Invariants
//! - `username` is unique and non-blank.
//! - Group names are stored trimmed and deduplicated.

use crate::model::lookup::DepartmentId;
use crate::policy::role::{resolve_role, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type UserId = i64;

/// A registered user acting on the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub department_id: Option<DepartmentId>,
    pub groups: Vec<String>,
}

impl Principal {
    /// Resolves the contract-management role of this user.
    pub fn role(&self) -> Role {
        resolve_role(self.is_superuser, self.is_staff, &self.groups)
    }

    /// Name shown in audit metadata and CLI output.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            self.username.as_str()
        } else {
            self.display_name.as_str()
        }
    }
}

/// Input for user registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub department_id: Option<DepartmentId>,
    pub groups: Vec<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn in_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }
}

/// Trims, drops blanks and deduplicates group names.
pub fn normalize_groups(groups: &[String]) -> Vec<String> {
    groups
        .iter()
        .map(|group| group.trim())
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
