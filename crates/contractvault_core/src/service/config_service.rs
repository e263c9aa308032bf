//! Admin configuration of lookup tables.
//!
//! # Responsibility
//! - Create, list and delete contract types, tags, departments and clause
//!   playbook entries.
//!
//! # Invariants
//! - Every operation requires `AdministerConfig`.
//! - Duplicate names surface as validation errors.

use crate::model::lookup::{
    ClausePlaybookEntry, ContractType, ContractTypeId, Department, DepartmentId,
    NewContractType, NewPlaybookEntry, NewTag, PlaybookEntryId, Tag, TagId,
};
use crate::policy::Action;
use crate::repo::lookup_repo::LookupRepository;
use crate::service::{require_role_action, RequestContext, ServiceError, ServiceResult};
use log::info;
use serde::Serialize;

/// Snapshot of every lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub contract_types: Vec<ContractType>,
    pub tags: Vec<Tag>,
    pub departments: Vec<Department>,
    pub playbook: Vec<ClausePlaybookEntry>,
}

/// Configuration service facade over a lookup repository.
pub struct ConfigService<R: LookupRepository> {
    repo: R,
}

impl<R: LookupRepository> ConfigService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn overview(&self, ctx: &RequestContext) -> ServiceResult<Configuration> {
        require_admin(ctx)?;
        Ok(Configuration {
            contract_types: self.repo.list_contract_types(false)?,
            tags: self.repo.list_tags(false)?,
            departments: self.repo.list_departments()?,
            playbook: self.repo.list_playbook_entries(false)?,
        })
    }

    pub fn add_contract_type(
        &self,
        ctx: &RequestContext,
        input: &NewContractType,
    ) -> ServiceResult<ContractType> {
        require_admin(ctx)?;
        let id = self.repo.create_contract_type(input)?;
        log_created("contract_type", id);
        self.repo
            .list_contract_types(false)?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| ServiceError::not_found("contract type", id))
    }

    pub fn delete_contract_type(&self, ctx: &RequestContext, id: ContractTypeId) -> ServiceResult<()> {
        require_admin(ctx)?;
        Ok(self.repo.delete_contract_type(id)?)
    }

    /// Color must be `#RRGGBB`; a blank color falls back to the default.
    pub fn add_tag(&self, ctx: &RequestContext, input: &NewTag) -> ServiceResult<Tag> {
        require_admin(ctx)?;
        input.validate()?;
        let id = self.repo.create_tag(input)?;
        log_created("tag", id);
        self.repo
            .list_tags(false)?
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| ServiceError::not_found("tag", id))
    }

    pub fn delete_tag(&self, ctx: &RequestContext, id: TagId) -> ServiceResult<()> {
        require_admin(ctx)?;
        Ok(self.repo.delete_tag(id)?)
    }

    pub fn add_department(&self, ctx: &RequestContext, name: &str) -> ServiceResult<Department> {
        require_admin(ctx)?;
        let id = self.repo.create_department(name)?;
        log_created("department", id);
        self.repo
            .get_department(id)?
            .ok_or_else(|| ServiceError::not_found("department", id))
    }

    pub fn delete_department(&self, ctx: &RequestContext, id: DepartmentId) -> ServiceResult<()> {
        require_admin(ctx)?;
        Ok(self.repo.delete_department(id)?)
    }

    pub fn add_playbook_entry(
        &self,
        ctx: &RequestContext,
        input: &NewPlaybookEntry,
    ) -> ServiceResult<ClausePlaybookEntry> {
        require_admin(ctx)?;
        input.validate()?;
        let id = self.repo.create_playbook_entry(input, Some(ctx.actor.id))?;
        log_created("playbook_entry", id);
        self.repo
            .get_playbook_entry(id)?
            .ok_or_else(|| ServiceError::not_found("playbook entry", id))
    }

    pub fn delete_playbook_entry(
        &self,
        ctx: &RequestContext,
        id: PlaybookEntryId,
    ) -> ServiceResult<()> {
        require_admin(ctx)?;
        Ok(self.repo.delete_playbook_entry(id)?)
    }
}

fn require_admin(ctx: &RequestContext) -> ServiceResult<()> {
    require_role_action(ctx, Action::AdministerConfig)
}

fn log_created(kind: &str, id: i64) {
    info!(
        "event=config_create module=config_service status=ok kind={} id={}",
        kind, id
    );
}
