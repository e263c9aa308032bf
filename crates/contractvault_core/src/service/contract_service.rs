//! Contract use-case service.
//!
//! # Responsibility
//! - Create, edit, transition and delete contracts.
//! - Manage attachments, versions, shares and review records.
//! - Assemble the contract detail view.
//!
//! # Invariants
//! - Every operation loads the contract, then evaluates the permission
//!   matrix, then mutates.
//! - A mutation and its audit row commit in one transaction.
//! - Blobs written before a failed transaction are removed again; blobs of
//!   deleted rows are removed after commit.

use crate::model::approval::AdditionalApproval;
use crate::model::audit::{AuditAction, AuditLogEntry};
use crate::model::contract::{Contract, ContractId, ContractPatch, ContractStatus, NewContract};
use crate::model::document::{
    ContractFile, ContractVersion, FileId, NewContractFile, NewContractVersion,
    INITIAL_VERSION_LABEL,
};
use crate::model::review::{
    Clause, ClauseId, ClausePatch, Deviation, NewClause, NewDeviation, NewRiskItem,
    NewSignatureRecord, RiskItem, SignatureId, SignatureRecord,
};
use crate::model::lookup::{ContractTypeId, DepartmentId, TagId};
use crate::model::principal::UserId;
use crate::model::share::{AccessLevel, ContractShare, ShareId, ShareTarget};
use crate::policy::{evaluate, AccessFacts, Action, PermissionSummary};
use crate::repo::approval_repo::{ApprovalListQuery, ApprovalRepository, SqliteApprovalRepository};
use crate::repo::audit_repo::{AuditRepository, SqliteAuditRepository};
use crate::repo::contract_repo::{ContractRepository, SqliteContractRepository};
use crate::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use crate::repo::lookup_repo::{LookupRepository, SqliteLookupRepository};
use crate::repo::review_repo::{ClauseInsert, ReviewRepository, SqliteReviewRepository};
use crate::repo::share_repo::{ShareRepository, SqliteShareRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::audit_service::{record_for, DETAIL_HISTORY_LIMIT};
use crate::service::{require_role_action, RequestContext, ServiceError, ServiceResult};
use crate::storage::{preview, BlobKind, DocumentStore, FilePreview, StoredBlob};
use log::{info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Raw upload payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file: UploadedFile,
    pub is_primary: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewVersionInput {
    pub label: String,
    pub notes: String,
    pub file: Option<UploadedFile>,
}

/// Attachment bytes plus the row they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file: ContractFile,
    pub bytes: Vec<u8>,
}

/// Everything the detail page shows for one contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractDetail {
    pub contract: Contract,
    pub is_expiring_soon: bool,
    pub is_expired: bool,
    pub primary_file: Option<FilePreview>,
    pub files: Vec<ContractFile>,
    pub versions: Vec<ContractVersion>,
    pub shares: Vec<ContractShare>,
    pub approvals: Vec<AdditionalApproval>,
    pub clauses: Vec<Clause>,
    pub deviations: Vec<Deviation>,
    pub risks: Vec<RiskItem>,
    pub signatures: Vec<SignatureRecord>,
    pub audit_log: Vec<AuditLogEntry>,
    pub permissions: PermissionSummary,
}

pub struct ContractService<'a> {
    conn: &'a Connection,
    store: &'a DocumentStore,
}

impl<'a> ContractService<'a> {
    pub fn new(conn: &'a Connection, store: &'a DocumentStore) -> Self {
        Self { conn, store }
    }

    /// Creates a contract owned by `input.owner_id` or the actor.
    ///
    /// With `file` set, the upload becomes the primary attachment and the
    /// content of version 1.
    pub fn create(
        &self,
        ctx: &RequestContext,
        input: NewContract,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Contract> {
        require_role_action(ctx, Action::CreateContract)?;
        if let Some(owner_id) = input.owner_id {
            self.require_user(owner_id)?;
        }
        self.require_tags(&input.tag_ids)?;
        self.require_lookups(input.bu_team_id, input.contract_type_id)?;

        let contract = Contract::from_new(input, ctx.actor.id, ctx.now);
        contract.validate()?;

        let mut blobs = Vec::new();
        if let Some(file) = &file {
            for kind in [BlobKind::File, BlobKind::Version] {
                match self
                    .store
                    .store(contract.id, kind, &file.file_name, &file.bytes)
                {
                    Ok(blob) => blobs.push(blob),
                    Err(err) => {
                        self.discard_blobs(&blobs);
                        return Err(err.into());
                    }
                }
            }
        }

        let result = self.mutate(ctx, contract.id, AuditAction::CreateContract, |conn| {
            SqliteContractRepository::new(conn).insert_contract(&contract)?;
            let documents = SqliteDocumentRepository::new(conn);
            let mut version_path = None;
            if let [file_blob, version_blob] = blobs.as_slice() {
                documents.insert_file(
                    &new_file_row(contract.id, file_blob, true, String::new(), ctx.actor.id),
                    ctx.now,
                )?;
                version_path = Some(version_blob.relative_path.clone());
            }
            documents.insert_version(
                &NewContractVersion {
                    contract_id: contract.id,
                    label: INITIAL_VERSION_LABEL.to_string(),
                    stored_path: version_path,
                    notes: String::new(),
                    created_by: Some(ctx.actor.id),
                },
                ctx.now,
            )?;
            Ok(((), json!({"title": contract.title, "status": contract.status})))
        });
        if let Err(err) = result {
            self.discard_blobs(&blobs);
            return Err(err);
        }

        info!(
            "event=contract_create module=contract_service status=ok contract_id={} status_value={}",
            contract.id, contract.status
        );
        self.fetch(contract.id)
    }

    /// Applies a field patch. A status change is audited as CHANGE_STATUS,
    /// anything else as UPDATE_CONTRACT with the changed field names.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        patch: ContractPatch,
    ) -> ServiceResult<Contract> {
        let (mut contract, facts) = self.load(ctx, id, Action::EditContract)?;
        if patch.is_empty() {
            return Ok(contract);
        }

        let old_status = contract.status;
        if let Some(new_status) = patch.status.filter(|status| *status != old_status) {
            self.check(ctx, &facts, Action::ChangeStatus)?;
            check_transition(old_status, new_status)?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            self.require_tags(tag_ids)?;
        }
        if let Some(owner_id) = patch.owner_id {
            self.require_user(owner_id)?;
        }
        self.require_lookups(patch.bu_team_id.flatten(), patch.contract_type_id.flatten())?;

        let updated_fields = patch.apply_to(&mut contract);
        contract.updated_at = ctx.now;
        contract.validate()?;

        let (action, metadata) = if contract.status != old_status {
            (
                AuditAction::ChangeStatus,
                json!({"old_status": old_status, "new_status": contract.status}),
            )
        } else {
            (
                AuditAction::UpdateContract,
                json!({"updated_fields": updated_fields}),
            )
        };
        self.mutate(ctx, id, action, |conn| {
            SqliteContractRepository::new(conn).update_contract(&contract)?;
            Ok(((), metadata))
        })?;

        info!(
            "event=contract_update module=contract_service status=ok contract_id={} fields={}",
            id,
            updated_fields.len()
        );
        self.fetch(id)
    }

    /// Moves the contract along the status transition table.
    pub fn change_status(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        new_status: ContractStatus,
        reason: &str,
    ) -> ServiceResult<Contract> {
        let (mut contract, _) = self.load(ctx, id, Action::ChangeStatus)?;
        let old_status = contract.status;
        check_transition(old_status, new_status)?;

        contract.status = new_status;
        contract.updated_at = ctx.now;
        self.mutate(ctx, id, AuditAction::ChangeStatus, |conn| {
            SqliteContractRepository::new(conn).update_contract(&contract)?;
            Ok((
                (),
                json!({
                    "old_status": old_status,
                    "new_status": new_status,
                    "reason": reason.trim(),
                }),
            ))
        })?;

        info!(
            "event=contract_status module=contract_service status=ok contract_id={} from={} to={}",
            id, old_status, new_status
        );
        Ok(contract)
    }

    /// Deletes the contract and its dependent rows. The audit row outlives
    /// it with a null contract reference.
    pub fn delete(&self, ctx: &RequestContext, id: ContractId) -> ServiceResult<()> {
        let (contract, _) = self.load(ctx, id, Action::DeleteContract)?;
        let metadata = json!({
            "contract_id": contract.id,
            "contract_number": contract.contract_number,
            "title": contract.title,
        });

        // The audit row goes first; the cascade then nulls its contract_id.
        let tx = self.conn.unchecked_transaction()?;
        record_for(&tx, ctx, Some(id), AuditAction::DeleteContract, metadata)?;
        SqliteContractRepository::new(&tx).delete_contract(id)?;
        tx.commit()?;

        if let Err(err) = self.store.remove_contract(id) {
            warn!(
                "event=contract_delete module=contract_service status=error stage=blob_cleanup contract_id={} error={}",
                id, err
            );
        }
        info!(
            "event=contract_delete module=contract_service status=ok contract_id={}",
            id
        );
        Ok(())
    }

    /// Loads the detail view and records a VIEW entry.
    pub fn view(&self, ctx: &RequestContext, id: ContractId) -> ServiceResult<ContractDetail> {
        let (contract, facts) = self.load(ctx, id, Action::ViewContract)?;
        record_for(self.conn, ctx, Some(id), AuditAction::View, json!({}))?;

        let documents = SqliteDocumentRepository::new(self.conn);
        let review = SqliteReviewRepository::new(self.conn);
        let today = ctx.today();
        let files = documents.list_files(id)?;
        let primary_file = files
            .iter()
            .find(|file| file.is_primary)
            .or_else(|| files.first())
            .map(preview);

        Ok(ContractDetail {
            is_expiring_soon: contract.is_expiring_soon(today),
            is_expired: contract.is_expired(today),
            primary_file,
            files,
            versions: documents.list_versions(id)?,
            shares: SqliteShareRepository::new(self.conn).list_shares(id)?,
            approvals: SqliteApprovalRepository::new(self.conn).list_approvals(
                &ApprovalListQuery {
                    contract_id: Some(id),
                    ..ApprovalListQuery::default()
                },
            )?,
            clauses: review.list_clauses(id)?,
            deviations: review.list_deviations(id)?,
            risks: review.list_risks(id)?,
            signatures: review.list_signatures(id)?,
            audit_log: SqliteAuditRepository::new(self.conn)
                .list_for_contract(id, DETAIL_HISTORY_LIMIT)?,
            permissions: PermissionSummary::build(ctx.role(), Some(&facts)),
            contract,
        })
    }

    /// Role flags, plus per-contract flags when `id` is given.
    pub fn permissions(
        &self,
        ctx: &RequestContext,
        id: Option<ContractId>,
    ) -> ServiceResult<PermissionSummary> {
        let facts = match id {
            Some(id) => {
                let contracts = SqliteContractRepository::new(self.conn);
                let contract = contracts
                    .get_contract(id)?
                    .ok_or_else(|| ServiceError::not_found("contract", id))?;
                Some(contracts.access_facts(&contract, &ctx.actor)?)
            }
            None => None,
        };
        Ok(PermissionSummary::build(ctx.role(), facts.as_ref()))
    }

    pub fn upload_file(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        upload: FileUpload,
    ) -> ServiceResult<ContractFile> {
        self.load(ctx, id, Action::UploadFile)?;
        let blob = self
            .store
            .store(id, BlobKind::File, &upload.file.file_name, &upload.file.bytes)?;

        let result = self.mutate(ctx, id, AuditAction::AddFile, |conn| {
            let file_id = SqliteDocumentRepository::new(conn).insert_file(
                &new_file_row(
                    id,
                    &blob,
                    upload.is_primary,
                    upload.description.trim().to_string(),
                    ctx.actor.id,
                ),
                ctx.now,
            )?;
            Ok((
                file_id,
                json!({"filename": blob.file_name, "is_primary": upload.is_primary}),
            ))
        });
        let file_id = match result {
            Ok(file_id) => file_id,
            Err(err) => {
                self.discard_blobs(std::slice::from_ref(&blob));
                return Err(err);
            }
        };

        SqliteDocumentRepository::new(self.conn)
            .get_file(id, file_id)?
            .ok_or_else(|| ServiceError::not_found("file", file_id))
    }

    pub fn download_file(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        file_id: FileId,
    ) -> ServiceResult<DownloadedFile> {
        self.load(ctx, id, Action::ViewContract)?;
        let file = SqliteDocumentRepository::new(self.conn)
            .get_file(id, file_id)?
            .ok_or_else(|| ServiceError::not_found("file", file_id))?;
        let bytes = self.store.read(&file.stored_path)?;
        record_for(
            self.conn,
            ctx,
            Some(id),
            AuditAction::Download,
            json!({"filename": file.original_filename}),
        )?;
        Ok(DownloadedFile { file, bytes })
    }

    pub fn remove_file(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        file_id: FileId,
    ) -> ServiceResult<()> {
        self.load(ctx, id, Action::UploadFile)?;
        let file = SqliteDocumentRepository::new(self.conn)
            .get_file(id, file_id)?
            .ok_or_else(|| ServiceError::not_found("file", file_id))?;

        self.mutate(ctx, id, AuditAction::RemoveFile, |conn| {
            SqliteDocumentRepository::new(conn).delete_file(id, file_id)?;
            Ok(((), json!({"filename": file.original_filename})))
        })?;
        if let Err(err) = self.store.remove(&file.stored_path) {
            warn!(
                "event=file_remove module=contract_service status=error stage=blob_cleanup file_id={} error={}",
                file_id, err
            );
        }
        Ok(())
    }

    /// Adds the next numbered version, optionally with its own document.
    pub fn add_version(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        input: NewVersionInput,
    ) -> ServiceResult<ContractVersion> {
        self.load(ctx, id, Action::AddVersion)?;
        let blob = match &input.file {
            Some(file) => Some(
                self.store
                    .store(id, BlobKind::Version, &file.file_name, &file.bytes)?,
            ),
            None => None,
        };

        let label = input.label.trim().to_string();
        let result = self.mutate(ctx, id, AuditAction::AddVersion, |conn| {
            let (version_id, number) = SqliteDocumentRepository::new(conn).insert_version(
                &NewContractVersion {
                    contract_id: id,
                    label: label.clone(),
                    stored_path: blob.as_ref().map(|blob| blob.relative_path.clone()),
                    notes: input.notes.trim().to_string(),
                    created_by: Some(ctx.actor.id),
                },
                ctx.now,
            )?;
            Ok((
                version_id,
                json!({"version_number": number, "label": label}),
            ))
        });
        let version_id = match result {
            Ok(version_id) => version_id,
            Err(err) => {
                self.discard_blobs(blob.as_slice());
                return Err(err);
            }
        };

        SqliteDocumentRepository::new(self.conn)
            .list_versions(id)?
            .into_iter()
            .find(|version| version.id == version_id)
            .ok_or_else(|| ServiceError::not_found("version", version_id))
    }

    pub fn share(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        target: ShareTarget,
        access_level: AccessLevel,
    ) -> ServiceResult<ContractShare> {
        self.load(ctx, id, Action::ShareContract)?;
        match target {
            ShareTarget::User(user_id) => self.require_user(user_id)?,
            ShareTarget::Department(department_id) => {
                SqliteLookupRepository::new(self.conn)
                    .get_department(department_id)?
                    .ok_or_else(|| ServiceError::not_found("department", department_id))?;
            }
        }

        let share_id = self.mutate(ctx, id, AuditAction::Share, |conn| {
            let share_id = SqliteShareRepository::new(conn).insert_share(
                id,
                target,
                access_level,
                Some(ctx.actor.id),
                ctx.now,
            )?;
            Ok((
                share_id,
                json!({
                    "shared_with_user": target.user_id(),
                    "shared_with_department": target.department_id(),
                    "access_level": access_level,
                }),
            ))
        })?;

        SqliteShareRepository::new(self.conn)
            .get_share(id, share_id)?
            .ok_or_else(|| ServiceError::not_found("share", share_id))
    }

    pub fn unshare(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        share_id: ShareId,
    ) -> ServiceResult<()> {
        self.load(ctx, id, Action::ShareContract)?;
        let share = SqliteShareRepository::new(self.conn)
            .get_share(id, share_id)?
            .ok_or_else(|| ServiceError::not_found("share", share_id))?;

        self.mutate(ctx, id, AuditAction::Unshare, |conn| {
            SqliteShareRepository::new(conn).delete_share(id, share_id)?;
            Ok((
                (),
                json!({
                    "shared_with_user": share.target.user_id(),
                    "shared_with_department": share.target.department_id(),
                }),
            ))
        })
    }

    /// Adds a clause. With a playbook entry, blank label and text are taken
    /// from the entry.
    pub fn add_clause(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        mut input: NewClause,
    ) -> ServiceResult<Clause> {
        self.load(ctx, id, Action::ManageClauses)?;
        if let Some(entry_id) = input.playbook_entry_id {
            let entry = SqliteLookupRepository::new(self.conn)
                .get_playbook_entry(entry_id)?
                .ok_or_else(|| ServiceError::not_found("playbook entry", entry_id))?;
            if input.label.trim().is_empty() {
                input.label = entry.label;
            }
            if input.text.trim().is_empty() {
                input.text = entry.recommended_text;
            }
        }
        input.validate()?;

        let clause_id = self.mutate(ctx, id, AuditAction::AddClause, |conn| {
            let clause_id = SqliteReviewRepository::new(conn).insert_clause(
                id,
                &ClauseInsert {
                    label: input.label.trim(),
                    text: input.text.trim(),
                    risk_level: input.risk_level,
                    playbook_entry_id: input.playbook_entry_id,
                },
                Some(ctx.actor.id),
                ctx.now,
            )?;
            Ok((
                clause_id,
                json!({
                    "clause_id": clause_id,
                    "label": input.label.trim(),
                    "from_playbook": input.playbook_entry_id.is_some(),
                }),
            ))
        })?;
        self.fetch_clause(id, clause_id)
    }

    pub fn update_clause(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        clause_id: ClauseId,
        patch: ClausePatch,
    ) -> ServiceResult<Clause> {
        self.load(ctx, id, Action::ManageClauses)?;
        let clause = self.fetch_clause(id, clause_id)?;
        patch.validate()?;
        let updated_fields = patch.updated_fields();
        if updated_fields.is_empty() {
            return Ok(clause);
        }

        self.mutate(ctx, id, AuditAction::UpdateClause, |conn| {
            SqliteReviewRepository::new(conn).update_clause(id, clause_id, &patch, ctx.now)?;
            Ok((
                (),
                json!({"clause_id": clause_id, "updated_fields": updated_fields}),
            ))
        })?;
        self.fetch_clause(id, clause_id)
    }

    pub fn add_deviation(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        input: NewDeviation,
    ) -> ServiceResult<Deviation> {
        self.load(ctx, id, Action::ManageDeviations)?;
        input.validate()?;

        let deviation_id = self.mutate(ctx, id, AuditAction::AddDeviation, |conn| {
            let deviation_id = SqliteReviewRepository::new(conn).insert_deviation(
                id,
                &input,
                Some(ctx.actor.id),
                ctx.now,
            )?;
            Ok((
                deviation_id,
                json!({
                    "deviation_id": deviation_id,
                    "clause_id": input.clause_id,
                    "risk_level": input.risk_level,
                }),
            ))
        })?;

        SqliteReviewRepository::new(self.conn)
            .list_deviations(id)?
            .into_iter()
            .find(|deviation| deviation.id == deviation_id)
            .ok_or_else(|| ServiceError::not_found("deviation", deviation_id))
    }

    pub fn add_risk(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        input: NewRiskItem,
    ) -> ServiceResult<RiskItem> {
        self.load(ctx, id, Action::ManageRisks)?;
        input.validate()?;

        let risk_id = self.mutate(ctx, id, AuditAction::AddRisk, |conn| {
            let risk_id =
                SqliteReviewRepository::new(conn).insert_risk(id, &input, Some(ctx.actor.id), ctx.now)?;
            Ok((
                risk_id,
                json!({"risk_id": risk_id, "severity": input.severity}),
            ))
        })?;

        SqliteReviewRepository::new(self.conn)
            .list_risks(id)?
            .into_iter()
            .find(|risk| risk.id == risk_id)
            .ok_or_else(|| ServiceError::not_found("risk", risk_id))
    }

    pub fn add_signature(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        input: NewSignatureRecord,
    ) -> ServiceResult<SignatureRecord> {
        self.load(ctx, id, Action::ManageSignatures)?;
        input.validate()?;

        let signature_id = self.mutate(ctx, id, AuditAction::AddSignature, |conn| {
            let signature_id =
                SqliteReviewRepository::new(conn).insert_signature(id, &input, ctx.now)?;
            Ok((
                signature_id,
                json!({
                    "signature_id": signature_id,
                    "party": input.party,
                    "sign_type": input.sign_type,
                }),
            ))
        })?;
        self.fetch_signature(id, signature_id)
    }

    /// Marks a signature record signed at the request instant.
    pub fn mark_signed(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        signature_id: SignatureId,
        reference: &str,
    ) -> ServiceResult<SignatureRecord> {
        self.load(ctx, id, Action::ManageSignatures)?;
        let signature = self.fetch_signature(id, signature_id)?;

        self.mutate(ctx, id, AuditAction::Sign, |conn| {
            SqliteReviewRepository::new(conn).mark_signed(
                id,
                signature_id,
                reference.trim(),
                ctx.now,
            )?;
            Ok((
                (),
                json!({"signature_id": signature_id, "party": signature.party}),
            ))
        })?;
        self.fetch_signature(id, signature_id)
    }

    /// Loads the contract and rejects the request unless `action` is
    /// allowed on it.
    fn load(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        action: Action,
    ) -> ServiceResult<(Contract, AccessFacts)> {
        let contracts = SqliteContractRepository::new(self.conn);
        let contract = contracts
            .get_contract(id)?
            .ok_or_else(|| ServiceError::not_found("contract", id))?;
        let facts = contracts.access_facts(&contract, &ctx.actor)?;
        self.check(ctx, &facts, action)?;
        Ok((contract, facts))
    }

    fn check(&self, ctx: &RequestContext, facts: &AccessFacts, action: Action) -> ServiceResult<()> {
        if evaluate(ctx.role(), action, facts) {
            return Ok(());
        }
        warn!(
            "event=permission_denied module=contract_service status=error action={} user_id={}",
            action, ctx.actor.id
        );
        Err(ServiceError::PermissionDenied(action))
    }

    /// Runs `op` and appends its audit row inside one transaction.
    fn mutate<T>(
        &self,
        ctx: &RequestContext,
        id: ContractId,
        action: AuditAction,
        op: impl FnOnce(&Connection) -> ServiceResult<(T, Value)>,
    ) -> ServiceResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let conn: &Connection = &tx;
        let (value, metadata) = op(conn)?;
        record_for(conn, ctx, Some(id), action, metadata)?;
        tx.commit()?;
        Ok(value)
    }

    fn fetch(&self, id: ContractId) -> ServiceResult<Contract> {
        SqliteContractRepository::new(self.conn)
            .get_contract(id)?
            .ok_or_else(|| ServiceError::not_found("contract", id))
    }

    fn fetch_clause(&self, id: ContractId, clause_id: ClauseId) -> ServiceResult<Clause> {
        SqliteReviewRepository::new(self.conn)
            .get_clause(id, clause_id)?
            .ok_or_else(|| ServiceError::not_found("clause", clause_id))
    }

    fn fetch_signature(
        &self,
        id: ContractId,
        signature_id: SignatureId,
    ) -> ServiceResult<SignatureRecord> {
        SqliteReviewRepository::new(self.conn)
            .get_signature(id, signature_id)?
            .ok_or_else(|| ServiceError::not_found("signature", signature_id))
    }

    fn require_user(&self, user_id: UserId) -> ServiceResult<()> {
        if SqliteUserRepository::new(self.conn).user_exists(user_id)? {
            Ok(())
        } else {
            Err(ServiceError::not_found("user", user_id))
        }
    }

    fn require_tags(&self, tag_ids: &[TagId]) -> ServiceResult<()> {
        let missing = SqliteLookupRepository::new(self.conn).missing_tags(tag_ids)?;
        match missing.first() {
            None => Ok(()),
            Some(tag_id) => Err(ServiceError::not_found("tag", tag_id)),
        }
    }

    fn require_lookups(
        &self,
        department_id: Option<DepartmentId>,
        contract_type_id: Option<ContractTypeId>,
    ) -> ServiceResult<()> {
        let lookups = SqliteLookupRepository::new(self.conn);
        if let Some(department_id) = department_id {
            lookups
                .get_department(department_id)?
                .ok_or_else(|| ServiceError::not_found("department", department_id))?;
        }
        if let Some(contract_type_id) = contract_type_id {
            if !lookups
                .list_contract_types(false)?
                .iter()
                .any(|item| item.id == contract_type_id)
            {
                return Err(ServiceError::not_found("contract type", contract_type_id));
            }
        }
        Ok(())
    }

    fn discard_blobs(&self, blobs: &[StoredBlob]) {
        for blob in blobs {
            if let Err(err) = self.store.remove(&blob.relative_path) {
                warn!(
                    "event=blob_discard module=contract_service status=error error={}",
                    err
                );
            }
        }
    }
}

/// Rejects moves outside the status transition table.
pub fn check_transition(from: ContractStatus, to: ContractStatus) -> ServiceResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition { from, to })
    }
}

fn new_file_row(
    contract_id: ContractId,
    blob: &StoredBlob,
    is_primary: bool,
    description: String,
    uploaded_by: UserId,
) -> NewContractFile {
    NewContractFile {
        contract_id,
        stored_path: blob.relative_path.clone(),
        original_filename: blob.file_name.clone(),
        file_size: blob.size,
        mime_type: blob.mime_type.clone(),
        is_primary,
        description,
        uploaded_by: Some(uploaded_by),
    }
}

#[cfg(test)]
mod tests {
    use super::check_transition;
    use crate::model::contract::ContractStatus;

    #[test]
    fn transition_table_is_enforced() {
        assert!(check_transition(ContractStatus::Draft, ContractStatus::Pending).is_ok());
        let err = check_transition(ContractStatus::Draft, ContractStatus::Archived).unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
    }
}
