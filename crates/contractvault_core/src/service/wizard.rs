//! Multi-step contract creation wizard.
//!
//! # Responsibility
//! - Hold the answers gathered so far as a serializable session value.
//! - Validate each step and compute the next/previous step.
//! - Turn the session into a DRAFT (save) or PENDING (finish) contract.
//!
//! # Invariants
//! - Answers are accepted only for the current step.
//! - The `template` method never visits the upload step, in either
//!   direction.
//! - A staged upload must be handed back with the same file name when the
//!   contract is created.

use crate::model::contract::{
    validate_dates, validate_title, Category, Contract, ContractStatus, NewContract,
    COUNTERPARTY_MAX_CHARS,
};
use crate::model::lookup::{ContractTypeId, DepartmentId, TagId};
use crate::model::principal::UserId;
use crate::policy::Action;
use crate::service::contract_service::{ContractService, UploadedFile};
use crate::service::{require_role_action, RequestContext, ServiceError, ServiceResult};
use crate::storage::{extension_of, sanitize_file_name, DocumentStore};
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Title used when a draft is saved before the name step.
pub const UNTITLED_CONTRACT: &str = "Untitled Contract";

pub const NAME_SUGGESTIONS: &[&str] = &[
    "Service Agreement - [Company Name]",
    "NDA - [Party Name] - [Date]",
    "Master Services Agreement",
    "Software License Agreement",
    "Vendor Agreement - [Vendor Name]",
    "Employment Contract - [Employee Name]",
];

pub const WIZARD_CURRENCIES: &[&str] = &["INR", "USD", "EUR", "GBP", "AED", "SGD"];

/// Document formats accepted by the upload step.
pub const WIZARD_UPLOAD_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xlsx", "xls"];

db_enum! {
    pub enum WizardStep {
        Method => "method",
        Upload => "upload",
        Name => "name",
        Basic => "basic",
        Party => "party",
        Dates => "dates",
        Value => "value",
        OwnerTags => "owner_tags",
    }
}

db_enum! {
    pub enum CreationMethod {
        Upload => "upload",
        Template => "template",
    }
}

impl WizardStep {
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|step| *step == self)
            .unwrap_or_default()
    }

    /// Step after `self`; `None` after the last step.
    pub fn next(self, method: Option<CreationMethod>) -> Option<Self> {
        let next = *Self::ALL.get(self.index() + 1)?;
        if next == Self::Upload && method == Some(CreationMethod::Template) {
            return Some(Self::Name);
        }
        Some(next)
    }

    /// Step before `self`; the first step is its own predecessor.
    pub fn previous(self, method: Option<CreationMethod>) -> Self {
        let Some(index) = self.index().checked_sub(1) else {
            return Self::Method;
        };
        let previous = Self::ALL[index];
        if previous == Self::Upload && method == Some(CreationMethod::Template) {
            return Self::Method;
        }
        previous
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodAnswer {
    pub method: CreationMethod,
}

/// Metadata of the document picked in the upload step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAnswer {
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAnswer {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAnswer {
    #[serde(default)]
    pub org_entity: String,
    #[serde(default)]
    pub region_country: String,
    #[serde(default)]
    pub bu_team_id: Option<DepartmentId>,
    pub category: Category,
    #[serde(default)]
    pub sub_category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAnswer {
    pub customer_or_vendor_name: String,
    #[serde(default)]
    pub customer_or_vendor_address: String,
    #[serde(default)]
    pub contract_type_id: Option<ContractTypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatesAnswer {
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub auto_renewal: bool,
    #[serde(default)]
    pub renewal_notice_date: Option<NaiveDate>,
}

/// Amount is kept as entered; it is parsed when the step is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueAnswer {
    #[serde(default)]
    pub value_amount: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub opportunity_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerTagsAnswer {
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub is_confidential: bool,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

/// One submitted step, tagged with the step it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepAnswer {
    Method(MethodAnswer),
    Upload(UploadAnswer),
    Name(NameAnswer),
    Basic(BasicAnswer),
    Party(PartyAnswer),
    Dates(DatesAnswer),
    Value(ValueAnswer),
    OwnerTags(OwnerTagsAnswer),
}

impl StepAnswer {
    pub fn step(&self) -> WizardStep {
        match self {
            Self::Method(_) => WizardStep::Method,
            Self::Upload(_) => WizardStep::Upload,
            Self::Name(_) => WizardStep::Name,
            Self::Basic(_) => WizardStep::Basic,
            Self::Party(_) => WizardStep::Party,
            Self::Dates(_) => WizardStep::Dates,
            Self::Value(_) => WizardStep::Value,
            Self::OwnerTags(_) => WizardStep::OwnerTags,
        }
    }
}

/// Where the wizard stands after a submitted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "step", rename_all = "snake_case")]
pub enum WizardProgress {
    Next(WizardStep),
    Complete,
}

/// Session value carried between wizard requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardState {
    pub step: WizardStep,
    pub complete: bool,
    pub method: Option<MethodAnswer>,
    pub upload: Option<UploadAnswer>,
    pub name: Option<NameAnswer>,
    pub basic: Option<BasicAnswer>,
    pub party: Option<PartyAnswer>,
    pub dates: Option<DatesAnswer>,
    pub value: Option<ValueAnswer>,
    pub owner_tags: Option<OwnerTagsAnswer>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: WizardStep::Method,
            complete: false,
            method: None,
            upload: None,
            name: None,
            basic: None,
            party: None,
            dates: None,
            value: None,
            owner_tags: None,
        }
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    fn chosen_method(&self) -> Option<CreationMethod> {
        self.method.as_ref().map(|answer| answer.method)
    }

    /// Validates `answer` for the current step, stores it and advances.
    pub fn submit(
        &mut self,
        answer: StepAnswer,
        max_upload_bytes: u64,
    ) -> ServiceResult<WizardProgress> {
        if self.complete {
            return Err(ServiceError::validation("the wizard is already complete"));
        }
        if answer.step() != self.step {
            return Err(ServiceError::validation(format!(
                "expected an answer for step `{}`, got `{}`",
                self.step,
                answer.step()
            )));
        }
        validate_answer(&answer, max_upload_bytes)?;

        match answer {
            StepAnswer::Method(answer) => {
                if answer.method == CreationMethod::Template {
                    self.upload = None;
                }
                self.method = Some(answer);
            }
            StepAnswer::Upload(answer) => self.upload = Some(answer),
            StepAnswer::Name(answer) => self.name = Some(answer),
            StepAnswer::Basic(answer) => self.basic = Some(answer),
            StepAnswer::Party(answer) => self.party = Some(answer),
            StepAnswer::Dates(answer) => self.dates = Some(answer),
            StepAnswer::Value(answer) => self.value = Some(answer),
            StepAnswer::OwnerTags(answer) => self.owner_tags = Some(answer),
        }

        match self.step.next(self.chosen_method()) {
            Some(next) => {
                self.step = next;
                Ok(WizardProgress::Next(next))
            }
            None => {
                self.complete = true;
                Ok(WizardProgress::Complete)
            }
        }
    }

    /// Moves one step back and returns the new current step.
    pub fn back(&mut self) -> WizardStep {
        self.complete = false;
        self.step = self.step.previous(self.chosen_method());
        self.step
    }

    /// Creation input from the answers so far; unanswered steps use
    /// defaults.
    pub fn to_new_contract(&self, status: ContractStatus) -> ServiceResult<NewContract> {
        let mut input = NewContract {
            title: UNTITLED_CONTRACT.to_string(),
            status,
            ..NewContract::default()
        };
        if let Some(name) = &self.name {
            input.title = name.title.trim().to_string();
        }
        if let Some(basic) = &self.basic {
            input.org_entity = basic.org_entity.trim().to_string();
            input.region_country = basic.region_country.trim().to_string();
            input.bu_team_id = basic.bu_team_id;
            input.category = basic.category;
            input.sub_category = basic.sub_category.trim().to_string();
        }
        if let Some(party) = &self.party {
            input.customer_or_vendor_name = party.customer_or_vendor_name.trim().to_string();
            input.customer_or_vendor_address = party.customer_or_vendor_address.trim().to_string();
            input.contract_type_id = party.contract_type_id;
        }
        if let Some(dates) = &self.dates {
            input.effective_date = dates.effective_date;
            input.end_date = dates.end_date;
            input.auto_renewal = dates.auto_renewal;
            input.renewal_notice_date = dates.renewal_notice_date;
        }
        if let Some(value) = &self.value {
            input.value_amount = parse_amount(value.value_amount.as_deref())?;
            input.currency = value.currency.trim().to_ascii_uppercase();
            input.opportunity_id = value.opportunity_id.trim().to_string();
        }
        if let Some(owner_tags) = &self.owner_tags {
            input.owner_id = owner_tags.owner_id;
            input.is_confidential = owner_tags.is_confidential;
            input.tag_ids = owner_tags.tag_ids.clone();
        }
        Ok(input)
    }
}

fn validate_answer(answer: &StepAnswer, max_upload_bytes: u64) -> ServiceResult<()> {
    match answer {
        StepAnswer::Method(_) | StepAnswer::Basic(_) | StepAnswer::OwnerTags(_) => Ok(()),
        StepAnswer::Upload(upload) => {
            let name = sanitize_file_name(&upload.file_name)?;
            let extension = extension_of(&name);
            if !WIZARD_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
                return Err(ServiceError::validation(format!(
                    "unsupported document format `{extension}`; use PDF, DOC, DOCX, XLSX or XLS"
                )));
            }
            if upload.size == 0 {
                return Err(ServiceError::validation("uploaded file is empty"));
            }
            if upload.size > max_upload_bytes {
                return Err(ServiceError::validation(format!(
                    "file size must be under {} MB",
                    max_upload_bytes / (1024 * 1024)
                )));
            }
            Ok(())
        }
        StepAnswer::Name(name) => Ok(validate_title(&name.title)?),
        StepAnswer::Party(party) => {
            let name = party.customer_or_vendor_name.trim();
            if name.is_empty() {
                return Err(ServiceError::validation(
                    "customer or vendor name is required",
                ));
            }
            if name.chars().count() > COUNTERPARTY_MAX_CHARS {
                return Err(ServiceError::validation(format!(
                    "customer or vendor name must be at most {COUNTERPARTY_MAX_CHARS} characters"
                )));
            }
            Ok(())
        }
        StepAnswer::Dates(dates) => {
            if dates.effective_date.is_none() {
                return Err(ServiceError::validation("effective date is required"));
            }
            Ok(validate_dates(
                dates.effective_date,
                dates.end_date,
                dates.renewal_notice_date,
            )?)
        }
        StepAnswer::Value(value) => {
            let currency = value.currency.trim().to_ascii_uppercase();
            if !WIZARD_CURRENCIES.contains(&currency.as_str()) {
                return Err(ServiceError::validation(format!(
                    "unsupported currency `{}`",
                    value.currency.trim()
                )));
            }
            parse_amount(value.value_amount.as_deref())?;
            Ok(())
        }
    }
}

/// Blank means "no value"; otherwise a non-negative decimal.
fn parse_amount(value: Option<&str>) -> ServiceResult<Option<Decimal>> {
    let Some(text) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    let amount = Decimal::from_str(text)
        .map_err(|_| ServiceError::validation(format!("`{text}` is not a valid amount")))?;
    if amount.is_sign_negative() {
        return Err(ServiceError::validation("contract value must not be negative"));
    }
    Ok(Some(amount.round_dp(2)))
}

/// Wizard entry points bound to one database and document store.
pub struct WizardService<'a> {
    conn: &'a Connection,
    store: &'a DocumentStore,
}

impl<'a> WizardService<'a> {
    pub fn new(conn: &'a Connection, store: &'a DocumentStore) -> Self {
        Self { conn, store }
    }

    /// Fresh session; fails for actors who cannot create contracts.
    pub fn start(&self, ctx: &RequestContext) -> ServiceResult<WizardState> {
        require_role_action(ctx, Action::CreateContract)?;
        Ok(WizardState::new())
    }

    pub fn submit(
        &self,
        ctx: &RequestContext,
        state: &mut WizardState,
        answer: StepAnswer,
    ) -> ServiceResult<WizardProgress> {
        require_role_action(ctx, Action::CreateContract)?;
        state.submit(answer, self.store.max_upload_bytes())
    }

    /// Creates a DRAFT from whatever has been answered.
    pub fn save_draft(
        &self,
        ctx: &RequestContext,
        state: &WizardState,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Contract> {
        self.create(ctx, state, ContractStatus::Draft, file)
    }

    /// Creates a PENDING contract from a completed session.
    pub fn finish(
        &self,
        ctx: &RequestContext,
        state: &WizardState,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Contract> {
        if !state.complete {
            return Err(ServiceError::validation(format!(
                "the wizard is not complete; current step is `{}`",
                state.step
            )));
        }
        self.create(ctx, state, ContractStatus::Pending, file)
    }

    fn create(
        &self,
        ctx: &RequestContext,
        state: &WizardState,
        status: ContractStatus,
        file: Option<UploadedFile>,
    ) -> ServiceResult<Contract> {
        require_role_action(ctx, Action::CreateContract)?;
        match (&state.upload, &file) {
            (Some(staged), Some(file)) if staged.file_name == file.file_name => {}
            (Some(staged), Some(file)) => {
                return Err(ServiceError::validation(format!(
                    "uploaded file `{}` does not match the staged `{}`",
                    file.file_name, staged.file_name
                )));
            }
            (Some(staged), None) => {
                return Err(ServiceError::validation(format!(
                    "staged file `{}` was not provided",
                    staged.file_name
                )));
            }
            (None, Some(_)) => {
                return Err(ServiceError::validation(
                    "no upload was staged for this contract",
                ));
            }
            (None, None) => {}
        }

        let input = state.to_new_contract(status)?;
        let contract = ContractService::new(self.conn, self.store).create(ctx, input, file)?;
        info!(
            "event=wizard_complete module=wizard status=ok contract_id={} status_value={}",
            contract.id, contract.status
        );
        Ok(contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 20 * 1024 * 1024;

    #[test]
    fn template_method_skips_upload_both_ways() {
        let mut state = WizardState::new();
        let progress = state
            .submit(
                StepAnswer::Method(MethodAnswer {
                    method: CreationMethod::Template,
                }),
                MAX,
            )
            .unwrap();
        assert_eq!(progress, WizardProgress::Next(WizardStep::Name));
        assert_eq!(state.back(), WizardStep::Method);
    }

    #[test]
    fn upload_method_visits_upload_and_checks_format() {
        let mut state = WizardState::new();
        state
            .submit(
                StepAnswer::Method(MethodAnswer {
                    method: CreationMethod::Upload,
                }),
                MAX,
            )
            .unwrap();
        assert_eq!(state.step, WizardStep::Upload);

        let err = state
            .submit(
                StepAnswer::Upload(UploadAnswer {
                    file_name: "notes.txt".to_string(),
                    size: 10,
                }),
                MAX,
            )
            .unwrap_err();
        assert_eq!(err.code(), "validation");

        let err = state
            .submit(
                StepAnswer::Upload(UploadAnswer {
                    file_name: "big.pdf".to_string(),
                    size: MAX + 1,
                }),
                MAX,
            )
            .unwrap_err();
        assert!(err.to_string().contains("20 MB"));
    }

    #[test]
    fn answers_must_match_current_step() {
        let mut state = WizardState::new();
        let err = state
            .submit(
                StepAnswer::Name(NameAnswer {
                    title: "MSA".to_string(),
                }),
                MAX,
            )
            .unwrap_err();
        assert!(err.to_string().contains("expected an answer for step `method`"));
    }

    #[test]
    fn dates_and_value_are_validated() {
        let dates = StepAnswer::Dates(DatesAnswer {
            effective_date: None,
            end_date: None,
            auto_renewal: false,
            renewal_notice_date: None,
        });
        assert!(validate_answer(&dates, MAX).is_err());

        let value = StepAnswer::Value(ValueAnswer {
            value_amount: Some("12.5".to_string()),
            currency: "JPY".to_string(),
            opportunity_id: String::new(),
        });
        assert!(validate_answer(&value, MAX).is_err());

        assert_eq!(parse_amount(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_amount(Some("1000.456")).unwrap(),
            Some(Decimal::new(100046, 2))
        );
        assert!(parse_amount(Some("abc")).is_err());
    }

    #[test]
    fn state_round_trips_through_json_session() {
        let mut state = WizardState::new();
        state
            .submit(
                StepAnswer::Method(MethodAnswer {
                    method: CreationMethod::Template,
                }),
                MAX,
            )
            .unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let restored: WizardState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.step, WizardStep::Name);
    }

    #[test]
    fn unanswered_draft_gets_placeholder_title() {
        let input = WizardState::new()
            .to_new_contract(ContractStatus::Draft)
            .unwrap();
        assert_eq!(input.title, UNTITLED_CONTRACT);
        assert_eq!(input.category, Category::Other);
    }
}
