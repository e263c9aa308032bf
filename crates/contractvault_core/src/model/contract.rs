//! Contract aggregate root.
//!
//! # Responsibility
//! - Define the canonical contract record and its enumerations.
//! - Own the status lifecycle table and field-level validation.
//!
//! # Invariants
//! - `id` is a v4 UUID and never reused.
//! - `contract_number` is `CNT-YYYYMM-XXXXXXXX` derived from the creation
//!   month and the first 8 hex digits of `id`.
//! - `end_date >= effective_date` and `renewal_notice_date <= end_date` when
//!   both sides are set.
//! - Status changes follow [`ContractStatus::allowed_transitions`].

use crate::model::lookup::{ContractTypeId, DepartmentId, TagId};
use crate::model::principal::UserId;
use crate::model::{date_of, Timestamp};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ContractId = Uuid;

pub const TITLE_MAX_CHARS: usize = 500;
pub const COUNTERPARTY_MAX_CHARS: usize = 500;
pub const CURRENCY_MAX_CHARS: usize = 8;
pub const DEFAULT_CURRENCY: &str = "INR";
/// Window used by [`Contract::is_expiring_soon`].
pub const EXPIRING_SOON_DAYS: i64 = 30;

db_enum! {
    /// Contract lifecycle state.
    pub enum ContractStatus {
        Draft => "DRAFT",
        Pending => "PENDING",
        Active => "ACTIVE",
        Expired => "EXPIRED",
        Terminated => "TERMINATED",
        Archived => "ARCHIVED",
    }
}

db_enum! {
    /// Business category of a contract.
    pub enum Category {
        Sales => "SALES",
        Procurement => "PROCUREMENT",
        Hr => "HR",
        Legal => "LEGAL",
        Finance => "FINANCE",
        Partnership => "PARTNERSHIP",
        Nda => "NDA",
        Service => "SERVICE",
        Other => "OTHER",
    }
}

db_enum! {
    /// Legal-team assignment progress.
    pub enum AssignmentStatus {
        NotAssigned => "NOT_ASSIGNED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
    }
}

impl ContractStatus {
    /// Statuses reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [ContractStatus] {
        use ContractStatus::*;
        match self {
            Draft => &[Pending],
            Pending => &[Active, Draft],
            Active => &[Expired, Terminated, Archived],
            Expired => &[Archived],
            Terminated => &[Archived],
            Archived => &[],
        }
    }

    pub fn can_transition_to(self, next: ContractStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Human label used by the CLI and the assistant.
    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Expired => "Expired",
            Self::Terminated => "Terminated",
            Self::Archived => "Archived",
        }
    }
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::Procurement => "Procurement",
            Self::Hr => "Human Resources",
            Self::Legal => "Legal",
            Self::Finance => "Finance",
            Self::Partnership => "Partnership",
            Self::Nda => "Non-Disclosure Agreement",
            Self::Service => "Service Agreement",
            Self::Other => "Other",
        }
    }
}

/// Canonical contract record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub contract_number: String,
    pub title: String,
    pub status: ContractStatus,
    pub category: Category,
    pub sub_category: String,
    pub org_entity: String,
    pub region_country: String,
    /// Owning business unit / team.
    pub bu_team_id: Option<DepartmentId>,
    pub customer_or_vendor_name: String,
    pub customer_or_vendor_address: String,
    pub contract_type_id: Option<ContractTypeId>,
    pub value_amount: Option<Decimal>,
    pub currency: String,
    pub opportunity_id: String,
    pub effective_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub auto_renewal: bool,
    pub renewal_notice_date: Option<NaiveDate>,
    pub assignment_status: AssignmentStatus,
    pub owner_id: Option<UserId>,
    pub is_confidential: bool,
    pub extra_metadata: serde_json::Value,
    pub tag_ids: Vec<TagId>,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Contract {
    /// Builds a fresh record from creation input.
    ///
    /// `owner_id` falls back to `created_by` when the input names no owner.
    pub fn from_new(input: NewContract, created_by: UserId, now: Timestamp) -> Self {
        let id = Uuid::new_v4();
        let mut tag_ids = input.tag_ids;
        tag_ids.sort_unstable();
        tag_ids.dedup();

        Self {
            id,
            contract_number: contract_number_for(id, now),
            title: input.title.trim().to_string(),
            status: input.status,
            category: input.category,
            sub_category: input.sub_category,
            org_entity: input.org_entity,
            region_country: input.region_country,
            bu_team_id: input.bu_team_id,
            customer_or_vendor_name: input.customer_or_vendor_name.trim().to_string(),
            customer_or_vendor_address: input.customer_or_vendor_address,
            contract_type_id: input.contract_type_id,
            value_amount: input.value_amount.map(|value| value.round_dp(2)),
            currency: normalize_currency(&input.currency),
            opportunity_id: input.opportunity_id,
            effective_date: input.effective_date,
            end_date: input.end_date,
            auto_renewal: input.auto_renewal,
            renewal_notice_date: input.renewal_notice_date,
            assignment_status: AssignmentStatus::NotAssigned,
            owner_id: Some(input.owner_id.unwrap_or(created_by)),
            is_confidential: input.is_confidential,
            extra_metadata: input.extra_metadata,
            tag_ids,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates field-level invariants before persistence.
    pub fn validate(&self) -> Result<(), ContractValidationError> {
        validate_title(&self.title)?;
        if self.customer_or_vendor_name.chars().count() > COUNTERPARTY_MAX_CHARS {
            return Err(ContractValidationError::TooLong {
                field: "customer_or_vendor_name",
                max: COUNTERPARTY_MAX_CHARS,
            });
        }
        if self.currency.is_empty() || self.currency.chars().count() > CURRENCY_MAX_CHARS {
            return Err(ContractValidationError::InvalidCurrency(
                self.currency.clone(),
            ));
        }
        if let Some(value) = self.value_amount {
            if value.is_sign_negative() {
                return Err(ContractValidationError::NegativeValue);
            }
        }
        validate_dates(self.effective_date, self.end_date, self.renewal_notice_date)?;
        if !self.extra_metadata.is_object() {
            return Err(ContractValidationError::MetadataNotObject);
        }
        Ok(())
    }

    /// ACTIVE and ending within the next 30 days (exclusive of today).
    pub fn is_expiring_soon(&self, today: NaiveDate) -> bool {
        match (self.status, self.end_date) {
            (ContractStatus::Active, Some(end_date)) => {
                let days_left = (end_date - today).num_days();
                days_left > 0 && days_left <= EXPIRING_SOON_DAYS
            }
            _ => false,
        }
    }

    /// End date already passed, regardless of status.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end_date| end_date < today)
    }

    /// `"<number> - <title>"`, with a placeholder for unnumbered rows.
    pub fn display_name(&self) -> String {
        let number = if self.contract_number.is_empty() {
            "No Number"
        } else {
            self.contract_number.as_str()
        };
        format!("{number} - {}", self.title)
    }
}

/// Creation input gathered by the wizard or the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub title: String,
    pub status: ContractStatus,
    pub category: Category,
    pub sub_category: String,
    pub org_entity: String,
    pub region_country: String,
    pub bu_team_id: Option<DepartmentId>,
    pub customer_or_vendor_name: String,
    pub customer_or_vendor_address: String,
    pub contract_type_id: Option<ContractTypeId>,
    pub value_amount: Option<Decimal>,
    pub currency: String,
    pub opportunity_id: String,
    pub effective_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub auto_renewal: bool,
    pub renewal_notice_date: Option<NaiveDate>,
    pub owner_id: Option<UserId>,
    pub is_confidential: bool,
    pub tag_ids: Vec<TagId>,
    pub extra_metadata: serde_json::Value,
}

impl NewContract {
    pub fn new(title: impl Into<String>, counterparty: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            customer_or_vendor_name: counterparty.into(),
            ..Self::default()
        }
    }
}

impl Default for NewContract {
    fn default() -> Self {
        Self {
            title: String::new(),
            status: ContractStatus::Draft,
            category: Category::Other,
            sub_category: String::new(),
            org_entity: String::new(),
            region_country: String::new(),
            bu_team_id: None,
            customer_or_vendor_name: String::new(),
            customer_or_vendor_address: String::new(),
            contract_type_id: None,
            value_amount: None,
            currency: DEFAULT_CURRENCY.to_string(),
            opportunity_id: String::new(),
            effective_date: None,
            end_date: None,
            auto_renewal: false,
            renewal_notice_date: None,
            owner_id: None,
            is_confidential: false,
            tag_ids: Vec::new(),
            extra_metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Partial update. `None` leaves a field untouched; nested `Option`s clear
/// nullable columns with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractPatch {
    pub title: Option<String>,
    pub status: Option<ContractStatus>,
    pub category: Option<Category>,
    pub sub_category: Option<String>,
    pub org_entity: Option<String>,
    pub region_country: Option<String>,
    pub bu_team_id: Option<Option<DepartmentId>>,
    pub customer_or_vendor_name: Option<String>,
    pub customer_or_vendor_address: Option<String>,
    pub contract_type_id: Option<Option<ContractTypeId>>,
    pub value_amount: Option<Option<Decimal>>,
    pub currency: Option<String>,
    pub opportunity_id: Option<String>,
    pub effective_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub auto_renewal: Option<bool>,
    pub renewal_notice_date: Option<Option<NaiveDate>>,
    pub assignment_status: Option<AssignmentStatus>,
    pub owner_id: Option<UserId>,
    pub is_confidential: Option<bool>,
    pub tag_ids: Option<Vec<TagId>>,
    pub extra_metadata: Option<serde_json::Value>,
}

impl ContractPatch {
    /// Applies set fields onto `contract` and returns their names in
    /// declaration order.
    pub fn apply_to(self, contract: &mut Contract) -> Vec<&'static str> {
        let mut changed = Vec::new();

        macro_rules! assign {
            ($field:ident) => {
                if let Some(value) = self.$field {
                    contract.$field = value;
                    changed.push(stringify!($field));
                }
            };
            ($field:ident, $map:expr) => {
                if let Some(value) = self.$field {
                    contract.$field = $map(value);
                    changed.push(stringify!($field));
                }
            };
        }

        assign!(title, |value: String| value.trim().to_string());
        assign!(status);
        assign!(category);
        assign!(sub_category);
        assign!(org_entity);
        assign!(region_country);
        assign!(bu_team_id);
        assign!(customer_or_vendor_name, |value: String| value
            .trim()
            .to_string());
        assign!(customer_or_vendor_address);
        assign!(contract_type_id);
        assign!(value_amount, |value: Option<Decimal>| value
            .map(|amount| amount.round_dp(2)));
        assign!(currency, |value: String| normalize_currency(&value));
        assign!(opportunity_id);
        assign!(effective_date);
        assign!(end_date);
        assign!(auto_renewal);
        assign!(renewal_notice_date);
        assign!(assignment_status);
        assign!(owner_id, Some);
        assign!(is_confidential);
        assign!(tag_ids, |mut value: Vec<TagId>| {
            value.sort_unstable();
            value.dedup();
            value
        });
        assign!(extra_metadata);

        changed
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractValidationError {
    BlankTitle,
    TooLong { field: &'static str, max: usize },
    InvalidCurrency(String),
    NegativeValue,
    EndBeforeEffective,
    NoticeAfterEnd,
    MetadataNotObject,
}

impl Display for ContractValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "contract title must not be blank"),
            Self::TooLong { field, max } => write!(f, "{field} must be at most {max} characters"),
            Self::InvalidCurrency(value) => write!(f, "invalid currency code `{value}`"),
            Self::NegativeValue => write!(f, "contract value must not be negative"),
            Self::EndBeforeEffective => write!(f, "end date must be after effective date"),
            Self::NoticeAfterEnd => write!(f, "renewal notice date must be before end date"),
            Self::MetadataNotObject => write!(f, "extra metadata must be a JSON object"),
        }
    }
}

impl Error for ContractValidationError {}

pub fn validate_title(title: &str) -> Result<(), ContractValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ContractValidationError::BlankTitle);
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(ContractValidationError::TooLong {
            field: "title",
            max: TITLE_MAX_CHARS,
        });
    }
    Ok(())
}

pub fn validate_dates(
    effective_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    renewal_notice_date: Option<NaiveDate>,
) -> Result<(), ContractValidationError> {
    if let (Some(effective), Some(end)) = (effective_date, end_date) {
        if end < effective {
            return Err(ContractValidationError::EndBeforeEffective);
        }
    }
    if let (Some(notice), Some(end)) = (renewal_notice_date, end_date) {
        if notice > end {
            return Err(ContractValidationError::NoticeAfterEnd);
        }
    }
    Ok(())
}

/// `CNT-YYYYMM-XXXXXXXX` for a contract created at `created_at`.
pub fn contract_number_for(id: ContractId, created_at: Timestamp) -> String {
    let created = date_of(created_at);
    let simple = id.simple().to_string();
    format!(
        "CNT-{:04}{:02}-{}",
        created.year(),
        created.month(),
        simple[..8].to_ascii_uppercase()
    )
}

fn normalize_currency(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::start_of_day_millis;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn active_contract(end_date: Option<NaiveDate>) -> Contract {
        let mut contract = Contract::from_new(NewContract::new("MSA", "Acme"), 1, 0);
        contract.status = ContractStatus::Active;
        contract.end_date = end_date;
        contract
    }

    #[test]
    fn lifecycle_table_matches_documented_paths() {
        use ContractStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(!Draft.can_transition_to(Archived));
        assert!(!Draft.can_transition_to(Active));
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Draft));
        assert!(Active.can_transition_to(Expired));
        assert!(Active.can_transition_to(Terminated));
        assert!(Active.can_transition_to(Archived));
        assert!(Expired.can_transition_to(Archived));
        assert!(Terminated.can_transition_to(Archived));
        assert!(Archived.is_terminal());
        for status in ContractStatus::ALL {
            assert!(!status.can_transition_to(*status), "{status} self-loop");
        }
    }

    #[test]
    fn contract_number_uses_creation_month_and_id_prefix() {
        let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        let created_at = start_of_day_millis(day(2025, 7, 9));
        assert_eq!(contract_number_for(id, created_at), "CNT-202507-1A2B3C4D");
    }

    #[test]
    fn from_new_defaults_owner_to_creator() {
        let contract = Contract::from_new(NewContract::new(" Title ", "Acme"), 7, 0);
        assert_eq!(contract.owner_id, Some(7));
        assert_eq!(contract.created_by, Some(7));
        assert_eq!(contract.title, "Title");
        assert_eq!(contract.status, ContractStatus::Draft);
        assert!(contract.contract_number.starts_with("CNT-"));
        assert!(contract.display_name().ends_with(" - Title"));
    }

    #[test]
    fn expiring_soon_window_is_one_to_thirty_days() {
        let today = day(2026, 1, 1);
        assert!(active_contract(Some(day(2026, 1, 16))).is_expiring_soon(today));
        assert!(active_contract(Some(day(2026, 1, 31))).is_expiring_soon(today));
        assert!(!active_contract(Some(day(2026, 2, 1))).is_expiring_soon(today));
        assert!(!active_contract(Some(today)).is_expiring_soon(today));
        assert!(!active_contract(None).is_expiring_soon(today));

        let mut draft = active_contract(Some(day(2026, 1, 10)));
        draft.status = ContractStatus::Draft;
        assert!(!draft.is_expiring_soon(today));
    }

    #[test]
    fn expired_compares_end_date_with_today() {
        let today = day(2026, 1, 1);
        assert!(active_contract(Some(day(2025, 12, 22))).is_expired(today));
        assert!(!active_contract(Some(today)).is_expired(today));
        assert!(!active_contract(None).is_expired(today));
    }

    #[test]
    fn validate_rejects_inverted_dates() {
        let mut contract = active_contract(Some(day(2026, 1, 1)));
        contract.effective_date = Some(day(2026, 2, 1));
        assert_eq!(
            contract.validate().unwrap_err(),
            ContractValidationError::EndBeforeEffective
        );

        contract.effective_date = Some(day(2025, 1, 1));
        contract.renewal_notice_date = Some(day(2026, 3, 1));
        assert_eq!(
            contract.validate().unwrap_err(),
            ContractValidationError::NoticeAfterEnd
        );
    }

    #[test]
    fn patch_reports_changed_fields_in_order() {
        let mut contract = active_contract(None);
        let patch = ContractPatch {
            title: Some("Renamed".to_string()),
            currency: Some("usd".to_string()),
            bu_team_id: Some(None),
            ..ContractPatch::default()
        };
        let changed = patch.apply_to(&mut contract);
        assert_eq!(changed, vec!["title", "bu_team_id", "currency"]);
        assert_eq!(contract.currency, "USD");
        assert!(ContractPatch::default().is_empty());
    }
}
