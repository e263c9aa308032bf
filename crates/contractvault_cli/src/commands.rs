use chrono::NaiveDate;
use clap::Subcommand;
use contractvault_core::model::contract::ContractId;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Dashboard sections for the acting user.
    Dashboard,
    #[command(subcommand)]
    Contract(ContractCommand),
    #[command(subcommand)]
    File(FileCommand),
    #[command(subcommand)]
    Version(VersionCommand),
    /// Shares a contract with exactly one user or department.
    Share {
        contract: ContractId,
        #[arg(long, conflicts_with = "department", required_unless_present = "department")]
        user: Option<String>,
        #[arg(long)]
        department: Option<i64>,
        #[arg(long, default_value = "VIEW")]
        access: String,
    },
    Unshare {
        contract: ContractId,
        share: i64,
    },
    #[command(subcommand)]
    Approval(ApprovalCommand),
    #[command(subcommand)]
    Clause(ClauseCommand),
    #[command(subcommand)]
    Deviation(DeviationCommand),
    #[command(subcommand)]
    Risk(RiskCommand),
    #[command(subcommand)]
    Signature(SignatureCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    #[command(subcommand)]
    User(UserCommand),
    /// Portfolio report for a calendar year.
    Report {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Recent activity, or one contract's history.
    Audit {
        #[arg(long)]
        contract: Option<ContractId>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Asks the in-app assistant.
    Assist { message: String },
}

#[derive(Subcommand)]
pub(crate) enum ContractCommand {
    List {
        /// draft, pending or repository.
        #[arg(long)]
        tab: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "status")]
        statuses: Vec<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long)]
        department: Option<i64>,
        #[arg(long)]
        owner: Option<i64>,
        #[arg(long)]
        created_from: Option<NaiveDate>,
        #[arg(long)]
        created_to: Option<NaiveDate>,
        #[arg(long = "tag")]
        tags: Vec<i64>,
        /// `[-]key`, e.g. `-updated_at` or `title`.
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Show {
        id: ContractId,
    },
    /// Runs the creation wizard over a JSON array of step answers.
    Create {
        answers: PathBuf,
        /// Document staged by the upload step.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Save as DRAFT even when answers stop early.
        #[arg(long)]
        draft: bool,
    },
    Edit {
        id: ContractId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        sub_category: Option<String>,
        #[arg(long)]
        counterparty: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        value: Option<Decimal>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        effective_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        notice_date: Option<NaiveDate>,
        #[arg(long)]
        auto_renewal: Option<bool>,
        #[arg(long)]
        owner: Option<i64>,
        #[arg(long)]
        confidential: Option<bool>,
        #[arg(long = "tag")]
        tags: Option<Vec<i64>>,
    },
    Status {
        id: ContractId,
        status: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    Delete {
        id: ContractId,
    },
    /// Effective permissions, optionally on one contract.
    Permissions {
        id: Option<ContractId>,
    },
}

#[derive(Subcommand)]
pub(crate) enum FileCommand {
    Upload {
        contract: ContractId,
        path: PathBuf,
        #[arg(long)]
        primary: bool,
        #[arg(long, default_value = "")]
        description: String,
    },
    Download {
        contract: ContractId,
        file: i64,
        #[arg(long)]
        out: PathBuf,
    },
    Remove {
        contract: ContractId,
        file: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum VersionCommand {
    Add {
        contract: ContractId,
        #[arg(long)]
        label: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ApprovalCommand {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assigned_to_me: bool,
        #[arg(long)]
        requested_by_me: bool,
    },
    Show {
        id: i64,
    },
    Request {
        contract: ContractId,
        /// Username of the approver.
        #[arg(long)]
        approver: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    Decide {
        id: i64,
        /// APPROVED or REJECTED.
        decision: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    Cancel {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum ClauseCommand {
    Add {
        contract: ContractId,
        #[arg(long, default_value = "")]
        label: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long, default_value = "LOW")]
        risk: String,
        #[arg(long)]
        playbook: Option<i64>,
    },
}

#[derive(Subcommand)]
pub(crate) enum DeviationCommand {
    Add {
        contract: ContractId,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "MEDIUM")]
        risk: String,
        #[arg(long, default_value = "")]
        justification: String,
        #[arg(long)]
        clause: Option<i64>,
    },
}

#[derive(Subcommand)]
pub(crate) enum RiskCommand {
    Add {
        contract: ContractId,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "MEDIUM")]
        severity: String,
        #[arg(long, default_value = "")]
        mitigation: String,
        #[arg(long, default_value = "OPEN")]
        status: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum SignatureCommand {
    Add {
        contract: ContractId,
        #[arg(long)]
        party: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        designation: String,
        #[arg(long, default_value = "ESIGN")]
        sign_type: String,
    },
    /// Marks a signature record signed now.
    Sign {
        contract: ContractId,
        signature: i64,
        #[arg(long, default_value = "")]
        reference: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    #[command(subcommand)]
    Type(ContractTypeCommand),
    #[command(subcommand)]
    Tag(TagCommand),
    #[command(subcommand)]
    Dept(DepartmentCommand),
    #[command(subcommand)]
    Playbook(PlaybookCommand),
}

#[derive(Subcommand)]
pub(crate) enum ContractTypeCommand {
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        inactive: bool,
    },
    List,
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum TagCommand {
    Add {
        name: String,
        /// `#RRGGBB`.
        #[arg(long)]
        color: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        inactive: bool,
    },
    List,
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum DepartmentCommand {
    Add { name: String },
    List,
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub(crate) enum PlaybookCommand {
    Add {
        label: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "LOW")]
        risk: String,
        #[arg(long, default_value = "")]
        guidance: String,
        #[arg(long)]
        inactive: bool,
    },
    List,
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum UserCommand {
    /// Registers a user; the first user needs no `--as`.
    Add {
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        display_name: String,
        #[arg(long)]
        superuser: bool,
        #[arg(long)]
        staff: bool,
        #[arg(long)]
        department: Option<i64>,
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    List,
    /// Replaces a user's group memberships.
    Groups {
        id: i64,
        #[arg(long = "group")]
        groups: Vec<String>,
    },
}
