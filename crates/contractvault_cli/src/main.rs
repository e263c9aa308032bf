//! ContractVault command-line front-end.
//!
//! # Responsibility
//! - Parse arguments, resolve the acting user and call core services.
//! - Print every result as pretty JSON on stdout.
//!
//! # Invariants
//! - Business rules live in `contractvault_core`; this binary only maps input.
//! - Failures exit non-zero with the error chain on stderr.

mod commands;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use commands::{
    ApprovalCommand, ClauseCommand, Command, ConfigCommand, ContractCommand,
    ContractTypeCommand, DepartmentCommand, DeviationCommand, FileCommand, PlaybookCommand,
    RiskCommand, SignatureCommand, TagCommand, UserCommand, VersionCommand,
};
use contractvault_core::model::approval::{ApprovalDecision, ApprovalStatus, NewApproval};
use contractvault_core::model::contract::{Category, ContractPatch, ContractStatus};
use contractvault_core::model::lookup::{NewContractType, NewPlaybookEntry, NewTag};
use contractvault_core::model::principal::NewUser;
use contractvault_core::model::review::{
    ClauseRiskLevel, NewClause, NewDeviation, NewRiskItem, NewSignatureRecord, Party,
    RiskLevel, RiskStatus, SignType,
};
use contractvault_core::model::share::{AccessLevel, ShareTarget};
use contractvault_core::repo::contract_repo::{ContractSort, ContractTab};
use contractvault_core::repo::lookup_repo::SqliteLookupRepository;
use contractvault_core::service::approval_service::{ApprovalFilters, ApprovalService};
use contractvault_core::service::assistant::{chat, ChatRequest, KeywordResponder};
use contractvault_core::service::audit_service::AuditService;
use contractvault_core::service::config_service::ConfigService;
use contractvault_core::service::contract_service::{
    ContractService, FileUpload, NewVersionInput, UploadedFile,
};
use contractvault_core::service::dashboard_service::DashboardService;
use contractvault_core::service::query_service::{ContractFilters, ContractQueryService};
use contractvault_core::service::report_service::ReportService;
use contractvault_core::service::user_service::UserService;
use contractvault_core::service::wizard::{StepAnswer, WizardProgress, WizardService};
use contractvault_core::{open_db, ContractVaultConfig, DocumentStore, RequestContext};
use log::warn;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "contractvault")]
#[command(about = "Contract repository with approvals, review and audit trail")]
#[command(version)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Username of the acting user.
    #[arg(long = "as", global = true)]
    actor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

/// Shared state for one invocation.
struct App {
    config: ContractVaultConfig,
    conn: Connection,
    store: DocumentStore,
    actor: Option<String>,
}

impl App {
    fn context(&self) -> Result<RequestContext> {
        let username = self
            .actor
            .as_deref()
            .ok_or_else(|| anyhow!("`--as <username>` is required for this command"))?;
        let actor = UserService::new(&self.conn)
            .resolve(username)
            .with_context(|| format!("unknown acting user `{username}`"))?;
        Ok(RequestContext::new(actor))
    }

    fn user_id(&self, username: &str) -> Result<i64> {
        Ok(UserService::new(&self.conn).resolve(username)?.id)
    }

    fn contracts(&self) -> ContractService<'_> {
        ContractService::new(&self.conn, &self.store)
    }

    fn config_service(&self) -> ConfigService<SqliteLookupRepository<'_>> {
        ConfigService::new(SqliteLookupRepository::new(&self.conn))
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: failed to render output: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let config = match &cli.config {
        Some(path) => ContractVaultConfig::from_file(path)
            .with_context(|| format!("loading config `{}`", path.display()))?,
        None => ContractVaultConfig::default(),
    };
    if let Err(err) = contractvault_core::init_from_config(&config) {
        eprintln!("warning: logging disabled: {err}");
    }

    let conn = open_db(&config.database_path).with_context(|| {
        format!("opening database `{}`", config.database_path.display())
    })?;
    let store = config.document_store();
    let app = App {
        config,
        conn,
        store,
        actor: cli.actor,
    };

    match cli.command {
        Command::Dashboard => {
            let ctx = app.context()?;
            render(
                DashboardService::new(&app.conn, app.config.dashboard_settings()).overview(&ctx)?,
            )
        }
        Command::Contract(command) => run_contract(&app, command),
        Command::File(command) => run_file(&app, command),
        Command::Version(VersionCommand::Add {
            contract,
            label,
            notes,
            file,
        }) => {
            let ctx = app.context()?;
            let input = NewVersionInput {
                label,
                notes,
                file: file.as_deref().map(read_upload).transpose()?,
            };
            render(app.contracts().add_version(&ctx, contract, input)?)
        }
        Command::Share {
            contract,
            user,
            department,
            access,
        } => {
            let ctx = app.context()?;
            let target = match (user, department) {
                (Some(username), None) => ShareTarget::User(app.user_id(&username)?),
                (None, Some(department_id)) => ShareTarget::Department(department_id),
                _ => bail!("pass exactly one of --user or --department"),
            };
            let access = parse_choice(&access, AccessLevel::parse, AccessLevel::ALL, "access level")?;
            render(app.contracts().share(&ctx, contract, target, access)?)
        }
        Command::Unshare { contract, share } => {
            let ctx = app.context()?;
            app.contracts().unshare(&ctx, contract, share)?;
            Ok(json!({"removed_share": share}))
        }
        Command::Approval(command) => run_approval(&app, command),
        Command::Clause(ClauseCommand::Add {
            contract,
            label,
            text,
            risk,
            playbook,
        }) => {
            let ctx = app.context()?;
            let input = NewClause {
                label,
                text,
                risk_level: parse_choice(&risk, ClauseRiskLevel::parse, ClauseRiskLevel::ALL, "risk level")?,
                playbook_entry_id: playbook,
            };
            render(app.contracts().add_clause(&ctx, contract, input)?)
        }
        Command::Deviation(DeviationCommand::Add {
            contract,
            description,
            risk,
            justification,
            clause,
        }) => {
            let ctx = app.context()?;
            let input = NewDeviation {
                clause_id: clause,
                description,
                risk_level: parse_choice(&risk, RiskLevel::parse, RiskLevel::ALL, "risk level")?,
                justification,
            };
            render(app.contracts().add_deviation(&ctx, contract, input)?)
        }
        Command::Risk(RiskCommand::Add {
            contract,
            description,
            severity,
            mitigation,
            status,
        }) => {
            let ctx = app.context()?;
            let input = NewRiskItem {
                description,
                severity: parse_choice(&severity, RiskLevel::parse, RiskLevel::ALL, "severity")?,
                mitigation,
                status: parse_choice(&status, RiskStatus::parse, RiskStatus::ALL, "risk status")?,
            };
            render(app.contracts().add_risk(&ctx, contract, input)?)
        }
        Command::Signature(command) => run_signature(&app, command),
        Command::Config(command) => run_config(&app, command),
        Command::User(command) => run_user(&app, command),
        Command::Report { year } => {
            let ctx = app.context()?;
            render(ReportService::new(&app.conn).build(&ctx, year)?)
        }
        Command::Audit { contract, limit } => {
            let ctx = app.context()?;
            let audit = AuditService::new(&app.conn);
            match contract {
                Some(id) => render(audit.contract_history(&ctx, id, limit)?),
                None => render(audit.recent(&ctx, limit)?),
            }
        }
        Command::Assist { message } => {
            app.context()?;
            let request = ChatRequest {
                message,
                history: Vec::new(),
            };
            render(chat(&KeywordResponder, &request))
        }
    }
}

fn run_contract(app: &App, command: ContractCommand) -> Result<Value> {
    let ctx = app.context()?;
    match command {
        ContractCommand::List {
            tab,
            search,
            statuses,
            categories,
            department,
            owner,
            created_from,
            created_to,
            tags,
            sort,
            page,
        } => {
            let tab = tab
                .map(|value| parse_choice(&value, ContractTab::parse, ContractTab::ALL, "tab"))
                .transpose()?;
            let sort = match sort {
                Some(value) => ContractSort::parse(&value)
                    .ok_or_else(|| anyhow!("invalid sort `{value}`"))?,
                None => ContractSort::default(),
            };
            let filters = ContractFilters {
                search,
                statuses: parse_all(&statuses, ContractStatus::parse, ContractStatus::ALL, "status")?,
                categories: parse_all(&categories, Category::parse, Category::ALL, "category")?,
                department_id: department,
                owner_id: owner,
                created_from,
                created_to,
                tag_ids: tags,
            };
            render(
                ContractQueryService::new(&app.conn, app.config.page_size)
                    .page(&ctx, tab, &filters, sort, page)?,
            )
        }
        ContractCommand::Show { id } => render(app.contracts().view(&ctx, id)?),
        ContractCommand::Create {
            answers,
            file,
            draft,
        } => {
            let text = std::fs::read_to_string(&answers)
                .with_context(|| format!("reading answers `{}`", answers.display()))?;
            let answers: Vec<StepAnswer> = serde_json::from_str(&text)
                .with_context(|| format!("parsing answers `{}`", answers.display()))?;

            let wizard = WizardService::new(&app.conn, &app.store);
            let mut state = wizard.start(&ctx)?;
            for answer in answers {
                let step = answer.step();
                if let WizardProgress::Complete = wizard
                    .submit(&ctx, &mut state, answer)
                    .with_context(|| format!("wizard step `{step}`"))?
                {
                    break;
                }
            }
            let upload = file.as_deref().map(read_upload).transpose()?;
            let contract = if draft || !state.complete {
                wizard.save_draft(&ctx, &state, upload)?
            } else {
                wizard.finish(&ctx, &state, upload)?
            };
            render(contract)
        }
        ContractCommand::Edit {
            id,
            title,
            category,
            sub_category,
            counterparty,
            address,
            value,
            currency,
            effective_date,
            end_date,
            notice_date,
            auto_renewal,
            owner,
            confidential,
            tags,
        } => {
            let patch = ContractPatch {
                title,
                category: category
                    .map(|value| parse_choice(&value, Category::parse, Category::ALL, "category"))
                    .transpose()?,
                sub_category,
                customer_or_vendor_name: counterparty,
                customer_or_vendor_address: address,
                value_amount: value.map(Some),
                currency,
                effective_date: effective_date.map(Some),
                end_date: end_date.map(Some),
                renewal_notice_date: notice_date.map(Some),
                auto_renewal,
                owner_id: owner,
                is_confidential: confidential,
                tag_ids: tags,
                ..ContractPatch::default()
            };
            render(app.contracts().update(&ctx, id, patch)?)
        }
        ContractCommand::Status { id, status, reason } => {
            let status = parse_choice(&status, ContractStatus::parse, ContractStatus::ALL, "status")?;
            render(app.contracts().change_status(&ctx, id, status, &reason)?)
        }
        ContractCommand::Delete { id } => {
            app.contracts().delete(&ctx, id)?;
            Ok(json!({"deleted_contract": id}))
        }
        ContractCommand::Permissions { id } => render(app.contracts().permissions(&ctx, id)?),
    }
}

fn run_file(app: &App, command: FileCommand) -> Result<Value> {
    let ctx = app.context()?;
    match command {
        FileCommand::Upload {
            contract,
            path,
            primary,
            description,
        } => {
            let upload = FileUpload {
                file: read_upload(&path)?,
                is_primary: primary,
                description,
            };
            render(app.contracts().upload_file(&ctx, contract, upload)?)
        }
        FileCommand::Download {
            contract,
            file,
            out,
        } => {
            let downloaded = app.contracts().download_file(&ctx, contract, file)?;
            std::fs::write(&out, &downloaded.bytes)
                .with_context(|| format!("writing `{}`", out.display()))?;
            Ok(json!({
                "file": downloaded.file,
                "written_to": out,
                "bytes": downloaded.bytes.len(),
            }))
        }
        FileCommand::Remove { contract, file } => {
            app.contracts().remove_file(&ctx, contract, file)?;
            Ok(json!({"removed_file": file}))
        }
    }
}

fn run_approval(app: &App, command: ApprovalCommand) -> Result<Value> {
    let ctx = app.context()?;
    let approvals = ApprovalService::new(&app.conn);
    match command {
        ApprovalCommand::List {
            status,
            assigned_to_me,
            requested_by_me,
        } => {
            let filters = ApprovalFilters {
                status: status
                    .map(|value| {
                        parse_choice(&value, ApprovalStatus::parse, ApprovalStatus::ALL, "status")
                    })
                    .transpose()?,
                assigned_to_me,
                requested_by_me,
            };
            render(approvals.list(&ctx, filters)?)
        }
        ApprovalCommand::Show { id } => render(approvals.detail(&ctx, id)?),
        ApprovalCommand::Request {
            contract,
            approver,
            reason,
            due,
        } => {
            let input = NewApproval {
                approver_id: app.user_id(&approver)?,
                reason,
                due_date: due,
            };
            render(approvals.request(&ctx, contract, input)?)
        }
        ApprovalCommand::Decide {
            id,
            decision,
            comment,
        } => {
            let decision = parse_choice(
                &decision,
                ApprovalDecision::parse,
                ApprovalDecision::ALL,
                "decision",
            )?;
            render(approvals.decide(&ctx, id, decision, &comment)?)
        }
        ApprovalCommand::Cancel { id } => render(approvals.cancel(&ctx, id)?),
    }
}

fn run_signature(app: &App, command: SignatureCommand) -> Result<Value> {
    let ctx = app.context()?;
    match command {
        SignatureCommand::Add {
            contract,
            party,
            name,
            email,
            phone,
            designation,
            sign_type,
        } => {
            let input = NewSignatureRecord {
                party: parse_choice(&party, Party::parse, Party::ALL, "party")?,
                signatory_name: name,
                signatory_email: email,
                signatory_phone: phone,
                signatory_designation: designation,
                sign_type: parse_choice(&sign_type, SignType::parse, SignType::ALL, "sign type")?,
            };
            render(app.contracts().add_signature(&ctx, contract, input)?)
        }
        SignatureCommand::Sign {
            contract,
            signature,
            reference,
        } => render(app.contracts().mark_signed(&ctx, contract, signature, &reference)?),
    }
}

fn run_config(app: &App, command: ConfigCommand) -> Result<Value> {
    let ctx = app.context()?;
    let service = app.config_service();
    match command {
        ConfigCommand::Type(ContractTypeCommand::Add {
            name,
            description,
            inactive,
        }) => render(service.add_contract_type(
            &ctx,
            &NewContractType {
                name,
                description,
                active: !inactive,
            },
        )?),
        ConfigCommand::Type(ContractTypeCommand::List) => {
            render(service.overview(&ctx)?.contract_types)
        }
        ConfigCommand::Type(ContractTypeCommand::Delete { id }) => {
            service.delete_contract_type(&ctx, id)?;
            Ok(json!({"deleted_contract_type": id}))
        }
        ConfigCommand::Tag(TagCommand::Add {
            name,
            color,
            description,
            inactive,
        }) => render(service.add_tag(
            &ctx,
            &NewTag {
                name,
                description,
                color,
                active: !inactive,
            },
        )?),
        ConfigCommand::Tag(TagCommand::List) => render(service.overview(&ctx)?.tags),
        ConfigCommand::Tag(TagCommand::Delete { id }) => {
            service.delete_tag(&ctx, id)?;
            Ok(json!({"deleted_tag": id}))
        }
        ConfigCommand::Dept(DepartmentCommand::Add { name }) => {
            render(service.add_department(&ctx, &name)?)
        }
        ConfigCommand::Dept(DepartmentCommand::List) => render(service.overview(&ctx)?.departments),
        ConfigCommand::Dept(DepartmentCommand::Delete { id }) => {
            service.delete_department(&ctx, id)?;
            Ok(json!({"deleted_department": id}))
        }
        ConfigCommand::Playbook(PlaybookCommand::Add {
            label,
            text,
            category,
            risk,
            guidance,
            inactive,
        }) => {
            let input = NewPlaybookEntry {
                label,
                category,
                recommended_text: text,
                risk_level: parse_choice(&risk, ClauseRiskLevel::parse, ClauseRiskLevel::ALL, "risk level")?,
                guidance_notes: guidance,
                active: !inactive,
            };
            render(service.add_playbook_entry(&ctx, &input)?)
        }
        ConfigCommand::Playbook(PlaybookCommand::List) => render(service.overview(&ctx)?.playbook),
        ConfigCommand::Playbook(PlaybookCommand::Delete { id }) => {
            service.delete_playbook_entry(&ctx, id)?;
            Ok(json!({"deleted_playbook_entry": id}))
        }
    }
}

fn run_user(app: &App, command: UserCommand) -> Result<Value> {
    let users = UserService::new(&app.conn);
    match command {
        UserCommand::Add {
            username,
            email,
            display_name,
            superuser,
            staff,
            department,
            groups,
        } => {
            let ctx = match app.actor {
                Some(_) => Some(app.context()?),
                None => None,
            };
            let input = NewUser {
                username,
                email,
                display_name,
                is_superuser: superuser,
                is_staff: staff,
                department_id: department,
                groups,
            };
            render(users.register(ctx.as_ref(), &input)?)
        }
        UserCommand::List => {
            app.context()?;
            render(users.list()?)
        }
        UserCommand::Groups { id, groups } => {
            let ctx = app.context()?;
            render(users.set_groups(&ctx, id, &groups)?)
        }
    }
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading upload `{}`", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("upload path `{}` has no usable file name", path.display()))?;
    Ok(UploadedFile::new(file_name, bytes))
}

/// Accepts the stored name in any letter case.
fn parse_choice<T: Copy + Display>(
    value: &str,
    parse: fn(&str) -> Option<T>,
    all: &[T],
    what: &str,
) -> Result<T> {
    let trimmed = value.trim();
    parse(trimmed)
        .or_else(|| parse(&trimmed.to_ascii_uppercase()))
        .or_else(|| parse(&trimmed.to_ascii_lowercase()))
        .ok_or_else(|| {
            let expected: Vec<String> = all.iter().map(ToString::to_string).collect();
            anyhow!("invalid {what} `{trimmed}`; expected one of {}", expected.join(", "))
        })
}

fn parse_all<T: Copy + Display>(
    values: &[String],
    parse: fn(&str) -> Option<T>,
    all: &[T],
    what: &str,
) -> Result<Vec<T>> {
    values
        .iter()
        .map(|value| parse_choice(value, parse, all, what))
        .collect()
}

fn render<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| {
        warn!("event=render module=cli status=error error={}", err);
        anyhow!("failed to serialize output: {err}")
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_choice, Cli};
    use clap::Parser;
    use contractvault_core::model::contract::ContractStatus;

    #[test]
    fn choices_ignore_letter_case() {
        let status = parse_choice(
            "active",
            ContractStatus::parse,
            ContractStatus::ALL,
            "status",
        )
        .unwrap();
        assert_eq!(status, ContractStatus::Active);

        let err = parse_choice("nope", ContractStatus::parse, ContractStatus::ALL, "status")
            .unwrap_err();
        assert!(err.to_string().contains("DRAFT"));
    }

    #[test]
    fn acting_user_flag_is_global() {
        let cli = Cli::try_parse_from(["contractvault", "dashboard", "--as", "alice"]).unwrap();
        assert_eq!(cli.actor.as_deref(), Some("alice"));

        let cli = Cli::try_parse_from([
            "contractvault",
            "--as",
            "bob",
            "contract",
            "list",
            "--sort",
            "-updated_at",
            "--status",
            "ACTIVE",
        ])
        .unwrap();
        assert_eq!(cli.actor.as_deref(), Some("bob"));
    }

    #[test]
    fn share_requires_a_target() {
        assert!(Cli::try_parse_from([
            "contractvault",
            "share",
            "6f1c1a48-4a8a-4b6f-9f3d-2b1f4d9e7c11",
        ])
        .is_err());
    }
}
