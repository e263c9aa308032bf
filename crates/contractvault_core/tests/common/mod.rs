#![allow(dead_code)]

use chrono::NaiveDate;
use contractvault_core::model::contract::{Contract, ContractStatus, NewContract};
use contractvault_core::model::principal::{NewUser, Principal};
use contractvault_core::service::contract_service::ContractService;
use contractvault_core::service::user_service::UserService;
use contractvault_core::{open_db_in_memory, DocumentStore, RequestContext};
use rusqlite::Connection;
use tempfile::TempDir;

pub const UPLOAD_LIMIT: u64 = 1024 * 1024;

/// In-memory database, temporary blob store and a bootstrapped admin.
pub struct Vault {
    pub conn: Connection,
    pub store: DocumentStore,
    pub admin: Principal,
    _media: TempDir,
}

impl Vault {
    pub fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let media = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(media.path(), UPLOAD_LIMIT);
        let admin = UserService::new(&conn)
            .register(None, &NewUser::new("admin").superuser())
            .unwrap();
        Self {
            conn,
            store,
            admin,
            _media: media,
        }
    }

    pub fn media_root(&self) -> &std::path::Path {
        self._media.path()
    }

    /// Registers `user` on behalf of the admin.
    pub fn add_user(&self, user: NewUser) -> Principal {
        UserService::new(&self.conn)
            .register(Some(&self.admin_ctx()), &user)
            .unwrap()
    }

    pub fn legal_user(&self, username: &str) -> Principal {
        self.add_user(NewUser::new(username).in_group("Legal User"))
    }

    pub fn admin_ctx(&self) -> RequestContext {
        ctx(&self.admin)
    }

    pub fn contracts(&self) -> ContractService<'_> {
        ContractService::new(&self.conn, &self.store)
    }

    /// Creates a contract as `owner` without attachments.
    pub fn contract(&self, owner: &Principal, title: &str, status: ContractStatus) -> Contract {
        let input = NewContract {
            status,
            ..NewContract::new(title, "Acme Corp")
        };
        self.contracts().create(&ctx(owner), input, None).unwrap()
    }
}

/// Request context pinned to noon UTC on 2025-06-15.
pub fn ctx(actor: &Principal) -> RequestContext {
    RequestContext::new(actor.clone()).at(noon_millis(today()))
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn noon_millis(day: NaiveDate) -> i64 {
    day.and_hms_opt(12, 0, 0).unwrap().and_utc().timestamp_millis()
}
