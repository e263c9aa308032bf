//! Core domain logic for ContractVault.
//! This crate is the single source of truth for contract, permission and
//! audit invariants; front-ends only translate input and output.

#[macro_use]
pub mod model;

pub mod config;
pub mod db;
pub mod logging;
pub mod policy;
pub mod repo;
pub mod service;
pub mod storage;

pub use config::{ConfigError, ContractVaultConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_from_config, init_logging, LogSettings, LoggingError};
pub use model::audit::RequestOrigin;
pub use model::contract::{Contract, ContractId, ContractPatch, ContractStatus, NewContract};
pub use model::principal::{NewUser, Principal, UserId};
pub use policy::{evaluate, resolve_role, AccessFacts, Action, Grant, Role};
pub use repo::{RepoError, RepoResult};
pub use service::{RequestContext, ServiceError, ServiceResult};
pub use storage::{DocumentStore, StorageError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
