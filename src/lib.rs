//! Privileges - named capability bundles for user accounts
//!
//! A [`PrivilegeStore`] keeps the privilege collection consistent (capability
//! dependencies, the default and root singletons, reassignment on delete) and
//! an [`AuthorizationGate`] decides whether a caller may touch it.

pub mod auth;
pub mod authority;
pub mod config;
pub mod constants;
mod db;
pub mod error;
pub mod privilege;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
mod tx;
pub mod users;

pub use auth::{extract_token, AuthorizationGate, ReadPolicy, RequestMetadata};
pub use authority::{IdentityAuthority, StaticAuthority, TokenClaims};
pub use config::{Config, ConfigError};
pub use constants::*;
pub use db::StoreOptions;
pub use error::{Error, Result};
pub use privilege::{new_id, Operation, Privilege, SingletonKind};
pub use store::PrivilegeStore;
pub use users::UserRef;
