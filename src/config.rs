//! Service configuration sourced from environment variables

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::auth::ReadPolicy;
use crate::db::StoreOptions;

pub const DEFAULT_AUTHORITY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_ENV_FILE: &str = "privileges.env";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub privileges_collection: String,
    pub users_collection: String,
    pub port: u16,
    pub authority_addr: String,
    pub authority_timeout: Duration,
    pub read_policy: ReadPolicy,
    pub map_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            get(name).ok_or(ConfigError::Missing(name))
        };
        let port = parse("SERVICE_PORT", required("SERVICE_PORT")?)?;
        let authority_timeout = match get("AUTHORITY_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse("AUTHORITY_TIMEOUT_MS", v)?),
            None => Duration::from_millis(DEFAULT_AUTHORITY_TIMEOUT_MS),
        };
        let read_policy = match get("PRIVILEGES_READ_POLICY") {
            Some(v) => parse("PRIVILEGES_READ_POLICY", v)?,
            None => ReadPolicy::default(),
        };
        let map_size = match get("PRIVILEGES_MAP_SIZE") {
            Some(v) => parse("PRIVILEGES_MAP_SIZE", v)?,
            None => DEFAULT_MAP_SIZE,
        };
        Ok(Config {
            db_path: PathBuf::from(required("PRIVILEGES_DB_PATH")?),
            privileges_collection: required("PRIVILEGES_COLLECTION")?,
            users_collection: required("USERS_COLLECTION")?,
            port,
            authority_addr: required("AUTHORITY_ADDR")?,
            authority_timeout,
            read_policy,
            map_size,
        })
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            map_size: self.map_size,
            privileges_db: self.privileges_collection.clone(),
            users_db: self.users_collection.clone(),
        }
    }

    /// Authority base URL; bare `host:port` gets an `http://` scheme
    pub fn authority_url(&self) -> String {
        let addr = self.authority_addr.trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid { name, value })
}
