//! Authorization gate
//!
//! Extracts the caller token from request metadata and asks the injected
//! identity authority whether it carries `manage_privileges`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::authority::{IdentityAuthority, TokenClaims};
use crate::constants::TOKEN_KEY;
use crate::error::{Error, Result};

/// Request metadata: case-insensitive keys, possibly repeated
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    entries: HashMap<String, Vec<String>>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = RequestMetadata::new();
        for (k, v) in iter {
            m.insert(k.as_ref(), v);
        }
        m
    }
}

/// Whether read operations pass through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    #[default]
    Gated,
    Open,
}

impl FromStr for ReadPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gated" => Ok(ReadPolicy::Gated),
            "open" => Ok(ReadPolicy::Open),
            other => Err(format!("unknown read policy '{}'", other)),
        }
    }
}

/// Pull the token out of the metadata, trimmed of surrounding whitespace
pub fn extract_token(meta: Option<&RequestMetadata>) -> Result<&str> {
    let meta = meta.ok_or_else(|| Error::MissingCredential("no request metadata".into()))?;
    let token = meta
        .get(TOKEN_KEY)
        .ok_or_else(|| Error::MissingCredential("missing token header".into()))?
        .trim();
    if token.is_empty() {
        return Err(Error::MissingCredential("token is empty".into()));
    }
    Ok(token)
}

/// Decides whether a caller may operate on privileges
#[derive(Clone)]
pub struct AuthorizationGate {
    authority: Arc<dyn IdentityAuthority>,
    read_policy: ReadPolicy,
}

impl AuthorizationGate {
    pub fn new(authority: Arc<dyn IdentityAuthority>, read_policy: ReadPolicy) -> Self {
        AuthorizationGate { authority, read_policy }
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    /// Gate for mutating operations
    pub async fn authorize(&self, meta: Option<&RequestMetadata>) -> Result<TokenClaims> {
        let token = extract_token(meta)?;
        let claims = self.authority.validate_token(token).await.map_err(|e| match e {
            Error::AuthorityUnavailable(_) => e,
            other => Error::AuthorityUnavailable(other.to_string()),
        })?;
        if !claims.manage_privileges {
            warn!(user = ?claims.user_id, "caller lacks manage_privileges");
            return Err(Error::Forbidden("user not allowed to manage privileges".into()));
        }
        debug!(user = ?claims.user_id, "caller authorized");
        Ok(claims)
    }

    /// Gate for read operations; `None` when reads are open
    pub async fn authorize_read(&self, meta: Option<&RequestMetadata>) -> Result<Option<TokenClaims>> {
        match self.read_policy {
            ReadPolicy::Open => Ok(None),
            ReadPolicy::Gated => self.authorize(meta).await.map(Some),
        }
    }

    pub async fn ping_authority(&self) -> Result<()> {
        self.authority.ping().await
    }
}
