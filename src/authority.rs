//! Identity authority collaborator
//!
//! The gate never talks to the network itself: it is handed an
//! [`IdentityAuthority`] at construction. [`StaticAuthority`] keeps an
//! in-process token table for tests and local runs; the HTTP client lives in
//! the server module.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{
    BLOCK_USER, CREATE_USER, DELETE_USER, MANAGE_PRIVILEGES, SEND_RESET_PASSWORD_EMAIL,
    VIEW_ALL_USERS,
};
use crate::error::{Error, Result};

/// Capabilities the authority reports for a validated token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    pub user_id: Option<String>,
    pub view_all_users: bool,
    pub create_user: bool,
    pub manage_privileges: bool,
    pub delete_user: bool,
    pub block_user: bool,
    pub send_reset_password_email: bool,
}

impl TokenClaims {
    /// Claims carrying the capabilities in `mask`
    pub fn with_mask(user_id: impl Into<String>, mask: u64) -> Self {
        TokenClaims {
            user_id: Some(user_id.into()),
            view_all_users: mask & VIEW_ALL_USERS != 0,
            create_user: mask & CREATE_USER != 0,
            manage_privileges: mask & MANAGE_PRIVILEGES != 0,
            delete_user: mask & DELETE_USER != 0,
            block_user: mask & BLOCK_USER != 0,
            send_reset_password_email: mask & SEND_RESET_PASSWORD_EMAIL != 0,
        }
    }
}

#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<TokenClaims>;

    /// Liveness check
    async fn ping(&self) -> Result<()>;
}

/// Hash token with SHA-256 for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hex encode
mod hex {
    pub fn encode(data: impl AsRef<[u8]>) -> String {
        data.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// In-process authority backed by a table of token digests
#[derive(Default)]
pub struct StaticAuthority {
    tokens: RwLock<HashMap<String, TokenClaims>>,
}

impl StaticAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token`; only its digest is kept
    pub fn issue(&self, token: &str, claims: TokenClaims) {
        let mut t = self.tokens.write().unwrap_or_else(|p| p.into_inner());
        t.insert(hash_token(token), claims);
    }

    pub fn revoke(&self, token: &str) -> bool {
        let mut t = self.tokens.write().unwrap_or_else(|p| p.into_inner());
        t.remove(&hash_token(token)).is_some()
    }
}

#[async_trait]
impl IdentityAuthority for StaticAuthority {
    async fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        let t = self.tokens.read().unwrap_or_else(|p| p.into_inner());
        t.get(&hash_token(token))
            .cloned()
            .ok_or_else(|| Error::AuthorityUnavailable("invalid token".into()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
