//! User → privilege references
//!
//! The user collection belongs to another subsystem. The store writes to it
//! only to reassign users when a privilege is deleted; `assign_user` exists so
//! the owner (and tests) can seed references through the same environment.

use chrono::{DateTime, Utc};
use heed::RoTxn;
use serde::{Deserialize, Serialize};

use crate::db::{decode, index_prefix, Dbs};
use crate::error::{err, Error, Result};
use crate::store::PrivilegeStore;

/// A user's reference to the privilege it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: String,
    pub privilege_id: String,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn load_user(d: &Dbs, tx: &RoTxn, user_id: &str) -> Result<Option<UserRef>> {
    match d.users.get(tx, user_id).map_err(err)? {
        Some(b) => decode(b).map(Some),
        None => Ok(None),
    }
}

/// Scan the reverse index for users of one privilege
pub(crate) fn indexed_users(d: &Dbs, tx: &RoTxn, privilege_id: &str) -> Result<Vec<String>> {
    let pfx = index_prefix(privilege_id);
    let mut r = Vec::new();
    for item in d.user_index.prefix_iter(tx, pfx.as_slice()).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        r.push(String::from_utf8(k[pfx.len()..].to_vec()).map_err(err)?);
    }
    Ok(r)
}

impl PrivilegeStore {
    /// Point `user_id` at an existing privilege
    pub fn assign_user(&self, user_id: &str, privilege_id: &str) -> Result<UserRef> {
        if user_id.is_empty() {
            return Err(Error::Validation("user id is required".into()));
        }
        let user = UserRef {
            user_id: user_id.to_string(),
            privilege_id: privilege_id.to_string(),
            updated_at: Utc::now(),
        };
        self.transact(|tx| {
            if tx.get_privilege(privilege_id)?.is_none() {
                return Err(Error::NotFound(format!("privilege {}", privilege_id)));
            }
            tx.put_user(&user)
        })?;
        Ok(user)
    }

    pub fn user_privilege(&self, user_id: &str) -> Result<UserRef> {
        self.read(|d, tx| load_user(d, tx, user_id))?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// User ids currently holding `privilege_id`
    pub fn users_with_privilege(&self, privilege_id: &str) -> Result<Vec<String>> {
        self.read(|d, tx| indexed_users(d, tx, privilege_id))
    }
}
