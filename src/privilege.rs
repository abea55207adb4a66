//! The privilege record and its preparation/validation rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    caps_to_names, ALL_CAPS, BLOCK_USER, CREATE_USER, DEFAULT_NAME, DELETE_USER,
    MANAGE_PRIVILEGES, REQUIRES_VIEW, ROOT_NAME, SEND_RESET_PASSWORD_EMAIL, VIEW_ALL_USERS,
};
use crate::error::{Error, Result};

/// A named bundle of capability flags assignable to users
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Privilege {
    pub id: String,
    pub name: String,
    pub view_all_users: bool,
    pub create_user: bool,
    pub manage_privileges: bool,
    pub delete_user: bool,
    pub block_user: bool,
    pub send_reset_password_email: bool,
    #[serde(rename = "default")]
    pub is_default: bool,
    #[serde(rename = "root")]
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutation kind driving preparation and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// The two protected singleton records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingletonKind {
    Default,
    Root,
}

impl SingletonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SingletonKind::Default => "default",
            SingletonKind::Root => "root",
        }
    }

    /// Build the singleton record: default grants nothing, root grants everything
    pub fn template(self, id: String, now: DateTime<Utc>) -> Privilege {
        let (name, mask) = match self {
            SingletonKind::Default => (DEFAULT_NAME, 0),
            SingletonKind::Root => (ROOT_NAME, ALL_CAPS),
        };
        let mut p = Privilege::with_mask(name, mask);
        p.id = id;
        p.is_default = self == SingletonKind::Default;
        p.is_root = self == SingletonKind::Root;
        p.created_at = now;
        p.updated_at = now;
        p
    }
}

impl Privilege {
    /// Unsaved privilege with the given name and capability mask
    pub fn with_mask(name: impl Into<String>, mask: u64) -> Self {
        Privilege {
            name: name.into(),
            view_all_users: mask & VIEW_ALL_USERS != 0,
            create_user: mask & CREATE_USER != 0,
            manage_privileges: mask & MANAGE_PRIVILEGES != 0,
            delete_user: mask & DELETE_USER != 0,
            block_user: mask & BLOCK_USER != 0,
            send_reset_password_email: mask & SEND_RESET_PASSWORD_EMAIL != 0,
            ..Default::default()
        }
    }

    /// Capability flags as a bitmask
    pub fn mask(&self) -> u64 {
        [
            (self.view_all_users, VIEW_ALL_USERS),
            (self.create_user, CREATE_USER),
            (self.manage_privileges, MANAGE_PRIVILEGES),
            (self.delete_user, DELETE_USER),
            (self.block_user, BLOCK_USER),
            (self.send_reset_password_email, SEND_RESET_PASSWORD_EMAIL),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .fold(0, |a, (_, b)| a | b)
    }

    pub fn is_singleton(&self) -> bool {
        self.is_default || self.is_root
    }

    /// Stamp server-owned fields. Singleton flags are always cleared.
    pub(crate) fn prepare(&mut self, op: Operation, now: DateTime<Utc>) {
        match op {
            Operation::Create => {
                self.is_default = false;
                self.is_root = false;
                self.created_at = now;
                self.updated_at = now;
            }
            Operation::Update => {
                self.is_default = false;
                self.is_root = false;
                self.updated_at = now;
            }
            Operation::Delete => {}
        }
    }

    pub(crate) fn validate(&self, op: Operation) -> Result<()> {
        match op {
            // update protection is decided by the stored record, not the input
            Operation::Create | Operation::Update => self.validate_fields(),
            Operation::Delete => {
                if self.is_singleton() {
                    return Err(Error::ProtectedRecord("cannot delete a singleton privilege".into()));
                }
                Ok(())
            }
        }
    }

    fn validate_fields(&self) -> Result<()> {
        let mask = self.mask();
        if mask & VIEW_ALL_USERS == 0 {
            if let Some(cap) = caps_to_names(mask & REQUIRES_VIEW).first() {
                return Err(Error::Validation(format!("{} requires view_all_users", cap)));
            }
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name is required".into()));
        }
        if self.id.is_empty() {
            return Err(Error::Validation("id is required".into()));
        }
        Ok(())
    }
}

/// Fresh random (version 4) identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
