//! Write-transaction wrapper used by every mutation

use chrono::{DateTime, Utc};
use heed::{Env, RwTxn};

use crate::db::{decode, encode, index_key, Dbs};
use crate::error::{err, Error, Result};
use crate::privilege::{Privilege, SingletonKind};
use crate::users::{indexed_users, load_user, UserRef};

/// Transaction wrapper for grouped writes
pub struct Tx<'e> {
    txn: RwTxn<'e>,
    dbs: &'e Dbs,
}

impl<'e> Tx<'e> {
    #[inline]
    pub(crate) fn new(env: &'e Env, dbs: &'e Dbs) -> Result<Self> {
        Ok(Tx { txn: env.write_txn().map_err(err)?, dbs })
    }

    #[inline]
    pub(crate) fn commit(self) -> Result<()> {
        self.txn.commit().map_err(err)
    }

    pub fn get_privilege(&self, id: &str) -> Result<Option<Privilege>> {
        match self.dbs.privileges.get(&self.txn, id).map_err(err)? {
            Some(b) => decode(b).map(Some),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a privilege record keyed by its id
    pub fn put_privilege(&mut self, p: &Privilege) -> Result<()> {
        let b = encode(p)?;
        self.dbs.privileges.put(&mut self.txn, &p.id, &b).map_err(err)
    }

    pub fn remove_privilege(&mut self, id: &str) -> Result<bool> {
        self.dbs.privileges.delete(&mut self.txn, id).map_err(err)
    }

    pub fn singleton(&self, kind: SingletonKind) -> Result<Option<String>> {
        Ok(self
            .dbs
            .singletons
            .get(&self.txn, kind.as_str())
            .map_err(err)?
            .map(|s| s.to_string()))
    }

    /// Bind `kind` to `id` unless the slot is already taken
    pub fn claim_singleton(&mut self, kind: SingletonKind, id: &str) -> Result<()> {
        if let Some(existing) = self.singleton(kind)? {
            return Err(Error::AlreadyExists(format!(
                "{} privilege already exists ({})",
                kind.as_str(),
                existing
            )));
        }
        self.dbs.singletons.put(&mut self.txn, kind.as_str(), id).map_err(err)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRef>> {
        load_user(self.dbs, &self.txn, user_id)
    }

    /// Write a user reference, moving its index entry if the privilege changed
    pub fn put_user(&mut self, user: &UserRef) -> Result<()> {
        if let Some(old) = self.get_user(&user.user_id)? {
            let k = index_key(&old.privilege_id, &old.user_id);
            self.dbs.user_index.delete(&mut self.txn, k.as_slice()).map_err(err)?;
        }
        let b = encode(user)?;
        self.dbs.users.put(&mut self.txn, &user.user_id, &b).map_err(err)?;
        let k = index_key(&user.privilege_id, &user.user_id);
        self.dbs.user_index.put(&mut self.txn, k.as_slice(), &()).map_err(err)
    }

    /// User ids currently referencing `privilege_id`
    pub fn users_of(&self, privilege_id: &str) -> Result<Vec<String>> {
        indexed_users(self.dbs, &self.txn, privilege_id)
    }

    /// Point every user of `from` at `to`, returning how many moved
    pub fn reassign_users(&mut self, from: &str, to: &str, now: DateTime<Utc>) -> Result<usize> {
        let ids = self.users_of(from)?;
        for user_id in &ids {
            self.put_user(&UserRef {
                user_id: user_id.clone(),
                privilege_id: to.to_string(),
                updated_at: now,
            })?;
        }
        Ok(ids.len())
    }

    pub(crate) fn clear(&mut self) -> Result<()> {
        self.dbs.privileges.clear(&mut self.txn).map_err(err)?;
        self.dbs.singletons.clear(&mut self.txn).map_err(err)?;
        self.dbs.users.clear(&mut self.txn).map_err(err)?;
        self.dbs.user_index.clear(&mut self.txn).map_err(err)
    }
}

/// Run multiple operations in a single transaction
#[inline]
pub(crate) fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(env: &Env, dbs: &Dbs, f: F) -> Result<T> {
    let mut tx = Tx::new(env, dbs)?;
    let r = f(&mut tx)?;
    tx.commit()?;
    Ok(r)
}
