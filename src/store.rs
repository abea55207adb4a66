//! Privilege store: the canonical collection and its invariants
//!
//! Every mutation runs in a single LMDB write transaction. Deletion is the one
//! exception: users are reassigned in one committed transaction and the record
//! is removed in a second, so a failure in between never leaves a user pointing
//! at a missing privilege.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use heed::Env;
use tracing::{debug, info};

use crate::db::{self, decode, Dbs, StoreOptions};
use crate::error::{err, Error, Result};
use crate::privilege::{new_id, Operation, Privilege, SingletonKind};
use crate::tx::{transact, Tx};

struct Inner {
    env: Env,
    dbs: Dbs,
}

/// Handle to the persisted privilege collection. Cheap to clone.
#[derive(Clone)]
pub struct PrivilegeStore {
    inner: Arc<Inner>,
}

impl PrivilegeStore {
    /// Open (or create) a store rooted at `path`
    pub fn open(path: impl AsRef<Path>, opts: &StoreOptions) -> Result<Self> {
        let (env, dbs) = db::open(path.as_ref(), opts)?;
        debug!(path = %path.as_ref().display(), "privilege store opened");
        Ok(PrivilegeStore { inner: Arc::new(Inner { env, dbs }) })
    }

    pub(crate) fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Dbs, &heed::RoTxn) -> Result<T>,
    {
        db::read(&self.inner.env, &self.inner.dbs, f)
    }

    pub(crate) fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tx) -> Result<T>,
    {
        transact(&self.inner.env, &self.inner.dbs, f)
    }

    /// Remove every record (tests and operator resets)
    pub fn clear(&self) -> Result<()> {
        self.transact(|tx| tx.clear())
    }

    /// Create a privilege from caller input.
    ///
    /// The id and timestamps are assigned here and written back into `p`;
    /// singleton flags supplied by the caller are ignored.
    pub fn create(&self, p: &mut Privilege) -> Result<Privilege> {
        p.id = new_id();
        p.prepare(Operation::Create, Utc::now());
        p.validate(Operation::Create)?;
        self.transact(|tx| tx.put_privilege(&*p))?;
        debug!(id = %p.id, name = %p.name, "privilege created");
        Ok(p.clone())
    }

    pub fn create_default(&self) -> Result<Privilege> {
        self.create_singleton(SingletonKind::Default)
    }

    pub fn create_root(&self) -> Result<Privilege> {
        self.create_singleton(SingletonKind::Root)
    }

    // Existence check and insert share one write transaction, so concurrent
    // bootstraps cannot both see the slot empty.
    fn create_singleton(&self, kind: SingletonKind) -> Result<Privilege> {
        let p = kind.template(new_id(), Utc::now());
        self.transact(|tx| {
            tx.claim_singleton(kind, &p.id)?;
            tx.put_privilege(&p)
        })?;
        info!(kind = kind.as_str(), id = %p.id, "singleton privilege created");
        Ok(p)
    }

    /// Ensure both singletons exist. An existing singleton is the normal
    /// steady state and only logged.
    pub fn bootstrap(&self) -> Result<()> {
        for kind in [SingletonKind::Default, SingletonKind::Root] {
            match self.create_singleton(kind) {
                Ok(_) => {}
                Err(Error::AlreadyExists(msg)) => info!("{}", msg),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Update name and capability flags of an ordinary privilege.
    ///
    /// Singleton flags on the input are cleared; the stored record decides
    /// whether the target is protected.
    pub fn update(&self, p: &mut Privilege) -> Result<Privilege> {
        let updated = self.transact(|tx| {
            let mut stored = tx
                .get_privilege(&p.id)?
                .ok_or_else(|| Error::NotFound(format!("privilege {}", p.id)))?;
            if stored.is_singleton() {
                return Err(Error::ProtectedRecord(format!("cannot update {} privilege", stored.name)));
            }
            p.prepare(Operation::Update, Utc::now());
            p.validate(Operation::Update)?;
            stored.name = p.name.clone();
            stored.view_all_users = p.view_all_users;
            stored.create_user = p.create_user;
            stored.manage_privileges = p.manage_privileges;
            stored.delete_user = p.delete_user;
            stored.block_user = p.block_user;
            stored.send_reset_password_email = p.send_reset_password_email;
            stored.updated_at = p.updated_at;
            tx.put_privilege(&stored)?;
            Ok(stored)
        })?;
        p.created_at = updated.created_at;
        debug!(id = %updated.id, "privilege updated");
        Ok(updated)
    }

    pub fn get(&self, id: &str) -> Result<Privilege> {
        self.read(|d, tx| match d.privileges.get(tx, id).map_err(err)? {
            Some(b) => decode(b),
            None => Err(Error::NotFound(format!("privilege {}", id))),
        })
    }

    pub fn get_default(&self) -> Result<Privilege> {
        self.get_singleton(SingletonKind::Default)
    }

    pub fn get_root(&self) -> Result<Privilege> {
        self.get_singleton(SingletonKind::Root)
    }

    fn get_singleton(&self, kind: SingletonKind) -> Result<Privilege> {
        let missing = || Error::NotFound(format!("{} privilege", kind.as_str()));
        self.read(|d, tx| {
            let id = d.singletons.get(tx, kind.as_str()).map_err(err)?.ok_or_else(missing)?;
            match d.privileges.get(tx, id).map_err(err)? {
                Some(b) => decode(b),
                None => Err(missing()),
            }
        })
    }

    /// Every privilege, ordered by id
    pub fn get_all(&self) -> Result<Vec<Privilege>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for item in d.privileges.iter(tx).map_err(err)? {
                let (_, b) = item.map_err(err)?;
                r.push(decode(b)?);
            }
            Ok(r)
        })
    }

    /// Delete an ordinary privilege, moving its users to the default privilege.
    /// Returns the number of users reassigned.
    pub fn delete(&self, id: &str) -> Result<usize> {
        let target = self.get(id)?;
        target.validate(Operation::Delete)?;
        let fallback = self.get_default()?;

        let moved = self.transact(|tx| tx.reassign_users(id, &fallback.id, Utc::now()))?;
        debug!(id, to = %fallback.id, moved, "users reassigned");

        self.transact(|tx| tx.remove_privilege(id))?;
        info!(id, name = %target.name, moved, "privilege deleted");
        Ok(moved)
    }
}
