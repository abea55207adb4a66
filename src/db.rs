//! LMDB environment, database handles and key helpers

use std::path::Path;

use heed::types::{Bytes, Str, Unit};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::{PRIVILEGES_DB, USERS_DB};
use crate::error::{err, Result};

// Database type aliases
pub type DbJson = Database<Str, Bytes>;
pub type DbStr = Database<Str, Str>;
pub type DbIndex = Database<Bytes, Unit>;

/// Separator between privilege id and user id in index keys
const SEP: u8 = b'/';

/// Index key `{privilege_id}/{user_id}`
#[inline]
pub fn index_key(privilege_id: &str, user_id: &str) -> Vec<u8> {
    let mut k = index_prefix(privilege_id);
    k.extend_from_slice(user_id.as_bytes());
    k
}

/// Prefix matching every index entry of one privilege
#[inline]
pub fn index_prefix(privilege_id: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(privilege_id.len() + 1);
    k.extend_from_slice(privilege_id.as_bytes());
    k.push(SEP);
    k
}

pub(crate) fn encode<T: Serialize>(v: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(v).map_err(err)
}

pub(crate) fn decode<T: DeserializeOwned>(b: &[u8]) -> Result<T> {
    serde_json::from_slice(b).map_err(err)
}

/// Options for opening the store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub map_size: usize,
    pub privileges_db: String,
    pub users_db: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            map_size: 1 << 30,
            privileges_db: PRIVILEGES_DB.into(),
            users_db: USERS_DB.into(),
        }
    }
}

/// All database handles
#[derive(Clone, Copy)]
pub struct Dbs {
    pub privileges: DbJson,
    pub singletons: DbStr,
    pub users: DbJson,
    pub user_index: DbIndex,
}

/// Open (or create) the environment and its named databases
pub(crate) fn open(path: &Path, opts: &StoreOptions) -> Result<(Env, Dbs)> {
    std::fs::create_dir_all(path).map_err(err)?;
    // SAFETY: LMDB requires no other process to open this path concurrently with different options.
    let e = unsafe {
        EnvOpenOptions::new()
            .map_size(opts.map_size)
            .max_dbs(4)
            .open(path)
            .map_err(err)?
    };
    let mut tx = e.write_txn().map_err(err)?;
    let d = Dbs {
        privileges: e.create_database(&mut tx, Some(opts.privileges_db.as_str())).map_err(err)?,
        singletons: e.create_database(&mut tx, Some("singletons")).map_err(err)?,
        users: e.create_database(&mut tx, Some(opts.users_db.as_str())).map_err(err)?,
        user_index: e.create_database(&mut tx, Some("user_index")).map_err(err)?,
    };
    tx.commit().map_err(err)?;
    Ok((e, d))
}

/// Execute a read-only operation
#[inline]
pub(crate) fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(env: &Env, dbs: &Dbs, f: F) -> Result<T> {
    f(dbs, &env.read_txn().map_err(err)?)
}
