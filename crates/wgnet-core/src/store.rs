//! Embedded transactional store backed by redb.
//!
//! Every bucket maps raw byte keys to raw byte values. IPv4 keys are
//! stored as 4 big-endian octets so a table scan walks addresses in
//! numeric order. Structured values are JSON.
//!
//! Work happens inside [`Store::read`] or [`Store::write`]: the closure
//! receives a transaction handle, and the transaction is committed when
//! the closure returns `Ok` and aborted on every other exit path. redb
//! serializes writers, so anything done inside one `write` call is
//! atomic with respect to every other writer.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{CoreError, storage};

type Result<T> = std::result::Result<T, CoreError>;
type RawTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

/// Logical buckets in the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Users,
    Devices,
    /// address -> bound public key
    Pool,
    /// public key -> bound address
    PoolKeys,
    Domains,
    Settings,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Users,
        Bucket::Devices,
        Bucket::Pool,
        Bucket::PoolKeys,
        Bucket::Domains,
        Bucket::Settings,
    ];

    fn definition(self) -> RawTable {
        TableDefinition::new(match self {
            Bucket::Users => "users",
            Bucket::Devices => "devices",
            Bucket::Pool => "pool",
            Bucket::PoolKeys => "pool_keys",
            Bucket::Domains => "domains",
            Bucket::Settings => "settings",
        })
    }
}

// ── Store ────────────────────────────────────────────────────────────

/// Handle to the database file. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Opens or creates the database at `path`, creating every bucket.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(storage("create database directory"))?;
        }

        let db = Database::create(path).map_err(storage("open database"))?;

        let txn = db.begin_write().map_err(storage("begin write"))?;
        for bucket in Bucket::ALL {
            txn.open_table(bucket.definition())
                .map_err(storage("create table"))?;
        }
        txn.commit().map_err(storage("commit"))?;

        info!(path = %path.display(), "opened store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Runs `op` inside a read-only snapshot.
    pub fn read<T>(&self, op: impl FnOnce(&ReadTx) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_read().map_err(storage("begin read"))?;
        op(&ReadTx { txn })
    }

    /// Runs `op` inside the single writable transaction.
    ///
    /// Commits on `Ok`, aborts on `Err`. The error from `op` always wins
    /// over a failed abort.
    pub fn write<T>(&self, op: impl FnOnce(&WriteTx) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write().map_err(storage("begin write"))?;
        let tx = WriteTx { txn };

        match op(&tx) {
            Ok(value) => {
                tx.txn.commit().map_err(storage("commit"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = tx.txn.abort() {
                    warn!(error = %abort_err, "abort failed after rejected write");
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

// ── Snapshot surface ─────────────────────────────────────────────────

/// Read access shared by read-only and writable transactions.
pub trait Snapshot {
    fn get_raw(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries of `bucket` in key order.
    fn scan_raw(&self, bucket: Bucket) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Typed JSON helpers over any [`Snapshot`].
pub trait SnapshotExt: Snapshot {
    fn get_json<T: DeserializeOwned>(&self, bucket: Bucket, key: &[u8]) -> Result<Option<T>> {
        self.get_raw(bucket, key)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(storage("decode record")))
            .transpose()
    }

    fn scan_json<T: DeserializeOwned>(&self, bucket: Bucket) -> Result<Vec<T>> {
        self.scan_raw(bucket)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(storage("decode record")))
            .collect()
    }
}

impl<S: Snapshot + ?Sized> SnapshotExt for S {}

fn get_from<T>(table: &T, key: &[u8]) -> Result<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table
        .get(key)
        .map_err(storage("read"))?
        .map(|guard| guard.value().to_vec()))
}

fn scan_from<T>(table: &T) -> Result<Vec<(Vec<u8>, Vec<u8>)>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut entries = Vec::new();
    for item in table.iter().map_err(storage("iterate"))? {
        let (key, value) = item.map_err(storage("iterate"))?;
        entries.push((key.value().to_vec(), value.value().to_vec()));
    }
    Ok(entries)
}

// ── Transactions ─────────────────────────────────────────────────────

pub struct ReadTx {
    txn: ReadTransaction,
}

impl Snapshot for ReadTx {
    fn get_raw(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self
            .txn
            .open_table(bucket.definition())
            .map_err(storage("open table"))?;
        get_from(&table, key)
    }

    fn scan_raw(&self, bucket: Bucket) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self
            .txn
            .open_table(bucket.definition())
            .map_err(storage("open table"))?;
        scan_from(&table)
    }
}

pub struct WriteTx {
    txn: WriteTransaction,
}

impl WriteTx {
    pub fn put_raw(&self, bucket: Bucket, key: &[u8], value: &[u8]) -> Result<()> {
        let mut table = self
            .txn
            .open_table(bucket.definition())
            .map_err(storage("open table"))?;
        table.insert(key, value).map_err(storage("write"))?;
        Ok(())
    }

    pub fn put_json<T: Serialize>(&self, bucket: Bucket, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(storage("encode record"))?;
        self.put_raw(bucket, key, &bytes)
    }

    /// Removes `key`, returning whether it was present.
    pub fn delete(&self, bucket: Bucket, key: &[u8]) -> Result<bool> {
        let mut table = self
            .txn
            .open_table(bucket.definition())
            .map_err(storage("open table"))?;
        let removed = table.remove(key).map_err(storage("delete"))?;
        Ok(removed.is_some())
    }
}

impl Snapshot for WriteTx {
    fn get_raw(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let table = self
            .txn
            .open_table(bucket.definition())
            .map_err(storage("open table"))?;
        get_from(&table, key)
    }

    fn scan_raw(&self, bucket: Bucket) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = self
            .txn
            .open_table(bucket.definition())
            .map_err(storage("open table"))?;
        scan_from(&table)
    }
}
