//! Trusted source addresses.
//!
//! A single sorted set kept under one settings key. A missing key reads
//! as the empty set, so the set comes into existence on first write.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::info;

use crate::error::CoreError;
use crate::store::{Bucket, Snapshot, SnapshotExt, WriteTx};

type Result<T> = std::result::Result<T, CoreError>;

const TRUST_SET_KEY: &[u8] = b"trust_set";

#[derive(Debug, Clone, Copy, Default)]
pub struct TrustSet;

#[allow(clippy::unused_self)]
impl TrustSet {
    pub fn list(self, tx: &dyn Snapshot) -> Result<BTreeSet<Ipv4Addr>> {
        Ok(tx
            .get_json(Bucket::Settings, TRUST_SET_KEY)?
            .unwrap_or_default())
    }

    /// Inserts `address`. Returns whether it was newly added.
    pub fn add(self, tx: &WriteTx, address: Ipv4Addr) -> Result<bool> {
        let mut set = self.list(tx)?;
        let added = set.insert(address);
        if added {
            tx.put_json(Bucket::Settings, TRUST_SET_KEY, &set)?;
            info!(%address, "trusted address added");
        }
        Ok(added)
    }

    /// Deletes `address`. Returns whether it was present.
    pub fn remove(self, tx: &WriteTx, address: Ipv4Addr) -> Result<bool> {
        let mut set = self.list(tx)?;
        let removed = set.remove(&address);
        if removed {
            tx.put_json(Bucket::Settings, TRUST_SET_KEY, &set)?;
            info!(%address, "trusted address removed");
        }
        Ok(removed)
    }

    /// Replaces the whole set, used when bootstrapping a fresh database.
    pub fn replace(
        self,
        tx: &WriteTx,
        addresses: impl IntoIterator<Item = Ipv4Addr>,
    ) -> Result<BTreeSet<Ipv4Addr>> {
        let set: BTreeSet<Ipv4Addr> = addresses.into_iter().collect();
        tx.put_json(Bucket::Settings, TRUST_SET_KEY, &set)?;
        info!(count = set.len(), "trusted address set replaced");
        Ok(set)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::tests::temp_store;

    const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    #[test]
    fn starts_empty() {
        let (_dir, store) = temp_store();
        assert!(store.read(|tx| TrustSet.list(tx)).unwrap().is_empty());
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let (_dir, store) = temp_store();

        assert!(store.write(|tx| TrustSet.add(tx, A)).unwrap());
        assert!(!store.write(|tx| TrustSet.add(tx, A)).unwrap());
        assert!(store.write(|tx| TrustSet.add(tx, B)).unwrap());

        let listed: Vec<_> = store.read(|tx| TrustSet.list(tx)).unwrap().into_iter().collect();
        assert_eq!(listed, vec![B, A]);

        assert!(store.write(|tx| TrustSet.remove(tx, A)).unwrap());
        assert!(!store.write(|tx| TrustSet.remove(tx, A)).unwrap());
        assert_eq!(store.read(|tx| TrustSet.list(tx)).unwrap().len(), 1);
    }

    #[test]
    fn replace_dedups() {
        let (_dir, store) = temp_store();
        store.write(|tx| TrustSet.add(tx, B)).unwrap();
        let set = store
            .write(|tx| TrustSet.replace(tx, [A, A]))
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(store.read(|tx| TrustSet.list(tx)).unwrap(), set);
    }
}
