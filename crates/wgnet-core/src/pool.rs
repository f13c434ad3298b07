//! Tunnel address allocation.
//!
//! The pool keeps a bijection between host addresses of one subnet and
//! peer public keys, stored in two buckets (`pool` and `pool_keys`).
//! Every mutating call takes a [`WriteTx`], so the scan for a free slot
//! and the write of the new binding share one transaction and cannot
//! race another allocation.

use ipnet::Ipv4Net;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::debug;

use crate::error::CoreError;
use crate::model::PeerKey;
use crate::store::{Bucket, Snapshot, WriteTx};

type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone)]
pub struct AddressPool {
    subnet: Ipv4Net,
    reserved: BTreeSet<Ipv4Addr>,
}

impl AddressPool {
    /// Pool over the hosts of `subnet`, never handing out `reserved`.
    pub fn new(subnet: Ipv4Net, reserved: impl IntoIterator<Item = Ipv4Addr>) -> Result<Self> {
        let subnet = subnet.trunc();
        let reserved: BTreeSet<Ipv4Addr> = reserved.into_iter().collect();
        if let Some(outside) = reserved.iter().find(|addr| !subnet.contains(*addr)) {
            return Err(CoreError::validation(
                "reserved",
                format!("{outside} is outside {subnet}"),
            ));
        }
        Ok(Self { subnet, reserved })
    }

    /// Pool for a service whose own tunnel address is `server_inet`.
    pub fn for_server(server_inet: Ipv4Net) -> Result<Self> {
        Self::new(server_inet, [server_inet.addr()])
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// First and last assignable host, or `None` when the subnet has no
    /// room between its network and broadcast addresses.
    fn host_range(&self) -> Option<(u32, u32)> {
        let first = u32::from(self.subnet.network()).checked_add(1)?;
        let last = u32::from(self.subnet.broadcast()).checked_sub(1)?;
        (first <= last).then_some((first, last))
    }

    /// Number of addresses this pool can hand out in total.
    pub fn capacity(&self) -> u32 {
        let Some((first, last)) = self.host_range() else {
            return 0;
        };
        let reserved_inside = self
            .reserved
            .iter()
            .map(|addr| u32::from(*addr))
            .filter(|addr| (first..=last).contains(addr))
            .count();
        let reserved_inside = u32::try_from(reserved_inside).unwrap_or(u32::MAX);
        (last - first + 1).saturating_sub(reserved_inside)
    }

    fn ensure_member(&self, address: Ipv4Addr) -> Result<()> {
        match self.host_range() {
            Some((first, last)) if (first..=last).contains(&u32::from(address)) => Ok(()),
            _ => Err(CoreError::validation(
                "address",
                format!("{address} is not a host of {}", self.subnet),
            )),
        }
    }

    /// Binds `key` to the lowest free host address and returns it with
    /// the subnet's prefix length.
    pub fn allocate(&self, tx: &WriteTx, key: &PeerKey) -> Result<Ipv4Net> {
        if let Some(bound) = self.lookup_by_key(tx, key)? {
            return Err(CoreError::KeyAlreadyBound {
                address: bound.to_string(),
            });
        }

        let exhausted = || CoreError::PoolExhausted {
            subnet: self.subnet.to_string(),
        };
        let (first, last) = self.host_range().ok_or_else(exhausted)?;

        let taken: BTreeSet<u32> = self
            .bound_addresses(tx)?
            .into_iter()
            .chain(self.reserved.iter().copied())
            .map(u32::from)
            .collect();

        let mut candidate = first;
        for addr in taken.range(first..=last) {
            if *addr != candidate {
                break;
            }
            candidate += 1;
        }
        if candidate > last {
            return Err(exhausted());
        }

        let address = Ipv4Addr::from(candidate);
        self.bind(tx, address, key)?;
        debug!(%address, subnet = %self.subnet, "allocated address");

        Ipv4Net::new(address, self.subnet.prefix_len())
            .map_err(|e| CoreError::validation("subnet", e.to_string()))
    }

    /// Frees `address`. Releasing an unbound address is not an error.
    pub fn release(&self, tx: &WriteTx, address: Ipv4Addr) -> Result<()> {
        if let Some(key) = self.lookup(tx, address)? {
            tx.delete(Bucket::PoolKeys, key.as_bytes())?;
            tx.delete(Bucket::Pool, &address.octets())?;
            debug!(%address, "released address");
        }
        Ok(())
    }

    /// Replaces the key bound to an already allocated `address`.
    pub fn rebind(&self, tx: &WriteTx, address: Ipv4Addr, key: &PeerKey) -> Result<()> {
        self.ensure_member(address)?;
        match self.lookup_by_key(tx, key)? {
            Some(bound) if bound == address => return Ok(()),
            Some(bound) => {
                return Err(CoreError::KeyAlreadyBound {
                    address: bound.to_string(),
                });
            }
            None => {}
        }

        let old = self
            .lookup(tx, address)?
            .ok_or_else(|| CoreError::not_found("address", address))?;
        tx.delete(Bucket::PoolKeys, old.as_bytes())?;
        self.bind(tx, address, key)
    }

    #[allow(clippy::unused_self)]
    fn bind(&self, tx: &WriteTx, address: Ipv4Addr, key: &PeerKey) -> Result<()> {
        tx.put_raw(Bucket::Pool, &address.octets(), key.as_bytes())?;
        tx.put_raw(Bucket::PoolKeys, key.as_bytes(), &address.octets())
    }

    #[allow(clippy::unused_self)]
    pub fn lookup(&self, tx: &dyn Snapshot, address: Ipv4Addr) -> Result<Option<PeerKey>> {
        tx.get_raw(Bucket::Pool, &address.octets())?
            .map(|bytes| decode_key(&bytes))
            .transpose()
    }

    #[allow(clippy::unused_self)]
    pub fn lookup_by_key(&self, tx: &dyn Snapshot, key: &PeerKey) -> Result<Option<Ipv4Addr>> {
        tx.get_raw(Bucket::PoolKeys, key.as_bytes())?
            .map(|bytes| decode_address(&bytes))
            .transpose()
    }

    /// Every live binding, in ascending address order.
    #[allow(clippy::unused_self)]
    pub fn bindings(&self, tx: &dyn Snapshot) -> Result<Vec<(Ipv4Addr, PeerKey)>> {
        tx.scan_raw(Bucket::Pool)?
            .into_iter()
            .map(|(addr, key)| Ok((decode_address(&addr)?, decode_key(&key)?)))
            .collect()
    }

    #[allow(clippy::unused_self)]
    fn bound_addresses(&self, tx: &dyn Snapshot) -> Result<Vec<Ipv4Addr>> {
        tx.scan_raw(Bucket::Pool)?
            .into_iter()
            .map(|(addr, _)| decode_address(&addr))
            .collect()
    }
}

fn decode_address(bytes: &[u8]) -> Result<Ipv4Addr> {
    <[u8; 4]>::try_from(bytes)
        .map(Ipv4Addr::from)
        .map_err(|_| CoreError::Store {
            context: "decode address".into(),
            message: format!("expected 4 bytes, found {}", bytes.len()),
        })
}

fn decode_key(bytes: &[u8]) -> Result<PeerKey> {
    PeerKey::from_slice(bytes).ok_or_else(|| CoreError::Store {
        context: "decode key".into(),
        message: format!("expected 32 bytes, found {}", bytes.len()),
    })
}
