//! Authoritative DNS zone state.
//!
//! Each operation loads a domain, applies one change through
//! [`Domain`]'s own methods, and writes it back inside the caller's
//! transaction. A rejected change returns before anything is written.

use std::net::Ipv4Addr;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{ARecord, CnameRecord, DnsRecord, Domain, validate_domain_name};
use crate::store::{Bucket, Snapshot, SnapshotExt, WriteTx};

type Result<T> = std::result::Result<T, CoreError>;

/// How many CNAME hops [`ZoneStore::resolve`] follows.
pub const MAX_CNAME_DEPTH: usize = 5;

/// Answer to an address query against the zone.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Resolution {
    /// Names visited, starting with the queried one.
    pub chain: Vec<String>,
    pub addresses: Vec<ARecord>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneStore;

#[allow(clippy::unused_self)]
impl ZoneStore {
    pub fn create(self, tx: &WriteTx, name: &str) -> Result<Domain> {
        let name = validate_domain_name("name", name)?;
        if tx.get_raw(Bucket::Domains, name.as_bytes())?.is_some() {
            return Err(CoreError::AlreadyExists {
                entity_type: "domain".into(),
                identifier: name,
            });
        }

        let domain = Domain::new(name);
        store(tx, &domain)?;
        info!(name = %domain.name, "domain created");
        Ok(domain)
    }

    pub fn get(self, tx: &dyn Snapshot, name: &str) -> Result<Domain> {
        let name = validate_domain_name("name", name)?;
        tx.get_json(Bucket::Domains, name.as_bytes())?
            .ok_or_else(|| CoreError::not_found("domain", name))
    }

    pub fn list(self, tx: &dyn Snapshot) -> Result<Vec<Domain>> {
        tx.scan_json(Bucket::Domains)
    }

    /// Adds or replaces one record. A and CNAME never coexist.
    pub fn set(self, tx: &WriteTx, name: &str, record: DnsRecord) -> Result<Domain> {
        let record = match record {
            DnsRecord::Cname(rec) => DnsRecord::Cname(CnameRecord {
                target: validate_domain_name("target", &rec.target)?,
                ttl: rec.ttl,
            }),
            a @ DnsRecord::A(_) => a,
        };

        let mut domain = self.get(tx, name)?;
        let kind = record.kind();
        domain.apply(record)?;
        store(tx, &domain)?;
        info!(name = %domain.name, %kind, "record set");
        Ok(domain)
    }

    pub fn set_a(self, tx: &WriteTx, name: &str, record: ARecord) -> Result<Domain> {
        self.set(tx, name, DnsRecord::A(record))
    }

    pub fn set_cname(self, tx: &WriteTx, name: &str, record: CnameRecord) -> Result<Domain> {
        self.set(tx, name, DnsRecord::Cname(record))
    }

    /// Drops the A record for `address`; absent records are ignored.
    /// The flag tells whether a record was removed.
    pub fn remove_a(
        self,
        tx: &WriteTx,
        name: &str,
        address: Ipv4Addr,
    ) -> Result<(Domain, bool)> {
        let mut domain = self.get(tx, name)?;
        let removed = domain.remove_a(address);
        if removed {
            store(tx, &domain)?;
            info!(name = %domain.name, %address, "A record removed");
        }
        Ok((domain, removed))
    }

    /// Clears the CNAME only if it points at `target`.
    pub fn remove_cname(
        self,
        tx: &WriteTx,
        name: &str,
        target: &str,
    ) -> Result<(Domain, bool)> {
        let mut domain = self.get(tx, name)?;
        let removed = domain.remove_cname(target);
        if removed {
            store(tx, &domain)?;
            info!(name = %domain.name, target, "CNAME record removed");
        }
        Ok((domain, removed))
    }

    pub fn remove(self, tx: &WriteTx, name: &str) -> Result<()> {
        let name = validate_domain_name("name", name)?;
        if !tx.delete(Bucket::Domains, name.as_bytes())? {
            return Err(CoreError::not_found("domain", name));
        }
        info!(%name, "domain removed");
        Ok(())
    }

    /// Follows CNAMEs from `name` until a domain with A records is found.
    ///
    /// A target outside the zone, or a chain longer than
    /// [`MAX_CNAME_DEPTH`] hops, ends the chase with the names visited so
    /// far and no addresses.
    pub fn resolve(self, tx: &dyn Snapshot, name: &str) -> Result<Resolution> {
        let mut domain = self.get(tx, name)?;
        let mut chain = vec![domain.name.clone()];

        while let Some(cname) = domain.cname.take() {
            if chain.len() > MAX_CNAME_DEPTH {
                debug!(%name, hops = MAX_CNAME_DEPTH, "CNAME chain cut short");
                return Ok(Resolution {
                    chain,
                    addresses: Vec::new(),
                });
            }
            debug!(from = %domain.name, to = %cname.target, "following CNAME");
            domain = match self.get(tx, &cname.target) {
                Ok(next) => next,
                Err(CoreError::NotFound { .. }) => {
                    chain.push(cname.target);
                    return Ok(Resolution {
                        chain,
                        addresses: Vec::new(),
                    });
                }
                Err(err) => return Err(err),
            };
            chain.push(domain.name.clone());
        }

        Ok(Resolution {
            chain,
            addresses: domain.a,
        })
    }
}

fn store(tx: &WriteTx, domain: &Domain) -> Result<()> {
    tx.put_json(Bucket::Domains, domain.name.as_bytes(), domain)
}
