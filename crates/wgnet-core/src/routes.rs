//! Full-tunnel route expansion.
//!
//! Many peers cannot express "default route except these ranges", so a
//! requested `0.0.0.0/0` is replaced with an explicit list of prefixes
//! covering everything outside the excluded ranges. The exclusions are
//! plain data; [`RouteExpander::new`] turns them into the minimal set of
//! aligned CIDR blocks once, and [`RouteExpander::expand`] only
//! substitutes that table.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Ranges peers keep routing outside the tunnel by default.
pub const DEFAULT_EXCLUSIONS: &[(Ipv4Addr, u8)] = &[
    // "this" network
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    // private
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    // multicast and reserved
    (Ipv4Addr::new(224, 0, 0, 0), 3),
];

const SPACE: u64 = 1 << 32;

/// Parses [`DEFAULT_EXCLUSIONS`] into networks.
pub fn default_exclusions() -> Vec<Ipv4Net> {
    DEFAULT_EXCLUSIONS
        .iter()
        .filter_map(|(addr, prefix)| Ipv4Net::new(*addr, *prefix).ok())
        .collect()
}

#[derive(Debug, Clone)]
pub struct RouteExpander {
    exclusions: Vec<Ipv4Net>,
    partition: Vec<Ipv4Net>,
}

impl Default for RouteExpander {
    fn default() -> Self {
        Self::new(&default_exclusions())
    }
}

impl RouteExpander {
    pub fn new(exclusions: &[Ipv4Net]) -> Self {
        let exclusions: Vec<Ipv4Net> = exclusions.iter().map(Ipv4Net::trunc).collect();
        let partition = complement(&exclusions);
        Self {
            exclusions,
            partition,
        }
    }

    pub fn exclusions(&self) -> &[Ipv4Net] {
        &self.exclusions
    }

    /// Blocks covering every address outside the exclusions.
    pub fn partition(&self) -> &[Ipv4Net] {
        &self.partition
    }

    /// Returns `requested` unchanged unless it is exactly one default
    /// route, in which case the server subnet plus the partition is
    /// returned instead.
    pub fn expand(&self, server_subnet: Ipv4Net, requested: &[Ipv4Net]) -> Vec<Ipv4Net> {
        match requested {
            [route] if route.prefix_len() == 0 => {
                let mut routes = Vec::with_capacity(self.partition.len() + 1);
                routes.push(server_subnet.trunc());
                routes.extend_from_slice(&self.partition);
                routes
            }
            _ => requested.to_vec(),
        }
    }
}

/// Half-open `[start, end)` span of a network in u64 space.
fn span(net: &Ipv4Net) -> (u64, u64) {
    let start = u64::from(u32::from(net.network()));
    (start, start + (1_u64 << (32 - u32::from(net.prefix_len()))))
}

/// Minimal aligned blocks covering the gaps between merged exclusions.
fn complement(exclusions: &[Ipv4Net]) -> Vec<Ipv4Net> {
    let mut spans: Vec<(u64, u64)> = exclusions.iter().map(span).collect();
    spans.sort_unstable();

    let mut blocks = Vec::new();
    let mut cursor = 0_u64;
    for (start, end) in spans {
        if start > cursor {
            decompose(cursor, start, &mut blocks);
        }
        cursor = cursor.max(end);
    }
    if cursor < SPACE {
        decompose(cursor, SPACE, &mut blocks);
    }
    blocks
}

/// Longest-prefix decomposition of `[start, end)`.
fn decompose(mut start: u64, end: u64, out: &mut Vec<Ipv4Net>) {
    while start < end {
        let alignment = if start == 0 {
            SPACE
        } else {
            1 << start.trailing_zeros()
        };
        let mut size = alignment;
        while size > end - start {
            size >>= 1;
        }

        let prefix = u8::try_from(32 - size.trailing_zeros()).ok();
        let addr = u32::try_from(start).ok().map(Ipv4Addr::from);
        if let Some(net) = addr
            .zip(prefix)
            .and_then(|(addr, prefix)| Ipv4Net::new(addr, prefix).ok())
        {
            out.push(net);
        }
        start += size;
    }
}
