//! CIDR arithmetic for network validation and pool sizing
//!
//! Pure helpers over [`ipnet`] types. Family enforcement happens here: a
//! v6 literal handed to [`parse_v4`] (or the reverse) is an error, so call
//! sites never need to re-check which family a field carried.

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};

use crate::Error;

/// Ceiling on the joint size of the v4 and v6 allocation bitsets (bits)
pub const MAX_ALLOC_BITS: u128 = 8_388_608;

/// Prefix length of the default IPv6 allocation pool carved out of `net6`
///
/// A /105 holds exactly [`MAX_ALLOC_BITS`] addresses, the largest pool a
/// per-address bitset may track.
pub const V6_POOL_DEFAULT_PREFIX: u8 = 105;

/// Parse an IPv4 CIDR, normalized to its network address
pub fn parse_v4(text: &str) -> Result<Ipv4Net, Error> {
    text.parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|_| Error::validation(format!("{text} is not a valid IPv4 network")))
}

/// Parse an IPv6 CIDR, normalized to its network address
pub fn parse_v6(text: &str) -> Result<Ipv6Net, Error> {
    text.parse::<Ipv6Net>()
        .map(|net| net.trunc())
        .map_err(|_| Error::validation(format!("{text} is not a valid IPv6 network")))
}

/// Parse an IPv4 address
pub fn parse_v4_addr(text: &str) -> Result<Ipv4Addr, Error> {
    text.parse::<Ipv4Addr>()
        .map_err(|_| Error::validation(format!("{text} is not a valid IPv4 address")))
}

/// Parse an IPv6 address
pub fn parse_v6_addr(text: &str) -> Result<Ipv6Addr, Error> {
    text.parse::<Ipv6Addr>()
        .map_err(|_| Error::validation(format!("{text} is not a valid IPv6 address")))
}

/// Number of addresses covered by a v4 network
pub fn v4_capacity(net: &Ipv4Net) -> u128 {
    1u128 << (32 - net.prefix_len())
}

/// Number of addresses covered by a v6 network, saturating at `u128::MAX`
pub fn v6_capacity(net: &Ipv6Net) -> u128 {
    match 128 - net.prefix_len() {
        128 => u128::MAX,
        shift => 1u128 << shift,
    }
}

/// The usable host range of a v4 network: everything between the network
/// and broadcast addresses. `None` for /31 and /32 networks.
pub fn v4_usable_range(net: &Ipv4Net) -> Option<(Ipv4Addr, Ipv4Addr)> {
    if net.prefix_len() > 30 {
        return None;
    }
    let first = Ipv4Addr::from(u32::from(net.network()) + 1);
    let last = Ipv4Addr::from(u32::from(net.broadcast()) - 1);
    Some((first, last))
}

/// Zero-based position of `addr` inside `net`
pub fn v4_offset(net: &Ipv4Net, addr: Ipv4Addr) -> usize {
    (u32::from(addr) - u32::from(net.network())) as usize
}

/// The default IPv6 allocation pool for `net6`: the network itself when it
/// is /105 or smaller, otherwise its last /105.
pub fn default_pool6_cidr(net6: &Ipv6Net) -> Ipv6Net {
    if net6.prefix_len() >= V6_POOL_DEFAULT_PREFIX {
        return net6.trunc();
    }
    let pool_base = u128::from(net6.network()) + v6_capacity(net6)
        - (1u128 << (128 - V6_POOL_DEFAULT_PREFIX));
    Ipv6Net::new(Ipv6Addr::from(pool_base), V6_POOL_DEFAULT_PREFIX)
        .expect("prefix length is a constant below 128")
}
