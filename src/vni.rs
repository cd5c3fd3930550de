//! VNI range sets and allocation bitsets
//!
//! A tenant interface profile declares which virtual network identifiers
//! (VLAN or VXLAN IDs) tenants may claim on a host device, as a textual
//! range like `"900-4999,5000"`. Occupancy is tracked in a bitset spanning
//! `[lo, hi]` of the range: bit `i` set means VNI `lo + i` is reserved.
//! The bitset is stored big-endian and base64-encoded inside the persisted
//! tenant config.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::Error;

/// Highest VLAN ID assignable through a tenant profile
pub const VLAN_ID_MAX: u32 = 4_999;

/// Highest VXLAN ID assignable through a tenant profile
pub const VXLAN_ID_MAX: u32 = 16_000_000;

/// The kind of virtual network identifier an interface profile hands out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VniType {
    /// 802.1q VLAN ID
    Vlan,
    /// VXLAN network identifier
    Vxlan,
}

impl VniType {
    /// Highest VNI value a range of this type may declare
    pub fn ceiling(self) -> u32 {
        match self {
            Self::Vlan => VLAN_ID_MAX,
            Self::Vxlan => VXLAN_ID_MAX,
        }
    }
}

impl FromStr for VniType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vlan" => Ok(Self::Vlan),
            "vxlan" => Ok(Self::Vxlan),
            _ => Err(Error::validation(format!(
                "invalid vniType: {s}, expected one of: vlan, vxlan"
            ))),
        }
    }
}

impl fmt::Display for VniType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vlan => write!(f, "vlan"),
            Self::Vxlan => write!(f, "vxlan"),
        }
    }
}

/// A parsed VNI range: one or more segments of the form `N` or `N-M`
///
/// Values covered by `[lo, hi]` but outside every segment exist in the
/// backing bitset yet are never offered for allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VniRange {
    segments: Vec<(u32, u32)>,
    lo: u32,
    hi: u32,
}

impl VniRange {
    /// Parse a textual range (`SEG(,SEG)*` with `SEG = N | N-M`, `N <= M`)
    /// against the ceiling of the given VNI type.
    pub fn parse(text: &str, vni_type: VniType) -> Result<Self, Error> {
        if text.is_empty() {
            return Err(Error::validation("vniRange must not be empty"));
        }
        let mut segments = Vec::new();
        let mut lo = u32::MAX;
        let mut hi = 0;
        for seg in text.split(',') {
            let (start, end) = match seg.split_once('-') {
                Some((a, b)) => (parse_vni(a)?, parse_vni(b)?),
                None => {
                    let v = parse_vni(seg)?;
                    (v, v)
                }
            };
            if start > end {
                return Err(Error::validation(format!(
                    "invalid vniRange segment {seg}: start is greater than end"
                )));
            }
            if end > vni_type.ceiling() {
                return Err(Error::validation(format!(
                    "vniRange segment {seg} exceeds the {vni_type} ceiling of {}",
                    vni_type.ceiling()
                )));
            }
            lo = lo.min(start);
            hi = hi.max(end);
            segments.push((start, end));
        }
        segments.sort_unstable();
        Ok(Self { segments, lo, hi })
    }

    /// Lowest VNI covered by the range
    pub fn lo(&self) -> u32 {
        self.lo
    }

    /// Highest VNI covered by the range
    pub fn hi(&self) -> u32 {
        self.hi
    }

    /// Number of bits in the backing bitset (`hi - lo + 1`)
    pub fn span(&self) -> usize {
        (self.hi - self.lo + 1) as usize
    }

    /// Number of bytes of an allocation bitset matching this range
    pub fn encoded_len(&self) -> usize {
        self.span().div_ceil(8)
    }

    /// Whether `vni` falls inside one of the declared segments
    pub fn contains(&self, vni: u32) -> bool {
        self.segments.iter().any(|&(a, b)| a <= vni && vni <= b)
    }
}

fn parse_vni(token: &str) -> Result<u32, Error> {
    token.trim().parse::<u32>().map_err(|_| {
        Error::validation(format!("invalid vniRange: {token} is not a number"))
    })
}

/// Occupancy bitset over a [`VniRange`]
///
/// Bytes are big-endian: bit 0 is the most significant bit of byte 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocBitmap {
    bytes: Vec<u8>,
}

impl AllocBitmap {
    /// A fresh all-zero bitset sized for `range`
    pub fn zeroed(range: &VniRange) -> Self {
        Self {
            bytes: vec![0u8; range.encoded_len()],
        }
    }

    /// Decode a base64-encoded bitset
    pub fn decode(encoded: &str) -> Result<Self, Error> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::validation(format!("allocation bitset is not valid base64: {e}")))?;
        Ok(Self { bytes })
    }

    /// Encode the bitset as base64 for storage
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Whether the byte length matches what `range` requires
    pub fn matches(&self, range: &VniRange) -> bool {
        self.bytes.len() == range.encoded_len()
    }

    /// Whether `vni` is reserved. `vni` must lie within `[lo, hi]`.
    pub fn test(&self, range: &VniRange, vni: u32) -> bool {
        let idx = (vni - range.lo()) as usize;
        self.bytes[idx / 8] & (0x80 >> (idx % 8)) != 0
    }

    /// Reserve `vni`. `vni` must lie within `[lo, hi]`.
    pub fn set(&mut self, range: &VniRange, vni: u32) {
        let idx = (vni - range.lo()) as usize;
        self.bytes[idx / 8] |= 0x80 >> (idx % 8);
    }

    /// Lowest free VNI inside the declared segments, if any
    pub fn first_free(&self, range: &VniRange) -> Option<u32> {
        for &(start, end) in &range.segments {
            for vni in start..=end {
                if !self.test(range, vni) {
                    return Some(vni);
                }
            }
        }
        None
    }
}
