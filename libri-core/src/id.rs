//! 256-bit identifiers and the XOR metric (spec C1).
//!
//! The same `Id` type is used for peer node IDs and document keys: both live in the same
//! 256-bit space and are compared under the same XOR metric.

use std::cmp::Ordering;
use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

pub const ID_LEN: usize = 32;
pub const ID_BITS: u32 = (ID_LEN as u32) * 8;

/// A 256-bit unsigned integer, compared lexicographically on its big-endian byte form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id([u8; ID_LEN]);

impl Id {
    pub const ZERO: Id = Id([0u8; ID_LEN]);
    pub const MAX: Id = Id([0xffu8; ID_LEN]);

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Id(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ID_LEN {
            return None;
        }
        let mut out = [0u8; ID_LEN];
        out.copy_from_slice(bytes);
        Some(Id(out))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// A reproducibly-seeded random ID, for tests and bootstrap-target selection.
    pub fn random(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; ID_LEN];
        rng.fill_bytes(&mut bytes);
        Id(bytes)
    }

    /// Returns the bit at position `i` (0 = most significant bit).
    pub fn bit(&self, i: u32) -> bool {
        let byte = self.0[(i / 8) as usize];
        let shift = 7 - (i % 8);
        (byte >> shift) & 1 == 1
    }

    /// XOR distance to `other`, itself an `Id` (compared as an unsigned integer).
    pub fn distance(&self, other: &Id) -> Id {
        let mut out = [0u8; ID_LEN];
        for i in 0..ID_LEN {
            out[i] = self.0[i] ^ other.0[i];
        }
        Id(out)
    }

    /// Common-prefix-length in bits: the number of leading equal bits between `self` and
    /// `other`. Ranges over `0..=256`; `256` means the IDs are identical.
    pub fn cpl(&self, other: &Id) -> u32 {
        for i in 0..ID_LEN {
            let x = self.0[i] ^ other.0[i];
            if x != 0 {
                return (i as u32) * 8 + x.leading_zeros();
            }
        }
        ID_BITS
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Returns a copy of `self` with bit `i` forced to `value` (0 = most significant bit).
    pub fn with_bit(&self, i: u32, value: bool) -> Id {
        let mut out = self.0;
        let byte_idx = (i / 8) as usize;
        let shift = 7 - (i % 8);
        if value {
            out[byte_idx] |= 1 << shift;
        } else {
            out[byte_idx] &= !(1 << shift);
        }
        Id(out)
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
