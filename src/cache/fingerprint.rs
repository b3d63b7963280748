//! Request fingerprinting.
//!
//! A fingerprint is a polynomial rolling hash over the raw bytes of an
//! inbound request. Byte-identical requests share a fingerprint. Distinct
//! requests may collide; collisions are not detected.

const SEED: u64 = 2317;
const MULTIPLIER: u64 = 37;

/// 64-bit cache key derived from raw request bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Hash `bytes` into a fingerprint.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hash(bytes))
    }
}

impl From<u64> for Fingerprint {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// `hash = hash * 37 + b` for every byte, starting from 2317, wrapping on overflow.
pub fn hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(SEED, |acc, &b| {
        acc.wrapping_mul(MULTIPLIER).wrapping_add(u64::from(b))
    })
}
