//! # Chain Weight
//!
//! The single fork-choice ordering: `total_qn` first, then the provable value
//! derived from a header's `prove_value`.

use crate::entities::{BlockHeader, U256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparable weight of the chain ending at some header.
///
/// Field order matters: the derived `Ord` compares `total_qn` before `pv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct ChainWeight {
    pub total_qn: u64,
    pub pv: U256,
}

impl ChainWeight {
    pub fn new(total_qn: u64, pv: U256) -> Self {
        Self { total_qn, pv }
    }

    /// Weight of `header` using the default provable-value function.
    pub fn of(header: &BlockHeader) -> Self {
        Self::new(header.total_qn, default_prove_value(&header.prove_value))
    }
}

impl fmt::Display for ChainWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qn={} pv={:#x}", self.total_qn, self.pv)
    }
}

/// Default provable value: the first 32 bytes of the proof read as a
/// big-endian integer. Genesis (empty proof) maps to zero.
pub fn default_prove_value(prove_value: &[u8]) -> U256 {
    let len = prove_value.len().min(32);
    U256::from_big_endian(&prove_value[..len])
}

/// Compare two headers by default chain weight.
pub fn compare_weight(a: &BlockHeader, b: &BlockHeader) -> Ordering {
    ChainWeight::of(a).cmp(&ChainWeight::of(b))
}
