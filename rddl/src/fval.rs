//! A totally-ordered, hashable wrapper around `f64`.
//!
//! All fluent domains in this crate are bounded integer-valued
//! discretizations (spec.md §1 Non-goals), so every value that ever flows
//! through a `Domain`, `KleeneState` or `DiscretePD` is an exact integer
//! representable in `f64`; comparing and hashing on bit pattern is safe
//! (no NaNs, no meaningful `-0.0` vs `0.0` distinction arise in practice).

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct FVal(pub f64);

impl FVal {
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for FVal {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for FVal {}

impl Hash for FVal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for FVal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FVal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

impl From<f64> for FVal {
    fn from(v: f64) -> Self {
        FVal(v)
    }
}

impl From<FVal> for f64 {
    fn from(v: FVal) -> Self {
        v.0
    }
}
