//! The state-fluent hash-key scheme (C4): mixed-radix encoding of a
//! dependent-fluent projection into a single non-negative integer, used
//! to index `Evaluable` caches in O(1) (spec §4.4).

use crate::config::{MAP_CACHE_THRESHOLD, VECTOR_CACHE_THRESHOLD};

/// Which data structure an `Evaluable`'s cache uses, chosen from the
/// footprint of its dependencies (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingType {
    /// Too many influencing variables to index at all; always recompute.
    None,
    /// Footprint exceeds the VECTOR threshold but memoization is still
    /// worthwhile.
    Map,
    /// `disable_caching()` was called: reads hit the cache, writes don't.
    DisabledMap,
    /// Footprint is small enough for direct vector indexing.
    Vector,
}

/// A single fluent's contribution to a mixed-radix hash key: `base` is the
/// multiplier and `domain_size` the radix of the next fluent in the chain.
#[derive(Debug, Clone, Copy)]
pub struct RadixEntry {
    pub base: i64,
    pub domain_size: i64,
}

/// Assigns `base_1 = 1`, `base_j = base_{j-1} * domain_size_{j-1}` for an
/// ordered list of dependent-fluent domain sizes (spec §4.4). Returns the
/// per-fluent bases together with the total projection count (`Π d_j`).
pub fn assign_bases(domain_sizes: &[usize]) -> (Vec<RadixEntry>, i64) {
    assign_bases_from(domain_sizes, 1)
}

/// Same as `assign_bases`, but the radix chain starts at `start` instead of
/// `1`. Used to fold an evaluable's action-hash-key range into its state
/// fluent bases (spec §4.2 "Action hash keys" composition: the first state
/// fluent's base is the number of distinct action projections, so summing
/// a state contribution with an action contribution can never collide --
/// the action picks the low digit, the state fluents the higher ones).
pub fn assign_bases_from(domain_sizes: &[usize], start: i64) -> (Vec<RadixEntry>, i64) {
    let mut bases = Vec::with_capacity(domain_sizes.len());
    let mut base: i64 = start.max(1);
    for &d in domain_sizes {
        bases.push(RadixEntry {
            base,
            domain_size: d as i64,
        });
        base = base.saturating_mul(d as i64);
    }
    (bases, base)
}

/// Same as `assign_kleene_bases`, but the radix chain starts at `start`
/// (see `assign_bases_from`).
pub fn assign_kleene_bases_from(domain_sizes: &[usize], start: i64) -> (Vec<RadixEntry>, i64) {
    let radices: Vec<usize> = domain_sizes.iter().map(|&d| 1usize << d).collect();
    assign_bases_from(&radices, start)
}

/// Same as `assign_bases`, but for the Kleene interpretation each fluent
/// contributes a bitmask over its domain (radix `2^d`) rather than `d`
/// itself (spec §4.4 "Kleene domain radix"), since a Kleene slot holds a
/// *set* of at most `d` values.
pub fn assign_kleene_bases(domain_sizes: &[usize]) -> (Vec<RadixEntry>, i64) {
    assign_kleene_bases_from(domain_sizes, 1)
}

/// Chooses the caching strategy for a footprint of `state_projections *
/// action_projections` combinations (spec §4.2, §4.4, §9 thresholds).
pub fn choose_caching_type(state_projections: i64, action_projections: i64) -> CachingType {
    let footprint = state_projections.saturating_mul(action_projections.max(1));
    if footprint <= VECTOR_CACHE_THRESHOLD.get() as i64 {
        CachingType::Vector
    } else if footprint <= MAP_CACHE_THRESHOLD.get() as i64 {
        CachingType::Map
    } else {
        CachingType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bases_are_mixed_radix() {
        let (bases, total) = assign_bases(&[2, 3, 4]);
        assert_eq!(bases[0].base, 1);
        assert_eq!(bases[1].base, 2);
        assert_eq!(bases[2].base, 6);
        assert_eq!(total, 24);
    }

    #[test]
    fn kleene_bases_use_power_of_two_radix() {
        let (bases, total) = assign_kleene_bases(&[2, 3]);
        assert_eq!(bases[0].base, 1);
        assert_eq!(bases[1].base, 4); // 2^2
        assert_eq!(total, 32); // 2^2 * 2^3
    }

    #[test]
    fn bases_from_offset_fold_the_start_into_every_base() {
        let (bases, total) = assign_bases_from(&[2, 3], 4);
        assert_eq!(bases[0].base, 4);
        assert_eq!(bases[1].base, 8); // 4 * 2
        assert_eq!(total, 24); // 4 * 2 * 3
    }

    #[test]
    fn small_footprint_selects_vector() {
        assert_eq!(choose_caching_type(16, 4), CachingType::Vector);
    }

    #[test]
    fn huge_footprint_selects_none() {
        assert_eq!(choose_caching_type(1 << 30, 1 << 10), CachingType::None);
    }
}
