//! Tunable thresholds and pass toggles, read from the environment.
//!
//! Mirrors the `EnvParam` toggle pattern used to gate preprocessing passes
//! in the teacher's planning crate: each knob is a `static EnvParam<T>`
//! with a sensible default, overridable by setting the named environment
//! variable before the parameter is first read.

use env_param::EnvParam;

/// Above this many (state-projection x action-projection) combinations, an
/// `Evaluable` falls back from `VECTOR` caching to `MAP` caching.
pub static VECTOR_CACHE_THRESHOLD: EnvParam<usize> = EnvParam::new("RDDL_VECTOR_CACHE_THRESHOLD", "1048576");

/// Above this many combinations, an `Evaluable` falls back from `MAP`
/// caching to no caching at all (`NONE`).
pub static MAP_CACHE_THRESHOLD: EnvParam<usize> = EnvParam::new("RDDL_MAP_CACHE_THRESHOLD", "16777216");

/// Maximum domain size `d` of a single fluent admitted into a Kleene
/// bitmask radix (`2^d`); see spec §9 "Kleene domain radix".
pub static MAX_KLEENE_DOMAIN_SIZE: EnvParam<u32> = EnvParam::new("RDDL_MAX_KLEENE_DOMAIN_SIZE", "30");

/// Maximum number of legal ground actions the solver may enumerate before
/// the pipeline aborts (spec §5, Resource discipline).
pub static MAX_LEGAL_ACTIONS: EnvParam<usize> = EnvParam::new("RDDL_MAX_LEGAL_ACTIONS", "1000000");

/// Whether the FDR-generation pass (mutex-clique merging) is enabled.
pub static ENABLE_FDR_GENERATION: EnvParam<bool> = EnvParam::new("RDDL_ENABLE_FDR", "true");

/// Maximum number of distinct states the exhaustive-MDP enumerator (spec
/// §6 "Exhaustive enumeration output") may discover before aborting, the
/// downstream analogue of `ExhaustiveMDPGenerator::maxStates`.
pub static MAX_ENUMERATED_STATES: EnvParam<usize> = EnvParam::new("RDDL_MAX_ENUMERATED_STATES", "1000000");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        assert_eq!(VECTOR_CACHE_THRESHOLD.get(), 1 << 20);
        assert_eq!(MAP_CACHE_THRESHOLD.get(), 1 << 24);
        assert_eq!(MAX_KLEENE_DOMAIN_SIZE.get(), 30);
        assert!(ENABLE_FDR_GENERATION.get());
    }
}
