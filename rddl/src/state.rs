//! State representations (C3), transcribed field-for-field from
//! `original_source/src/rddl_parser/states.h`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};

use crate::fval::FVal;

/// A concrete state: one real value per surviving state fluent, plus the
/// per-`Evaluable` partial hash-key sums (spec §4.2 "State fluent hash
/// keys") indexed by `Evaluable::hash_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    values: Vec<f64>,
    /// `hash_keys[hash_index]` is this state's contribution to the hash
    /// key of the `Evaluable` whose `hash_index` is `hash_index`.
    hash_keys: Vec<i64>,
}

impl State {
    pub fn new(size: usize) -> Self {
        State {
            values: vec![0.0; size],
            hash_keys: Vec::new(),
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        State {
            values,
            hash_keys: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Resizes the hash-key vector; called once by the Evaluable factory
    /// after all evaluables have been assigned a `hash_index` (spec §3
    /// invariant: "Caches on an Evaluable are sized exactly once").
    pub fn resize_hash_keys(&mut self, len: usize) {
        self.hash_keys = vec![0; len];
    }

    pub fn state_fluent_hash_key(&self, hash_index: i64) -> i64 {
        if hash_index < 0 {
            0
        } else {
            self.hash_keys[hash_index as usize]
        }
    }

    pub fn set_state_fluent_hash_key(&mut self, hash_index: usize, key: i64) {
        self.hash_keys[hash_index] = key;
    }

    pub fn add_to_state_fluent_hash_key(&mut self, hash_index: usize, delta: i64) {
        self.hash_keys[hash_index] += delta;
    }

    /// Lexicographic ordering that walks from the *last* index to the
    /// first, reflecting that low-index fluents are the fastest-changing
    /// in enumeration (spec §4.3).
    pub fn cmp_packed(&self, other: &State) -> Ordering {
        debug_assert_eq!(self.values.len(), other.values.len());
        for i in (0..self.values.len()).rev() {
            match self.values[i].partial_cmp(&other.values[i]).unwrap_or(Ordering::Equal) {
                Ordering::Equal => continue,
                o => return o,
            }
        }
        Ordering::Equal
    }
}

impl Index<usize> for State {
    type Output = f64;
    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl IndexMut<usize> for State {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.values[index]
    }
}

/// A finite-support discrete probability distribution over `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretePD {
    /// (value, probability) pairs. Probabilities sum to 1 for a
    /// well-formed distribution; this is not asserted here since a CPF
    /// may build one up incrementally before normalizing.
    support: Vec<(f64, f64)>,
}

impl DiscretePD {
    pub fn deterministic(value: f64) -> Self {
        DiscretePD {
            support: vec![(value, 1.0)],
        }
    }

    pub fn new(support: Vec<(f64, f64)>) -> Self {
        DiscretePD { support }
    }

    pub fn is_deterministic(&self) -> bool {
        self.support.len() == 1
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.support.iter().map(|(v, _)| *v)
    }

    pub fn support(&self) -> &[(f64, f64)] {
        &self.support
    }

    /// The single value of a deterministic distribution.
    pub fn deterministic_value(&self) -> Option<f64> {
        if self.is_deterministic() {
            Some(self.support[0].0)
        } else {
            None
        }
    }
}

impl Default for DiscretePD {
    fn default() -> Self {
        DiscretePD::deterministic(0.0)
    }
}

impl PartialOrd for DiscretePD {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let mut a: Vec<(f64, f64)> = self.support.clone();
        let mut b: Vec<(f64, f64)> = other.support.clone();
        a.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(Ordering::Equal));
        b.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(Ordering::Equal));
        a.partial_cmp(&b)
    }
}

/// Parallel to `State`, but each slot is a discrete distribution over
/// possible next values (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct PDState {
    slots: Vec<DiscretePD>,
}

impl PDState {
    pub fn new(size: usize) -> Self {
        PDState {
            slots: vec![DiscretePD::default(); size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ordering is lexicographic over the per-slot `DiscretePD`s.
    pub fn cmp_lex(&self, other: &PDState) -> Ordering {
        debug_assert_eq!(self.slots.len(), other.slots.len());
        for i in 0..self.slots.len() {
            match self.slots[i].partial_cmp(&other.slots[i]).unwrap_or(Ordering::Equal) {
                Ordering::Equal => continue,
                o => return o,
            }
        }
        Ordering::Equal
    }
}

impl Index<usize> for PDState {
    type Output = DiscretePD;
    fn index(&self, index: usize) -> &DiscretePD {
        &self.slots[index]
    }
}

impl IndexMut<usize> for PDState {
    fn index_mut(&mut self, index: usize) -> &mut DiscretePD {
        &mut self.slots[index]
    }
}

/// An over-approximation of a set of concrete states: each slot holds the
/// set of values that fluent might take (spec §4.3). Used by the Kleene
/// reachability fixpoint (spec §4.6 step 6).
#[derive(Debug, Clone, PartialEq)]
pub struct KleeneState {
    slots: Vec<BTreeSet<FVal>>,
}

impl KleeneState {
    pub fn new(size: usize) -> Self {
        KleeneState {
            slots: vec![BTreeSet::new(); size],
        }
    }

    pub fn from_state(origin: &State) -> Self {
        KleeneState {
            slots: origin.values().iter().map(|v| BTreeSet::from([FVal(*v)])).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Merges `other` into `self` (set union per slot). Idempotent:
    /// merging a state into itself is a no-op.
    pub fn merge_from(&mut self, other: &KleeneState) {
        debug_assert_eq!(self.slots.len(), other.slots.len());
        for i in 0..self.slots.len() {
            for v in &other.slots[i] {
                self.slots[i].insert(*v);
            }
        }
    }
}

impl Index<usize> for KleeneState {
    type Output = BTreeSet<FVal>;
    fn index(&self, index: usize) -> &BTreeSet<FVal> {
        &self.slots[index]
    }
}

impl IndexMut<usize> for KleeneState {
    fn index_mut(&mut self, index: usize) -> &mut BTreeSet<FVal> {
        &mut self.slots[index]
    }
}

/// A fully-assigned ground action: one integer value per surviving action
/// fluent. `index` is its position in `Task::action_states` once legal
/// actions have been enumerated (spec §4.6 step 5); `-1` before then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionState {
    values: Vec<i64>,
    pub index: i64,
    /// Indices (into `Task::action_preconds`) of the preconditions that
    /// may forbid this action (spec §4.6 "Action-state initialization").
    pub relevant_sacs: Vec<usize>,
}

impl ActionState {
    pub fn new(values: Vec<i64>) -> Self {
        ActionState {
            values,
            index: -1,
            relevant_sacs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

impl Index<usize> for ActionState {
    type Output = i64;
    fn index(&self, index: usize) -> &i64 {
        &self.values[index]
    }
}

impl IndexMut<usize> for ActionState {
    fn index_mut(&mut self, index: usize) -> &mut i64 {
        &mut self.values[index]
    }
}

impl PartialOrd for ActionState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActionState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values.len().cmp(&other.values.len()).then_with(|| self.values.cmp(&other.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kleene_merge_is_idempotent() {
        let mut s = KleeneState::new(1);
        s[0].insert(FVal(1.0));
        let clone = s.clone();
        s.merge_from(&clone);
        assert_eq!(s, clone);
    }

    #[test]
    fn kleene_merge_unions() {
        let mut a = KleeneState::new(1);
        a[0].insert(FVal(1.0));
        let mut b = KleeneState::new(1);
        b[0].insert(FVal(2.0));
        a.merge_from(&b);
        assert_eq!(a[0].len(), 2);
    }

    #[test]
    fn discrete_pd_determinism() {
        let pd = DiscretePD::deterministic(3.0);
        assert!(pd.is_deterministic());
        assert_eq!(pd.deterministic_value(), Some(3.0));
        let mixed = DiscretePD::new(vec![(0.0, 0.5), (1.0, 0.5)]);
        assert!(!mixed.is_deterministic());
    }

    #[test]
    fn action_state_ordering_is_lexicographic() {
        let a = ActionState::new(vec![0, 1]);
        let b = ActionState::new(vec![1, 0]);
        assert!(a < b);
    }

    #[test]
    fn state_packed_ordering_walks_from_last_index() {
        let a = State::from_values(vec![0.0, 1.0]);
        let b = State::from_values(vec![1.0, 0.0]);
        // last index differs (1.0 vs 0.0) so a > b despite a[0] < b[0]
        assert_eq!(a.cmp_packed(&b), Ordering::Greater);
    }
}
