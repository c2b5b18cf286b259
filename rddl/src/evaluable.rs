//! The evaluable-expression model (C2), transcribed from the cache-mode
//! state machine of `original_source/src/evaluatable.h`.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::expr::{Dependencies, Expr, Replacements};
use crate::fluent::FluentId;
use crate::fval::FVal;
use crate::hashkey::{self, CachingType};
use crate::state::{ActionState, KleeneState, State};
use crate::task::Task;

/// A single published (evaluable, base) contribution that the `State`
/// constructor folds into its `hash_keys` vector for one state fluent
/// (spec §4.2 "State fluent hash keys"). Kept separate from `Evaluable`
/// because it is indexed *by fluent*, not by evaluable.
#[derive(Debug, Clone, Copy)]
pub struct HashPublish {
    pub hash_index: usize,
    pub base: i64,
}

enum Cache<T> {
    Unused,
    Vector(Vec<Option<T>>),
    Map(HashMap<i64, T>),
}

/// Wraps a formula, owning its evaluation caches and action-hash-key
/// table (spec §3/§4.2).
pub struct Evaluable {
    pub name: String,
    pub formula: Rc<Expr>,
    pub dependent_state_fluents: Vec<FluentId>,
    pub positive_action_deps: Vec<FluentId>,
    pub negative_action_deps: Vec<FluentId>,
    pub is_prob: bool,
    pub has_arithmetic: bool,
    /// Position in the `State::hash_keys` vector that this evaluable's
    /// state-fluent contribution is stored at, or `-1` if it depends on
    /// no state fluent (spec §3 invariant).
    pub hash_index: i64,
    caching_type: CachingType,
    /// Mutated through `&self`: every call site that evaluates a CPF or
    /// precondition holds only a shared `&Task` (the `Evaluable` lives
    /// inside one of `Task`'s owned collections), so the cache needs
    /// interior mutability the same way `env_param::EnvParam` uses
    /// `OnceCell` to populate itself lazily behind a shared reference.
    cache: RefCell<Cache<f64>>,
    kleene_caching_type: CachingType,
    kleene_cache: RefCell<Cache<BTreeSet<FVal>>>,
    /// `action_hash_key_map[action.index]` is this evaluable's action
    /// contribution for that legal action.
    action_hash_key_map: Vec<i64>,
    /// `1 + max(action_hash_key_map)`: the number of distinct action
    /// projections this evaluable distinguishes. State fluent bases are
    /// folded-in starting at this value (`hashkey::assign_bases_from`) so
    /// `composed_key`'s `state_key + action_key` can't collide -- the
    /// action key always occupies the low digit.
    action_projections: i64,
}

impl Evaluable {
    pub fn new(name: impl Into<String>, formula: Rc<Expr>) -> Self {
        Evaluable {
            name: name.into(),
            formula,
            dependent_state_fluents: Vec::new(),
            positive_action_deps: Vec::new(),
            negative_action_deps: Vec::new(),
            is_prob: false,
            has_arithmetic: false,
            hash_index: -1,
            caching_type: CachingType::Vector,
            cache: RefCell::new(Cache::Unused),
            kleene_caching_type: CachingType::Vector,
            kleene_cache: RefCell::new(Cache::Unused),
            action_hash_key_map: Vec::new(),
            action_projections: 1,
        }
    }

    /// Collects dependency sets from `formula` (spec §4.2 `initialize`).
    pub fn initialize(&mut self) {
        let mut deps = Dependencies::default();
        self.formula.collect_dependencies(&mut deps, true);
        self.dependent_state_fluents = deps.state_fluents.into_iter().collect();
        self.positive_action_deps = deps.positive_action.into_iter().collect();
        self.negative_action_deps = deps.negative_action.into_iter().collect();
        self.has_arithmetic = deps.has_arithmetic;
        self.is_prob = self.formula.is_probabilistic();
    }

    pub fn is_probabilistic(&self) -> bool {
        self.is_prob
    }

    pub fn has_positive_action_dependencies(&self) -> bool {
        !self.positive_action_deps.is_empty()
    }

    pub fn is_action_independent(&self) -> bool {
        self.positive_action_deps.is_empty() && self.negative_action_deps.is_empty()
    }

    pub fn contains_state_fluent(&self) -> bool {
        !self.dependent_state_fluents.is_empty()
    }

    pub fn depends_on_action_fluent(&self, f: FluentId) -> bool {
        self.positive_action_deps.contains(&f) || self.negative_action_deps.contains(&f)
    }

    pub fn dependent_action_fluents(&self) -> impl Iterator<Item = FluentId> + '_ {
        self.positive_action_deps.iter().chain(self.negative_action_deps.iter()).copied()
    }

    /// `triviallyForbidsActionFluent` (spec §4.6 step 2a): a purely
    /// action-dependent, action-fluent-free-of-state precondition of the
    /// syntactic shape `not a`.
    pub fn trivially_forbids_action_fluent(&self) -> Option<FluentId> {
        self.formula.trivially_forbids_action_fluent()
    }

    /// Builds the action-hash-key table: a mixed-radix encoding of each
    /// legal action's projection onto this evaluable's action
    /// dependencies (spec §4.2 "Action hash keys").
    fn initialize_action_hash_keys(&mut self, action_states: &[ActionState], task: &Task) {
        let mut dep_ids: Vec<FluentId> = self.dependent_action_fluents().collect();
        dep_ids.sort();
        dep_ids.dedup();
        if dep_ids.is_empty() {
            self.action_hash_key_map = vec![0; action_states.len()];
            return;
        }
        let domain_sizes: Vec<usize> = dep_ids.iter().map(|id| task.action_fluent(*id).domain.size()).collect();
        let (bases, _total) = hashkey::assign_bases(&domain_sizes);
        let mut map = vec![0i64; action_states.len()];
        for action in action_states {
            let mut key = 0i64;
            for (dep, base) in dep_ids.iter().zip(bases.iter()) {
                let fluent = task.action_fluent(*dep);
                let idx = fluent.index;
                let domain_index = fluent.domain.index_of(action[idx] as f64).unwrap_or(0) as i64;
                key += domain_index * base.base;
            }
            map[action.index as usize] = key;
        }
        self.action_hash_key_map = map;
    }

    /// Assigns `hash_index`, builds the action-hash-key table, and
    /// publishes this evaluable's per-fluent base contributions so the
    /// `State`/`KleeneState` constructors can assemble their hash-key
    /// vectors (spec §4.2 `initializeHashKeys`).
    pub fn initialize_hash_keys(
        &mut self,
        hash_index: i64,
        action_states: &[ActionState],
        task: &Task,
        publish: &mut [Vec<HashPublish>],
    ) {
        self.initialize_action_hash_keys(action_states, task);
        self.hash_index = hash_index;

        let domain_sizes: Vec<usize> = self
            .dependent_state_fluents
            .iter()
            .map(|id| task.state_fluent(*id).domain.size())
            .collect();

        let action_projections = (*self.action_hash_key_map.iter().max().unwrap_or(&0)).max(0) + 1;
        self.action_projections = action_projections;

        // The state fluent radix chain starts at `action_projections`, not
        // `1`, so every published base is already a multiple of it: the
        // action key (which ranges over `[0, action_projections)`) can be
        // summed in as the low digit without colliding with any state
        // projection (spec §4.2, `composed_key`).
        let (bases, state_projections) = hashkey::assign_bases_from(&domain_sizes, action_projections);
        let (_, kleene_projections) = hashkey::assign_kleene_bases_from(&domain_sizes, action_projections);

        if hash_index >= 0 {
            for (dep, base) in self.dependent_state_fluents.iter().zip(bases.iter()) {
                let idx = task.state_fluent(*dep).index;
                publish[idx].push(HashPublish {
                    hash_index: hash_index as usize,
                    base: base.base,
                });
            }
        }

        self.caching_type = hashkey::choose_caching_type(state_projections / action_projections.max(1), action_projections);
        self.kleene_caching_type = hashkey::choose_caching_type(kleene_projections / action_projections.max(1), action_projections);

        let vector_size = state_projections.max(1) as usize;
        self.cache = RefCell::new(match self.caching_type {
            CachingType::Vector => Cache::Vector(vec![None; vector_size]),
            CachingType::Map | CachingType::DisabledMap => Cache::Map(HashMap::new()),
            CachingType::None => Cache::Unused,
        });
        let kleene_vector_size = kleene_projections.max(1) as usize;
        self.kleene_cache = RefCell::new(match self.kleene_caching_type {
            CachingType::Vector => Cache::Vector(vec![None; kleene_vector_size]),
            CachingType::Map | CachingType::DisabledMap => Cache::Map(HashMap::new()),
            CachingType::None => Cache::Unused,
        });
    }

    /// Downgrades VECTOR/MAP to DISABLED_MAP: reads still hit whatever is
    /// already cached, but nothing new is inserted (spec §4.2).
    pub fn disable_caching(&mut self) {
        if self.caching_type == CachingType::Vector || self.caching_type == CachingType::Map {
            self.caching_type = CachingType::DisabledMap;
        }
        if self.kleene_caching_type == CachingType::Vector || self.kleene_caching_type == CachingType::Map {
            self.kleene_caching_type = CachingType::DisabledMap;
        }
    }

    fn composed_key(&self, state: &State, action: &ActionState) -> i64 {
        let s = state.state_fluent_hash_key(self.hash_index);
        let a = self.action_hash_key_map.get(action.index.max(0) as usize).copied().unwrap_or(0);
        debug_assert!(s >= 0 && a >= 0, "hash key components must be non-negative");
        s + a
    }

    /// Standard real-valued evaluation (spec §4.2 evaluation algorithm).
    pub fn evaluate(&self, state: &State, action: &ActionState, task: &Task) -> f64 {
        match self.caching_type {
            CachingType::None => self.formula.evaluate(state, action, task),
            CachingType::Vector => {
                let key = self.composed_key(state, action);
                debug_assert!(key >= 0);
                if let Cache::Vector(v) = &*self.cache.borrow() {
                    if let Some(val) = v[key as usize] {
                        return val;
                    }
                } else {
                    unreachable!()
                }
                let r = self.formula.evaluate(state, action, task);
                if let Cache::Vector(v) = &mut *self.cache.borrow_mut() {
                    v[key as usize] = Some(r);
                }
                r
            }
            CachingType::Map => {
                let key = self.composed_key(state, action);
                if let Cache::Map(m) = &*self.cache.borrow() {
                    if let Some(v) = m.get(&key) {
                        return *v;
                    }
                }
                let r = self.formula.evaluate(state, action, task);
                if let Cache::Map(m) = &mut *self.cache.borrow_mut() {
                    m.insert(key, r);
                }
                r
            }
            CachingType::DisabledMap => {
                let key = self.composed_key(state, action);
                if let Cache::Map(m) = &*self.cache.borrow() {
                    if let Some(v) = m.get(&key) {
                        return *v;
                    }
                }
                self.formula.evaluate(state, action, task)
            }
        }
    }

    /// Kleene (possibility-set) evaluation (spec §4.2).
    pub fn evaluate_kleene(&self, state: &KleeneState, action: &ActionState, task: &Task) -> BTreeSet<FVal> {
        match self.kleene_caching_type {
            CachingType::None => self.formula.evaluate_kleene(state, action, task),
            CachingType::Vector => {
                let key = self.kleene_composed_key(state, action, task);
                if let Cache::Vector(v) = &*self.kleene_cache.borrow() {
                    if let Some(val) = &v[key as usize] {
                        return val.clone();
                    }
                } else {
                    unreachable!()
                }
                let r = self.formula.evaluate_kleene(state, action, task);
                if let Cache::Vector(v) = &mut *self.kleene_cache.borrow_mut() {
                    v[key as usize] = Some(r.clone());
                }
                r
            }
            CachingType::Map => {
                let key = self.kleene_composed_key(state, action, task);
                if let Cache::Map(m) = &*self.kleene_cache.borrow() {
                    if let Some(v) = m.get(&key) {
                        return v.clone();
                    }
                }
                let r = self.formula.evaluate_kleene(state, action, task);
                if let Cache::Map(m) = &mut *self.kleene_cache.borrow_mut() {
                    m.insert(key, r.clone());
                }
                r
            }
            CachingType::DisabledMap => {
                let key = self.kleene_composed_key(state, action, task);
                if let Cache::Map(m) = &*self.kleene_cache.borrow() {
                    if let Some(v) = m.get(&key) {
                        return v.clone();
                    }
                }
                self.formula.evaluate_kleene(state, action, task)
            }
        }
    }

    fn kleene_composed_key(&self, state: &KleeneState, action: &ActionState, task: &Task) -> i64 {
        if self.hash_index < 0 {
            return self.action_hash_key_map.get(action.index.max(0) as usize).copied().unwrap_or(0);
        }
        // The Kleene key is recomposed directly from the dependent
        // fluents' current possibility-set bitmasks, since `KleeneState`
        // (unlike `State`) does not carry a precomputed hash-key vector:
        // its slots change shape (grow) throughout the reachability
        // fixpoint, so publishing bases into it up front would go stale.
        let mut key = 0i64;
        let domain_sizes: Vec<usize> = self
            .dependent_state_fluents
            .iter()
            .map(|id| task.state_fluent(*id).domain.size())
            .collect();
        let (bases, _) = hashkey::assign_kleene_bases_from(&domain_sizes, self.action_projections);
        for (dep, base) in self.dependent_state_fluents.iter().zip(bases.iter()) {
            let idx = task.state_fluent(*dep).index;
            let domain = &task.state_fluent(*dep).domain;
            let mut mask = 0i64;
            for v in &state[idx] {
                if let Some(pos) = domain.index_of(v.get()) {
                    mask |= 1 << pos;
                }
            }
            key += mask * base.base;
        }
        key + self.action_hash_key_map.get(action.index.max(0) as usize).copied().unwrap_or(0)
    }
}

/// CPF (head + formula). Composition, not inheritance, for the
/// "inherits from Evaluable" relationship in spec §3 — idiomatic Rust has
/// no class inheritance, and the teacher favors composition (e.g.
/// `ChronicleInstance` wrapping `Chronicle`).
pub struct Cpf {
    pub eval: Evaluable,
    pub head: FluentId,
}

impl Cpf {
    pub fn new(head: FluentId, head_name: &str, formula: Rc<Expr>) -> Self {
        Cpf {
            eval: Evaluable::new(format!("cpf({head_name})"), formula),
            head,
        }
    }

    /// Rewrites the formula and re-derives its dependency sets -- a
    /// simplification can drop a fluent reference entirely (e.g. an
    /// `IfThenElse` branch pruned once its condition folds to a constant),
    /// and a cached `dependent_state_fluents`/`positive_action_deps`/etc.
    /// from before that point would stay stale otherwise.
    pub fn simplify(&mut self, replacements: &Replacements) {
        self.eval.formula = self.eval.formula.simplify(replacements);
        self.eval.initialize();
    }
}

/// The reward function: a single Evaluable with no head fluent.
pub struct RewardCpf {
    pub eval: Evaluable,
}

impl RewardCpf {
    pub fn new(formula: Rc<Expr>) -> Self {
        RewardCpf {
            eval: Evaluable::new("reward", formula),
        }
    }

    /// See `Cpf::simplify`: re-derives dependency sets after rewriting.
    pub fn simplify(&mut self, replacements: &Replacements) {
        self.eval.formula = self.eval.formula.simplify(replacements);
        self.eval.initialize();
    }
}

/// A state-action constraint; legal iff its formula evaluates non-zero.
pub struct ActionPrecondition {
    pub eval: Evaluable,
    pub index: usize,
    /// True iff this precondition depends on no action fluent at all
    /// (a pure state invariant) -- kept for completeness, though such
    /// preconditions are filtered out before this struct is built for
    /// the `action_preconds`/`static_sacs` lists (spec §4.6 step 2).
    pub is_action_independent: bool,
}

impl ActionPrecondition {
    pub fn new(name: impl Into<String>, formula: Rc<Expr>) -> Self {
        let mut eval = Evaluable::new(name, formula);
        eval.initialize();
        let is_action_independent = eval.is_action_independent();
        ActionPrecondition {
            eval,
            index: 0,
            is_action_independent,
        }
    }

    pub fn contains_state_fluent(&self) -> bool {
        self.eval.contains_state_fluent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluent::ActionFluent;
    use crate::task::Task;

    fn tiny_task() -> (Task, FluentId) {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
        (task, a)
    }

    #[test]
    fn evaluate_consistency_across_caching_modes() {
        let (task, a) = tiny_task();
        let formula = Rc::new(Expr::ActionFluent(a));
        let mut ev = Evaluable::new("reward", formula);
        ev.initialize();
        let action_states = vec![ActionState::new(vec![0]), ActionState::new(vec![1])];
        let action_states: Vec<ActionState> = action_states
            .into_iter()
            .enumerate()
            .map(|(i, mut s)| {
                s.index = i as i64;
                s
            })
            .collect();
        let mut publish = vec![Vec::new(); 0];
        ev.initialize_hash_keys(-1, &action_states, &task, &mut publish);
        let state = State::new(0);
        for a_state in &action_states {
            let direct = ev.formula.evaluate(&state, a_state, &task);
            let cached = ev.evaluate(&state, a_state, &task);
            assert_eq!(direct, cached);
        }
    }

    #[test]
    fn hash_keys_are_non_negative() {
        let (task, a) = tiny_task();
        let formula = Rc::new(Expr::ActionFluent(a));
        let mut ev = Evaluable::new("x", formula);
        ev.initialize();
        let mut action_states = vec![ActionState::new(vec![0]), ActionState::new(vec![1])];
        for (i, s) in action_states.iter_mut().enumerate() {
            s.index = i as i64;
        }
        let mut publish = vec![];
        ev.initialize_hash_keys(-1, &action_states, &task, &mut publish);
        let state = State::new(0);
        for a_state in &action_states {
            assert!(ev.composed_key(&state, a_state) >= 0);
        }
    }

    #[test]
    fn composed_key_does_not_collide_across_distinct_state_action_pairs() {
        use crate::fluent::{Domain, StateFluent};

        // `f` has 3 values and `a` is binary: the cache footprint is 3*2=6,
        // small enough that every (state, action) pair must get its own slot.
        let mut task = Task::new("collide");
        let f = task.add_state_fluent(StateFluent::new(FluentId(0), "f", Domain::new(vec![0.0, 1.0, 2.0]), 0.0));
        let a = task.add_action_fluent(ActionFluent::binary(FluentId(1), "a"));
        let formula = Rc::new(Expr::Add(vec![Rc::new(Expr::StateFluent(f)), Rc::new(Expr::ActionFluent(a))]));
        let mut cpf = Cpf::new(FluentId(2), "cpf", formula);
        cpf.eval.initialize();
        task.cpfs.push(cpf);

        let mut off = ActionState::new(vec![0]);
        off.index = 0;
        let mut on = ActionState::new(vec![1]);
        on.index = 1;
        task.action_states = vec![off.clone(), on.clone()];
        task.finalize_hash_keys().expect("hash keys finalize");

        for f_value in [0.0, 1.0, 2.0] {
            let state = task.build_state(vec![f_value]);
            let via_off = task.cpfs[0].eval.evaluate(&state, &off, &task);
            let via_on = task.cpfs[0].eval.evaluate(&state, &on, &task);
            assert_eq!(via_off, f_value);
            assert_eq!(via_on, f_value + 1.0);
        }
    }

    #[test]
    fn cpf_simplify_refreshes_dependencies_after_branch_is_pruned() {
        let (mut task, a) = tiny_task();
        let b = task.add_action_fluent(ActionFluent::binary(FluentId(1), "b"));
        let cond = task.add_state_fluent(crate::fluent::StateFluent::new(FluentId(2), "cond", crate::fluent::Domain::boolean(), 0.0));
        let formula = Rc::new(Expr::IfThenElse(Rc::new(Expr::StateFluent(cond)), Rc::new(Expr::ActionFluent(a)), Rc::new(Expr::ActionFluent(b))));
        let mut cpf = Cpf::new(FluentId(100), "head", formula);
        cpf.eval.initialize();
        assert!(cpf.eval.depends_on_action_fluent(b));

        // `cond` is now known true, so the `b`-branch is pruned entirely.
        let mut replacements = Replacements::new();
        replacements.insert(cond, Expr::const_(1.0));
        cpf.simplify(&replacements);

        assert!(!cpf.eval.depends_on_action_fluent(b));
        assert!(cpf.eval.depends_on_action_fluent(a));
    }
}
