//! The task container (C7): owns every fluent, CPF, precondition and
//! legal action the compiled task is built from, and is the sole code
//! path permitted to assign `Evaluable` hash indices and cache sizes
//! (spec §3 invariant, §4.2 "initializeHashKeys").

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{CompileError, Result};
use crate::evaluable::{ActionPrecondition, Cpf, HashPublish, RewardCpf};
use crate::expr::Expr;
use crate::fluent::{ActionFluent, FluentId, StateFluent};
use crate::state::{ActionState, State};

/// The compiled, simplified planning task (spec §3 "Task container").
pub struct Task {
    pub name: String,
    pub horizon: usize,
    pub discount_factor: f64,

    state_fluents: Vec<StateFluent>,
    action_fluents: Vec<ActionFluent>,
    state_by_id: HashMap<FluentId, usize>,
    action_by_id: HashMap<FluentId, usize>,

    pub cpfs: Vec<Cpf>,
    pub reward_cpf: RewardCpf,
    /// The raw, not-yet-classified state-action-constraint expressions
    /// (spec §4.6 step 1 "simplify each precondition"). Each fixpoint
    /// iteration's classification step (step 2) rebuilds `action_preconds`
    /// and `static_sacs` from whatever survives here, and may shrink this
    /// list further (dropping trivially-forbidding and pure state-invariant
    /// preconditions); distinct from the two typed, classified lists below,
    /// matching the original's `task->SACs` vs. `task->actionPreconds`/
    /// `task->staticSACs` split (`original_source/src/rddl_parser/
    /// simplifier.cc`).
    pub sacs: Vec<Rc<Expr>>,
    pub action_preconds: Vec<ActionPrecondition>,
    /// Preconditions that depend on no state fluent: static action
    /// constraints (spec §4.6 step 2), evaluated once during legal-action
    /// enumeration rather than per transition.
    pub static_sacs: Vec<ActionPrecondition>,
    pub action_states: Vec<ActionState>,

    /// `state_fluent_hash_publish[j]` lists the (evaluable, base) pairs a
    /// state fluent at position `j` must contribute to when a concrete
    /// `State` is built (spec §4.2).
    state_fluent_hash_publish: Vec<Vec<HashPublish>>,
    hash_keys_finalized: bool,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            name: name.into(),
            horizon: 1,
            discount_factor: 1.0,
            state_fluents: Vec::new(),
            action_fluents: Vec::new(),
            state_by_id: HashMap::new(),
            action_by_id: HashMap::new(),
            cpfs: Vec::new(),
            reward_cpf: RewardCpf::new(Expr::const_(0.0)),
            sacs: Vec::new(),
            action_preconds: Vec::new(),
            static_sacs: Vec::new(),
            action_states: Vec::new(),
            state_fluent_hash_publish: Vec::new(),
            hash_keys_finalized: false,
        }
    }

    pub fn add_state_fluent(&mut self, fluent: StateFluent) -> FluentId {
        let id = fluent.id;
        let index = self.state_fluents.len();
        self.state_by_id.insert(id, index);
        let mut fluent = fluent;
        fluent.index = index;
        self.state_fluents.push(fluent);
        id
    }

    pub fn add_action_fluent(&mut self, fluent: ActionFluent) -> FluentId {
        let id = fluent.id;
        let index = self.action_fluents.len();
        self.action_by_id.insert(id, index);
        let mut fluent = fluent;
        fluent.index = index;
        self.action_fluents.push(fluent);
        id
    }

    pub fn state_fluents(&self) -> &[StateFluent] {
        &self.state_fluents
    }

    pub fn action_fluents(&self) -> &[ActionFluent] {
        &self.action_fluents
    }

    pub fn state_fluent(&self, id: FluentId) -> &StateFluent {
        let idx = self.state_by_id[&id];
        &self.state_fluents[idx]
    }

    pub fn action_fluent(&self, id: FluentId) -> &ActionFluent {
        let idx = self.action_by_id[&id];
        &self.action_fluents[idx]
    }

    pub fn try_state_fluent(&self, id: FluentId) -> Option<&StateFluent> {
        self.state_by_id.get(&id).map(|&idx| &self.state_fluents[idx])
    }

    pub fn try_action_fluent(&self, id: FluentId) -> Option<&ActionFluent> {
        self.action_by_id.get(&id).map(|&idx| &self.action_fluents[idx])
    }

    /// Replaces the surviving state fluents in fluent-index order,
    /// reassigning `index` 0..n and rebuilding the id lookup (spec §4.6
    /// steps 1-2, run after formula simplification removes fluents that
    /// turned out constant).
    pub fn set_state_fluents(&mut self, mut fluents: Vec<StateFluent>) {
        self.state_by_id.clear();
        for (idx, f) in fluents.iter_mut().enumerate() {
            f.index = idx;
            self.state_by_id.insert(f.id, idx);
        }
        self.state_fluents = fluents;
    }

    /// Same as `set_state_fluents`, for action fluents (spec §4.6 step 3
    /// FDR merging, and step 2a dropping trivially-forbidden fluents).
    pub fn set_action_fluents(&mut self, mut fluents: Vec<ActionFluent>) {
        self.action_by_id.clear();
        for (idx, f) in fluents.iter_mut().enumerate() {
            f.index = idx;
            self.action_by_id.insert(f.id, idx);
        }
        self.action_fluents = fluents;
    }

    /// Reorders `cpfs` topologically on their head-fluent dependencies
    /// (a CPF referencing another CPF's head is ordered after it), ties
    /// broken by head fluent index, stable otherwise (spec §4.7
    /// `sortCPFs`). A cyclic dependency is a structural error: no
    /// evaluation order could be load-bearing here since `evaluate`
    /// always reads a CPF's dependencies from the *current* state rather
    /// than another CPF's freshly-computed value, but a cycle still
    /// indicates a malformed task.
    pub fn sort_cpfs(&mut self) -> Result<()> {
        let n = self.cpfs.len();
        let head_index_of: HashMap<FluentId, usize> = self.cpfs.iter().enumerate().map(|(i, c)| (c.head, i)).collect();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, cpf) in self.cpfs.iter().enumerate() {
            for dep in &cpf.eval.dependent_state_fluents {
                if let Some(&j) = head_index_of.get(dep) {
                    if j != i {
                        successors[j].push(i);
                        in_degree[i] += 1;
                    }
                }
            }
        }

        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while !ready.is_empty() {
            let pos = ready
                .iter()
                .enumerate()
                .min_by_key(|&(_, &i)| self.state_fluent(self.cpfs[i].head).index)
                .map(|(pos, _)| pos)
                .expect("ready is non-empty");
            let i = ready.remove(pos);
            order.push(i);
            for &succ in &successors[i] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.push(succ);
                }
            }
        }

        if order.len() != n {
            return Err(CompileError::Structural("cyclic dependency among CPF heads".into()));
        }

        let mut cpfs = std::mem::take(&mut self.cpfs);
        let mut reordered = Vec::with_capacity(n);
        // Drain in topological order, taking each surviving Cpf out of its
        // old slot; later indices shift as earlier ones are removed, so
        // translate against the original positions directly instead.
        let mut slots: Vec<Option<Cpf>> = cpfs.drain(..).map(Some).collect();
        for i in order {
            reordered.push(slots[i].take().expect("each index appears exactly once in a topological order"));
        }
        self.cpfs = reordered;
        Ok(())
    }

    /// Sorts `action_states` lexicographically on the action-value vector
    /// and reassigns `index` 0..n (spec §4.7 `sortActionStates`).
    pub fn sort_action_states(&mut self) {
        self.action_states.sort();
        for (idx, a) in self.action_states.iter_mut().enumerate() {
            a.index = idx as i64;
        }
    }

    /// Builds a concrete `State` from one value per surviving state
    /// fluent (in current index order), populating its hash-key vector
    /// from the published (evaluable, base) contributions. Requires
    /// `finalize_hash_keys` to have already run.
    pub fn build_state(&self, values: Vec<f64>) -> State {
        debug_assert_eq!(values.len(), self.state_fluents.len());
        debug_assert!(self.hash_keys_finalized, "hash keys must be finalized before building a State");
        let mut state = State::from_values(values);
        state.resize_hash_keys(self.hash_key_count());
        for (idx, fluent) in self.state_fluents.iter().enumerate() {
            let domain_index = fluent.domain.index_of(state[idx]).unwrap_or(0) as i64;
            for publish in &self.state_fluent_hash_publish[idx] {
                state.add_to_state_fluent_hash_key(publish.hash_index, domain_index * publish.base);
            }
        }
        state
    }

    /// Builds the initial state from each state fluent's declared
    /// initial value.
    pub fn initial_state(&self) -> State {
        self.build_state(self.state_fluents.iter().map(|f| f.initial_value).collect())
    }

    fn hash_key_count(&self) -> usize {
        self.state_fluent_hash_publish.iter().flatten().map(|p| p.hash_index + 1).max().unwrap_or(0)
    }

    /// The dedicated `Evaluable` factory pass (spec §3 invariant: "the
    /// task container constructs Evaluables through a dedicated factory
    /// that is the only code path allowed to write hashIndex, cache
    /// sizes, and action-hash-key tables"). Must run exactly once, after
    /// the simplifier fixpoint (C6) has converged and `action_states` has
    /// been enumerated, since earlier than that both the dependency sets
    /// and the fluent indexing are still in flux.
    pub fn finalize_hash_keys(&mut self) -> Result<()> {
        if self.hash_keys_finalized {
            return Err(CompileError::Assertion("finalize_hash_keys must run exactly once".into()));
        }
        if self.action_states.is_empty() {
            return Err(CompileError::Assertion("legal actions must be enumerated before finalizing hash keys".into()));
        }
        let mut publish = vec![Vec::new(); self.state_fluents.len()];
        let mut next_hash_index: i64 = 0;

        // Evaluables are finalized by borrowing the Task's fluent tables
        // immutably while the Evaluables themselves (owned by Task) are
        // mutated one at a time; taking them out of their Vec first
        // avoids aliasing &self with &mut Evaluable.
        let mut cpfs = std::mem::take(&mut self.cpfs);
        let mut reward_cpf = std::mem::replace(&mut self.reward_cpf, RewardCpf::new(Expr::const_(0.0)));
        let mut action_preconds = std::mem::take(&mut self.action_preconds);
        let mut static_sacs = std::mem::take(&mut self.static_sacs);

        for cpf in cpfs.iter_mut() {
            finalize_one(&mut cpf.eval, &mut next_hash_index, &self.action_states, self, &mut publish);
        }
        finalize_one(&mut reward_cpf.eval, &mut next_hash_index, &self.action_states, self, &mut publish);
        for pre in action_preconds.iter_mut() {
            finalize_one(&mut pre.eval, &mut next_hash_index, &self.action_states, self, &mut publish);
        }
        for sac in static_sacs.iter_mut() {
            finalize_one(&mut sac.eval, &mut next_hash_index, &self.action_states, self, &mut publish);
        }

        self.cpfs = cpfs;
        self.reward_cpf = reward_cpf;
        self.action_preconds = action_preconds;
        self.static_sacs = static_sacs;
        self.state_fluent_hash_publish = publish;
        self.hash_keys_finalized = true;
        Ok(())
    }
}

fn finalize_one(
    eval: &mut crate::evaluable::Evaluable,
    next_hash_index: &mut i64,
    action_states: &[ActionState],
    task: &Task,
    publish: &mut [Vec<HashPublish>],
) {
    let hash_index = if eval.dependent_state_fluents.is_empty() {
        -1
    } else {
        let h = *next_hash_index;
        *next_hash_index += 1;
        h
    };
    eval.initialize_hash_keys(hash_index, action_states, task, publish);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluent::Domain;

    #[test]
    fn lookup_by_id_tracks_reindexing() {
        let mut task = Task::new("t");
        let a = task.add_state_fluent(StateFluent::new(FluentId(0), "a", Domain::boolean(), 0.0));
        let b = task.add_state_fluent(StateFluent::new(FluentId(1), "b", Domain::boolean(), 0.0));
        assert_eq!(task.state_fluent(a).index, 0);
        assert_eq!(task.state_fluent(b).index, 1);

        let reordered = vec![task.state_fluent(b).clone(), task.state_fluent(a).clone()];
        task.set_state_fluents(reordered);
        assert_eq!(task.state_fluent(b).index, 0);
        assert_eq!(task.state_fluent(a).index, 1);
    }
}
