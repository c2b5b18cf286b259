//! Step 4, "FDR generation" (spec §4.6, optional -- gated by
//! `config::ENABLE_FDR_GENERATION`): merges action fluents that can never
//! be simultaneously true in any legal action into a single finite-domain
//! variable.
//!
//! `csp.h`/`fdr_generation.h`/`mutex_detection.h` are not present in the
//! retrieval pack, so this pass is built from spec.md's textual
//! description rather than transcribed; two scoping decisions follow from
//! that (see DESIGN.md):
//!
//! - Mutex is proven only from the *static* SACs (state-independent
//!   constraints), since those are the only constraints guaranteed to hold
//!   in every state; an action precondition that depends on state cannot
//!   soundly prove a pair mutually exclusive across all states.
//! - Mutex cliques are approximated as the connected components of the
//!   mutex graph (union-find). This is exact when the graph happens to be
//!   a disjoint union of cliques and a (documented) over-merge otherwise.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::error::Result;
use crate::expr::{Expr, Replacements};
use crate::fluent::{ActionFluent, FluentId};
use crate::solver::Solver;
use crate::task::Task;

use super::{apply_replacements, declare_action_vars, next_free_fluent_id, static_sac_formulas};

fn fluents_are_mutex(task: &Task, solver: &mut dyn Solver, a: FluentId, b: FluentId) -> Result<bool> {
    solver.push();
    solver.add_preconditions(&static_sac_formulas(task), 0);
    solver.assign_action_variables(&[(a, 1), (b, 1)]);
    let has_solution = solver.has_solution();
    solver.pop();
    Ok(!has_solution?)
}

fn find(parent: &mut [usize], x: usize) -> usize {
    if parent[x] != x {
        parent[x] = find(parent, parent[x]);
    }
    parent[x]
}

fn connected_components(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..n).collect();
    for &(a, b) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra != rb {
            parent[ra] = rb;
        }
    }
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

/// Returns whether any action fluent was merged into an FDR variable.
pub fn generate_fdr(task: &mut Task, solver: &mut dyn Solver) -> Result<bool> {
    let binary: Vec<FluentId> = task.action_fluents().iter().filter(|f| !f.is_fdr && f.domain.size() == 2).map(|f| f.id).collect();
    if binary.len() < 2 {
        return Ok(false);
    }

    declare_action_vars(task, solver);

    let mut mutex_edges = Vec::new();
    for (i, &a) in binary.iter().enumerate() {
        for (j, &b) in binary.iter().enumerate().skip(i + 1) {
            if fluents_are_mutex(task, solver, a, b)? {
                mutex_edges.push((i, j));
            }
        }
    }
    if mutex_edges.is_empty() {
        return Ok(false);
    }

    let cliques: Vec<Vec<usize>> = connected_components(binary.len(), &mutex_edges).into_iter().filter(|c| c.len() >= 2).collect();
    if cliques.is_empty() {
        return Ok(false);
    }

    let mut replacements = Replacements::new();
    let mut merged_ids: BTreeSet<FluentId> = BTreeSet::new();
    let mut new_fluents = Vec::new();
    let mut next_id = next_free_fluent_id(task);

    for clique in &cliques {
        let members: Vec<FluentId> = clique.iter().map(|&i| binary[i]).collect();
        let name = members.iter().map(|id| task.action_fluent(*id).name.clone()).collect::<Vec<_>>().join("_or_");
        let fdr_id = next_id;
        next_id = FluentId(next_id.0 + 1);

        // Value 0 means "none of the clique is active"; value k means
        // member k-1 is active (spec §9 FDR merge value ordering decision,
        // DESIGN.md).
        for (slot, &member) in members.iter().enumerate() {
            replacements.insert(member, Rc::new(Expr::Eq(Rc::new(Expr::ActionFluent(fdr_id)), Expr::const_((slot + 1) as f64))));
            merged_ids.insert(member);
        }
        new_fluents.push(ActionFluent::fdr(fdr_id, name, members.len()));
    }

    apply_replacements(task, &replacements);

    let mut surviving: Vec<ActionFluent> = task.action_fluents().iter().filter(|f| !merged_ids.contains(&f.id)).cloned().collect();
    surviving.extend(new_fluents);
    task.set_action_fluents(surviving);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluable::ActionPrecondition;
    use crate::solver::BacktrackingSolver;

    #[test]
    fn mutually_exclusive_binary_fluents_are_merged() {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
        let b = task.add_action_fluent(ActionFluent::binary(FluentId(1), "b"));
        let not_both = Rc::new(Expr::Not(Rc::new(Expr::And(vec![Rc::new(Expr::ActionFluent(a)), Rc::new(Expr::ActionFluent(b))]))));
        task.static_sacs.push(ActionPrecondition::new("mutex", not_both));

        let mut solver = BacktrackingSolver::new();
        let changed = generate_fdr(&mut task, &mut solver).expect("fdr pass runs");
        assert!(changed);
        assert_eq!(task.action_fluents().len(), 1);
        assert!(task.action_fluents()[0].is_fdr);
        assert_eq!(task.action_fluents()[0].domain.size(), 3);
    }

    #[test]
    fn independent_fluents_are_left_alone() {
        let mut task = Task::new("t");
        task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
        task.add_action_fluent(ActionFluent::binary(FluentId(1), "b"));
        let mut solver = BacktrackingSolver::new();
        let changed = generate_fdr(&mut task, &mut solver).expect("fdr pass runs");
        assert!(!changed);
        assert_eq!(task.action_fluents().len(), 2);
    }
}
