//! Step 5, "Enumerate legal actions" (spec §4.6), and the post-convergence
//! "Action-state initialization" pass that attaches each action's
//! `relevantSACs`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::config::MAX_LEGAL_ACTIONS;
use crate::error::{CompileError, Result};
use crate::expr::{Expr, Replacements};
use crate::fluent::{ActionFluent, FluentId};
use crate::solver::Solver;
use crate::state::ActionState;
use crate::task::Task;

use super::{apply_replacements, declare_action_vars, declare_state_vars};

/// Asks the solver for every satisfying action assignment under the
/// posted preconditions, then drops any action fluent that turned out
/// constant zero across all of them. Returns whether a fluent was dropped
/// (spec §4.6 step 5 "if anything was deleted, continue").
pub fn enumerate_actions(task: &mut Task, solver: &mut dyn Solver) -> Result<bool> {
    declare_state_vars(task, solver);
    declare_action_vars(task, solver);
    solver.push();
    let preconditions: Vec<Rc<Expr>> = task
        .action_preconds
        .iter()
        .map(|p| p.eval.formula.clone())
        .chain(task.static_sacs.iter().map(|p| p.eval.formula.clone()))
        .collect();
    solver.add_preconditions(&preconditions, 0);

    let mut action_states = Vec::new();
    loop {
        if action_states.len() >= MAX_LEGAL_ACTIONS.get() {
            solver.pop();
            return Err(CompileError::Resource(format!("legal-action limit of {} exceeded during enumeration", MAX_LEGAL_ACTIONS.get())));
        }
        match solver.has_solution() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                solver.pop();
                return Err(e);
            }
        }
        let model = solver.get_action_model();
        let mut values = vec![0i64; task.action_fluents().len()];
        for (id, v) in &model {
            values[task.action_fluent(*id).index] = *v;
        }
        action_states.push(ActionState::new(values));
        solver.invalidate_action_model();
    }
    solver.pop();

    if action_states.is_empty() {
        return Err(CompileError::Infeasible("no legal action satisfies every precondition".into()));
    }
    for (idx, a) in action_states.iter_mut().enumerate() {
        a.index = idx as i64;
    }
    task.action_states = action_states;

    let n_fluents = task.action_fluents().len();
    let constant_zero: Vec<FluentId> = (0..n_fluents)
        .filter(|&i| task.action_states.iter().all(|a| a[i] == 0))
        .map(|i| task.action_fluents()[i].id)
        .collect();
    if constant_zero.is_empty() {
        return Ok(false);
    }

    let mut replacements = Replacements::new();
    for f in &constant_zero {
        replacements.insert(*f, Expr::const_(0.0));
    }
    apply_replacements(task, &replacements);

    let surviving: Vec<ActionFluent> = task.action_fluents().iter().filter(|f| !constant_zero.contains(&f.id)).cloned().collect();
    task.set_action_fluents(surviving);
    // Stale now that the action-fluent set shrank; re-enumerated on the
    // next pass over this step.
    task.action_states.clear();
    Ok(true)
}

/// For each legal action and each action precondition, asks the solver
/// whether some state falsifies the precondition given that action; if
/// so, the precondition is relevant to that action and globally relevant.
/// Globally irrelevant preconditions are dropped (spec §4.6
/// "Action-state initialization").
pub fn initialize_action_states(task: &mut Task, solver: &mut dyn Solver) -> Result<()> {
    declare_state_vars(task, solver);
    declare_action_vars(task, solver);

    let mut relevant = vec![false; task.action_preconds.len()];
    let mut per_action: Vec<Vec<usize>> = vec![Vec::new(); task.action_states.len()];

    for (action_idx, action) in task.action_states.iter().enumerate() {
        let fixed: Vec<(FluentId, i64)> = task.action_fluents().iter().enumerate().map(|(i, f)| (f.id, action[i])).collect();
        for (precond_idx, precond) in task.action_preconds.iter().enumerate() {
            solver.push();
            solver.assign_action_variables(&fixed);
            solver.add_constraint(Rc::new(Expr::Not(precond.eval.formula.clone())), 0);
            let falsifiable = solver.has_solution();
            solver.pop();
            if falsifiable? {
                per_action[action_idx].push(precond_idx);
                relevant[precond_idx] = true;
            }
        }
    }

    let remap: HashMap<usize, usize> = (0..relevant.len()).filter(|&i| relevant[i]).enumerate().map(|(new, old)| (old, new)).collect();
    task.action_preconds = std::mem::take(&mut task.action_preconds).into_iter().enumerate().filter(|(i, _)| relevant[*i]).map(|(_, p)| p).collect();

    for (action, sacs) in task.action_states.iter_mut().zip(per_action) {
        action.relevant_sacs = sacs.iter().filter_map(|old| remap.get(old).copied()).collect();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluable::ActionPrecondition;
    use crate::solver::BacktrackingSolver;

    #[test]
    fn enumerates_all_assignments_when_unconstrained() {
        let mut task = Task::new("t");
        task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
        let mut solver = BacktrackingSolver::new();
        let changed = enumerate_actions(&mut task, &mut solver).expect("enumerates");
        assert!(!changed);
        assert_eq!(task.action_states.len(), 2);
    }

    #[test]
    fn unsatisfiable_preconditions_are_infeasible() {
        let mut task = Task::new("t");
        task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
        task.static_sacs.push(ActionPrecondition::new("false", Expr::const_(0.0)));
        let mut solver = BacktrackingSolver::new();
        let err = enumerate_actions(&mut task, &mut solver).unwrap_err();
        assert!(matches!(err, CompileError::Infeasible(_)));
    }

    #[test]
    fn irrelevant_precondition_is_dropped_post_convergence() {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
        let on = task.add_state_fluent(crate::fluent::StateFluent::new(FluentId(1), "on", crate::fluent::Domain::boolean(), 0.0));
        // `a | on` is never false for any state when `a` is fixed to 1, so it
        // falsifiable only through `on`; still globally relevant via action 0.
        let precond = ActionPrecondition::new("p", Rc::new(Expr::Or(vec![Rc::new(Expr::ActionFluent(a)), Rc::new(Expr::StateFluent(on))])));
        task.action_preconds.push(precond);
        let mut solver = BacktrackingSolver::new();
        enumerate_actions(&mut task, &mut solver).expect("enumerates");
        initialize_action_states(&mut task, &mut solver).expect("initializes");
        assert_eq!(task.action_preconds.len(), 1);
        assert!(task.action_states.iter().any(|a| !a.relevant_sacs.is_empty()));
    }
}
