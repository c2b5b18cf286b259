//! Step 6, "Domain approximation" (spec §4.6): a Minkowski-style
//! reachability fixpoint over Kleene states, replacing each state
//! fluent's declared domain with its reachable value set. No
//! `reachability_analysis.h` is present in the retrieval pack, so this is
//! built from spec.md's textual description directly.

use crate::error::Result;
use crate::expr::Replacements;
use crate::fluent::Domain;
use crate::state::KleeneState;
use crate::task::Task;

/// Returns whether any state fluent's domain changed (including
/// collapsing to a single reachable value, which also drops its CPF --
/// the same treatment step 1 gives a CPF that folds to a constant).
pub fn approximate_domains(task: &mut Task) -> Result<bool> {
    let mut reached = KleeneState::new(task.state_fluents().len());
    for (idx, f) in task.state_fluents().iter().enumerate() {
        reached[idx].insert(crate::fval::FVal(f.initial_value));
    }

    loop {
        let mut next = reached.clone();
        for action in &task.action_states {
            for cpf in &task.cpfs {
                let idx = task.state_fluent(cpf.head).index;
                let outcomes = cpf.eval.formula.evaluate_kleene(&reached, action, task);
                for v in outcomes {
                    next[idx].insert(v);
                }
            }
        }
        if next == reached {
            break;
        }
        reached = next;
    }

    let mut changed = false;
    let mut replacements = Replacements::new();
    let mut new_state_fluents = Vec::with_capacity(task.state_fluents().len());

    for (idx, f) in task.state_fluents().iter().enumerate() {
        let mut values: Vec<f64> = reached[idx].iter().map(|v| v.get()).collect();
        values.sort_by(|a, b| a.partial_cmp(b).expect("fluent values are never NaN"));

        if values.len() == 1 {
            replacements.insert(f.id, crate::expr::Expr::const_(values[0]));
            changed = true;
            continue;
        }
        if values != f.domain.values() {
            changed = true;
        }
        let mut nf = f.clone();
        nf.domain = Domain::new(values);
        new_state_fluents.push(nf);
    }

    if changed {
        for cpf in task.cpfs.iter_mut() {
            cpf.simplify(&replacements);
        }
        task.reward_cpf.simplify(&replacements);
        task.sacs = task.sacs.iter().map(|s| s.simplify(&replacements)).collect();
        task.cpfs.retain(|cpf| !replacements.contains_key(&cpf.head));
        task.set_state_fluents(new_state_fluents);
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluable::Cpf;
    use crate::expr::Expr;
    use crate::fluent::{ActionFluent, FluentId, StateFluent};
    use crate::state::ActionState;
    use std::rc::Rc;

    #[test]
    fn unreachable_values_are_dropped_from_the_domain() {
        let mut task = Task::new("t");
        // "on" can take values {0,1,2} but the only CPF keeps it pinned at 0.
        let on = task.add_state_fluent(StateFluent::new(FluentId(0), "on", Domain::new(vec![0.0, 1.0, 2.0]), 0.0));
        let mut cpf = Cpf::new(on, "on", Expr::const_(0.0));
        cpf.eval.initialize();
        task.cpfs.push(cpf);
        task.action_states = vec![ActionState::new(vec![])];

        let changed = approximate_domains(&mut task).expect("runs");
        assert!(changed);
        // The fluent collapsed to a constant, so both it and its CPF are gone.
        assert!(task.state_fluents().is_empty());
        assert!(task.cpfs.is_empty());
    }

    #[test]
    fn reachable_toggle_keeps_full_domain() {
        let mut task = Task::new("t");
        let on = task.add_state_fluent(StateFluent::new(FluentId(0), "on", Domain::boolean(), 0.0));
        let flip = task.add_action_fluent(ActionFluent::binary(FluentId(1), "flip"));
        let formula = Rc::new(Expr::Ne(Rc::new(Expr::StateFluent(on)), Rc::new(Expr::ActionFluent(flip))));
        let mut cpf = Cpf::new(on, "on", formula);
        cpf.eval.initialize();
        task.cpfs.push(cpf);
        let mut off = ActionState::new(vec![0]);
        off.index = 0;
        let mut flip_on = ActionState::new(vec![1]);
        flip_on.index = 1;
        task.action_states = vec![off, flip_on];

        let changed = approximate_domains(&mut task).expect("runs");
        assert!(!changed);
        assert_eq!(task.state_fluents()[0].domain.values(), &[0.0, 1.0]);
    }
}
