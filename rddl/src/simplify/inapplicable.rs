//! Step 2, "Classify & remove inapplicable action fluents" (spec §4.6).
//!
//! Classifies each raw SAC into: trivially-forbidding (drops the action
//! fluent it negates), static (state-independent, kept for the solver),
//! an action precondition (state- and action-dependent), or a pure state
//! invariant (state-dependent, action-independent -- dropped entirely, per
//! `Evaluable::is_action_independent`'s doc comment).

use crate::error::Result;
use crate::evaluable::{ActionPrecondition, Evaluable};
use crate::expr::{Expr, Replacements};
use crate::fluent::{ActionFluent, FluentId};
use crate::task::Task;

use super::apply_replacements;

/// Returns whether any action fluent was found inapplicable and removed.
pub fn remove_inapplicable_action_fluents(task: &mut Task) -> Result<bool> {
    let mut inapplicable: Vec<FluentId> = Vec::new();
    let mut static_sacs = Vec::new();
    let mut action_preconds = Vec::new();

    for (i, sac) in task.sacs.iter().enumerate() {
        let mut eval = Evaluable::new(format!("sac{i}"), sac.clone());
        eval.initialize();

        if !eval.contains_state_fluent() {
            if let Some(forbidden) = sac.trivially_forbids_action_fluent() {
                inapplicable.push(forbidden);
                continue;
            }
            static_sacs.push(ActionPrecondition::new(format!("static-sac{i}"), sac.clone()));
        } else if eval.is_action_independent() {
            // A pure state invariant: not this pass's concern, and not a
            // legal-action constraint either, so it is simply dropped.
            continue;
        } else {
            action_preconds.push(ActionPrecondition::new(format!("precond{i}"), sac.clone()));
        }
    }

    if inapplicable.is_empty() {
        task.static_sacs = static_sacs;
        task.action_preconds = action_preconds;
        return Ok(false);
    }

    let mut replacements = Replacements::new();
    for f in &inapplicable {
        replacements.insert(*f, Expr::const_(0.0));
    }
    apply_replacements(task, &replacements);

    let surviving: Vec<ActionFluent> = task.action_fluents().iter().filter(|f| !inapplicable.contains(&f.id)).cloned().collect();
    task.set_action_fluents(surviving);

    // Rebuilt from the now-rewritten `task.sacs` on the next iteration.
    task.static_sacs = Vec::new();
    task.action_preconds = Vec::new();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluent::ActionFluent as AF;
    use std::rc::Rc;

    #[test]
    fn negated_action_fluent_with_no_state_dep_is_inapplicable() {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(AF::binary(FluentId(0), "a"));
        task.sacs.push(Rc::new(Expr::Not(Rc::new(Expr::ActionFluent(a)))));
        let changed = remove_inapplicable_action_fluents(&mut task).expect("classifies");
        assert!(changed);
        assert!(task.action_fluents().is_empty());
    }

    #[test]
    fn action_dependent_precondition_is_kept() {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(AF::binary(FluentId(0), "a"));
        task.sacs.push(Rc::new(Expr::ActionFluent(a)));
        let changed = remove_inapplicable_action_fluents(&mut task).expect("classifies");
        assert!(!changed);
        assert_eq!(task.action_preconds.len(), 1);
        assert!(task.static_sacs.is_empty());
    }

    #[test]
    fn state_independent_non_negated_sac_is_static() {
        let mut task = Task::new("t");
        task.add_action_fluent(AF::binary(FluentId(0), "a"));
        task.sacs.push(Expr::const_(1.0));
        let changed = remove_inapplicable_action_fluents(&mut task).expect("classifies");
        assert!(!changed);
        assert_eq!(task.static_sacs.len(), 1);
    }
}
