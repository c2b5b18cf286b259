//! Step 3, "Relevance" (spec §4.6): deletes any action fluent not
//! referenced by a surviving CPF, precondition, static SAC, or the reward.

use std::collections::BTreeSet;

use crate::expr::{Expr, Replacements};
use crate::fluent::{ActionFluent, FluentId};
use crate::task::Task;

use super::apply_replacements;

/// Returns whether any action fluent was found irrelevant and removed.
pub fn prune_irrelevant_action_fluents(task: &mut Task) -> bool {
    let mut used: BTreeSet<FluentId> = BTreeSet::new();
    for cpf in &task.cpfs {
        used.extend(cpf.eval.dependent_action_fluents());
    }
    used.extend(task.reward_cpf.eval.dependent_action_fluents());
    for p in &task.action_preconds {
        used.extend(p.eval.dependent_action_fluents());
    }
    for s in &task.static_sacs {
        used.extend(s.eval.dependent_action_fluents());
    }

    let irrelevant: Vec<FluentId> = task.action_fluents().iter().map(|f| f.id).filter(|id| !used.contains(id)).collect();
    if irrelevant.is_empty() {
        return false;
    }

    let mut replacements = Replacements::new();
    for f in &irrelevant {
        replacements.insert(*f, Expr::const_(0.0));
    }
    apply_replacements(task, &replacements);

    let surviving: Vec<ActionFluent> = task.action_fluents().iter().filter(|f| used.contains(&f.id)).cloned().collect();
    task.set_action_fluents(surviving);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluent::{ActionFluent as AF, FluentId};
    use std::rc::Rc;

    #[test]
    fn fluent_referenced_by_reward_survives() {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(AF::binary(FluentId(0), "a"));
        task.reward_cpf = crate::evaluable::RewardCpf::new(Rc::new(Expr::ActionFluent(a)));
        task.reward_cpf.eval.initialize();
        let changed = prune_irrelevant_action_fluents(&mut task);
        assert!(!changed);
        assert_eq!(task.action_fluents().len(), 1);
    }

    #[test]
    fn unreferenced_fluent_is_pruned() {
        let mut task = Task::new("t");
        task.add_action_fluent(AF::binary(FluentId(0), "unused"));
        task.reward_cpf.eval.initialize();
        let changed = prune_irrelevant_action_fluents(&mut task);
        assert!(changed);
        assert!(task.action_fluents().is_empty());
    }
}
