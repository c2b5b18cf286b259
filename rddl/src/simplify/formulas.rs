//! Step 1, "Simplify formulas" (spec §4.6): repeatedly fold each surviving
//! CPF to a local fixed point, then the reward, then every raw SAC, with
//! top-level conjunctions split apart.

use std::rc::Rc;

use crate::error::{CompileError, Result};
use crate::expr::{Expr, Replacements};
use crate::task::Task;

fn is_zero(v: f64) -> bool {
    v.abs() < 1e-9
}

fn flatten_conjunction_into(e: &Rc<Expr>, out: &mut Vec<Rc<Expr>>) {
    match e.as_ref() {
        Expr::And(es) => {
            for sub in es {
                flatten_conjunction_into(sub, out);
            }
        }
        _ => out.push(e.clone()),
    }
}

/// Returns whether anything changed (a CPF collapsed to its head's initial
/// value, or an SAC was split/dropped).
pub fn simplify_formulas(task: &mut Task) -> Result<bool> {
    let mut changed = false;
    let mut replacements = Replacements::new();

    loop {
        let mut pass_changed = false;
        let mut survivors = Vec::with_capacity(task.cpfs.len());
        for mut cpf in std::mem::take(&mut task.cpfs) {
            cpf.simplify(&replacements);
            let initial_value = task.state_fluent(cpf.head).initial_value;
            if let Some(v) = cpf.eval.formula.as_const() {
                if (v - initial_value).abs() < 1e-9 {
                    if replacements.insert(cpf.head, Expr::const_(v)).is_some() {
                        return Err(CompileError::Assertion(format!("duplicate replacement registered for fluent {:?}", cpf.head)));
                    }
                    pass_changed = true;
                    continue;
                }
            }
            survivors.push(cpf);
        }
        task.cpfs = survivors;
        changed |= pass_changed;
        if !pass_changed {
            break;
        }
    }

    task.reward_cpf.simplify(&replacements);

    let mut flattened = Vec::new();
    for sac in std::mem::take(&mut task.sacs) {
        let simplified = sac.simplify(&replacements);
        flatten_conjunction_into(&simplified, &mut flattened);
    }
    let mut surviving_sacs = Vec::with_capacity(flattened.len());
    for sac in flattened {
        if let Some(v) = sac.as_const() {
            if is_zero(v) {
                return Err(CompileError::Infeasible("a state-action constraint simplified to the constant 0".into()));
            }
            changed = true;
            continue;
        }
        surviving_sacs.push(sac);
    }
    task.sacs = surviving_sacs;

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluent::{Domain, FluentId, StateFluent};

    fn task_with_constant_cpf() -> Task {
        let mut task = Task::new("t");
        let on = task.add_state_fluent(StateFluent::new(FluentId(0), "on", Domain::boolean(), 0.0));
        let mut cpf = crate::evaluable::Cpf::new(on, "on", Expr::const_(0.0));
        cpf.eval.initialize();
        task.cpfs.push(cpf);
        task
    }

    #[test]
    fn cpf_matching_initial_value_is_removed() {
        let mut task = task_with_constant_cpf();
        let changed = simplify_formulas(&mut task).expect("simplifies");
        assert!(changed);
        assert!(task.cpfs.is_empty());
    }

    #[test]
    fn infeasible_precondition_aborts() {
        let mut task = Task::new("t");
        task.sacs.push(Expr::const_(0.0));
        let err = simplify_formulas(&mut task).unwrap_err();
        assert!(matches!(err, CompileError::Infeasible(_)));
    }

    #[test]
    fn top_level_conjunction_is_split() {
        let mut task = Task::new("t");
        let a = task.add_action_fluent(crate::fluent::ActionFluent::binary(FluentId(0), "a"));
        let b = task.add_action_fluent(crate::fluent::ActionFluent::binary(FluentId(1), "b"));
        task.sacs.push(Rc::new(Expr::And(vec![Rc::new(Expr::ActionFluent(a)), Rc::new(Expr::ActionFluent(b))])));
        simplify_formulas(&mut task).expect("simplifies");
        assert_eq!(task.sacs.len(), 2);
    }
}
