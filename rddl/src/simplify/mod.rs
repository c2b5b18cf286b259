//! The fixpoint simplification pipeline (C6), transcribed pass-by-pass
//! from `original_source/src/rddl_parser/simplifier.cc`. Orchestration
//! shape (named `EnvParam` gate per pass, a span around the whole run)
//! follows `plaans-aries`'s `chronicles/preprocessing/mod.rs::preprocess`.
//!
//! Every pass here reads and rewrites formulas through `Evaluable::formula`
//! directly rather than through `Evaluable::evaluate`/`evaluate_kleene`:
//! those cached entry points assume `Task::finalize_hash_keys` has already
//! run, which only happens once this pipeline has converged.

mod enumerate;
mod fdr;
mod formulas;
mod inapplicable;
mod reachability;
mod relevance;

use std::rc::Rc;

use crate::config::ENABLE_FDR_GENERATION;
use crate::error::Result;
use crate::expr::Expr;
use crate::fluent::FluentId;
use crate::solver::{BacktrackingSolver, Solver};
use crate::task::Task;

/// Runs the fixpoint over a private `BacktrackingSolver` (spec.md §1: the
/// solver is an oracle, not a vendored product).
pub fn simplify(task: &mut Task) -> Result<()> {
    let mut solver = BacktrackingSolver::new();
    simplify_with(task, &mut solver)
}

/// Same as `simplify`, with an explicit solver -- the seam unit tests use
/// to observe intermediate oracle queries without reaching into a private
/// default.
pub fn simplify_with(task: &mut Task, solver: &mut dyn Solver) -> Result<()> {
    let _span = tracing::info_span!("simplify").entered();
    let mut iteration = 0u32;
    loop {
        iteration += 1;
        let _iter_span = tracing::debug_span!("iteration", iteration).entered();
        let mut any_change = formulas::simplify_formulas(task)?;

        if inapplicable::remove_inapplicable_action_fluents(task)? {
            tracing::debug!("inapplicable action fluent removed, restarting");
            continue;
        }

        if relevance::prune_irrelevant_action_fluents(task) {
            tracing::debug!("irrelevant action fluent pruned, restarting");
            continue;
        }

        if ENABLE_FDR_GENERATION.get() && fdr::generate_fdr(task, solver)? {
            tracing::debug!("action fluents merged into an FDR variable, restarting");
            continue;
        }

        if enumerate::enumerate_actions(task, solver)? {
            tracing::debug!("a constant-valued action fluent was dropped, restarting");
            continue;
        }

        any_change |= reachability::approximate_domains(task)?;

        if !any_change {
            break;
        }
    }

    // Dependency-sort CPFs and canonicalize action-state ordering now that
    // the fluent and action-state sets are final (spec §4.7 `sortCPFs`/
    // `sortActionStates`); every earlier pass still freely adds/removes
    // CPFs and action states, so sorting mid-fixpoint would be redone work.
    task.sort_cpfs()?;
    task.sort_action_states();

    enumerate::initialize_action_states(task, solver)?;
    Ok(())
}

fn declare_state_vars(task: &Task, solver: &mut dyn Solver) {
    for f in task.state_fluents() {
        solver.declare_state_variable(f.id, f.domain.size());
    }
}

fn declare_action_vars(task: &Task, solver: &mut dyn Solver) {
    for f in task.action_fluents() {
        solver.declare_action_variable(f.id, f.domain.size());
    }
}

fn static_sac_formulas(task: &Task) -> Vec<Rc<Expr>> {
    task.static_sacs.iter().map(|p| p.eval.formula.clone()).collect()
}

/// Rewrites every surviving formula (CPFs, reward, raw SACs) through
/// `replacements`, the one substitution idiom every deletion pass shares
/// (spec §4.6: "rewriting references to them as 0 via the replacement
/// map").
fn apply_replacements(task: &mut Task, replacements: &crate::expr::Replacements) {
    for cpf in task.cpfs.iter_mut() {
        cpf.simplify(replacements);
    }
    task.reward_cpf.simplify(replacements);
    task.sacs = task.sacs.iter().map(|s| s.simplify(replacements)).collect();
}

fn next_free_fluent_id(task: &Task) -> FluentId {
    let max_state = task.state_fluents().iter().map(|f| f.id.0).max().unwrap_or(0);
    let max_action = task.action_fluents().iter().map(|f| f.id.0).max().unwrap_or(0);
    FluentId(max_state.max(max_action) + 1)
}
