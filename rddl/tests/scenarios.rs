//! End-to-end scenarios exercising the simplifier (C6) and enumeration
//! writer (spec.md §8 "Concrete scenarios") through the public API.

use std::rc::Rc;

use rddl::evaluable::{Cpf, RewardCpf};
use rddl::expr::Expr;
use rddl::fluent::{ActionFluent, Domain, FluentId, StateFluent};
use rddl::hashkey::{self, CachingType};
use rddl::state::ActionState;
use rddl::task::Task;
use rddl::{io, simplify};

#[test]
fn trivial_feasibility() {
    let mut task = Task::new("trivial");
    let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
    let mut reward = RewardCpf::new(Rc::new(Expr::ActionFluent(a)));
    reward.eval.initialize();
    task.reward_cpf = reward;

    simplify::simplify(&mut task).expect("unconstrained binary action simplifies");
    task.finalize_hash_keys().expect("hash keys finalize");

    assert_eq!(task.action_states.len(), 2);
    assert_eq!(task.action_states[0].values(), &[0]);
    assert_eq!(task.action_states[1].values(), &[1]);

    let state = task.initial_state();
    for action in &task.action_states {
        let expected = action[0] as f64;
        assert_eq!(task.reward_cpf.eval.evaluate(&state, action, &task), expected);
    }
}

#[test]
fn inapplicable_action_is_dropped() {
    let mut task = Task::new("inapplicable");
    let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
    let mut reward = RewardCpf::new(Rc::new(Expr::ActionFluent(a)));
    reward.eval.initialize();
    task.reward_cpf = reward;
    // "not a": a trivially-forbidding static SAC.
    task.sacs.push(Rc::new(Expr::Not(Rc::new(Expr::ActionFluent(a)))));

    simplify::simplify(&mut task).expect("simplifies");
    task.finalize_hash_keys().expect("hash keys finalize");

    assert!(task.action_fluents().is_empty());
    assert_eq!(task.action_states.len(), 1);
    assert!(task.action_states[0].values().is_empty());
    assert_eq!(task.reward_cpf.eval.formula.as_const(), Some(0.0));
}

#[test]
fn mutex_actions_merge_into_one_fdr_fluent() {
    let mut task = Task::new("fdr");
    let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
    let b = task.add_action_fluent(ActionFluent::binary(FluentId(1), "b"));
    let c = task.add_action_fluent(ActionFluent::binary(FluentId(2), "c"));
    // at most one of a, b, c may be active at once.
    let at_most_one = Rc::new(Expr::Le(
        Rc::new(Expr::Add(vec![
            Rc::new(Expr::ActionFluent(a)),
            Rc::new(Expr::ActionFluent(b)),
            Rc::new(Expr::ActionFluent(c)),
        ])),
        Expr::const_(1.0),
    ));
    task.sacs.push(at_most_one);

    simplify::simplify(&mut task).expect("simplifies");
    task.finalize_hash_keys().expect("hash keys finalize");

    assert_eq!(task.action_fluents().len(), 1);
    assert!(task.action_fluents()[0].is_fdr);
    assert_eq!(task.action_fluents()[0].domain.size(), 4); // none, a, b, c
    assert_eq!(task.action_states.len(), 4);
}

#[test]
fn constant_fluent_is_collapsed_and_removed() {
    let mut task = Task::new("constant");
    let f = task.add_state_fluent(StateFluent::new(FluentId(0), "f", Domain::new(vec![3.0]), 3.0));
    let mut cpf = Cpf::new(f, "f", Rc::new(Expr::StateFluent(f)));
    cpf.eval.initialize();
    task.cpfs.push(cpf);

    simplify::simplify(&mut task).expect("simplifies");
    task.finalize_hash_keys().expect("hash keys finalize");

    assert!(task.state_fluents().is_empty());
    assert!(task.cpfs.is_empty());
}

#[test]
fn cache_mode_is_chosen_from_footprint() {
    // Four binary state fluents and two binary action fluents: 2^4 * 2^2 = 64.
    assert_eq!(hashkey::choose_caching_type(1 << 4, 1 << 2), CachingType::Vector);
    // Forty binary state fluents: 2^40 combinations, far past either threshold.
    assert_eq!(hashkey::choose_caching_type(1i64 << 40, 1), CachingType::None);
}

#[test]
fn enumeration_output_matches_the_spec_format() {
    let mut task = Task::new("enum");
    let a = task.add_action_fluent(ActionFluent::binary(FluentId(0), "a"));
    let mut reward = RewardCpf::new(Rc::new(Expr::ActionFluent(a)));
    reward.eval.initialize();
    task.reward_cpf = reward;

    let mut off = ActionState::new(vec![0]);
    off.index = 0;
    let mut on = ActionState::new(vec![1]);
    on.index = 1;
    task.action_states = vec![off, on];
    task.finalize_hash_keys().expect("hash keys finalize");

    let result = io::enumerate(&task).expect("enumeration succeeds");
    let text = result.format();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("1"));
    assert_eq!(lines.next(), Some("2"));
    assert_eq!(lines.next(), Some("0 0 ( 0 1 ) 0"));
    assert_eq!(lines.next(), Some("0 1 ( 0 1 ) 1"));
    assert_eq!(lines.next(), None);
}
