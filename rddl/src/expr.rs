//! The expression tree (C1): an immutable, structurally-shared syntactic
//! representation of logical/arithmetic formulas.
//!
//! Variants follow spec §4.1. Bounded existential/universal quantification
//! is assumed already ground-expanded by the external parser into
//! `And`/`Or`, so no quantifier variant is needed here.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::fluent::FluentId;
use crate::fval::FVal;
use crate::state::{ActionState, DiscretePD, KleeneState, State};
use crate::task::Task;

/// A node of the expression tree. Children are `Rc`-shared so that
/// `simplify` can return a new tree while leaving unaffected subtrees
/// shared with the original.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(f64),
    StateFluent(FluentId),
    ActionFluent(FluentId),
    Not(Rc<Expr>),
    And(Vec<Rc<Expr>>),
    Or(Vec<Rc<Expr>>),
    Eq(Rc<Expr>, Rc<Expr>),
    Ne(Rc<Expr>, Rc<Expr>),
    Lt(Rc<Expr>, Rc<Expr>),
    Le(Rc<Expr>, Rc<Expr>),
    Gt(Rc<Expr>, Rc<Expr>),
    Ge(Rc<Expr>, Rc<Expr>),
    Add(Vec<Rc<Expr>>),
    Mul(Vec<Rc<Expr>>),
    Sub(Rc<Expr>, Rc<Expr>),
    Div(Rc<Expr>, Rc<Expr>),
    IfThenElse(Rc<Expr>, Rc<Expr>, Rc<Expr>),
    /// A discrete probability distribution: a list of (value, probability)
    /// pairs. Marks the enclosing Evaluable as probabilistic.
    Discrete(Vec<(Rc<Expr>, Rc<Expr>)>),
}

/// A partial substitution of fluent -> expression, threaded through a
/// simplification sweep (spec glossary: Replacement map).
pub type Replacements = std::collections::HashMap<FluentId, Rc<Expr>>;

/// The three dependency sets collected by `collect_dependencies` (spec
/// §4.1), attached by the caller onto the enclosing `Evaluable`.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    pub state_fluents: BTreeSet<FluentId>,
    pub positive_action: BTreeSet<FluentId>,
    pub negative_action: BTreeSet<FluentId>,
    pub has_arithmetic: bool,
}

fn is_zero(v: f64) -> bool {
    v.abs() < 1e-9
}

impl Expr {
    pub fn const_(v: f64) -> Rc<Expr> {
        Rc::new(Expr::Const(v))
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    /// Standard real-valued evaluation (spec §4.1/§4.2 "standard"
    /// semantics): looks up current fluent positions through `task`.
    pub fn evaluate(&self, state: &State, action: &ActionState, task: &Task) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::StateFluent(id) => {
                let idx = task.state_fluent(*id).index;
                state[idx]
            }
            Expr::ActionFluent(id) => {
                let idx = task.action_fluent(*id).index;
                action[idx] as f64
            }
            Expr::Not(e) => {
                if is_zero(e.evaluate(state, action, task)) {
                    1.0
                } else {
                    0.0
                }
            }
            Expr::And(es) => {
                for e in es {
                    if is_zero(e.evaluate(state, action, task)) {
                        return 0.0;
                    }
                }
                1.0
            }
            Expr::Or(es) => {
                for e in es {
                    if !is_zero(e.evaluate(state, action, task)) {
                        return 1.0;
                    }
                }
                0.0
            }
            Expr::Eq(a, b) => bool01(a.evaluate(state, action, task) == b.evaluate(state, action, task)),
            Expr::Ne(a, b) => bool01(a.evaluate(state, action, task) != b.evaluate(state, action, task)),
            Expr::Lt(a, b) => bool01(a.evaluate(state, action, task) < b.evaluate(state, action, task)),
            Expr::Le(a, b) => bool01(a.evaluate(state, action, task) <= b.evaluate(state, action, task)),
            Expr::Gt(a, b) => bool01(a.evaluate(state, action, task) > b.evaluate(state, action, task)),
            Expr::Ge(a, b) => bool01(a.evaluate(state, action, task) >= b.evaluate(state, action, task)),
            Expr::Add(es) => es.iter().map(|e| e.evaluate(state, action, task)).sum(),
            Expr::Mul(es) => es.iter().map(|e| e.evaluate(state, action, task)).product(),
            Expr::Sub(a, b) => a.evaluate(state, action, task) - b.evaluate(state, action, task),
            Expr::Div(a, b) => a.evaluate(state, action, task) / b.evaluate(state, action, task),
            Expr::IfThenElse(c, t, e) => {
                if !is_zero(c.evaluate(state, action, task)) {
                    t.evaluate(state, action, task)
                } else {
                    e.evaluate(state, action, task)
                }
            }
            Expr::Discrete(_) => {
                panic!("a probabilistic expression cannot be evaluated under the standard (deterministic) semantics; evaluate its PD instead")
            }
        }
    }

    /// Kleene (possibility-set) evaluation (spec §4.2/§4.6): returns the
    /// *union* over every combination of values consistent with `state`'s
    /// per-fluent possibility sets of the real-valued result. Sound by
    /// construction: the real value for any concrete state consistent
    /// with `state` is a member of the returned set (spec §8 "Kleene
    /// soundness").
    pub fn evaluate_kleene(&self, state: &KleeneState, action: &ActionState, task: &Task) -> BTreeSet<FVal> {
        match self {
            Expr::Const(v) => singleton(*v),
            Expr::StateFluent(id) => {
                let idx = task.state_fluent(*id).index;
                state[idx].clone()
            }
            Expr::ActionFluent(id) => {
                let idx = task.action_fluent(*id).index;
                singleton(action[idx] as f64)
            }
            Expr::Not(e) => map1(e.evaluate_kleene(state, action, task), |v| bool01(is_zero(v))),
            Expr::And(es) => fold_n(es, state, action, task, 1.0, |acc, v| {
                if is_zero(acc) || is_zero(v) {
                    0.0
                } else {
                    1.0
                }
            }),
            Expr::Or(es) => fold_n(es, state, action, task, 0.0, |acc, v| {
                if !is_zero(acc) || !is_zero(v) {
                    1.0
                } else {
                    0.0
                }
            }),
            Expr::Eq(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| bool01(x == y)),
            Expr::Ne(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| bool01(x != y)),
            Expr::Lt(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| bool01(x < y)),
            Expr::Le(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| bool01(x <= y)),
            Expr::Gt(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| bool01(x > y)),
            Expr::Ge(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| bool01(x >= y)),
            Expr::Add(es) => fold_n(es, state, action, task, 0.0, |acc, v| acc + v),
            Expr::Mul(es) => fold_n(es, state, action, task, 1.0, |acc, v| acc * v),
            Expr::Sub(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| x - y),
            Expr::Div(a, b) => map2(a.evaluate_kleene(state, action, task), b.evaluate_kleene(state, action, task), |x, y| x / y),
            Expr::IfThenElse(c, t, e) => {
                let cset = c.evaluate_kleene(state, action, task);
                let mut out = BTreeSet::new();
                if cset.iter().any(|v| !is_zero(v.get())) {
                    out.extend(t.evaluate_kleene(state, action, task));
                }
                if cset.iter().any(|v| is_zero(v.get())) {
                    out.extend(e.evaluate_kleene(state, action, task));
                }
                out
            }
            Expr::Discrete(pairs) => {
                let mut out = BTreeSet::new();
                for (v, _p) in pairs {
                    out.extend(v.evaluate_kleene(state, action, task));
                }
                out
            }
        }
    }

    /// Evaluates a CPF body to a `DiscretePD` (spec §3 `PDState`): a
    /// top-level `Discrete` produces its declared support directly (the
    /// value/probability sub-expressions of a discrete outcome are
    /// themselves deterministic, per spec.md's factored-MDP model); any
    /// other shape is evaluated under the standard deterministic
    /// semantics and wrapped as a point mass. Used by the successor-state
    /// computation (spec §6), which is the only caller that needs a full
    /// distribution rather than a single real value.
    pub fn evaluate_pd(&self, state: &State, action: &ActionState, task: &Task) -> DiscretePD {
        match self {
            Expr::Discrete(pairs) => {
                let support = pairs
                    .iter()
                    .map(|(v, p)| (v.evaluate(state, action, task), p.evaluate(state, action, task)))
                    .collect();
                DiscretePD::new(support)
            }
            _ => DiscretePD::deterministic(self.evaluate(state, action, task)),
        }
    }

    /// Rewrites `self` with each fluent in `replacements` substituted,
    /// folding constants locally. Preserves structural sharing when no
    /// child changed (spec §4.1).
    pub fn simplify(self: &Rc<Expr>, replacements: &Replacements) -> Rc<Expr> {
        match self.as_ref() {
            Expr::Const(_) => self.clone(),
            Expr::StateFluent(id) | Expr::ActionFluent(id) => {
                if let Some(r) = replacements.get(id) {
                    r.clone()
                } else {
                    self.clone()
                }
            }
            Expr::Not(e) => {
                let e2 = e.simplify(replacements);
                if let Some(v) = e2.as_const() {
                    Expr::const_(bool01(is_zero(v)))
                } else if Rc::ptr_eq(&e2, e) {
                    self.clone()
                } else {
                    Rc::new(Expr::Not(e2))
                }
            }
            Expr::And(es) => simplify_conjunction(es, replacements),
            Expr::Or(es) => simplify_disjunction(es, replacements),
            Expr::Eq(a, b) => simplify_compare(a, b, replacements, |x, y| x == y, Expr::Eq),
            Expr::Ne(a, b) => simplify_compare(a, b, replacements, |x, y| x != y, Expr::Ne),
            Expr::Lt(a, b) => simplify_compare(a, b, replacements, |x, y| x < y, Expr::Lt),
            Expr::Le(a, b) => simplify_compare(a, b, replacements, |x, y| x <= y, Expr::Le),
            Expr::Gt(a, b) => simplify_compare(a, b, replacements, |x, y| x > y, Expr::Gt),
            Expr::Ge(a, b) => simplify_compare(a, b, replacements, |x, y| x >= y, Expr::Ge),
            Expr::Add(es) => simplify_nary_arith(es, replacements, 0.0, |a, b| a + b, Expr::Add),
            Expr::Mul(es) => {
                // A product containing the constant 0 collapses to 0.
                let simplified: Vec<Rc<Expr>> = es.iter().map(|e| e.simplify(replacements)).collect();
                if simplified.iter().any(|e| matches!(e.as_const(), Some(v) if is_zero(v))) {
                    return Expr::const_(0.0);
                }
                simplify_nary_arith_from(simplified, 1.0, |a, b| a * b, Expr::Mul)
            }
            Expr::Sub(a, b) => {
                let a2 = a.simplify(replacements);
                let b2 = b.simplify(replacements);
                match (a2.as_const(), b2.as_const()) {
                    (Some(x), Some(y)) => Expr::const_(x - y),
                    _ => Rc::new(Expr::Sub(a2, b2)),
                }
            }
            Expr::Div(a, b) => {
                let a2 = a.simplify(replacements);
                let b2 = b.simplify(replacements);
                match (a2.as_const(), b2.as_const()) {
                    (Some(x), Some(y)) => Expr::const_(x / y),
                    _ => Rc::new(Expr::Div(a2, b2)),
                }
            }
            Expr::IfThenElse(c, t, e) => {
                let c2 = c.simplify(replacements);
                if let Some(v) = c2.as_const() {
                    if is_zero(v) {
                        e.simplify(replacements)
                    } else {
                        t.simplify(replacements)
                    }
                } else {
                    Rc::new(Expr::IfThenElse(c2, t.simplify(replacements), e.simplify(replacements)))
                }
            }
            Expr::Discrete(pairs) => {
                let pairs2 = pairs
                    .iter()
                    .map(|(v, p)| (v.simplify(replacements), p.simplify(replacements)))
                    .collect();
                Rc::new(Expr::Discrete(pairs2))
            }
        }
    }

    /// Collects the three dependency sets used by the enclosing
    /// `Evaluable` (spec §4.1). `polarity` starts `true` and is flipped
    /// under `Not`; it approximates whether an action fluent's truth
    /// increases (`true`) or decreases (`false`) the expression's value,
    /// which is exact for the syntactic shapes that matter
    /// (`triviallyForbidsActionFluent` only looks at a top-level `Not`).
    pub fn collect_dependencies(&self, deps: &mut Dependencies, polarity: bool) {
        match self {
            Expr::Const(_) => {}
            Expr::StateFluent(id) => {
                deps.state_fluents.insert(*id);
            }
            Expr::ActionFluent(id) => {
                if polarity {
                    deps.positive_action.insert(*id);
                } else {
                    deps.negative_action.insert(*id);
                }
            }
            Expr::Not(e) => e.collect_dependencies(deps, !polarity),
            Expr::And(es) | Expr::Or(es) => {
                for e in es {
                    e.collect_dependencies(deps, polarity);
                }
            }
            Expr::Eq(a, b) | Expr::Ne(a, b) => {
                a.collect_dependencies(deps, polarity);
                b.collect_dependencies(deps, polarity);
            }
            Expr::Lt(a, b) | Expr::Le(a, b) => {
                a.collect_dependencies(deps, polarity);
                b.collect_dependencies(deps, !polarity);
            }
            Expr::Gt(a, b) | Expr::Ge(a, b) => {
                a.collect_dependencies(deps, !polarity);
                b.collect_dependencies(deps, polarity);
            }
            Expr::Add(es) => {
                deps.has_arithmetic = true;
                for e in es {
                    e.collect_dependencies(deps, polarity);
                }
            }
            Expr::Mul(es) => {
                deps.has_arithmetic = true;
                for e in es {
                    e.collect_dependencies(deps, polarity);
                }
            }
            Expr::Sub(a, b) => {
                deps.has_arithmetic = true;
                a.collect_dependencies(deps, polarity);
                b.collect_dependencies(deps, !polarity);
            }
            Expr::Div(a, b) => {
                deps.has_arithmetic = true;
                a.collect_dependencies(deps, polarity);
                b.collect_dependencies(deps, polarity);
            }
            Expr::IfThenElse(c, t, e) => {
                c.collect_dependencies(deps, true);
                c.collect_dependencies(deps, false);
                t.collect_dependencies(deps, polarity);
                e.collect_dependencies(deps, polarity);
            }
            Expr::Discrete(pairs) => {
                for (v, p) in pairs {
                    v.collect_dependencies(deps, polarity);
                    p.collect_dependencies(deps, polarity);
                }
            }
        }
    }

    /// True iff this expression is `Not(ActionFluent(a))` with `a` the
    /// only action fluent and no state fluent involved: a static action
    /// constraint that trivially forbids `a` in every legal action (spec
    /// §4.6 step 2a). Returns the forbidden fluent's id.
    pub fn trivially_forbids_action_fluent(&self) -> Option<FluentId> {
        match self {
            Expr::Not(e) => match e.as_ref() {
                Expr::ActionFluent(id) => Some(*id),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_probabilistic(&self) -> bool {
        match self {
            Expr::Discrete(_) => true,
            Expr::Not(e) => e.is_probabilistic(),
            Expr::And(es) | Expr::Or(es) | Expr::Add(es) | Expr::Mul(es) => es.iter().any(|e| e.is_probabilistic()),
            Expr::Eq(a, b) | Expr::Ne(a, b) | Expr::Lt(a, b) | Expr::Le(a, b) | Expr::Gt(a, b) | Expr::Ge(a, b) | Expr::Sub(a, b) | Expr::Div(a, b) => {
                a.is_probabilistic() || b.is_probabilistic()
            }
            Expr::IfThenElse(c, t, e) => c.is_probabilistic() || t.is_probabilistic() || e.is_probabilistic(),
            Expr::Const(_) | Expr::StateFluent(_) | Expr::ActionFluent(_) => false,
        }
    }
}

fn bool01(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn singleton(v: f64) -> BTreeSet<FVal> {
    let mut s = BTreeSet::new();
    s.insert(FVal(v));
    s
}

fn map1(set: BTreeSet<FVal>, f: impl Fn(f64) -> f64) -> BTreeSet<FVal> {
    set.into_iter().map(|v| FVal(f(v.get()))).collect()
}

fn map2(a: BTreeSet<FVal>, b: BTreeSet<FVal>, f: impl Fn(f64, f64) -> f64) -> BTreeSet<FVal> {
    let mut out = BTreeSet::new();
    for x in &a {
        for y in &b {
            out.insert(FVal(f(x.get(), y.get())));
        }
    }
    out
}

fn fold_n(
    es: &[Rc<Expr>],
    state: &KleeneState,
    action: &ActionState,
    task: &Task,
    init: f64,
    f: impl Fn(f64, f64) -> f64 + Copy,
) -> BTreeSet<FVal> {
    let mut acc = singleton(init);
    for e in es {
        let next = e.evaluate_kleene(state, action, task);
        acc = map2(acc, next, f);
    }
    acc
}

fn simplify_compare(
    a: &Rc<Expr>,
    b: &Rc<Expr>,
    replacements: &Replacements,
    f: impl Fn(f64, f64) -> bool,
    ctor: impl Fn(Rc<Expr>, Rc<Expr>) -> Expr,
) -> Rc<Expr> {
    let a2 = a.simplify(replacements);
    let b2 = b.simplify(replacements);
    match (a2.as_const(), b2.as_const()) {
        (Some(x), Some(y)) => Expr::const_(bool01(f(x, y))),
        _ => Rc::new(ctor(a2, b2)),
    }
}

fn simplify_nary_arith(
    es: &[Rc<Expr>],
    replacements: &Replacements,
    init: f64,
    f: impl Fn(f64, f64) -> f64,
    ctor: impl Fn(Vec<Rc<Expr>>) -> Expr,
) -> Rc<Expr> {
    let simplified: Vec<Rc<Expr>> = es.iter().map(|e| e.simplify(replacements)).collect();
    simplify_nary_arith_from(simplified, init, f, ctor)
}

fn simplify_nary_arith_from(
    simplified: Vec<Rc<Expr>>,
    init: f64,
    f: impl Fn(f64, f64) -> f64,
    ctor: impl Fn(Vec<Rc<Expr>>) -> Expr,
) -> Rc<Expr> {
    let mut acc = init;
    let mut rest = Vec::new();
    for e in simplified {
        if let Some(v) = e.as_const() {
            acc = f(acc, v);
        } else {
            rest.push(e);
        }
    }
    if rest.is_empty() {
        Expr::const_(acc)
    } else if acc != init {
        rest.push(Expr::const_(acc));
        Rc::new(ctor(rest))
    } else if rest.len() == 1 {
        rest.pop().unwrap()
    } else {
        Rc::new(ctor(rest))
    }
}

fn simplify_conjunction(es: &[Rc<Expr>], replacements: &Replacements) -> Rc<Expr> {
    let mut out = Vec::new();
    for e in es {
        let e2 = e.simplify(replacements);
        match e2.as_const() {
            Some(v) if is_zero(v) => return Expr::const_(0.0),
            Some(_) => {}
            None => out.push(e2),
        }
    }
    match out.len() {
        0 => Expr::const_(1.0),
        1 => out.pop().unwrap(),
        _ => Rc::new(Expr::And(out)),
    }
}

fn simplify_disjunction(es: &[Rc<Expr>], replacements: &Replacements) -> Rc<Expr> {
    let mut out = Vec::new();
    for e in es {
        let e2 = e.simplify(replacements);
        match e2.as_const() {
            Some(v) if !is_zero(v) => return e2,
            Some(_) => {}
            None => out.push(e2),
        }
    }
    match out.len() {
        0 => Expr::const_(0.0),
        1 => out.pop().unwrap(),
        _ => Rc::new(Expr::Or(out)),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::StateFluent(id) => write!(f, "sf#{}", id.0),
            Expr::ActionFluent(id) => write!(f, "af#{}", id.0),
            Expr::Not(e) => write!(f, "!{e}"),
            Expr::And(es) => write!(f, "({})", es.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" & ")),
            Expr::Or(es) => write!(f, "({})", es.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" | ")),
            Expr::Eq(a, b) => write!(f, "({a} == {b})"),
            Expr::Ne(a, b) => write!(f, "({a} != {b})"),
            Expr::Lt(a, b) => write!(f, "({a} < {b})"),
            Expr::Le(a, b) => write!(f, "({a} <= {b})"),
            Expr::Gt(a, b) => write!(f, "({a} > {b})"),
            Expr::Ge(a, b) => write!(f, "({a} >= {b})"),
            Expr::Add(es) => write!(f, "({})", es.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" + ")),
            Expr::Mul(es) => write!(f, "({})", es.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" * ")),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::IfThenElse(c, t, e) => write!(f, "(if {c} then {t} else {e})"),
            Expr::Discrete(pairs) => {
                write!(f, "discrete(")?;
                for (v, p) in pairs {
                    write!(f, "{v}: {p}, ")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_deps() -> Dependencies {
        Dependencies::default()
    }

    #[test]
    fn conjunction_with_zero_collapses() {
        let e = Rc::new(Expr::And(vec![Expr::const_(1.0), Expr::const_(0.0), Rc::new(Expr::StateFluent(FluentId(0)))]));
        let s = e.simplify(&Replacements::new());
        assert_eq!(s.as_const(), Some(0.0));
    }

    #[test]
    fn disjunction_with_nonzero_collapses() {
        let e = Rc::new(Expr::Or(vec![Rc::new(Expr::StateFluent(FluentId(0))), Expr::const_(3.0)]));
        let s = e.simplify(&Replacements::new());
        assert_eq!(s.as_const(), Some(3.0));
    }

    #[test]
    fn arithmetic_over_constants_folds() {
        let e = Rc::new(Expr::Add(vec![Expr::const_(2.0), Expr::const_(3.0)]));
        let s = e.simplify(&Replacements::new());
        assert_eq!(s.as_const(), Some(5.0));
    }

    #[test]
    fn substitution_replaces_fluent_with_constant() {
        let id = FluentId(7);
        let e = Rc::new(Expr::Not(Rc::new(Expr::StateFluent(id))));
        let mut repl = Replacements::new();
        repl.insert(id, Expr::const_(0.0));
        let s = e.simplify(&repl);
        assert_eq!(s.as_const(), Some(1.0));
    }

    #[test]
    fn trivially_forbids_action_fluent_detects_negated_ref() {
        let id = FluentId(2);
        let e = Expr::Not(Rc::new(Expr::ActionFluent(id)));
        assert_eq!(e.trivially_forbids_action_fluent(), Some(id));
        let not_it = Expr::ActionFluent(id);
        assert_eq!(not_it.trivially_forbids_action_fluent(), None);
    }

    #[test]
    fn collect_dependencies_distinguishes_polarity() {
        let a = FluentId(1);
        let e = Expr::Not(Rc::new(Expr::ActionFluent(a)));
        let mut deps = empty_deps();
        e.collect_dependencies(&mut deps, true);
        assert!(deps.negative_action.contains(&a));
        assert!(!deps.positive_action.contains(&a));
    }

    #[test]
    fn evaluate_pd_on_discrete_builds_declared_support() {
        let task = Task::new("t");
        let state = State::from_values(vec![]);
        let action = ActionState::new(vec![]);
        let e = Expr::Discrete(vec![(Expr::const_(0.0), Expr::const_(0.25)), (Expr::const_(1.0), Expr::const_(0.75))]);
        let pd = e.evaluate_pd(&state, &action, &task);
        assert_eq!(pd.support(), &[(0.0, 0.25), (1.0, 0.75)]);
    }

    #[test]
    fn evaluate_pd_on_non_discrete_is_a_point_mass() {
        let task = Task::new("t");
        let state = State::from_values(vec![]);
        let action = ActionState::new(vec![]);
        let e = Rc::new(Expr::Add(vec![Expr::const_(2.0), Expr::const_(3.0)]));
        let pd = e.evaluate_pd(&state, &action, &task);
        assert_eq!(pd.deterministic_value(), Some(5.0));
    }
}
