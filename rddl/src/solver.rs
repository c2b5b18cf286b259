//! The CSP/SMT solver bridge (C5): a small oracle API (spec §4.5) that the
//! simplifier uses for mutex detection, legal-action enumeration and
//! relevant-SAC attachment. The crate ships one concrete implementor,
//! `BacktrackingSolver`, a self-contained depth-first search over the
//! (small, bounded-integer) action and state variables it is told about —
//! a full external SMT/CSP solver is explicitly out of scope (spec.md §1
//! treats the oracle as a small, replaceable API, not a product to vendor).

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{CompileError, Result};
use crate::expr::Expr;
use crate::fluent::FluentId;

fn is_zero(v: f64) -> bool {
    v.abs() < 1e-9
}

fn bool01(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// A variable the solver knows how to assign: a fluent projected at a
/// particular translation `step` (spec §4.5: "step=0 current state
/// variables; step=1 next-step variables").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Var {
    id: FluentId,
    step: u8,
}

/// The oracle API the simplifier drives (spec §4.5). Method names are
/// `snake_case` translations of the spec's camelCase ones; semantics are
/// unchanged.
pub trait Solver {
    fn declare_state_variable(&mut self, id: FluentId, domain_size: usize);
    fn declare_action_variable(&mut self, id: FluentId, domain_size: usize);

    /// Opens a new scoped constraint context.
    fn push(&mut self);
    /// Discards every constraint and blocking clause added since the
    /// matching `push`.
    fn pop(&mut self);

    /// Posts `expr` (evaluated at `step`) as a constraint that must hold
    /// (be non-zero) in any solution.
    fn add_constraint(&mut self, expr: Rc<Expr>, step: u8);
    /// Posts every formula in `preconditions` as a conjoined constraint at
    /// `step` (spec §4.5 `addPreconditions`).
    fn add_preconditions(&mut self, preconditions: &[Rc<Expr>], step: u8);

    /// Fixes a (possibly partial) tuple of action variables to concrete
    /// values for the scope of subsequent `has_solution` calls.
    fn assign_action_variables(&mut self, fixed: &[(FluentId, i64)]);

    /// Searches for an assignment to every variable referenced by an
    /// active constraint that satisfies all of them. `Ok(false)` means
    /// proven unsatisfiable; `Err` means the search could not decide
    /// (spec §4.6 "Solver returns unknown => fatal abort").
    fn has_solution(&mut self) -> Result<bool>;
    /// The action-variable assignment from the most recent satisfying
    /// model (spec §4.5 `getActionModel`).
    fn get_action_model(&self) -> Vec<(FluentId, i64)>;
    /// Forbids the just-returned action assignment so the next
    /// `has_solution` call (if any) must find a different one.
    fn invalidate_action_model(&mut self);
}

struct Scope {
    constraints: Vec<(Rc<Expr>, u8)>,
    blocked: Vec<Vec<(FluentId, i64)>>,
}

/// A depth-first backtracking search over declared finite-domain
/// variables, checking each posted constraint as soon as every variable it
/// references is bound (spec §4.5; see SPEC_FULL.md §4 C5 note).
pub struct BacktrackingSolver {
    state_vars: Vec<(FluentId, usize)>,
    action_vars: Vec<(FluentId, usize)>,
    scopes: Vec<Scope>,
    last_model: Option<HashMap<Var, i64>>,
}

impl Default for BacktrackingSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl BacktrackingSolver {
    pub fn new() -> Self {
        BacktrackingSolver {
            state_vars: Vec::new(),
            action_vars: Vec::new(),
            scopes: vec![Scope {
                constraints: Vec::new(),
                blocked: Vec::new(),
            }],
            last_model: None,
        }
    }

    fn domain_size(&self, id: FluentId) -> Option<usize> {
        self.state_vars
            .iter()
            .chain(self.action_vars.iter())
            .find(|(fid, _)| *fid == id)
            .map(|(_, d)| *d)
    }

    fn is_action_var(&self, id: FluentId) -> bool {
        self.action_vars.iter().any(|(fid, _)| *fid == id)
    }

    /// Every declared action variable (always searched, since the caller
    /// needs a full action tuple out of `get_action_model` regardless of
    /// whether any constraint mentions it) plus every state-fluent
    /// `(fluent, step)` pair referenced by an active constraint.
    fn referenced_vars(&self) -> Vec<Var> {
        let mut vars = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (id, _) in &self.action_vars {
            let v = Var { id: *id, step: 0 };
            if seen.insert(v) {
                vars.push(v);
            }
        }
        for scope in &self.scopes {
            for (expr, step) in &scope.constraints {
                collect_vars(expr, *step, &mut vars, &mut seen);
            }
        }
        vars
    }

    fn flat_constraints(&self) -> Vec<(Rc<Expr>, u8)> {
        self.scopes.iter().flat_map(|s| s.constraints.iter().cloned()).collect()
    }

    fn blocked_action_tuples(&self) -> Vec<Vec<(FluentId, i64)>> {
        self.scopes.iter().flat_map(|s| s.blocked.iter().cloned()).collect()
    }
}

impl Solver for BacktrackingSolver {
    fn declare_state_variable(&mut self, id: FluentId, domain_size: usize) {
        self.state_vars.push((id, domain_size));
    }

    fn declare_action_variable(&mut self, id: FluentId, domain_size: usize) {
        self.action_vars.push((id, domain_size));
    }

    fn push(&mut self) {
        self.scopes.push(Scope {
            constraints: Vec::new(),
            blocked: Vec::new(),
        });
    }

    fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn add_constraint(&mut self, expr: Rc<Expr>, step: u8) {
        self.scopes.last_mut().expect("solver always has a base scope").constraints.push((expr, step));
    }

    fn add_preconditions(&mut self, preconditions: &[Rc<Expr>], step: u8) {
        for p in preconditions {
            self.add_constraint(p.clone(), step);
        }
    }

    fn assign_action_variables(&mut self, fixed: &[(FluentId, i64)]) {
        for &(id, value) in fixed {
            self.add_constraint(Rc::new(Expr::Eq(Rc::new(Expr::ActionFluent(id)), Expr::const_(value as f64))), 0);
        }
    }

    fn has_solution(&mut self) -> Result<bool> {
        let vars = self.referenced_vars();
        let constraints = self.flat_constraints();
        let blocked = self.blocked_action_tuples();
        for v in &vars {
            if self.domain_size(v.id).is_none() {
                return Err(CompileError::Solver(format!(
                    "constraint references undeclared fluent {:?}",
                    v.id
                )));
            }
        }
        let mut assignment = HashMap::new();
        let found = search(&vars, 0, &mut assignment, &constraints, self, &blocked);
        self.last_model = if found { Some(assignment) } else { None };
        Ok(found)
    }

    fn get_action_model(&self) -> Vec<(FluentId, i64)> {
        let Some(model) = &self.last_model else {
            return Vec::new();
        };
        self.action_vars
            .iter()
            .filter_map(|(id, _)| model.get(&Var { id: *id, step: 0 }).map(|v| (*id, *v)))
            .collect()
    }

    fn invalidate_action_model(&mut self) {
        let tuple = self.get_action_model();
        if tuple.is_empty() {
            return;
        }
        self.scopes.last_mut().expect("solver always has a base scope").blocked.push(tuple);
    }
}

fn search(vars: &[Var], depth: usize, assignment: &mut HashMap<Var, i64>, constraints: &[(Rc<Expr>, u8)], solver: &BacktrackingSolver, blocked: &[Vec<(FluentId, i64)>]) -> bool {
    if depth == vars.len() {
        if is_action_tuple_blocked(assignment, solver, blocked) {
            return false;
        }
        return constraints.iter().all(|(expr, step)| !is_zero(eval_under(expr, assignment, *step)));
    }
    let v = vars[depth];
    let domain_size = solver.domain_size(v.id).unwrap_or(0);
    for value in 0..domain_size as i64 {
        assignment.insert(v, value);
        if constraints_consistent_so_far(constraints, assignment) && search(vars, depth + 1, assignment, constraints, solver, blocked) {
            return true;
        }
        assignment.remove(&v);
    }
    false
}

fn is_action_tuple_blocked(assignment: &HashMap<Var, i64>, solver: &BacktrackingSolver, blocked: &[Vec<(FluentId, i64)>]) -> bool {
    let current: Vec<(FluentId, i64)> = solver
        .action_vars
        .iter()
        .filter_map(|(id, _)| assignment.get(&Var { id: *id, step: 0 }).map(|v| (*id, *v)))
        .collect();
    blocked.iter().any(|b| b.iter().all(|(id, v)| current.iter().any(|(cid, cv)| cid == id && cv == v)))
}

/// A constraint is checked only once every variable it references has
/// been bound, giving the search real pruning (a partial assignment that
/// already falsifies a fully-bound constraint is abandoned immediately).
fn constraints_consistent_so_far(constraints: &[(Rc<Expr>, u8)], assignment: &HashMap<Var, i64>) -> bool {
    constraints.iter().all(|(expr, step)| {
        let mut vars = Vec::new();
        let mut seen = std::collections::HashSet::new();
        collect_vars(expr, *step, &mut vars, &mut seen);
        if vars.iter().all(|v| assignment.contains_key(v)) {
            !is_zero(eval_under(expr, assignment, *step))
        } else {
            true
        }
    })
}

fn collect_vars(expr: &Expr, step: u8, out: &mut Vec<Var>, seen: &mut std::collections::HashSet<Var>) {
    let mut push = |v: Var, out: &mut Vec<Var>, seen: &mut std::collections::HashSet<Var>| {
        if seen.insert(v) {
            out.push(v);
        }
    };
    match expr {
        Expr::Const(_) => {}
        Expr::StateFluent(id) => push(Var { id: *id, step }, out, seen),
        Expr::ActionFluent(id) => push(Var { id: *id, step: 0 }, out, seen),
        Expr::Not(e) => collect_vars(e, step, out, seen),
        Expr::And(es) | Expr::Or(es) | Expr::Add(es) | Expr::Mul(es) => {
            for e in es {
                collect_vars(e, step, out, seen);
            }
        }
        Expr::Eq(a, b) | Expr::Ne(a, b) | Expr::Lt(a, b) | Expr::Le(a, b) | Expr::Gt(a, b) | Expr::Ge(a, b) | Expr::Sub(a, b) | Expr::Div(a, b) => {
            collect_vars(a, step, out, seen);
            collect_vars(b, step, out, seen);
        }
        Expr::IfThenElse(c, t, e) => {
            collect_vars(c, step, out, seen);
            collect_vars(t, step, out, seen);
            collect_vars(e, step, out, seen);
        }
        Expr::Discrete(pairs) => {
            for (v, p) in pairs {
                collect_vars(v, step, out, seen);
                collect_vars(p, step, out, seen);
            }
        }
    }
}

/// Evaluates `expr` under a complete variable assignment, mirroring
/// `Expr::evaluate`'s semantics but reading values out of a raw
/// `(fluent, step)` map rather than a `State`/`Task` pair, since the
/// solver's constraint variables exist independently of any particular
/// `Task`'s current fluent indexing (spec §4.5 "structural recursion").
fn eval_under(expr: &Expr, assignment: &HashMap<Var, i64>, step: u8) -> f64 {
    match expr {
        Expr::Const(v) => *v,
        Expr::StateFluent(id) => *assignment.get(&Var { id: *id, step }).expect("unbound state variable") as f64,
        Expr::ActionFluent(id) => *assignment.get(&Var { id: *id, step: 0 }).expect("unbound action variable") as f64,
        Expr::Not(e) => bool01(is_zero(eval_under(e, assignment, step))),
        Expr::And(es) => bool01(es.iter().all(|e| !is_zero(eval_under(e, assignment, step)))),
        Expr::Or(es) => bool01(es.iter().any(|e| !is_zero(eval_under(e, assignment, step)))),
        Expr::Eq(a, b) => bool01(eval_under(a, assignment, step) == eval_under(b, assignment, step)),
        Expr::Ne(a, b) => bool01(eval_under(a, assignment, step) != eval_under(b, assignment, step)),
        Expr::Lt(a, b) => bool01(eval_under(a, assignment, step) < eval_under(b, assignment, step)),
        Expr::Le(a, b) => bool01(eval_under(a, assignment, step) <= eval_under(b, assignment, step)),
        Expr::Gt(a, b) => bool01(eval_under(a, assignment, step) > eval_under(b, assignment, step)),
        Expr::Ge(a, b) => bool01(eval_under(a, assignment, step) >= eval_under(b, assignment, step)),
        Expr::Add(es) => es.iter().map(|e| eval_under(e, assignment, step)).sum(),
        Expr::Mul(es) => es.iter().map(|e| eval_under(e, assignment, step)).product(),
        Expr::Sub(a, b) => eval_under(a, assignment, step) - eval_under(b, assignment, step),
        Expr::Div(a, b) => eval_under(a, assignment, step) / eval_under(b, assignment, step),
        Expr::IfThenElse(c, t, e) => {
            if !is_zero(eval_under(c, assignment, step)) {
                eval_under(t, assignment, step)
            } else {
                eval_under(e, assignment, step)
            }
        }
        Expr::Discrete(_) => panic!("a probabilistic expression cannot be posted as a solver constraint"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_satisfying_action_assignment() {
        let mut s = BacktrackingSolver::new();
        let a = FluentId(0);
        let b = FluentId(1);
        s.declare_action_variable(a, 2);
        s.declare_action_variable(b, 2);
        // a != b
        s.add_constraint(Rc::new(Expr::Ne(Rc::new(Expr::ActionFluent(a)), Rc::new(Expr::ActionFluent(b)))), 0);
        assert!(s.has_solution().unwrap());
        let model = s.get_action_model();
        let av = model.iter().find(|(id, _)| *id == a).unwrap().1;
        let bv = model.iter().find(|(id, _)| *id == b).unwrap().1;
        assert_ne!(av, bv);
    }

    #[test]
    fn mutex_pair_is_unsatisfiable() {
        let mut s = BacktrackingSolver::new();
        let a = FluentId(0);
        let b = FluentId(1);
        s.declare_action_variable(a, 2);
        s.declare_action_variable(b, 2);
        s.add_constraint(
            Rc::new(Expr::Not(Rc::new(Expr::And(vec![Rc::new(Expr::ActionFluent(a)), Rc::new(Expr::ActionFluent(b))])))),
            0,
        );
        s.push();
        s.assign_action_variables(&[(a, 1), (b, 1)]);
        assert!(!s.has_solution().unwrap());
        s.pop();
        s.push();
        s.assign_action_variables(&[(a, 1), (b, 0)]);
        assert!(s.has_solution().unwrap());
        s.pop();
    }

    #[test]
    fn invalidate_action_model_forces_a_different_one() {
        let mut s = BacktrackingSolver::new();
        let a = FluentId(0);
        s.declare_action_variable(a, 2);
        assert!(s.has_solution().unwrap());
        let first = s.get_action_model();
        s.invalidate_action_model();
        assert!(s.has_solution().unwrap());
        let second = s.get_action_model();
        assert_ne!(first, second);
        s.invalidate_action_model();
        // both values of `a` are now blocked
        assert!(!s.has_solution().unwrap());
    }
}
