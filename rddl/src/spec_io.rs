//! The external-input boundary: a serde-deserializable intermediate
//! representation standing in for "a parsed task object delivered by an
//! external parser" (spec §6, Input), plus the builder that lowers it into
//! a fresh, unsimplified `Task`.
//!
//! Everything below this boundary (`Expr`, `Task`, `Evaluable`, ...) is
//! expressed in the crate's own types and never `serde`-derived, mirroring
//! the teacher's separation of a thin parsing layer from its core
//! chronicle/evaluable types.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::evaluable::{Cpf, RewardCpf};
use crate::expr::Expr;
use crate::fluent::{ActionFluent, Domain, FluentId, StateFluent};
use crate::task::Task;

/// A state fluent declaration: name, domain (enumerated values, in the
/// order `Domain` expects), and initial value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFluentDecl {
    pub name: String,
    pub domain: Vec<f64>,
    pub initial_value: f64,
}

/// An action fluent declaration: name and domain. `{0.0, 1.0}` is treated
/// as binary; anything else is a plain finite-domain fluent (FDR-merged
/// fluents are produced internally by the simplifier, never declared
/// directly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFluentDecl {
    pub name: String,
    pub domain: Vec<f64>,
}

/// A CPF declaration: the head state fluent's name plus its defining
/// formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpfDecl {
    pub head: String,
    pub formula: ExprSpec,
}

/// The serialized form of `Expr` (spec §4.1), referencing fluents by name
/// rather than by `FluentId` since the boundary format has no concept of
/// the crate's internal identity scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ExprSpec {
    Const { value: f64 },
    Fluent { name: String },
    Not { arg: Box<ExprSpec> },
    And { args: Vec<ExprSpec> },
    Or { args: Vec<ExprSpec> },
    Eq { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Ne { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Lt { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Le { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Gt { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Ge { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Add { args: Vec<ExprSpec> },
    Mul { args: Vec<ExprSpec> },
    Sub { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    Div { lhs: Box<ExprSpec>, rhs: Box<ExprSpec> },
    IfThenElse { cond: Box<ExprSpec>, then_branch: Box<ExprSpec>, else_branch: Box<ExprSpec> },
    Discrete { outcomes: Vec<(ExprSpec, ExprSpec)> },
}

/// The top-level boundary object: everything an external parser would
/// hand the compiler for a single planning task (spec §6, Input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub horizon: u32,
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f64,
    pub state_fluents: Vec<StateFluentDecl>,
    pub action_fluents: Vec<ActionFluentDecl>,
    pub cpfs: Vec<CpfDecl>,
    pub reward: ExprSpec,
    pub sacs: Vec<ExprSpec>,
}

fn default_discount_factor() -> f64 {
    1.0
}

/// Name -> id lookup built while fluents are declared, consulted while
/// resolving every `ExprSpec::Fluent` reference in the task.
struct FluentNames {
    state: HashMap<String, FluentId>,
    action: HashMap<String, FluentId>,
}

impl FluentNames {
    fn resolve(&self, name: &str) -> Result<Expr> {
        if let Some(&id) = self.state.get(name) {
            Ok(Expr::StateFluent(id))
        } else if let Some(&id) = self.action.get(name) {
            Ok(Expr::ActionFluent(id))
        } else {
            Err(CompileError::Structural(format!("reference to undeclared fluent '{name}'")))
        }
    }
}

fn lower_expr(spec: &ExprSpec, names: &FluentNames) -> Result<Rc<Expr>> {
    let lower_many = |args: &[ExprSpec]| -> Result<Vec<Rc<Expr>>> { args.iter().map(|a| lower_expr(a, names)).collect() };
    Ok(match spec {
        ExprSpec::Const { value } => Expr::const_(*value),
        ExprSpec::Fluent { name } => Rc::new(names.resolve(name)?),
        ExprSpec::Not { arg } => Rc::new(Expr::Not(lower_expr(arg, names)?)),
        ExprSpec::And { args } => Rc::new(Expr::And(lower_many(args)?)),
        ExprSpec::Or { args } => Rc::new(Expr::Or(lower_many(args)?)),
        ExprSpec::Eq { lhs, rhs } => Rc::new(Expr::Eq(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Ne { lhs, rhs } => Rc::new(Expr::Ne(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Lt { lhs, rhs } => Rc::new(Expr::Lt(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Le { lhs, rhs } => Rc::new(Expr::Le(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Gt { lhs, rhs } => Rc::new(Expr::Gt(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Ge { lhs, rhs } => Rc::new(Expr::Ge(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Add { args } => Rc::new(Expr::Add(lower_many(args)?)),
        ExprSpec::Mul { args } => Rc::new(Expr::Mul(lower_many(args)?)),
        ExprSpec::Sub { lhs, rhs } => Rc::new(Expr::Sub(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::Div { lhs, rhs } => Rc::new(Expr::Div(lower_expr(lhs, names)?, lower_expr(rhs, names)?)),
        ExprSpec::IfThenElse { cond, then_branch, else_branch } => {
            Rc::new(Expr::IfThenElse(lower_expr(cond, names)?, lower_expr(then_branch, names)?, lower_expr(else_branch, names)?))
        }
        ExprSpec::Discrete { outcomes } => {
            let pairs = outcomes.iter().map(|(v, p)| Ok((lower_expr(v, names)?, lower_expr(p, names)?))).collect::<Result<Vec<_>>>()?;
            Rc::new(Expr::Discrete(pairs))
        }
    })
}

/// Lowers a `TaskSpec` into a fresh, unsimplified `Task`: fluents
/// registered in declaration order, every formula resolved against their
/// names, every `Evaluable` dependency-initialized (spec §4.2
/// `initialize`) but with no hash keys, caches, or legal actions yet --
/// those are the simplifier's and `Task::finalize_hash_keys`'s job.
pub fn build_task(spec: &TaskSpec) -> Result<Task> {
    let mut task = Task::new(spec.name.clone());
    task.horizon = spec.horizon as usize;
    task.discount_factor = spec.discount_factor;

    let mut names = FluentNames {
        state: HashMap::new(),
        action: HashMap::new(),
    };

    for decl in &spec.state_fluents {
        let domain = Domain::new(decl.domain.clone());
        let id = task.add_state_fluent(StateFluent::new(FluentId(names.state.len() as u32), decl.name.as_str(), domain, decl.initial_value));
        names.state.insert(decl.name.clone(), id);
    }
    for decl in &spec.action_fluents {
        // Action fluent ids and state fluent ids are drawn from the same
        // counter space but never compared across the `Expr::StateFluent`/
        // `Expr::ActionFluent` tag, so collisions between the two are
        // harmless; `FluentId` only needs to be unique within its own kind.
        let domain = Domain::new(decl.domain.clone());
        let mut fluent = ActionFluent::binary(FluentId(names.action.len() as u32), decl.name.as_str());
        fluent.domain = domain;
        let id = task.add_action_fluent(fluent);
        names.action.insert(decl.name.clone(), id);
    }

    for decl in &spec.cpfs {
        let head = *names
            .state
            .get(&decl.head)
            .ok_or_else(|| CompileError::Structural(format!("CPF head '{}' is not a declared state fluent", decl.head)))?;
        let formula = lower_expr(&decl.formula, &names)?;
        let mut cpf = Cpf::new(head, decl.head.as_str(), formula);
        cpf.eval.initialize();
        task.cpfs.push(cpf);
    }

    let reward_formula = lower_expr(&spec.reward, &names)?;
    let mut reward_cpf = RewardCpf::new(reward_formula);
    reward_cpf.eval.initialize();
    task.reward_cpf = reward_cpf;

    for sac in &spec.sacs {
        task.sacs.push(lower_expr(sac, &names)?);
    }

    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_spec() -> TaskSpec {
        TaskSpec {
            name: "toy".into(),
            horizon: 10,
            discount_factor: 1.0,
            state_fluents: vec![StateFluentDecl {
                name: "on".into(),
                domain: vec![0.0, 1.0],
                initial_value: 0.0,
            }],
            action_fluents: vec![ActionFluentDecl {
                name: "flip".into(),
                domain: vec![0.0, 1.0],
            }],
            cpfs: vec![CpfDecl {
                head: "on".into(),
                formula: ExprSpec::Ne {
                    lhs: Box::new(ExprSpec::Fluent { name: "on".into() }),
                    rhs: Box::new(ExprSpec::Fluent { name: "flip".into() }),
                },
            }],
            reward: ExprSpec::Fluent { name: "on".into() },
            sacs: vec![ExprSpec::Not { arg: Box::new(ExprSpec::Fluent { name: "flip".into() }) }],
        }
    }

    #[test]
    fn builds_task_with_resolved_references() {
        let task = build_task(&toy_spec()).expect("builds");
        assert_eq!(task.state_fluents().len(), 1);
        assert_eq!(task.action_fluents().len(), 1);
        assert_eq!(task.cpfs.len(), 1);
        assert_eq!(task.sacs.len(), 1);
        assert!(task.cpfs[0].eval.contains_state_fluent());
    }

    #[test]
    fn undeclared_fluent_reference_is_structural_error() {
        let mut spec = toy_spec();
        spec.reward = ExprSpec::Fluent { name: "missing".into() };
        let err = build_task(&spec).unwrap_err();
        assert!(matches!(err, CompileError::Structural(_)));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let spec = toy_spec();
        let text = serde_json::to_string(&spec).expect("serialize");
        let back: TaskSpec = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back.state_fluents.len(), spec.state_fluents.len());
    }
}
