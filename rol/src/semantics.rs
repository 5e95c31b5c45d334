// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Evaluation of rol formulas against a per-run context.
//!
//! A [`Context`] carries the concrete domain value sets and the predicate and
//! function implementations for one verification run. It is built once by the
//! mapping layer, is read-only during evaluation, and can be shared freely
//! across worker threads.

use crate::syntax::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Element ids are the integer identity of every road-network entity.
pub type ElementId = u64;

/// A 2D point, the vertex type of all polylines.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// East coordinate in meters
    pub x: f64,
    /// North coordinate in meters
    pub y: f64,
}

impl Vertex {
    /// Construct a vertex from coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another vertex.
    pub fn distance(&self, other: &Vertex) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A value of the logic domain. Terms evaluate to values; predicates consume
/// them. Polylines and id sets are reference-counted because accessor
/// functions hand out the same underlying data many times per run.
#[derive(Clone, Debug)]
pub enum Value {
    /// A truth value
    Bool(bool),
    /// An integer
    Int(i64),
    /// A floating-point number
    Float(f64),
    /// A string, e.g. an adjacency kind like `'parallel'`
    Str(String),
    /// A road-network entity, represented by its id
    Entity(ElementId),
    /// A single 2D point
    Vertex(Vertex),
    /// An ordered vertex chain
    Polyline(Arc<Vec<Vertex>>),
    /// A set of entity ids, e.g. the result of `successors(l)`
    Entities(Arc<Vec<ElementId>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => *a as f64 == *b,
            (Str(a), Str(b)) => a == b,
            (Entity(a), Entity(b)) => a == b,
            (Vertex(a), Vertex(b)) => a == b,
            (Polyline(a), Polyline(b)) => a == b,
            (Entities(a), Entities(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Interpret this value as an entity id.
    pub fn as_entity(&self) -> ElementId {
        match self {
            Value::Entity(id) => *id,
            _ => panic!("tried to use {self} as an entity"),
        }
    }

    /// Total order between values of comparable kinds: integers, floats (with
    /// numeric promotion) and entities. Formulas never order other kinds.
    fn order(&self, other: &Self) -> Ordering {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Entity(a), Entity(b)) => a.cmp(b),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                let a = self.as_f64();
                let b = other.as_f64();
                a.partial_cmp(&b)
                    .unwrap_or_else(|| panic!("tried to order {self} against {other}"))
            }
            _ => panic!("tried to order {self} against {other}"),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(x) => *x,
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Entity(id) => write!(f, "#{id}"),
            Value::Vertex(v) => write!(f, "{v}"),
            Value::Polyline(p) => write!(f, "polyline[{}]", p.len()),
            Value::Entities(ids) => write!(f, "{{{}}}", itertools::join(ids.iter(), ", ")),
        }
    }
}

/// An assignment maps variable names to values during evaluation. The
/// persistent map makes extending an assignment per quantifier combination
/// cheap.
pub type Assignment = im::HashMap<String, Value>;

/// A predicate implementation registered in a context.
pub type PredicateFn = Box<dyn Fn(&[Value]) -> bool + Send + Sync>;
/// A function implementation registered in a context.
pub type FunctionFn = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// A predicate, function or domain name appearing in a formula that has no
/// registered implementation. Raised when a formula is bound to a context,
/// before any evaluation happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no implementation registered for name `{name}`")]
pub struct UnboundName {
    /// The unresolvable name
    pub name: String,
}

/// The per-run bundle of domain values and predicate/function
/// implementations. Read-only during evaluation.
#[derive(Default)]
pub struct Context {
    domains: BTreeMap<String, Vec<Value>>,
    predicates: BTreeMap<String, PredicateFn>,
    functions: BTreeMap<String, FunctionFn>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named domain. Values are sorted (by id for entity domains)
    /// and deduplicated so that enumeration order is deterministic.
    pub fn add_domain(&mut self, name: &str, mut values: Vec<Value>) {
        values.sort_by(|a, b| a.order(b));
        values.dedup();
        self.domains.insert(name.to_string(), values);
    }

    /// Register a predicate implementation.
    pub fn add_predicate(
        &mut self,
        name: &str,
        f: impl Fn(&[Value]) -> bool + Send + Sync + 'static,
    ) {
        self.predicates.insert(name.to_string(), Box::new(f));
    }

    /// Register a function implementation.
    pub fn add_function(
        &mut self,
        name: &str,
        f: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) {
        self.functions.insert(name.to_string(), Box::new(f));
    }

    /// The values of a named domain.
    pub fn domain(&self, name: &str) -> Option<&Vec<Value>> {
        self.domains.get(name)
    }

    /// Bind a formula to this context: check that every predicate, function
    /// and fixed-domain name it mentions has a registered implementation.
    /// This runs once per formula, never per combination, and an unresolvable
    /// name is a fatal configuration error rather than a deferred evaluation
    /// failure.
    pub fn check_formula(&self, f: &Formula) -> Result<(), UnboundName> {
        for binder in &f.free {
            self.check_domain(&binder.domain)?;
        }
        self.check_expr(&f.body)
    }

    fn check_domain(&self, d: &Domain) -> Result<(), UnboundName> {
        match d {
            Domain::Fixed(name) => {
                if self.domains.contains_key(name) {
                    Ok(())
                } else {
                    Err(UnboundName { name: name.clone() })
                }
            }
            Domain::Dynamic(e) => self.check_expr(e),
        }
    }

    fn check_expr(&self, e: &Expr) -> Result<(), UnboundName> {
        match e {
            Expr::Literal(_) | Expr::Const(_) | Expr::Var(_) => Ok(()),
            Expr::Pred(name, args) => {
                if !self.predicates.contains_key(name) {
                    return Err(UnboundName { name: name.clone() });
                }
                args.iter().try_for_each(|a| self.check_expr(a))
            }
            Expr::Func(name, args) => {
                if !self.functions.contains_key(name) {
                    return Err(UnboundName { name: name.clone() });
                }
                args.iter().try_for_each(|a| self.check_expr(a))
            }
            Expr::Not(x) => self.check_expr(x),
            Expr::BinOp(_, lhs, rhs) | Expr::Comparison(_, lhs, rhs) => {
                self.check_expr(lhs)?;
                self.check_expr(rhs)
            }
            Expr::NAryOp(_, args) => args.iter().try_for_each(|a| self.check_expr(a)),
            Expr::Quantified { binders, body, .. } | Expr::Count { binders, body, .. } => {
                for binder in binders {
                    self.check_domain(&binder.domain)?;
                }
                self.check_expr(body)
            }
        }
    }

    /// Evaluate a boolean expression under the given assignment. Variable
    /// bindings reach every node of the subtree, including function terms
    /// nested inside dynamic domains.
    pub fn eval_bool(&self, e: &Expr, assignment: &Assignment) -> bool {
        match e {
            Expr::Literal(b) => *b,
            Expr::Pred(name, args) => {
                let args: Vec<Value> = args.iter().map(|a| self.eval_term(a, assignment)).collect();
                let f = self
                    .predicates
                    .get(name)
                    .unwrap_or_else(|| panic!("predicate {name} was not bound"));
                f(&args)
            }
            Expr::Not(x) => !self.eval_bool(x, assignment),
            Expr::BinOp(BinOp::Implies, lhs, rhs) => {
                !self.eval_bool(lhs, assignment) || self.eval_bool(rhs, assignment)
            }
            Expr::BinOp(BinOp::Iff, lhs, rhs) => {
                self.eval_bool(lhs, assignment) == self.eval_bool(rhs, assignment)
            }
            Expr::NAryOp(NOp::And, args) => args.iter().all(|a| self.eval_bool(a, assignment)),
            Expr::NAryOp(NOp::Or, args) => args.iter().any(|a| self.eval_bool(a, assignment)),
            Expr::NAryOp(NOp::Xor, args) => args
                .iter()
                .fold(false, |acc, a| acc ^ self.eval_bool(a, assignment)),
            Expr::Comparison(cmp, lhs, rhs) => {
                let lhs = self.eval_term(lhs, assignment);
                let rhs = self.eval_term(rhs, assignment);
                match cmp {
                    CmpOp::Eq => lhs == rhs,
                    CmpOp::NotEq => lhs != rhs,
                    _ => cmp.eval(lhs.order(&rhs)),
                }
            }
            Expr::Quantified {
                quantifier,
                binders,
                body,
            } => {
                let mut iter = DomainProduct::new(self, binders, assignment);
                match quantifier {
                    // short-circuits on the first failing combination
                    Quantifier::Forall => iter.all(|a| self.eval_bool(body, &a)),
                    // short-circuits on the first satisfying combination
                    Quantifier::Exists => iter.any(|a| self.eval_bool(body, &a)),
                }
            }
            Expr::Count {
                cmp,
                threshold,
                binders,
                body,
            } => self.eval_count(*cmp, *threshold, binders, body, assignment),
            Expr::Const(_) | Expr::Var(_) | Expr::Func(_, _) => {
                panic!("tried to evaluate term {e} as a formula")
            }
        }
    }

    /// Count satisfying combinations, aborting as soon as the outcome of the
    /// comparison can no longer change.
    fn eval_count(
        &self,
        cmp: CmpOp,
        k: usize,
        binders: &[Binder],
        body: &Expr,
        assignment: &Assignment,
    ) -> bool {
        let mut count: usize = 0;
        for a in DomainProduct::new(self, binders, assignment) {
            if self.eval_bool(body, &a) {
                count += 1;
                match cmp {
                    CmpOp::Leq | CmpOp::Eq if count > k => return false,
                    CmpOp::NotEq if count > k => return true,
                    CmpOp::Geq if count >= k => return true,
                    CmpOp::Gt if count > k => return true,
                    CmpOp::Lt if count >= k => return false,
                    _ => (),
                }
            }
        }
        cmp.eval(count.cmp(&k))
    }

    /// Evaluate a term to a value under the given assignment.
    pub fn eval_term(&self, e: &Expr, assignment: &Assignment) -> Value {
        match e {
            Expr::Const(Constant::Int(i)) => Value::Int(*i),
            Expr::Const(Constant::Float(x)) => Value::Float(*x),
            Expr::Const(Constant::Str(s)) => Value::Str(s.clone()),
            Expr::Var(name) => assignment
                .get(name)
                .unwrap_or_else(|| panic!("variable {name} is not bound"))
                .clone(),
            Expr::Func(name, args) => {
                let args: Vec<Value> = args.iter().map(|a| self.eval_term(a, assignment)).collect();
                let f = self
                    .functions
                    .get(name)
                    .unwrap_or_else(|| panic!("function {name} was not bound"));
                f(&args)
            }
            _ => panic!("tried to evaluate formula {e} as a term"),
        }
    }

    /// Evaluate the values a domain currently denotes, in sorted order.
    fn domain_values(&self, d: &Domain, assignment: &Assignment) -> Vec<Value> {
        match d {
            Domain::Fixed(name) => self
                .domains
                .get(name)
                .unwrap_or_else(|| panic!("domain {name} was not bound"))
                .clone(),
            Domain::Dynamic(e) => match self.eval_term(e, assignment) {
                Value::Entities(ids) => {
                    let mut ids = ids.to_vec();
                    ids.sort_unstable();
                    ids.dedup();
                    ids.into_iter().map(Value::Entity).collect()
                }
                other => panic!("domain term {e} evaluated to {other} instead of an id set"),
            },
        }
    }
}

struct Level {
    values: Vec<Value>,
    idx: usize,
}

/// Lazily enumerates the Cartesian product of nested variable/domain pairs,
/// yielding one extended assignment per combination. Dynamic domains are
/// recomputed whenever an outer variable advances, so their contents may
/// depend on variables bound further out. Enumeration order is sorted at
/// every level, which makes whole-run results deterministic.
pub struct DomainProduct<'a> {
    ctx: &'a Context,
    base: Assignment,
    vars: Vec<(String, Domain)>,
    levels: Vec<Level>,
    started: bool,
    done: bool,
}

impl<'a> DomainProduct<'a> {
    /// Create a product over the given binders, extending `base`.
    pub fn new(ctx: &'a Context, binders: &[Binder], base: &Assignment) -> Self {
        let vars = binders
            .iter()
            .flat_map(|b| b.names.iter().map(|n| (n.clone(), b.domain.clone())))
            .collect();
        Self {
            ctx,
            base: base.clone(),
            vars,
            levels: vec![],
            started: false,
            done: false,
        }
    }

    fn assignment_through(&self, upto: usize) -> Assignment {
        let mut a = self.base.clone();
        for (level, (name, _)) in self.levels[..upto].iter().zip(&self.vars) {
            a.insert(name.clone(), level.values[level.idx].clone());
        }
        a
    }

    /// Recompute levels from `start` downward, each positioned at its first
    /// value. Returns false once every combination has been consumed.
    fn fill_levels(&mut self, start: usize) -> bool {
        self.levels.truncate(start);
        while self.levels.len() < self.vars.len() {
            let i = self.levels.len();
            let a = self.assignment_through(i);
            let values = self.ctx.domain_values(&self.vars[i].1, &a);
            if !values.is_empty() {
                self.levels.push(Level { values, idx: 0 });
            } else if !self.carry() {
                // an empty domain under every remaining outer combination
                return false;
            }
        }
        true
    }

    /// Advance the deepest level that has values left, popping exhausted
    /// levels. Returns false when the whole product is exhausted.
    fn carry(&mut self) -> bool {
        while let Some(level) = self.levels.last_mut() {
            if level.idx + 1 < level.values.len() {
                level.idx += 1;
                return true;
            }
            self.levels.pop();
        }
        false
    }
}

impl Iterator for DomainProduct<'_> {
    type Item = Assignment;

    fn next(&mut self) -> Option<Assignment> {
        if self.done {
            return None;
        }
        let more = if !self.started {
            self.started = true;
            self.fill_levels(0)
        } else {
            self.carry() && self.fill_levels(self.levels.len())
        };
        if !more {
            self.done = true;
            return None;
        }
        Some(self.assignment_through(self.vars.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    /// A context over small integer domains, used throughout the tests.
    fn int_context() -> Context {
        let mut ctx = Context::new();
        ctx.add_domain("D", (1..=10).map(Value::Int).collect());
        ctx.add_domain("D2", [0, 2, 4, 6, 8].map(Value::Int).to_vec());
        ctx.add_domain("D3", [1, 3, 5, 7, 9].map(Value::Int).to_vec());
        ctx.add_predicate("Even", |args| match args {
            [Value::Int(i)] => i % 2 == 0,
            _ => panic!("Even expects one integer"),
        });
        ctx.add_predicate("Odd", |args| match args {
            [Value::Int(i)] => i % 2 != 0,
            _ => panic!("Odd expects one integer"),
        });
        ctx.add_function("inc", |args| match args {
            [Value::Int(i)] => Value::Int(i + 1),
            _ => panic!("inc expects one integer"),
        });
        ctx.add_function("dec", |args| match args {
            [Value::Int(i)] => Value::Int(i - 1),
            _ => panic!("dec expects one integer"),
        });
        ctx
    }

    fn eval(ctx: &Context, s: &str) -> bool {
        ctx.eval_bool(&parser::parse_expr(s), &Assignment::new())
    }

    #[test]
    fn test_quantifiers_over_1_to_10() {
        let ctx = int_context();
        assert!(!eval(&ctx, "A x in D. Even(x)"));
        assert!(eval(&ctx, "E x in D. Even(x)"));
        assert!(eval(&ctx, "C=5 x in D. Even(x)"));
        assert!(!eval(&ctx, "C=4 x in D. Even(x)"));
        assert!(eval(&ctx, "C>=5 x in D. Even(x)"));
        assert!(eval(&ctx, "C<=5 x in D. Even(x)"));
        assert!(!eval(&ctx, "C>5 x in D. Even(x)"));
        assert!(eval(&ctx, "C<6 x in D. Even(x)"));
        assert!(eval(&ctx, "C!=4 x in D. Even(x)"));
    }

    #[test]
    fn test_string_formula_examples() {
        let ctx = int_context();
        assert!(eval(&ctx, "A x in D2. Even(x)"));
        assert!(!eval(&ctx, "A x in D2. Odd(x)"));
        assert!(eval(&ctx, "C=5 x in D3. Even(inc(dec(inc(x))))"));
    }

    #[test]
    fn test_connectives() {
        let ctx = int_context();
        assert!(eval(&ctx, "true & !false"));
        assert!(eval(&ctx, "false -> false"));
        assert!(eval(&ctx, "true <-> true"));
        assert!(eval(&ctx, "true ^ false"));
        assert!(!eval(&ctx, "true ^ true ^ false ^ false"));
        assert!(eval(&ctx, "1 < 2 & 2 <= 2 & 3 != 4 & 1.5 > 1"));
    }

    #[test]
    fn test_nested_quantifiers() {
        let ctx = int_context();
        // for every even x there is an odd y
        assert!(eval(&ctx, "A x in D2. E y in D3. Odd(y)"));
        // 25 (even, odd) pairs
        assert!(eval(&ctx, "C=25 x in D2, y in D3. Even(x) & Odd(y)"));
        // multiple names in one binder share the domain
        assert!(eval(&ctx, "C=25 x, y in D2. Even(x) & Even(y)"));
    }

    #[test]
    fn test_dynamic_domain() {
        let mut ctx = Context::new();
        ctx.add_domain("L", [1, 2, 3].map(Value::Entity).to_vec());
        ctx.add_function("successors", |args| match args {
            // 1 -> {2, 3}, 2 -> {3}, 3 -> {}
            [Value::Entity(1)] => Value::Entities(Arc::new(vec![2, 3])),
            [Value::Entity(2)] => Value::Entities(Arc::new(vec![3])),
            [Value::Entity(_)] => Value::Entities(Arc::new(vec![])),
            _ => panic!("successors expects one entity"),
        });
        ctx.add_predicate("Is_lanelet", |args| {
            matches!(args, [Value::Entity(id)] if (1..=3).contains(id))
        });

        let a = Assignment::new();
        assert!(ctx.eval_bool(
            &parser::parse_expr("A l in L. A s in successors(l). Is_lanelet(s)"),
            &a
        ));
        // three (l, s) combinations in total; lanelet 3 contributes none
        assert!(ctx.eval_bool(
            &parser::parse_expr("C=3 l in L, s in successors(l). true"),
            &a
        ));
    }

    #[test]
    fn test_empty_binders_yield_one_combination() {
        let ctx = int_context();
        let product = DomainProduct::new(&ctx, &[], &Assignment::new());
        assert_eq!(product.count(), 1);
    }

    #[test]
    fn test_domain_enumeration_is_sorted() {
        let mut ctx = Context::new();
        ctx.add_domain(
            "L",
            [30, 10, 20, 10].map(Value::Entity).to_vec(),
        );
        let binders = vec![Binder::fixed("l", "L")];
        let ids: Vec<ElementId> = DomainProduct::new(&ctx, &binders, &Assignment::new())
            .map(|a| a.get("l").unwrap().as_entity())
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_check_formula() {
        let ctx = int_context();
        let good = parser::parse("good", "A x in D. Even(inc(x)) || y in D2").unwrap();
        assert_eq!(ctx.check_formula(&good), Ok(()));

        let bad_pred = parser::parse("bad", "A x in D. Prime(x)").unwrap();
        assert_eq!(
            ctx.check_formula(&bad_pred),
            Err(UnboundName {
                name: "Prime".to_string()
            })
        );

        let bad_domain = parser::parse("bad", "A x in Q. Even(x)").unwrap();
        assert_eq!(
            ctx.check_formula(&bad_domain),
            Err(UnboundName {
                name: "Q".to_string()
            })
        );

        let bad_func = parser::parse("bad", "A x in D. Even(square(x))").unwrap();
        assert_eq!(
            ctx.check_formula(&bad_func),
            Err(UnboundName {
                name: "square".to_string()
            })
        );
    }
}
