// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The rol AST for formulas over road-network domains.

use itertools::Itertools;
use std::fmt;

/// A constant appearing in a term position.
#[derive(PartialEq, Clone, Debug)]
pub enum Constant {
    /// An integer constant
    Int(i64),
    /// A floating-point constant
    Float(f64),
    /// A string constant, written in single quotes
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Float(x) => write!(f, "{x:?}"),
            Constant::Str(s) => write!(f, "'{s}'"),
        }
    }
}

/// Comparison operators between terms, also used as the comparison of a
/// counting quantifier against its threshold.
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    Leq,
    Geq,
}

impl CmpOp {
    /// The concrete syntax of this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Leq => "<=",
            CmpOp::Geq => ">=",
        }
    }

    /// Apply the comparison to two ordered values.
    pub fn eval(&self, ord: std::cmp::Ordering) -> bool {
        match self {
            CmpOp::Eq => ord.is_eq(),
            CmpOp::NotEq => ord.is_ne(),
            CmpOp::Lt => ord.is_lt(),
            CmpOp::Gt => ord.is_gt(),
            CmpOp::Leq => ord.is_le(),
            CmpOp::Geq => ord.is_ge(),
        }
    }
}

/// Binary logical connectives.
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum BinOp {
    Implies,
    Iff,
}

/// N-ary logical connectives.
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum NOp {
    And,
    Or,
    Xor,
}

/// A kind of quantifier (universal or existential). Counting quantifiers are
/// a separate [`Expr`] variant because they carry a comparison and threshold.
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum Quantifier {
    Forall,
    Exists,
}

/// The domain a variable ranges over.
#[derive(PartialEq, Clone, Debug)]
pub enum Domain {
    /// A named domain resolved against the context's domain registry,
    /// e.g. `L` or `TS`.
    Fixed(String),
    /// A function term recomputed from the current outer bindings,
    /// e.g. `successors(l)`. Must evaluate to a set of element ids.
    Dynamic(Expr),
}

/// One or more variables bound to a single domain, as in `l1, l2 in L`.
#[derive(PartialEq, Clone, Debug)]
pub struct Binder {
    /// The bound variable names, in declaration order.
    pub names: Vec<String>,
    /// The domain every variable in this binder ranges over.
    pub domain: Domain,
}

impl Binder {
    /// Smart constructor for a single-variable binder over a fixed domain.
    pub fn fixed(name: &str, domain: &str) -> Self {
        Binder {
            names: vec![name.to_string()],
            domain: Domain::Fixed(domain.to_string()),
        }
    }
}

/// A rol expression. Boolean nodes evaluate to a truth value; `Func`, `Const`
/// and `Var` are terms and evaluate to an arbitrary domain value. Each node
/// owns its children; formulas are trees, never DAGs.
#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    /// A constant true or false
    Literal(bool),
    /// A constant term
    Const(Constant),
    /// A reference to a bound variable
    Var(String),
    /// A predicate application; predicate names start with an uppercase letter
    Pred(String, Vec<Expr>),
    /// A function application (a term); function names start lowercase
    Func(String, Vec<Expr>),
    /// Boolean negation
    Not(Box<Expr>),
    /// An applied binary connective
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    /// An applied n-ary connective
    NAryOp(NOp, Vec<Expr>),
    /// A comparison between two terms
    Comparison(CmpOp, Box<Expr>, Box<Expr>),
    /// A universal or existential quantifier
    #[allow(missing_docs)]
    Quantified {
        quantifier: Quantifier,
        binders: Vec<Binder>,
        body: Box<Expr>,
    },
    /// A counting quantifier `C<cmp><k> vars in dom. body`: the number of
    /// combinations satisfying `body`, compared against `threshold`.
    #[allow(missing_docs)]
    Count {
        cmp: CmpOp,
        threshold: usize,
        binders: Vec<Binder>,
        body: Box<Expr>,
    },
}

impl From<&Expr> for Expr {
    /// This is mostly for smart constructors, making it possible to pass
    /// either Expr or &Expr with an automatic clone if needed.
    fn from(value: &Self) -> Self {
        value.clone()
    }
}

/// Smart constructors for Expr. These generally take arguments by value or
/// reference and clone where needed.
impl Expr {
    /// Smart constructor for Literal(true)
    pub fn true_() -> Self {
        Self::Literal(true)
    }

    /// Smart constructor for Literal(false)
    pub fn false_() -> Self {
        Self::Literal(false)
    }

    /// Smart constructor for an integer constant
    pub fn int(i: i64) -> Self {
        Self::Const(Constant::Int(i))
    }

    /// Smart constructor for a variable reference
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    /// Smart constructor for a predicate application
    pub fn pred<I>(name: &str, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Self::Pred(
            name.to_string(),
            args.into_iter().map(|x| x.into()).collect(),
        )
    }

    /// Smart constructor for a function application
    pub fn func<I>(name: &str, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Self::Func(
            name.to_string(),
            args.into_iter().map(|x| x.into()).collect(),
        )
    }

    /// Smart constructor for negation. Cancels double negation.
    pub fn not<T>(e: T) -> Self
    where
        T: Into<Expr>,
    {
        match e.into() {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Smart constructor for `lhs -> rhs`
    pub fn implies<T1, T2>(lhs: T1, rhs: T2) -> Self
    where
        T1: Into<Expr>,
        T2: Into<Expr>,
    {
        Self::BinOp(BinOp::Implies, Box::new(lhs.into()), Box::new(rhs.into()))
    }

    /// Smart constructor for `lhs <-> rhs`
    pub fn iff<T1, T2>(lhs: T1, rhs: T2) -> Self
    where
        T1: Into<Expr>,
        T2: Into<Expr>,
    {
        Self::BinOp(BinOp::Iff, Box::new(lhs.into()), Box::new(rhs.into()))
    }

    /// Smart constructor for a comparison between two terms
    pub fn comparison<T1, T2>(cmp: CmpOp, lhs: T1, rhs: T2) -> Self
    where
        T1: Into<Expr>,
        T2: Into<Expr>,
    {
        Self::Comparison(cmp, Box::new(lhs.into()), Box::new(rhs.into()))
    }

    /// Helper for [`Self::and`], [`Self::or`] and [`Self::xor`]
    fn flatten_terms_of_op(es: Vec<Expr>, op: NOp) -> Vec<Expr> {
        es.into_iter()
            .flat_map(|e| match e {
                Self::NAryOp(op2, es2) if op == op2 => es2,
                _ => vec![e],
            })
            .collect()
    }

    /// Smart constructor for And. Zero and one conjuncts are handled
    /// specially, and conjuncts that are And are flattened (not recursively).
    pub fn and<I>(es: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let mut es = es.into_iter().map(|x| x.into()).collect_vec();
        if es.is_empty() {
            Self::true_()
        } else if es.len() == 1 {
            es.pop().unwrap()
        } else {
            Self::NAryOp(NOp::And, Self::flatten_terms_of_op(es, NOp::And))
        }
    }

    /// Smart constructor for Or. Zero and one disjuncts are handled
    /// specially, and disjuncts that are Or are flattened (not recursively).
    pub fn or<I>(es: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let mut es = es.into_iter().map(|x| x.into()).collect_vec();
        if es.is_empty() {
            Self::false_()
        } else if es.len() == 1 {
            es.pop().unwrap()
        } else {
            Self::NAryOp(NOp::Or, Self::flatten_terms_of_op(es, NOp::Or))
        }
    }

    /// Smart constructor for Xor. Xor is not flattened because n-ary xor is
    /// parity, which is what repeated binary xor gives anyway.
    pub fn xor<I>(es: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let mut es = es.into_iter().map(|x| x.into()).collect_vec();
        if es.is_empty() {
            Self::false_()
        } else if es.len() == 1 {
            es.pop().unwrap()
        } else {
            Self::NAryOp(NOp::Xor, es)
        }
    }

    /// Smart constructor for `forall binders. body`. Zero binders is the body
    /// itself.
    pub fn forall<I, T>(binders: I, body: T) -> Self
    where
        I: IntoIterator<Item = Binder>,
        T: Into<Expr>,
    {
        Self::quantify(Quantifier::Forall, binders.into_iter().collect(), body.into())
    }

    /// Smart constructor for `exists binders. body`. Zero binders is the body
    /// itself.
    pub fn exists<I, T>(binders: I, body: T) -> Self
    where
        I: IntoIterator<Item = Binder>,
        T: Into<Expr>,
    {
        Self::quantify(Quantifier::Exists, binders.into_iter().collect(), body.into())
    }

    fn quantify(quantifier: Quantifier, binders: Vec<Binder>, body: Self) -> Self {
        // all bound names within one quantifier must be distinct
        debug_assert!({
            let names = binders.iter().flat_map(|b| &b.names).collect_vec();
            names
                .iter()
                .enumerate()
                .all(|(i, n1)| names[(i + 1)..].iter().all(|n2| n1 != n2))
        });
        if binders.is_empty() {
            body
        } else {
            Self::Quantified {
                quantifier,
                binders,
                body: Box::new(body),
            }
        }
    }

    /// Smart constructor for a counting quantifier.
    pub fn count<I, T>(cmp: CmpOp, threshold: usize, binders: I, body: T) -> Self
    where
        I: IntoIterator<Item = Binder>,
        T: Into<Expr>,
    {
        Self::Count {
            cmp,
            threshold,
            binders: binders.into_iter().collect(),
            body: Box::new(body.into()),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::printer::expr(self))
    }
}

/// A named formula: a boolean expression plus an ordered list of free
/// variables with their domains. The free variables are the ones the verifier
/// instantiates; their values at a failing combination form the reported
/// location. Immutable after parse.
#[derive(PartialEq, Clone, Debug)]
pub struct Formula {
    /// The stable string id of this formula, e.g. `"existence_left_adj"`.
    pub name: String,
    /// The free variables, in declaration order. Every free variable has
    /// exactly one domain.
    pub free: Vec<Binder>,
    /// The formula body.
    pub body: Expr,
}

impl Formula {
    /// The free variable names in declaration order.
    pub fn free_names(&self) -> Vec<&str> {
        self.free
            .iter()
            .flat_map(|b| b.names.iter().map(|n| n.as_str()))
            .collect()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::printer::formula(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smart_constructors() {
        assert_eq!(Expr::and(Vec::<Expr>::new()), Expr::true_());
        assert_eq!(Expr::or(Vec::<Expr>::new()), Expr::false_());
        assert_eq!(Expr::and([Expr::var("x")]), Expr::var("x"));

        // one level of flattening
        let nested = Expr::and([Expr::and([Expr::var("a"), Expr::var("b")]), Expr::var("c")]);
        assert_eq!(
            nested,
            Expr::NAryOp(
                NOp::And,
                vec![Expr::var("a"), Expr::var("b"), Expr::var("c")]
            )
        );

        // double negation cancels
        assert_eq!(Expr::not(Expr::not(Expr::var("p"))), Expr::var("p"));
    }

    #[test]
    fn test_quantify_empty_binders() {
        assert_eq!(Expr::forall([], Expr::true_()), Expr::true_());
    }
}
