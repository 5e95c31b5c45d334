// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Pretty-printer for rol formulas, inverse to the parser up to parentheses.

use crate::syntax::*;
use itertools::Itertools;

fn precedence(e: &Expr) -> usize {
    match e {
        Expr::Quantified { .. } | Expr::Count { .. } => 0,
        Expr::BinOp(BinOp::Implies | BinOp::Iff, _, _) => 10,
        Expr::NAryOp(NOp::Xor, _) => 20,
        Expr::NAryOp(NOp::Or, _) => 30,
        Expr::NAryOp(NOp::And, _) => 40,
        Expr::Not(_) => 50,
        Expr::Comparison(_, _, _) => 60,
        Expr::Literal(_) | Expr::Const(_) | Expr::Var(_) | Expr::Pred(_, _) | Expr::Func(_, _) => {
            1000
        }
    }
}

fn parens(add_parens: bool, s: String) -> String {
    if add_parens {
        format!("({s})")
    } else {
        s
    }
}

fn domain(d: &Domain) -> String {
    match d {
        Domain::Fixed(name) => name.clone(),
        Domain::Dynamic(e) => expr(e),
    }
}

fn binder(b: &Binder) -> String {
    format!("{} in {}", b.names.iter().join(", "), domain(&b.domain))
}

fn binders(bs: &[Binder]) -> String {
    bs.iter().map(binder).join(", ")
}

/// Print an expression with a minimal number of parentheses.
pub fn expr(e: &Expr) -> String {
    // handling of precedence is based on
    // https://stackoverflow.com/questions/6277747/pretty-print-expression-with-as-few-parentheses-as-possible
    match e {
        Expr::Literal(false) => "false".to_string(),
        Expr::Literal(true) => "true".to_string(),
        Expr::Const(c) => format!("{c}"),
        Expr::Var(v) => v.clone(),
        Expr::Pred(p, args) => format!("{p}({})", args.iter().map(expr).join(", ")),
        Expr::Func(f, args) => format!("{f}({})", args.iter().map(expr).join(", ")),
        Expr::Not(arg) => {
            let s = parens(precedence(e) > precedence(arg), expr(arg));
            format!("!{s}")
        }
        Expr::BinOp(op, lhs, rhs) => {
            // implication and equivalence are right-associative
            let left = parens(precedence(e) >= precedence(lhs), expr(lhs));
            let right = parens(precedence(e) > precedence(rhs), expr(rhs));
            let op = match op {
                BinOp::Implies => "->",
                BinOp::Iff => "<->",
            };
            format!("{left} {op} {right}")
        }
        Expr::NAryOp(op, args) => {
            let op = match op {
                NOp::And => " & ",
                NOp::Or => " | ",
                NOp::Xor => " ^ ",
            };
            args.iter()
                .map(|arg| parens(precedence(e) > precedence(arg), expr(arg)))
                .join(op)
        }
        Expr::Comparison(cmp, lhs, rhs) => {
            // comparison operands are terms, which never need parentheses
            format!("{} {} {}", expr(lhs), cmp.as_str(), expr(rhs))
        }
        Expr::Quantified {
            quantifier,
            binders: bs,
            body,
        } => {
            let q = match quantifier {
                Quantifier::Forall => "A",
                Quantifier::Exists => "E",
            };
            format!("{q} {}. {}", binders(bs), expr(body))
        }
        Expr::Count {
            cmp,
            threshold,
            binders: bs,
            body,
        } => {
            format!("C{}{threshold} {}. {}", cmp.as_str(), binders(bs), expr(body))
        }
    }
}

/// Print a formula, including its free variables.
pub fn formula(f: &Formula) -> String {
    if f.free.is_empty() {
        expr(&f.body)
    } else {
        format!("{} || {}", expr(&f.body), binders(&f.free))
    }
}
