// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Randomized equivalence tests for the counting quantifier.
//!
//! The evaluator aborts a count as soon as the comparison outcome is fixed;
//! these tests check that the short-circuited result always equals the
//! exhaustive count compared against the threshold, across domain sizes,
//! predicate densities, thresholds and comparison operators.

use proptest::prelude::*;
use rol::semantics::{Assignment, Context, Value};
use rol::syntax::{Binder, CmpOp, Expr};

const CMPS: [CmpOp; 6] = [
    CmpOp::Eq,
    CmpOp::NotEq,
    CmpOp::Lt,
    CmpOp::Gt,
    CmpOp::Leq,
    CmpOp::Geq,
];

/// A context whose domain `D` is `0..truth.len()` and whose predicate `P`
/// holds exactly where `truth` says so.
fn context_for(truth: &[bool]) -> Context {
    let mut ctx = Context::new();
    ctx.add_domain("D", (0..truth.len() as i64).map(Value::Int).collect());
    let truth = truth.to_vec();
    ctx.add_predicate("P", move |args| match args {
        [Value::Int(i)] => truth[*i as usize],
        _ => panic!("P expects one integer"),
    });
    ctx
}

proptest! {
    #[test]
    fn counting_equals_exhaustive_count(
        truth in proptest::collection::vec(any::<bool>(), 0..16),
        threshold in 0usize..18,
        cmp_idx in 0usize..CMPS.len(),
    ) {
        let cmp = CMPS[cmp_idx];
        let ctx = context_for(&truth);
        let expr = Expr::count(
            cmp,
            threshold,
            [Binder::fixed("x", "D")],
            Expr::pred("P", [Expr::var("x")]),
        );
        let count = truth.iter().filter(|b| **b).count();
        let expected = cmp.eval(count.cmp(&threshold));
        prop_assert_eq!(
            ctx.eval_bool(&expr, &Assignment::new()),
            expected,
            "count={} threshold={} cmp={:?}",
            count,
            threshold,
            cmp
        );
    }

    #[test]
    fn universal_and_existential_agree_with_counting(
        truth in proptest::collection::vec(any::<bool>(), 0..16),
    ) {
        let ctx = context_for(&truth);
        let body = Expr::pred("P", [Expr::var("x")]);
        let forall = Expr::forall([Binder::fixed("x", "D")], body.clone());
        let exists = Expr::exists([Binder::fixed("x", "D")], body.clone());
        // forall is "no failing element", exists is "at least one"
        let failures = Expr::count(
            CmpOp::Eq,
            0,
            [Binder::fixed("x", "D")],
            Expr::not(body.clone()),
        );
        let witnesses = Expr::count(CmpOp::Geq, 1, [Binder::fixed("x", "D")], body);

        let a = Assignment::new();
        prop_assert_eq!(ctx.eval_bool(&forall, &a), ctx.eval_bool(&failures, &a));
        prop_assert_eq!(ctx.eval_bool(&exists, &a), ctx.eval_bool(&witnesses, &a));
    }
}
