// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Parser for the rol formula language.

use crate::syntax::*;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use peg::{error::ParseError, str::LineCol};

peg::parser! {

grammar parser() for str {
    use Quantifier::*;

    rule lower_start() = ['a'..='z' | '_']
    rule upper_start() = ['A'..='Z']
    rule ident_char() = ['a'..='z' | 'A'..='Z' | '_' | '0'..='9']

    // function, variable and macro names start with a lowercase letter
    pub(super) rule lident() -> String
    = s:$(quiet!{lower_start() ident_char()*} / expected!("function or variable name"))
    { s.to_string() }

    // predicate and fixed-domain names start with an uppercase letter
    pub(super) rule uident() -> String
    = s:$(quiet!{upper_start() ident_char()*} / expected!("predicate or domain name"))
    { s.to_string() }

    rule whitespace() = quiet!{ [' ' | '\t' | '\n' | '\r'] }
    rule word_boundary() = !ident_char()
    rule _ = whitespace()*
    rule __ = whitespace()+

    rule uint() -> usize
    = s:$(quiet!{['0'..='9']+} / expected!("number"))
    {? s.parse().or(Err("number")) }

    rule constant() -> Constant
    = s:$("-"? ['0'..='9']+ "." ['0'..='9']+) {? s.parse().map(Constant::Float).or(Err("float")) }
    / s:$("-"? ['0'..='9']+) {? s.parse().map(Constant::Int).or(Err("integer")) }
    / "'" s:$([^ '\'']*) "'" { Constant::Str(s.to_string()) }

    rule cmp() -> CmpOp
    = "<=" { CmpOp::Leq }
    / ">=" { CmpOp::Geq }
    / "!=" { CmpOp::NotEq }
    / "=" { CmpOp::Eq }
    / "<" { CmpOp::Lt }
    / ">" { CmpOp::Gt }

    // note that no space is allowed between a function name and its
    // arguments, so f (x) doesn't parse as an application
    pub(super) rule term() -> Expr
    = f:lident() "(" _ args:(term() ** (_ "," _)) _ ")" { Expr::Func(f, args) }
    / c:constant() { Expr::Const(c) }
    / v:lident() { Expr::Var(v) }

    rule domain() -> Domain
    = f:lident() "(" _ args:(term() ** (_ "," _)) _ ")" { Domain::Dynamic(Expr::Func(f, args)) }
    / d:uident() { Domain::Fixed(d) }

    rule binder() -> Binder
    = names:(lident() ++ (_ "," _)) __ "in" word_boundary() _ domain:domain()
    { Binder { names, domain } }

    pub(super) rule binders() -> Vec<Binder>
    = binder() ++ (_ "," _)

    pub(super) rule expr() -> Expr = precedence!{
        q:("A" { Forall } / "E" { Exists }) word_boundary() _
            binders:binders() _ "." _ body:@
        { Expr::Quantified {
            quantifier: q,
            binders,
            body: Box::new(body),
          } }
        "C" cmp:cmp() _ threshold:uint() __ binders:binders() _ "." _ body:@
        { Expr::Count {
            cmp,
            threshold,
            binders,
            body: Box::new(body),
          } }
        --
        x:@ _ "->" _ y:(@) { Expr::implies(x, y) }
        x:@ _ "<->" _ y:(@) { Expr::iff(x, y) }
        --
        x:(@) _ "^" _ y:@ { Expr::xor([x, y]) }
        --
        x:(@) _ "|" !"|" _ y:@ { Expr::or([x, y]) }
        --
        x:(@) _ "&" _ y:@ { Expr::and([x, y]) }
        --
        "!" _ x:@ { Expr::not(x) }
        --
        lhs:term() _ cmp:cmp() _ rhs:term() { Expr::comparison(cmp, lhs, rhs) }
        p:uident() "(" _ args:(term() ** (_ "," _)) _ ")" { Expr::Pred(p, args) }
        "true" word_boundary() { Expr::true_() }
        "false" word_boundary() { Expr::false_() }
        "(" _ e:expr() _ ")" { e }
    }

    pub(super) rule formula() -> (Expr, Vec<Binder>)
    = _ body:expr() free:(_ "||" _ bs:binders() { bs })? _
    { (body, free.unwrap_or_default()) }
}
}

/// Parse a named formula: a boolean expression optionally followed by
/// `|| free_vars`, e.g. `"Has_left_adj(l) -> Is_lanelet(left_adj(l)) || l in L"`.
pub fn parse(name: &str, text: &str) -> Result<Formula, ParseError<LineCol>> {
    let (body, free) = parser::formula(text)?;
    Ok(Formula {
        name: name.to_string(),
        free,
        body,
    })
}

/// Parse a single expression. Panics on malformed input; meant for tests and
/// for built-in formula fragments that are known to be well-formed.
pub fn parse_expr(s: &str) -> Expr {
    parser::expr(s).expect("expression should parse")
}

/// Convert an opaque FileId and error to a readable `Diagnostic`
pub fn parse_error_diagnostic<FileId>(
    file_id: FileId,
    e: &ParseError<LineCol>,
) -> Diagnostic<FileId> {
    Diagnostic::error()
        .with_message("could not parse formula")
        .with_labels(vec![Label::primary(
            file_id,
            e.location.offset..e.location.offset + 1,
        )
        .with_message(format!("expected {}", e.expected))])
}

#[cfg(test)]
mod tests {
    use super::{parse, parser};
    use crate::syntax::*;

    fn expr(s: &str) -> Expr {
        parser::expr(s).expect("expression in test should parse")
    }

    #[test]
    fn test_ident() {
        assert_eq!(&parser::lident("hello").unwrap(), "hello");
        assert_eq!(&parser::lident("l1").unwrap(), "l1");
        assert_eq!(&parser::lident("_allowed").unwrap(), "_allowed");
        assert!(parser::lident("1up").is_err());
        assert!(parser::lident("Even").is_err());
        assert_eq!(&parser::uident("Has_left_adj").unwrap(), "Has_left_adj");
        assert!(parser::uident("left_adj").is_err());
    }

    #[test]
    fn test_terms() {
        assert_eq!(
            parser::term("left_polyline(l)").unwrap(),
            Expr::func("left_polyline", [Expr::var("l")])
        );
        assert_eq!(
            parser::term("inc(dec(x))").unwrap(),
            Expr::func("inc", [Expr::func("dec", [Expr::var("x")])])
        );
        assert_eq!(parser::term("42").unwrap(), Expr::int(42));
        assert_eq!(
            parser::term("-1.5").unwrap(),
            Expr::Const(Constant::Float(-1.5))
        );
        assert_eq!(
            parser::term("'parallel'").unwrap(),
            Expr::Const(Constant::Str("parallel".to_string()))
        );
    }

    #[test]
    fn test_expr() {
        expr("!P(x) & !Q(x)");
        expr("P(x, y)");
        expr("P(x,y)");

        // & and | at the same level are grouped into a single NAry
        assert_eq!(expr("(P(x) & Q(x)) & R(x)"), expr("P(x) & Q(x) & R(x)"));
        assert_eq!(expr("P(x) | (Q(x) | R(x))"), expr("(P(x) | Q(x)) | R(x)"));

        // precedence of & and |
        assert_eq!(expr("P(x) | Q(x) & R(x)"), expr("P(x) | (Q(x) & R(x))"));

        // precedence of | and ^
        assert_eq!(expr("P(x) ^ Q(x) | R(x)"), expr("P(x) ^ (Q(x) | R(x))"));

        // implication binds loosest and is right-associative
        assert_eq!(
            expr("P(x) & Q(x) -> R(x) -> S(x)"),
            expr("(P(x) & Q(x)) -> (R(x) -> S(x))"),
        );
        assert_eq!(
            expr("P(x) -> Q(x) <-> R(x)"),
            expr("P(x) -> (Q(x) <-> R(x))"),
        );

        assert!(parser::expr("= x").is_err());
        assert!(parser::expr("P(").is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            expr("size(left_polyline(l)) >= 2"),
            Expr::comparison(
                CmpOp::Geq,
                Expr::func("size", [Expr::func("left_polyline", [Expr::var("l")])]),
                Expr::int(2),
            )
        );
        assert_eq!(
            expr("m1 = m2"),
            Expr::comparison(CmpOp::Eq, Expr::var("m1"), Expr::var("m2"))
        );
        // != is a comparison, not negation
        assert_eq!(
            expr("x != y"),
            Expr::comparison(CmpOp::NotEq, Expr::var("x"), Expr::var("y"))
        );
    }

    #[test]
    fn test_quantifiers() {
        let q = expr("A x in D2. Even(x)");
        match &q {
            Expr::Quantified {
                quantifier: Quantifier::Forall,
                binders,
                ..
            } => {
                assert_eq!(binders, &vec![Binder::fixed("x", "D2")]);
            }
            _ => panic!("expected a universal quantifier, got {q:?}"),
        }

        expr("E l2 in L. Is_left_adj(l1, l2)");
        expr("A p in predecessors(l). Is_lanelet(p)");
        expr("A x, y in L. Is_left_adj(x, y)");
        expr("A x in L, y in TS. Has_traffic_sign(x, y)");

        // the quantifier body extends as far right as possible
        assert_eq!(
            expr("A x in L. P(x) -> Q(x)"),
            expr("A x in L. (P(x) -> Q(x))"),
        );

        // A and E are keywords only at a word boundary
        expr("Are_similar_polylines(left_polyline(l1), right_polyline(l2))");
    }

    #[test]
    fn test_counting() {
        let c = expr("C=5 x in D3. Even(x)");
        match c {
            Expr::Count {
                cmp: CmpOp::Eq,
                threshold: 5,
                ..
            } => (),
            _ => panic!("expected a counting quantifier"),
        }
        expr("C<=1 m2 in M. m1 = m2");
        expr("C>=2 i2 in incoming_elements(i). true");
    }

    #[test]
    fn test_formula_free_variables() {
        let f = parse("existence_left_adj", "Has_left_adj(l) -> Is_lanelet(left_adj(l)) || l in L")
            .expect("formula should parse");
        assert_eq!(f.name, "existence_left_adj");
        assert_eq!(f.free, vec![Binder::fixed("l", "L")]);

        let f = parse("pairwise", "Is_left_adj(l1, l2) || l1 in L, l2 in L").unwrap();
        assert_eq!(f.free_names(), vec!["l1", "l2"]);

        // no free variables at all is allowed
        let f = parse("closed", "A l in L. Has_left_adj(l)").unwrap();
        assert!(f.free.is_empty());

        // || must not be confused with the or connective
        let f = parse("disj", "P(l) | Q(l) || l in L").unwrap();
        assert_eq!(f.free.len(), 1);
        match f.body {
            Expr::NAryOp(NOp::Or, _) => (),
            _ => panic!("expected a disjunction"),
        }
    }
}
