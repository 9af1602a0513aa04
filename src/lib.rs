//! Symbolic conditional-expression engine.
//!
//! # Why?
//!
//! Business rules (eligibility, pricing, approval conditions) are predicates
//! over named inputs that rarely arrive all at once. This crate builds such a
//! predicate once as an immutable expression tree, then lets you evaluate it
//! against whatever bindings you have: a complete environment yields a
//! concrete value, a partial one yields a residual expression that accepts
//! the remaining names later, in any order. The same tree can be rendered as
//! a human-readable formula and interrogated backward: which input conditions
//! force it to true/false, and which outcomes are reachable under which
//! conditions.
//!
//! # Example
//!
//! ```rust
//! use rule_expr::*;
//!
//! let eligible = Expr::select(
//!     Expr::var("kind").eq_to("renewal"),
//!     Expr::between(Expr::var("age"), 1, 99),
//!     Expr::between(Expr::var("age"), 1, 60),
//! );
//!
//! // Complete environment: a concrete answer.
//! let env = Env::new().bind("kind", "renewal").bind("age", 72);
//! assert_eq!(eligible.call(&env).unwrap(), Outcome::Value(Value::Bool(true)));
//!
//! // Partial environment: a residual expression, completed later.
//! let residual = eligible.call(&Env::new().bind("age", 72)).unwrap().unwrap_residual();
//! let done = residual.call(&Env::new().bind("kind", "first")).unwrap();
//! assert_eq!(done, Outcome::Value(Value::Bool(false)));
//!
//! // Backward: what makes this true?
//! let ways: Vec<_> = eligible.how_to_bool(true).unwrap().collect();
//! assert_eq!(ways.len(), 2);
//! ```

mod error;
mod evaluate;
mod expression;
mod parse;
mod render;
mod solve;
mod value;

/// Uses the [`pest`] parsing expression grammar language.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use error::Error;
pub use evaluate::{Env, Outcome};
pub use expression::{BinaryOp, Expr, UnaryOp};
pub use parse::ParseError;
pub use solve::{Condition, ConditionSet, DecisionEntry};
pub use value::{Interval, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_arithmetic_and_rendering() {
        let f = Expr::var("x") + 3;
        assert_eq!(
            f.call(&Env::new().bind("x", 5)).unwrap(),
            Outcome::Value(Value::Number(8.0))
        );
        assert_eq!(f.render(&Env::new()), "{x} + 3");
        assert_eq!(f.render(&Env::new().bind("x", 5)), "5 + 3");
    }

    #[test]
    fn scenario_between_strictness() {
        let g = Expr::between(Expr::var("age"), 1, 60);
        for age in 2..60 {
            assert_eq!(
                g.call(&Env::new().bind("age", age)).unwrap(),
                Outcome::Value(Value::Bool(true)),
                "age = {age}"
            );
        }
        for age in [1, 60] {
            assert_eq!(
                g.call(&Env::new().bind("age", age)).unwrap(),
                Outcome::Value(Value::Bool(false)),
                "age = {age}"
            );
        }
        let ways: Vec<_> = g.how_to_bool(true).unwrap().collect();
        assert_eq!(ways, [vec!["age 在 (1)~(60) 范围内".to_string()]]);
    }

    #[test]
    fn scenario_select_decisions() {
        let sel = Expr::select(Expr::var("age").gt(18), "adult", "minor");
        assert_eq!(
            sel.call(&Env::new().bind("age", 20)).unwrap(),
            Outcome::Value(Value::Str("adult".into()))
        );
        let decisions: Vec<_> = sel.ask().unwrap().collect();
        assert_eq!(
            decisions,
            [
                DecisionEntry {
                    conditions: vec!["age > 18".to_string()],
                    value: Value::Str("adult".into()),
                },
                DecisionEntry {
                    conditions: vec!["not (age > 18)".to_string()],
                    value: Value::Str("minor".into()),
                },
            ]
        );
    }

    #[test]
    fn currying_commutes() {
        let f = Expr::var("x") * Expr::var("y");
        let a = Env::new().bind("x", 6);
        let b = Env::new().bind("y", 7);
        let both = Env::new().bind("x", 6).bind("y", 7);

        let xy = f.call(&a).unwrap().unwrap_residual().call(&b).unwrap();
        let yx = f.call(&b).unwrap().unwrap_residual().call(&a).unwrap();
        let at_once = f.call(&both).unwrap();
        assert_eq!(xy, Outcome::Value(Value::Number(42.0)));
        assert_eq!(xy, yx);
        assert_eq!(xy, at_once);
    }

    #[test]
    fn curry_of_curry_stays_flat() {
        let f = Expr::var("x") + Expr::var("y") + Expr::var("z");
        let step1 = f.call(&Env::new().bind("x", 1)).unwrap().unwrap_residual();
        let step2 = step1
            .call(&Env::new().bind("y", 2))
            .unwrap()
            .unwrap_residual();
        // One effective bound map, not a nested chain.
        match &step2 {
            Expr::Curry { inner, bound } => {
                assert!(!matches!(**inner, Expr::Curry { .. }));
                assert_eq!(bound.len(), 2);
            }
            other => panic!("expected Curry, got {other:?}"),
        }
        assert_eq!(
            step2.call(&Env::new().bind("z", 3)).unwrap(),
            Outcome::Value(Value::Number(6.0))
        );
    }

    #[test]
    fn empty_curry_is_identity() {
        let f = Expr::var("x") + 1;
        let wrapped = f.call(&Env::new()).unwrap().unwrap_residual();
        assert_eq!(
            wrapped.call(&Env::new().bind("x", 2)).unwrap(),
            f.call(&Env::new().bind("x", 2)).unwrap()
        );
    }

    #[test]
    fn and_or_agree_with_native_logic() {
        for a in [false, true] {
            for b in [false, true] {
                let env = Env::new().bind("a", a).bind("b", b);
                let and = Expr::all([Expr::var("a").eq_to(true), Expr::var("b").eq_to(true)]);
                assert_eq!(and.call(&env).unwrap(), Outcome::Value(Value::Bool(a && b)));
                let or = Expr::any([Expr::var("a").eq_to(true), Expr::var("b").eq_to(true)]);
                assert_eq!(or.call(&env).unwrap(), Outcome::Value(Value::Bool(a || b)));
            }
        }
    }

    #[test]
    fn how_to_bool_answers_are_sound() {
        // Every yielded condition set, when satisfied by actual bindings,
        // must make the expression evaluate to the target.
        let f = Expr::all([Expr::var("a").gt(1), Expr::var("b").lt(5)]);
        let ways: Vec<_> = f.how_to_bool(true).unwrap().collect();
        assert_eq!(ways, [vec!["a > 1".to_string(), "b < 5".to_string()]]);
        let env = Env::new().bind("a", 2).bind("b", 4);
        assert_eq!(f.call(&env).unwrap(), Outcome::Value(Value::Bool(true)));
    }

    #[test]
    fn ask_covers_every_reachable_value() {
        let sel = Expr::select(
            Expr::var("a").gt(0),
            Expr::select(Expr::var("b").gt(0), "both", "a-only"),
            Expr::select(Expr::var("b").gt(0), "b-only", "neither"),
        );
        let mut reachable: Vec<String> = sel
            .ask()
            .unwrap()
            .map(|entry| entry.value.to_string())
            .collect();
        reachable.sort();
        // Exhaustive true/false assignment over both conditions.
        let mut expected: Vec<String> = [true, false]
            .iter()
            .flat_map(|&a| [true, false].iter().map(move |&b| (a, b)))
            .map(|(a, b)| {
                let env = Env::new()
                    .bind("a", if a { 1 } else { -1 })
                    .bind("b", if b { 1 } else { -1 });
                sel.call(&env).unwrap().unwrap_value().to_string()
            })
            .collect();
        expected.sort();
        assert_eq!(reachable, expected);
    }

    #[test]
    fn residual_between_completes_later() {
        let g = Expr::between(Expr::var("age"), 1, Expr::var("cap"));
        let residual = g
            .call(&Env::new().bind("age", 30))
            .unwrap()
            .unwrap_residual();
        assert_eq!(
            residual.call(&Env::new().bind("cap", 60)).unwrap(),
            Outcome::Value(Value::Bool(true))
        );
        assert_eq!(
            g.call(&Env::new().bind("age", 30).bind("cap", 25)).unwrap(),
            Outcome::Value(Value::Bool(false))
        );
    }
}
