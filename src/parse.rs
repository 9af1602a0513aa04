use std::collections::HashSet;

use crate::expression::{BinaryOp, Expr, UnaryOp};
use crate::value::Value;

use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::{prec_climber::*, Parser};
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct ExpressionParser;

pub type ParseError = pest::error::Error<Rule>;

impl Expr {
    /// Returns the variable names referenced by `input`.
    pub fn parse_variable_names(input: &str) -> Result<HashSet<String>, ParseError> {
        Ok(ExpressionParser::parse(Rule::calculation, input)?
            .flatten()
            .filter(|p| p.as_rule() == Rule::variable)
            .map(|p| p.as_str().to_string())
            .collect())
    }

    /// Parses infix text into the same tree the construction API builds.
    ///
    /// Identifiers become [`Expr::Variable`] leaves, so the parsed expression
    /// is evaluated, curried, rendered and solved exactly like a hand-built
    /// one. `Select`/`Between`/membership have no surface syntax; compose
    /// them around parsed parts through the construction API.
    ///
    /// `^` parses as exponentiation (right-associative), not bitwise xor, and
    /// renders back as `**`; bitwise operators are construction-API only.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut pairs = ExpressionParser::parse(Rule::calculation, input)?;
        let expr = pairs.next().unwrap();
        Ok(climb_recursive(expr.into_inner()))
    }
}

static PRECEDENCE_CLIMBER: Lazy<PrecClimber<Rule>> = Lazy::new(|| {
    use Assoc::*;
    use Rule::*;

    PrecClimber::new(vec![
        Operator::new(and, Left) | Operator::new(or, Left),
        Operator::new(eq, Left)
            | Operator::new(neq, Left)
            | Operator::new(less, Left)
            | Operator::new(le, Left)
            | Operator::new(greater, Left)
            | Operator::new(ge, Left),
        Operator::new(add, Left) | Operator::new(subtract, Left),
        Operator::new(multiply, Left) | Operator::new(divide, Left) | Operator::new(modulo, Left),
        Operator::new(power, Right),
    ])
});

fn climb_recursive(input: Pairs<Rule>) -> Expr {
    PRECEDENCE_CLIMBER.climb(
        input,
        |pair: Pair<Rule>| match pair.as_rule() {
            Rule::expr => climb_recursive(pair.into_inner()),
            Rule::real_literal => {
                let literal_str = pair.as_str();
                if let Ok(value) = literal_str.parse::<f64>() {
                    return Expr::Const(Value::Number(value));
                }
                panic!("Unexpected literal: {}", literal_str)
            }
            Rule::string_literal => climb_recursive(pair.into_inner()),
            Rule::string_literal_value => Expr::Const(Value::Str(pair.as_str().to_string())),
            Rule::bool_literal => Expr::Const(Value::Bool(pair.as_str() == "true")),
            Rule::unary_real_op_expr => {
                let mut inner = pair.into_inner();
                let unary = inner.next().unwrap();
                match unary.as_rule() {
                    Rule::neg => Expr::unary(UnaryOp::Neg, climb_recursive(inner)),
                    x => panic!("Unexpected unary operator: {x:?}"),
                }
            }
            Rule::unary_logic_expr => {
                let mut inner = pair.into_inner();
                let unary = inner.next().unwrap();
                match unary.as_rule() {
                    Rule::not => Expr::unary(UnaryOp::Not, climb_recursive(inner)),
                    x => panic!("Unexpected unary logic operator: {x:?}"),
                }
            }
            Rule::variable => Expr::var(pair.as_str()),
            x => panic!("Unexpected primary rule {x:?}"),
        },
        |lhs: Expr, op: Pair<Rule>, rhs: Expr| match op.as_rule() {
            Rule::add => Expr::binary(BinaryOp::Add, lhs, rhs),
            Rule::subtract => Expr::binary(BinaryOp::Sub, lhs, rhs),
            Rule::multiply => Expr::binary(BinaryOp::Mul, lhs, rhs),
            Rule::divide => Expr::binary(BinaryOp::Div, lhs, rhs),
            Rule::modulo => Expr::binary(BinaryOp::Rem, lhs, rhs),
            Rule::power => Expr::binary(BinaryOp::Pow, lhs, rhs),
            Rule::eq => Expr::binary(BinaryOp::Eq, lhs, rhs),
            Rule::neq => Expr::binary(BinaryOp::Ne, lhs, rhs),
            Rule::less => Expr::binary(BinaryOp::Lt, lhs, rhs),
            Rule::le => Expr::binary(BinaryOp::Le, lhs, rhs),
            Rule::greater => Expr::binary(BinaryOp::Gt, lhs, rhs),
            Rule::ge => Expr::binary(BinaryOp::Ge, lhs, rhs),
            Rule::and => Expr::all([lhs, rhs]),
            Rule::or => Expr::any([lhs, rhs]),
            x => panic!("Unexpected operator {x:?}"),
        },
    )
}
