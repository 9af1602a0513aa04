use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;

use crate::value::Value;
use crate::Env;

/// Binary operator kind. Comparison and membership operators are *boolean*:
/// they are eligible as atoms for backward solving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl BinaryOp {
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::In
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "**",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
        }
    }

    /// Formula template with two named slots, filled in by the explainer.
    pub fn template(self) -> &'static str {
        match self {
            Self::Add => "{lhs} + {rhs}",
            Self::Sub => "{lhs} - {rhs}",
            Self::Mul => "{lhs} * {rhs}",
            Self::Div => "{lhs} / {rhs}",
            Self::Rem => "{lhs} % {rhs}",
            Self::Pow => "{lhs} ** {rhs}",
            Self::BitAnd => "{lhs} & {rhs}",
            Self::BitOr => "{lhs} | {rhs}",
            Self::BitXor => "{lhs} ^ {rhs}",
            Self::Eq => "{lhs} == {rhs}",
            Self::Ne => "{lhs} != {rhs}",
            Self::Lt => "{lhs} < {rhs}",
            Self::Le => "{lhs} <= {rhs}",
            Self::Gt => "{lhs} > {rhs}",
            Self::Ge => "{lhs} >= {rhs}",
            Self::In => "{lhs} in {rhs}",
        }
    }
}

/// Unary operator kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            Self::Neg => "-{operand}",
            Self::Not => "!{operand}",
        }
    }
}

/// An immutable term in the expression algebra.
///
/// Nodes are built once through the construction API and never mutated;
/// evaluation, currying, rendering and solving all produce new nodes or leaf
/// values.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Fixed value, no free variables.
    Const(Value),
    /// Resolved by looking the name up in the call-time environment.
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Any expression plus an immutable map of arguments already supplied.
    Curry {
        inner: Box<Expr>,
        bound: BTreeMap<String, Value>,
    },
    /// Logical conjunction over one or more children, in order.
    And(Vec<Expr>),
    /// Logical disjunction over one or more children, in order.
    Or(Vec<Expr>),
    /// Ternary branch.
    Select {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Strict open-interval range check; an absent endpoint is unbounded.
    Between {
        subject: Box<Expr>,
        min: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Const(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub(crate) fn unary(op: UnaryOp, operand: impl Into<Expr>) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand.into()),
        }
    }

    pub(crate) fn binary(op: BinaryOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs.into()),
            rhs: Box::new(rhs.into()),
        }
    }

    /// Conjunction of all `children`. Panics if `children` is empty.
    pub fn all(children: impl IntoIterator<Item = Expr>) -> Self {
        let children: Vec<Expr> = children.into_iter().collect();
        assert!(!children.is_empty(), "And requires at least one child");
        Expr::And(children)
    }

    /// Disjunction of any of `children`. Panics if `children` is empty.
    pub fn any(children: impl IntoIterator<Item = Expr>) -> Self {
        let children: Vec<Expr> = children.into_iter().collect();
        assert!(!children.is_empty(), "Or requires at least one child");
        Expr::Or(children)
    }

    pub fn select(
        condition: impl Into<Expr>,
        then_branch: impl Into<Expr>,
        else_branch: impl Into<Expr>,
    ) -> Self {
        Expr::Select {
            condition: Box::new(condition.into()),
            then_branch: Box::new(then_branch.into()),
            else_branch: Box::new(else_branch.into()),
        }
    }

    /// `min < subject < max`, both endpoints excluded.
    pub fn between(subject: impl Into<Expr>, min: impl Into<Expr>, max: impl Into<Expr>) -> Self {
        Self::between_optional(subject, Some(min.into()), Some(max.into()))
    }

    /// Range check with optional endpoints; an absent endpoint is unbounded
    /// on that side.
    pub fn between_optional(subject: impl Into<Expr>, min: Option<Expr>, max: Option<Expr>) -> Self {
        Expr::Between {
            subject: Box::new(subject.into()),
            min: min.map(Box::new),
            max: max.map(Box::new),
        }
    }

    // Fluent construction interface. Every variant builds the corresponding
    // `Binary` node; concrete operands are auto-wrapped as `Const`.

    pub fn plus(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Add, self, other)
    }

    pub fn minus(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Sub, self, other)
    }

    pub fn times(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Mul, self, other)
    }

    pub fn div_by(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Div, self, other)
    }

    pub fn modulo(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Rem, self, other)
    }

    pub fn pow(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Pow, self, other)
    }

    pub fn bit_and(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::BitAnd, self, other)
    }

    pub fn bit_or(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::BitOr, self, other)
    }

    pub fn bit_xor(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::BitXor, self, other)
    }

    pub fn eq_to(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Eq, self, other)
    }

    pub fn ne_to(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ne, self, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Lt, self, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Le, self, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Gt, self, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ge, self, other)
    }

    pub fn is_in(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::In, self, other)
    }

    /// The set of variable names that must be bound before this node reduces
    /// to a concrete value. Only ever shrinks as bindings accumulate.
    pub fn free_vars(&self) -> BTreeSet<String> {
        match self {
            Expr::Const(_) => BTreeSet::new(),
            Expr::Variable(name) => BTreeSet::from([name.clone()]),
            Expr::Unary { operand, .. } => operand.free_vars(),
            Expr::Binary { lhs, rhs, .. } => {
                let mut vars = lhs.free_vars();
                vars.extend(rhs.free_vars());
                vars
            }
            Expr::Curry { inner, bound } => {
                let mut vars = inner.free_vars();
                for name in bound.keys() {
                    vars.remove(name);
                }
                vars
            }
            Expr::And(children) | Expr::Or(children) => children
                .iter()
                .flat_map(|child| child.free_vars())
                .collect(),
            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut vars = condition.free_vars();
                vars.extend(then_branch.free_vars());
                vars.extend(else_branch.free_vars());
                vars
            }
            Expr::Between { subject, min, max } => {
                let mut vars = subject.free_vars();
                if let Some(min) = min {
                    vars.extend(min.free_vars());
                }
                if let Some(max) = max {
                    vars.extend(max.free_vars());
                }
                vars
            }
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Expr::Const(_) => "Const",
            Expr::Variable(_) => "Variable",
            Expr::Unary { .. } => "Unary",
            Expr::Binary { .. } => "Binary",
            Expr::Curry { .. } => "Curry",
            Expr::And(_) => "And",
            Expr::Or(_) => "Or",
            Expr::Select { .. } => "Select",
            Expr::Between { .. } => "Between",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(&Env::new()))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Const(value)
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Const(Value::Number(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Const(Value::Number(n as f64))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Const(Value::Number(n as f64))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Const(Value::Bool(b))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Const(Value::Str(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Const(Value::Str(s))
    }
}

// Native operator overloads, mirroring the fluent interface where Rust
// supports the operator without reflection.

impl<T: Into<Expr>> ops::Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        self.plus(rhs)
    }
}

impl<T: Into<Expr>> ops::Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        self.minus(rhs)
    }
}

impl<T: Into<Expr>> ops::Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        self.times(rhs)
    }
}

impl<T: Into<Expr>> ops::Div<T> for Expr {
    type Output = Expr;

    fn div(self, rhs: T) -> Expr {
        self.div_by(rhs)
    }
}

impl<T: Into<Expr>> ops::Rem<T> for Expr {
    type Output = Expr;

    fn rem(self, rhs: T) -> Expr {
        self.modulo(rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::unary(UnaryOp::Not, self)
    }
}
