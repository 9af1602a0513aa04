use std::collections::BTreeMap;

use log::{debug, trace};

use crate::error::Error;
use crate::expression::{BinaryOp, Expr, UnaryOp};
use crate::value::Value;

/// Name→value bindings supplied at call time. Immutable from the engine's
/// perspective; built once per call with the `bind` builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Env {
    bindings: BTreeMap<String, Value>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, Value>> for Env {
    fn from(bindings: BTreeMap<String, Value>) -> Self {
        Self { bindings }
    }
}

impl FromIterator<(String, Value)> for Env {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Result of the unified call interface: either a concrete value, or a
/// residual expression still awaiting bindings.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Value(Value),
    Residual(Expr),
}

impl Outcome {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// Assume this outcome is a concrete value.
    pub fn unwrap_value(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::Residual(e) => panic!("Expected Value, got residual over {:?}", e.free_vars()),
        }
    }

    /// Assume this outcome is a residual expression.
    pub fn unwrap_residual(self) -> Expr {
        match self {
            Self::Residual(e) => e,
            Self::Value(v) => panic!("Expected residual, got {v}"),
        }
    }

    pub(crate) fn into_expr(self) -> Expr {
        match self {
            Self::Value(v) => Expr::Const(v),
            Self::Residual(e) => e,
        }
    }
}

impl Expr {
    /// Unified evaluate-or-curry entry point.
    ///
    /// With a complete environment this evaluates to a concrete
    /// [`Outcome::Value`]. With a partial environment it returns an
    /// [`Outcome::Residual`] `Curry` over the *original* node, so the
    /// remaining names can be supplied later, in any order, across any number
    /// of further partial calls. Names not in `free_vars` are ignored.
    pub fn call(&self, env: &Env) -> Result<Outcome, Error> {
        debug!("call(free = {:?})", self.free_vars());
        if let Expr::Curry { inner, bound } = self {
            // Nested curry layers merge into one flat bound map; earlier
            // bindings win over later ones for the same name.
            let mut merged = bound.clone();
            let free = inner.free_vars();
            for name in &free {
                if !merged.contains_key(name) {
                    if let Some(value) = env.get(name) {
                        merged.insert(name.clone(), value.clone());
                    }
                }
            }
            if free.iter().all(|name| merged.contains_key(name)) {
                trace!("curry complete, evaluating inner");
                return Ok(Outcome::Value(inner.evaluate(&Env::from(merged))?));
            }
            return Ok(Outcome::Residual(Expr::Curry {
                inner: inner.clone(),
                bound: merged,
            }));
        }

        let free = self.free_vars();
        if free.iter().all(|name| env.contains(name)) {
            return Ok(Outcome::Value(self.evaluate(env)?));
        }
        let bound: BTreeMap<String, Value> = free
            .iter()
            .filter_map(|name| env.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        trace!("partial bindings {:?}, currying", bound.keys());
        Ok(Outcome::Residual(Expr::Curry {
            inner: Box::new(self.clone()),
            bound,
        }))
    }

    /// Strict evaluation: every free variable must be bound.
    ///
    /// Calling this with an incomplete environment is a contract violation by
    /// the caller (partial bindings belong in [`Expr::call`]) and raises
    /// [`Error::ArgumentMismatch`].
    pub fn evaluate(&self, env: &Env) -> Result<Value, Error> {
        let missing: Vec<String> = self
            .free_vars()
            .into_iter()
            .filter(|name| !env.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::ArgumentMismatch { missing });
        }
        match self.reduce(env)? {
            Outcome::Value(v) => Ok(v),
            Outcome::Residual(residual) => Err(Error::ArgumentMismatch {
                missing: residual.free_vars().into_iter().collect(),
            }),
        }
    }

    /// Recursive partial reduction: applies every variant's semantics under
    /// `env`, returning a concrete value where possible and a reduced node of
    /// the same shape where bindings are still missing.
    pub(crate) fn reduce(&self, env: &Env) -> Result<Outcome, Error> {
        match self {
            Expr::Const(value) => Ok(Outcome::Value(value.clone())),

            Expr::Variable(name) => match env.get(name) {
                Some(value) => Ok(Outcome::Value(value.clone())),
                None => Ok(Outcome::Residual(self.clone())),
            },

            Expr::Unary { op, operand } => match operand.reduce(env)? {
                Outcome::Value(v) => Ok(Outcome::Value(apply_unary(*op, &v)?)),
                Outcome::Residual(operand) => Ok(Outcome::Residual(Expr::Unary {
                    op: *op,
                    operand: Box::new(operand),
                })),
            },

            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.reduce(env)?;
                let rhs = rhs.reduce(env)?;
                if let (Outcome::Value(a), Outcome::Value(b)) = (&lhs, &rhs) {
                    return Ok(Outcome::Value(apply_binary(*op, a, b)?));
                }
                Ok(Outcome::Residual(Expr::Binary {
                    op: *op,
                    lhs: Box::new(lhs.into_expr()),
                    rhs: Box::new(rhs.into_expr()),
                }))
            }

            Expr::Curry { inner, bound } => {
                let mut merged = bound.clone();
                let free = inner.free_vars();
                for name in &free {
                    if !merged.contains_key(name) {
                        if let Some(value) = env.get(name) {
                            merged.insert(name.clone(), value.clone());
                        }
                    }
                }
                if free.iter().all(|name| merged.contains_key(name)) {
                    return inner.reduce(&Env::from(merged));
                }
                Ok(Outcome::Residual(Expr::Curry {
                    inner: inner.clone(),
                    bound: merged,
                }))
            }

            // Every child reduces before the outcome is decided, so a fault
            // in a later child surfaces even when an earlier one already
            // settles the node.
            Expr::And(children) => {
                let mut settled_false = false;
                let mut symbolic = Vec::new();
                for child in children {
                    match child.reduce(env)? {
                        Outcome::Value(v) if !v.is_truthy() => {
                            trace!("And settles to false on {v}");
                            settled_false = true;
                        }
                        // Concrete truthy conjuncts are discharged.
                        Outcome::Value(_) => {}
                        Outcome::Residual(e) => symbolic.push(e),
                    }
                }
                if settled_false {
                    Ok(Outcome::Value(Value::Bool(false)))
                } else if symbolic.is_empty() {
                    Ok(Outcome::Value(Value::Bool(true)))
                } else {
                    Ok(Outcome::Residual(Expr::And(symbolic)))
                }
            }

            Expr::Or(children) => {
                let mut settled_true = false;
                let mut symbolic = Vec::new();
                for child in children {
                    match child.reduce(env)? {
                        Outcome::Value(v) if v.is_truthy() => {
                            trace!("Or settles to true on {v}");
                            settled_true = true;
                        }
                        Outcome::Value(_) => {}
                        Outcome::Residual(e) => symbolic.push(e),
                    }
                }
                if settled_true {
                    Ok(Outcome::Value(Value::Bool(true)))
                } else if symbolic.is_empty() {
                    Ok(Outcome::Value(Value::Bool(false)))
                } else {
                    Ok(Outcome::Residual(Expr::Or(symbolic)))
                }
            }

            Expr::Select {
                condition,
                then_branch,
                else_branch,
            } => match condition.reduce(env)? {
                Outcome::Value(cond) => {
                    let taken = if cond.is_truthy() {
                        then_branch
                    } else {
                        else_branch
                    };
                    taken.reduce(env)
                }
                Outcome::Residual(condition) => Ok(Outcome::Residual(Expr::Select {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch.reduce(env)?.into_expr()),
                    else_branch: Box::new(else_branch.reduce(env)?.into_expr()),
                })),
            },

            Expr::Between { subject, min, max } => {
                let subject = subject.reduce(env)?;
                let min = min.as_ref().map(|m| m.reduce(env)).transpose()?;
                let max = max.as_ref().map(|m| m.reduce(env)).transpose()?;
                let subject_value = match subject {
                    Outcome::Residual(subject) => {
                        return Ok(Outcome::Residual(Expr::Between {
                            subject: Box::new(subject),
                            min: min.map(|m| Box::new(m.into_expr())),
                            max: max.map(|m| Box::new(m.into_expr())),
                        }));
                    }
                    Outcome::Value(v) => v,
                };
                // Subject is concrete: collapse each known bound immediately.
                let mut symbolic_min = None;
                match min {
                    Some(Outcome::Value(bound)) => {
                        if !strictly_less(&bound, &subject_value)? {
                            return Ok(Outcome::Value(Value::Bool(false)));
                        }
                    }
                    Some(Outcome::Residual(e)) => symbolic_min = Some(e),
                    None => {}
                }
                let mut symbolic_max = None;
                match max {
                    Some(Outcome::Value(bound)) => {
                        if !strictly_less(&subject_value, &bound)? {
                            return Ok(Outcome::Value(Value::Bool(false)));
                        }
                    }
                    Some(Outcome::Residual(e)) => symbolic_max = Some(e),
                    None => {}
                }
                if symbolic_min.is_none() && symbolic_max.is_none() {
                    Ok(Outcome::Value(Value::Bool(true)))
                } else {
                    Ok(Outcome::Residual(Expr::Between {
                        subject: Box::new(Expr::Const(subject_value)),
                        min: symbolic_min.map(Box::new),
                        max: symbolic_max.map(Box::new),
                    }))
                }
            }
        }
    }
}

fn strictly_less(a: &Value, b: &Value) -> Result<bool, Error> {
    match a.compare(b) {
        Some(ordering) => Ok(ordering == std::cmp::Ordering::Less),
        None => Err(Error::TypeMismatch {
            op: "<",
            operands: format!("{a}, {b}"),
        }),
    }
}

fn integral(op: BinaryOp, value: &Value) -> Result<i64, Error> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
        _ => Err(Error::TypeMismatch {
            op: op.symbol(),
            operands: value.to_string(),
        }),
    }
}

fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, Error> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(Error::TypeMismatch {
            op: op.symbol(),
            operands: operand.to_string(),
        }),
    }
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    let mismatch = || Error::TypeMismatch {
        op: op.symbol(),
        operands: format!("{lhs}, {rhs}"),
    };
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(mismatch()),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            _ => Err(mismatch()),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            _ => Err(mismatch()),
        },
        BinaryOp::Div => match (lhs, rhs) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(Error::DivisionByZero),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            _ => Err(mismatch()),
        },
        BinaryOp::Rem => match (lhs, rhs) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(Error::DivisionByZero),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
            _ => Err(mismatch()),
        },
        BinaryOp::Pow => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.powf(*b))),
            _ => Err(mismatch()),
        },
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            })),
            _ => {
                let a = integral(op, lhs)?;
                let b = integral(op, rhs)?;
                let result = match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                };
                Ok(Value::Number(result as f64))
            }
        },
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = lhs.compare(rhs).ok_or_else(mismatch)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => match (lhs, rhs) {
            (v, Value::OneOf(values)) => Ok(Value::Bool(values.contains(v))),
            (v, Value::NoneOf(values)) => Ok(Value::Bool(!values.contains(v))),
            (Value::Str(needle), Value::Str(haystack)) => {
                Ok(Value::Bool(haystack.contains(needle.as_str())))
            }
            _ => Err(mismatch()),
        },
    }
}
