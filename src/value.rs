use std::cmp::Ordering;
use std::fmt;

/// A concrete runtime value bound to a variable or produced by evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    /// Closed numeric interval, carried as an inert payload.
    Interval(Interval),
    /// Tagged union of admissible values.
    OneOf(Vec<Value>),
    /// Negated union: any value *not* in the set.
    NoneOf(Vec<Value>),
}

impl Value {
    /// Truthiness under branch/short-circuit semantics: `false`, `0` and the
    /// empty string are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Interval(_) | Value::OneOf(_) | Value::NoneOf(_) => true,
        }
    }

    /// Ordering between two values, where one exists. Numbers compare
    /// numerically, strings lexicographically, booleans false-before-true;
    /// mixed types do not compare.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Integral numbers print without a fractional part so that bound
            // values read naturally in rendered formulas ("5 + 3").
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Interval(interval) => write!(f, "{interval}"),
            Value::OneOf(values) => write!(f, "[{}]", join(values)),
            Value::NoneOf(values) => write!(f, "not [{}]", join(values)),
        }
    }
}

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Interval> for Value {
    fn from(interval: Interval) -> Self {
        Value::Interval(interval)
    }
}

/// Closed numeric interval `(min, max)`.
///
/// The engine never interprets intervals beyond storing, comparing and
/// displaying them; they exist so a decision can *produce* a range (e.g. the
/// admissible age range for an insurance product) as its outcome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    min: f64,
    max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            Value::Number(self.min),
            Value::Number(self.max)
        )
    }
}
