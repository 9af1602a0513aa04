use thiserror::Error;

/// Engine errors. All failures are synchronous and surfaced to the immediate
/// caller; nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A node was evaluated directly (bypassing currying) with an incomplete
    /// environment. This is a caller contract violation, not a user-data
    /// error: partial bindings belong in `Expr::call`.
    #[error("argument mismatch: missing bindings for {missing:?}")]
    ArgumentMismatch { missing: Vec<String> },

    /// `how_to_bool`/`ask` on a node variant without boolean or branch
    /// semantics.
    #[error("{operation} is not supported on {variant} nodes")]
    UnsupportedBooleanQuery {
        variant: &'static str,
        operation: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    /// An operator applied to values of an unsupported type.
    #[error("unsupported operand type(s) for {op}: {operands}")]
    TypeMismatch {
        op: &'static str,
        operands: String,
    },
}
