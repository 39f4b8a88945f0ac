//! Error types for matcher compilation and evaluation.

use thiserror::Error;

/// Result alias for matcher compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors produced while compiling a matcher expression.
///
/// Positions are 0-indexed lines and columns into the matcher source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A character or token that cannot appear at this point in the source.
    #[error("unexpected token at line {line}, column {column}")]
    UnexpectedToken {
        /// 0-indexed source line.
        line: usize,
        /// 0-indexed source column.
        column: usize,
    },
    /// An opening parenthesis without a matching close, or vice versa.
    #[error("mismatched parenthesis at line {line}, column {column}")]
    MismatchedParenthesis {
        /// 0-indexed source line.
        line: usize,
        /// 0-indexed source column.
        column: usize,
    },
    /// A string literal that runs to the end of the source unterminated.
    #[error("close double quote not found")]
    CloseDoubleQuoteNotFound,
}

/// Result alias for matcher evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors produced while evaluating a compiled matcher program.
///
/// The enforcer treats any of these as "this policy does not match"; they
/// never abort an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A variable reference with no entry in the environment.
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    /// An attribute access on a record that does not carry the attribute.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),
    /// An operator applied to an operand of the wrong type.
    #[error("type mismatch: cannot apply `{op}` to {operand}")]
    TypeMismatch {
        /// The operator's source spelling.
        op: &'static str,
        /// Type name of the offending operand.
        operand: &'static str,
    },
    /// A call target that resolved to something other than a function.
    #[error("`{0}` is not a function")]
    NotAFunction(String),
    /// A function invoked with an argument list it cannot accept.
    #[error("`{function}` called with {got} arguments")]
    Arity {
        /// Name the function was called under.
        function: String,
        /// Number of arguments supplied.
        got: usize,
    },
    /// Operand stack underflow or leftover operands after the last
    /// instruction. Indicates a malformed program, not bad input data.
    #[error("malformed matcher program")]
    Malformed,
}
