//! Runtime values flowing through matcher evaluation.

use std::fmt;
use std::sync::Arc;

use crate::EvalResult;

/// A native function callable from matcher expressions.
///
/// Arguments arrive in source order. Implementations signal bad input by
/// returning an [`crate::EvalError`]; the enforcer's built-ins instead fold
/// failures into `Bool(false)` or an empty string so a bad pattern never
/// aborts a decision.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync>;

/// A value in the matcher environment or on the evaluation stack.
#[derive(Clone)]
pub enum Value {
    /// A string.
    Str(String),
    /// A number. Integer literals share this representation, so `1 == 1.0`.
    Num(f64),
    /// A boolean.
    Bool(bool),
    /// An ordered attribute list, e.g. a request or policy bound to its key.
    Record(Vec<(String, Value)>),
    /// A callable function.
    Function(NativeFn),
}

impl Value {
    /// Builds a record value from name/value pairs, preserving their order.
    #[must_use]
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wraps a native function.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Truthiness: only `Bool(false)` is false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false))
    }

    /// Returns the attribute with the given name on a record value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns the contained string, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// A short type name for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Num(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Record(_) => "record",
            Self::Function(_) => "function",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Num(n) => write!(f, "Num({n})"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Record(fields) => f.debug_tuple("Record").field(fields).finish(),
            Self::Function(_) => f.write_str("Function"),
        }
    }
}

/// Structural equality. Functions never compare equal, and values of
/// different types are unequal rather than an error.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Num(a), Self::Num(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Num(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
