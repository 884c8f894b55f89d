//! FILENAME: core/engine/src/error.rs
//! PURPOSE: Typed failure causes for expression and condition evaluation.
//! CONTEXT: The public engine contracts never fail: calculations collapse to
//! null and conditions to "visible". These variants keep the real cause
//! observable to logs and tests before it is mapped to that sentinel.

use parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("name '{0}' is not defined")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("type error: {0}")]
    Type(String),

    #[error("{function}() takes {expected} argument(s) ({got} given)")]
    Arity {
        function: &'static str,
        expected: String,
        got: usize,
    },

    #[error("invalid value: {0}")]
    Value(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

pub type EvalResult<T = crate::value::Value> = Result<T, EvalError>;
