//! FILENAME: core/engine/src/limits.rs
//! PURPOSE: Evaluation bounds for form-author supplied expressions.
//! CONTEXT: Calculated-field formulas are the only code-like text the system
//! executes. These limits keep a pathological formula from burning CPU or
//! memory. Exceeding one is an ordinary evaluation failure (null result).

use crate::error::EvalError;
use serde::{Deserialize, Serialize};

/// Bounds applied to every evaluation call. All fields are optional in
/// serialized form; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalLimits {
    /// Maximum expression length in characters.
    pub max_expression_len: usize,
    /// Maximum height of the expression tree. Also bounds bracket, call and
    /// unary nesting while parsing.
    pub max_depth: usize,
    /// Maximum length of any list operand or result.
    pub max_list_len: usize,
    /// Maximum length of any string result, in characters.
    pub max_string_len: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        EvalLimits {
            max_expression_len: 4096,
            max_depth: parser::DEFAULT_MAX_NESTING,
            max_list_len: 10_000,
            max_string_len: 65_536,
        }
    }
}

impl EvalLimits {
    /// Loads limits from a JSON document such as `{"max_depth": 32}`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn check_expression(&self, expression: &str) -> Result<(), EvalError> {
        let len = expression.chars().count();
        if len > self.max_expression_len {
            return Err(EvalError::LimitExceeded(format!(
                "expression is {} characters, limit is {}",
                len, self.max_expression_len
            )));
        }
        Ok(())
    }

    pub fn check_list(&self, len: usize) -> Result<(), EvalError> {
        if len > self.max_list_len {
            return Err(EvalError::LimitExceeded(format!(
                "list of {} items, limit is {}",
                len, self.max_list_len
            )));
        }
        Ok(())
    }

    pub fn check_string(&self, len: usize) -> Result<(), EvalError> {
        if len > self.max_string_len {
            return Err(EvalError::LimitExceeded(format!(
                "string of {} characters, limit is {}",
                len, self.max_string_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let limits = EvalLimits::from_json_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(limits.max_depth, 8);
        assert_eq!(limits.max_expression_len, EvalLimits::default().max_expression_len);
    }

    #[test]
    fn test_checks() {
        let limits = EvalLimits {
            max_expression_len: 5,
            max_depth: 4,
            max_list_len: 2,
            max_string_len: 3,
        };
        assert!(limits.check_expression("1+2+3").is_ok());
        assert!(limits.check_expression("1+2+3+4").is_err());
        assert!(limits.check_list(2).is_ok());
        assert!(matches!(limits.check_list(3), Err(EvalError::LimitExceeded(_))));
        assert!(limits.check_string(4).is_err());
    }
}
