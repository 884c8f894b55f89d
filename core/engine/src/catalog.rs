//! FILENAME: core/engine/src/catalog.rs
//! PURPOSE: Read-only listings of skip-logic operators and built-in functions.
//! CONTEXT: The form builder shows these to authors. Both lists are generated
//! from the enums the engines dispatch on.

use crate::functions::BuiltinFunction;
use crate::skip_logic::ConditionOperator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub name: String,
    pub label: String,
    pub description: String,
    pub requires_value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub category: String,
}

pub fn operator_catalog() -> Vec<OperatorInfo> {
    ConditionOperator::ALL
        .iter()
        .map(|op| OperatorInfo {
            name: op.as_str().to_string(),
            label: op.label().to_string(),
            description: op.description().to_string(),
            requires_value: op.requires_value(),
        })
        .collect()
}

pub fn function_catalog() -> Vec<FunctionInfo> {
    BuiltinFunction::ALL
        .iter()
        .map(|func| FunctionInfo {
            name: func.name().to_string(),
            signature: func.signature().to_string(),
            description: func.description().to_string(),
            category: func.category().to_string(),
        })
        .collect()
}
