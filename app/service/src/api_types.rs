//! FILENAME: app/service/src/api_types.rs
//! PURPOSE: Request and response types for the form logic commands.
//! CONTEXT: These mirror the JSON bodies the form builder and the data
//! collection clients send. Field values use the engine's `Value`, which
//! deserializes from any JSON value.

use engine::{FieldValues, LogicRule, Value};
use serde::{Deserialize, Serialize};

// ============================================================================
// CALCULATE
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
    #[serde(default)]
    pub values: FieldValues,
}

/// `result` is null for any evaluation failure; `type` names the result type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub expression: String,
    pub result: Value,
    #[serde(rename = "type")]
    pub result_type: String,
}

// ============================================================================
// SKIP LOGIC
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateSkipLogicRequest {
    #[serde(default)]
    pub logic: Option<LogicRule>,
    #[serde(default)]
    pub values: FieldValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateSkipLogicResponse {
    pub is_visible: bool,
    pub logic: Option<LogicRule>,
    pub values_used: FieldValues,
}

// ============================================================================
// FORM EVALUATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluateFormRequest {
    pub form_id: String,
    #[serde(default)]
    pub values: FieldValues,
}

// ============================================================================
// EXPRESSION VALIDATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateExpressionRequest {
    pub expression: String,
    /// Field names the expression may read. When absent, references are
    /// listed but not checked.
    #[serde(default)]
    pub known_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidateExpressionResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub referenced_fields: Vec<String>,
    pub unknown_functions: Vec<String>,
    pub unknown_fields: Vec<String>,
}
