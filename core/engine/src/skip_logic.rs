//! FILENAME: core/engine/src/skip_logic.rs
//! PURPOSE: The Skip-Logic Engine: decides which form fields are visible.
//! CONTEXT: Visibility rules are declarative conditions combined with AND/OR.
//! Every ambiguous or failing condition resolves to "visible": a field that
//! is wrongly shown costs the respondent a moment, a required field that is
//! wrongly hidden loses data.

use crate::error::EvalError;
use crate::form::FormField;
use crate::value::{FieldValues, Value};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// OPERATORS
// ============================================================================

/// Operators a condition can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
    #[serde(rename = "is_empty")]
    IsEmpty,
    #[serde(rename = "is_not_empty")]
    IsNotEmpty,
    #[serde(rename = "selected")]
    Selected,
    #[serde(rename = "not_selected")]
    NotSelected,
}

impl ConditionOperator {
    pub const ALL: [ConditionOperator; 12] = [
        ConditionOperator::Equal,
        ConditionOperator::NotEqual,
        ConditionOperator::GreaterThan,
        ConditionOperator::GreaterEqual,
        ConditionOperator::LessThan,
        ConditionOperator::LessEqual,
        ConditionOperator::Contains,
        ConditionOperator::NotContains,
        ConditionOperator::IsEmpty,
        ConditionOperator::IsNotEmpty,
        ConditionOperator::Selected,
        ConditionOperator::NotSelected,
    ];

    /// The wire name used in form definitions.
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionOperator::Equal => "==",
            ConditionOperator::NotEqual => "!=",
            ConditionOperator::GreaterThan => ">",
            ConditionOperator::GreaterEqual => ">=",
            ConditionOperator::LessThan => "<",
            ConditionOperator::LessEqual => "<=",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "not_contains",
            ConditionOperator::IsEmpty => "is_empty",
            ConditionOperator::IsNotEmpty => "is_not_empty",
            ConditionOperator::Selected => "selected",
            ConditionOperator::NotSelected => "not_selected",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConditionOperator::Equal => "Equals",
            ConditionOperator::NotEqual => "Not equals",
            ConditionOperator::GreaterThan => "Greater than",
            ConditionOperator::GreaterEqual => "Greater than or equal",
            ConditionOperator::LessThan => "Less than",
            ConditionOperator::LessEqual => "Less than or equal",
            ConditionOperator::Contains => "Contains",
            ConditionOperator::NotContains => "Does not contain",
            ConditionOperator::IsEmpty => "Is empty",
            ConditionOperator::IsNotEmpty => "Is not empty",
            ConditionOperator::Selected => "Is selected",
            ConditionOperator::NotSelected => "Is not selected",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConditionOperator::Equal => "Field value equals the given value",
            ConditionOperator::NotEqual => "Field value differs from the given value",
            ConditionOperator::GreaterThan => "Field value is numerically greater",
            ConditionOperator::GreaterEqual => "Field value is numerically greater or equal",
            ConditionOperator::LessThan => "Field value is numerically smaller",
            ConditionOperator::LessEqual => "Field value is numerically smaller or equal",
            ConditionOperator::Contains => "Text contains the value, or list includes it",
            ConditionOperator::NotContains => "Text does not contain the value, or list lacks it",
            ConditionOperator::IsEmpty => "Field has no answer",
            ConditionOperator::IsNotEmpty => "Field has an answer",
            ConditionOperator::Selected => "Option is selected in a choice field",
            ConditionOperator::NotSelected => "Option is not selected in a choice field",
        }
    }

    /// Whether the condition's `value` is consulted.
    pub fn requires_value(self) -> bool {
        !matches!(self, ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty)
    }
}

impl FromStr for ConditionOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unsupported operator '{}'", s))
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RULES
// ============================================================================

/// A single comparison against one field's current value.
///
/// `operator` stays a plain string so an unknown operator survives
/// deserialization and can fail open at evaluation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    /// A non-string field name (`0`, `false`, `{}`) reads as no field.
    #[serde(deserialize_with = "field_name")]
    pub field: Option<String>,
    /// A non-string operator keeps its JSON text, which matches no operator.
    #[serde(deserialize_with = "operator_name")]
    pub operator: Option<String>,
    pub value: Value,
}

fn field_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(name) => Some(name),
        _ => None,
    })
}

fn operator_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(op) => Some(op),
        other => Some(other.to_string()),
    })
}

impl Condition {
    pub fn new(field: &str, operator: ConditionOperator, value: impl Into<Value>) -> Self {
        Condition {
            field: Some(field.to_string()),
            operator: Some(operator.as_str().to_string()),
            value: value.into(),
        }
    }
}

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicType {
    And,
    Or,
}

/// A set of conditions combined with AND (default) or OR.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicRule {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub logic_type: Option<String>,
    /// `None` when the key is absent or null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

impl LogicRule {
    pub fn and(conditions: Vec<Condition>) -> Self {
        LogicRule {
            logic_type: Some("and".to_string()),
            conditions: Some(conditions),
        }
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        LogicRule {
            logic_type: Some("or".to_string()),
            conditions: Some(conditions),
        }
    }

    /// `"or"` in any letter case selects OR; anything else is AND.
    pub fn combinator(&self) -> LogicType {
        match &self.logic_type {
            Some(t) if t.eq_ignore_ascii_case("or") => LogicType::Or,
            _ => LogicType::And,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        self.conditions.as_deref().unwrap_or(&[])
    }

    /// An empty rule object. Treated the same as no rule at all.
    pub fn is_blank(&self) -> bool {
        self.logic_type.is_none() && self.conditions.is_none()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Evaluates visibility rules. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipLogicEngine;

impl SkipLogicEngine {
    pub fn new() -> Self {
        SkipLogicEngine
    }

    /// Evaluates one condition. Never fails: a missing field, an unknown
    /// operator or an error while comparing all yield `true`.
    pub fn evaluate_condition(&self, condition: &Condition, values: &FieldValues) -> bool {
        let field = match condition.field.as_deref() {
            Some(f) if !f.is_empty() => f,
            _ => return true,
        };

        let op_name = condition.operator.as_deref().unwrap_or("==");
        let op = match op_name.parse::<ConditionOperator>() {
            Ok(op) => op,
            Err(msg) => {
                log::warn!(target: "SKIP", "field '{}': {}, keeping visible", field, msg);
                return true;
            }
        };

        let actual = values.get(field).unwrap_or(&Value::Null);
        match apply_operator(op, actual, &condition.value) {
            Ok(result) => result,
            Err(err) => {
                log::warn!(
                    target: "SKIP",
                    "field '{}' {} {}: {}, keeping visible",
                    field,
                    op,
                    condition.value.repr(),
                    err
                );
                true
            }
        }
    }

    /// Evaluates a rule. No rule, or a rule without conditions, is `true`.
    pub fn evaluate_logic(&self, rule: Option<&LogicRule>, values: &FieldValues) -> bool {
        let Some(rule) = rule else {
            return true;
        };

        let conditions = rule.conditions();
        if conditions.is_empty() {
            return true;
        }

        let mut results = conditions
            .iter()
            .map(|condition| self.evaluate_condition(condition, values));

        match rule.combinator() {
            LogicType::Or => results.any(|r| r),
            LogicType::And => results.all(|r| r),
        }
    }

    /// Ids of the visible fields, in form order.
    pub fn get_visible_fields(&self, fields: &[FormField], values: &FieldValues) -> Vec<String> {
        fields
            .iter()
            .filter(|field| self.evaluate_logic(field.visibility_rule(), values))
            .map(|field| field.id.clone())
            .collect()
    }
}

fn apply_operator(op: ConditionOperator, actual: &Value, expected: &Value) -> Result<bool, EvalError> {
    match op {
        ConditionOperator::Equal => Ok(actual.loose_eq(expected)),
        ConditionOperator::NotEqual => Ok(!actual.loose_eq(expected)),
        ConditionOperator::GreaterThan => numeric(actual, expected, |a, b| a > b),
        ConditionOperator::GreaterEqual => numeric(actual, expected, |a, b| a >= b),
        ConditionOperator::LessThan => numeric(actual, expected, |a, b| a < b),
        ConditionOperator::LessEqual => numeric(actual, expected, |a, b| a <= b),
        ConditionOperator::Contains => match actual {
            Value::Str(_) | Value::List(_) => actual.contains_value(expected),
            _ => Ok(false),
        },
        ConditionOperator::NotContains => match actual {
            Value::Str(_) | Value::List(_) => actual.contains_value(expected).map(|found| !found),
            _ => Ok(true),
        },
        ConditionOperator::IsEmpty => Ok(!actual.is_truthy()),
        ConditionOperator::IsNotEmpty => Ok(actual.is_truthy()),
        ConditionOperator::Selected => Ok(is_selected(actual, expected)),
        ConditionOperator::NotSelected => Ok(!is_selected(actual, expected)),
    }
}

/// Numeric comparison. An empty side (null, "", 0, []) is `false`, not an error.
fn numeric(actual: &Value, expected: &Value, cmp: fn(f64, f64) -> bool) -> Result<bool, EvalError> {
    if !actual.is_truthy() || !expected.is_truthy() {
        return Ok(false);
    }
    Ok(cmp(actual.to_float()?, expected.to_float()?))
}

fn is_selected(actual: &Value, option: &Value) -> bool {
    match actual {
        Value::List(items) => items.iter().any(|item| item.loose_eq(option)),
        scalar => scalar.loose_eq(option),
    }
}
