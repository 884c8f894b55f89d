//! FILENAME: core/engine/src/form.rs
//! PURPOSE: Form model and the Form-Logic Orchestrator.
//! CONTEXT: A whole-form pass runs every calculated field in form order,
//! feeding each result into the values seen by later fields, and then decides
//! visibility against the original values merged with everything calculated.
//! The pass is synchronous and holds no state between calls.

use crate::calculation::CalculationEngine;
use crate::limits::EvalLimits;
use crate::skip_logic::{LogicRule, SkipLogicEngine};
use crate::value::{FieldValues, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The field type that marks a calculated field.
pub const CALCULATE_TYPE: &str = "calculate";

/// One field of a form definition. Keys this engine does not use are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormField {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_logic: Option<LogicRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant: Option<LogicRule>,
}

impl FormField {
    pub fn new(id: &str, field_type: &str) -> Self {
        FormField {
            id: id.to_string(),
            name: Some(id.to_string()),
            field_type: field_type.to_string(),
            ..Default::default()
        }
    }

    pub fn calculated(id: &str, calculation: &str) -> Self {
        FormField {
            calculation: Some(calculation.to_string()),
            ..FormField::new(id, CALCULATE_TYPE)
        }
    }

    pub fn with_skip_logic(mut self, rule: LogicRule) -> Self {
        self.skip_logic = Some(rule);
        self
    }

    /// The key the field's value is stored under: its name, or its id when
    /// the name is missing or empty.
    pub fn value_key(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }

    /// The calculation to run, if this is a calculated field with a
    /// non-empty expression.
    pub fn calculation_expr(&self) -> Option<&str> {
        if self.field_type != CALCULATE_TYPE {
            return None;
        }
        self.calculation.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn is_calculated(&self) -> bool {
        self.calculation_expr().is_some()
    }

    /// `skip_logic` wins over `relevant`. A blank rule object counts as no rule.
    pub fn visibility_rule(&self) -> Option<&LogicRule> {
        self.skip_logic
            .as_ref()
            .filter(|rule| !rule.is_blank())
            .or_else(|| self.relevant.as_ref().filter(|rule| !rule.is_blank()))
    }
}

/// A form definition as loaded from storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Vec<FormField>,
}

impl FormDefinition {
    pub fn new(fields: Vec<FormField>) -> Self {
        FormDefinition {
            fields,
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.id.as_str())
    }
}

/// Output of one whole-form pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub calculated_values: BTreeMap<String, Value>,
    pub visible_fields: Vec<String>,
    pub hidden_fields: Vec<String>,
}

/// Runs calculations and visibility for a whole form.
#[derive(Debug, Clone, Default)]
pub struct FormLogicProcessor {
    calculator: CalculationEngine,
    skip_logic: SkipLogicEngine,
}

impl FormLogicProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: EvalLimits) -> Self {
        FormLogicProcessor {
            calculator: CalculationEngine::with_limits(limits),
            skip_logic: SkipLogicEngine::new(),
        }
    }

    /// Uses a preconfigured calculation engine (e.g. with a fixed clock).
    pub fn with_calculator(calculator: CalculationEngine) -> Self {
        FormLogicProcessor {
            calculator,
            skip_logic: SkipLogicEngine::new(),
        }
    }

    pub fn calculator(&self) -> &CalculationEngine {
        &self.calculator
    }

    pub fn skip_logic(&self) -> &SkipLogicEngine {
        &self.skip_logic
    }

    /// Runs every calculated field in form order, then evaluates visibility.
    ///
    /// A later calculated field sees the results of earlier ones. A failing
    /// calculation stores null and the pass continues.
    pub fn process_form_logic(&self, form: &FormDefinition, values: &FieldValues) -> EvaluationResult {
        let mut working = values.clone();
        let mut calculated_values = BTreeMap::new();

        for field in &form.fields {
            let Some(expression) = field.calculation_expr() else {
                continue;
            };

            let result = self.calculator.evaluate(expression, &working);
            let key = field.value_key().to_string();
            log::debug!(target: "FORM", "calculated {} = {}", key, result.repr());

            working.insert(key.clone(), result.clone());
            calculated_values.insert(key, result);
        }

        let visible_fields = self.skip_logic.get_visible_fields(&form.fields, &working);

        let visible: HashSet<&str> = visible_fields.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let hidden_fields = form
            .field_ids()
            .filter(|id| !visible.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect();

        EvaluationResult {
            calculated_values,
            visible_fields,
            hidden_fields,
        }
    }
}
