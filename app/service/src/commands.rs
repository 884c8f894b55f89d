//! FILENAME: app/service/src/commands.rs
// PURPOSE: Form logic commands - calculation, skip logic, form evaluation and catalogs
// FORMAT: seq|level|category|message

use std::collections::BTreeSet;

use engine::{
    called_functions, function_catalog, operator_catalog, referenced_fields, EvaluationResult,
    FormAnalysis, FunctionInfo, OperatorInfo,
};
use parser::Expression;

use crate::api_types::{
    CalculateRequest, CalculateResponse, EvaluateFormRequest, ValidateExpressionRequest,
    ValidateExpressionResponse, ValidateSkipLogicRequest, ValidateSkipLogicResponse,
};
use crate::error::ServiceError;
use crate::logging::{log_enter, log_exit, log_warn};
use crate::store::FormStore;
use crate::ServiceState;

// ============================================================================
// CALCULATION
// ============================================================================

/// Evaluate one expression. Never fails: evaluation errors give a null result.
pub fn calculate(state: &ServiceState, req: CalculateRequest) -> CalculateResponse {
    log_enter!("CMD", "calculate", "expression={}", req.expression);

    let result = state.processor.calculator().evaluate(&req.expression, &req.values);
    let result_type = result.type_name().to_string();

    log_exit!("CMD", "calculate", "type={}", result_type);
    CalculateResponse {
        expression: req.expression,
        result,
        result_type,
    }
}

/// Check an expression without evaluating it.
///
/// The expression is valid when it parses, calls only built-in functions and,
/// if `known_fields` is given, reads only those fields.
pub fn validate_expression(
    state: &ServiceState,
    req: ValidateExpressionRequest,
) -> ValidateExpressionResponse {
    log_enter!("CMD", "validate_expression", "expression={}", req.expression);

    let ast = match state.processor.calculator().parse(&req.expression) {
        Ok(ast) => ast,
        Err(err) => {
            log_exit!("CMD", "validate_expression", "error={}", err);
            return ValidateExpressionResponse {
                valid: false,
                error: Some(err.to_string()),
                ..Default::default()
            };
        }
    };

    let response = inspect_expression(&ast, req.known_fields.as_deref());

    log_exit!("CMD", "validate_expression", "valid={}", response.valid);
    response
}

fn inspect_expression(ast: &Expression, known_fields: Option<&[String]>) -> ValidateExpressionResponse {
    let references = referenced_fields(ast);
    let unknown_functions: Vec<String> = called_functions(ast).unknown.into_iter().collect();

    let unknown_fields: Vec<String> = match known_fields {
        Some(known) => {
            let known: BTreeSet<&str> = known.iter().map(String::as_str).collect();
            references
                .iter()
                .filter(|name| !known.contains(name.as_str()))
                .cloned()
                .collect()
        }
        None => Vec::new(),
    };

    let error = if !unknown_functions.is_empty() {
        Some(format!("Unknown function: {}", unknown_functions.join(", ")))
    } else if !unknown_fields.is_empty() {
        Some(format!("Unknown field: {}", unknown_fields.join(", ")))
    } else {
        None
    };

    ValidateExpressionResponse {
        valid: error.is_none(),
        error,
        referenced_fields: references.into_iter().collect(),
        unknown_functions,
        unknown_fields,
    }
}

// ============================================================================
// SKIP LOGIC
// ============================================================================

/// Evaluate a visibility rule against a set of values. Echoes the inputs.
pub fn validate_skip_logic(
    state: &ServiceState,
    req: ValidateSkipLogicRequest,
) -> ValidateSkipLogicResponse {
    log_enter!(
        "CMD",
        "validate_skip_logic",
        "conditions={}",
        req.logic.as_ref().map_or(0, |rule| rule.conditions().len())
    );

    let is_visible = state
        .processor
        .skip_logic()
        .evaluate_logic(req.logic.as_ref(), &req.values);

    log_exit!("CMD", "validate_skip_logic", "is_visible={}", is_visible);
    ValidateSkipLogicResponse {
        is_visible,
        logic: req.logic,
        values_used: req.values,
    }
}

// ============================================================================
// FORM EVALUATION
// ============================================================================

/// Load a form and run the whole-form pass over the submitted values.
pub fn evaluate_form(
    state: &ServiceState,
    store: &dyn FormStore,
    req: EvaluateFormRequest,
) -> Result<EvaluationResult, ServiceError> {
    log_enter!("CMD", "evaluate_form", "form_id={} values={}", req.form_id, req.values.len());

    let form = match store.load_form(&req.form_id)? {
        Some(form) => form,
        None => {
            log_warn!("CMD", "evaluate_form: form '{}' not found", req.form_id);
            return Err(ServiceError::FormNotFound(req.form_id));
        }
    };

    let result = state.processor.process_form_logic(&form, &req.values);

    log_exit!(
        "CMD",
        "evaluate_form",
        "calculated={} visible={} hidden={}",
        result.calculated_values.len(),
        result.visible_fields.len(),
        result.hidden_fields.len()
    );
    Ok(result)
}

/// Static analysis of a stored form's calculated fields.
pub fn analyze_form(
    state: &ServiceState,
    store: &dyn FormStore,
    form_id: &str,
) -> Result<FormAnalysis, ServiceError> {
    log_enter!("CMD", "analyze_form", "form_id={}", form_id);

    let form = store
        .load_form(form_id)?
        .ok_or_else(|| ServiceError::FormNotFound(form_id.to_string()))?;

    let analysis = engine::analyze_form_with_limits(&form, &state.limits);

    log_exit!(
        "CMD",
        "analyze_form",
        "fields={} cycles={} issues={}",
        analysis.fields.len(),
        analysis.cycles.len(),
        analysis.has_issues()
    );
    Ok(analysis)
}

// ============================================================================
// CATALOGS
// ============================================================================

/// All skip-logic operators.
pub fn list_operators() -> Vec<OperatorInfo> {
    log_enter!("CMD", "list_operators");
    let operators = operator_catalog();
    log_exit!("CMD", "list_operators", "count={}", operators.len());
    operators
}

/// All built-in calculation functions.
pub fn list_functions() -> Vec<FunctionInfo> {
    log_enter!("CMD", "list_functions");
    let functions = function_catalog();
    log_exit!("CMD", "list_functions", "count={}", functions.len());
    functions
}
