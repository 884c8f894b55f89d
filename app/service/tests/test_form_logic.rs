//! FILENAME: tests/test_form_logic.rs
//! Integration tests for form evaluation, analysis and catalog commands.

mod common;

use common::{sample_order_form, values, TestHarness};
use engine::{FormDefinition, FormField, Value};
use serde_json::json;
use service_lib::{
    analyze_form, evaluate_form, list_functions, list_operators, EvaluateFormRequest, FormStore,
    ServiceError,
};

fn evaluate(harness: &TestHarness, form_id: &str, vals: serde_json::Value) -> Result<engine::EvaluationResult, ServiceError> {
    evaluate_form(
        &harness.state,
        &harness.store,
        EvaluateFormRequest {
            form_id: form_id.to_string(),
            values: values(vals),
        },
    )
}

// ============================================================================
// EVALUATE FORM
// ============================================================================

#[test]
fn test_small_order() {
    let harness = TestHarness::with_sample_form();
    let result = evaluate(&harness, "order", json!({"price": 10, "qty": 3})).unwrap();

    assert_eq!(result.calculated_values["total"], Value::Int(30));
    assert_eq!(result.calculated_values["tax"], Value::Float(6.0));
    assert_eq!(result.visible_fields, vec!["f_price", "f_qty", "f_total", "f_tax"]);
    assert_eq!(result.hidden_fields, vec!["f_bulk", "f_gift"]);
}

#[test]
fn test_large_order_shows_conditional_fields() {
    let harness = TestHarness::with_sample_form();
    let result = evaluate(&harness, "order", json!({"price": 20, "qty": 12})).unwrap();

    assert_eq!(result.calculated_values["total"], Value::Int(240));
    assert!(result.visible_fields.contains(&"f_bulk".to_string()));
    assert!(result.visible_fields.contains(&"f_gift".to_string()));
    assert!(result.hidden_fields.is_empty());
}

#[test]
fn test_failed_calculation_is_null_and_keeps_dependents_visible() {
    let harness = TestHarness::with_sample_form();
    let result = evaluate(&harness, "order", json!({"price": "abc", "qty": 2})).unwrap();

    // "abc" * 2 repeats the string, so total is text and tax fails
    assert_eq!(result.calculated_values["total"], Value::from("abcabc"));
    assert_eq!(result.calculated_values["tax"], Value::Null);
    // Comparing text numerically fails open
    assert!(result.visible_fields.contains(&"f_bulk".to_string()));
}

#[test]
fn test_missing_form_is_an_error() {
    let harness = TestHarness::new();
    let err = evaluate(&harness, "nope", json!({})).unwrap_err();
    assert!(matches!(err, ServiceError::FormNotFound(ref id) if id == "nope"));
}

#[test]
fn test_result_wire_shape() {
    let harness = TestHarness::with_sample_form();
    let result = evaluate(&harness, "order", json!({"price": 10, "qty": 3})).unwrap();
    let wire = serde_json::to_value(&result).unwrap();

    assert_eq!(wire["calculated_values"], json!({"tax": 6.0, "total": 30}));
    assert_eq!(wire["hidden_fields"], json!(["f_bulk", "f_gift"]));
}

// ============================================================================
// STORE
// ============================================================================

#[test]
fn test_store_round_trip() {
    let harness = TestHarness::new();
    harness.add_form("order", sample_order_form());

    let loaded = harness.store.load_form("order").unwrap().unwrap();
    assert_eq!(loaded, sample_order_form());
}

// ============================================================================
// ANALYSIS
// ============================================================================

#[test]
fn test_analyze_sample_form_is_clean() {
    let harness = TestHarness::with_sample_form();
    let analysis = analyze_form(&harness.state, &harness.store, "order").unwrap();

    assert!(!analysis.has_issues());
    assert_eq!(
        analysis.suggested_order,
        Some(vec!["total".to_string(), "tax".to_string()])
    );
}

#[test]
fn test_analyze_reports_cycle() {
    let harness = TestHarness::new();
    harness.add_form(
        "loop",
        FormDefinition::new(vec![
            FormField::calculated("a", "b + 1"),
            FormField::calculated("b", "a + 1"),
        ]),
    );

    let analysis = analyze_form(&harness.state, &harness.store, "loop").unwrap();
    assert_eq!(analysis.cycles.len(), 1);
    assert!(analysis.has_issues());
}

#[test]
fn test_analyze_missing_form() {
    let harness = TestHarness::new();
    assert!(matches!(
        analyze_form(&harness.state, &harness.store, "nope"),
        Err(ServiceError::FormNotFound(_))
    ));
}

// ============================================================================
// CATALOGS
// ============================================================================

#[test]
fn test_list_operators() {
    let operators = list_operators();
    assert_eq!(operators.len(), 12);
    assert_eq!(operators[0].name, "==");
}

#[test]
fn test_list_functions_covers_core_set() {
    let functions = list_functions();
    for name in ["round", "sqrt", "iif", "concat", "today", "age", "count_selected"] {
        assert!(functions.iter().any(|f| f.name == name), "missing {}", name);
    }
}
