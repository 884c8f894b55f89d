//! FILENAME: tests/test_form_logic_properties.rs
//! Integration tests for the observable behavior of the three engines.

use engine::{
    field_values_from_json, CalculationEngine, Condition, ConditionOperator, FieldValues,
    FormDefinition, FormField, FormLogicProcessor, LogicRule, SkipLogicEngine, Value,
};
use serde_json::json;
use std::collections::HashSet;

fn calc(expression: &str, values: serde_json::Value) -> Value {
    CalculationEngine::new().evaluate(expression, &field_values_from_json(values))
}

// ============================================================================
// CALCULATION ENGINE
// ============================================================================

#[test]
fn test_plain_arithmetic() {
    assert_eq!(calc("10 + 5 * 2", json!({})), Value::Int(20));
}

#[test]
fn test_bmi_example() {
    assert_eq!(
        calc(
            "round(weight / ((height/100)*(height/100)), 1)",
            json!({"weight": 70, "height": 175})
        ),
        Value::Float(22.9)
    );
}

#[test]
fn test_builtin_examples() {
    assert_eq!(calc("sqrt(16)", json!({})), Value::Float(4.0));
    assert_eq!(calc("min(5,3,8)", json!({})), Value::Int(3));
    assert_eq!(calc("max(5,3,8)", json!({})), Value::Int(8));
}

#[test]
fn test_errors_never_escape() {
    assert_eq!(calc("1/0", json!({})), Value::Null);
    assert_eq!(calc("not_a_function()", json!({})), Value::Null);
    assert_eq!(calc("unknown_field * 2", json!({})), Value::Null);
    assert_eq!(calc("'a' - 1", json!({})), Value::Null);
    assert_eq!(calc("((", json!({})), Value::Null);
    assert_eq!(calc("", json!({})), Value::Null);
}

#[test]
fn test_prefix_named_fields_do_not_collide() {
    assert_eq!(
        calc("average_age + 1", json!({"age": 5, "average_age": 10})),
        Value::Int(11)
    );
    assert_eq!(
        calc("age + average_age", json!({"age": 5, "average_age": 10})),
        Value::Int(15)
    );
}

#[test]
fn test_string_values_with_quotes() {
    assert_eq!(
        calc("concat(name, ' says ', quote)", json!({"name": "O'Neil", "quote": "\"hi\""})),
        Value::from("O'Neil says \"hi\"")
    );
}

#[test]
fn test_if_is_not_an_alias_for_iif() {
    assert_eq!(calc("if(1 > 0, 'a', 'b')", json!({})), Value::Null);
    assert_eq!(calc("iif(1 > 0, 'a', 'b')", json!({})), Value::from("a"));
    assert_eq!(calc("'a' if 1 > 0 else 'b'", json!({})), Value::from("a"));
}

#[test]
fn test_multi_select_values() {
    let values = json!({"symptoms": ["fever", "cough"]});
    assert_eq!(calc("count_selected(symptoms)", values.clone()), Value::Int(2));
    assert_eq!(calc("selected(symptoms, 'fever')", values.clone()), Value::Bool(true));
    assert_eq!(calc("'rash' in symptoms", values), Value::Bool(false));
}

#[test]
fn test_null_values_are_usable() {
    assert_eq!(calc("coalesce(nickname, name)", json!({"nickname": null, "name": "Ann"})), Value::from("Ann"));
    assert_eq!(calc("nickname == None", json!({"nickname": null})), Value::Bool(true));
}

// ============================================================================
// SKIP-LOGIC ENGINE
// ============================================================================

#[test]
fn test_condition_equality() {
    let engine = SkipLogicEngine::new();
    let condition = Condition::new("gender", ConditionOperator::Equal, "male");

    assert!(engine.evaluate_condition(&condition, &field_values_from_json(json!({"gender": "male"}))));
    assert!(!engine.evaluate_condition(&condition, &field_values_from_json(json!({"gender": "female"}))));
}

#[test]
fn test_unknown_operator_fails_open() {
    let engine = SkipLogicEngine::new();
    let condition: Condition =
        serde_json::from_value(json!({"field": "x", "operator": "unknown_op", "value": 1})).unwrap();
    assert!(engine.evaluate_condition(&condition, &field_values_from_json(json!({"x": 1}))));
}

fn sample_conditions() -> Vec<Condition> {
    vec![
        Condition::new("a", ConditionOperator::Equal, 1i64),
        Condition::new("a", ConditionOperator::GreaterThan, 5i64),
        Condition::new("b", ConditionOperator::Contains, "x"),
        Condition::new("c", ConditionOperator::IsEmpty, Value::Null),
        Condition::new("a", ConditionOperator::LessEqual, "not a number"),
    ]
}

fn sample_values() -> Vec<FieldValues> {
    vec![
        field_values_from_json(json!({})),
        field_values_from_json(json!({"a": 1, "b": "xyz"})),
        field_values_from_json(json!({"a": 10, "b": "abc", "c": "filled"})),
        field_values_from_json(json!({"a": "7", "b": ["x"], "c": ""})),
    ]
}

#[test]
fn test_and_or_laws() {
    let engine = SkipLogicEngine::new();
    let conditions = sample_conditions();

    for values in sample_values() {
        for a in &conditions {
            for b in &conditions {
                let ca = engine.evaluate_condition(a, &values);
                let cb = engine.evaluate_condition(b, &values);

                let and_rule = LogicRule::and(vec![a.clone(), b.clone()]);
                let or_rule = LogicRule::or(vec![a.clone(), b.clone()]);

                assert_eq!(engine.evaluate_logic(Some(&and_rule), &values), ca && cb);
                assert_eq!(engine.evaluate_logic(Some(&or_rule), &values), ca || cb);
            }
        }
    }
}

#[test]
fn test_empty_conditions_law() {
    let engine = SkipLogicEngine::new();
    for values in sample_values() {
        assert!(engine.evaluate_logic(Some(&LogicRule::and(vec![])), &values));
        assert!(engine.evaluate_logic(Some(&LogicRule::or(vec![])), &values));
        assert!(engine.evaluate_logic(None, &values));
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

fn sample_form() -> FormDefinition {
    let rule = |field: &str, op: ConditionOperator, value: Value| {
        LogicRule::and(vec![Condition::new(field, op, value)])
    };

    FormDefinition::new(vec![
        FormField::new("price", "decimal"),
        FormField::new("qty", "integer"),
        FormField::calculated("total", "price * qty"),
        FormField::calculated("tax", "total * 0.1"),
        FormField::new("discount_code", "text")
            .with_skip_logic(rule("total", ConditionOperator::GreaterEqual, Value::Int(100))),
        FormField::new("notes", "text")
            .with_skip_logic(rule("qty", ConditionOperator::IsNotEmpty, Value::Null)),
    ])
}

#[test]
fn test_calculated_fields_see_earlier_results() {
    let values = field_values_from_json(json!({"price": 10, "qty": 3}));
    let result = FormLogicProcessor::new().process_form_logic(&sample_form(), &values);

    assert_eq!(result.calculated_values["total"], Value::Int(30));
    let Value::Float(tax) = result.calculated_values["tax"] else {
        panic!("tax should be a float");
    };
    assert!((tax - 3.0).abs() < 1e-9);
    assert_eq!(result.hidden_fields, vec!["discount_code"]);
}

#[test]
fn test_processing_is_idempotent() {
    let processor = FormLogicProcessor::new();
    let form = sample_form();
    let values = field_values_from_json(json!({"price": 50, "qty": 4}));

    let first = processor.process_form_logic(&form, &values);
    let second = processor.process_form_logic(&form, &values);
    assert_eq!(first, second);
}

#[test]
fn test_visible_and_hidden_partition_all_fields() {
    let processor = FormLogicProcessor::new();
    let form = sample_form();
    let all: HashSet<String> = form.field_ids().map(str::to_string).collect();

    for values in [
        json!({}),
        json!({"price": 50, "qty": 4}),
        json!({"price": "abc", "qty": null}),
    ] {
        let result = processor.process_form_logic(&form, &field_values_from_json(values));
        let visible: HashSet<String> = result.visible_fields.iter().cloned().collect();
        let hidden: HashSet<String> = result.hidden_fields.iter().cloned().collect();

        assert!(visible.is_disjoint(&hidden));
        assert_eq!(&visible | &hidden, all);
    }
}

#[test]
fn test_caller_values_are_not_modified() {
    let values = field_values_from_json(json!({"price": 10, "qty": 3, "total": 999}));
    let snapshot = values.clone();
    let result = FormLogicProcessor::new().process_form_logic(&sample_form(), &values);

    assert_eq!(values, snapshot);
    // The computed total replaces the caller's stale one
    assert_eq!(result.calculated_values["total"], Value::Int(30));
}

#[test]
fn test_result_serializes_to_wire_shape() {
    let values = field_values_from_json(json!({"price": 10, "qty": 3}));
    let result = FormLogicProcessor::new().process_form_logic(&sample_form(), &values);
    let wire = serde_json::to_value(&result).unwrap();

    assert_eq!(wire["calculated_values"]["total"], json!(30));
    assert_eq!(wire["visible_fields"][0], json!("price"));
    assert_eq!(wire["hidden_fields"], json!(["discount_code"]));
}
