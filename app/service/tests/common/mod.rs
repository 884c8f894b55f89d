//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for form service integration tests.

#![allow(dead_code)]

use engine::{field_values_from_json, FieldValues, FormDefinition};
use serde_json::json;
use service_lib::{create_service_state, InMemoryFormStore, ServiceConfig, ServiceState};

/// Test harness holding service state and a form store.
pub struct TestHarness {
    pub state: ServiceState,
    pub store: InMemoryFormStore,
}

impl TestHarness {
    /// Create a new test harness with default configuration and no forms.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        TestHarness {
            state: create_service_state(&config),
            store: InMemoryFormStore::new(),
        }
    }

    /// Create a harness with the sample order form stored as "order".
    pub fn with_sample_form() -> Self {
        let harness = Self::new();
        harness.add_form("order", sample_order_form());
        harness
    }

    pub fn add_form(&self, form_id: &str, form: FormDefinition) {
        self.store.insert(form_id, form).unwrap();
    }
}

/// Build field values from a JSON object.
pub fn values(json: serde_json::Value) -> FieldValues {
    field_values_from_json(json)
}

/// Order form: two inputs, two chained calculations, one conditional note
/// and one field gated through the legacy `relevant` key.
pub fn sample_order_form() -> FormDefinition {
    serde_json::from_value(json!({
        "id": "order",
        "name": "Order",
        "fields": [
            {"id": "f_price", "name": "price", "type": "decimal", "label": "Unit price"},
            {"id": "f_qty", "name": "qty", "type": "integer", "required": true},
            {"id": "f_total", "name": "total", "type": "calculate", "calculation": "price * qty"},
            {"id": "f_tax", "name": "tax", "type": "calculate", "calculation": "round(total * 0.2, 2)"},
            {"id": "f_bulk", "name": "bulk_reason", "type": "text",
             "skip_logic": {"type": "and", "conditions": [
                {"field": "total", "operator": ">=", "value": 100}
             ]}},
            {"id": "f_gift", "name": "gift_note", "type": "text",
             "relevant": {"type": "or", "conditions": [
                {"field": "qty", "operator": ">", "value": 10},
                {"field": "price", "operator": ">", "value": 500}
             ]}}
        ]
    }))
    .unwrap()
}
