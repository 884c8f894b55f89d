//! FILENAME: core/engine/src/analysis.rs
//! PURPOSE: Static analysis of a form's calculated fields.
//! CONTEXT: Form builders want to know, before anyone fills the form in,
//! whether a calculation reads a field that does not exist, calls an unknown
//! function, reads a calculated field that is only computed later in the
//! form, or takes part in a reference cycle. Nothing here evaluates
//! expressions or changes evaluation order.

use crate::calculation::CalculationEngine;
use crate::dependency_extractor::{called_functions, referenced_fields};
use crate::dependency_graph::DependencyGraph;
use crate::form::FormDefinition;
use crate::limits::EvalLimits;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Findings for one calculated field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldAnalysis {
    pub field_id: String,
    /// The key the result is stored under.
    pub key: String,
    pub expression: String,
    pub references: BTreeSet<String>,
    /// Calculated fields referenced here but computed later in the form.
    /// At evaluation time these read the caller's value, not the computed one.
    pub forward_references: BTreeSet<String>,
    /// Names that are not the key of any field in the form.
    pub unknown_references: BTreeSet<String>,
    pub unknown_functions: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl FieldAnalysis {
    pub fn has_issues(&self) -> bool {
        self.parse_error.is_some()
            || !self.forward_references.is_empty()
            || !self.unknown_references.is_empty()
            || !self.unknown_functions.is_empty()
    }
}

/// Findings for a whole form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormAnalysis {
    pub fields: Vec<FieldAnalysis>,
    /// Each reference cycle among calculated fields, as a path of keys.
    pub cycles: Vec<Vec<String>>,
    /// An order of calculated keys that resolves every reference before it
    /// is read. Absent when the references are cyclic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_order: Option<Vec<String>>,
}

impl FormAnalysis {
    pub fn has_issues(&self) -> bool {
        !self.cycles.is_empty() || self.fields.iter().any(FieldAnalysis::has_issues)
    }
}

pub fn analyze_form(form: &FormDefinition) -> FormAnalysis {
    analyze_form_with_limits(form, &EvalLimits::default())
}

pub fn analyze_form_with_limits(form: &FormDefinition, limits: &EvalLimits) -> FormAnalysis {
    let parser = CalculationEngine::with_limits(limits.clone());

    let known_keys: HashSet<&str> = form.fields.iter().map(|f| f.value_key()).collect();

    // Position of each calculated key in evaluation order. A repeated key
    // keeps its first position: from there on a computed value exists.
    let calculated: Vec<(usize, &str, &str, &str)> = form
        .fields
        .iter()
        .filter_map(|f| f.calculation_expr().map(|expr| (f.id.as_str(), f.value_key(), expr)))
        .enumerate()
        .map(|(pos, (id, key, expr))| (pos, id, key, expr))
        .collect();
    let first_position: HashMap<&str, usize> = calculated
        .iter()
        .rev()
        .map(|&(pos, _, key, _)| (key, pos))
        .collect();

    let mut graph = DependencyGraph::new();
    let mut fields = Vec::with_capacity(calculated.len());

    for &(pos, id, key, expression) in &calculated {
        let mut entry = FieldAnalysis {
            field_id: id.to_string(),
            key: key.to_string(),
            expression: expression.to_string(),
            ..Default::default()
        };

        match parser.parse(expression) {
            Ok(ast) => {
                entry.references = referenced_fields(&ast);
                entry.unknown_functions = called_functions(&ast).unknown;
            }
            Err(err) => entry.parse_error = Some(err.to_string()),
        }

        for name in &entry.references {
            match first_position.get(name.as_str()) {
                Some(&other) if other > pos => {
                    entry.forward_references.insert(name.clone());
                }
                _ => {}
            }
            if !known_keys.contains(name.as_str()) {
                entry.unknown_references.insert(name.clone());
            }
        }

        let calculated_precedents: BTreeSet<String> = entry
            .references
            .iter()
            .filter(|name| first_position.contains_key(name.as_str()))
            .cloned()
            .collect();
        graph.set_dependencies(key, calculated_precedents);

        fields.push(entry);
    }

    let mut seen = HashSet::new();
    let keys: Vec<String> = calculated
        .iter()
        .filter(|(_, _, key, _)| seen.insert(*key))
        .map(|(_, _, key, _)| key.to_string())
        .collect();

    let cycles: Vec<Vec<String>> = graph
        .find_cycles(&keys)
        .into_iter()
        .map(|cycle| cycle.cycle_path)
        .collect();

    for cycle in &cycles {
        log::debug!(target: "FORM", "reference cycle: {}", cycle.join(" -> "));
    }

    FormAnalysis {
        fields,
        suggested_order: graph.topological_sort(&keys).ok(),
        cycles,
    }
}
