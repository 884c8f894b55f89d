//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the form logic engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.
//!
//! The engine has three cooperating parts:
//! - `calculation`: evaluates one calculated-field expression (null on failure)
//! - `skip_logic`: evaluates visibility conditions (visible on failure)
//! - `form`: runs both over a whole form definition

pub mod analysis;
pub mod calculation;
pub mod catalog;
pub mod dependency_extractor;
pub mod dependency_graph;
pub mod error;
pub mod evaluator;
pub mod form;
pub mod functions;
pub mod limits;
pub mod skip_logic;
pub mod value;

// Re-export commonly used types at the crate root
pub use analysis::{analyze_form, analyze_form_with_limits, FieldAnalysis, FormAnalysis};
pub use calculation::CalculationEngine;
pub use catalog::{function_catalog, operator_catalog, FunctionInfo, OperatorInfo};
pub use dependency_extractor::{called_functions, referenced_fields, FunctionCalls};
pub use dependency_graph::{CycleError, DependencyGraph};
pub use error::{EvalError, EvalResult};
pub use evaluator::{EvalContext, Evaluator};
pub use form::{EvaluationResult, FormDefinition, FormField, FormLogicProcessor, CALCULATE_TYPE};
pub use functions::BuiltinFunction;
pub use limits::EvalLimits;
pub use skip_logic::{Condition, ConditionOperator, LogicRule, LogicType, SkipLogicEngine};
pub use value::{field_values_from_json, FieldValues, Value};
