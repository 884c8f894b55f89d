//! FILENAME: core/engine/src/calculation.rs
//! PURPOSE: The Calculation Engine: evaluates one calculated-field expression.
//! CONTEXT: This is the boundary between the typed evaluator and the form
//! runtime. `try_evaluate` reports the real failure cause; `evaluate` keeps
//! the contract existing forms rely on and turns every failure into null,
//! logging the cause under the CALC category.

use crate::error::{EvalError, EvalResult};
use crate::evaluator::{EvalContext, Evaluator};
use crate::limits::EvalLimits;
use crate::value::{FieldValues, Value};
use chrono::{Local, NaiveDateTime};
use parser::Expression;

/// Which clock date functions read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Clock {
    #[default]
    System,
    Fixed(NaiveDateTime),
}

/// Evaluates calculated-field expressions. Holds no per-call state, so one
/// instance can serve any number of threads.
#[derive(Debug, Clone, Default)]
pub struct CalculationEngine {
    limits: EvalLimits,
    clock: Clock,
}

impl CalculationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: EvalLimits) -> Self {
        CalculationEngine {
            limits,
            clock: Clock::System,
        }
    }

    /// Pins `today()`, `now()` and `age()` to a fixed instant.
    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.clock = Clock::Fixed(now);
        self
    }

    pub fn limits(&self) -> &EvalLimits {
        &self.limits
    }

    /// The instant for one evaluation call. Read once so every date function
    /// in an expression sees the same time.
    fn now(&self) -> NaiveDateTime {
        match self.clock {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(now) => now,
        }
    }

    /// Parses an expression under this engine's length and nesting limits.
    pub fn parse(&self, expression: &str) -> EvalResult<Expression> {
        self.limits.check_expression(expression)?;
        parser::parse_with_max_nesting(expression, self.limits.max_depth).map_err(|err| {
            if err.nesting_exceeded {
                EvalError::LimitExceeded(err.message)
            } else {
                EvalError::Parse(err)
            }
        })
    }

    /// Evaluates an expression, reporting why it failed. A blank expression
    /// is `Ok(Null)`.
    pub fn try_evaluate(&self, expression: &str, values: &FieldValues) -> EvalResult {
        if expression.trim().is_empty() {
            return Ok(Value::Null);
        }

        let ast = self.parse(expression)?;
        self.evaluate_parsed(&ast, values)
    }

    /// Evaluates an already parsed expression.
    pub fn evaluate_parsed(&self, ast: &Expression, values: &FieldValues) -> EvalResult {
        let evaluator = Evaluator::new(EvalContext {
            values,
            limits: &self.limits,
            now: self.now(),
        });
        evaluator.evaluate(ast)
    }

    /// Evaluates an expression. Never fails: any error yields null.
    pub fn evaluate(&self, expression: &str, values: &FieldValues) -> Value {
        match self.try_evaluate(expression, values) {
            Ok(value) => value,
            Err(EvalError::DivisionByZero) => {
                log::debug!(target: "CALC", "division by zero in '{}'", expression);
                Value::Null
            }
            Err(err) => {
                log::warn!(target: "CALC", "evaluation failed for '{}': {}", expression, err);
                Value::Null
            }
        }
    }
}
