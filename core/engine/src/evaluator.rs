//! FILENAME: core/engine/src/evaluator.rs
//! PURPOSE: Evaluates expression ASTs against a field value map.
//! CONTEXT: After a formula is parsed into an AST, this module traverses
//! the tree and computes the final result. Identifiers are looked up directly
//! in the value map; nothing is substituted into the source text, so field
//! names that prefix each other (age / average_age) and values containing
//! quotes need no special handling.
//!
//! SUPPORTED FEATURES:
//! - Literal evaluation: integers, floats, strings, booleans, None, lists
//! - Field lookup (unknown names are an error)
//! - Arithmetic: + - * / // % ** with int/float promotion
//! - Comparison chains, membership (in / not in)
//! - Short-circuit and/or, not, conditional expressions
//! - Built-in function calls (see functions.rs)

use crate::error::{EvalError, EvalResult};
use crate::functions::BuiltinFunction;
use crate::limits::EvalLimits;
use crate::value::{FieldValues, Number, Value};
use chrono::NaiveDateTime;
use parser::{BinaryOperator, ComparisonOperator, Expression, LogicalOperator, UnaryOperator};
use std::cmp::Ordering;

/// Per-call evaluation context: the values in scope, the bounds to enforce,
/// and the instant date functions read.
pub struct EvalContext<'a> {
    pub values: &'a FieldValues,
    pub limits: &'a EvalLimits,
    pub now: NaiveDateTime,
}

/// The expression evaluator.
pub struct Evaluator<'a> {
    ctx: EvalContext<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: EvalContext<'a>) -> Self {
        Evaluator { ctx }
    }

    pub fn context(&self) -> &EvalContext<'a> {
        &self.ctx
    }

    /// Evaluates an AST expression and returns the result.
    pub fn evaluate(&self, expr: &Expression) -> EvalResult {
        match expr {
            Expression::Literal(value) => Ok(eval_literal(value)),
            Expression::Identifier(name) => self.eval_identifier(name),
            Expression::List(items) => self.eval_list(items),
            Expression::BinaryOp { left, op, right } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                binary_op(*op, &left_val, &right_val, self.ctx.limits)
            }
            Expression::UnaryOp { op, operand } => self.eval_unary_op(*op, operand),
            Expression::Comparison { first, rest } => self.eval_comparison(first, rest),
            Expression::Logical { op, left, right } => self.eval_logical(*op, left, right),
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expression::FunctionCall { name, args } => self.eval_function(name, args),
        }
    }

    fn eval_identifier(&self, name: &str) -> EvalResult {
        let value = self
            .ctx
            .values
            .get(name)
            .ok_or_else(|| EvalError::UnknownIdentifier(name.to_string()))?;

        if let Value::List(items) = value {
            self.ctx.limits.check_list(items.len())?;
        }
        Ok(value.clone())
    }

    fn eval_list(&self, items: &[Expression]) -> EvalResult {
        self.ctx.limits.check_list(items.len())?;
        let values = items
            .iter()
            .map(|item| self.evaluate(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(values))
    }

    fn eval_unary_op(&self, op: UnaryOperator, operand: &Expression) -> EvalResult {
        let value = self.evaluate(operand)?;

        match op {
            UnaryOperator::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOperator::Plus => match value.as_number() {
                Some(n) => Ok(number_value(n)),
                None => Err(bad_unary("+", &value)),
            },
            UnaryOperator::Negate => match value.as_number() {
                Some(Number::Int(n)) => Ok(n
                    .checked_neg()
                    .map(Value::Int)
                    .unwrap_or(Value::Float(-(n as f64)))),
                Some(Number::Float(f)) => Ok(Value::Float(-f)),
                None => Err(bad_unary("-", &value)),
            },
        }
    }

    /// Evaluates `a op1 b op2 c` as `a op1 b and b op2 c`, evaluating each
    /// operand at most once and stopping at the first false link.
    fn eval_comparison(
        &self,
        first: &Expression,
        rest: &[(ComparisonOperator, Expression)],
    ) -> EvalResult {
        let mut left = self.evaluate(first)?;

        for (op, right_expr) in rest {
            let right = self.evaluate(right_expr)?;
            if !compare(*op, &left, &right)? {
                return Ok(Value::Bool(false));
            }
            left = right;
        }

        Ok(Value::Bool(true))
    }

    /// `and`/`or` yield one of their operands, not a coerced boolean.
    fn eval_logical(
        &self,
        op: LogicalOperator,
        left: &Expression,
        right: &Expression,
    ) -> EvalResult {
        let left_val = self.evaluate(left)?;

        let short_circuits = match op {
            LogicalOperator::And => !left_val.is_truthy(),
            LogicalOperator::Or => left_val.is_truthy(),
        };

        if short_circuits {
            Ok(left_val)
        } else {
            self.evaluate(right)
        }
    }

    /// Resolves the function name against the built-in table, evaluates all
    /// arguments eagerly, then dispatches.
    fn eval_function(&self, name: &str, args: &[Expression]) -> EvalResult {
        let func = BuiltinFunction::from_name(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;

        let arg_values = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;

        func.call(&arg_values, &self.ctx)
    }
}

fn eval_literal(value: &parser::Value) -> Value {
    match value {
        parser::Value::Integer(n) => Value::Int(*n),
        parser::Value::Float(f) => Value::Float(*f),
        parser::Value::String(s) => Value::Str(s.clone()),
        parser::Value::Boolean(b) => Value::Bool(*b),
        parser::Value::Null => Value::Null,
    }
}

fn number_value(n: Number) -> Value {
    match n {
        Number::Int(i) => Value::Int(i),
        Number::Float(f) => Value::Float(f),
    }
}

fn bad_unary(op: &str, value: &Value) -> EvalError {
    EvalError::Type(format!("bad operand type for unary {}: '{}'", op, value.type_name()))
}

fn unsupported(op: impl std::fmt::Display, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

// ============================================================================
// ARITHMETIC
// ============================================================================

/// Applies an arithmetic operator. Shared with the built-in functions
/// (sum uses `+`, pow uses `**`).
pub(crate) fn binary_op(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    limits: &EvalLimits,
) -> EvalResult {
    match op {
        BinaryOperator::Add => add(left, right, limits),
        BinaryOperator::Subtract => numeric(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOperator::Multiply => multiply(left, right, limits),
        BinaryOperator::Divide => divide(left, right),
        BinaryOperator::FloorDivide => floor_divide(left, right),
        BinaryOperator::Modulo => modulo(left, right),
        BinaryOperator::Power => power(left, right),
    }
}

/// Integer arithmetic that overflows falls back to float arithmetic.
fn numeric(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    match (left.as_number(), right.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(int_op(a, b)
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(float_op(a as f64, b as f64)))),
        (Some(a), Some(b)) => Ok(Value::Float(float_op(a.as_f64(), b.as_f64()))),
        _ => Err(unsupported(op, left, right)),
    }
}

fn add(left: &Value, right: &Value, limits: &EvalLimits) -> EvalResult {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => {
            limits.check_string(a.chars().count() + b.chars().count())?;
            Ok(Value::Str(format!("{}{}", a, b)))
        }
        (Value::List(a), Value::List(b)) => {
            limits.check_list(a.len() + b.len())?;
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => numeric(BinaryOperator::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Numbers multiply; a string or list times an integer repeats it.
fn multiply(left: &Value, right: &Value, limits: &EvalLimits) -> EvalResult {
    let repeat = |seq: &Value, count: i64| -> EvalResult {
        let count = count.max(0) as usize;
        match seq {
            Value::Str(s) => {
                limits.check_string(s.chars().count().saturating_mul(count))?;
                Ok(Value::Str(s.repeat(count)))
            }
            Value::List(items) => {
                limits.check_list(items.len().saturating_mul(count))?;
                Ok(Value::List(
                    std::iter::repeat(items.iter().cloned())
                        .take(count)
                        .flatten()
                        .collect(),
                ))
            }
            _ => Err(unsupported(BinaryOperator::Multiply, left, right)),
        }
    };

    match (left, right) {
        (Value::Str(_) | Value::List(_), n) | (n, Value::Str(_) | Value::List(_)) => {
            let seq = if matches!(left, Value::Str(_) | Value::List(_)) {
                left
            } else {
                right
            };
            match n.as_number() {
                Some(Number::Int(count)) => repeat(seq, count),
                _ => Err(unsupported(BinaryOperator::Multiply, left, right)),
            }
        }
        _ => numeric(BinaryOperator::Multiply, left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn numeric_pair(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<(Number, Number)> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(unsupported(op, left, right)),
    }
}

/// True division always produces a float.
fn divide(left: &Value, right: &Value) -> EvalResult {
    let (a, b) = numeric_pair(BinaryOperator::Divide, left, right)?;
    if b.as_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::Float(a.as_f64() / b.as_f64()))
}

fn floor_divide(left: &Value, right: &Value) -> EvalResult {
    match numeric_pair(BinaryOperator::FloorDivide, left, right)? {
        (_, b) if b.as_f64() == 0.0 => Err(EvalError::DivisionByZero),
        (Number::Int(a), Number::Int(b)) => match (a.checked_div(b), a.checked_rem(b)) {
            (Some(q), Some(r)) => {
                // Round toward negative infinity
                let adjust = r != 0 && ((r < 0) != (b < 0));
                Ok(Value::Int(if adjust { q - 1 } else { q }))
            }
            _ => Ok(Value::Float((a as f64 / b as f64).floor())),
        },
        (a, b) => Ok(Value::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

/// The remainder takes the sign of the divisor.
fn modulo(left: &Value, right: &Value) -> EvalResult {
    match numeric_pair(BinaryOperator::Modulo, left, right)? {
        (_, b) if b.as_f64() == 0.0 => Err(EvalError::DivisionByZero),
        (Number::Int(a), Number::Int(b)) => {
            let r = a.checked_rem(b).unwrap_or(0);
            Ok(Value::Int(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }))
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let r = a % b;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }))
        }
    }
}

pub(crate) fn power(left: &Value, right: &Value) -> EvalResult {
    match numeric_pair(BinaryOperator::Power, left, right)? {
        (Number::Int(a), Number::Int(b)) if b >= 0 => {
            let exact = u32::try_from(b).ok().and_then(|e| a.checked_pow(e));
            match exact {
                Some(n) => Ok(Value::Int(n)),
                None => float_power(a as f64, b as f64),
            }
        }
        (a, b) => float_power(a.as_f64(), b.as_f64()),
    }
}

fn float_power(base: f64, exponent: f64) -> EvalResult {
    if base == 0.0 && exponent < 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    if base < 0.0 && exponent.fract() != 0.0 {
        return Err(EvalError::Value(
            "negative number cannot be raised to a fractional power".to_string(),
        ));
    }
    let result = base.powf(exponent);
    if result.is_infinite() && base.is_finite() && exponent.is_finite() {
        return Err(EvalError::Value("numerical result out of range".to_string()));
    }
    Ok(Value::Float(result))
}

// ============================================================================
// COMPARISON
// ============================================================================

/// Orders two values. Numbers order with numbers, strings with strings and
/// lists lexicographically; anything else is a type error. `None` means the
/// values are unordered (NaN involved).
pub(crate) fn order(op: &str, left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !x.loose_eq(y) {
                    return order(op, x, y);
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
            _ => Err(EvalError::Type(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op,
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

/// Applies a single comparison operator.
pub(crate) fn compare(op: ComparisonOperator, left: &Value, right: &Value) -> EvalResult<bool> {
    let symbol = op.to_string();
    match op {
        ComparisonOperator::Equal => Ok(left.loose_eq(right)),
        ComparisonOperator::NotEqual => Ok(!left.loose_eq(right)),
        ComparisonOperator::In => right.contains_value(left),
        ComparisonOperator::NotIn => right.contains_value(left).map(|found| !found),
        ComparisonOperator::LessThan => Ok(order(&symbol, left, right)? == Some(Ordering::Less)),
        ComparisonOperator::GreaterThan => {
            Ok(order(&symbol, left, right)? == Some(Ordering::Greater))
        }
        ComparisonOperator::LessEqual => Ok(matches!(
            order(&symbol, left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        ComparisonOperator::GreaterEqual => Ok(matches!(
            order(&symbol, left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn eval_with(source: &str, values: &FieldValues) -> EvalResult {
        let limits = EvalLimits::default();
        let now = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let expr = parser::parse(source)?;
        Evaluator::new(EvalContext {
            values,
            limits: &limits,
            now,
        })
        .evaluate(&expr)
    }

    fn eval(source: &str) -> EvalResult {
        eval_with(source, &FieldValues::new())
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(eval("10 + 5 * 2").unwrap(), Value::Int(20));
        assert_eq!(eval("2 ** 10").unwrap(), Value::Int(1024));
        assert_eq!(eval("7 // 2").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_true_division_is_float() {
        assert_eq!(eval("10 / 4").unwrap(), Value::Float(2.5));
        assert_eq!(eval("10 / 5").unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(eval("-7 // 2").unwrap(), Value::Int(-4));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Int(2));
        assert_eq!(eval("7 % -3").unwrap(), Value::Int(-2));
        assert_eq!(eval("7.5 // 2").unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_division_by_zero_variants() {
        assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1 // 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1 % 0.0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("0 ** -1"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        assert_eq!(
            eval("9223372036854775807 + 1").unwrap(),
            Value::Float(9223372036854775808.0)
        );
        assert!(matches!(eval("2 ** 100").unwrap(), Value::Float(_)));
    }

    #[test]
    fn test_negative_exponent_and_fractional_power() {
        assert_eq!(eval("2 ** -1").unwrap(), Value::Float(0.5));
        assert!(matches!(eval("(-8) ** 0.5"), Err(EvalError::Value(_))));
    }

    #[test]
    fn test_booleans_are_numbers_in_arithmetic() {
        assert_eq!(eval("True + True").unwrap(), Value::Int(2));
        assert_eq!(eval("-True").unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_string_and_list_concatenation() {
        assert_eq!(eval("'ab' + 'cd'").unwrap(), Value::from("abcd"));
        assert_eq!(eval("'ab' * 3").unwrap(), Value::from("ababab"));
        assert_eq!(
            eval("[1] + [2]").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert!(matches!(eval("'a' + 1"), Err(EvalError::Type(_))));
        assert!(matches!(eval("'a' * 1.5"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_repetition_respects_limits() {
        assert!(matches!(eval("'abc' * 100000"), Err(EvalError::LimitExceeded(_))));
        assert!(matches!(eval("[0] * 100000"), Err(EvalError::LimitExceeded(_))));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("'a' == 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("'abc' < 'abd'").unwrap(), Value::Bool(true));
        assert_eq!(eval("[1, 2] < [1, 3]").unwrap(), Value::Bool(true));
        assert!(matches!(eval("'a' < 1"), Err(EvalError::Type(_))));
        assert!(matches!(eval("None < 1"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_comparison_chain_short_circuits() {
        assert_eq!(eval("1 < 2 < 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("3 > 2 > 2").unwrap(), Value::Bool(false));
        // The failing first link stops evaluation before the type error
        assert_eq!(eval("2 < 1 < 'x'").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_membership() {
        assert_eq!(eval("'age' in 'average'").unwrap(), Value::Bool(true));
        assert_eq!(eval("2 not in [1, 2]").unwrap(), Value::Bool(false));
        assert!(matches!(eval("1 in 5"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(eval("0 or 'fallback'").unwrap(), Value::from("fallback"));
        assert_eq!(eval("'' and missing").unwrap(), Value::from(""));
        assert_eq!(eval("not []").unwrap(), Value::Bool(true));
        // Right side never evaluated
        assert_eq!(eval("True or missing").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_conditional_only_evaluates_chosen_branch() {
        assert_eq!(eval("'yes' if 1 > 0 else 1 / 0").unwrap(), Value::from("yes"));
        assert_eq!(eval("1 / 0 if False else 'no'").unwrap(), Value::from("no"));
    }

    #[test]
    fn test_identifier_lookup() {
        let mut values = FieldValues::new();
        values.insert("age".to_string(), Value::Int(5));
        values.insert("average_age".to_string(), Value::Int(10));

        assert_eq!(eval_with("average_age + 1", &values).unwrap(), Value::Int(11));
        assert_eq!(eval_with("age + average_age", &values).unwrap(), Value::Int(15));
        assert_eq!(
            eval_with("ages", &values),
            Err(EvalError::UnknownIdentifier("ages".to_string()))
        );
    }

    #[test]
    fn test_quotes_in_values_are_harmless() {
        let mut values = FieldValues::new();
        values.insert("name".to_string(), Value::from("O'Brien"));
        assert_eq!(eval_with("name + '!'", &values).unwrap(), Value::from("O'Brien!"));
    }

    #[test]
    fn test_oversized_list_field_is_rejected() {
        let mut values = FieldValues::new();
        values.insert("big".to_string(), Value::List(vec![Value::Null; 10_001]));
        assert!(matches!(eval_with("len(big)", &values), Err(EvalError::LimitExceeded(_))));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval("not_a_function()"),
            Err(EvalError::UnknownFunction("not_a_function".to_string()))
        );
    }
}
