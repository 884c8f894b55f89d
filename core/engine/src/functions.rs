//! FILENAME: core/engine/src/functions.rs
//! PURPOSE: The fixed table of built-in functions available to form expressions.
//! CONTEXT: Function names are resolved to a `BuiltinFunction` variant and
//! dispatched by `match`. Form authors cannot add to this table. The same enum
//! drives the function catalog shown in the form builder, so the two cannot
//! drift apart.

use crate::error::{EvalError, EvalResult};
use crate::evaluator::{self, EvalContext};
use crate::value::{Number, Value};
use chrono::{Datelike, NaiveDate, Timelike};
use parser::{BinaryOperator, ComparisonOperator};
use std::cmp::Ordering;

/// Built-in functions callable from calculated-field expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinFunction {
    // Math
    Abs,
    Round,
    Min,
    Max,
    Sum,
    Sqrt,
    Pow,
    Floor,
    Ceil,

    // Conversion
    Len,
    Int,
    Float,
    Str,

    // Date
    Today,
    Now,
    Year,
    Month,
    Day,
    Age,

    // Logic
    Iif,
    Coalesce,

    // Text
    Concat,
    Upper,
    Lower,
    Contains,

    // Choice fields
    Selected,
    CountSelected,

    // Comparison helpers
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
    Ne,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 33] = [
        BuiltinFunction::Abs,
        BuiltinFunction::Round,
        BuiltinFunction::Min,
        BuiltinFunction::Max,
        BuiltinFunction::Sum,
        BuiltinFunction::Sqrt,
        BuiltinFunction::Pow,
        BuiltinFunction::Floor,
        BuiltinFunction::Ceil,
        BuiltinFunction::Len,
        BuiltinFunction::Int,
        BuiltinFunction::Float,
        BuiltinFunction::Str,
        BuiltinFunction::Today,
        BuiltinFunction::Now,
        BuiltinFunction::Year,
        BuiltinFunction::Month,
        BuiltinFunction::Day,
        BuiltinFunction::Age,
        BuiltinFunction::Iif,
        BuiltinFunction::Coalesce,
        BuiltinFunction::Concat,
        BuiltinFunction::Upper,
        BuiltinFunction::Lower,
        BuiltinFunction::Contains,
        BuiltinFunction::Selected,
        BuiltinFunction::CountSelected,
        BuiltinFunction::Gte,
        BuiltinFunction::Gt,
        BuiltinFunction::Lte,
        BuiltinFunction::Lt,
        BuiltinFunction::Eq,
        BuiltinFunction::Ne,
    ];

    /// Resolves a function name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        BuiltinFunction::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "abs",
            BuiltinFunction::Round => "round",
            BuiltinFunction::Min => "min",
            BuiltinFunction::Max => "max",
            BuiltinFunction::Sum => "sum",
            BuiltinFunction::Sqrt => "sqrt",
            BuiltinFunction::Pow => "pow",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Len => "len",
            BuiltinFunction::Int => "int",
            BuiltinFunction::Float => "float",
            BuiltinFunction::Str => "str",
            BuiltinFunction::Today => "today",
            BuiltinFunction::Now => "now",
            BuiltinFunction::Year => "year",
            BuiltinFunction::Month => "month",
            BuiltinFunction::Day => "day",
            BuiltinFunction::Age => "age",
            BuiltinFunction::Iif => "iif",
            BuiltinFunction::Coalesce => "coalesce",
            BuiltinFunction::Concat => "concat",
            BuiltinFunction::Upper => "upper",
            BuiltinFunction::Lower => "lower",
            BuiltinFunction::Contains => "contains",
            BuiltinFunction::Selected => "selected",
            BuiltinFunction::CountSelected => "count_selected",
            BuiltinFunction::Gte => "gte",
            BuiltinFunction::Gt => "gt",
            BuiltinFunction::Lte => "lte",
            BuiltinFunction::Lt => "lt",
            BuiltinFunction::Eq => "eq",
            BuiltinFunction::Ne => "ne",
        }
    }

    pub fn signature(self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "abs(x)",
            BuiltinFunction::Round => "round(x, digits?)",
            BuiltinFunction::Min => "min(a, b, ...) | min(list)",
            BuiltinFunction::Max => "max(a, b, ...) | max(list)",
            BuiltinFunction::Sum => "sum(list, start?)",
            BuiltinFunction::Sqrt => "sqrt(x)",
            BuiltinFunction::Pow => "pow(x, y)",
            BuiltinFunction::Floor => "floor(x)",
            BuiltinFunction::Ceil => "ceil(x)",
            BuiltinFunction::Len => "len(value)",
            BuiltinFunction::Int => "int(value?)",
            BuiltinFunction::Float => "float(value?)",
            BuiltinFunction::Str => "str(value?)",
            BuiltinFunction::Today => "today()",
            BuiltinFunction::Now => "now()",
            BuiltinFunction::Year => "year(date)",
            BuiltinFunction::Month => "month(date)",
            BuiltinFunction::Day => "day(date)",
            BuiltinFunction::Age => "age(date_of_birth)",
            BuiltinFunction::Iif => "iif(condition, if_true, if_false)",
            BuiltinFunction::Coalesce => "coalesce(a, b, ...)",
            BuiltinFunction::Concat => "concat(a, b, ...)",
            BuiltinFunction::Upper => "upper(text)",
            BuiltinFunction::Lower => "lower(text)",
            BuiltinFunction::Contains => "contains(text, sub)",
            BuiltinFunction::Selected => "selected(field, option)",
            BuiltinFunction::CountSelected => "count_selected(field)",
            BuiltinFunction::Gte => "gte(a, b)",
            BuiltinFunction::Gt => "gt(a, b)",
            BuiltinFunction::Lte => "lte(a, b)",
            BuiltinFunction::Lt => "lt(a, b)",
            BuiltinFunction::Eq => "eq(a, b)",
            BuiltinFunction::Ne => "ne(a, b)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "Absolute value",
            BuiltinFunction::Round => "Round to the given number of decimal places (half to even)",
            BuiltinFunction::Min => "Smallest of the arguments, or of a list",
            BuiltinFunction::Max => "Largest of the arguments, or of a list",
            BuiltinFunction::Sum => "Sum of a list of numbers",
            BuiltinFunction::Sqrt => "Square root",
            BuiltinFunction::Pow => "x raised to the power y, as a decimal",
            BuiltinFunction::Floor => "Largest integer not greater than x",
            BuiltinFunction::Ceil => "Smallest integer not less than x",
            BuiltinFunction::Len => "Length of a text or number of selected options",
            BuiltinFunction::Int => "Convert to a whole number",
            BuiltinFunction::Float => "Convert to a decimal number",
            BuiltinFunction::Str => "Convert to text",
            BuiltinFunction::Today => "Current date (YYYY-MM-DD)",
            BuiltinFunction::Now => "Current date and time (ISO 8601)",
            BuiltinFunction::Year => "Year of an ISO date",
            BuiltinFunction::Month => "Month of an ISO date",
            BuiltinFunction::Day => "Day of an ISO date",
            BuiltinFunction::Age => "Age in whole years from a date of birth",
            BuiltinFunction::Iif => "Returns if_true when condition holds, otherwise if_false",
            BuiltinFunction::Coalesce => "First argument that is not empty (null)",
            BuiltinFunction::Concat => "Join values as text, skipping nulls",
            BuiltinFunction::Upper => "Convert text to upper case",
            BuiltinFunction::Lower => "Convert text to lower case",
            BuiltinFunction::Contains => "Whether text contains a substring",
            BuiltinFunction::Selected => "Whether an option is selected in a choice field",
            BuiltinFunction::CountSelected => "Number of selected options",
            BuiltinFunction::Gte => "a >= b",
            BuiltinFunction::Gt => "a > b",
            BuiltinFunction::Lte => "a <= b",
            BuiltinFunction::Lt => "a < b",
            BuiltinFunction::Eq => "a == b",
            BuiltinFunction::Ne => "a != b",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            BuiltinFunction::Abs
            | BuiltinFunction::Round
            | BuiltinFunction::Min
            | BuiltinFunction::Max
            | BuiltinFunction::Sum
            | BuiltinFunction::Sqrt
            | BuiltinFunction::Pow
            | BuiltinFunction::Floor
            | BuiltinFunction::Ceil => "math",
            BuiltinFunction::Len
            | BuiltinFunction::Int
            | BuiltinFunction::Float
            | BuiltinFunction::Str => "conversion",
            BuiltinFunction::Today
            | BuiltinFunction::Now
            | BuiltinFunction::Year
            | BuiltinFunction::Month
            | BuiltinFunction::Day
            | BuiltinFunction::Age => "date",
            BuiltinFunction::Iif | BuiltinFunction::Coalesce => "logic",
            BuiltinFunction::Concat
            | BuiltinFunction::Upper
            | BuiltinFunction::Lower
            | BuiltinFunction::Contains => "text",
            BuiltinFunction::Selected | BuiltinFunction::CountSelected => "choice",
            BuiltinFunction::Gte
            | BuiltinFunction::Gt
            | BuiltinFunction::Lte
            | BuiltinFunction::Lt
            | BuiltinFunction::Eq
            | BuiltinFunction::Ne => "comparison",
        }
    }

    /// Accepted argument counts as (min, max). `None` means unbounded.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            BuiltinFunction::Today | BuiltinFunction::Now => (0, Some(0)),
            BuiltinFunction::Int | BuiltinFunction::Float | BuiltinFunction::Str => (0, Some(1)),
            BuiltinFunction::Abs
            | BuiltinFunction::Sqrt
            | BuiltinFunction::Floor
            | BuiltinFunction::Ceil
            | BuiltinFunction::Len
            | BuiltinFunction::Year
            | BuiltinFunction::Month
            | BuiltinFunction::Day
            | BuiltinFunction::Age
            | BuiltinFunction::Upper
            | BuiltinFunction::Lower
            | BuiltinFunction::CountSelected => (1, Some(1)),
            BuiltinFunction::Round | BuiltinFunction::Sum => (1, Some(2)),
            BuiltinFunction::Min | BuiltinFunction::Max => (1, None),
            BuiltinFunction::Pow
            | BuiltinFunction::Contains
            | BuiltinFunction::Selected
            | BuiltinFunction::Gte
            | BuiltinFunction::Gt
            | BuiltinFunction::Lte
            | BuiltinFunction::Lt
            | BuiltinFunction::Eq
            | BuiltinFunction::Ne => (2, Some(2)),
            BuiltinFunction::Iif => (3, Some(3)),
            BuiltinFunction::Coalesce | BuiltinFunction::Concat => (0, None),
        }
    }

    fn check_arity(self, got: usize) -> EvalResult<()> {
        let (min, max) = self.arity();
        let within = got >= min && max.map_or(true, |m| got <= m);
        if within {
            return Ok(());
        }

        let expected = match max {
            Some(m) if m == min => format!("{}", min),
            Some(m) => format!("{} to {}", min, m),
            None => format!("at least {}", min),
        };
        Err(EvalError::Arity {
            function: self.name(),
            expected,
            got,
        })
    }

    /// Calls the function with already evaluated arguments.
    pub fn call(self, args: &[Value], ctx: &EvalContext<'_>) -> EvalResult {
        self.check_arity(args.len())?;

        match self {
            BuiltinFunction::Abs => fn_abs(&args[0]),
            BuiltinFunction::Round => fn_round(&args[0], args.get(1)),
            BuiltinFunction::Min => fn_extreme("min", args, Ordering::Less),
            BuiltinFunction::Max => fn_extreme("max", args, Ordering::Greater),
            BuiltinFunction::Sum => fn_sum(&args[0], args.get(1), ctx),
            BuiltinFunction::Sqrt => fn_sqrt(&args[0]),
            BuiltinFunction::Pow => {
                let base = math_arg("pow", &args[0])?;
                let exponent = math_arg("pow", &args[1])?;
                evaluator::power(&Value::Float(base), &Value::Float(exponent))
            }
            BuiltinFunction::Floor => fn_round_to_int("floor", &args[0], f64::floor),
            BuiltinFunction::Ceil => fn_round_to_int("ceil", &args[0], f64::ceil),
            BuiltinFunction::Len => fn_len(&args[0]),
            BuiltinFunction::Int => fn_int(args.first()),
            BuiltinFunction::Float => args.first().map_or(Ok(0.0), Value::to_float).map(Value::Float),
            BuiltinFunction::Str => {
                let text = args.first().map(Value::to_string).unwrap_or_default();
                ctx.limits.check_string(text.chars().count())?;
                Ok(Value::Str(text))
            }
            BuiltinFunction::Today => Ok(Value::Str(ctx.now.date().format("%Y-%m-%d").to_string())),
            BuiltinFunction::Now => Ok(Value::Str(format_now(ctx))),
            BuiltinFunction::Year => fn_date_part(&args[0], 0..4),
            BuiltinFunction::Month => fn_date_part(&args[0], 5..7),
            BuiltinFunction::Day => fn_date_part(&args[0], 8..10),
            BuiltinFunction::Age => Ok(fn_age(&args[0], ctx.now.date())),
            BuiltinFunction::Iif => Ok(if args[0].is_truthy() {
                args[1].clone()
            } else {
                args[2].clone()
            }),
            BuiltinFunction::Coalesce => {
                Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
            }
            BuiltinFunction::Concat => {
                let text: String = args
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(Value::to_string)
                    .collect();
                ctx.limits.check_string(text.chars().count())?;
                Ok(Value::Str(text))
            }
            BuiltinFunction::Upper => Ok(map_text(&args[0], |s| s.to_uppercase())),
            BuiltinFunction::Lower => Ok(map_text(&args[0], |s| s.to_lowercase())),
            BuiltinFunction::Contains => Ok(Value::Bool(match &args[0] {
                Value::Str(haystack) => haystack.contains(args[1].to_string().as_str()),
                Value::List(items) => items.iter().any(|item| item.loose_eq(&args[1])),
                _ => false,
            })),
            BuiltinFunction::Selected => Ok(Value::Bool(match &args[0] {
                Value::List(items) => items.iter().any(|item| item.loose_eq(&args[1])),
                scalar => scalar.loose_eq(&args[1]),
            })),
            BuiltinFunction::CountSelected => Ok(Value::Int(match &args[0] {
                Value::List(items) => items.len() as i64,
                scalar => scalar.is_truthy() as i64,
            })),
            BuiltinFunction::Gte => compare_helper(ComparisonOperator::GreaterEqual, args),
            BuiltinFunction::Gt => compare_helper(ComparisonOperator::GreaterThan, args),
            BuiltinFunction::Lte => compare_helper(ComparisonOperator::LessEqual, args),
            BuiltinFunction::Lt => compare_helper(ComparisonOperator::LessThan, args),
            BuiltinFunction::Eq => compare_helper(ComparisonOperator::Equal, args),
            BuiltinFunction::Ne => compare_helper(ComparisonOperator::NotEqual, args),
        }
    }
}

impl std::fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ==================== Math Functions ====================

fn math_arg(function: &str, value: &Value) -> EvalResult<f64> {
    value.as_number().map(Number::as_f64).ok_or_else(|| {
        EvalError::Type(format!(
            "{}() requires a number, not '{}'",
            function,
            value.type_name()
        ))
    })
}

fn fn_abs(value: &Value) -> EvalResult {
    match value.as_number() {
        Some(Number::Int(n)) => Ok(n
            .checked_abs()
            .map(Value::Int)
            .unwrap_or(Value::Float((n as f64).abs()))),
        Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(EvalError::Type(format!(
            "bad operand type for abs(): '{}'",
            value.type_name()
        ))),
    }
}

/// Converts an integral float to an int, rejecting nan/inf and values
/// outside the i64 range.
fn float_to_int(f: f64) -> EvalResult {
    if !f.is_finite() {
        return Err(EvalError::Value(format!("cannot convert float {} to integer", f)));
    }
    if f < -9.223_372_036_854_776e18 || f >= 9.223_372_036_854_776e18 {
        return Err(EvalError::Value(format!("integer {} out of range", f)));
    }
    Ok(Value::Int(f as i64))
}

/// Rounds half to even. Without `digits` the result is an int; with
/// `digits` the input type is kept.
fn fn_round(value: &Value, digits: Option<&Value>) -> EvalResult {
    let number = value.as_number().ok_or_else(|| {
        EvalError::Type(format!(
            "type {} doesn't define __round__ method",
            value.type_name()
        ))
    })?;

    let digits = match digits {
        None | Some(Value::Null) => None,
        Some(d) => match d.as_number() {
            Some(Number::Int(n)) => Some(n),
            _ => {
                return Err(EvalError::Type(format!(
                    "'{}' object cannot be interpreted as an integer",
                    d.type_name()
                )))
            }
        },
    };

    match (number, digits) {
        (Number::Int(n), None) => Ok(Value::Int(n)),
        (Number::Float(f), None) => float_to_int(f.round_ties_even()),
        (Number::Int(n), Some(d)) if d >= 0 => Ok(Value::Int(n)),
        (Number::Int(n), Some(d)) => {
            let rounded = round_float(n as f64, d);
            if rounded.is_finite() {
                float_to_int(rounded)
            } else {
                Ok(Value::Int(0))
            }
        }
        (Number::Float(f), Some(d)) => Ok(Value::Float(round_float(f, d))),
    }
}

fn round_float(f: f64, digits: i64) -> f64 {
    if !f.is_finite() || digits > 15 {
        return f;
    }
    if digits < -308 {
        return 0.0 * f;
    }
    // Scale by positive powers of ten only; 10^-n is inexact in binary
    let rounded = if digits >= 0 {
        let scale = 10_f64.powi(digits as i32);
        (f * scale).round_ties_even() / scale
    } else {
        let scale = 10_f64.powi(-digits as i32);
        (f / scale).round_ties_even() * scale
    };
    if rounded.is_finite() {
        rounded
    } else {
        f
    }
}

fn fn_round_to_int(function: &str, value: &Value, op: fn(f64) -> f64) -> EvalResult {
    match value.as_number() {
        Some(Number::Int(n)) => Ok(Value::Int(n)),
        _ => float_to_int(op(math_arg(function, value)?)),
    }
}

fn fn_sqrt(value: &Value) -> EvalResult {
    let x = math_arg("sqrt", value)?;
    if x < 0.0 {
        return Err(EvalError::Value("math domain error".to_string()));
    }
    Ok(Value::Float(x.sqrt()))
}

/// Items of the single iterable argument accepted by min/max/sum.
fn iterable_items(function: &str, value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(EvalError::Type(format!(
            "'{}' object is not iterable for {}()",
            other.type_name(),
            function
        ))),
    }
}

/// min/max: a single iterable argument, or two or more values. Ties keep
/// the first candidate.
fn fn_extreme(function: &str, args: &[Value], wanted: Ordering) -> EvalResult {
    let candidates = if args.len() == 1 {
        iterable_items(function, &args[0])?
    } else {
        args.to_vec()
    };

    let mut iter = candidates.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| EvalError::Value(format!("{}() arg is an empty sequence", function)))?;

    let symbol = if wanted == Ordering::Less { "<" } else { ">" };
    for candidate in iter {
        if evaluator::order(symbol, &candidate, &best)? == Some(wanted) {
            best = candidate;
        }
    }
    Ok(best)
}

fn fn_sum(items: &Value, start: Option<&Value>, ctx: &EvalContext<'_>) -> EvalResult {
    let start = start.cloned().unwrap_or(Value::Int(0));
    if let Value::Str(_) = start {
        return Err(EvalError::Type(
            "sum() can't sum strings, use concat() instead".to_string(),
        ));
    }

    iterable_items("sum", items)?
        .iter()
        .try_fold(start, |acc, item| {
            evaluator::binary_op(BinaryOperator::Add, &acc, item, ctx.limits)
        })
}

// ==================== Conversion Functions ====================

fn fn_len(value: &Value) -> EvalResult {
    match value {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(EvalError::Type(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

fn fn_int(value: Option<&Value>) -> EvalResult {
    let Some(value) = value else {
        return Ok(Value::Int(0));
    };

    match value {
        Value::Str(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().map(Value::Int).map_err(|_| {
                EvalError::Value(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            })
        }
        other => match other.as_number() {
            Some(Number::Int(n)) => Ok(Value::Int(n)),
            Some(Number::Float(f)) => float_to_int(f.trunc()),
            None => Err(EvalError::Type(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::Str(f(&other.to_string())),
    }
}

// ==================== Date Functions ====================

/// ISO 8601 with microseconds, omitted when zero.
fn format_now(ctx: &EvalContext<'_>) -> String {
    if ctx.now.nanosecond() / 1_000 == 0 {
        ctx.now.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ctx.now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Extracts a fixed character range of an ISO date string as an int.
/// An empty or null input yields null.
fn fn_date_part(value: &Value, range: std::ops::Range<usize>) -> EvalResult {
    if !value.is_truthy() {
        return Ok(Value::Null);
    }

    let Value::Str(text) = value else {
        return Err(EvalError::Type(format!(
            "expected a date string, not '{}'",
            value.type_name()
        )));
    };

    let part: String = text
        .chars()
        .skip(range.start)
        .take(range.end - range.start)
        .collect();

    part.trim().parse::<i64>().map(Value::Int).map_err(|_| {
        EvalError::Value(format!("invalid date component '{}' in {}", part, value.repr()))
    })
}

/// Whole years since the date of birth. Anything that is not an ISO date
/// yields null.
fn fn_age(value: &Value, today: NaiveDate) -> Value {
    let Value::Str(text) = value else {
        return Value::Null;
    };
    let date_part: String = text.chars().take(10).collect();
    let Ok(birth) = NaiveDate::parse_from_str(&date_part, "%Y-%m-%d") else {
        return Value::Null;
    };

    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    Value::Int(years as i64)
}

// ==================== Comparison Helpers ====================

fn compare_helper(op: ComparisonOperator, args: &[Value]) -> EvalResult {
    evaluator::compare(op, &args[0], &args[1]).map(Value::Bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::EvalLimits;
    use crate::value::FieldValues;
    use chrono::NaiveDateTime;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn call(func: BuiltinFunction, args: &[Value]) -> EvalResult {
        let values = FieldValues::new();
        let limits = EvalLimits::default();
        let ctx = EvalContext {
            values: &values,
            limits: &limits,
            now: fixed_now(),
        };
        func.call(args, &ctx)
    }

    #[test]
    fn test_from_name_covers_every_variant() {
        for func in BuiltinFunction::ALL {
            assert_eq!(BuiltinFunction::from_name(func.name()), Some(func));
        }
        assert_eq!(BuiltinFunction::from_name("if"), None);
        assert_eq!(BuiltinFunction::from_name("ROUND"), None);
    }

    #[test]
    fn test_arity_is_checked() {
        assert!(matches!(
            call(BuiltinFunction::Sqrt, &[]),
            Err(EvalError::Arity { function: "sqrt", got: 0, .. })
        ));
        assert!(matches!(
            call(BuiltinFunction::Today, &[Value::Int(1)]),
            Err(EvalError::Arity { .. })
        ));
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(call(BuiltinFunction::Round, &[Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call(BuiltinFunction::Round, &[Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            call(BuiltinFunction::Round, &[Value::Float(22.857142857), Value::Int(1)]).unwrap(),
            Value::Float(22.9)
        );
        assert_eq!(
            call(BuiltinFunction::Round, &[Value::Int(1250), Value::Int(-2)]).unwrap(),
            Value::Int(1200)
        );
    }

    #[test]
    fn test_min_max() {
        let args = [Value::Int(5), Value::Int(3), Value::Int(8)];
        assert_eq!(call(BuiltinFunction::Min, &args).unwrap(), Value::Int(3));
        assert_eq!(call(BuiltinFunction::Max, &args).unwrap(), Value::Int(8));
        assert_eq!(
            call(BuiltinFunction::Max, &[Value::List(vec![Value::Float(1.5), Value::Int(1)])])
                .unwrap(),
            Value::Float(1.5)
        );
        assert!(matches!(
            call(BuiltinFunction::Min, &[Value::List(vec![])]),
            Err(EvalError::Value(_))
        ));
        assert!(matches!(
            call(BuiltinFunction::Min, &[Value::Int(1), Value::from("a")]),
            Err(EvalError::Type(_))
        ));
    }

    #[test]
    fn test_sum_keeps_integer_type() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(call(BuiltinFunction::Sum, &[list.clone()]).unwrap(), Value::Int(6));
        assert_eq!(
            call(BuiltinFunction::Sum, &[list, Value::Float(0.5)]).unwrap(),
            Value::Float(6.5)
        );
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(call(BuiltinFunction::Sqrt, &[Value::Int(16)]).unwrap(), Value::Float(4.0));
        assert!(matches!(call(BuiltinFunction::Sqrt, &[Value::Int(-1)]), Err(EvalError::Value(_))));
        assert_eq!(
            call(BuiltinFunction::Pow, &[Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Float(8.0)
        );
        assert_eq!(call(BuiltinFunction::Floor, &[Value::Float(-1.5)]).unwrap(), Value::Int(-2));
        assert_eq!(call(BuiltinFunction::Ceil, &[Value::Float(1.2)]).unwrap(), Value::Int(2));
        assert_eq!(call(BuiltinFunction::Abs, &[Value::Int(-4)]).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call(BuiltinFunction::Int, &[Value::from(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call(BuiltinFunction::Int, &[Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert!(matches!(call(BuiltinFunction::Int, &[Value::from("x")]), Err(EvalError::Value(_))));
        assert_eq!(call(BuiltinFunction::Float, &[Value::from("2.5")]).unwrap(), Value::Float(2.5));
        assert_eq!(call(BuiltinFunction::Str, &[Value::Float(3.0)]).unwrap(), Value::from("3.0"));
        assert_eq!(call(BuiltinFunction::Str, &[]).unwrap(), Value::from(""));
        assert_eq!(call(BuiltinFunction::Len, &[Value::from("héllo")]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_date_functions_use_the_context_clock() {
        assert_eq!(call(BuiltinFunction::Today, &[]).unwrap(), Value::from("2024-06-15"));
        assert_eq!(call(BuiltinFunction::Now, &[]).unwrap(), Value::from("2024-06-15T10:30:00"));
        let date = Value::from("1990-08-20");
        assert_eq!(call(BuiltinFunction::Year, &[date.clone()]).unwrap(), Value::Int(1990));
        assert_eq!(call(BuiltinFunction::Month, &[date.clone()]).unwrap(), Value::Int(8));
        assert_eq!(call(BuiltinFunction::Day, &[date]).unwrap(), Value::Int(20));
        assert_eq!(call(BuiltinFunction::Year, &[Value::from("")]).unwrap(), Value::Null);
        assert!(matches!(call(BuiltinFunction::Month, &[Value::from("abc")]), Err(EvalError::Value(_))));
    }

    #[test]
    fn test_age_counts_completed_birthdays() {
        // Birthday later in the year has not happened yet
        assert_eq!(call(BuiltinFunction::Age, &[Value::from("1990-08-20")]).unwrap(), Value::Int(33));
        assert_eq!(call(BuiltinFunction::Age, &[Value::from("1990-06-15")]).unwrap(), Value::Int(34));
        assert_eq!(call(BuiltinFunction::Age, &[Value::from("not a date")]).unwrap(), Value::Null);
        assert_eq!(call(BuiltinFunction::Age, &[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_text_and_choice_helpers() {
        assert_eq!(
            call(BuiltinFunction::Concat, &[Value::from("a"), Value::Null, Value::Int(1)]).unwrap(),
            Value::from("a1")
        );
        assert_eq!(call(BuiltinFunction::Upper, &[Value::from("abc")]).unwrap(), Value::from("ABC"));
        assert_eq!(call(BuiltinFunction::Lower, &[Value::Null]).unwrap(), Value::Null);
        assert_eq!(
            call(BuiltinFunction::Contains, &[Value::from("hello"), Value::from("ell")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(BuiltinFunction::Contains, &[Value::Int(5), Value::Int(5)]).unwrap(),
            Value::Bool(false)
        );

        let choices = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(
            call(BuiltinFunction::Selected, &[choices.clone(), Value::from("b")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(call(BuiltinFunction::CountSelected, &[choices]).unwrap(), Value::Int(2));
        assert_eq!(call(BuiltinFunction::CountSelected, &[Value::from("x")]).unwrap(), Value::Int(1));
        assert_eq!(call(BuiltinFunction::CountSelected, &[Value::Null]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_iif_and_coalesce() {
        assert_eq!(
            call(BuiltinFunction::Iif, &[Value::Int(0), Value::from("y"), Value::from("n")]).unwrap(),
            Value::from("n")
        );
        assert_eq!(
            call(BuiltinFunction::Coalesce, &[Value::Null, Value::Int(0), Value::Int(1)]).unwrap(),
            Value::Int(0)
        );
        assert_eq!(call(BuiltinFunction::Coalesce, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_comparison_helpers() {
        assert_eq!(
            call(BuiltinFunction::Gte, &[Value::Int(3), Value::Float(3.0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(BuiltinFunction::Ne, &[Value::from("a"), Value::Int(1)]).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            call(BuiltinFunction::Lt, &[Value::from("a"), Value::Int(1)]),
            Err(EvalError::Type(_))
        ));
    }
}
