//! FILENAME: core/engine/src/dependency_extractor.rs
//! PURPOSE: Extracts field references and function calls from parsed expressions.
//! CONTEXT: After a calculation is parsed into an AST, this module walks the
//! tree to find the names it reads and the functions it calls. Form analysis
//! uses the references to build the dependency graph and the calls to flag
//! functions that do not exist.

use crate::functions::BuiltinFunction;
use parser::Expression;
use std::collections::BTreeSet;

/// Function calls found in an expression, split by whether they resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionCalls {
    pub known: BTreeSet<BuiltinFunction>,
    pub unknown: BTreeSet<String>,
}

/// Names read as field values. Function names in call position are not
/// references.
pub fn referenced_fields(expr: &Expression) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    expr.walk(&mut |node| {
        if let Expression::Identifier(name) = node {
            names.insert(name.clone());
        }
    });
    names
}

pub fn called_functions(expr: &Expression) -> FunctionCalls {
    let mut calls = FunctionCalls::default();
    expr.walk(&mut |node| {
        if let Expression::FunctionCall { name, .. } = node {
            match BuiltinFunction::from_name(name) {
                Some(func) => {
                    calls.known.insert(func);
                }
                None => {
                    calls.unknown.insert(name.clone());
                }
            }
        }
    });
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_identifiers() {
        let expr = parser::parse("round(weight / ((height/100)*(height/100)), 1)").unwrap();
        assert_eq!(referenced_fields(&expr), names(&["height", "weight"]));
    }

    #[test]
    fn test_function_names_are_not_references() {
        let expr = parser::parse("concat(first, ' ', last)").unwrap();
        assert_eq!(referenced_fields(&expr), names(&["first", "last"]));
    }

    #[test]
    fn test_extract_from_every_branch() {
        let expr = parser::parse("a if b > [c] else not d and e in f").unwrap();
        assert_eq!(referenced_fields(&expr), names(&["a", "b", "c", "d", "e", "f"]));
    }

    #[test]
    fn test_literal_only() {
        let expr = parser::parse("1 + 2 * 'x'").unwrap();
        assert!(referenced_fields(&expr).is_empty());
    }

    #[test]
    fn test_called_functions_split() {
        let expr = parser::parse("iif(gt(a, 1), sqrt(a), mystery(a))").unwrap();
        let calls = called_functions(&expr);
        assert_eq!(
            calls.known,
            [BuiltinFunction::Iif, BuiltinFunction::Gt, BuiltinFunction::Sqrt]
                .into_iter()
                .collect()
        );
        assert_eq!(calls.unknown, names(&["mystery"]));
    }
}
