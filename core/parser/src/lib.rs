//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the form expression parser.
//! CONTEXT: This module exposes the lexer, parser, and AST components
//! needed to convert calculated-field formulas into evaluatable expression trees.
//!
//! PIPELINE: Expression String --> Lexer --> Tokens --> Parser --> AST --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, // (floor division), % (modulo), ** (power)
//! - Comparison: ==, !=, <, >, <=, >=, in, not in (chainable)
//! - Boolean logic: and, or, not
//! - Conditional expressions: a if cond else b
//! - Field references: bare identifiers such as weight or first_name
//! - Function calls: round(bmi, 1), concat(first, ' ', last)
//! - List literals: ['yes', 'maybe']
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;


// Re-export commonly used types for convenience
pub use ast::{BinaryOperator, ComparisonOperator, Expression, LogicalOperator, UnaryOperator, Value};
pub use lexer::Lexer;
pub use parser::{parse, parse_with_max_nesting, ParseError, ParseResult, Parser, DEFAULT_MAX_NESTING};
pub use token::Token;
