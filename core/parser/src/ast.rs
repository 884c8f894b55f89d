//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for form expressions.
//! CONTEXT: After the Lexer tokenizes an expression string, the Parser converts
//! those tokens into this tree structure. The engine's evaluator then traverses
//! this tree, looking identifiers up in the field value map.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: integers, floats, strings, True/False, None
//! - Field references: bare identifiers (weight, first_name)
//! - List literals: ['a', 'b']
//! - Arithmetic: + - * / // % **
//! - Comparisons (chainable): == != < > <= >= in, not in
//! - Boolean logic: and, or, not
//! - Conditional: a if cond else b
//! - Function calls: round(x, 1), concat(a, ' ', b)

/// Represents a parsed expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value.
    Literal(Value),

    /// A bare identifier, resolved against the field value map at evaluation time.
    Identifier(String),

    /// A list literal: [a, b, c].
    List(Vec<Expression>),

    /// An arithmetic operation: left op right.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand.
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// A comparison chain. `a < b <= c` is stored as
    /// first = a, rest = [(<, b), (<=, c)] and means `a < b and b <= c`.
    Comparison {
        first: Box<Expression>,
        rest: Vec<(ComparisonOperator, Expression)>,
    },

    /// Short-circuit boolean operation yielding one of its operands.
    Logical {
        op: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `then_branch if condition else else_branch`.
    Conditional {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },

    /// A function call like round(x, 1).
    FunctionCall { name: String, args: Vec<Expression> },
}

/// Literal values that can appear in expressions.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// Arithmetic operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,         // +
    Subtract,    // -
    Multiply,    // *
    Divide,      // /
    FloorDivide, // //
    Modulo,      // %
    Power,       // **
}

/// Comparison operators, all at the same precedence level.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    In,
    NotIn,
}

/// Unary operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
    Plus,   // +
    Not,    // not
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicalOperator {
    And,
    Or,
}

impl Expression {
    /// Visits this node and every descendant, parents before children.
    pub fn walk<'e>(&'e self, visit: &mut impl FnMut(&'e Expression)) {
        visit(self);
        match self {
            Expression::Literal(_) | Expression::Identifier(_) => {}
            Expression::List(items) => items.iter().for_each(|item| item.walk(visit)),
            Expression::BinaryOp { left, right, .. } | Expression::Logical { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expression::UnaryOp { operand, .. } => operand.walk(visit),
            Expression::Comparison { first, rest } => {
                first.walk(visit);
                rest.iter().for_each(|(_, expr)| expr.walk(visit));
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                then_branch.walk(visit);
                condition.walk(visit);
                else_branch.walk(visit);
            }
            Expression::FunctionCall { args, .. } => args.iter().for_each(|arg| arg.walk(visit)),
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::FloorDivide => write!(f, "//"),
            BinaryOperator::Modulo => write!(f, "%"),
            BinaryOperator::Power => write!(f, "**"),
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonOperator::Equal => write!(f, "=="),
            ComparisonOperator::NotEqual => write!(f, "!="),
            ComparisonOperator::LessThan => write!(f, "<"),
            ComparisonOperator::GreaterThan => write!(f, ">"),
            ComparisonOperator::LessEqual => write!(f, "<="),
            ComparisonOperator::GreaterEqual => write!(f, ">="),
            ComparisonOperator::In => write!(f, "in"),
            ComparisonOperator::NotIn => write!(f, "not in"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Not => write!(f, "not "),
        }
    }
}

impl std::fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "and"),
            LogicalOperator::Or => write!(f, "or"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Null => write!(f, "None"),
        }
    }
}
