//! FILENAME: core/parser/src/parser.rs
//! PURPOSE: Recursive descent parser for calculated-field expressions.
//! CONTEXT: Pulls tokens from the Lexer one at a time and builds the
//! Expression tree the engine interprets. Nesting is bounded so a hostile
//! formula cannot exhaust the stack.
//!
//! GRAMMAR:
//!   expression     --> disjunction ( "if" disjunction "else" expression )?
//!   disjunction    --> conjunction ( "or" conjunction )*
//!   conjunction    --> inversion ( "and" inversion )*
//!   inversion      --> "not" inversion | comparison
//!   comparison     --> additive ( comp_op additive )*
//!   comp_op        --> "==" | "!=" | "<" | ">" | "<=" | ">=" | "in" | "not" "in"
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/" | "//" | "%") unary )*
//!   unary          --> ("-" | "+") unary | power
//!   power          --> primary ( "**" unary )?
//!   primary        --> NUMBER | STRING | BOOLEAN | None | IDENTIFIER
//!                    | function_call | list | "(" expression ")"
//!   function_call  --> IDENTIFIER "(" arguments? ")"
//!   list           --> "[" arguments? "]"
//!   arguments      --> expression ("," expression)* ","?

use crate::ast::{
    BinaryOperator, ComparisonOperator, Expression, LogicalOperator, UnaryOperator, Value,
};
use crate::lexer::Lexer;
use crate::token::Token;

/// Default bound on expression tree height and parser recursion.
pub const DEFAULT_MAX_NESTING: usize = 64;

/// Why an expression was rejected.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
    /// Set when the input was rejected for nesting too deeply rather than
    /// for bad syntax.
    pub nesting_exceeded: bool,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            nesting_exceeded: false,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed subtree and its height (a lone literal is 1).
struct Node {
    expr: Expression,
    height: usize,
}

impl Node {
    fn leaf(expr: Expression) -> Self {
        Node { expr, height: 1 }
    }
}

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    depth: usize,
    max_nesting: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        Self::with_max_nesting(input, DEFAULT_MAX_NESTING)
    }

    /// Creates a parser that rejects input nested deeper than `max_nesting`.
    pub fn with_max_nesting(input: &'a str, max_nesting: usize) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
            depth: 0,
            max_nesting,
        }
    }

    /// Parses the entire input and returns the AST.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let node = self.parse_expression()?;

        // Ensure we consumed all tokens
        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {}",
                self.current_token
            )));
        }

        Ok(node.expr)
    }

    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {}, found {}",
                expected, self.current_token
            )))
        }
    }

    fn too_deep(&self) -> ParseError {
        ParseError {
            nesting_exceeded: true,
            ..ParseError::new(format!(
                "Expression nested deeper than {} levels",
                self.max_nesting
            ))
        }
    }

    /// Runs `f` one recursion level deeper, failing once the bound is crossed.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= self.max_nesting {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Wraps `expr` as a node one level above its tallest child. Operator
    /// chains like `1 + 1 + ... + 1` grow the tree without recursing, so the
    /// height is checked here as well as in `nested`.
    fn branch(&self, expr: Expression, children: &[usize]) -> ParseResult<Node> {
        let height = 1 + children.iter().copied().max().unwrap_or(0);
        if height > self.max_nesting {
            return Err(self.too_deep());
        }
        Ok(Node { expr, height })
    }

    /// Entry point for expression parsing (conditional expressions).
    fn parse_expression(&mut self) -> ParseResult<Node> {
        let body = self.parse_disjunction()?;

        if self.current_token != Token::If {
            return Ok(body);
        }

        self.advance();
        let condition = self.parse_disjunction()?;
        self.expect(Token::Else)?;
        let else_branch = self.nested(|p| p.parse_expression())?;

        let heights = [body.height, condition.height, else_branch.height];
        self.branch(
            Expression::Conditional {
                condition: Box::new(condition.expr),
                then_branch: Box::new(body.expr),
                else_branch: Box::new(else_branch.expr),
            },
            &heights,
        )
    }

    fn logical(&self, op: LogicalOperator, left: Node, right: Node) -> ParseResult<Node> {
        let heights = [left.height, right.height];
        self.branch(
            Expression::Logical {
                op,
                left: Box::new(left.expr),
                right: Box::new(right.expr),
            },
            &heights,
        )
    }

    fn binary(&self, left: Node, op: BinaryOperator, right: Node) -> ParseResult<Node> {
        let heights = [left.height, right.height];
        self.branch(
            Expression::BinaryOp {
                left: Box::new(left.expr),
                op,
                right: Box::new(right.expr),
            },
            &heights,
        )
    }

    fn unary(&self, op: UnaryOperator, operand: Node) -> ParseResult<Node> {
        let height = operand.height;
        self.branch(
            Expression::UnaryOp {
                op,
                operand: Box::new(operand.expr),
            },
            &[height],
        )
    }

    fn parse_disjunction(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_conjunction()?;

        while self.current_token == Token::Or {
            self.advance();
            let right = self.parse_conjunction()?;
            left = self.logical(LogicalOperator::Or, left, right)?;
        }

        Ok(left)
    }

    fn parse_conjunction(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_inversion()?;

        while self.current_token == Token::And {
            self.advance();
            let right = self.parse_inversion()?;
            left = self.logical(LogicalOperator::And, left, right)?;
        }

        Ok(left)
    }

    fn parse_inversion(&mut self) -> ParseResult<Node> {
        if self.current_token == Token::Not {
            self.advance();
            let operand = self.nested(|p| p.parse_inversion())?;
            return self.unary(UnaryOperator::Not, operand);
        }

        self.parse_comparison()
    }

    /// Parses comparison chains (==, !=, <, >, <=, >=, in, not in).
    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let first = self.parse_additive()?;
        let mut heights = vec![first.height];
        let mut rest = Vec::new();

        loop {
            let op = match &self.current_token {
                Token::EqualEqual => ComparisonOperator::Equal,
                Token::NotEqual => ComparisonOperator::NotEqual,
                Token::LessThan => ComparisonOperator::LessThan,
                Token::GreaterThan => ComparisonOperator::GreaterThan,
                Token::LessEqual => ComparisonOperator::LessEqual,
                Token::GreaterEqual => ComparisonOperator::GreaterEqual,
                Token::In => ComparisonOperator::In,
                // After an operand, 'not' can only start 'not in'
                Token::Not => {
                    self.advance();
                    if self.current_token != Token::In {
                        return Err(ParseError::new(format!(
                            "Expected 'in' after 'not', found {}",
                            self.current_token
                        )));
                    }
                    ComparisonOperator::NotIn
                }
                _ => break,
            };

            self.advance();
            let operand = self.parse_additive()?;
            heights.push(operand.height);
            rest.push((op, operand.expr));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            self.branch(
                Expression::Comparison {
                    first: Box::new(first.expr),
                    rest,
                },
                &heights,
            )
        }
    }

    /// Parses additive expressions (+ and -).
    fn parse_additive(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(left, op, right)?;
        }

        Ok(left)
    }

    /// Parses multiplicative expressions (*, /, //, %).
    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::DoubleSlash => BinaryOperator::FloorDivide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(left, op, right)?;
        }

        Ok(left)
    }

    /// Parses unary expressions (negation and unary plus).
    fn parse_unary(&mut self) -> ParseResult<Node> {
        let op = match &self.current_token {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };

        self.advance();
        let operand = self.nested(|p| p.parse_unary())?;
        self.unary(op, operand)
    }

    /// Parses exponentiation (**). Binds tighter than a unary minus on its
    /// left, so -2 ** 2 is -(2 ** 2).
    fn parse_power(&mut self) -> ParseResult<Node> {
        let left = self.parse_primary()?;

        if self.current_token == Token::DoubleAsterisk {
            self.advance();
            let right = self.nested(|p| p.parse_unary())?;
            return self.binary(left, BinaryOperator::Power, right);
        }

        Ok(left)
    }

    /// Parses primary expressions (literals, identifiers, calls, lists, parentheses).
    fn parse_primary(&mut self) -> ParseResult<Node> {
        match self.current_token.clone() {
            Token::Integer(n) => {
                self.advance();
                Ok(Node::leaf(Expression::Literal(Value::Integer(n))))
            }

            Token::Float(n) => {
                self.advance();
                Ok(Node::leaf(Expression::Literal(Value::Float(n))))
            }

            Token::String(s) => {
                self.advance();
                Ok(Node::leaf(Expression::Literal(Value::String(s))))
            }

            Token::Boolean(b) => {
                self.advance();
                Ok(Node::leaf(Expression::Literal(Value::Boolean(b))))
            }

            Token::Null => {
                self.advance();
                Ok(Node::leaf(Expression::Literal(Value::Null)))
            }

            Token::Identifier(name) => {
                self.advance();

                if self.current_token == Token::LParen {
                    return self.parse_function_call(name);
                }

                Ok(Node::leaf(Expression::Identifier(name)))
            }

            Token::LParen => {
                self.advance();
                let node = self.nested(|p| p.parse_expression())?;
                self.expect(Token::RParen)?;
                Ok(node)
            }

            Token::LBracket => {
                self.advance();
                let (items, heights) = self.parse_arguments(Token::RBracket)?;
                self.branch(Expression::List(items), &heights)
            }

            // Error cases
            Token::EOF => Err(ParseError::new("Unexpected end of expression")),

            Token::Illegal(ch) => Err(ParseError::new(format!("Illegal character: {}", ch))),

            Token::UnterminatedString => Err(ParseError::new("Unterminated string literal")),

            token => Err(ParseError::new(format!("Unexpected token: {}", token))),
        }
    }

    /// Parses a function call like round(x, 1).
    fn parse_function_call(&mut self, name: String) -> ParseResult<Node> {
        // Consume the '('
        self.advance();
        let (args, heights) = self.parse_arguments(Token::RParen)?;
        self.branch(Expression::FunctionCall { name, args }, &heights)
    }

    /// Parses a comma-separated list up to and including `close`.
    /// A trailing comma is accepted. Returns the items and their heights.
    fn parse_arguments(&mut self, close: Token) -> ParseResult<(Vec<Expression>, Vec<usize>)> {
        let mut args = Vec::new();
        let mut heights = Vec::new();

        while self.current_token != close {
            let node = self.nested(|p| p.parse_expression())?;
            heights.push(node.height);
            args.push(node.expr);

            if self.current_token == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(close)?;
        Ok((args, heights))
    }
}

/// Convenience function to parse an expression string directly.
pub fn parse(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Parses with an explicit nesting bound.
pub fn parse_with_max_nesting(input: &str, max_nesting: usize) -> ParseResult<Expression> {
    let mut parser = Parser::with_max_nesting(input, max_nesting);
    parser.parse()
}
