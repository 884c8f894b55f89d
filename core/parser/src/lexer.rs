//! FILENAME: core/parser/src/lexer.rs
//! PURPOSE: Scans a raw expression string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace skipping, integer/float parsing, quoted strings with escapes,
//! keywords, and multi-character operators like ** and //.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / % < > ( ) [ ] ,
//! - Multi char: ** // == != <= >=
//! - Keywords: and or not in if else True False None

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.input.next() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('%') => Token::Percent,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some('[') => Token::LBracket,
            Some(']') => Token::RBracket,
            Some(',') => Token::Comma,

            // Handle * and **
            Some('*') => self.read_doubled('*', Token::Asterisk, Token::DoubleAsterisk),

            // Handle / and //
            Some('/') => self.read_doubled('/', Token::Slash, Token::DoubleSlash),

            // A lone '=' is not an operator in this language
            Some('=') => self.read_with_equals(Token::Illegal('='), Token::EqualEqual),
            Some('!') => self.read_with_equals(Token::Illegal('!'), Token::NotEqual),
            Some('<') => self.read_with_equals(Token::LessThan, Token::LessEqual),
            Some('>') => self.read_with_equals(Token::GreaterThan, Token::GreaterEqual),

            Some(quote @ ('"' | '\'')) => self.read_string(quote),

            // Numbers start with a digit, or a dot followed by a digit
            Some(ch) if ch.is_ascii_digit() => self.read_number(ch),
            Some('.') if self.peek_is_digit() => self.read_number('.'),

            Some(ch) if is_identifier_start(ch) => self.read_identifier(ch),

            None => Token::EOF,

            Some(ch) => Token::Illegal(ch),
        }
    }

    /// Collects every remaining token, including the trailing EOF.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token == Token::EOF;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    fn peek_is_digit(&mut self) -> bool {
        matches!(self.input.peek(), Some(ch) if ch.is_ascii_digit())
    }

    fn read_doubled(&mut self, ch: char, single: Token, double: Token) -> Token {
        if self.input.peek() == Some(&ch) {
            self.input.next();
            double
        } else {
            single
        }
    }

    fn read_with_equals(&mut self, single: Token, with_equals: Token) -> Token {
        if self.input.peek() == Some(&'=') {
            self.input.next();
            with_equals
        } else {
            single
        }
    }

    /// Reads a quoted string. Backslash escapes the next character.
    fn read_string(&mut self, quote: char) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.input.next() {
            if ch == quote {
                return Token::String(result);
            }
            if ch == '\\' {
                match self.input.next() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some(other) => result.push(other),
                    None => return Token::UnterminatedString,
                }
            } else {
                result.push(ch);
            }
        }
        Token::UnterminatedString
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut is_float = first_char == '.';

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.input.next();
            } else if ch == '.' && !is_float {
                is_float = true;
                number_str.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        if self.exponent_follows() {
            is_float = true;
            // 'e' or 'E', then an optional sign, then digits
            if let Some(e) = self.input.next() {
                number_str.push(e);
            }
            if let Some(&sign @ ('+' | '-')) = self.input.peek() {
                number_str.push(sign);
                self.input.next();
            }
            while let Some(&ch) = self.input.peek() {
                if !ch.is_ascii_digit() {
                    break;
                }
                number_str.push(ch);
                self.input.next();
            }
        }

        if !is_float {
            if let Ok(n) = number_str.parse::<i64>() {
                return Token::Integer(n);
            }
        }

        match number_str.parse::<f64>() {
            Ok(n) => Token::Float(n),
            Err(_) => Token::Illegal(first_char),
        }
    }

    /// True when the upcoming characters form an exponent (`e5`, `E-3`).
    fn exponent_follows(&self) -> bool {
        let mut look = self.input.clone();
        match look.next() {
            Some('e' | 'E') => {}
            _ => return false,
        }
        match look.next() {
            Some('+' | '-') => matches!(look.next(), Some(ch) if ch.is_ascii_digit()),
            Some(ch) => ch.is_ascii_digit(),
            None => false,
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&ch) = self.input.peek() {
            if is_identifier_start(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        // Identifiers are case-sensitive: field names are matched exactly.
        match ident.as_str() {
            "True" => Token::Boolean(true),
            "False" => Token::Boolean(false),
            "None" => Token::Null,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "if" => Token::If,
            "else" => Token::Else,
            _ => Token::Identifier(ident),
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
