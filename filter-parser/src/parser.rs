//! FILENAME: filter-parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into a FilterExpr.
//! CONTEXT: This is the second stage of the filter pipeline. It takes tokens
//! from the Lexer and builds the AST; type checking happens later against
//! the dimension catalog.
//!
//! GRAMMAR:
//!   expr       --> term ( OR term )*
//!   term       --> factor ( AND factor )*
//!   factor     --> "(" expr ")" | comparison
//!   comparison --> IDENTIFIER operator literal
//!   operator   --> "=" | "!=" | ">" | ">=" | "<" | "<=" | CONTAINS | IN
//!   literal    --> NUMBER | "-" NUMBER | STRING | BOOLEAN | IDENTIFIER | list
//!   list       --> ( "(" | "[" ) literal ( "," literal )* ( ")" | "]" )

use crate::ast::{Comparison, ComparisonOperator, FilterExpr, Literal};
use crate::lexer::Lexer;
use crate::token::{Spanned, Token};

/// Parser errors with a message and the byte offset of the offending token.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Deepest parenthesis nesting accepted in one expression.
pub const MAX_NESTING: usize = 256;

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Spanned,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_spanned();
        Parser {
            lexer,
            current,
            depth: 0,
        }
    }

    /// Parses the entire input and returns the AST.
    pub fn parse(&mut self) -> ParseResult<FilterExpr> {
        if self.current.token == Token::EOF {
            return Err(ParseError::new("Empty expression", self.current.position));
        }

        let expr = self.parse_or()?;

        // Ensure we consumed all tokens
        if self.current.token != Token::EOF {
            return Err(self.unexpected("after expression"));
        }

        Ok(expr)
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current = self.lexer.next_spanned();
    }

    /// Checks if the current token matches the expected token.
    /// If it matches, advances and returns Ok. Otherwise returns an error.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current.token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(
                format!("Expected {}, found {}", expected, self.current.token),
                self.current.position,
            ))
        }
    }

    /// Builds an error for the current token. Lexer-level problems get a
    /// dedicated message so the caller can highlight the bad character.
    fn unexpected(&self, context: &str) -> ParseError {
        let message = match &self.current.token {
            Token::Illegal(ch) => format!("Illegal character '{}'", ch),
            Token::UnterminatedString(_) => "Unterminated string literal".to_string(),
            Token::EOF => format!("Unexpected end of input {}", context),
            token => format!("Unexpected token {} {}", token, context),
        };
        ParseError::new(message, self.current.position)
    }

    /// Parses disjunctions (OR).
    fn parse_or(&mut self) -> ParseResult<FilterExpr> {
        let first = self.parse_and()?;
        if self.current.token != Token::Or {
            return Ok(first);
        }

        let mut children = vec![first];
        while self.current.token == Token::Or {
            self.advance();
            children.push(self.parse_and()?);
        }
        Ok(FilterExpr::Or(children))
    }

    /// Parses conjunctions (AND).
    fn parse_and(&mut self) -> ParseResult<FilterExpr> {
        let first = self.parse_factor()?;
        if self.current.token != Token::And {
            return Ok(first);
        }

        let mut children = vec![first];
        while self.current.token == Token::And {
            self.advance();
            children.push(self.parse_factor()?);
        }
        Ok(FilterExpr::And(children))
    }

    /// Parses a parenthesized group or a single comparison.
    fn parse_factor(&mut self) -> ParseResult<FilterExpr> {
        if self.current.token == Token::LParen {
            if self.depth == MAX_NESTING {
                return Err(ParseError::new(
                    "Expression nested too deeply",
                    self.current.position,
                ));
            }
            self.depth += 1;
            self.advance();
            let expr = self.parse_or()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(expr);
        }

        self.parse_comparison().map(FilterExpr::Comparison)
    }

    fn parse_comparison(&mut self) -> ParseResult<Comparison> {
        let position = self.current.position;
        let dimension = match &self.current.token {
            Token::Identifier(name) => name.clone(),
            _ => return Err(self.unexpected("where a dimension name was expected")),
        };
        self.advance();

        let operator = match self.current.token {
            Token::Equals => ComparisonOperator::Equal,
            Token::NotEqual => ComparisonOperator::NotEqual,
            Token::GreaterThan => ComparisonOperator::GreaterThan,
            Token::GreaterEqual => ComparisonOperator::GreaterEqual,
            Token::LessThan => ComparisonOperator::LessThan,
            Token::LessEqual => ComparisonOperator::LessEqual,
            Token::Contains => ComparisonOperator::Contains,
            Token::In => ComparisonOperator::In,
            _ => return Err(self.unexpected("where a comparison operator was expected")),
        };
        self.advance();

        let literal_position = self.current.position;
        let literal = if operator == ComparisonOperator::In {
            self.parse_list()?
        } else {
            self.parse_scalar()?
        };

        Ok(Comparison {
            dimension,
            operator,
            literal,
            position,
            literal_position,
        })
    }

    /// Parses the value list of an IN comparison.
    fn parse_list(&mut self) -> ParseResult<Literal> {
        let close = match self.current.token {
            Token::LParen => Token::RParen,
            Token::LBracket => Token::RBracket,
            _ => return Err(self.unexpected("where a value list was expected")),
        };
        self.advance();

        let mut items = vec![self.parse_scalar()?];
        while self.current.token == Token::Comma {
            self.advance();
            items.push(self.parse_scalar()?);
        }
        self.expect(close)?;

        Ok(Literal::List(items))
    }

    /// Parses a single literal value.
    fn parse_scalar(&mut self) -> ParseResult<Literal> {
        let literal = match &self.current.token {
            Token::Number(n) => Literal::Number(*n),
            Token::String(s) => Literal::Text(s.clone()),
            Token::Boolean(b) => Literal::Boolean(*b),
            Token::Identifier(word) => Literal::Text(word.clone()),
            Token::Minus => {
                self.advance();
                return match self.current.token {
                    Token::Number(n) => {
                        self.advance();
                        Ok(Literal::Number(-n))
                    }
                    _ => Err(self.unexpected("after '-'")),
                };
            }
            _ => return Err(self.unexpected("where a value was expected")),
        };
        self.advance();
        Ok(literal)
    }
}

/// Convenience function to parse filter text directly.
pub fn parse(input: &str) -> ParseResult<FilterExpr> {
    let mut parser = Parser::new(input);
    parser.parse()
}
