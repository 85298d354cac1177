//! FILENAME: filter-parser/src/token.rs
//! PURPOSE: Token definitions for the filter expression lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by the parser.
//! Every token is paired with the byte offset where it starts so that parse
//! errors can point at the offending input.

/// Tokens recognized by the filter lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    /// A dimension name or a bare word literal (e.g. `Mobile`).
    Identifier(String),

    // Comparison operators
    Equals,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    Contains,
    In,

    // Boolean connectives
    And,
    Or,

    // Delimiters
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,

    // Special
    EOF,
    /// A string literal that reached end of input without its closing quote.
    UnterminatedString(String),
    Illegal(char),
}

/// A token together with the byte offset of its first character.
#[derive(Debug, PartialEq, Clone)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Equals => write!(f, "="),
            Token::NotEqual => write!(f, "!="),
            Token::LessThan => write!(f, "<"),
            Token::GreaterThan => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::Contains => write!(f, "CONTAINS"),
            Token::In => write!(f, "IN"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Minus => write!(f, "-"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::EOF => write!(f, "end of input"),
            Token::UnterminatedString(s) => write!(f, "unterminated string \"{}", s),
            Token::Illegal(c) => write!(f, "'{}'", c),
        }
    }
}
