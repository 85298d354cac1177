//! FILENAME: filter-parser/src/lib.rs
//! PURPOSE: Library root for the segment filter expression parser.
//! CONTEXT: This crate exposes the lexer, parser, and AST components
//! needed to convert filter text into a predicate tree that the segment
//! engine type-checks and evaluates per record.
//!
//! PIPELINE: Filter Text --> Lexer --> Tokens --> Parser --> AST --> Type Check --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Comparison: =, !=, >, >=, <, <=, contains, in
//! - Connectives: AND (binds tighter), OR
//! - Parentheses for grouping
//! - Literals: numbers (optionally negative), quoted strings, bare words,
//!   booleans, value lists for IN

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;


// Re-export commonly used types for convenience
pub use ast::{Comparison, ComparisonOperator, FilterExpr, Literal};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser, MAX_NESTING};
pub use token::{Spanned, Token};
