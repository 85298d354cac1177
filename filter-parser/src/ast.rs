//! FILENAME: filter-parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for filter expressions.
//! CONTEXT: After the Lexer tokenizes filter text, the Parser converts those
//! tokens into this tree. The segment engine type-checks the tree against a
//! dimension catalog and evaluates it per record.
//!
//! SUPPORTED EXPRESSIONS:
//! - Comparisons: dimension (= | != | > | >= | < | <= | CONTAINS | IN) literal
//! - Conjunctions (AND) and disjunctions (OR), AND binding tighter
//! - Parenthesized groups

use std::fmt;

/// A parsed filter expression.
#[derive(Debug, PartialEq, Clone)]
pub enum FilterExpr {
    /// A single `dimension operator literal` test.
    Comparison(Comparison),

    /// True iff every child is true. Always holds two or more children.
    And(Vec<FilterExpr>),

    /// True iff any child is true. Always holds two or more children.
    Or(Vec<FilterExpr>),
}

/// A single comparison against a dimension.
#[derive(Debug, PartialEq, Clone)]
pub struct Comparison {
    pub dimension: String,
    pub operator: ComparisonOperator,
    pub literal: Literal,
    /// Byte offset of the dimension name in the source text.
    pub position: usize,
    /// Byte offset of the literal in the source text.
    pub literal_position: usize,
}

/// Comparison operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Contains,
    In,
}

/// Literal values on the right-hand side of a comparison.
#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Number(f64),
    /// Quoted strings and bare words.
    Text(String),
    Boolean(bool),
    /// The value list of an `IN` comparison.
    List(Vec<Literal>),
}

impl FilterExpr {
    /// Visits every comparison in the tree, left to right.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            FilterExpr::Comparison(c) => out.push(c),
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                for child in children {
                    child.collect_comparisons(out);
                }
            }
        }
    }
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessEqual => "<=",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::In => "in",
        }
    }

    /// All operators, in the order the catalog reports them.
    pub fn all() -> &'static [ComparisonOperator] {
        &[
            ComparisonOperator::Equal,
            ComparisonOperator::NotEqual,
            ComparisonOperator::GreaterThan,
            ComparisonOperator::GreaterEqual,
            ComparisonOperator::LessThan,
            ComparisonOperator::LessEqual,
            ComparisonOperator::Contains,
            ComparisonOperator::In,
        ]
    }
}

impl Literal {
    /// A short type name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Number(_) => "number",
            Literal::Text(_) => "text",
            Literal::Boolean(_) => "boolean",
            Literal::List(_) => "list",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Literal::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for FilterExpr {
    /// Prints the canonical text form. OR groups nested under AND get
    /// parentheses so the output re-parses to the same tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Comparison(c) => {
                write!(f, "{} {} {}", display_dimension(&c.dimension), c.operator, c.literal)
            }
            FilterExpr::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    match child {
                        FilterExpr::Or(_) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
            FilterExpr::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
        }
    }
}

/// Dimension names that are not plain words are printed backtick-quoted.
fn display_dimension(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !matches!(
            name.to_ascii_uppercase().as_str(),
            "AND" | "OR" | "CONTAINS" | "IN" | "TRUE" | "FALSE"
        );
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name)
    }
}
