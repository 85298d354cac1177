//! FILENAME: filter-parser/src/lexer.rs
//! PURPOSE: Scans raw filter text and produces a stream of positioned Tokens.
//! CONTEXT: This is the first stage of the filter pipeline. It handles
//! whitespace skipping, number parsing, quoted strings, backtick-quoted
//! dimension names, keywords and multi-character operators.
//!
//! SUPPORTED OPERATORS:
//! - Single char: = < > - ( ) [ ] ,
//! - Multi char: == != <> <= >=
//! - Keywords (case-insensitive): AND OR CONTAINS IN TRUE FALSE

use crate::token::{Spanned, Token};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    input: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    /// Advances the lexer and returns the next token, dropping its position.
    pub fn next_token(&mut self) -> Token {
        self.next_spanned().token
    }

    /// Advances the lexer and returns the next token with its start offset.
    pub fn next_spanned(&mut self) -> Spanned {
        self.skip_whitespace();

        let Some((position, ch)) = self.input.next() else {
            return Spanned {
                token: Token::EOF,
                position: self.len,
            };
        };

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '-' => Token::Minus,

            // '=' and '=='
            '=' => {
                self.consume_if('=');
                Token::Equals
            }

            // '!=' only; a lone '!' is illegal
            '!' => {
                if self.consume_if('=') {
                    Token::NotEqual
                } else {
                    Token::Illegal('!')
                }
            }

            '<' => self.read_less_than_operator(),
            '>' => self.read_greater_than_operator(),

            '"' | '\'' => self.read_string(ch),
            '`' => self.read_quoted_identifier(),

            c if c.is_ascii_digit() || c == '.' => self.read_number(c),
            c if is_letter(c) => self.read_word(c),

            c => Token::Illegal(c),
        };

        Spanned { token, position }
    }

    /// Collects every token up to and including EOF.
    pub fn tokenize(mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_spanned();
            let done = spanned.token == Token::EOF;
            tokens.push(spanned);
            if done {
                return tokens;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.input.next();
        }
    }

    fn consume_if(&mut self, expected: char) -> bool {
        if matches!(self.input.peek(), Some(&(_, ch)) if ch == expected) {
            self.input.next();
            true
        } else {
            false
        }
    }

    /// Handles operators starting with '<': <, <=, <>
    fn read_less_than_operator(&mut self) -> Token {
        if self.consume_if('=') {
            Token::LessEqual
        } else if self.consume_if('>') {
            Token::NotEqual
        } else {
            Token::LessThan
        }
    }

    /// Handles operators starting with '>': >, >=
    fn read_greater_than_operator(&mut self) -> Token {
        if self.consume_if('=') {
            Token::GreaterEqual
        } else {
            Token::GreaterThan
        }
    }

    /// Reads a string closed by the same quote character. A doubled quote
    /// inside the literal stands for one quote character.
    fn read_string(&mut self, quote: char) -> Token {
        let mut result = String::new();
        while let Some((_, ch)) = self.input.next() {
            if ch == quote {
                if self.consume_if(quote) {
                    result.push(quote);
                    continue;
                }
                return Token::String(result);
            }
            result.push(ch);
        }
        Token::UnterminatedString(result)
    }

    /// Reads a backtick-quoted dimension name: `signup date`
    fn read_quoted_identifier(&mut self) -> Token {
        let mut result = String::new();
        while let Some((_, ch)) = self.input.next() {
            if ch == '`' {
                return Token::Identifier(result);
            }
            result.push(ch);
        }
        Token::UnterminatedString(result)
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';

        while let Some(&(_, ch)) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.input.next();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                number_str.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        match number_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            // e.g. a lone "."
            Err(_) => Token::Illegal(first_char),
        }
    }

    fn read_word(&mut self, first_char: char) -> Token {
        let mut word = String::from(first_char);

        while let Some(&(_, ch)) = self.input.peek() {
            // '.' supports dotted names like "profile.country".
            if is_letter(ch) || ch.is_ascii_digit() || ch == '.' {
                word.push(ch);
                self.input.next();
            } else {
                break;
            }
        }

        match word.to_ascii_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "CONTAINS" => Token::Contains,
            "IN" => Token::In,
            "TRUE" => Token::Boolean(true),
            "FALSE" => Token::Boolean(false),
            // Dimension names are case-sensitive, so no normalization here.
            _ => Token::Identifier(word),
        }
    }
}

/// Returns true if `ch` can start a word.
fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}
