//! Quarry Document Query
//!
//! The textual query language and its parsed form.
//!
//! A query is zero or more comparisons separated by whitespace, all of which
//! must hold:
//!
//! ```text
//! a.b:12 name:"john doe" age:>18 price:<9.5
//! ```
//!
//! Each comparison is `key ':' [ '>' | '<' ] value`. Keys and values are
//! either a double-quoted string (taken literally, no escapes) or a run of
//! letters, digits and `.`. The key is split on `.` into path segments,
//! quoted or not. Values are kept as the raw text; numeric interpretation
//! happens when a comparison is evaluated.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use quarry_common::{QuarryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Operator
// =============================================================================

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
}

impl Operator {
    /// Text written between the colon and the value.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// One predicate of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub path: Vec<String>,
    pub operator: Operator,
    pub literal: String,
}

impl Comparison {
    /// Build a comparison from a dotted key.
    pub fn new(key: &str, operator: Operator, literal: impl Into<String>) -> Self {
        Self {
            path: key.split('.').map(String::from).collect(),
            operator,
            literal: literal.into(),
        }
    }

    pub fn is_equality(&self) -> bool {
        self.operator == Operator::Eq
    }

    /// Path segments joined with `.`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Secondary index key this comparison would be answered from.
    pub fn index_key(&self) -> String {
        format!("{}={}", self.dotted_path(), self.literal)
    }
}

/// Renders the comparison in query syntax. Path segments that themselves
/// contain `.` cannot survive a round trip because keys are always split.
impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_token(f, &self.dotted_path())?;
        write!(f, ":{}", self.operator.symbol())?;
        write_token(f, &self.literal)
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_alphanumeric() || c == '.'
}

fn write_token(f: &mut fmt::Formatter<'_>, token: &str) -> fmt::Result {
    if !token.is_empty() && token.chars().all(is_bare_char) {
        f.write_str(token)
    } else {
        write!(f, "\"{}\"", token)
    }
}

// =============================================================================
// Query
// =============================================================================

/// A conjunction of comparisons. The empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub comparisons: Vec<Comparison>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the textual query language.
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).parse()
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }
}

impl FromStr for Query {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, comparison) in self.comparisons.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", comparison)?;
        }
        Ok(())
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Single-pass scanner over the characters of a query string.
/// Positions in errors are character offsets.
struct Parser {
    input: Vec<char>,
    position: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn parse(mut self) -> Result<Query> {
        let mut query = Query::new();

        loop {
            self.skip_whitespace();
            if self.at_end() {
                return Ok(query);
            }
            let comparison = self.parse_comparison()?;
            query.comparisons.push(comparison);
        }
    }

    fn parse_comparison(&mut self) -> Result<Comparison> {
        let key = self.read_token("key")?;

        if self.current_char() != Some(':') {
            return Err(QuarryError::parse(
                self.position,
                format!("expected ':' after key \"{}\"", key),
            ));
        }
        self.advance();

        let operator = match self.current_char() {
            Some('>') => {
                self.advance();
                Operator::Gt
            }
            Some('<') => {
                self.advance();
                Operator::Lt
            }
            _ => Operator::Eq,
        };

        let literal = self.read_token("value")?;

        Ok(Comparison::new(&key, operator, literal))
    }

    /// Read a quoted string or a bare run of letters, digits and dots.
    fn read_token(&mut self, what: &str) -> Result<String> {
        if self.current_char() == Some('"') {
            let start = self.position;
            self.advance();

            let mut token = String::new();
            while let Some(c) = self.current_char() {
                self.advance();
                if c == '"' {
                    return Ok(token);
                }
                token.push(c);
            }

            return Err(QuarryError::parse(
                start,
                format!("unterminated quoted {}", what),
            ));
        }

        let mut token = String::new();
        while let Some(c) = self.current_char() {
            if !is_bare_char(c) {
                break;
            }
            token.push(c);
            self.advance();
        }

        if token.is_empty() {
            let found = match self.current_char() {
                Some(c) => format!("'{}'", c),
                None => "end of input".to_string(),
            };
            return Err(QuarryError::parse(
                self.position,
                format!("expected {}, found {}", what, found),
            ));
        }

        Ok(token)
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// Builder for constructing queries in code.
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self {
            query: Query::new(),
        }
    }

    pub fn eq(mut self, key: &str, literal: impl Into<String>) -> Self {
        self.query
            .comparisons
            .push(Comparison::new(key, Operator::Eq, literal));
        self
    }

    pub fn gt(mut self, key: &str, literal: impl Into<String>) -> Self {
        self.query
            .comparisons
            .push(Comparison::new(key, Operator::Gt, literal));
        self
    }

    pub fn lt(mut self, key: &str, literal: impl Into<String>) -> Self {
        self.query
            .comparisons
            .push(Comparison::new(key, Operator::Lt, literal));
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
