//! Requirement match filters
//!
//! A filter is a boolean predicate over a capability's attribute map. Filters
//! are built programmatically or parsed from the compact prefix syntax used
//! in resource metadata, e.g. `(&(protocol=tcp)(version>=1.2.0))`.

use crate::resource::attrs::AttrValue;
use crate::resource::Version;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Error type for filter parsing and evaluation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("unexpected end of filter input")]
    UnexpectedEnd,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("empty attribute name at position {0}")]
    EmptyAttribute(usize),

    #[error("operator group at position {0} has no operands")]
    EmptyGroup(usize),

    #[error("trailing input after filter at position {0}")]
    TrailingInput(usize),

    #[error("attribute '{attribute}' cannot be ordered against '{literal}'")]
    Incomparable { attribute: String, literal: String },
}

/// A match filter evaluated against capability attributes
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `(name=value)`: equality, with list attributes matching any element
    Eq(String, AttrValue),
    /// `(name=*)`: the attribute is present, whatever its value
    Present(String),
    /// `(name<value)`
    Lt(String, AttrValue),
    /// `(name<=value)`
    Le(String, AttrValue),
    /// `(name>value)`
    Gt(String, AttrValue),
    /// `(name>=value)`
    Ge(String, AttrValue),
    /// `(&(..)(..))`: all operands hold
    And(Vec<Filter>),
    /// `(|(..)(..))`: at least one operand holds
    Or(Vec<Filter>),
    /// `(!(..))`: the operand does not hold
    Not(Box<Filter>),
}

impl Filter {
    /// Parse a filter from its string syntax
    pub fn parse(input: &str) -> Result<Filter, FilterError> {
        let mut parser = Parser::new(input);
        parser.skip_whitespace();
        let filter = parser.parse_filter()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(FilterError::TrailingInput(parser.pos));
        }
        Ok(filter)
    }

    /// Evaluate this filter against an attribute map
    ///
    /// An absent attribute makes equality and ordering comparisons false.
    /// An ordering comparison against a value that cannot be ordered is a
    /// [`FilterError::Incomparable`]: that requirement's filter counts as
    /// malformed rather than silently non-matching.
    pub fn eval(&self, attrs: &IndexMap<String, AttrValue>) -> Result<bool, FilterError> {
        match self {
            Filter::Present(name) => Ok(attrs.contains_key(name)),
            Filter::Eq(name, literal) => Ok(attrs
                .get(name)
                .map(|value| value.matches_eq(literal))
                .unwrap_or(false)),
            Filter::Lt(name, literal) => self.eval_ordering(attrs, name, literal, |o| o.is_lt()),
            Filter::Le(name, literal) => self.eval_ordering(attrs, name, literal, |o| o.is_le()),
            Filter::Gt(name, literal) => self.eval_ordering(attrs, name, literal, |o| o.is_gt()),
            Filter::Ge(name, literal) => self.eval_ordering(attrs, name, literal, |o| o.is_ge()),
            Filter::And(operands) => {
                for operand in operands {
                    if !operand.eval(attrs)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(operands) => {
                for operand in operands {
                    if operand.eval(attrs)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Not(operand) => Ok(!operand.eval(attrs)?),
        }
    }

    fn eval_ordering(
        &self,
        attrs: &IndexMap<String, AttrValue>,
        name: &str,
        literal: &AttrValue,
        accept: impl Fn(std::cmp::Ordering) -> bool,
    ) -> Result<bool, FilterError> {
        match attrs.get(name) {
            None => Ok(false),
            Some(AttrValue::List(items)) => {
                // a list attribute satisfies the comparison when any element does
                for item in items {
                    let ordering =
                        item.compare(literal)
                            .ok_or_else(|| FilterError::Incomparable {
                                attribute: name.to_string(),
                                literal: literal.to_string(),
                            })?;
                    if accept(ordering) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some(value) => value
                .compare(literal)
                .map(accept)
                .ok_or_else(|| FilterError::Incomparable {
                    attribute: name.to_string(),
                    literal: literal.to_string(),
                }),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq(name, value) => write!(f, "({}={})", name, value),
            Filter::Present(name) => write!(f, "({}=*)", name),
            Filter::Lt(name, value) => write!(f, "({}<{})", name, value),
            Filter::Le(name, value) => write!(f, "({}<={})", name, value),
            Filter::Gt(name, value) => write!(f, "({}>{})", name, value),
            Filter::Ge(name, value) => write!(f, "({}>={})", name, value),
            Filter::And(operands) => {
                write!(f, "(&")?;
                for operand in operands {
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
            Filter::Or(operands) => {
                write!(f, "(|")?;
                for operand in operands {
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
            Filter::Not(operand) => write!(f, "(!{})", operand),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Cursor parser for the filter string syntax
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<char, FilterError> {
        let ch = self.peek().ok_or(FilterError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(ch)
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        let ch = self.bump()?;
        if ch != expected {
            return Err(FilterError::UnexpectedChar {
                ch,
                pos: self.pos - 1,
            });
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.expect('(')?;
        let filter = match self.peek().ok_or(FilterError::UnexpectedEnd)? {
            '&' => {
                self.pos += 1;
                Filter::And(self.parse_operands()?)
            }
            '|' => {
                self.pos += 1;
                Filter::Or(self.parse_operands()?)
            }
            '!' => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            _ => self.parse_comparison()?,
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_operands(&mut self) -> Result<Vec<Filter>, FilterError> {
        let start = self.pos;
        let mut operands = Vec::new();
        while self.peek() == Some('(') {
            operands.push(self.parse_filter()?);
        }
        if operands.is_empty() {
            return Err(FilterError::EmptyGroup(start));
        }
        Ok(operands)
    }

    fn parse_comparison(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if matches!(ch, '=' | '<' | '>' | '(' | ')') {
                break;
            }
            name.push(ch);
            self.pos += 1;
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(FilterError::EmptyAttribute(start));
        }

        match self.bump()? {
            '=' => {
                if self.peek() == Some('*') && self.chars.get(self.pos + 1) == Some(&')') {
                    self.pos += 1;
                    return Ok(Filter::Present(name));
                }
                let value = self.parse_value()?;
                Ok(Filter::Eq(name, value))
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Ok(Filter::Le(name, self.parse_value()?))
                } else {
                    Ok(Filter::Lt(name, self.parse_value()?))
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Ok(Filter::Ge(name, self.parse_value()?))
                } else {
                    Ok(Filter::Gt(name, self.parse_value()?))
                }
            }
            ch => Err(FilterError::UnexpectedChar {
                ch,
                pos: self.pos - 1,
            }),
        }
    }

    fn parse_value(&mut self) -> Result<AttrValue, FilterError> {
        let mut raw = String::new();
        while let Some(ch) = self.peek() {
            if ch == ')' {
                break;
            }
            raw.push(ch);
            self.pos += 1;
        }
        Ok(type_literal(&raw))
    }
}

/// Type a raw filter literal: integer, then boolean, then version, else string
fn type_literal(raw: &str) -> AttrValue {
    if let Ok(int) = raw.parse::<i64>() {
        return AttrValue::Int(int);
    }
    if let Ok(flag) = raw.parse::<bool>() {
        return AttrValue::Bool(flag);
    }
    if raw.contains('.') {
        if let Ok(version) = Version::parse(raw) {
            return AttrValue::Version(version);
        }
    }
    AttrValue::Str(raw.to_string())
}
