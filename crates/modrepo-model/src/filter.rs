//! LDAP-style filter expressions over attribute maps.
//!
//! Requirements select capabilities with filters such as
//! `(&(package=org.example.api)(version>=1.2))`. The grammar follows
//! RFC 1960 as used by module catalogs:
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = "&" filter+ | "|" filter+ | "!" filter | item
//! item       = attr ("=" | "~=" | ">=" | "<=") value
//! ```
//!
//! A value of `*` tests presence, other unescaped `*` characters in an `=`
//! value make a substring match. `\` escapes the next character.
//!
//! # Examples
//!
//! ```
//! use modrepo_model::{AttrValue, Attributes, Filter, Version};
//!
//! let filter = Filter::parse("(&(package=org.example)(version>=1.2))").unwrap();
//!
//! let mut attrs = Attributes::new();
//! attrs.insert("package".into(), "org.example".into());
//! attrs.insert("version".into(), AttrValue::Version(Version::new(1, 10, 0)));
//! assert!(filter.matches(&attrs));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::attr::{AttrValue, Attributes, lookup};
use crate::error::{Error, Result};
use crate::version::Version;

/// Comparison operator of a simple filter item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Equal,
    /// `~=`
    Approx,
    /// `>=`
    GreaterOrEqual,
    /// `<=`
    LessOrEqual,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Approx => "~=",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal | Operator::Approx => ordering == Ordering::Equal,
            Operator::GreaterOrEqual => ordering != Ordering::Less,
            Operator::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        attr: String,
        op: Operator,
        value: String,
    },
    Present {
        attr: String,
    },
    Substring {
        attr: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

impl Filter {
    /// Parse a filter string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFilterSyntax`] with the character position of
    /// the first problem.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser::new(source);
        let filter = parser.parse_filter()?;
        parser.skip_whitespace();
        if parser.peek().is_some() {
            return Err(parser.error("unexpected trailing characters"));
        }
        Ok(filter)
    }

    /// Evaluate the filter against an attribute map.
    ///
    /// Attribute names are matched without regard to ASCII case.
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(attributes)),
            Filter::Or(items) => items.iter().any(|f| f.matches(attributes)),
            Filter::Not(inner) => !inner.matches(attributes),
            Filter::Present { attr } => lookup(attributes, attr).is_some(),
            Filter::Compare { attr, op, value } => {
                lookup(attributes, attr).is_some_and(|actual| compare(actual, *op, value))
            }
            Filter::Substring {
                attr,
                initial,
                any,
                last,
            } => lookup(attributes, attr).is_some_and(|actual| match actual {
                AttrValue::List(items) => items
                    .iter()
                    .any(|item| substring_matches(item, initial.as_deref(), any, last.as_deref())),
                other => substring_matches(
                    &other.to_string(),
                    initial.as_deref(),
                    any,
                    last.as_deref(),
                ),
            }),
        }
    }

    /// Every attribute name mentioned anywhere in the filter, lowercased.
    pub fn referenced_attributes(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_attributes(&mut names);
        names
    }

    fn collect_attributes(&self, names: &mut BTreeSet<String>) {
        match self {
            Filter::And(items) | Filter::Or(items) => {
                for item in items {
                    item.collect_attributes(names);
                }
            }
            Filter::Not(inner) => inner.collect_attributes(names),
            Filter::Compare { attr, .. }
            | Filter::Present { attr }
            | Filter::Substring { attr, .. } => {
                names.insert(attr.to_ascii_lowercase());
            }
        }
    }

    /// The value this filter asserts by equality for `attr`, if any.
    ///
    /// Only the top level and conjunctions are searched: a value under `|`
    /// or `!` is not asserted.
    pub fn asserted_value(&self, attr: &str) -> Option<&str> {
        match self {
            Filter::Compare {
                attr: name,
                op: Operator::Equal,
                value,
            } if name.eq_ignore_ascii_case(attr) => Some(value),
            Filter::And(items) => items.iter().find_map(|f| f.asserted_value(attr)),
            _ => None,
        }
    }
}

fn compare(actual: &AttrValue, op: Operator, literal: &str) -> bool {
    match actual {
        AttrValue::String(s) => compare_strings(s, op, literal),
        AttrValue::List(items) => items.iter().any(|s| compare_strings(s, op, literal)),
        AttrValue::Long(n) => literal
            .trim()
            .parse::<i64>()
            .is_ok_and(|lit| op.accepts(n.cmp(&lit))),
        AttrValue::Double(d) => literal
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|lit| d.partial_cmp(&lit))
            .is_some_and(|ordering| op.accepts(ordering)),
        AttrValue::Version(v) => Version::parse(literal).is_ok_and(|lit| op.accepts(v.cmp(&lit))),
    }
}

fn compare_strings(actual: &str, op: Operator, literal: &str) -> bool {
    match op {
        Operator::Equal => actual == literal,
        Operator::Approx => approximate(actual) == approximate(literal),
        Operator::GreaterOrEqual => actual >= literal,
        Operator::LessOrEqual => actual <= literal,
    }
}

fn approximate(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn substring_matches(
    actual: &str,
    initial: Option<&str>,
    any: &[String],
    last: Option<&str>,
) -> bool {
    let mut rest = actual;
    if let Some(prefix) = initial {
        match rest.strip_prefix(prefix) {
            Some(remaining) => rest = remaining,
            None => return false,
        }
    }
    for part in any {
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    last.is_none_or(|suffix| rest.ends_with(suffix))
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        if matches!(c, '\\' | '(' | ')' | '*') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(items) | Filter::Or(items) => {
                f.write_str(if matches!(self, Filter::And(_)) { "(&" } else { "(|" })?;
                for item in items {
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Filter::Not(inner) => write!(f, "(!{inner})"),
            Filter::Present { attr } => write!(f, "({attr}=*)"),
            Filter::Compare { attr, op, value } => {
                write!(f, "({attr}{}", op.as_str())?;
                write_escaped(f, value)?;
                f.write_str(")")
            }
            Filter::Substring {
                attr,
                initial,
                any,
                last,
            } => {
                write!(f, "({attr}=")?;
                if let Some(initial) = initial {
                    write_escaped(f, initial)?;
                }
                f.write_str("*")?;
                for part in any {
                    write_escaped(f, part)?;
                    f.write_str("*")?;
                }
                if let Some(last) = last {
                    write_escaped(f, last)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Deepest `&`/`|`/`!` nesting accepted from a filter string.
const MAX_DEPTH: usize = 64;

/// Recursive-descent parser over the characters of a filter string.
struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::InvalidFilterSyntax {
            filter: self.source.to_string(),
            position: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn parse_filter(&mut self) -> Result<Filter> {
        self.skip_whitespace();
        self.expect('(')?;
        if self.depth == MAX_DEPTH {
            return Err(self.error("filter nested too deeply"));
        }
        self.depth += 1;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_operands()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_operands()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_whitespace();
        self.expect(')')?;
        self.depth -= 1;
        Ok(filter)
    }

    fn parse_operands(&mut self) -> Result<Vec<Filter>> {
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            operands.push(self.parse_filter()?);
        }
        if operands.is_empty() {
            return Err(self.error("expected at least one operand"));
        }
        Ok(operands)
    }

    fn parse_item(&mut self) -> Result<Filter> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attr: String = self.chars[start..self.pos].iter().collect();
        let attr = attr.trim().to_string();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match (self.peek(), self.chars.get(self.pos + 1).copied()) {
            (Some('='), _) => {
                self.pos += 1;
                Operator::Equal
            }
            (Some('~'), Some('=')) => {
                self.pos += 2;
                Operator::Approx
            }
            (Some('>'), Some('=')) => {
                self.pos += 2;
                Operator::GreaterOrEqual
            }
            (Some('<'), Some('=')) => {
                self.pos += 2;
                Operator::LessOrEqual
            }
            _ => return Err(self.error("expected one of '=', '~=', '>=', '<='")),
        };

        let mut segments = self.parse_value()?;
        if op != Operator::Equal || segments.len() == 1 {
            return Ok(Filter::Compare {
                attr,
                op,
                value: segments.join("*"),
            });
        }
        if segments.len() == 2 && segments.iter().all(String::is_empty) {
            return Ok(Filter::Present { attr });
        }

        let last = segments.pop().filter(|s| !s.is_empty());
        let mut rest = segments.into_iter();
        let initial = rest.next().filter(|s| !s.is_empty());
        let any = rest.filter(|s| !s.is_empty()).collect();
        Ok(Filter::Substring {
            attr,
            initial,
            any,
            last,
        })
    }

    /// Read a value up to the closing `)`, splitting on unescaped `*`.
    fn parse_value(&mut self) -> Result<Vec<String>> {
        let mut segments = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("dangling escape at end of filter"))?;
                    push_char(&mut segments, escaped);
                    self.pos += 1;
                }
                Some('*') => {
                    segments.push(String::new());
                    self.pos += 1;
                }
                Some(c) => {
                    push_char(&mut segments, c);
                    self.pos += 1;
                }
            }
        }
        Ok(segments)
    }
}

fn push_char(segments: &mut [String], c: char) {
    if let Some(current) = segments.last_mut() {
        current.push(c);
    }
}
