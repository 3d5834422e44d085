//! Free-shipping predicate language.
//!
//! Rules are stored as small boolean expressions over the destination region
//! and the cart subtotal:
//!
//! ```text
//! predicate := "true" | clause ( "and" clause )*
//! clause    := "region" "==" STRING | "total" ">=" NUMBER
//! STRING    := "'" [^']* "'"
//! NUMBER    := [0-9.]+
//! ```
//!
//! Each clause may appear at most once and in any order. An empty region
//! string and a zero threshold are the same as omitting the clause.
//!
//! [`FreeShippingPredicate::parse`] is strict and reports the first problem.
//! [`FreeShippingPredicate::parse_lenient`] never fails: it picks out whatever
//! recognizable clauses the text contains and ignores the rest, so a garbled
//! expression degrades to the unconditional rule.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Errors reported by the strict parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredicateError {
    /// The expression is blank.
    #[error("expression is empty")]
    Empty,

    /// A token did not fit the grammar.
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    Unexpected {
        /// Description of what was found.
        found: String,
        /// Byte offset into the expression.
        offset: usize,
        /// What the grammar allowed here.
        expected: &'static str,
    },

    /// A quoted string was never closed.
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    /// A number literal could not be parsed as a decimal.
    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    /// The same clause appeared twice.
    #[error("duplicate `{0}` clause")]
    DuplicateClause(&'static str),
}

/// Destination facts a predicate is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteContext {
    /// Destination region code (UF), when known.
    pub region: Option<String>,
    /// Cart subtotal.
    pub total: Decimal,
}

impl RouteContext {
    /// Build a context for a destination region and subtotal.
    #[must_use]
    pub fn new(region: Option<&str>, total: Decimal) -> Self {
        Self {
            region: region.map(str::to_string),
            total,
        }
    }
}

/// Parsed free-shipping predicate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FreeShippingPredicate {
    /// Required destination region, if any.
    pub region: Option<String>,
    /// Minimum cart subtotal (inclusive), if any. Never zero.
    pub min_total: Option<Decimal>,
}

impl FreeShippingPredicate {
    /// The predicate that always holds.
    pub const ALWAYS: Self = Self {
        region: None,
        min_total: None,
    };

    /// Build a predicate, dropping empty regions and non-positive thresholds.
    #[must_use]
    pub fn new(region: Option<String>, min_total: Option<Decimal>) -> Self {
        Self {
            region: region.filter(|r| !r.is_empty()),
            min_total: min_total.filter(|t| t.is_sign_positive() && !t.is_zero()),
        }
    }

    /// Whether this predicate has no conditions.
    #[must_use]
    pub const fn is_unconditional(&self) -> bool {
        self.region.is_none() && self.min_total.is_none()
    }

    /// Parse an expression strictly.
    ///
    /// # Errors
    ///
    /// Returns [`PredicateError`] describing the first token that does not fit
    /// the grammar.
    pub fn parse(input: &str) -> Result<Self, PredicateError> {
        let tokens = tokenize(input);
        Parser::new(&tokens).parse()
    }

    /// Parse an expression, recovering whatever clauses are recognizable.
    ///
    /// Never fails. Text with no recognizable clause yields [`Self::ALWAYS`].
    #[must_use]
    pub fn parse_lenient(input: &str) -> Self {
        let tokens = tokenize(input);
        match Parser::new(&tokens).parse() {
            Ok(predicate) => predicate,
            Err(err) => {
                tracing::debug!(error = %err, expression = input, "recovering clauses from malformed predicate");
                scan_clauses(&tokens)
            }
        }
    }

    /// Evaluate against a destination.
    ///
    /// Region codes compare case-insensitively. A region clause never matches
    /// a destination whose region is unknown.
    #[must_use]
    pub fn evaluate(&self, route: &RouteContext) -> bool {
        let region_ok = self.region.as_ref().is_none_or(|wanted| {
            route
                .region
                .as_deref()
                .is_some_and(|actual| actual.eq_ignore_ascii_case(wanted))
        });
        let total_ok = self.min_total.is_none_or(|min| route.total >= min);
        region_ok && total_ok
    }
}

impl fmt::Display for FreeShippingPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unconditional() {
            return f.write_str("true");
        }
        if let Some(region) = &self.region {
            write!(f, "region == '{region}'")?;
            if self.min_total.is_some() {
                f.write_str(" and ")?;
            }
        }
        if let Some(min) = self.min_total {
            write!(f, "total >= {}", min.normalize())?;
        }
        Ok(())
    }
}

impl FromStr for FreeShippingPredicate {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Number(String),
    EqEq,
    GtEq,
    Unterminated,
    Other(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

impl Token {
    fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(ident) if ident == word)
    }

    fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(ident) => format!("`{ident}`"),
            TokenKind::Str(value) => format!("string '{value}'"),
            TokenKind::Number(text) => format!("number {text}"),
            TokenKind::EqEq => "`==`".to_string(),
            TokenKind::GtEq => "`>=`".to_string(),
            TokenKind::Unterminated => "unterminated string".to_string(),
            TokenKind::Other(ch) => format!("{ch:?}"),
        }
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        let kind = match ch {
            c if c.is_whitespace() => continue,
            '\'' => {
                let mut value = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '\'' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if closed {
                    TokenKind::Str(value)
                } else {
                    TokenKind::Unterminated
                }
            }
            '=' | '>' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    if ch == '=' {
                        TokenKind::EqEq
                    } else {
                        TokenKind::GtEq
                    }
                } else {
                    TokenKind::Other(ch)
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut text = String::from(c);
                while let Some((_, d)) = chars.next_if(|&(_, d)| d.is_ascii_digit() || d == '.') {
                    text.push(d);
                }
                TokenKind::Number(text)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::from(c);
                while let Some((_, d)) =
                    chars.next_if(|&(_, d)| d.is_ascii_alphanumeric() || d == '_')
                {
                    text.push(d);
                }
                TokenKind::Ident(text)
            }
            other => TokenKind::Other(other),
        };
        tokens.push(Token { kind, offset });
    }

    tokens
}

fn parse_number(text: &str) -> Result<Decimal, PredicateError> {
    parse_literal(text).ok_or_else(|| PredicateError::InvalidNumber(text.to_string()))
}

/// Parse an unsigned literal of digits with at most one decimal point.
///
/// Literals past the `Decimal` range saturate to `Decimal::MAX`, so an
/// oversized threshold stays a threshold.
pub(crate) fn parse_literal(text: &str) -> Option<Decimal> {
    let well_formed = text.chars().any(|c| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_digit() || c == '.')
        && text.matches('.').count() <= 1;
    if !well_formed {
        return None;
    }

    let trimmed = text.trim_end_matches('.');
    let canonical = if trimmed.starts_with('.') {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    };
    Some(Decimal::from_str(&canonical).unwrap_or(Decimal::MAX))
}

// =============================================================================
// Parser
// =============================================================================

enum Clause {
    Region(String),
    Total(Decimal),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    const fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(token: Option<&Token>, expected: &'static str) -> PredicateError {
        match token {
            None => PredicateError::Unexpected {
                found: "end of input".to_string(),
                offset: usize::MAX,
                expected,
            },
            Some(Token {
                kind: TokenKind::Unterminated,
                offset,
            }) => PredicateError::UnterminatedString(*offset),
            Some(token) => PredicateError::Unexpected {
                found: token.describe(),
                offset: token.offset,
                expected,
            },
        }
    }

    fn parse(mut self) -> Result<FreeShippingPredicate, PredicateError> {
        match self.tokens {
            [] => return Err(PredicateError::Empty),
            [only] if only.is_word("true") => return Ok(FreeShippingPredicate::ALWAYS),
            _ => {}
        }

        let mut region: Option<String> = None;
        let mut total: Option<Decimal> = None;

        loop {
            match self.clause()? {
                Clause::Region(value) => {
                    if region.replace(value).is_some() {
                        return Err(PredicateError::DuplicateClause("region"));
                    }
                }
                Clause::Total(value) => {
                    if total.replace(value).is_some() {
                        return Err(PredicateError::DuplicateClause("total"));
                    }
                }
            }

            match self.next() {
                None => break,
                Some(token) if token.is_word("and") => {}
                other => return Err(Self::unexpected(other, "`and` or end of input")),
            }
        }

        Ok(FreeShippingPredicate::new(region, total))
    }

    fn clause(&mut self) -> Result<Clause, PredicateError> {
        match self.next() {
            Some(token) if token.is_word("region") => {
                self.expect(&TokenKind::EqEq, "`==`")?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Str(value),
                        ..
                    }) => Ok(Clause::Region(value.clone())),
                    other => Err(Self::unexpected(other, "a quoted region code")),
                }
            }
            Some(token) if token.is_word("total") => {
                self.expect(&TokenKind::GtEq, "`>=`")?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Number(text),
                        ..
                    }) => parse_number(text).map(Clause::Total),
                    other => Err(Self::unexpected(other, "a number")),
                }
            }
            other => Err(Self::unexpected(other, "`region` or `total`")),
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<(), PredicateError> {
        match self.next() {
            Some(token) if &token.kind == kind => Ok(()),
            other => Err(Self::unexpected(other, expected)),
        }
    }
}

/// Pick out the first well-formed `region` and `total` clauses anywhere in
/// the token stream.
fn scan_clauses(tokens: &[Token]) -> FreeShippingPredicate {
    let region = tokens.windows(3).find_map(|window| match window {
        [key, op, value] if key.is_word("region") && op.kind == TokenKind::EqEq => {
            match &value.kind {
                TokenKind::Str(code) => Some(code.clone()),
                _ => None,
            }
        }
        _ => None,
    });

    let total = tokens.windows(3).find_map(|window| match window {
        [key, op, value] if key.is_word("total") && op.kind == TokenKind::GtEq => {
            match &value.kind {
                TokenKind::Number(text) => parse_number(text).ok(),
                _ => None,
            }
        }
        _ => None,
    });

    FreeShippingPredicate::new(region, total)
}
