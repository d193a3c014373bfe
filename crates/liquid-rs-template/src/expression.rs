//! Expression parsing and resolution.
//!
//! An output expression is a base value followed by a filter pipeline:
//!
//! ```text
//! product.images[0].url | img_url: '450x450', crop: 'center' | escape
//! ```
//!
//! The base is a literal, a variable path (`a.b[0][key].c`) or an integer
//! range `(1..n)`. Pipes, colons and commas inside quoted strings are
//! literal characters.

use liquid_rs_core::{LiquidError, LiquidResult};

use crate::context::Context;
use crate::filters::FilterArgs;
use crate::value::Value;

/// The most integers a range expression yields.
pub const MAX_RANGE_LEN: usize = 100_000;

/// A single value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A quoted string, number, boolean or nil.
    Literal(Value),
    /// The `empty`/`blank` keyword. Only meaningful in comparisons.
    Empty,
    /// A variable path.
    Path(VariablePath),
    /// An inclusive integer range: `(start..end)`.
    Range(Box<Expression>, Box<Expression>),
}

/// A dotted/indexed variable reference.
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePath {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

/// One step after the root of a [`VariablePath`].
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name`
    Member(String),
    /// `[expression]`
    Index(Expression),
}

impl Expression {
    /// Parses a single expression (no filters).
    pub fn parse(source: &str) -> LiquidResult<Self> {
        let s = source.trim();
        if s.is_empty() {
            return Err(LiquidError::syntax("Empty expression"));
        }

        if let Some(text) = quoted(s) {
            return Ok(Self::Literal(Value::String(text.to_string())));
        }

        match s {
            "true" => return Ok(Self::Literal(Value::Bool(true))),
            "false" => return Ok(Self::Literal(Value::Bool(false))),
            "nil" | "null" => return Ok(Self::Literal(Value::Nil)),
            "empty" | "blank" => return Ok(Self::Empty),
            _ => {}
        }

        if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            if let Some((start, end)) = inner.split_once("..") {
                return Ok(Self::Range(
                    Box::new(Self::parse(start)?),
                    Box::new(Self::parse(end)?),
                ));
            }
        }

        if let Ok(i) = s.parse::<i64>() {
            return Ok(Self::Literal(Value::Integer(i)));
        }
        if looks_like_float(s) {
            if let Ok(f) = s.parse::<f64>() {
                return Ok(Self::Literal(Value::Float(f)));
            }
        }

        VariablePath::parse(s).map(Self::Path)
    }

    /// Resolves this expression against the context.
    ///
    /// Unresolvable paths yield [`Value::Nil`].
    pub fn evaluate(&self, ctx: &Context) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Empty => Value::Nil,
            Self::Path(path) => path.evaluate(ctx),
            Self::Range(..) => {
                let items = self.range_window(ctx, 0, MAX_RANGE_LEN).unwrap_or_default();
                Value::List(items)
            }
        }
    }

    /// The integers of a range expression after skipping `offset` of them,
    /// at most `limit` (and never more than [`MAX_RANGE_LEN`]). Only the
    /// requested window is materialized. `None` for other expressions.
    pub fn range_window(&self, ctx: &Context, offset: usize, limit: usize) -> Option<Vec<Value>> {
        let Self::Range(start, end) = self else {
            return None;
        };
        let start = start.evaluate(ctx).as_integer().unwrap_or(0);
        let end = end.evaluate(ctx).as_integer().unwrap_or(0);
        let first = i64::try_from(offset).ok().and_then(|o| start.checked_add(o));
        let take = limit.min(MAX_RANGE_LEN);
        Some(match first {
            Some(first) if first <= end => (first..=end).take(take).map(Value::Integer).collect(),
            _ => Vec::new(),
        })
    }

    /// Returns the variable path if this is a plain variable reference.
    pub const fn as_path(&self) -> Option<&VariablePath> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl VariablePath {
    /// Parses `root(.member|[expr])*`.
    pub fn parse(s: &str) -> LiquidResult<Self> {
        let invalid = || LiquidError::syntax(format!("Invalid variable '{s}'"));

        let root_end = s.find(['.', '[']).unwrap_or(s.len());
        let root = &s[..root_end];
        if root.is_empty() || !is_plain_word(root) {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        let mut rest = &s[root_end..];
        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
                let name = &after_dot[..end];
                if name.is_empty() || !is_plain_word(name) {
                    return Err(invalid());
                }
                segments.push(PathSegment::Member(name.to_string()));
                rest = &after_dot[end..];
            } else if rest.starts_with('[') {
                let close = matching_bracket(rest).ok_or_else(invalid)?;
                segments.push(PathSegment::Index(Expression::parse(&rest[1..close])?));
                rest = &rest[close + 1..];
            } else {
                return Err(invalid());
            }
        }

        Ok(Self {
            root: root.to_string(),
            segments,
        })
    }

    /// Walks the scope stack for the root, then drills through each segment.
    pub fn evaluate(&self, ctx: &Context) -> Value {
        let mut value = ctx.get(&self.root).cloned().unwrap_or_default();
        for segment in &self.segments {
            value = match segment {
                PathSegment::Member(name) => value.member(name),
                PathSegment::Index(index) => value.index(&index.evaluate(ctx)),
            };
            if value.is_nil() {
                break;
            }
        }
        value
    }
}

/// One `| name: args` step of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub positional: Vec<Expression>,
    pub named: Vec<(String, Expression)>,
}

impl FilterCall {
    fn parse(s: &str) -> LiquidResult<Self> {
        let (name, arg_str) = match find_outside_quotes(s, ':') {
            Some(colon) => (s[..colon].trim(), Some(&s[colon + 1..])),
            None => (s.trim(), None),
        };
        if name.is_empty() || !is_plain_word(name) {
            return Err(LiquidError::syntax(format!("Invalid filter '{}'", s.trim())));
        }

        let mut call = Self {
            name: name.to_string(),
            positional: Vec::new(),
            named: Vec::new(),
        };
        for arg in arg_str.map(|a| split_outside_quotes(a, ',')).unwrap_or_default() {
            let arg = arg.trim();
            match find_outside_quotes(arg, ':') {
                Some(colon) if is_identifier(arg[..colon].trim()) => {
                    let key = arg[..colon].trim().to_string();
                    call.named.push((key, Expression::parse(&arg[colon + 1..])?));
                }
                _ => call.positional.push(Expression::parse(arg)?),
            }
        }
        Ok(call)
    }

    fn arguments(&self, ctx: &Context) -> FilterArgs {
        FilterArgs {
            positional: self.positional.iter().map(|e| e.evaluate(ctx)).collect(),
            named: self
                .named
                .iter()
                .map(|(k, e)| (k.clone(), e.evaluate(ctx)))
                .collect(),
        }
    }
}

/// A base expression followed by zero or more filters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredExpression {
    pub expression: Expression,
    pub filters: Vec<FilterCall>,
}

impl FilteredExpression {
    /// Parses `base | filter | filter: arg, name: arg`.
    ///
    /// ```
    /// use liquid_rs_template::expression::FilteredExpression;
    ///
    /// let parsed = FilteredExpression::parse("title | truncate: 10, '…' | upcase").unwrap();
    /// assert_eq!(parsed.filters.len(), 2);
    /// assert_eq!(parsed.filters[0].positional.len(), 2);
    /// ```
    pub fn parse(markup: &str) -> LiquidResult<Self> {
        let mut parts = split_outside_quotes(markup, '|').into_iter();
        let base = parts.next().unwrap_or_default();
        let expression = Expression::parse(base)?;
        let filters = parts.map(FilterCall::parse).collect::<LiquidResult<_>>()?;
        Ok(Self {
            expression,
            filters,
        })
    }

    /// Resolves the base and pushes it through each filter in order.
    pub fn evaluate(&self, ctx: &Context) -> LiquidResult<Value> {
        let mut value = self.expression.evaluate(ctx);
        for filter in &self.filters {
            value = ctx.apply_filter(&filter.name, value, &filter.arguments(ctx))?;
        }
        Ok(value)
    }
}

// ============================================================
// Markup helpers shared with tag parsers
// ============================================================

/// Returns the contents of a single- or double-quoted string.
pub fn quoted(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}

/// Strips one layer of matching quotes, if present.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    quoted(s).unwrap_or(s)
}

/// Splits on `sep` but not inside quoted strings.
pub fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(ch),
            (None, c) if c == sep => {
                result.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    result.push(&s[start..]);
    result
}

/// Finds the first `target` that is not inside quotes.
pub fn find_outside_quotes(s: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(ch),
            (None, c) if c == target => return Some(i),
            _ => {}
        }
    }
    None
}

/// `[A-Za-z0-9_]+`
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Path words also allow `-` and a trailing `?`, as in `has-items?`.
fn is_plain_word(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '?' | ':' | '/'))
}

fn looks_like_float(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits.split_once('.').is_some_and(|(a, b)| {
        !a.is_empty()
            && !b.is_empty()
            && a.chars().all(|c| c.is_ascii_digit())
            && b.chars().all(|c| c.is_ascii_digit())
    })
}

/// Index of the `]` closing the `[` at position 0, honouring quotes and nesting.
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
