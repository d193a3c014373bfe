//! Template lexer (tokenizer).
//!
//! Splits raw template source into [`Token`]s: literal text runs, output
//! expressions (`{{ }}`) and tags (`{% %}`). Each token keeps its raw span so
//! that joining every token's [`Token::raw`] reproduces the source exactly.
//! Unterminated delimiters are not an error; they stay literal text.

use once_cell::sync::Lazy;
use regex::Regex;

static DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}").expect("valid regex"));

/// A token produced by the template lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A literal text segment.
    Text(String),
    /// An output expression: `{{ markup }}`.
    Output {
        /// The expression between the delimiters, trimmed.
        markup: String,
        /// The token exactly as it appeared in the source.
        raw: String,
    },
    /// A tag: `{% name markup %}`.
    Tag {
        /// The leading word of the tag. Empty when the tag has no name.
        name: String,
        /// Everything after the name, trimmed.
        markup: String,
        /// The token exactly as it appeared in the source.
        raw: String,
    },
}

impl Token {
    /// Returns the source text this token was cut from.
    pub fn raw(&self) -> &str {
        match self {
            Self::Text(raw) | Self::Output { raw, .. } | Self::Tag { raw, .. } => raw,
        }
    }

    /// Returns the tag name if this is a tag token.
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Self::Tag { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the tag markup if this is a tag token.
    pub fn tag_markup(&self) -> Option<&str> {
        match self {
            Self::Tag { markup, .. } => Some(markup),
            _ => None,
        }
    }

    /// `{%-` or `{{-`: whitespace before this token is stripped.
    pub fn trims_before(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Output { raw, .. } | Self::Tag { raw, .. } => raw[2..].starts_with('-'),
        }
    }

    /// `-%}` or `-}}`: whitespace after this token is stripped.
    pub fn trims_after(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Output { raw, .. } | Self::Tag { raw, .. } => {
                raw.len() >= 5 && raw[..raw.len() - 2].ends_with('-')
            }
        }
    }
}

/// Tokenizes a template source string into a sequence of [`Token`]s.
///
/// An empty source yields an empty vector.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::lexer::{tokenize, Token};
///
/// let tokens = tokenize("Hi {{ name }}!");
/// assert_eq!(tokens.len(), 3);
/// assert_eq!(tokens[0], Token::Text("Hi ".to_string()));
/// ```
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for m in DELIMITERS.find_iter(source) {
        if m.start() > last {
            tokens.push(Token::Text(source[last..m.start()].to_string()));
        }
        tokens.push(classify(m.as_str()));
        last = m.end();
    }

    if last < source.len() {
        tokens.push(Token::Text(source[last..].to_string()));
    }

    tokens
}

/// Builds an output or tag token from a matched delimiter span.
fn classify(raw: &str) -> Token {
    let inner = strip_trim_markers(&raw[2..raw.len() - 2]);

    if raw.starts_with("{{") {
        return Token::Output {
            markup: inner.to_string(),
            raw: raw.to_string(),
        };
    }

    let name_len = inner
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(inner.len(), |(i, _)| i);

    Token::Tag {
        name: inner[..name_len].to_string(),
        markup: inner[name_len..].trim().to_string(),
        raw: raw.to_string(),
    }
}

fn strip_trim_markers(inner: &str) -> &str {
    let inner = inner.strip_prefix('-').unwrap_or(inner);
    let inner = inner.strip_suffix('-').unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, markup: &str, raw: &str) -> Token {
        Token::Tag {
            name: name.to_string(),
            markup: markup.to_string(),
            raw: raw.to_string(),
        }
    }

    #[test]
    fn test_empty_source() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(tokenize("hello world"), vec![Token::Text("hello world".into())]);
    }

    #[test]
    fn test_output_token() {
        let tokens = tokenize("Hello {{ name | upcase }}!");
        assert_eq!(
            tokens,
            vec![
                Token::Text("Hello ".into()),
                Token::Output {
                    markup: "name | upcase".into(),
                    raw: "{{ name | upcase }}".into(),
                },
                Token::Text("!".into()),
            ]
        );
    }

    #[test]
    fn test_tag_token() {
        let tokens = tokenize("{% if a == b %}x{% endif %}");
        assert_eq!(
            tokens,
            vec![
                tag("if", "a == b", "{% if a == b %}"),
                Token::Text("x".into()),
                tag("endif", "", "{% endif %}"),
            ]
        );
    }

    #[test]
    fn test_tag_without_spaces() {
        let tokens = tokenize(r#"{%cycle "a","b"%}"#);
        assert_eq!(tokens, vec![tag("cycle", r#""a","b""#, r#"{%cycle "a","b"%}"#)]);
    }

    #[test]
    fn test_hyphenated_name_stops_at_hyphen() {
        let tokens = tokenize("{% unknown-tag %}");
        assert_eq!(tokens[0].tag_name(), Some("unknown"));
        assert_eq!(tokens[0].tag_markup(), Some("-tag"));
    }

    #[test]
    fn test_unterminated_delimiters_are_text() {
        let source = "a {{ b and {% c";
        assert_eq!(tokenize(source), vec![Token::Text(source.into())]);
    }

    #[test]
    fn test_multiline_tag() {
        let tokens = tokenize("{% if a\n and b %}");
        assert_eq!(tokens[0].tag_name(), Some("if"));
        assert_eq!(tokens[0].tag_markup(), Some("a\n and b"));
    }

    #[test]
    fn test_raw_spans_reconstruct_source() {
        let source = "a{{ b }}c{%- if d -%}e{% endif %}{{f}}{% g";
        let joined: String = tokenize(source).iter().map(Token::raw).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_trim_markers() {
        let tokens = tokenize("{%- if x -%}{{- y }}{{ z -}}{% w %}");
        assert!(tokens[0].trims_before());
        assert!(tokens[0].trims_after());
        assert_eq!(tokens[0].tag_name(), Some("if"));
        assert_eq!(tokens[0].tag_markup(), Some("x"));
        assert!(tokens[1].trims_before());
        assert!(!tokens[1].trims_after());
        assert!(!tokens[2].trims_before());
        assert!(tokens[2].trims_after());
        assert!(!tokens[3].trims_before());
        assert!(!tokens[3].trims_after());
    }

    #[test]
    fn test_empty_tag_has_empty_name() {
        let tokens = tokenize("{% %}");
        assert_eq!(tokens[0].tag_name(), Some(""));
    }
}
