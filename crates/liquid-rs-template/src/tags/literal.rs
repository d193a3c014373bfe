//! `comment` and `raw`.

use liquid_rs_core::LiquidResult;

use crate::context::Context;
use crate::parser::{Node, Parser};

/// Renders nothing. The body is still parsed, so it must be well formed.
#[derive(Debug)]
pub struct CommentNode;

impl Node for CommentNode {
    fn name(&self) -> &str {
        "comment"
    }

    fn render(&self, _ctx: &mut Context) -> LiquidResult<String> {
        Ok(String::new())
    }
}

pub fn parse_comment(_markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    parser.parse_body("comment", &["endcomment"])?;
    Ok(Box::new(CommentNode))
}

/// Outputs the enclosed source untouched.
#[derive(Debug)]
pub struct RawNode(String);

impl Node for RawNode {
    fn name(&self) -> &str {
        "raw"
    }

    fn render(&self, _ctx: &mut Context) -> LiquidResult<String> {
        Ok(self.0.clone())
    }
}

pub fn parse_raw(_markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    Ok(Box::new(RawNode(parser.raw_until("raw", "endraw")?)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::tags::test_support::{render, try_render};

    #[test]
    fn test_comment() {
        let text = "a{% comment %}{{ secret }}{% if x %}y{% endif %}{% endcomment %}b";
        assert_eq!(render(text, json!({"secret": "s", "x": true})), "ab");
    }

    #[test]
    fn test_unclosed_comment() {
        let err = try_render("{% comment %}never", json!({})).unwrap_err();
        assert!(err.to_string().contains("comment tag was never closed"));
    }

    #[test]
    fn test_raw() {
        let text = "{% raw %}{{ name }} {% if %}{% endraw %}!";
        assert_eq!(render(text, json!({"name": "x"})), "{{ name }} {% if %}!");
    }

    #[test]
    fn test_unclosed_raw() {
        let err = try_render("{% raw %}{{ a }}", json!({})).unwrap_err();
        assert!(err.is_parse_error());
    }
}
