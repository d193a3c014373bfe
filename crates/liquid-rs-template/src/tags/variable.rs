//! `assign` and `capture`: tags that write variables.
//!
//! Both write to the outermost scope so the value outlives the block that
//! set it.

use liquid_rs_core::{LiquidError, LiquidResult};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::expression::FilteredExpression;
use crate::parser::{Node, NodeList, Parser};
use crate::value::Value;

static ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(\w+)\s*=\s*(.*?)\s*$").expect("valid regex"));

static CAPTURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)").expect("valid regex"));

#[derive(Debug)]
pub struct AssignNode {
    target: String,
    source: FilteredExpression,
}

impl Node for AssignNode {
    fn name(&self) -> &str {
        "assign"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let value = self.source.evaluate(ctx)?;
        ctx.set_global(self.target.clone(), value);
        Ok(String::new())
    }
}

/// `assign var = expression | filters`
pub fn parse_assign(markup: &str, _parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let caps = ASSIGN.captures(markup).ok_or_else(|| {
        LiquidError::syntax("Syntax Error in 'assign' - Valid syntax: assign [var] = [source]")
    })?;
    Ok(Box::new(AssignNode {
        target: caps[1].to_string(),
        source: FilteredExpression::parse(&caps[2])?,
    }))
}

#[derive(Debug)]
pub struct CaptureNode {
    target: String,
    body: NodeList,
}

impl Node for CaptureNode {
    fn name(&self) -> &str {
        "capture"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let output = self.body.render(ctx)?;
        ctx.set_global(self.target.clone(), Value::String(output));
        Ok(String::new())
    }

    fn is_volatile(&self) -> bool {
        self.body.is_volatile()
    }

    fn contains_block(&self) -> bool {
        self.body.contains_block()
    }
}

/// `capture var` ... `endcapture`
pub fn parse_capture(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let caps = CAPTURE.captures(markup).ok_or_else(|| {
        LiquidError::syntax("Syntax Error in 'capture' - Valid syntax: capture [var] [value]")
    })?;
    let target = caps[1].to_string();
    let (body, _) = parser.parse_body("capture", &["endcapture"])?;
    Ok(Box::new(CaptureNode { target, body }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::tags::test_support::{render, try_render};

    #[test]
    fn test_assign_literal() {
        assert_eq!(render("{% assign a = 'x' %}{{ a }}", json!({})), "x");
        assert_eq!(render("{% assign n = 3 %}{{ n | plus: 1 }}", json!({})), "4");
    }

    #[test]
    fn test_assign_with_filters() {
        let text = "{% assign shout = name | upcase | append: '!' %}{{ shout }}";
        assert_eq!(render(text, json!({"name": "hey"})), "HEY!");
    }

    #[test]
    fn test_assign_keeps_structure() {
        let text = "{% assign parts = 'a,b,c' | split: ',' %}{{ parts.size }}{{ parts[1] }}";
        assert_eq!(render(text, json!({})), "3b");
    }

    #[test]
    fn test_assign_inside_block_is_global() {
        let text = "{% if true %}{% assign v = 'in' %}{% endif %}{{ v }}";
        assert_eq!(render(text, json!({})), "in");
    }

    #[test]
    fn test_assign_syntax_error() {
        let err = try_render("{% assign = 1 %}", json!({})).unwrap_err();
        assert!(err.to_string().contains("Valid syntax: assign [var] = [source]"));
    }

    #[test]
    fn test_capture() {
        let text = "{% capture 'var' %}test string{% endcapture %}{{var}}";
        assert_eq!(render(text, json!({})), "test string");
    }

    #[test]
    fn test_capture_renders_nothing_itself() {
        let text = "[{% capture greeting %}Hello {{ name }}{% endcapture %}]{{ greeting }}";
        assert_eq!(render(text, json!({"name": "Ann"})), "[]Hello Ann");
    }

    #[test]
    fn test_capture_to_variable_from_outer_scope() {
        let text = "{% assign var = '' %}{% if true %}{% capture var %}first-block-string{% endcapture %}{% endif %}\
                    {% if true %}{% capture var %}test-string{% endcapture %}{% endif %}{{var}}";
        assert_eq!(render(text, json!({})), "test-string");
    }

    #[test]
    fn test_capture_syntax_error() {
        let err = try_render("{% capture %}x{% endcapture %}", json!({})).unwrap_err();
        assert!(err.is_parse_error());
    }
}
