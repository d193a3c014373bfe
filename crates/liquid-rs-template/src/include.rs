//! The `include` tag.
//!
//! ```text
//! {% include 'name' %}
//! {% include 'name' with value attr: expr %}
//! {% include 'name' for collection attr: expr %}
//! ```
//!
//! The included template is loaded and parsed while the including template
//! is parsed, so a missing partial is a parse error. At render time the
//! partial's document runs in a fresh scope holding the attributes; with
//! `with`, the value is also bound to a variable named after the template,
//! and with `for` the document renders once per item.

use liquid_rs_core::{LiquidError, LiquidResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::cache::TemplateDependency;
use crate::context::Context;
use crate::expression::{strip_quotes, Expression};
use crate::parser::{Node, Parser};
use crate::tags::QUOTED_FRAGMENT;

static INCLUDE_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^\s*("[^"]+"|'[^']+'|[^'"\s]+)(?:\s+(with|for)\s+({QUOTED_FRAGMENT}))?"#
    ))
    .expect("valid regex")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(\w+)\s*:\s*({QUOTED_FRAGMENT})")).expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    With,
    For,
}

#[derive(Debug)]
pub struct IncludeNode {
    template_name: String,
    binding: Option<(Binding, Expression)>,
    attributes: Vec<(String, Expression)>,
    dependency: TemplateDependency,
}

impl IncludeNode {
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub const fn dependency(&self) -> &TemplateDependency {
        &self.dependency
    }
}

impl Node for IncludeNode {
    fn name(&self) -> &str {
        "include"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let document = self.dependency.document();
        // The binding resolves against the caller's scope, before any
        // attribute can shadow it.
        let bound = self
            .binding
            .as_ref()
            .map(|(binding, expression)| (*binding, expression.evaluate(ctx)));

        ctx.scoped(|ctx| {
            for (key, expression) in &self.attributes {
                let value = expression.evaluate(ctx);
                ctx.set(key.clone(), value);
            }

            match bound {
                Some((Binding::For, value)) => {
                    let mut output = String::new();
                    for item in value.to_items() {
                        ctx.set(self.template_name.clone(), item);
                        output.push_str(&document.render(ctx)?);
                    }
                    Ok(output)
                }
                Some((Binding::With, value)) => {
                    ctx.set(self.template_name.clone(), value);
                    document.render(ctx)
                }
                None => document.render(ctx),
            }
        })
    }

    fn is_volatile(&self) -> bool {
        self.dependency.is_volatile()
    }
}

/// `include 'name' [(with|for) expression] [attr: expression ...]`
pub fn parse_include(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let caps = INCLUDE_SYNTAX.captures(markup).ok_or_else(|| {
        LiquidError::syntax(
            "Error in tag 'include' - Valid syntax: include '[template]' (with|for) [object|collection]",
        )
    })?;

    let template_name = strip_quotes(&caps[1]).to_string();
    let binding = match (caps.get(2), caps.get(3)) {
        (Some(keyword), Some(expression)) => {
            let kind = if keyword.as_str() == "for" {
                Binding::For
            } else {
                Binding::With
            };
            Some((kind, Expression::parse(expression.as_str())?))
        }
        _ => None,
    };

    let rest = &markup[caps.get(0).map_or(0, |m| m.end())..];
    let attributes = ATTRIBUTE
        .captures_iter(rest)
        .map(|attr| Ok((attr[1].to_string(), Expression::parse(&attr[2])?)))
        .collect::<LiquidResult<Vec<_>>>()?;

    debug!(template = %template_name, depth = parser.depth(), "resolving include");
    let dependency = parser
        .engine()
        .load_dependency(&template_name, parser.depth(), Ok)?;

    Ok(Box::new(IncludeNode {
        template_name,
        binding,
        attributes,
        dependency,
    }))
}
