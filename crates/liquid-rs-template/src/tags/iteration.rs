//! `for` loops.

use std::collections::BTreeMap;

use liquid_rs_core::{LiquidError, LiquidResult};
use once_cell::sync::Lazy;
use regex::Regex;

use super::QUOTED_FRAGMENT;
use crate::context::Context;
use crate::expression::Expression;
use crate::parser::{Node, NodeList, Parser};
use crate::value::Value;

static FOR_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s)^\s*(\w+)\s+in\s+(\([^)]*\)|{QUOTED_FRAGMENT})\s*(.*)$"
    ))
    .expect("valid regex")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(\w+)\s*:\s*({QUOTED_FRAGMENT})")).expect("valid regex")
});

#[derive(Debug)]
pub struct ForNode {
    variable: String,
    collection: Expression,
    reversed: bool,
    limit: Option<Expression>,
    offset: Option<Expression>,
    body: NodeList,
    otherwise: Option<NodeList>,
}

impl ForNode {
    fn items(&self, ctx: &Context) -> Vec<Value> {
        let offset = self
            .offset
            .as_ref()
            .and_then(|e| e.evaluate(ctx).as_integer())
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let limit = self
            .limit
            .as_ref()
            .and_then(|e| e.evaluate(ctx).as_integer())
            .and_then(|n| usize::try_from(n).ok());

        let limit = limit.unwrap_or(usize::MAX);
        let mut items = match self.collection.range_window(ctx, offset, limit) {
            Some(items) => items,
            None => self
                .collection
                .evaluate(ctx)
                .to_items()
                .into_iter()
                .skip(offset)
                .take(limit)
                .collect(),
        };
        if self.reversed {
            items.reverse();
        }
        items
    }
}

fn forloop(index: usize, length: usize) -> Value {
    Value::Dict(BTreeMap::from([
        ("index".to_string(), Value::from(index + 1)),
        ("index0".to_string(), Value::from(index)),
        ("rindex".to_string(), Value::from(length - index)),
        ("rindex0".to_string(), Value::from(length - index - 1)),
        ("first".to_string(), Value::Bool(index == 0)),
        ("last".to_string(), Value::Bool(index + 1 == length)),
        ("length".to_string(), Value::from(length)),
    ]))
}

impl Node for ForNode {
    fn name(&self) -> &str {
        "for"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let items = self.items(ctx);
        if items.is_empty() {
            return match &self.otherwise {
                Some(body) => ctx.scoped(|ctx| body.render(ctx)),
                None => Ok(String::new()),
            };
        }

        let length = items.len();
        let mut output = String::new();
        for (index, item) in items.into_iter().enumerate() {
            output.push_str(&ctx.scoped(|ctx| {
                ctx.set(self.variable.clone(), item);
                ctx.set("forloop", forloop(index, length));
                self.body.render(ctx)
            })?);
        }
        Ok(output)
    }

    fn is_volatile(&self) -> bool {
        self.body.is_volatile() || self.otherwise.as_ref().is_some_and(NodeList::is_volatile)
    }

    fn contains_block(&self) -> bool {
        self.body.contains_block() || self.otherwise.as_ref().is_some_and(NodeList::contains_block)
    }
}

/// `for item in collection [reversed] [limit: n] [offset: n]` ... `[else]` ... `endfor`
pub fn parse_for(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let caps = FOR_SYNTAX.captures(markup).ok_or_else(|| {
        LiquidError::syntax("Syntax Error in 'for loop' - Valid syntax: for [item] in [collection]")
    })?;
    let variable = caps[1].to_string();
    let collection = Expression::parse(&caps[2])?;
    let options = caps.get(3).map_or("", |m| m.as_str());

    let reversed = options.split_whitespace().any(|word| word == "reversed");
    let mut limit = None;
    let mut offset = None;
    for attr in ATTRIBUTE.captures_iter(options) {
        let value = Expression::parse(&attr[2])?;
        match &attr[1] {
            "limit" => limit = Some(value),
            "offset" => offset = Some(value),
            _ => {}
        }
    }

    let (body, terminator) = parser.parse_body("for", &["else", "endfor"])?;
    let otherwise = match terminator {
        Some(t) if t.name == "else" => Some(parser.parse_body("for", &["endfor"])?.0),
        _ => None,
    };

    Ok(Box::new(ForNode {
        variable,
        collection,
        reversed,
        limit,
        offset,
        body,
        otherwise,
    }))
}
