//! Tags that remember something between renders: `cycle`, `increment`,
//! `decrement` and `ifchanged`.
//!
//! `cycle` keeps its position in the context's `"cycle"` register, so one
//! parsed tree can be rendered concurrently. `ifchanged` keeps its last
//! output on the node itself; see [`IfChangedNode`].

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use liquid_rs_core::{LiquidError, LiquidResult};
use once_cell::sync::Lazy;
use regex::Regex;

use super::QUOTED_FRAGMENT;
use crate::context::Context;
use crate::expression::{split_outside_quotes, Expression};
use crate::parser::{Node, NodeList, Parser};
use crate::value::Value;

/// Register holding a map of cycle key to next position.
pub const CYCLE_REGISTER: &str = "cycle";

static NAMED_CYCLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)^\s*({QUOTED_FRAGMENT})\s*:\s*(.*)$")).expect("valid regex")
});

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([\w-]+)\s*$").expect("valid regex"));

// ============================================================
// cycle
// ============================================================

#[derive(Debug)]
pub struct CycleNode {
    key: Expression,
    values: Vec<Expression>,
}

impl Node for CycleNode {
    fn name(&self) -> &str {
        "cycle"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let key = self.key.evaluate(ctx).to_display_string();
        let stored = match ctx.register(CYCLE_REGISTER) {
            Some(Value::Dict(positions)) => positions
                .get(&key)
                .and_then(Value::as_integer)
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or(0),
            _ => 0,
        };
        let position = stored % self.values.len();

        let output = self.values[position].evaluate(ctx).to_display_string();

        let next = Value::from((position + 1) % self.values.len());
        match ctx.register_mut(CYCLE_REGISTER) {
            Value::Dict(positions) => {
                positions.insert(key, next);
            }
            register => *register = Value::Dict(BTreeMap::from([(key, next)])),
        }
        Ok(output)
    }
}

/// `cycle [name:] value, value, ...`
///
/// Without a name, cycles sharing the same value list share a position.
pub fn parse_cycle(markup: &str, _parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let invalid = || {
        LiquidError::syntax(
            "Syntax Error in 'cycle' - Valid syntax: cycle [name :] var [, var2, var3 ...]",
        )
    };

    let (key, list) = match NAMED_CYCLE.captures(markup) {
        Some(caps) => {
            let key = Expression::parse(&caps[1])?;
            let list = caps.get(2).map_or("", |m| m.as_str());
            (Some(key), list)
        }
        None => (None, markup),
    };

    let raw: Vec<&str> = split_outside_quotes(list, ',')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if raw.is_empty() {
        return Err(invalid());
    }
    let values = raw
        .iter()
        .map(|s| Expression::parse(s))
        .collect::<LiquidResult<Vec<_>>>()?;

    let key = key.unwrap_or_else(|| Expression::Literal(Value::String(format!("'{}'", raw.concat()))));
    Ok(Box::new(CycleNode { key, values }))
}

// ============================================================
// increment / decrement
// ============================================================

/// `increment var` / `decrement var`.
///
/// The counter lives in the outermost scope. On first use it starts from
/// whatever `var` currently resolves to, or from `-1` (increment) / `0`
/// (decrement) when unset, so the first increment yields `0`.
#[derive(Debug)]
pub struct CounterNode {
    tag: &'static str,
    variable: String,
    delta: i64,
    initial: i64,
}

impl Node for CounterNode {
    fn name(&self) -> &str {
        self.tag
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let current = ctx
            .get_global(&self.variable)
            .or_else(|| ctx.get(&self.variable))
            .cloned()
            .unwrap_or(Value::Integer(self.initial));

        let next = match current.canonical().as_ref() {
            Value::Nil => Value::Integer(self.initial + self.delta),
            #[allow(clippy::cast_precision_loss)]
            Value::Float(f) => Value::Float(f + self.delta as f64),
            other => {
                let n = other.as_integer().ok_or_else(|| {
                    LiquidError::render(format!(
                        "Cannot {} '{}': not a number",
                        self.tag, self.variable
                    ))
                })?;
                Value::Integer(n.saturating_add(self.delta))
            }
        };
        ctx.set_global(self.variable.clone(), next);
        Ok(String::new())
    }
}

pub fn parse_increment(markup: &str, _parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    parse_counter("increment", 1, -1, markup)
}

pub fn parse_decrement(markup: &str, _parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    parse_counter("decrement", -1, 0, markup)
}

fn parse_counter(
    tag: &'static str,
    delta: i64,
    initial: i64,
    markup: &str,
) -> LiquidResult<Box<dyn Node>> {
    let caps = VARIABLE_NAME.captures(markup).ok_or_else(|| {
        LiquidError::syntax(format!("Syntax Error in '{tag}' - Valid syntax: {tag} [var]"))
    })?;
    Ok(Box::new(CounterNode {
        tag,
        variable: caps[1].to_string(),
        delta,
        initial,
    }))
}

// ============================================================
// ifchanged
// ============================================================

/// `ifchanged` ... `endifchanged`: outputs its body only when it differs
/// from what the same node produced last time.
///
/// The last output is stored on the node, not in the context. Two
/// concurrent renders of one parsed tree therefore race on it: the mutex
/// keeps each access sound but the "previous" value may come from the
/// other render. Give each concurrent render its own parse if that
/// matters.
#[derive(Debug)]
pub struct IfChangedNode {
    body: NodeList,
    last: Mutex<String>,
}

impl Node for IfChangedNode {
    fn name(&self) -> &str {
        "ifchanged"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let output = self.body.render(ctx)?;
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == output {
            return Ok(String::new());
        }
        last.clone_from(&output);
        Ok(output)
    }

    fn is_volatile(&self) -> bool {
        self.body.is_volatile()
    }

    fn contains_block(&self) -> bool {
        self.body.contains_block()
    }
}

pub fn parse_ifchanged(_markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let (body, _) = parser.parse_body("ifchanged", &["endifchanged"])?;
    Ok(Box::new(IfChangedNode {
        body,
        last: Mutex::new(String::new()),
    }))
}
