//! `case` / `when`: multi-way equality dispatch.

use liquid_rs_core::{LiquidError, LiquidResult};

use crate::context::Context;
use crate::expression::Expression;
use crate::parser::{Node, NodeList, Parser};

#[derive(Debug)]
struct When {
    values: Vec<Expression>,
    body: NodeList,
}

#[derive(Debug)]
pub struct CaseNode {
    subject: Expression,
    whens: Vec<When>,
    otherwise: Option<NodeList>,
}

impl Node for CaseNode {
    fn name(&self) -> &str {
        "case"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let subject = self.subject.evaluate(ctx);
        for when in &self.whens {
            for value in &when.values {
                if subject.liquid_eq(&value.evaluate(ctx))? {
                    return ctx.scoped(|ctx| when.body.render(ctx));
                }
            }
        }
        match &self.otherwise {
            Some(body) => ctx.scoped(|ctx| body.render(ctx)),
            None => Ok(String::new()),
        }
    }

    fn is_volatile(&self) -> bool {
        self.whens.iter().any(|w| w.body.is_volatile())
            || self.otherwise.as_ref().is_some_and(NodeList::is_volatile)
    }

    fn contains_block(&self) -> bool {
        self.whens.iter().any(|w| w.body.contains_block())
            || self.otherwise.as_ref().is_some_and(NodeList::contains_block)
    }
}

pub fn parse_case(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let subject = Expression::parse(markup).map_err(|_| {
        LiquidError::syntax("Syntax Error in tag 'case' - Valid syntax: case [condition]")
    })?;

    // Anything between `case` and the first `when` is dropped.
    let (_, mut terminator) = parser.parse_body("case", &["when", "else", "endcase"])?;

    let mut whens = Vec::new();
    let mut otherwise = None;
    while let Some(t) = terminator.take() {
        match t.name.as_str() {
            "when" => {
                let values = when_values(&t.markup)?;
                let (body, next) = parser.parse_body("case", &["when", "else", "endcase"])?;
                whens.push(When { values, body });
                terminator = next;
            }
            "else" => {
                let (body, _) = parser.parse_body("case", &["endcase"])?;
                otherwise = Some(body);
            }
            _ => {}
        }
    }

    Ok(Box::new(CaseNode {
        subject,
        whens,
        otherwise,
    }))
}

/// Splits `when` markup on commas and `or`, keeping quoted values whole.
///
/// Separators need no surrounding whitespace: `"a"or"b"` is two values.
fn when_values(markup: &str) -> LiquidResult<Vec<Expression>> {
    let mut values = Vec::new();
    let mut rest = markup;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
            continue;
        }
        if !values.is_empty() {
            if let Some(after) = rest.strip_prefix("or") {
                if !after.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
                    rest = after;
                    continue;
                }
            }
        }
        let len = fragment_len(rest);
        values.push(Expression::parse(&rest[..len])?);
        rest = &rest[len..];
    }

    if values.is_empty() {
        return Err(LiquidError::syntax(
            "Syntax Error in tag 'case' - Valid when condition: when [condition]",
        ));
    }
    Ok(values)
}

fn fragment_len(s: &str) -> usize {
    if let Some(quote) = s.chars().next().filter(|c| *c == '"' || *c == '\'') {
        return s[1..].find(quote).map_or(s.len(), |i| i + 2);
    }
    s.find(|c: char| c.is_whitespace() || matches!(c, ',' | '"' | '\''))
        .unwrap_or(s.len())
}
