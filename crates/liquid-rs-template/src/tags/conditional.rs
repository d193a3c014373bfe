//! `if` / `unless` and the condition grammar they share.
//!
//! A condition is a chain of comparisons joined by `and`/`or`. The chain is
//! folded strictly left to right with no precedence: `a or b and c` means
//! `(a or b) and c`.

use liquid_rs_core::{LiquidError, LiquidResult};
use once_cell::sync::Lazy;
use regex::Regex;

use super::QUOTED_FRAGMENT;
use crate::context::Context;
use crate::expression::Expression;
use crate::parser::{Node, NodeList, Parser};
use crate::value::Value;

static LOGICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(and|or)\s+").expect("valid regex"));

/// A left operand. Unquoted runs stop at operator characters so that
/// `a==b` still splits around `==`.
const LEFT_OPERAND: &str = r#""[^"]*"|'[^']*'|(?:[^\s,\|'"=!<>]|"[^"]*"|'[^']*')+"#;

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*({LEFT_OPERAND})\s*(?:([=!<>]+|[a-z_]+)\s*({QUOTED_FRAGMENT}))?\s*$"
    ))
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "contains" => Self::Contains,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logical {
    And,
    Or,
}

/// One side-by-side test: a bare value or `left op right`.
#[derive(Debug)]
struct Comparison {
    left: Expression,
    test: Option<(Operator, Expression)>,
}

impl Comparison {
    fn parse(markup: &str, tag: &str) -> LiquidResult<Self> {
        let invalid = || {
            LiquidError::syntax(format!(
                "Syntax Error in tag '{tag}' - Valid syntax: {tag} [condition]"
            ))
        };
        let caps = COMPARISON.captures(markup).ok_or_else(invalid)?;
        let left = Expression::parse(&caps[1])?;
        let test = match (caps.get(2), caps.get(3)) {
            (Some(op), Some(right)) => {
                let operator = Operator::parse(op.as_str()).ok_or_else(|| {
                    LiquidError::syntax(format!("Unknown operator {} in tag '{tag}'", op.as_str()))
                })?;
                Some((operator, Expression::parse(right.as_str())?))
            }
            _ => None,
        };
        Ok(Self { left, test })
    }

    fn evaluate(&self, ctx: &Context) -> LiquidResult<bool> {
        let Some((operator, right)) = &self.test else {
            return Ok(self.left.evaluate(ctx).is_truthy());
        };

        match (&self.left, right) {
            (Expression::Empty, other) | (other, Expression::Empty) => {
                let is_empty = other.evaluate(ctx).is_empty_collection();
                return Ok(match operator {
                    Operator::Eq => is_empty,
                    Operator::Ne => !is_empty,
                    _ => false,
                });
            }
            _ => {}
        }

        let (left, right) = (self.left.evaluate(ctx), right.evaluate(ctx));
        compare(&left, *operator, &right)
    }
}

fn compare(left: &Value, operator: Operator, right: &Value) -> LiquidResult<bool> {
    use std::cmp::Ordering;

    let ordered = |accept: fn(Ordering) -> bool| -> LiquidResult<bool> {
        Ok(left.liquid_cmp(right)?.is_some_and(accept))
    };
    match operator {
        Operator::Eq => left.liquid_eq(right),
        Operator::Ne => left.liquid_eq(right).map(|eq| !eq),
        Operator::Lt => ordered(Ordering::is_lt),
        Operator::Gt => ordered(Ordering::is_gt),
        Operator::Le => ordered(Ordering::is_le),
        Operator::Ge => ordered(Ordering::is_ge),
        Operator::Contains => left.contains(right),
    }
}

/// A parsed `and`/`or` chain.
#[derive(Debug)]
pub struct Condition {
    first: Comparison,
    rest: Vec<(Logical, Comparison)>,
}

impl Condition {
    /// Parses condition markup. `tag` names the owning tag in error messages.
    pub fn parse(markup: &str, tag: &str) -> LiquidResult<Self> {
        let mut pieces = Vec::new();
        let mut last = 0;
        let mut operators = Vec::new();
        for caps in LOGICAL.captures_iter(markup) {
            let (whole, op) = (&caps[0], &caps[1]);
            let start = caps.get(0).map_or(last, |m| m.start());
            pieces.push(&markup[last..start]);
            operators.push(if op == "and" { Logical::And } else { Logical::Or });
            last = start + whole.len();
        }
        pieces.push(&markup[last..]);

        let mut comparisons = pieces.into_iter().map(|p| Comparison::parse(p, tag));
        let first = comparisons
            .next()
            .unwrap_or_else(|| Comparison::parse("", tag))?;
        let rest = operators
            .into_iter()
            .zip(comparisons)
            .map(|(op, cmp)| cmp.map(|c| (op, c)))
            .collect::<LiquidResult<_>>()?;
        Ok(Self { first, rest })
    }

    /// Evaluates the chain against the context.
    pub fn evaluate(&self, ctx: &Context) -> LiquidResult<bool> {
        let mut result = self.first.evaluate(ctx)?;
        for (op, comparison) in &self.rest {
            result = match op {
                Logical::And => result && comparison.evaluate(ctx)?,
                Logical::Or => result || comparison.evaluate(ctx)?,
            };
        }
        Ok(result)
    }
}

/// A branch of an `if`/`unless` chain. `else` has no condition.
#[derive(Debug)]
struct Branch {
    condition: Option<Condition>,
    body: NodeList,
}

/// `if` and `unless`.
#[derive(Debug)]
pub struct IfNode {
    tag: &'static str,
    negate: bool,
    branches: Vec<Branch>,
}

impl Node for IfNode {
    fn name(&self) -> &str {
        self.tag
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        ctx.scoped(|ctx| {
            for branch in &self.branches {
                let taken = match &branch.condition {
                    Some(condition) => condition.evaluate(ctx)? != self.negate,
                    None => true,
                };
                if taken {
                    return branch.body.render(ctx);
                }
            }
            Ok(String::new())
        })
    }

    fn is_volatile(&self) -> bool {
        self.branches.iter().any(|b| b.body.is_volatile())
    }

    fn contains_block(&self) -> bool {
        self.branches.iter().any(|b| b.body.contains_block())
    }
}

pub fn parse_if(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    parse_branches("if", false, markup, parser)
}

pub fn parse_unless(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    parse_branches("unless", true, markup, parser)
}

fn parse_branches(
    tag: &'static str,
    negate: bool,
    markup: &str,
    parser: &mut Parser<'_>,
) -> LiquidResult<Box<dyn Node>> {
    let end = format!("end{tag}");
    let open = ["elsif", "else", end.as_str()];
    let mut branches = Vec::new();
    let mut condition = Some(Condition::parse(markup, tag)?);

    loop {
        // Once `else` is seen only the end tag may follow.
        let delimiters = if condition.is_some() { &open[..] } else { &open[2..] };
        let (body, terminator) = parser.parse_body(tag, delimiters)?;
        branches.push(Branch {
            condition: condition.take(),
            body,
        });

        match terminator {
            Some(t) if t.name == "elsif" => condition = Some(Condition::parse(&t.markup, tag)?),
            Some(t) if t.name == "else" => condition = None,
            _ => break,
        }
    }

    Ok(Box::new(IfNode {
        tag,
        negate,
        branches,
    }))
}
