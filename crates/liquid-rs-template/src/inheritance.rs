//! Template inheritance: `extends` and `block`.
//!
//! `extends` is resolved while parsing. The child's remaining tokens are
//! scanned for `block` definitions, and each one replaces the body of the
//! parent's block of the same name at the token level. The spliced token
//! stream is then parsed as a single document. When the parent extends a
//! grandparent in turn, the child's tokens are appended to the parent's
//! and the parent's own `extends` repeats the process one level up.

use std::collections::HashMap;

use liquid_rs_core::{LiquidError, LiquidResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::cache::TemplateDependency;
use crate::context::Context;
use crate::expression::strip_quotes;
use crate::lexer::Token;
use crate::parser::{Node, NodeList, Parser};

static EXTENDS_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*("[^"]+"|'[^']+')"#).expect("valid regex"));

static BLOCK_SYNTAX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)").expect("valid regex"));

fn block_name(markup: &str) -> LiquidResult<String> {
    BLOCK_SYNTAX
        .captures(markup)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| LiquidError::syntax("Syntax Error in 'block' - Valid syntax: block [name]"))
}

/// Collects the tokens strictly between a `block` tag and its matching
/// `endblock`. `start` points just past the opening tag. Returns the inner
/// tokens and the index of the closing tag, if there is one.
fn block_body(tokens: &[Token], start: usize) -> (&[Token], Option<usize>) {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        match token.tag_name() {
            Some("block") => depth += 1,
            Some("endblock") if depth == 0 => {
                let end = start + offset;
                return (&tokens[start..end], Some(end));
            }
            Some("endblock") => depth -= 1,
            _ => {}
        }
    }
    (&tokens[start..], None)
}

/// Maps each top-level block defined in `tokens` to its body. A later
/// definition of the same name replaces an earlier one.
fn find_blocks(tokens: &[Token]) -> LiquidResult<HashMap<String, Vec<Token>>> {
    let mut blocks = HashMap::new();
    let mut pos = 0;
    while let Some(token) = tokens.get(pos) {
        if token.tag_name() != Some("block") {
            pos += 1;
            continue;
        }
        let name = block_name(token.tag_markup().unwrap_or_default())?;
        let (body, end) = block_body(tokens, pos + 1);
        let Some(end) = end else {
            return Err(LiquidError::syntax("block tag was never closed"));
        };
        blocks.insert(name, body.to_vec());
        pos = end + 1;
    }
    Ok(blocks)
}

/// Rebuilds `parent` with the bodies of overridden blocks swapped out.
fn splice(parent: &[Token], overrides: &HashMap<String, Vec<Token>>) -> LiquidResult<Vec<Token>> {
    let mut merged = Vec::with_capacity(parent.len());
    let mut pos = 0;
    while let Some(token) = parent.get(pos) {
        pos += 1;
        merged.push(token.clone());
        if token.tag_name() != Some("block") {
            continue;
        }
        let name = block_name(token.tag_markup().unwrap_or_default())?;
        let Some(body) = overrides.get(&name) else {
            continue;
        };
        merged.extend(body.iter().cloned());
        // Skip the parent's own body; its closing tag is kept.
        match block_body(parent, pos) {
            (_, Some(end)) => pos = end,
            (_, None) => pos = parent.len(),
        }
    }
    Ok(merged)
}

/// Builds the token stream to parse in place of the child.
fn inherit(parent: Vec<Token>, child: &[Token]) -> LiquidResult<Vec<Token>> {
    if parent.iter().any(|t| t.tag_name() == Some("extends")) {
        let mut merged = parent;
        merged.extend(child.iter().cloned());
        return Ok(merged);
    }
    splice(&parent, &find_blocks(child)?)
}

/// The merged parent document, rendered in place of the child.
#[derive(Debug)]
pub struct ExtendsNode {
    parent: String,
    dependency: TemplateDependency,
}

impl ExtendsNode {
    pub fn parent(&self) -> &str {
        &self.parent
    }
}

impl Node for ExtendsNode {
    fn name(&self) -> &str {
        "extends"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        ctx.scoped(|ctx| self.dependency.document().render(ctx))
    }

    fn is_volatile(&self) -> bool {
        self.dependency.is_volatile()
    }
}

/// `extends 'parent'`. Consumes every token after it.
pub fn parse_extends(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let caps = EXTENDS_SYNTAX.captures(markup).ok_or_else(|| {
        LiquidError::syntax("Error in tag 'extends' - Valid syntax: extends '[template name]'")
    })?;
    let parent = strip_quotes(&caps[1]).to_string();
    let child = parser.take_remaining();

    debug!(parent = %parent, depth = parser.depth(), "resolving extends");
    let dependency = parser
        .engine()
        .load_dependency(&parent, parser.depth(), |tokens| inherit(tokens, child))?;

    Ok(Box::new(ExtendsNode { parent, dependency }))
}

/// A named, overridable region.
#[derive(Debug)]
pub struct BlockNode {
    block: String,
    body: NodeList,
}

impl BlockNode {
    pub fn block_name(&self) -> &str {
        &self.block
    }
}

impl Node for BlockNode {
    fn name(&self) -> &str {
        "block"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        self.body.render(ctx)
    }

    fn is_volatile(&self) -> bool {
        self.body.is_volatile()
    }

    fn contains_block(&self) -> bool {
        true
    }
}

/// `block name` ... `endblock`
pub fn parse_block(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let block = block_name(markup)?;
    let (body, _) = parser.parse_body("block", &["endblock"])?;
    Ok(Box::new(BlockNode { block, body }))
}
