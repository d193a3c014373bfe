//! Template parser.
//!
//! Consumes a token slice left to right and builds a tree of [`Node`]s.
//! Tags are constructed through the engine's [`TagRegistry`](crate::library::TagRegistry);
//! a block tag calls back into [`Parser::parse_body`] to collect its
//! children up to one of its delimiter tags. The parser only ever moves a
//! cursor over an immutable token slice.

use std::fmt;

use liquid_rs_core::{LiquidError, LiquidResult};
use tracing::trace;

use crate::context::Context;
use crate::engine::Engine;
use crate::expression::FilteredExpression;
use crate::lexer::Token;

/// How deeply `include`/`extends` may nest before parsing gives up.
pub const MAX_NESTING_DEPTH: usize = 64;

/// A node in the parsed template tree.
///
/// Implementations must be shareable across threads: a parsed
/// [`Document`] may sit in a cache and be rendered concurrently, each
/// render with its own [`Context`].
pub trait Node: fmt::Debug + Send + Sync {
    /// The tag name this node was built from, or `"text"`/`"output"`.
    fn name(&self) -> &str;

    /// Renders this node.
    fn render(&self, ctx: &mut Context) -> LiquidResult<String>;

    /// Whether a cached document containing this node must be re-parsed.
    ///
    /// Leaf tags are never volatile. Block tags forward to their bodies.
    fn is_volatile(&self) -> bool {
        false
    }

    /// Whether a `block` tag sits at or below this node.
    fn contains_block(&self) -> bool {
        false
    }
}

/// An ordered list of child nodes.
#[derive(Debug, Default)]
pub struct NodeList {
    nodes: Vec<Box<dyn Node>>,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Box<dyn Node>) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Node> {
        self.nodes.iter().map(AsRef::as_ref)
    }

    /// Renders each node in order, ticking once per node.
    pub fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let mut output = String::new();
        for node in &self.nodes {
            ctx.tick()?;
            output.push_str(&node.render(ctx)?);
        }
        Ok(output)
    }

    pub fn is_volatile(&self) -> bool {
        self.nodes.iter().any(|node| node.is_volatile())
    }

    /// Whether a `block` tag sits anywhere in this list, at any depth.
    pub fn contains_block(&self) -> bool {
        self.nodes.iter().any(|node| node.contains_block())
    }

    /// Whether a direct child was built from the tag `name`.
    pub fn contains_tag(&self, name: &str) -> bool {
        self.nodes.iter().any(|node| node.name() == name)
    }
}

/// The root of one parsed template unit.
#[derive(Debug, Default)]
pub struct Document {
    nodes: NodeList,
}

impl Document {
    pub const fn new(nodes: NodeList) -> Self {
        Self { nodes }
    }

    pub const fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    pub fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        self.nodes.render(ctx)
    }

    /// Whether a cached copy of this document may be stale.
    ///
    /// A document holding `block` tags, nested at any depth, but no
    /// top-level `extends` is a splice target: its rendering depends on
    /// which child extended it, so it is always volatile. Otherwise it is
    /// volatile when any node reports so, which covers changed
    /// `include`/`extends` targets.
    pub fn has_volatile_dependencies(&self) -> bool {
        if self.nodes.contains_block() && !self.nodes.contains_tag("extends") {
            return true;
        }
        self.nodes.is_volatile()
    }
}

/// The delimiter tag that ended a [`Parser::parse_body`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminator {
    pub name: String,
    pub markup: String,
}

/// A cursor over a token slice, building nodes as it goes.
pub struct Parser<'a> {
    engine: &'a Engine,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub const fn new(engine: &'a Engine, tokens: &'a [Token]) -> Self {
        Self {
            engine,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Creates a parser for a template pulled in by `include`/`extends`.
    pub(crate) fn nested(engine: &'a Engine, tokens: &'a [Token], depth: usize) -> LiquidResult<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(LiquidError::syntax(format!(
                "Templates nested deeper than {MAX_NESTING_DEPTH} levels; check for an include or extends cycle"
            )));
        }
        Ok(Self {
            engine,
            tokens,
            pos: 0,
            depth,
        })
    }

    pub const fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Nesting level of the template being parsed; 0 for the root.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Parses every token into a document.
    pub fn parse_document(mut self) -> LiquidResult<Document> {
        let (nodes, _) = self.parse_body("document", &[])?;
        Ok(Document::new(nodes))
    }

    /// Parses nodes until one of `delimiters` is reached.
    ///
    /// Returns the collected nodes and the delimiter that stopped parsing,
    /// which is consumed. With no delimiters, parsing runs to the end of the
    /// stream; otherwise running out of tokens is an error naming `block`.
    pub fn parse_body(
        &mut self,
        block: &str,
        delimiters: &[&str],
    ) -> LiquidResult<(NodeList, Option<Terminator>)> {
        let (engine, tokens) = (self.engine, self.tokens);
        let mut nodes = NodeList::new();

        while let Some(token) = tokens.get(self.pos) {
            match token {
                Token::Text(text) => {
                    if let Some(node) = self.text_node(text) {
                        nodes.push(Box::new(node));
                    }
                    self.pos += 1;
                }
                Token::Output { markup, .. } => {
                    nodes.push(Box::new(OutputNode {
                        expression: FilteredExpression::parse(markup)?,
                    }));
                    self.pos += 1;
                }
                Token::Tag { name, markup, raw } => {
                    if name.is_empty() {
                        return Err(LiquidError::syntax(format!(
                            "Tag '{raw}' was not properly terminated"
                        )));
                    }
                    self.pos += 1;
                    if delimiters.contains(&name.as_str()) {
                        return Ok((
                            nodes,
                            Some(Terminator {
                                name: name.clone(),
                                markup: markup.clone(),
                            }),
                        ));
                    }
                    let Some(constructor) = engine.tags().get(name) else {
                        return Err(unknown_tag(block, name, delimiters));
                    };
                    trace!(tag = %name, "constructing tag");
                    nodes.push(constructor(markup, self)?);
                }
            }
        }

        if delimiters.is_empty() {
            Ok((nodes, None))
        } else {
            Err(LiquidError::syntax(format!("{block} tag was never closed")))
        }
    }

    /// Concatenates the raw source of every token up to `delimiter`, which
    /// is consumed but not included.
    pub fn raw_until(&mut self, block: &str, delimiter: &str) -> LiquidResult<String> {
        let tokens = self.tokens;
        let mut raw = String::new();
        while let Some(token) = tokens.get(self.pos) {
            self.pos += 1;
            if token.tag_name() == Some(delimiter) {
                return Ok(raw);
            }
            raw.push_str(token.raw());
        }
        Err(LiquidError::syntax(format!("{block} tag was never closed")))
    }

    /// Hands over every token not yet consumed, leaving the parser at the end.
    pub fn take_remaining(&mut self) -> &'a [Token] {
        let rest = &self.tokens[self.pos.min(self.tokens.len())..];
        self.pos = self.tokens.len();
        rest
    }

    /// Applies whitespace control from the neighbouring tokens.
    fn text_node(&self, text: &str) -> Option<TextNode> {
        let prev_trims = self
            .pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .is_some_and(Token::trims_after);
        let next_trims = self.tokens.get(self.pos + 1).is_some_and(Token::trims_before);

        let mut text = text;
        if prev_trims {
            text = text.trim_start();
        }
        if next_trims {
            text = text.trim_end();
        }
        (!text.is_empty()).then(|| TextNode(text.to_string()))
    }
}

fn unknown_tag(block: &str, name: &str, delimiters: &[&str]) -> LiquidError {
    if name == "else" {
        return LiquidError::syntax(format!("{block} does not expect else tag"));
    }
    match delimiters.last() {
        Some(end) if name.starts_with("end") => LiquidError::syntax(format!(
            "'{name}' is not a valid delimiter for {block} tags. use {end}"
        )),
        _ => LiquidError::syntax(format!("Unknown tag '{name}'")),
    }
}

// ============================================================
// Leaf nodes
// ============================================================

/// Literal text.
#[derive(Debug)]
struct TextNode(String);

impl Node for TextNode {
    fn name(&self) -> &str {
        "text"
    }

    fn render(&self, _ctx: &mut Context) -> LiquidResult<String> {
        Ok(self.0.clone())
    }
}

/// `{{ expression | filters }}`
#[derive(Debug)]
struct OutputNode {
    expression: FilteredExpression,
}

impl Node for OutputNode {
    fn name(&self) -> &str {
        "output"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        Ok(self.expression.evaluate(ctx)?.to_display_string())
    }
}
