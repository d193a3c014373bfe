//! Rendering context.
//!
//! A [`Context`] mediates every read and write made while rendering:
//!
//! - a stack of variable scopes, searched innermost-first on read;
//! - a register table for stateful tags, untouched by scope push/pop;
//! - the active [`FilterRegistry`];
//! - an optional tick callback that may abort the render.
//!
//! A context is built fresh for each render and is not shared between
//! threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use liquid_rs_core::{LiquidError, LiquidResult};

use crate::filters::{FilterArgs, FilterRegistry};
use crate::value::Value;

/// Variables handed to a render call.
pub type Assigns = HashMap<String, Value>;

/// What the tick callback wants the render loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Abort,
}

/// Invoked once per rendered node.
pub type TickFn = Arc<dyn Fn() -> TickControl + Send + Sync>;

/// Converts a JSON object into render assigns. Anything else yields no assigns.
pub fn assigns_from_json(value: serde_json::Value) -> Assigns {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect(),
        _ => Assigns::new(),
    }
}

/// A rendering context holding variables in a stack of scopes.
///
/// The outermost scope holds the render's assigns and receives global
/// writes. Lookup walks from the innermost scope outward.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::context::Context;
/// use liquid_rs_template::value::Value;
///
/// let mut ctx = Context::new();
/// ctx.set("name", Value::from("outer"));
///
/// ctx.push();
/// ctx.set("name", Value::from("inner"));
/// ctx.set_global("seen", Value::from(true));
/// assert_eq!(ctx.get("name"), Some(&Value::from("inner")));
/// ctx.pop();
///
/// assert_eq!(ctx.get("name"), Some(&Value::from("outer")));
/// assert_eq!(ctx.get("seen"), Some(&Value::from(true)));
/// ```
pub struct Context {
    scopes: Vec<HashMap<String, Value>>,
    registers: HashMap<String, Value>,
    filters: FilterRegistry,
    tick: Option<TickFn>,
}

impl Context {
    /// Creates an empty context with a single scope and no filters.
    pub fn new() -> Self {
        Self::with_assigns(Assigns::new())
    }

    /// Creates a context whose outermost scope holds `assigns`.
    pub fn with_assigns(assigns: Assigns) -> Self {
        Self {
            scopes: vec![assigns],
            registers: HashMap::new(),
            filters: FilterRegistry::new(),
            tick: None,
        }
    }

    /// Replaces the active filter registry.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Installs a tick callback.
    #[must_use]
    pub fn with_tick(mut self, tick: Option<TickFn>) -> Self {
        self.tick = tick;
        self
    }

    // ── Scopes ───────────────────────────────────────────────────────

    /// Pushes a new, empty innermost scope.
    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pops the innermost scope. The outermost scope is never removed.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Runs `f` inside a fresh scope, popping it whether or not `f` fails.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> LiquidResult<T>) -> LiquidResult<T> {
        self.push();
        let result = f(self);
        self.pop();
        result
    }

    /// Number of scopes currently on the stack.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Writes `key` into the innermost scope.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Writes `key` into the outermost scope, where it survives every pop.
    pub fn set_global(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.insert(key.into(), value);
        }
    }

    /// Reads `key` from the outermost scope only.
    pub fn get_global(&self, key: &str) -> Option<&Value> {
        self.scopes.first().and_then(|scope| scope.get(key))
    }

    /// Looks up a top-level variable, innermost scope first.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }

    // ── Registers ────────────────────────────────────────────────────

    /// Reads a register.
    pub fn register(&self, key: &str) -> Option<&Value> {
        self.registers.get(key)
    }

    /// Returns a register for in-place mutation, creating it as nil.
    pub fn register_mut(&mut self, key: &str) -> &mut Value {
        self.registers.entry(key.to_string()).or_default()
    }

    /// Seeds registers, e.g. from a render call's extra registers.
    pub fn extend_registers(&mut self, registers: impl IntoIterator<Item = (String, Value)>) {
        self.registers.extend(registers);
    }

    // ── Filters and ticks ────────────────────────────────────────────

    /// Merges `extra` into the active filters; `extra` wins on name clashes.
    pub fn add_filters(&mut self, extra: &FilterRegistry) {
        self.filters.merge(extra);
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Applies a filter by name. Unknown filters return the input unchanged.
    pub fn apply_filter(&self, name: &str, input: Value, args: &FilterArgs) -> LiquidResult<Value> {
        self.filters.apply(name, input, args)
    }

    /// Invokes the tick callback, failing if it asks for an abort.
    pub fn tick(&self) -> LiquidResult<()> {
        match &self.tick {
            Some(tick) if tick() == TickControl::Abort => Err(LiquidError::RenderAborted),
            _ => Ok(()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scopes", &self.scopes)
            .field("registers", &self.registers)
            .field("filters", &self.filters.names())
            .field("tick", &self.tick.is_some())
            .finish()
    }
}
