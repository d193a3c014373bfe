//! Tag registry.
//!
//! Maps tag names to constructors. The parser looks every `{% name %}` up
//! here, so host code can add tags without touching the core:
//!
//! ```
//! use liquid_rs_core::LiquidResult;
//! use liquid_rs_template::context::Context;
//! use liquid_rs_template::engine::Engine;
//! use liquid_rs_template::parser::Node;
//!
//! #[derive(Debug)]
//! struct Shout(String);
//!
//! impl Node for Shout {
//!     fn name(&self) -> &str {
//!         "shout"
//!     }
//!     fn render(&self, _ctx: &mut Context) -> LiquidResult<String> {
//!         Ok(self.0.to_uppercase())
//!     }
//! }
//!
//! let mut engine = Engine::new();
//! engine.register_tag("shout", |markup, _parser| Ok(Box::new(Shout(markup.to_string()))));
//!
//! let out = engine.parse("{% shout hey %}!").unwrap().render(Default::default()).unwrap();
//! assert_eq!(out, "HEY!");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use liquid_rs_core::LiquidResult;

use crate::parser::{Node, Parser};

/// Builds a node from a tag's markup.
///
/// Block tags use the parser to consume their own body.
pub type TagConstructor =
    Arc<dyn Fn(&str, &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> + Send + Sync>;

/// A name-keyed table of tag constructors.
#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, TagConstructor>,
}

impl TagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in tag.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::tags::register_builtins(&mut registry);
        registry
    }

    /// Registers a constructor, replacing any tag of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&str, &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> + Send + Sync + 'static,
    {
        self.tags.insert(name.into(), Arc::new(constructor));
    }

    pub fn get(&self, name: &str) -> Option<&TagConstructor> {
        self.tags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Registered tag names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.names())
            .finish()
    }
}
