//! # liquid-rs-template
//!
//! A Liquid template engine. Source text is tokenized, parsed into a tree
//! of nodes once, and rendered any number of times against a [`Context`]
//! of variables.
//!
//! ## Modules
//!
//! - [`lexer`] - Splits source into text, output and tag tokens
//! - [`parser`] - Builds the node tree; the [`Node`] trait
//! - [`library`] - The tag registry used by the parser
//! - [`tags`] - Built-in tags
//! - [`include`] / [`inheritance`] - Template composition
//! - [`expression`] - Variable paths, literals, ranges and filter chains
//! - [`filters`] - The filter registry and the standard filters
//! - [`value`] - The dynamic value model
//! - [`context`] - Scoped variables, registers and render ticks
//! - [`loaders`] - Where `include` and `extends` read sources from
//! - [`cache`] - The parsed-document cache
//! - [`engine`] - The [`Engine`] and parsed [`Template`]
//!
//! ## Example
//!
//! ```
//! use liquid_rs_template::{Engine, Value};
//!
//! let engine = Engine::new();
//! let template = engine
//!     .parse("{% for n in list %}{{ n | times: 2 }}{% unless forloop.last %}, {% endunless %}{% endfor %}")
//!     .unwrap();
//! let list = Value::from(vec![1, 2, 3]);
//! let out = template.render([("list".to_string(), list)].into()).unwrap();
//! assert_eq!(out, "2, 4, 6");
//! ```

pub mod cache;
pub mod context;
pub mod engine;
pub mod expression;
pub mod filters;
pub mod include;
pub mod inheritance;
pub mod lexer;
pub mod library;
pub mod loaders;
pub mod parser;
pub mod tags;
pub mod value;

pub use cache::{DocumentCache, MemoryCache};
pub use context::{Assigns, Context, TickControl, TickFn};
pub use engine::{Engine, Template};
pub use filters::{Filter, FilterArgs, FilterRegistry};
pub use library::TagRegistry;
pub use loaders::{FileSystemLoader, FnLoader, SourceLoader, StringLoader};
pub use parser::{Document, Node, NodeList, Parser};
pub use value::{LiquidObject, Value};
