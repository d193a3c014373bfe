//! Built-in tags.
//!
//! Each submodule owns one family of tags and exposes its constructors;
//! [`register_builtins`] wires them into a [`TagRegistry`].

pub mod case;
pub mod conditional;
pub mod iteration;
pub mod literal;
pub mod stateful;
pub mod variable;

use crate::library::TagRegistry;

/// A single markup fragment: a quoted string or a run without whitespace,
/// commas or pipes (quoted sections allowed inside).
pub(crate) const QUOTED_FRAGMENT: &str =
    r#""[^"]*"|'[^']*'|(?:[^\s,\|'"]|"[^"]*"|'[^']*')+"#;

/// Registers every built-in tag.
pub fn register_builtins(registry: &mut TagRegistry) {
    registry.register("if", conditional::parse_if);
    registry.register("unless", conditional::parse_unless);
    registry.register("case", case::parse_case);
    registry.register("cycle", stateful::parse_cycle);
    registry.register("increment", stateful::parse_increment);
    registry.register("decrement", stateful::parse_decrement);
    registry.register("ifchanged", stateful::parse_ifchanged);
    registry.register("assign", variable::parse_assign);
    registry.register("capture", variable::parse_capture);
    registry.register("for", iteration::parse_for);
    registry.register("comment", literal::parse_comment);
    registry.register("raw", literal::parse_raw);
    registry.register("include", crate::include::parse_include);
    registry.register("extends", crate::inheritance::parse_extends);
    registry.register("block", crate::inheritance::parse_block);
}
