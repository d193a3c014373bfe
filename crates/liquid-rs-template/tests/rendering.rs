//! End-to-end rendering tests through the public API: variables, filters,
//! host objects, custom tags and filters, and render-time controls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use liquid_rs_core::{LiquidError, LiquidResult};
use liquid_rs_template::context::assigns_from_json;
use liquid_rs_template::{
    Assigns, Context, Engine, FilterArgs, FilterRegistry, LiquidObject, Node, NodeList, Parser,
    TickControl, Value,
};
use serde_json::json;

fn render(source: &str, data: serde_json::Value) -> String {
    Engine::new()
        .parse(source)
        .unwrap()
        .render(assigns_from_json(data))
        .unwrap()
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_variable_resolution() {
    assert_eq!(render("{{test}}", json!({"test": "worked"})), "worked");
    assert_eq!(render("  {{ test }}  ", json!({"test": "worked"})), "  worked  ");
    assert_eq!(render("{{ test }}", json!({})), "");
    assert_eq!(
        render("{{ test.test }}", json!({"test": {"test": "worked"}})),
        "worked"
    );
}

#[test]
fn test_filter_after_line_break() {
    assert_eq!(
        render("{{ test |\n strip_html }}", json!({"test": "<b>worked</b>"})),
        "worked"
    );
}

#[test]
fn test_variable_array_indices() {
    let source = "{% assign days = 'Mon,Tue,Wed,Thu,Fri,Sat,Sun' | split: ',' %}\
                  {% for i in (0..6) %}{{ days[i] }} {% endfor %}";
    assert_eq!(render(source, json!({})), "Mon Tue Wed Thu Fri Sat Sun ");
}

#[test]
fn test_serialized_assigns() {
    #[derive(serde::Serialize)]
    struct Product {
        title: String,
        tags: Vec<&'static str>,
    }

    let product = Product {
        title: "Shoe".to_string(),
        tags: vec!["red", "sale"],
    };
    let mut assigns = Assigns::new();
    assigns.insert("product".to_string(), Value::from_serialize(&product).unwrap());

    let out = Engine::new()
        .parse("{{ product.title }}: {{ product.tags | join: '/' }} ({{ product.tags.size }})")
        .unwrap()
        .render(assigns)
        .unwrap();
    assert_eq!(out, "Shoe: red/sale (2)");
}

// ============================================================================
// Host objects
// ============================================================================

#[derive(Debug)]
struct Customer {
    name: &'static str,
    orders: i64,
}

impl LiquidObject for Customer {
    fn get(&self, member: &str) -> Option<Value> {
        match member {
            "name" => Some(Value::from(self.name)),
            "orders" => Some(Value::from(self.orders)),
            _ => None,
        }
    }
}

#[test]
fn test_host_object_members() {
    let mut assigns = Assigns::new();
    assigns.insert(
        "customer".to_string(),
        Value::object(Customer {
            name: "Ada",
            orders: 3,
        }),
    );
    let out = Engine::new()
        .parse("{{ customer.name }}{% if customer.orders > 2 %} (regular){% endif %}{{ customer.missing }}")
        .unwrap()
        .render(assigns)
        .unwrap();
    assert_eq!(out, "Ada (regular)");
}

// ============================================================================
// Custom tags and filters
// ============================================================================

/// `{% repeat n %}body{% endrepeat %}`
#[derive(Debug)]
struct RepeatNode {
    times: usize,
    body: NodeList,
}

impl Node for RepeatNode {
    fn name(&self) -> &str {
        "repeat"
    }

    fn render(&self, ctx: &mut Context) -> LiquidResult<String> {
        let mut out = String::new();
        for _ in 0..self.times {
            out.push_str(&self.body.render(ctx)?);
        }
        Ok(out)
    }

    fn is_volatile(&self) -> bool {
        self.body.is_volatile()
    }
}

fn parse_repeat(markup: &str, parser: &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> {
    let times = markup
        .trim()
        .parse()
        .map_err(|_| LiquidError::syntax("Syntax Error in 'repeat' - Valid syntax: repeat [count]"))?;
    let (body, _) = parser.parse_body("repeat", &["endrepeat"])?;
    Ok(Box::new(RepeatNode { times, body }))
}

#[test]
fn test_custom_block_tag() {
    let mut engine = Engine::new();
    engine.register_tag("repeat", parse_repeat);
    let out = engine
        .parse("{% repeat 3 %}{{ c }}{% endrepeat %}")
        .unwrap()
        .render(assigns_from_json(json!({"c": "ab"})))
        .unwrap();
    assert_eq!(out, "ababab");

    let err = engine.parse("{% repeat many %}{% endrepeat %}").unwrap_err();
    assert!(err.to_string().contains("Valid syntax: repeat [count]"));

    let err = Engine::new().parse("{% repeat 3 %}{% endrepeat %}").unwrap_err();
    assert!(err.to_string().contains("Unknown tag 'repeat'"));
}

#[test]
fn test_custom_filter_with_named_arguments() {
    let mut engine = Engine::new();
    engine.register_filter_fn("money", |value, args: &FilterArgs| {
        let cents = value.as_integer().unwrap_or(0);
        let symbol = args
            .named("symbol")
            .map_or_else(|| "$".to_string(), Value::to_display_string);
        Ok(Value::from(format!("{symbol}{}.{:02}", cents / 100, cents % 100)))
    });
    let template = engine
        .parse("{{ price | money }} {{ price | money: symbol: 'EUR ' }}")
        .unwrap();
    let out = template
        .render(assigns_from_json(json!({"price": 1999})))
        .unwrap();
    assert_eq!(out, "$19.99 EUR 19.99");
}

#[test]
fn test_per_render_filters_override_engine_filters() {
    let template = Engine::new().parse("{{ 'a' | upcase }}").unwrap();
    let mut overrides = FilterRegistry::new();
    overrides.register_fn("upcase", |_, _| Ok(Value::from("overridden")));
    let out = template
        .render_with(Assigns::new(), Some(&overrides), HashMap::new())
        .unwrap();
    assert_eq!(out, "overridden");
    assert_eq!(template.render(Assigns::new()).unwrap(), "A");
}

// ============================================================================
// Render controls
// ============================================================================

#[test]
fn test_tick_can_abort_long_loops() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&ticks);
    let engine = Engine::new().with_tick(Arc::new(move || {
        if seen.fetch_add(1, Ordering::SeqCst) < 100 {
            TickControl::Continue
        } else {
            TickControl::Abort
        }
    }));

    let err = engine
        .parse("{% for i in (1..1000) %}{{ i }}{% endfor %}")
        .unwrap()
        .render(Assigns::new())
        .unwrap_err();
    assert!(matches!(err, LiquidError::RenderAborted));
    assert_eq!(err.to_string(), "Rendering aborted by tick callback");
}

#[test]
fn test_render_error_surfaces() {
    let err = Engine::new()
        .parse("{{ 1 | divided_by: 0 }}")
        .unwrap()
        .render(Assigns::new())
        .unwrap_err();
    assert!(err.is_render_error());
}

#[test]
fn test_stateful_tags_do_not_leak_between_renders() {
    let template = Engine::new()
        .parse("{% cycle 'a', 'b' %}{% cycle 'a', 'b' %}{% increment n %}{{ n }}")
        .unwrap();
    assert_eq!(template.render(Assigns::new()).unwrap(), "ab0");
    assert_eq!(template.render(Assigns::new()).unwrap(), "ab0");
}

#[test]
fn test_concurrent_renders_of_one_template() {
    let template = Arc::new(
        Engine::new()
            .parse("{% for i in (1..n) %}{{ i }}{% endfor %}")
            .unwrap(),
    );
    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let template = Arc::clone(&template);
            std::thread::spawn(move || {
                template
                    .render([("n".to_string(), Value::from(n))].into())
                    .unwrap()
            })
        })
        .collect();
    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, vec!["1", "12", "123", "1234"]);
}
