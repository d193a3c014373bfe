//! Integration tests for template composition: `include`, `extends`, and
//! how both interact with the document cache.

use std::sync::Arc;

use liquid_rs_core::{LiquidError, Settings};
use liquid_rs_template::{
    Assigns, DocumentCache, Engine, FnLoader, MemoryCache, StringLoader, Value,
};
use serde_json::json;

// ============================================================================
// Shared helpers
// ============================================================================

fn assigns(value: serde_json::Value) -> Assigns {
    liquid_rs_template::context::assigns_from_json(value)
}

fn fixture_loader() -> StringLoader {
    [
        ("a", "{% include 'b' %}"),
        ("b", "{% include 'c' %}"),
        ("c", "{% include 'd' %}"),
        ("d", "({{ inner }})"),
        ("inner", "Inner: {{ inner }}{{ other }}"),
        ("example", "Example: {% include 'inner' %}"),
    ]
    .into_iter()
    .collect()
}

fn render(engine: &Engine, source: &str, data: serde_json::Value) -> String {
    engine
        .parse(source)
        .unwrap()
        .render(assigns(data))
        .unwrap()
}

// ============================================================================
// include
// ============================================================================

#[test]
fn test_include_with_and_for() {
    let engine = Engine::new().with_loader(fixture_loader());
    let out = render(
        &engine,
        "Outer-{% include 'inner' with 'value' other:23 %}-Outer{% include 'inner' for var other:'loop' %}",
        json!({"var": [1, 2, 3]}),
    );
    assert_eq!(out, "Outer-Inner: value23-OuterInner: 1loopInner: 2loopInner: 3loop");
}

#[test]
fn test_include_without_binding() {
    let engine = Engine::new().with_loader(fixture_loader());
    let out = render(
        &engine,
        "Outer-{% include 'inner' %}-Outer-{% include 'inner' other:'23' %}",
        json!({"inner": "orig", "var": [1, 2, 3]}),
    );
    assert_eq!(out, "Outer-Inner: orig-Outer-Inner: orig23");
}

#[test]
fn test_include_chain() {
    let engine = Engine::new().with_loader(fixture_loader());
    assert_eq!(render(&engine, "{% include 'a' %}", json!({"inner": "x"})), "(x)");
}

#[test]
fn test_include_passes_values() {
    let cases = [
        ("[{{ other }}]", json!({"var": "test"}), "([test])"),
        ("[{{ other }}]", json!({"var": ["a", "b", "c"]}), "([abc])"),
        ("[{{ other[0] }}]", json!({"var": ["a", "b", "c"]}), "([a])"),
        ("[{{ other.a }}]", json!({"var": {"a": "b"}}), "([b])"),
    ];
    for (inner, data, expected) in cases {
        let loader: StringLoader = [
            ("inner", inner),
            ("example", "({% include 'inner' other:var %})"),
        ]
        .into_iter()
        .collect();
        let engine = Engine::new().with_loader(loader);
        assert_eq!(render(&engine, "{% include 'example' %}", data), expected);
    }
}

#[test]
fn test_include_without_quotes() {
    let loader: StringLoader = [
        ("inner", "[{{ other }}]"),
        ("example", "{%include inner other:var %} ({{var}})"),
    ]
    .into_iter()
    .collect();
    let engine = Engine::new().with_loader(loader);

    assert_eq!(
        render(&engine, "{% include example other:var %}", json!({"var": "test"})),
        "[test] (test)"
    );
    assert_eq!(
        render(&engine, "{% include inner %}", json!({"other": "test"})),
        "[test]"
    );
}

#[test]
fn test_include_errors() {
    let engine = Engine::new().with_loader(fixture_loader());
    let err = engine.parse("{% include %}").unwrap_err();
    assert!(err.is_parse_error());
    assert!(err.to_string().contains("Error in tag"));

    let err = Engine::new().parse("{% include 'hello' %}").unwrap_err();
    assert!(matches!(err, LiquidError::MissingFilesystem(_)));
    assert!(err.to_string().contains("No file system"));
}

#[test]
fn test_virtual_loader() {
    let engine = Engine::new().with_loader(FnLoader::new(|_name: &str| Ok("OK".to_string())));
    assert_eq!(render(&engine, "Test: {% include 'hello' %}", json!({})), "Test: OK");
}

#[test]
fn test_filesystem_include() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("mypartial.tpl"), "test content\n").unwrap();

    let mut settings = Settings::default();
    settings.templates.dirs = vec![dir.path().to_path_buf()];
    settings.templates.extension = Some("tpl".to_string());
    let engine = Engine::from_settings(&settings);

    assert_eq!(render(&engine, "{% include 'mypartial' %}", json!({})), "test content\n");
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_include_with_cache() {
    let engine = Engine::new()
        .with_loader(fixture_loader())
        .with_cache(Arc::new(MemoryCache::new()));

    let source = "{{ type }} {% for item in list %}{% include 'example' inner:item %} {% endfor %}{% include 'a' %}";
    for kind in ["Before cache:", "With cache:"] {
        let template = engine.parse(source).unwrap();
        template
            .render(assigns(json!({"inner": "foo", "list": [1, 2, 3]})))
            .unwrap();
        let out = template
            .render(assigns(json!({"type": kind, "inner": "bar", "list": [1, 2]})))
            .unwrap();
        assert_eq!(out, format!("{kind} Example: Inner: 1 Example: Inner: 2 (bar)"));
    }
}

#[test]
fn test_cache_discarded_if_file_changes() {
    let loader = Arc::new(StringLoader::new());
    loader.add("example", "[{{ name }}]");
    let engine = Engine::new()
        .with_shared_loader(loader.clone())
        .with_cache(Arc::new(MemoryCache::new()));

    let data = json!({"name": "Example"});
    assert_eq!(render(&engine, "{% include 'example' %}", data.clone()), "[Example]");

    loader.add("example", "<{{ name }}>");
    assert_eq!(render(&engine, "{% include 'example' %}", data), "<Example>");
}

#[test]
fn test_cache_discarded_if_nested_file_changes() {
    let loader = Arc::new(StringLoader::new());
    loader.add("outer", "{% if true %}{% include 'leaf' %}{% endif %}");
    loader.add("leaf", "v1");
    let engine = Engine::new()
        .with_shared_loader(loader.clone())
        .with_cache(Arc::new(MemoryCache::new()));

    assert_eq!(render(&engine, "{% include 'outer' %}", json!({})), "v1");
    loader.add("leaf", "v2");
    assert_eq!(render(&engine, "{% include 'outer' %}", json!({})), "v2");
}

#[test]
fn test_cache_shared_between_engines() {
    let cache: Arc<dyn DocumentCache> = Arc::new(MemoryCache::new());
    let first = Engine::new().with_cache(Arc::clone(&cache));
    let second = Engine::new().with_cache(Arc::clone(&cache));

    let a = first.parse("{{ x }}").unwrap();
    let b = second.parse("{{ x }}").unwrap();
    assert!(std::ptr::eq(a.document(), b.document()));
}

// ============================================================================
// extends
// ============================================================================

fn inheritance_loader() -> StringLoader {
    [
        (
            "outer",
            "{% block content %}Content for outer block{% endblock %} / {% block footer %}Footer for outer block{% endblock %}",
        ),
        ("content", "Content for {{ name }} block"),
        (
            "middle",
            "{% extends 'outer' %}{% block content %}{% include 'content' name:'middle' %}{% endblock %}",
        ),
        (
            "main",
            "Main: {% extends 'middle' %}{% block footer %}{% include 'footer-top' hello:message %}{% endblock %}",
        ),
        ("footer-bottom", "{{ name }} with message: {{ hello }}"),
        (
            "footer-top",
            "Footer top and {% include 'footer-bottom' name:'bottom' %}",
        ),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_include_with_extends() {
    let engine = Engine::new()
        .with_loader(inheritance_loader())
        .with_cache(Arc::new(MemoryCache::new()));

    for kind in ["Before cache", "With cache"] {
        let out = engine
            .parse_file("footer-bottom")
            .unwrap()
            .render(assigns(json!({"name": "Block", "hello": kind})))
            .unwrap();
        assert_eq!(out, format!("Block with message: {kind}"));

        let out = engine.render_file("middle", Assigns::new()).unwrap();
        assert_eq!(out, "Content for middle block / Footer for outer block");

        let out = engine
            .render_file("main", assigns(json!({"message": kind})))
            .unwrap();
        assert_eq!(
            out,
            format!("Main: Content for middle block / Footer top and bottom with message: {kind}")
        );

        let out = render(&engine, "{% include 'main' hello:message %}", json!({"message": kind}));
        assert_eq!(
            out,
            format!("Main: Content for middle block / Footer top and bottom with message: {kind}")
        );
    }
}

#[test]
fn test_extends_sees_changed_child_with_cache() {
    let loader = Arc::new(StringLoader::new());
    loader.add("base", "<{% block body %}base{% endblock %}>");
    let engine = Engine::new()
        .with_shared_loader(loader.clone())
        .with_cache(Arc::new(MemoryCache::new()));

    let one = "{% extends 'base' %}{% block body %}one{% endblock %}";
    let two = "{% extends 'base' %}{% block body %}two{% endblock %}";
    assert_eq!(render(&engine, one, json!({})), "<one>");
    assert_eq!(render(&engine, two, json!({})), "<two>");
    assert_eq!(render(&engine, one, json!({})), "<one>");

    loader.add("base", "[{% block body %}base{% endblock %}]");
    assert_eq!(render(&engine, one, json!({})), "[one]");
}

#[test]
fn test_children_of_parent_with_nested_blocks_share_cache() {
    let loader = Arc::new(StringLoader::new());
    loader.add(
        "base",
        "[{% if true %}{% block a %}default{% endblock %}{% endif %}]",
    );
    let engine = Engine::new()
        .with_shared_loader(loader)
        .with_cache(Arc::new(MemoryCache::new()));

    let one = "{% extends 'base' %}{% block a %}ONE{% endblock %}";
    let two = "{% extends 'base' %}{% block a %}TWO{% endblock %}";
    assert_eq!(render(&engine, one, json!({})), "[ONE]");
    assert_eq!(render(&engine, two, json!({})), "[TWO]");
    assert_eq!(render(&engine, one, json!({})), "[ONE]");
}

#[test]
fn test_blocks_nested_in_loops_and_case_are_spliced_per_child() {
    let loader = Arc::new(StringLoader::new());
    loader.add(
        "base",
        "{% for i in (1..2) %}{% case i %}{% when 2 %}{% block tail %}-{% endblock %}\
         {% else %}{% block head %}+{% endblock %}{% endcase %}{% endfor %}",
    );
    let engine = Engine::new()
        .with_shared_loader(loader)
        .with_cache(Arc::new(MemoryCache::new()));

    let head = "{% extends 'base' %}{% block head %}H{% endblock %}";
    let tail = "{% extends 'base' %}{% block tail %}T{% endblock %}";
    assert_eq!(render(&engine, head, json!({})), "H-");
    assert_eq!(render(&engine, tail, json!({})), "+T");
    assert_eq!(render(&engine, "{% extends 'base' %}", json!({})), "+-");
}

#[test]
fn test_block_without_extends_renders_body() {
    assert_eq!(
        render(&Engine::new(), "{% block foo %}block content{% endblock %}", json!({})),
        "block content"
    );
}

#[test]
fn test_missing_parent() {
    let engine = Engine::new().with_loader(StringLoader::new());
    let err = engine.parse("{% extends 'nowhere' %}").unwrap_err();
    assert!(matches!(err, LiquidError::TemplateDoesNotExist(_)));
}

#[test]
fn test_render_value_from_assigns() {
    let engine = Engine::new().with_loader(fixture_loader());
    let template = engine.parse("{% include 'inner' with thing %}").unwrap();
    let out = template
        .render([("thing".to_string(), Value::from("T"))].into())
        .unwrap();
    assert_eq!(out, "Inner: T");
}
