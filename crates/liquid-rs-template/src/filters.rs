//! Template filters.
//!
//! A filter transforms the value flowing through an output pipeline
//! (`{{ name | upcase | append: "!" }}`). Filters live in a
//! [`FilterRegistry`]; a name with no registered filter is a pass-through,
//! so templates keep rendering when only part of the filter set is present.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

use liquid_rs_core::{LiquidError, LiquidResult};

use crate::value::Value;

/// Arguments of one filter call: positional first, then `name: value` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterArgs {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl FilterArgs {
    /// Builds arguments from positional values only.
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: BTreeMap::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, key: &str) -> Option<&Value> {
        self.named.get(key)
    }

    fn required(&self, filter: &str, index: usize) -> LiquidResult<&Value> {
        self.get(index).ok_or_else(|| {
            LiquidError::render(format!("{filter}: missing argument {}", index + 1))
        })
    }
}

/// A template filter.
pub trait Filter: Send + Sync {
    /// The name templates use to call this filter.
    fn name(&self) -> &str;

    /// Applies the filter to a value with the given arguments.
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value>;
}

/// Adapts a closure into a [`Filter`].
struct FnFilter<F> {
    name: String,
    func: F,
}

impl<F> Filter for FnFilter<F>
where
    F: Fn(&Value, &FilterArgs) -> LiquidResult<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        (self.func)(value, args)
    }
}

/// A registry of available template filters.
///
/// Cloning is cheap: filters are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates a new empty filter registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every standard filter.
    pub fn standard() -> Self {
        standard_registry().clone()
    }

    /// Registers a filter, replacing any filter with the same name.
    pub fn register(&mut self, filter: impl Filter + 'static) {
        self.filters
            .insert(filter.name().to_string(), Arc::new(filter));
    }

    /// Registers a closure as a filter.
    ///
    /// ```
    /// use liquid_rs_template::filters::{FilterArgs, FilterRegistry};
    /// use liquid_rs_template::value::Value;
    ///
    /// let mut filters = FilterRegistry::new();
    /// filters.register_fn("shout", |v, _| Ok(Value::from(format!("{v}!"))));
    /// let out = filters.apply("shout", Value::from("hi"), &FilterArgs::default()).unwrap();
    /// assert_eq!(out, Value::from("hi!"));
    /// ```
    pub fn register_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &FilterArgs) -> LiquidResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        self.filters
            .insert(name.clone(), Arc::new(FnFilter { name, func }));
    }

    /// Copies every filter of `other` into this registry.
    pub fn merge(&mut self, other: &Self) {
        for (name, filter) in &other.filters {
            self.filters.insert(name.clone(), Arc::clone(filter));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Returns the sorted names of all registered filters.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Applies a named filter. Unknown names return `value` unchanged.
    pub fn apply(&self, name: &str, value: Value, args: &FilterArgs) -> LiquidResult<Value> {
        match self.filters.get(name) {
            Some(filter) => filter.apply(&value, args),
            None => {
                tracing::trace!(filter = name, "unknown filter, passing value through");
                Ok(value)
            }
        }
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

static STANDARD: Lazy<FilterRegistry> = Lazy::new(|| {
    let mut r = FilterRegistry::new();
    register_all(&mut r);
    r
});

/// Returns the shared registry of standard filters.
pub fn standard_registry() -> &'static FilterRegistry {
    &STANDARD
}

/// Registers all standard filters.
fn register_all(r: &mut FilterRegistry) {
    // String filters
    r.register(StrFilter::new("upcase", str::to_uppercase));
    r.register(StrFilter::new("downcase", str::to_lowercase));
    r.register(StrFilter::new("capitalize", capitalize));
    r.register(StrFilter::new("strip", |s| s.trim().to_string()));
    r.register(StrFilter::new("lstrip", |s| s.trim_start().to_string()));
    r.register(StrFilter::new("rstrip", |s| s.trim_end().to_string()));
    r.register(StrFilter::new("strip_newlines", |s| s.replace(['\r', '\n'], "")));
    r.register(StrFilter::new("strip_html", strip_html));
    r.register(StrFilter::new("escape", escape_html));
    r.register(StrFilter::new("url_encode", url_encode));
    r.register(AppendFilter);
    r.register(PrependFilter);
    r.register(ReplaceFilter);
    r.register(RemoveFilter);
    r.register(TruncateFilter);
    r.register(SplitFilter);

    // List filters
    r.register(SizeFilter);
    r.register(JoinFilter);
    r.register(FirstFilter);
    r.register(LastFilter);
    r.register(ReverseFilter);
    r.register(SortFilter);

    // Number filters
    r.register(MathFilter::new("plus", MathOp::Plus));
    r.register(MathFilter::new("minus", MathOp::Minus));
    r.register(MathFilter::new("times", MathOp::Times));
    r.register(MathFilter::new("divided_by", MathOp::DividedBy));
    r.register(MathFilter::new("modulo", MathOp::Modulo));

    // Logic filters
    r.register(DefaultFilter);
}

// ============================================================
// String filters
// ============================================================

/// A filter that maps the display string of its input.
struct StrFilter {
    name: &'static str,
    func: fn(&str) -> String,
}

impl StrFilter {
    const fn new(name: &'static str, func: fn(&str) -> String) -> Self {
        Self { name, func }
    }
}

impl Filter for StrFilter {
    fn name(&self) -> &str {
        self.name
    }
    fn apply(&self, value: &Value, _args: &FilterArgs) -> LiquidResult<Value> {
        Ok(Value::String((self.func)(&value.to_display_string())))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn strip_html(s: &str) -> String {
    static TAGS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?is)<script.*?</script>|<style.*?</style>|<!--.*?-->|<[^>]*>")
            .expect("valid regex")
    });
    TAGS.replace_all(s, "").into_owned()
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn url_encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC)
        .to_string()
        .replace("%20", "+")
        .replace("%2D", "-")
        .replace("%2E", ".")
        .replace("%5F", "_")
}

struct AppendFilter;
impl Filter for AppendFilter {
    fn name(&self) -> &'static str {
        "append"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let suffix = args.required("append", 0)?;
        Ok(Value::String(format!("{value}{suffix}")))
    }
}

struct PrependFilter;
impl Filter for PrependFilter {
    fn name(&self) -> &'static str {
        "prepend"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let prefix = args.required("prepend", 0)?;
        Ok(Value::String(format!("{prefix}{value}")))
    }
}

struct ReplaceFilter;
impl Filter for ReplaceFilter {
    fn name(&self) -> &'static str {
        "replace"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let from = args.required("replace", 0)?.to_display_string();
        let to = args.get(1).map(Value::to_display_string).unwrap_or_default();
        Ok(Value::String(value.to_display_string().replace(&from, &to)))
    }
}

struct RemoveFilter;
impl Filter for RemoveFilter {
    fn name(&self) -> &'static str {
        "remove"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let needle = args.required("remove", 0)?.to_display_string();
        Ok(Value::String(value.to_display_string().replace(&needle, "")))
    }
}

/// `truncate: length, ellipsis` where the ellipsis counts toward the length.
struct TruncateFilter;
impl Filter for TruncateFilter {
    fn name(&self) -> &'static str {
        "truncate"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let text = value.to_display_string();
        let length = match args.get(0) {
            Some(arg) => arg
                .as_integer()
                .ok_or_else(|| LiquidError::render("truncate: length must be a number"))?,
            None => 50,
        };
        let ellipsis = args
            .get(1)
            .map_or_else(|| "...".to_string(), Value::to_display_string);

        let length = usize::try_from(length).unwrap_or(0);
        if text.chars().count() <= length {
            return Ok(Value::String(text));
        }
        let keep = length.saturating_sub(ellipsis.chars().count());
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(&ellipsis);
        Ok(Value::String(out))
    }
}

struct SplitFilter;
impl Filter for SplitFilter {
    fn name(&self) -> &'static str {
        "split"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let text = value.to_display_string();
        let sep = args.get(0).map(Value::to_display_string).unwrap_or_default();
        let parts: Vec<Value> = if sep.is_empty() {
            text.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            text.split(sep.as_str()).map(Value::from).collect()
        };
        Ok(Value::List(parts))
    }
}

// ============================================================
// List filters
// ============================================================

struct SizeFilter;
impl Filter for SizeFilter {
    fn name(&self) -> &'static str {
        "size"
    }
    fn apply(&self, value: &Value, _args: &FilterArgs) -> LiquidResult<Value> {
        Ok(Value::from(value.size().unwrap_or(0)))
    }
}

struct JoinFilter;
impl Filter for JoinFilter {
    fn name(&self) -> &'static str {
        "join"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let sep = args
            .get(0)
            .map_or_else(|| " ".to_string(), Value::to_display_string);
        let parts: Vec<String> = value.to_items().iter().map(Value::to_display_string).collect();
        Ok(Value::String(parts.join(&sep)))
    }
}

struct FirstFilter;
impl Filter for FirstFilter {
    fn name(&self) -> &'static str {
        "first"
    }
    fn apply(&self, value: &Value, _args: &FilterArgs) -> LiquidResult<Value> {
        Ok(value.member("first"))
    }
}

struct LastFilter;
impl Filter for LastFilter {
    fn name(&self) -> &'static str {
        "last"
    }
    fn apply(&self, value: &Value, _args: &FilterArgs) -> LiquidResult<Value> {
        Ok(value.member("last"))
    }
}

struct ReverseFilter;
impl Filter for ReverseFilter {
    fn name(&self) -> &'static str {
        "reverse"
    }
    fn apply(&self, value: &Value, _args: &FilterArgs) -> LiquidResult<Value> {
        let mut items = value.to_items();
        items.reverse();
        Ok(Value::List(items))
    }
}

/// Sorts a list; with an argument, sorts maps by that key.
struct SortFilter;
impl Filter for SortFilter {
    fn name(&self) -> &'static str {
        "sort"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let key = args.get(0).map(Value::to_display_string);
        let mut keyed = Vec::new();
        for item in value.to_items() {
            let sort_key = key.as_ref().map_or_else(|| item.clone(), |k| item.member(k));
            keyed.push((sort_key, item));
        }

        let mut failure = None;
        keyed.sort_by(|(a, _), (b, _)| match a.liquid_cmp(b) {
            Ok(ordering) => ordering.unwrap_or_else(|| a.is_nil().cmp(&b.is_nil())),
            Err(e) => {
                failure.get_or_insert(e);
                std::cmp::Ordering::Equal
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
    }
}

// ============================================================
// Number filters
// ============================================================

#[derive(Clone, Copy)]
enum MathOp {
    Plus,
    Minus,
    Times,
    DividedBy,
    Modulo,
}

/// Integer arithmetic when both operands are integers, float otherwise.
struct MathFilter {
    name: &'static str,
    op: MathOp,
}

impl MathFilter {
    const fn new(name: &'static str, op: MathOp) -> Self {
        Self { name, op }
    }

    fn number(&self, value: &Value) -> LiquidResult<Value> {
        match value.canonical().as_ref() {
            Value::Nil => Ok(Value::Integer(0)),
            v @ (Value::Integer(_) | Value::Float(_)) => Ok(v.clone()),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::Integer)
                    .or_else(|_| s.parse::<f64>().map(Value::Float))
                    .map_err(|_| {
                        LiquidError::render(format!("{}: '{s}' is not a number", self.name))
                    })
            }
            other => Err(LiquidError::render(format!(
                "{}: cannot use '{other}' as a number",
                self.name
            ))),
        }
    }
}

impl Filter for MathFilter {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        let left = self.number(value)?;
        let right = self.number(args.required(self.name, 0)?)?;

        if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
            let (a, b) = (*a, *b);
            let result = match self.op {
                MathOp::Plus => a.checked_add(b),
                MathOp::Minus => a.checked_sub(b),
                MathOp::Times => a.checked_mul(b),
                MathOp::DividedBy => a.checked_div_euclid(b),
                MathOp::Modulo => a.checked_rem_euclid(b),
            };
            return result.map(Value::Integer).ok_or_else(|| {
                LiquidError::render(format!("{}: invalid operation on {a} and {b}", self.name))
            });
        }

        let (a, b) = (
            left.as_float().unwrap_or_default(),
            right.as_float().unwrap_or_default(),
        );
        if matches!(self.op, MathOp::DividedBy | MathOp::Modulo) && b == 0.0 {
            return Err(LiquidError::render(format!("{}: divided by 0", self.name)));
        }
        Ok(Value::Float(match self.op {
            MathOp::Plus => a + b,
            MathOp::Minus => a - b,
            MathOp::Times => a * b,
            MathOp::DividedBy => a / b,
            MathOp::Modulo => a % b,
        }))
    }
}

// ============================================================
// Logic filters
// ============================================================

/// Falls back to its argument for nil, false and empty values.
struct DefaultFilter;
impl Filter for DefaultFilter {
    fn name(&self) -> &'static str {
        "default"
    }
    fn apply(&self, value: &Value, args: &FilterArgs) -> LiquidResult<Value> {
        if value.is_truthy() && !value.is_empty_collection() {
            Ok(value.clone())
        } else {
            Ok(args.get(0).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, value: Value, args: Vec<Value>) -> LiquidResult<Value> {
        standard_registry().apply(name, value, &FilterArgs::positional(args))
    }

    #[test]
    fn test_standard_registry_is_shared() {
        assert!(std::ptr::eq(standard_registry(), standard_registry()));
        assert!(standard_registry().contains("url_encode"));
        assert_eq!(FilterRegistry::standard().names(), standard_registry().names());
    }

    #[test]
    fn test_string_filters() {
        assert_eq!(apply("upcase", "abc".into(), vec![]).unwrap(), Value::from("ABC"));
        assert_eq!(apply("downcase", "ABC".into(), vec![]).unwrap(), Value::from("abc"));
        assert_eq!(apply("capitalize", "élan vital".into(), vec![]).unwrap(), Value::from("Élan vital"));
        assert_eq!(apply("strip", "  x  ".into(), vec![]).unwrap(), Value::from("x"));
        assert_eq!(apply("strip_newlines", "a\nb\r\n".into(), vec![]).unwrap(), Value::from("ab"));
    }

    #[test]
    fn test_strip_html_and_escape() {
        assert_eq!(
            apply("strip_html", "<p>Hi <b>there</b></p><script>x()</script>".into(), vec![]).unwrap(),
            Value::from("Hi there")
        );
        assert_eq!(
            apply("escape", "<a href=\"x\">'&'</a>".into(), vec![]).unwrap(),
            Value::from("&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;")
        );
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(
            apply("url_encode", "a b&c-d.e_f".into(), vec![]).unwrap(),
            Value::from("a+b%26c-d.e_f")
        );
    }

    #[test]
    fn test_append_prepend_replace_remove() {
        assert_eq!(apply("append", "a".into(), vec!["b".into()]).unwrap(), Value::from("ab"));
        assert_eq!(apply("prepend", "a".into(), vec!["b".into()]).unwrap(), Value::from("ba"));
        assert_eq!(
            apply("replace", "aXbX".into(), vec!["X".into(), "-".into()]).unwrap(),
            Value::from("a-b-")
        );
        assert_eq!(apply("remove", "aXbX".into(), vec!["X".into()]).unwrap(), Value::from("ab"));
        assert!(apply("append", "a".into(), vec![]).unwrap_err().is_render_error());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(
            apply("truncate", "Ground control".into(), vec![Value::from(10)]).unwrap(),
            Value::from("Ground ...")
        );
        assert_eq!(
            apply("truncate", "short".into(), vec![Value::from(10)]).unwrap(),
            Value::from("short")
        );
        assert_eq!(
            apply("truncate", "Ground control".into(), vec![Value::from(8), "~".into()]).unwrap(),
            Value::from("Ground ~")
        );
    }

    #[test]
    fn test_split_join() {
        let parts = apply("split", "a,b,c".into(), vec![",".into()]).unwrap();
        assert_eq!(parts, Value::from(vec!["a", "b", "c"]));
        assert_eq!(
            apply("join", parts, vec![" - ".into()]).unwrap(),
            Value::from("a - b - c")
        );
    }

    #[test]
    fn test_list_filters() {
        let list = Value::from(vec![3, 1, 2]);
        assert_eq!(apply("size", list.clone(), vec![]).unwrap(), Value::from(3));
        assert_eq!(apply("first", list.clone(), vec![]).unwrap(), Value::from(3));
        assert_eq!(apply("last", list.clone(), vec![]).unwrap(), Value::from(2));
        assert_eq!(apply("reverse", list.clone(), vec![]).unwrap(), Value::from(vec![2, 1, 3]));
        assert_eq!(apply("sort", list, vec![]).unwrap(), Value::from(vec![1, 2, 3]));
        assert_eq!(apply("size", "four".into(), vec![]).unwrap(), Value::from(4));
    }

    #[test]
    fn test_sort_by_key() {
        let people = Value::from(serde_json::json!([{"n": "b"}, {"n": "a"}]));
        let sorted = apply("sort", people, vec!["n".into()]).unwrap();
        assert_eq!(sorted.index(&Value::from(0)).member("n"), Value::from("a"));
    }

    #[test]
    fn test_math_filters() {
        assert_eq!(apply("plus", 1.into(), vec![2.into()]).unwrap(), Value::from(3));
        assert_eq!(apply("minus", "5".into(), vec![2.into()]).unwrap(), Value::from(3));
        assert_eq!(apply("times", 1.5.into(), vec![2.into()]).unwrap(), Value::from(3.0));
        assert_eq!(apply("divided_by", 7.into(), vec![2.into()]).unwrap(), Value::from(3));
        assert_eq!(apply("modulo", 7.into(), vec![3.into()]).unwrap(), Value::from(1));
        assert_eq!(apply("plus", Value::Nil, vec![4.into()]).unwrap(), Value::from(4));
    }

    #[test]
    fn test_math_filter_errors() {
        assert!(apply("divided_by", 1.into(), vec![0.into()]).unwrap_err().is_render_error());
        assert!(apply("divided_by", 1.0.into(), vec![0.into()]).unwrap_err().is_render_error());
        assert!(apply("plus", "abc".into(), vec![1.into()]).unwrap_err().is_render_error());
        assert!(apply("plus", vec![1].into(), vec![1.into()]).is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(apply("default", Value::Nil, vec!["x".into()]).unwrap(), Value::from("x"));
        assert_eq!(apply("default", "".into(), vec!["x".into()]).unwrap(), Value::from("x"));
        assert_eq!(apply("default", false.into(), vec!["x".into()]).unwrap(), Value::from("x"));
        assert_eq!(apply("default", "y".into(), vec!["x".into()]).unwrap(), Value::from("y"));
    }

    #[test]
    fn test_unknown_filter_is_pass_through() {
        assert_eq!(apply("no_such_filter", "x".into(), vec![]).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = FilterRegistry::standard();
        let mut extra = FilterRegistry::new();
        extra.register_fn("upcase", |_, _| Ok(Value::from("custom")));
        base.merge(&extra);
        assert_eq!(
            base.apply("upcase", "a".into(), &FilterArgs::default()).unwrap(),
            Value::from("custom")
        );
        assert!(base.contains("downcase"));
    }

    #[test]
    fn test_named_args_reach_closures() {
        let mut filters = FilterRegistry::new();
        filters.register_fn("img_url", |v, args| {
            let crop = args.named("crop").map(Value::to_display_string).unwrap_or_default();
            let size = args.get(0).map(Value::to_display_string).unwrap_or_default();
            Ok(Value::from(format!("{v}_{size}_{crop}")))
        });
        let mut args = FilterArgs::positional(vec!["450x450".into()]);
        args.named.insert("crop".into(), "center".into());
        assert_eq!(
            filters.apply("img_url", "shirt".into(), &args).unwrap(),
            Value::from("shirt_450x450_center")
        );
    }
}
