//! Dynamic template values.
//!
//! [`Value`] is everything a template can see: scalars, lists, string-keyed
//! maps and host objects. Host objects implement [`LiquidObject`] to expose
//! named members and, optionally, a canonical plain-value form that is used
//! for output and comparisons.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use liquid_rs_core::{LiquidError, LiquidResult};

/// A host object exposed to templates.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::value::{LiquidObject, Value};
///
/// #[derive(Debug)]
/// struct Price(i64);
///
/// impl LiquidObject for Price {
///     fn to_liquid(&self) -> Option<Value> {
///         Some(Value::Integer(self.0))
///     }
/// }
///
/// let v = Value::object(Price(100));
/// assert_eq!(v.to_display_string(), "100");
/// assert!(v.liquid_eq(&Value::from("100")).unwrap());
/// ```
pub trait LiquidObject: fmt::Debug + Send + Sync {
    /// Looks up a named member. `None` renders as an undefined value.
    fn get(&self, _member: &str) -> Option<Value> {
        None
    }

    /// The canonical plain value of this object, if it has one.
    ///
    /// Objects without a canonical form render empty and cannot be compared.
    fn to_liquid(&self) -> Option<Value> {
        None
    }
}

/// A dynamic value in a template context.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Undefined or explicit nil.
    #[default]
    Nil,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit floating point number.
    Float(f64),
    /// A string value.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A string-keyed mapping with stable key order.
    Dict(BTreeMap<String, Value>),
    /// A host object.
    Object(Arc<dyn LiquidObject>),
}

impl Value {
    /// Wraps a host object.
    pub fn object(obj: impl LiquidObject + 'static) -> Self {
        Self::Object(Arc::new(obj))
    }

    /// Converts any serializable value through its JSON representation.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> LiquidResult<Self> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(|e| LiquidError::render(format!("cannot convert value: {e}")))
    }

    /// Replaces objects that expose a canonical form with that form.
    pub fn canonical(&self) -> Cow<'_, Self> {
        match self {
            Self::Object(obj) => obj
                .to_liquid()
                .map_or(Cow::Borrowed(self), |v| Cow::Owned(v.canonical().into_owned())),
            _ => Cow::Borrowed(self),
        }
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self.canonical().as_ref(), Self::Nil | Self::Bool(false))
    }

    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// `true` for the empty string, an empty list and an empty map.
    pub fn is_empty_collection(&self) -> bool {
        match self.canonical().as_ref() {
            Self::String(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Dict(d) => d.is_empty(),
            _ => false,
        }
    }

    /// Converts this value to its rendered text.
    ///
    /// Lists render as the concatenation of their elements.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Nil => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::String(s) => s.clone(),
            Self::List(items) => items.iter().map(Self::to_display_string).collect(),
            Self::Dict(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("\"{k}\"=>{}", v.to_display_string()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Self::Object(obj) => obj
                .to_liquid()
                .map(|v| v.to_display_string())
                .unwrap_or_default(),
        }
    }

    /// Returns the length of a string, list or map.
    pub fn size(&self) -> Option<usize> {
        match self.canonical().as_ref() {
            Self::String(s) => Some(s.chars().count()),
            Self::List(l) => Some(l.len()),
            Self::Dict(d) => Some(d.len()),
            _ => None,
        }
    }

    /// Resolves one `.name` segment of a variable path.
    ///
    /// `size`, `first` and `last` work on collections unless a map defines
    /// a key of that name.
    pub fn member(&self, key: &str) -> Self {
        if let Self::Object(obj) = self {
            if let Some(found) = obj.get(key) {
                return found;
            }
        }

        let value = self.canonical();
        let found = match value.as_ref() {
            Self::Dict(map) => map.get(key).cloned(),
            Self::List(list) => key.parse::<usize>().ok().and_then(|i| list.get(i).cloned()),
            _ => None,
        };

        found.unwrap_or_else(|| match (key, value.as_ref()) {
            ("size", v) => v
                .size()
                .map_or(Self::Nil, |n| Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))),
            ("first", Self::List(list)) => list.first().cloned().unwrap_or_default(),
            ("last", Self::List(list)) => list.last().cloned().unwrap_or_default(),
            _ => Self::Nil,
        })
    }

    /// Resolves one `[index]` segment of a variable path.
    ///
    /// Negative integer indexes count from the end of a list.
    pub fn index(&self, index: &Self) -> Self {
        let value = self.canonical();
        match (value.as_ref(), index.canonical().as_ref()) {
            (Self::List(list), Self::Integer(i)) => {
                let len = i64::try_from(list.len()).unwrap_or(i64::MAX);
                let pos = if *i < 0 { len + i } else { *i };
                usize::try_from(pos)
                    .ok()
                    .and_then(|p| list.get(p).cloned())
                    .unwrap_or_default()
            }
            (Self::List(_) | Self::Dict(_) | Self::Object(_), Self::String(key)) => {
                self.member(key)
            }
            (Self::Dict(map), other) => map
                .get(&other.to_display_string())
                .cloned()
                .unwrap_or_default(),
            _ => Self::Nil,
        }
    }

    /// Expands a value into the items a loop visits.
    ///
    /// Maps yield `[key, value]` pairs, nil yields nothing, and any other
    /// scalar is a single item.
    pub fn to_items(&self) -> Vec<Self> {
        match self.canonical().as_ref() {
            Self::Nil => Vec::new(),
            Self::List(list) => list.clone(),
            Self::Dict(map) => map
                .iter()
                .map(|(k, v)| Self::List(vec![Self::String(k.clone()), v.clone()]))
                .collect(),
            other => vec![other.clone()],
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.canonical().as_ref() {
            Self::Integer(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => Some(*f as i64),
            Self::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.canonical().as_ref() {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality as used by `==`, `!=` and `case`/`when`.
    ///
    /// Integers and floats compare numerically, and numeric strings compare
    /// equal to the number they spell. Objects without a canonical form
    /// cannot be compared.
    pub fn liquid_eq(&self, other: &Self) -> LiquidResult<bool> {
        let (left, right) = (self.canonical(), other.canonical());
        Ok(match (left.as_ref(), right.as_ref()) {
            (Self::Object(_), _) | (_, Self::Object(_)) => {
                return Err(incomparable(&left, &right));
            }
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::String(s), n @ (Self::Integer(_) | Self::Float(_)))
            | (n @ (Self::Integer(_) | Self::Float(_)), Self::String(s)) => {
                match (s.trim().parse::<f64>(), n.as_float()) {
                    (Ok(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                    _ => false,
                }
            }
            (a @ (Self::Integer(_) | Self::Float(_)), b @ (Self::Integer(_) | Self::Float(_))) => {
                match (a.as_float(), b.as_float()) {
                    (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                    _ => false,
                }
            }
            (Self::List(a), Self::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.liquid_eq(y)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Self::Dict(a), Self::Dict(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, x) in a {
                    match b.get(key) {
                        Some(y) if x.liquid_eq(y)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            _ => false,
        })
    }

    /// Ordering as used by `<`, `>`, `<=` and `>=`.
    ///
    /// Returns `Ok(None)` when either side is nil, which makes every
    /// ordering test false.
    pub fn liquid_cmp(&self, other: &Self) -> LiquidResult<Option<Ordering>> {
        let (left, right) = (self.canonical(), other.canonical());
        match (left.as_ref(), right.as_ref()) {
            (Self::Nil, _) | (_, Self::Nil) => Ok(None),
            (Self::String(a), Self::String(b)) => Ok(Some(a.cmp(b))),
            (Self::Integer(a), Self::Integer(b)) => Ok(Some(a.cmp(b))),
            (
                a @ (Self::Integer(_) | Self::Float(_) | Self::String(_)),
                b @ (Self::Integer(_) | Self::Float(_) | Self::String(_)),
            ) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
                _ => Err(incomparable(&left, &right)),
            },
            _ => Err(incomparable(&left, &right)),
        }
    }

    /// The `contains` operator: substring for strings, membership for lists,
    /// key presence for maps.
    pub fn contains(&self, needle: &Self) -> LiquidResult<bool> {
        match self.canonical().as_ref() {
            Self::String(s) => Ok(s.contains(&needle.to_display_string())),
            Self::List(items) => {
                for item in items {
                    if item.liquid_eq(needle)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Dict(map) => Ok(map.contains_key(&needle.to_display_string())),
            _ => Ok(false),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "array",
            Self::Dict(_) => "hash",
            Self::Object(_) => "object",
        }
    }
}

fn incomparable(left: &Value, right: &Value) -> LiquidError {
    LiquidError::render(format!(
        "{} and {} cannot be compared",
        left.kind(),
        right.kind()
    ))
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.liquid_eq(other).unwrap_or(false)
    }
}

// -- From implementations --

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<BTreeMap<String, T>> for Value {
    fn from(m: BTreeMap<String, T>) -> Self {
        Self::Dict(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Self>> From<HashMap<String, T>> for Value {
    fn from(m: HashMap<String, T>) -> Self {
        Self::Dict(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::Nil, Into::into)
    }
}

impl From<Arc<dyn LiquidObject>> for Value {
    fn from(obj: Arc<dyn LiquidObject>) -> Self {
        Self::Object(obj)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Nil,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_default(),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Dict(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
