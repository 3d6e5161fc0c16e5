//! Render context values.

use std::fmt;

use indexmap::IndexMap;

/// A value bound in a render [`Context`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Bound but absent. Falsy; substituting it is an error.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Ordered sequence, iterated in order.
    List(Vec<Value>),
    /// Named fields, iterated in insertion order.
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Flag marker for conditionals: bind `Value::TRUE` when a branch should
    /// render and `Value::Null` when it should not.
    pub const TRUE: Value = Value::Bool(true);

    /// Null, `false`, and empty lists are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `Value::TRUE` if `flag`, otherwise null.
    pub fn flag(flag: bool) -> Value {
        if flag { Value::TRUE } else { Value::Null }
    }

    /// Field of a map value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Map(fields) => fields.get(field),
            _ => None,
        }
    }

    /// Empty map, for building nested values field by field.
    pub fn map() -> Value {
        Value::Map(IndexMap::new())
    }

    /// Add a field to a map value. No-op on other variants.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Value {
        if let Value::Map(fields) = &mut self {
            fields.insert(field.into(), value.into());
        }
        self
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i64::from(i))
                }
            }
        )*
    };
}

int_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or_else(|_| Value::Str(i.to_string()), Value::Int)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or_else(|_| Value::Str(i.to_string()), Value::Int)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, T: Into<Value>> From<IndexMap<K, T>> for Value {
    fn from(fields: IndexMap<K, T>) -> Self {
        Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(fields) => {
                Value::Map(fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Named bindings a template is rendered against.
///
/// # Example
///
/// ```rust
/// use clitrans::template::{Context, Value};
///
/// let ctx = Context::new()
///     .insert("name", "eth0")
///     .insert("mtu", 1500)
///     .insert("shutdown", Value::TRUE)
///     .insert("description", None::<String>);
///
/// assert_eq!(ctx.get("mtu"), Some(&Value::Int(1500)));
/// assert!(ctx.get("description").unwrap().is_null());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, builder style.
    pub fn insert(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Bind `name` in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::TRUE.is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::map().is_truthy());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({
            "name": "eth0",
            "mtu": 1500,
            "tags": ["a", "b"],
            "description": null,
        }));

        assert_eq!(value.get("name"), Some(&Value::from("eth0")));
        assert_eq!(value.get("mtu"), Some(&Value::Int(1500)));
        assert_eq!(value.get("description"), Some(&Value::Null));
        assert_eq!(value.get("tags").unwrap().to_string(), "[a, b]");
    }

    #[test]
    fn test_display_map_in_order() {
        let value = Value::map().with("passive_mode", true).with("mtu", 9000);
        assert_eq!(value.to_string(), "{passive_mode=true, mtu=9000}");
    }
}
