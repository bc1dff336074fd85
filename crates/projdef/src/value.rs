//! value representation
//!
//! A project definition is an untyped tree of the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Definition files are loaded with every scalar kept as a string (see [Value::from_yaml_text]) so no type coercion
//! happens before templates are resolved. Typed scalars only appear when a tree is built programmatically or when a
//! template that consists of a single reference resolves to a typed value.
//!
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

/// One step of a path into a [Value] tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_string())
    }
}

/// Dotted representation of a path, e.g. `native_app.package.name`
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

impl Value {
    /// Empty object
    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// Parse yaml text keeping every scalar as a string
    pub fn from_yaml_text(text: &str) -> Result<Self, serde_yaml::Error> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
        Ok(Self::from_yaml_as_strings(yaml))
    }

    /// Convert a parsed yaml document, turning booleans and numbers into their string form
    pub fn from_yaml_as_strings(yaml: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;

        match yaml {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::String(b.to_string()),
            Yaml::Number(n) => Value::String(n.to_string()),
            Yaml::String(s) => Value::String(s),
            Yaml::Sequence(seq) => {
                Value::Array(seq.into_iter().map(Self::from_yaml_as_strings).collect())
            }
            Yaml::Mapping(mapping) => Value::Object(
                mapping
                    .into_iter()
                    .map(|(key, value)| (yaml_key(key), Self::from_yaml_as_strings(value)))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => Self::from_yaml_as_strings(tagged.value),
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Name of the value type as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// String form of a scalar when it is embedded in surrounding text
    ///
    /// Returns `None` for arrays and objects.
    pub fn to_template_string(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|object| object.get(key))
    }

    pub fn get_path(&self, path: &[PathSegment]) -> Option<&Value> {
        path.iter().try_fold(self, |current, segment| match (current, segment) {
            (Value::Object(object), PathSegment::Key(key)) => object.get(key),
            (Value::Array(array), PathSegment::Index(index)) => array.get(*index),
            _ => None,
        })
    }

    pub fn get_path_mut(&mut self, path: &[PathSegment]) -> Option<&mut Value> {
        path.iter()
            .try_fold(self, |current, segment| match (current, segment) {
                (Value::Object(object), PathSegment::Key(key)) => object.get_mut(key),
                (Value::Array(array), PathSegment::Index(index)) => array.get_mut(*index),
                _ => None,
            })
    }

    /// Replace the value at an existing path
    ///
    /// Returns `false` when the path does not exist.
    pub fn replace_at(&mut self, path: &[PathSegment], value: Value) -> bool {
        match self.get_path_mut(path) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Recursively merge `overrides` into `self`
    ///
    /// Objects are merged key by key, every other value (arrays included) is replaced by the override.
    pub fn deep_merge(&mut self, overrides: Value) {
        match (self, overrides) {
            (Value::Object(original), Value::Object(overrides)) => {
                for (key, value) in overrides {
                    let both_objects = matches!(original.get(&key), Some(Value::Object(_)))
                        && matches!(value, Value::Object(_));

                    if both_objects {
                        if let Some(existing) = original.get_mut(&key) {
                            existing.deep_merge(value);
                        }
                    } else {
                        original.insert(key, value);
                    }
                }
            }
            (original, overrides) => *original = overrides,
        }
    }

    /// Insert `value` under `key` unless the key exists already
    pub fn insert_default(&mut self, key: &str, value: impl Into<Value>) {
        if let Value::Object(object) = self {
            object.entry(key.to_string()).or_insert_with(|| value.into());
        }
    }

    /// Recursively add entries of `defaults` that are missing in `self`
    ///
    /// Existing values always win, new keys are appended after existing ones.
    pub fn fill_defaults(&mut self, defaults: &Value) {
        let (Value::Object(object), Value::Object(defaults)) = (self, defaults) else {
            return;
        };

        for (key, default) in defaults {
            match object.get_mut(key) {
                None | Some(Value::Null) => {
                    object.insert(key.clone(), default.clone());
                }
                Some(existing) => existing.fill_defaults(default),
            }
        }
    }

    /// Object stored under `key`, created when missing or null
    ///
    /// Returns `None` when `self` is not an object or the existing entry is not an object.
    pub fn object_entry(&mut self, key: &str) -> Option<&mut Value> {
        let object = self.as_object_mut()?;
        let entry = object.entry(key.to_string()).or_insert(Value::Null);
        if matches!(entry, Value::Null) {
            *entry = Value::object();
        }
        matches!(entry, Value::Object(_)).then_some(entry)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Decimal(d) => serde_json::Value::from(*d),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(array) => serde_json::Value::Array(array.iter().map(Value::to_json).collect()),
            Value::Object(object) => serde_json::Value::Object(
                object
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(value: IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => b.into(),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => Value::Decimal(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => s.into(),
            serde_json::Value::Array(a) => a.into(),
            serde_json::Value::Object(o) => Value::Object(
                o.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn yaml_scalars_load_as_strings() {
        let value = Value::from_yaml_text("definition_version: 1.1\nflag: true\ncount: 3\nempty:\n")
            .unwrap();

        assert_eq!(
            value,
            Value::from(json!({
                "definition_version": "1.1",
                "flag": "true",
                "count": "3",
                "empty": null,
            }))
        );
    }

    #[test]
    fn deep_merge_is_recursive_for_objects() {
        let mut original = Value::from(json!({"a": {"x": 1, "y": 2}}));
        original.deep_merge(Value::from(json!({"a": {"y": 3, "z": 4}})));

        assert_eq!(original, Value::from(json!({"a": {"x": 1, "y": 3, "z": 4}})));
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let mut original = Value::from(json!({"artifacts": ["a", "b"], "keep": "me"}));
        original.deep_merge(Value::from(json!({"artifacts": ["c"]})));

        assert_eq!(original, Value::from(json!({"artifacts": ["c"], "keep": "me"})));
    }

    #[test]
    fn deep_merge_replaces_object_with_scalar() {
        let mut original = Value::from(json!({"a": {"x": 1}}));
        original.deep_merge(Value::from(json!({"a": "flat"})));

        assert_eq!(original, Value::from(json!({"a": "flat"})));
    }

    #[test]
    fn fill_defaults_keeps_existing_values() {
        let mut entity = Value::from(json!({"name": "pkg", "meta": {"role": "mine"}, "stage": null}));
        entity.fill_defaults(&Value::from(json!({
            "stage": "app_src.stage",
            "meta": {"role": "default", "warehouse": "wh"},
            "name": "ignored",
        })));

        assert_eq!(
            entity,
            Value::from(json!({
                "name": "pkg",
                "meta": {"role": "mine", "warehouse": "wh"},
                "stage": "app_src.stage",
            }))
        );
    }

    #[test]
    fn path_lookup() {
        let value = Value::from(json!({"a": {"list": [{"b": "found"}]}}));
        let path = [
            PathSegment::from("a"),
            PathSegment::from("list"),
            PathSegment::Index(0),
            PathSegment::from("b"),
        ];

        assert_eq!(value.get_path(&path), Some(&Value::from("found")));
        assert_eq!(display_path(&path), "a.list.0.b");
        assert_eq!(value.get_path(&[PathSegment::from("missing")]), None);
    }

    #[test]
    fn template_string_of_scalars() {
        assert_eq!(Value::Boolean(true).to_template_string().unwrap(), "true");
        assert_eq!(Value::Integer(42).to_template_string().unwrap(), "42");
        assert_eq!(Value::Null.to_template_string().unwrap(), "");
        assert_eq!(Value::object().to_template_string(), None);
    }
}
