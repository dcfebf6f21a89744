use serde_json::{Map, Value};
use std::collections::HashMap;

/// Variables visible to the parser during a render.
///
/// The engine never reads it; it is handed to the parser as-is, and the
/// block policy derives per-iteration scopes from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: Map<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope from a JSON object. Anything else is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(vars) => Some(Self { vars }),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.vars)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    /// A copy of this scope with one more (or one replaced) variable.
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut scope = self.clone();
        scope.insert(name, value);
        scope
    }

    /// Resolve a dotted path such as `order.lines.0.sku`. Numeric segments
    /// index into arrays.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.trim().split('.');
        let first = segments.next()?;
        let mut current = self.vars.get(first.trim())?;

        for segment in segments {
            let segment = segment.trim();
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.vars.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl From<Map<String, Value>> for Scope {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Scratch space shared by every parser call of one render.
///
/// Created fresh for each render (or passed in by a renderer that renders
/// several parts of one document); never shared between renders.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<String, Value>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Return the cached value for `key`, computing it on first use.
    pub fn get_or_insert_with(&mut self, key: &str, f: impl FnOnce() -> Value) -> &Value {
        self.entries.entry(key.to_string()).or_insert_with(f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
