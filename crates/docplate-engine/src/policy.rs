//! How block data turns into repetitions of the block body.

use crate::scope::Scope;
use serde_json::Value;

/// Template-specific helpers on JSON values.
pub trait ValueExt {
    /// Truthiness for conditional blocks.
    fn is_truthy(&self) -> bool;

    /// Human-readable type name.
    fn type_name(&self) -> &'static str;

    /// Text substituted at a placeholder.
    fn render_to_string(&self) -> String;
}

impl ValueExt for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn render_to_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => self.to_string(),
        }
    }
}

/// Decides how often a block body is emitted and with which scope.
///
/// Each returned scope renders the body once, in order. An empty list omits
/// the block.
pub trait BlockPolicy: Send + Sync {
    fn iterations(&self, block: &str, data: &Value, scope: &Scope) -> Vec<Scope>;
}

/// Default policy: arrays repeat once per element, other truthy data renders
/// once, falsy data omits the block. The element (or the data) is bound to
/// the block name.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepeatPolicy;

impl BlockPolicy for RepeatPolicy {
    fn iterations(&self, block: &str, data: &Value, scope: &Scope) -> Vec<Scope> {
        match data {
            Value::Array(items) => items.iter().map(|item| scope.with(block, item.clone())).collect(),
            data if data.is_truthy() => vec![scope.with(block, data.clone())],
            _ => Vec::new(),
        }
    }
}
