//! What a parser can answer for one placeholder.
//!
//! Serializes to the wire shapes `{"type": "data", "data": ..}`,
//! `{"type": "block:open", "block": .., "data": ..}` and
//! `{"type": "block:close", "block": ..}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Directive {
    /// Substitute the value at the placeholder.
    #[serde(rename = "data")]
    Data { data: Value },

    /// Start a block region. `block` pairs it with its close.
    #[serde(rename = "block:open")]
    BlockOpen { block: String, data: Value },

    /// End the innermost open block.
    #[serde(rename = "block:close")]
    BlockClose { block: String },
}

impl Directive {
    pub fn is_block(&self) -> bool {
        !matches!(self, Directive::Data { .. })
    }
}

impl From<Value> for Directive {
    fn from(data: Value) -> Self {
        Directive::Data { data }
    }
}

/// `data(value)`: a plain substitution.
pub fn data(value: impl Into<Value>) -> Directive {
    Directive::Data { data: value.into() }
}

/// Block directive constructors.
pub mod block {
    use super::Directive;
    use serde_json::Value;

    pub fn open(block: impl Into<String>, data: impl Into<Value>) -> Directive {
        Directive::BlockOpen {
            block: block.into(),
            data: data.into(),
        }
    }

    pub fn close(block: impl Into<String>) -> Directive {
        Directive::BlockClose {
            block: block.into(),
        }
    }
}
