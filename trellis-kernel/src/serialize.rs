//! Pluggable attribute serialization.
//!
//! Booleans and numbers never reach the serializer; the tree builder emits
//! them as script-safe literals directly. Everything else is serialized
//! here. The contract is deliberately small: deterministic output,
//! round-trippable for the value kinds a deployment supports.

use crate::component::AttrValue;

pub trait AttributeSerializer: Send + Sync {
    fn serialize(&self, value: &AttrValue) -> anyhow::Result<String>;
}

/// Default serializer: text passes through, structured values become JSON.
pub struct JsonAttributeSerializer;

impl AttributeSerializer for JsonAttributeSerializer {
    fn serialize(&self, value: &AttrValue) -> anyhow::Result<String> {
        match value {
            AttrValue::Bool(b) => Ok(b.to_string()),
            AttrValue::Int(i) => Ok(i.to_string()),
            AttrValue::Float(f) => Ok(f.to_string()),
            AttrValue::Text(s) => Ok(s.clone()),
            AttrValue::Json(v) => Ok(serde_json::to_string(v)?),
        }
    }
}
