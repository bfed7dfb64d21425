//! Literal-or-reference config fields
//!
//! Config fields that accept runtime injection (API keys, passwords) are typed
//! `FieldValue<T>`: either a literal value or a `{"$ref": "..."}` placeholder.
//! The external runtime substitutes literals for references before a resource
//! is invoked; a reference that survives to invocation is a runtime bug and
//! surfaces as `ResourceError::UnresolvedReference`.

use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};

/// Placeholder pointing at another resource's output field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Target path, e.g. `my-secret.outputs.data`
    #[serde(rename = "$ref")]
    pub target: String,
}

/// A config field holding either a literal value or an unresolved reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue<T> {
    Reference(FieldRef),
    Literal(T),
}

impl<T> FieldValue<T> {
    pub fn literal(value: T) -> Self {
        FieldValue::Literal(value)
    }

    pub fn reference(target: impl Into<String>) -> Self {
        FieldValue::Reference(FieldRef {
            target: target.into(),
        })
    }

    /// Access the literal value, failing if the reference was never resolved.
    pub fn value(&self) -> ResourceResult<&T> {
        match self {
            FieldValue::Literal(value) => Ok(value),
            FieldValue::Reference(field_ref) => {
                Err(ResourceError::UnresolvedReference(field_ref.target.clone()))
            }
        }
    }
}

impl<T> From<T> for FieldValue<T> {
    fn from(value: T) -> Self {
        FieldValue::Literal(value)
    }
}

impl From<&str> for FieldValue<String> {
    fn from(value: &str) -> Self {
        FieldValue::Literal(value.to_string())
    }
}
