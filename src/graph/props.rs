//! Resource property values
//!
//! Properties are literal values or explicit reference values that the
//! downstream renderer resolves against the graph: `Ref` to a resource's
//! identifier, `GetAtt` to a computed attribute (ARN, endpoint address),
//! `Join` for string assembly, and pseudo parameters supplied by the target
//! platform at deploy time.

use std::collections::BTreeMap;

use serde::Serialize;

/// Platform-supplied pseudo parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PseudoParam {
    Region,
    AccountId,
}

/// A resource property value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropValue {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<PropValue>),
    Map(BTreeMap<String, PropValue>),
    /// Identifier of another resource in the same graph
    Ref { name: String },
    /// Computed attribute of another resource in the same graph
    GetAtt { resource: String, attribute: String },
    /// Parts joined with a separator at render time
    Join {
        separator: String,
        parts: Vec<PropValue>,
    },
    Pseudo(PseudoParam),
}

impl PropValue {
    /// Reference to a resource's identifier
    pub fn reference(name: impl Into<String>) -> Self {
        PropValue::Ref { name: name.into() }
    }

    /// Reference to a resource's computed attribute
    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        PropValue::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    pub fn join(separator: impl Into<String>, parts: Vec<PropValue>) -> Self {
        PropValue::Join {
            separator: separator.into(),
            parts,
        }
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropValue)>,
    {
        PropValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// Collect the names of all resources this value references, depth-first
    pub(crate) fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            PropValue::Ref { name } => out.push(name),
            PropValue::GetAtt { resource, .. } => out.push(resource),
            PropValue::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            PropValue::Join { parts, .. } => {
                for part in parts {
                    part.collect_references(out);
                }
            }
            PropValue::Map(entries) => {
                for value in entries.values() {
                    value.collect_references(out);
                }
            }
            PropValue::String(_) | PropValue::Int(_) | PropValue::Bool(_) | PropValue::Pseudo(_) => {}
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::String(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::String(s)
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Int(n)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(items: Vec<PropValue>) -> Self {
        PropValue::List(items)
    }
}
