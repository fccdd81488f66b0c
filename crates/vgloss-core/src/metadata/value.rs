use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Leaf value of an extracted metadata document. Different images carry
/// different tag sets, but every tag is one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

pub type MetadataDocument = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Serialise a document for storage. Empty documents are stored as NULL.
pub fn encode_document(doc: &MetadataDocument) -> serde_json::Result<Option<String>> {
    if doc.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(doc).map(Some)
}

pub fn decode_document(raw: Option<&str>) -> serde_json::Result<MetadataDocument> {
    match raw {
        Some(json) => serde_json::from_str(json),
        None => Ok(MetadataDocument::new()),
    }
}
