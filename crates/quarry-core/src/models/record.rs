use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::QuarryResult;

/// Stable record identifier, allocated sequentially by the content store.
pub type RecordId = u64;

/// Field name → value mapping. Ordered so the content hash is canonical.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single field payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
}

impl FieldValue {
    /// Text payload, if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Binary(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(bytes: Vec<u8>) -> Self {
        FieldValue::Binary(bytes)
    }
}

/// An immutable stored document or passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// blake3 hex digest of the canonical field map.
    pub content_hash: String,
    pub fields: FieldMap,
}

impl Record {
    /// Compute the content hash of a field map.
    ///
    /// `FieldMap` is a `BTreeMap`, so the JSON serialization is key-ordered
    /// and the hash does not depend on insertion order.
    pub fn compute_content_hash(fields: &FieldMap) -> QuarryResult<String> {
        let canonical = serde_json::to_vec(fields)?;
        Ok(blake3::hash(&canonical).to_hex().to_string())
    }

    /// Text value of a field, if present and textual.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }

    /// Join the text of the given fields with newlines, skipping missing
    /// and binary fields. This is the encoder and tokenizer input.
    pub fn joined_text(&self, fields: &[String]) -> String {
        fields
            .iter()
            .filter_map(|f| self.text(f))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build a `FieldMap` from `(name, value)` pairs.
pub fn fields<I, K, V>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
