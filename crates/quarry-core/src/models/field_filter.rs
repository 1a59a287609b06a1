use serde::{Deserialize, Serialize};

use super::Record;

/// A predicate over one record field, applied to query candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub predicate: FieldPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldPredicate {
    /// Field exists (text or binary).
    Exists,
    /// Text field equals the value exactly.
    Equals(String),
    /// Text field contains the value, case-insensitively.
    Contains(String),
    /// Text field is one of the values.
    OneOf(Vec<String>),
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, predicate: FieldPredicate) -> Self {
        Self {
            field: field.into(),
            predicate,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match &self.predicate {
            FieldPredicate::Exists => record.fields.contains_key(&self.field),
            FieldPredicate::Equals(v) => record.text(&self.field) == Some(v.as_str()),
            FieldPredicate::Contains(v) => record
                .text(&self.field)
                .is_some_and(|t| t.to_lowercase().contains(&v.to_lowercase())),
            FieldPredicate::OneOf(values) => record
                .text(&self.field)
                .is_some_and(|t| values.iter().any(|v| v == t)),
        }
    }
}
