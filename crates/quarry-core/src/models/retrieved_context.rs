use serde::{Deserialize, Serialize};

use super::{FieldMap, RecordId};

/// One ranked passage returned by a query. Produced fresh per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub record_id: RecordId,
    pub score: f64,
    /// Display fields of the record.
    pub fields: FieldMap,
    /// Fields the index matched against.
    pub matched_fields: Vec<String>,
    /// Backend tag, e.g. `dense`, `hybrid`, or `sparse+rerank:jina`.
    pub source: String,
}
