//! Candidate pool sizing, field filters and result field projection.

use quarry_core::config::RetrievalConfig;
use quarry_core::models::{FieldFilter, FieldMap, Record};

/// Candidates to fetch from the index for one query.
///
/// Never below `top_k`; oversampled when filters will discard some.
pub fn pool_size(config: &RetrievalConfig, top_k: usize, filtered: bool) -> usize {
    let base = config.pool_size.max(top_k);
    if filtered {
        base.saturating_mul(config.filter_oversample.max(1))
    } else {
        base
    }
}

/// A record passes when every filter matches.
pub fn matches_all(record: &Record, filters: &[FieldFilter]) -> bool {
    filters.iter().all(|f| f.matches(record))
}

/// Copy the display fields out of `fields`. An empty list keeps everything.
pub fn project(fields: &FieldMap, display: &[String]) -> FieldMap {
    if display.is_empty() {
        return fields.clone();
    }
    fields
        .iter()
        .filter(|(name, _)| display.iter().any(|d| d == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
