pub mod degradation_event;
pub mod field_filter;
pub mod fingerprint;
pub mod record;
pub mod retrieved_context;

pub use degradation_event::DegradationEvent;
pub use field_filter::{FieldFilter, FieldPredicate};
pub use fingerprint::Fingerprint;
pub use record::{fields, FieldMap, FieldValue, Record, RecordId};
pub use retrieved_context::RetrievedContext;
