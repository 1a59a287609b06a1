//! # quarry-core
//!
//! Foundation crate for the Quarry retrieval toolkit.
//! Defines the data model, error taxonomy, configuration, collaborator traits,
//! and constants. Every other crate in the workspace depends on this.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod observability;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use cancel::CancellationToken;
pub use config::QuarryConfig;
pub use errors::{QuarryError, QuarryResult};
pub use models::{FieldValue, Fingerprint, Record, RecordId, RetrievedContext};
