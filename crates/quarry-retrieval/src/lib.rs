//! # quarry-retrieval
//!
//! The query-facing half of the workspace. [`Retriever`] owns the live
//! index slot, builds or loads indexes through the [`IndexPipeline`], and
//! answers top-k queries: rewrite the query, encode or tokenize, search, load records, filter,
//! optionally rerank, truncate.

pub mod engine;
pub mod filter;
pub mod pipeline;
pub mod preprocess;
pub mod query_cache;
pub mod rerank;

pub use engine::Retriever;
pub use pipeline::{IndexPipeline, PipelineReport};
pub use preprocess::QueryPipeline;
pub use query_cache::{QueryVectorCache, ResultCache, ResultKey};
pub use rerank::{create_reranker, rerank, HttpReranker, RerankOutcome};
