use crate::errors::QuarryResult;

/// Second-pass relevance model.
pub trait IReranker: Send + Sync {
    /// Score each document against the query. Returns one score per
    /// document, in input order; higher is more relevant.
    fn score(&self, query: &str, documents: &[String]) -> QuarryResult<Vec<f64>>;

    fn name(&self) -> &str;
}
