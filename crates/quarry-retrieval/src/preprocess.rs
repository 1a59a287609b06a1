//! Query rewriting before encode and search.
//!
//! Steps are named in `retrieval.query_preprocess` and run in order. Custom
//! steps can be appended through [`QueryPipeline::push`].

use std::sync::{Arc, LazyLock};

use regex::Regex;

use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::traits::IQueryProcessor;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

pub struct Lowercase;

impl IQueryProcessor for Lowercase {
    fn process(&self, query: &str) -> String {
        query.to_lowercase()
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}

/// Replaces every non-word, non-space character with a space.
pub struct StripPunctuation;

impl IQueryProcessor for StripPunctuation {
    fn process(&self, query: &str) -> String {
        PUNCTUATION_RE.replace_all(query, " ").into_owned()
    }

    fn name(&self) -> &str {
        "strip_punctuation"
    }
}

/// Trims and folds whitespace runs into one space.
pub struct CollapseWhitespace;

impl IQueryProcessor for CollapseWhitespace {
    fn process(&self, query: &str) -> String {
        WHITESPACE_RE.replace_all(query.trim(), " ").into_owned()
    }

    fn name(&self) -> &str {
        "collapse_whitespace"
    }
}

fn builtin(name: &str) -> Option<Arc<dyn IQueryProcessor>> {
    match name {
        "lowercase" => Some(Arc::new(Lowercase)),
        "strip_punctuation" => Some(Arc::new(StripPunctuation)),
        "collapse_whitespace" => Some(Arc::new(CollapseWhitespace)),
        _ => None,
    }
}

#[derive(Clone, Default)]
pub struct QueryPipeline {
    steps: Vec<Arc<dyn IQueryProcessor>>,
}

impl QueryPipeline {
    /// Pipeline of built-in steps. Unknown names are a `ConfigError`.
    pub fn from_names(names: &[String]) -> QuarryResult<Self> {
        let steps = names
            .iter()
            .map(|name| {
                builtin(name).ok_or_else(|| QuarryError::ConfigError {
                    reason: format!("unknown query preprocess step '{name}'"),
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn push(&mut self, step: Arc<dyn IQueryProcessor>) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, query: &str) -> String {
        self.steps
            .iter()
            .fold(query.to_string(), |q, step| step.process(&q))
    }
}
