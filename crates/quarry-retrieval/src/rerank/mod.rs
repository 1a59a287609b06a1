//! Second-stage reranking of a candidate pool.
//!
//! Reranking never fails a query: when the reranker errors or returns the
//! wrong number of scores, candidates come back in their original order and
//! a degradation event is reported.

mod http;

use std::sync::Arc;

use tracing::{debug, warn};

use quarry_core::config::RetrievalConfig;
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::{DegradationEvent, FieldValue, RetrievedContext};
use quarry_core::traits::IReranker;

pub use http::HttpReranker;

const COMPONENT: &str = "reranker";

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub contexts: Vec<RetrievedContext>,
    /// Set when the reranker failed and the original order was kept.
    pub event: Option<DegradationEvent>,
    pub reranked: bool,
}

/// Text the reranker sees for a candidate: its matched fields, newline-joined.
fn candidate_text(ctx: &RetrievedContext) -> String {
    ctx.matched_fields
        .iter()
        .filter_map(|f| ctx.fields.get(f).and_then(FieldValue::as_text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rescore `candidates` with `reranker` and reorder by the new score.
///
/// Ties keep their original relative order. Scores are replaced and the
/// source tag gains a `+rerank:<name>` suffix.
pub fn rerank(query: &str, candidates: Vec<RetrievedContext>, reranker: &dyn IReranker) -> RerankOutcome {
    if candidates.is_empty() {
        return RerankOutcome {
            contexts: candidates,
            event: None,
            reranked: false,
        };
    }

    let texts: Vec<String> = candidates.iter().map(candidate_text).collect();
    let failure = match reranker.score(query, &texts) {
        Ok(scores) if scores.len() == candidates.len() => {
            let mut scored: Vec<(f64, RetrievedContext)> = scores.into_iter().zip(candidates).collect();
            // Stable: equal scores stay in candidate order.
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            let contexts = scored
                .into_iter()
                .map(|(score, mut ctx)| {
                    ctx.score = score;
                    ctx.source = format!("{}+rerank:{}", ctx.source, reranker.name());
                    ctx
                })
                .collect::<Vec<_>>();
            debug!(reranker = reranker.name(), candidates = contexts.len(), "reranked");
            return RerankOutcome {
                contexts,
                event: None,
                reranked: true,
            };
        }
        Ok(scores) => format!(
            "{} returned {} scores for {} candidates",
            reranker.name(),
            scores.len(),
            candidates.len()
        ),
        Err(e) => format!("{}: {e}", reranker.name()),
    };

    warn!(reranker = reranker.name(), failure = %failure, "rerank failed, keeping retrieval order");
    RerankOutcome {
        contexts: candidates,
        event: Some(DegradationEvent::now(COMPONENT, failure, "retrieval order")),
        reranked: false,
    }
}

/// Reranker named by the retrieval config, if reranking is enabled.
pub fn create_reranker(config: &RetrievalConfig) -> QuarryResult<Option<Arc<dyn IReranker>>> {
    if !config.rerank_enabled {
        return Ok(None);
    }
    if config.reranker.endpoint.is_none() {
        return Err(QuarryError::ConfigError {
            reason: "retrieval.rerank_enabled requires retrieval.reranker.endpoint".to_string(),
        });
    }
    Ok(Some(Arc::new(HttpReranker::new(&config.reranker)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::models::fields;
    use test_fixtures::MockReranker;

    fn ctx(id: u64, text: &str, score: f64) -> RetrievedContext {
        RetrievedContext {
            record_id: id,
            score,
            fields: fields([("text", text)]),
            matched_fields: vec!["text".to_string()],
            source: "dense".to_string(),
        }
    }

    fn pool() -> Vec<RetrievedContext> {
        vec![
            ctx(1, "a dog barks", 0.9),
            ctx(2, "the cat sleeps", 0.8),
            ctx(3, "birds fly", 0.7),
            ctx(4, "a cat and a dog", 0.6),
        ]
    }

    #[test]
    fn reorders_by_new_score_keeping_ties_stable() {
        let outcome = rerank("cat", pool(), &MockReranker::keyword("cat"));
        assert!(outcome.reranked);
        assert!(outcome.event.is_none());
        let ids: Vec<u64> = outcome.contexts.iter().map(|c| c.record_id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
        assert_eq!(outcome.contexts[0].score, 1.0);
        assert_eq!(outcome.contexts[0].source, "dense+rerank:mock");
    }

    #[test]
    fn failure_keeps_original_order() {
        let reranker = MockReranker::failing();
        let outcome = rerank("cat", pool(), &reranker);
        assert!(!outcome.reranked);
        assert_eq!(outcome.contexts, pool());
        let event = outcome.event.unwrap();
        assert_eq!(event.component, "reranker");
        assert_eq!(reranker.calls(), 1);
    }

    #[test]
    fn short_score_list_keeps_original_order() {
        let outcome = rerank("cat", pool(), &MockReranker::short());
        assert!(!outcome.reranked);
        assert_eq!(outcome.contexts, pool());
        assert!(outcome.event.unwrap().failure.contains("3 scores for 4"));
    }

    #[test]
    fn empty_pool_skips_the_reranker() {
        let reranker = MockReranker::keyword("cat");
        let outcome = rerank("cat", Vec::new(), &reranker);
        assert!(outcome.contexts.is_empty());
        assert_eq!(reranker.calls(), 0);
    }

    #[test]
    fn disabled_config_builds_nothing() {
        assert!(create_reranker(&RetrievalConfig::default()).unwrap().is_none());
        let config = RetrievalConfig {
            rerank_enabled: true,
            ..RetrievalConfig::default()
        };
        assert!(matches!(
            create_reranker(&config),
            Err(QuarryError::ConfigError { .. })
        ));
    }
}
