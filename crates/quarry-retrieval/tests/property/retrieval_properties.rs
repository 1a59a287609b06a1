//! Property tests for the query path.

use std::sync::Arc;

use proptest::prelude::*;

use quarry_core::config::{BackendVariant, QuarryConfig};
use quarry_core::models::{FieldFilter, FieldPredicate};
use quarry_core::CancellationToken;
use quarry_retrieval::Retriever;
use quarry_store::ContentStore;
use test_fixtures::{load_corpus, MockEncoder};

const DIMS: usize = 8;
const WORDS: [&str; 8] = ["cat", "dog", "night", "ocean", "the", "meadow", "fox", "bees"];

fn variant() -> impl Strategy<Value = BackendVariant> {
    prop_oneof![
        Just(BackendVariant::Dense),
        Just(BackendVariant::Sparse),
        Just(BackendVariant::Hybrid),
    ]
}

fn query() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS.to_vec()), 1..4).prop_map(|w| w.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_results_are_bounded_sorted_and_filtered(
        variant in variant(),
        query in query(),
        top_k in 0usize..16,
        filtered in any::<bool>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QuarryConfig::default();
        config.index.variant = variant;
        config.index.path = dir.path().join("index").display().to_string();
        config.embedding.dimensions = DIMS;
        config.embedding.l2_cache_enabled = false;
        config.retrieval.pool_size = 4;

        let store = Arc::new(ContentStore::open(&dir.path().join("store"), &config.storage).unwrap());
        store.put_many(load_corpus("animals")).unwrap();
        let retriever = Retriever::new(&config, Arc::clone(&store), Arc::new(MockEncoder::new(DIMS))).unwrap();
        retriever.build_index(&store, &CancellationToken::new()).unwrap();

        let filters = if filtered {
            vec![FieldFilter::new("topic", FieldPredicate::Equals("pets".to_string()))]
        } else {
            Vec::new()
        };
        let results = retriever.retrieve(&query, top_k, &filters).unwrap();

        prop_assert!(results.len() <= top_k);
        prop_assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        let mut ids: Vec<u64> = results.iter().map(|r| r.record_id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), results.len());
        if filtered {
            prop_assert!(results.iter().all(|r| r.fields["topic"].as_text() == Some("pets")));
        }
        prop_assert_eq!(retriever.retrieve(&query, top_k, &filters).unwrap(), results);
    }
}
