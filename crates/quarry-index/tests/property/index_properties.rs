//! Property tests: flat search agrees with a brute-force ranking.

use proptest::prelude::*;

use quarry_core::config::{BackendVariant, DistanceMetric, IndexConfig};
use quarry_core::models::Fingerprint;
use quarry_index::topk::rank_order;
use quarry_index::{create_backend, BuildContext, BuildSession, IndexItem, ScoredId, SearchQuery};

const DIMS: usize = 6;

fn vectors(max: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-10.0f32..10.0, DIMS), 0..max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_l2_flat_search_is_brute_force_top_k(
        rows in vectors(60),
        query in prop::collection::vec(-10.0f32..10.0, DIMS),
        k in 0usize..80,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = IndexConfig { variant: BackendVariant::Dense, ..IndexConfig::default() };
        config.dense.metric = DistanceMetric::L2;
        let ctx = BuildContext::new(vec!["text".to_string()])
            .with_encoder(Fingerprint::new("prop", "1", DIMS));
        let items: Vec<IndexItem> = rows
            .iter()
            .enumerate()
            .map(|(i, v)| IndexItem { id: i as u64 + 1, vector: Some(v.clone()), text: None })
            .collect();

        let mut session = BuildSession::begin(create_backend(&config), &dir.path().join("index"), ctx).unwrap();
        session.add_batch(&items).unwrap();
        let handle = session.commit().unwrap();
        let hits = handle.search(&SearchQuery::vector(query.clone()), k).unwrap();

        let mut expected: Vec<ScoredId> = items
            .iter()
            .map(|item| {
                let v = item.vector.as_ref().unwrap();
                let d: f64 = v
                    .iter()
                    .zip(&query)
                    .map(|(a, b)| ((*a as f64) - (*b as f64)).powi(2))
                    .sum();
                ScoredId { id: item.id, score: -d }
            })
            .collect();
        expected.sort_by(rank_order);
        expected.truncate(k);

        prop_assert_eq!(hits.len(), k.min(rows.len()));
        prop_assert!(hits.windows(2).all(|w| rank_order(&w[0], &w[1]).is_le()));
        let hit_ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        let expected_ids: Vec<u64> = expected.iter().map(|h| h.id).collect();
        prop_assert_eq!(hit_ids, expected_ids);
    }
}
