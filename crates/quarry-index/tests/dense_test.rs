//! Dense backend ranking: exact top-1, metrics, boundaries, IVF.

use std::path::Path;
use std::sync::Arc;

use quarry_core::config::{BackendVariant, DenseStructure, DistanceMetric, IndexConfig};
use quarry_core::errors::QuarryError;
use quarry_core::models::Fingerprint;
use quarry_index::{
    create_backend, load_index, BuildContext, BuildSession, IndexHandle, IndexItem, SearchQuery,
};
use test_fixtures::{synthetic_corpus, MockEncoder};

const DIMS: usize = 32;

fn ctx() -> BuildContext {
    BuildContext::new(vec!["text".to_string()]).with_encoder(Fingerprint::new("mock", "1", DIMS))
}

fn items(encoder: &MockEncoder, n: usize) -> Vec<IndexItem> {
    synthetic_corpus(n)
        .into_iter()
        .enumerate()
        .map(|(i, fields)| {
            let text = fields["text"].as_text().unwrap().to_string();
            IndexItem {
                id: i as u64 + 1,
                vector: Some(encoder.vector_for(&text)),
                text: Some(text),
            }
        })
        .collect()
}

fn build(config: &IndexConfig, dir: &Path, items: &[IndexItem]) -> Arc<dyn IndexHandle> {
    let mut session = BuildSession::begin(create_backend(config), &dir.join("index"), ctx()).unwrap();
    for chunk in items.chunks(16) {
        session.add_batch(chunk).unwrap();
    }
    session.commit().unwrap()
}

fn dense(metric: DistanceMetric) -> IndexConfig {
    let mut config = IndexConfig {
        variant: BackendVariant::Dense,
        ..IndexConfig::default()
    };
    config.dense.metric = metric;
    config
}

fn ids(hits: &[quarry_index::ScoredId]) -> Vec<u64> {
    hits.iter().map(|h| h.id).collect()
}

#[test]
fn stored_vector_is_its_own_top_hit() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 200);
    let handle = build(&dense(DistanceMetric::Cosine), dir.path(), &items);
    assert_eq!(handle.len(), 200);

    for item in items.iter().step_by(17) {
        let query = SearchQuery::vector(item.vector.clone().unwrap());
        let hits = handle.search(&query, 5).unwrap();
        assert_eq!(hits[0].id, item.id);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }
}

#[test]
fn every_metric_finds_the_exact_match() {
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 50);
    for metric in [DistanceMetric::Cosine, DistanceMetric::InnerProduct, DistanceMetric::L2] {
        let dir = tempfile::tempdir().unwrap();
        let handle = build(&dense(metric), dir.path(), &items);
        let target = &items[23];
        let hits = handle
            .search(&SearchQuery::vector(target.vector.clone().unwrap()), 3)
            .unwrap();
        assert_eq!(hits[0].id, target.id, "metric {metric:?}");
        if metric == DistanceMetric::L2 {
            assert!(hits[0].score.abs() < 1e-9);
        }
    }
}

#[test]
fn results_are_bounded_and_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 30);
    let handle = build(&dense(DistanceMetric::Cosine), dir.path(), &items);
    let query = SearchQuery::vector(encoder.vector_for("harbor lantern"));

    assert!(handle.search(&query, 0).unwrap().is_empty());
    assert_eq!(handle.search(&query, 7).unwrap().len(), 7);

    let all = handle.search(&query, 1000).unwrap();
    assert_eq!(all.len(), 30);
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn empty_corpus_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let handle = build(&dense(DistanceMetric::Cosine), dir.path(), &[]);
    assert!(handle.is_empty());
    let hits = handle.search(&SearchQuery::vector(vec![0.5; DIMS]), 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn wrong_query_dimension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let handle = build(&dense(DistanceMetric::Cosine), dir.path(), &items(&encoder, 5));
    let err = handle.search(&SearchQuery::vector(vec![1.0; DIMS + 1]), 3).unwrap_err();
    assert!(matches!(
        err,
        QuarryError::DimensionMismatch { expected: DIMS, actual } if actual == DIMS + 1
    ));
}

#[test]
fn wrong_item_dimension_fails_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = dense(DistanceMetric::Cosine);
    let mut session = BuildSession::begin(create_backend(&config), &dir.path().join("index"), ctx()).unwrap();
    let bad = IndexItem {
        id: 1,
        vector: Some(vec![1.0; 3]),
        text: None,
    };
    assert!(matches!(
        session.add_batch(&[bad]),
        Err(QuarryError::DimensionMismatch { .. })
    ));
}

#[test]
fn text_only_query_is_invalid_for_dense() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let handle = build(&dense(DistanceMetric::Cosine), dir.path(), &items(&encoder, 5));
    assert!(matches!(
        handle.search(&SearchQuery::text("river"), 3),
        Err(QuarryError::InvalidArgument { .. })
    ));
}

#[test]
fn parallel_scan_matches_sequential_scan() {
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 120);
    let query = SearchQuery::vector(encoder.vector_for("copper signal"));

    let mut sequential = dense(DistanceMetric::Cosine);
    sequential.dense.parallel_scan_threshold = usize::MAX;
    let mut parallel = dense(DistanceMetric::Cosine);
    parallel.dense.parallel_scan_threshold = 1;

    let a_dir = tempfile::tempdir().unwrap();
    let b_dir = tempfile::tempdir().unwrap();
    let a = build(&sequential, a_dir.path(), &items).search(&query, 15).unwrap();
    let b = build(&parallel, b_dir.path(), &items).search(&query, 15).unwrap();
    assert_eq!(a, b);
}

#[test]
fn small_insert_batches_reload_identically() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 40);
    let mut config = dense(DistanceMetric::Cosine);
    config.dense.insert_batch_size = 3;
    let built = build(&config, dir.path(), &items);

    let loaded = load_index(create_backend(&config).as_ref(), &dir.path().join("index"), &ctx()).unwrap();
    let query = SearchQuery::vector(encoder.vector_for("orchard glacier"));
    assert_eq!(loaded.search(&query, 10).unwrap(), built.search(&query, 10).unwrap());
    assert_eq!(loaded.manifest().record_count, 40);
}

#[test]
fn ivf_probing_every_list_is_exact() {
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 150);
    let query = SearchQuery::vector(encoder.vector_for("violet archive"));

    let flat_dir = tempfile::tempdir().unwrap();
    let flat = build(&dense(DistanceMetric::Cosine), flat_dir.path(), &items);

    let mut ivf = dense(DistanceMetric::Cosine);
    ivf.dense.structure = DenseStructure::Ivf;
    ivf.dense.n_lists = 8;
    ivf.dense.n_probe = 8;
    let ivf_dir = tempfile::tempdir().unwrap();
    let approx = build(&ivf, ivf_dir.path(), &items);

    assert_eq!(ids(&approx.search(&query, 10).unwrap()), ids(&flat.search(&query, 10).unwrap()));
    assert!(ivf_dir.path().join("index").join("ivf.json").exists());
}

#[test]
fn ivf_single_probe_still_finds_stored_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let items = items(&encoder, 100);
    let mut config = dense(DistanceMetric::Cosine);
    config.dense.structure = DenseStructure::Ivf;
    config.dense.n_lists = 10;
    config.dense.n_probe = 1;
    config.dense.train_size = 60;
    let handle = build(&config, dir.path(), &items);

    for item in items.iter().step_by(11) {
        let hits = handle
            .search(&SearchQuery::vector(item.vector.clone().unwrap()), 5)
            .unwrap();
        assert!(hits.len() <= 5);
        assert_eq!(hits[0].id, item.id);
    }
}
