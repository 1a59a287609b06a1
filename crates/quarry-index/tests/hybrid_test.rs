//! Hybrid fusion over the animals corpus.

use std::path::Path;
use std::sync::Arc;

use quarry_core::config::{BackendVariant, FusionRule, IndexConfig};
use quarry_core::errors::QuarryError;
use quarry_core::traits::IEncoder;
use quarry_index::{
    create_backend, BuildContext, BuildSession, IndexHandle, IndexItem, SearchQuery, SimpleTokenizer,
};
use test_fixtures::{load_corpus, MockEncoder};

const DIMS: usize = 16;

fn hybrid(fusion: FusionRule, dense_weight: f64) -> IndexConfig {
    let mut config = IndexConfig {
        variant: BackendVariant::Hybrid,
        ..IndexConfig::default()
    };
    config.hybrid.fusion = fusion;
    config.hybrid.dense_weight = dense_weight;
    config
}

fn ctx(encoder: &MockEncoder) -> BuildContext {
    BuildContext::new(vec!["text".to_string()])
        .with_encoder(encoder.fingerprint())
        .with_tokenizer(Arc::new(SimpleTokenizer::default()))
}

fn build(config: &IndexConfig, dir: &Path, encoder: &MockEncoder) -> Arc<dyn IndexHandle> {
    let items: Vec<IndexItem> = load_corpus("animals")
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
        .collect();
    let mut session = BuildSession::begin(create_backend(config), &dir.join("index"), ctx(encoder)).unwrap();
    session.add_batch(&items).unwrap();
    session.commit().unwrap()
}

fn query(encoder: &MockEncoder, text: &str) -> SearchQuery {
    SearchQuery::text(text).with_vector(encoder.vector_for(text))
}

#[test]
fn identical_builds_give_identical_results() {
    let encoder = MockEncoder::new(DIMS);
    for fusion in [FusionRule::Weighted, FusionRule::Rrf] {
        let config = hybrid(fusion, 0.5);
        let a_dir = tempfile::tempdir().unwrap();
        let b_dir = tempfile::tempdir().unwrap();
        let a = build(&config, a_dir.path(), &encoder);
        let b = build(&config, b_dir.path(), &encoder);
        for text in ["cat", "night owls", "the dog", "ocean songs"] {
            let q = query(&encoder, text);
            let first = a.search(&q, 5).unwrap();
            assert_eq!(first, a.search(&q, 5).unwrap());
            assert_eq!(first, b.search(&q, 5).unwrap());
        }
    }
}

#[test]
fn full_sparse_weight_ranks_lexical_matches_first() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let handle = build(&hybrid(FusionRule::Weighted, 0.0), dir.path(), &encoder);
    let hits = handle.search(&query(&encoder, "cat"), 2).unwrap();
    // Min-max maps the weaker lexical match to 0, the floor every
    // dense-only candidate shares.
    assert_eq!(hits[0].id, 1);
    assert_eq!(hits[0].score, 1.0);
}

#[test]
fn rrf_includes_both_candidate_lists() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let handle = build(&hybrid(FusionRule::Rrf, 0.5), dir.path(), &encoder);
    let hits = handle.search(&query(&encoder, "cat"), 12).unwrap();
    // Dense candidates cover the whole corpus; the two lexical matches get
    // a second contribution and lead.
    assert_eq!(hits.len(), 12);
    let top2: Vec<u64> = hits.iter().take(2).map(|h| h.id).collect();
    assert!(top2.contains(&1) && top2.contains(&3), "got {top2:?}");
}

#[test]
fn hybrid_query_needs_text_and_vector() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let handle = build(&hybrid(FusionRule::Weighted, 0.5), dir.path(), &encoder);
    assert!(matches!(
        handle.search(&SearchQuery::text("cat"), 3),
        Err(QuarryError::InvalidArgument { .. })
    ));
    assert!(matches!(
        handle.search(&SearchQuery::vector(encoder.vector_for("cat")), 3),
        Err(QuarryError::InvalidArgument { .. })
    ));
}

#[test]
fn sub_indexes_are_listed_in_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new(DIMS);
    let handle = build(&hybrid(FusionRule::Weighted, 0.5), dir.path(), &encoder);
    let paths: Vec<&str> = handle.manifest().files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["dense/vectors.bin", "sparse/postings.json"]);
    assert!(handle.manifest().encoder.is_some());
    assert!(handle.manifest().tokenizer.is_some());
}
