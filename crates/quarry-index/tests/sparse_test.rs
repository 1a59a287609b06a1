//! Sparse backend ranking over the animals fixture corpus.

use std::path::Path;
use std::sync::Arc;

use quarry_core::config::{BackendVariant, IndexConfig};
use quarry_core::errors::QuarryError;
use quarry_core::traits::ITokenizer;
use quarry_index::{
    create_backend, BuildContext, BuildSession, IndexHandle, IndexItem, SearchQuery, SimpleTokenizer,
};
use test_fixtures::load_corpus;

fn sparse_config() -> IndexConfig {
    IndexConfig {
        variant: BackendVariant::Sparse,
        ..IndexConfig::default()
    }
}

fn animals() -> Vec<IndexItem> {
    load_corpus("animals")
        .into_iter()
        .enumerate()
        .map(|(i, fields)| IndexItem {
            id: i as u64 + 1,
            vector: None,
            text: fields["text"].as_text().map(str::to_string),
        })
        .collect()
}

fn build_items(
    config: &IndexConfig,
    dir: &Path,
    tokenizer: Arc<dyn ITokenizer>,
    items: &[IndexItem],
) -> Arc<dyn IndexHandle> {
    let ctx = BuildContext::new(vec!["text".to_string()]).with_tokenizer(tokenizer);
    let mut session = BuildSession::begin(create_backend(config), &dir.join("index"), ctx).unwrap();
    session.add_batch(items).unwrap();
    session.commit().unwrap()
}

fn build(config: &IndexConfig, dir: &Path, tokenizer: Arc<dyn ITokenizer>) -> Arc<dyn IndexHandle> {
    build_items(config, dir, tokenizer, &animals())
}

fn ids(hits: &[quarry_index::ScoredId]) -> Vec<u64> {
    hits.iter().map(|h| h.id).collect()
}

#[test]
fn cat_query_ranks_the_cat_documents() {
    let dir = tempfile::tempdir().unwrap();
    let handle = build(&sparse_config(), dir.path(), Arc::new(SimpleTokenizer::default()));

    let hits = handle.search(&SearchQuery::text("cat"), 10).unwrap();
    // "Cats" mentions cat twice, "Kittens" once; the rest follow at 0 by id.
    assert_eq!(ids(&hits), vec![1, 3, 2, 4, 5, 6, 7, 8, 9, 10]);
    assert!(hits[0].score > hits[1].score);
    assert!(hits[1].score > 0.0);
    assert!(hits[2..].iter().all(|h| h.score == 0.0));
}

#[test]
fn cat_outranks_dog_in_a_two_document_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let items: Vec<IndexItem> = ["the cat sat", "the dog ran"]
        .iter()
        .enumerate()
        .map(|(i, text)| IndexItem {
            id: i as u64 + 1,
            vector: None,
            text: Some(text.to_string()),
        })
        .collect();
    let handle = build_items(&sparse_config(), dir.path(), Arc::new(SimpleTokenizer::default()), &items);

    let hits = handle.search(&SearchQuery::text("cat"), 10).unwrap();
    assert_eq!(ids(&hits), vec![1, 2]);
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn k_beyond_the_corpus_returns_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let handle = build(&sparse_config(), dir.path(), Arc::new(SimpleTokenizer::default()));

    let unmatched = handle.search(&SearchQuery::text("submarine"), 50).unwrap();
    assert_eq!(ids(&unmatched), (1..=12).collect::<Vec<u64>>());
    assert!(unmatched.iter().all(|h| h.score == 0.0));
    let night = handle.search(&SearchQuery::text("night"), 50).unwrap();
    assert_eq!(night.len(), 12);
    assert_eq!(ids(&night[..2]), vec![4, 12]);
    assert_eq!(handle.search(&SearchQuery::text("night"), 1).unwrap().len(), 1);
    assert!(handle.search(&SearchQuery::text("night"), 0).unwrap().is_empty());
}

#[test]
fn multi_term_query_prefers_documents_matching_more_terms() {
    let dir = tempfile::tempdir().unwrap();
    let handle = build(&sparse_config(), dir.path(), Arc::new(SimpleTokenizer::default()));
    let hits = handle.search(&SearchQuery::text("lazy dog"), 10).unwrap();
    // The fox passage has both terms.
    assert_eq!(hits[0].id, 5);
    assert!(ids(&hits).contains(&2));
}

#[test]
fn stopwords_never_match() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sparse_config();
    config.sparse.stopwords = vec!["the".to_string()];
    let tokenizer = Arc::new(SimpleTokenizer::from_config(&config.sparse));
    let handle = build(&config, dir.path(), tokenizer);
    let hits = handle.search(&SearchQuery::text("the"), 10).unwrap();
    assert!(hits.iter().all(|h| h.score == 0.0));
}

#[test]
fn vector_only_query_is_invalid_for_sparse() {
    let dir = tempfile::tempdir().unwrap();
    let handle = build(&sparse_config(), dir.path(), Arc::new(SimpleTokenizer::default()));
    assert!(matches!(
        handle.search(&SearchQuery::vector(vec![1.0]), 3),
        Err(QuarryError::InvalidArgument { .. })
    ));
}

#[test]
fn manifest_records_the_tokenizer() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer = Arc::new(SimpleTokenizer::default());
    let handle = build(&sparse_config(), dir.path(), tokenizer.clone());
    let manifest = handle.manifest();
    assert_eq!(manifest.tokenizer, Some(tokenizer.fingerprint()));
    assert_eq!(manifest.encoder, None);
    assert_eq!(manifest.record_count, 12);
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.files[0].path, "postings.json");
}
