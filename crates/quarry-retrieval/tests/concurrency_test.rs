//! Concurrent queries, rebuilds under load and the async facade.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use quarry_core::config::{BackendVariant, QuarryConfig};
use quarry_core::models::{FieldFilter, FieldPredicate};
use quarry_core::CancellationToken;
use quarry_retrieval::Retriever;
use quarry_store::ContentStore;
use test_fixtures::{synthetic_corpus, MockEncoder};

const DIMS: usize = 24;

fn setup(dir: &Path, variant: BackendVariant, n: usize) -> (Arc<ContentStore>, Arc<Retriever>) {
    let mut config = QuarryConfig::default();
    config.index.variant = variant;
    config.index.path = dir.join("index").display().to_string();
    config.embedding.dimensions = DIMS;
    config.embedding.l2_cache_enabled = false;
    config.embedding.batch_size = 32;

    let store = Arc::new(ContentStore::open(&dir.join("store"), &config.storage).unwrap());
    store.put_many(synthetic_corpus(n)).unwrap();
    let retriever = Retriever::new(&config, Arc::clone(&store), Arc::new(MockEncoder::new(DIMS))).unwrap();
    retriever.build_index(&store, &CancellationToken::new()).unwrap();
    (store, Arc::new(retriever))
}

fn queries() -> Vec<String> {
    ["river stone", "harbor signal", "meadow", "copper archive", "glacier engine violet"]
        .iter()
        .map(|q| q.to_string())
        .collect()
}

#[test]
fn concurrent_queries_match_sequential_results() {
    for variant in [BackendVariant::Dense, BackendVariant::Sparse, BackendVariant::Hybrid] {
        let dir = tempfile::tempdir().unwrap();
        let (_store, retriever) = setup(dir.path(), variant, 200);
        let expected: Vec<_> = queries()
            .iter()
            .map(|q| retriever.retrieve(q, 10, &[]).unwrap())
            .collect();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let retriever = Arc::clone(&retriever);
                thread::spawn(move || {
                    queries()
                        .iter()
                        .map(|q| retriever.retrieve(q, 10, &[]).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for worker in workers {
            assert_eq!(worker.join().unwrap(), expected, "variant {variant}");
        }
    }
}

#[test]
fn batch_queries_match_single_queries() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, retriever) = setup(dir.path(), BackendVariant::Hybrid, 120);
    let filters = [FieldFilter::new("text", FieldPredicate::Contains("passage".to_string()))];
    let batch = retriever.retrieve_batch(&queries(), 7, &filters).unwrap();
    assert_eq!(batch.len(), queries().len());
    for (query, results) in queries().iter().zip(&batch) {
        assert_eq!(results, &retriever.retrieve(query, 7, &filters).unwrap());
    }
}

#[test]
fn queries_keep_working_during_a_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let (store, retriever) = setup(dir.path(), BackendVariant::Dense, 150);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let retriever = Arc::clone(&retriever);
            thread::spawn(move || {
                for _ in 0..50 {
                    for q in queries() {
                        let results = retriever.retrieve(&q, 5, &[]).unwrap();
                        assert_eq!(results.len(), 5);
                    }
                }
            })
        })
        .collect();

    store.put_many(synthetic_corpus(180).split_off(150)).unwrap();
    let report = retriever.build_index(&store, &CancellationToken::new()).unwrap();
    assert_eq!(report.records, 180);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(retriever.generation(), 2);
}

#[test]
fn second_concurrent_build_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (store, retriever) = setup(dir.path(), BackendVariant::Sparse, 50);
    let lock = Path::new(&retriever.config().index.path).with_extension("lock");
    std::fs::write(&lock, b"held").unwrap();

    let err = retriever
        .build_index(&store, &CancellationToken::new())
        .err()
        .unwrap();
    assert!(matches!(err, quarry_core::errors::QuarryError::BuildInProgress { .. }));
    // The live index is untouched.
    assert_eq!(retriever.generation(), 1);
    assert!(!retriever.retrieve("river", 3, &[]).unwrap().is_empty());
}

#[tokio::test]
async fn async_queries_match_blocking_queries() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, retriever) = setup(dir.path(), BackendVariant::Sparse, 100);

    let tasks: Vec<_> = queries()
        .into_iter()
        .map(|q| {
            let retriever = Arc::clone(&retriever);
            tokio::spawn(async move { retriever.retrieve_async(q, 5, Vec::new()).await })
        })
        .collect();

    for (task, query) in tasks.into_iter().zip(queries()) {
        let results = task.await.unwrap().unwrap();
        assert_eq!(results, retriever.retrieve(&query, 5, &[]).unwrap());
    }
}
