use quarry_core::config::*;

#[test]
fn config_loads_from_empty_toml_with_all_defaults() {
    let config = QuarryConfig::from_toml("").unwrap();

    // Storage defaults
    assert_eq!(config.storage.data_dir, "quarry-store");
    assert!(config.storage.sync_writes);
    assert_eq!(config.storage.read_pool_size, 4);
    assert_eq!(config.storage.scan_page_size, 256);

    // Embedding defaults
    assert_eq!(config.embedding.provider, "hashing");
    assert_eq!(config.embedding.dimensions, 384);
    assert_eq!(config.embedding.batch_size, 64);
    assert_eq!(config.embedding.workers, 4);
    assert_eq!(config.embedding.max_retries, 3);
    assert!(config.embedding.call_timeout_ms.is_none());
    assert!(config.embedding.cache_max_entries.is_none());

    // Index defaults
    assert_eq!(config.index.variant, BackendVariant::Dense);
    assert_eq!(config.index.fields, vec!["text".to_string()]);
    assert_eq!(config.index.dense.metric, DistanceMetric::Cosine);
    assert_eq!(config.index.dense.structure, DenseStructure::Flat);
    assert_eq!(config.index.sparse.k1, 1.2);
    assert_eq!(config.index.sparse.b, 0.75);
    assert_eq!(config.index.hybrid.fusion, FusionRule::Weighted);
    assert_eq!(config.index.hybrid.dense_weight, 0.5);
    assert_eq!(config.index.hybrid.rrf_k, 60);

    // Retrieval defaults
    assert_eq!(config.retrieval.top_k, 10);
    assert_eq!(config.retrieval.pool_size, 50);
    assert!(!config.retrieval.rerank_enabled);
    assert_eq!(config.retrieval.result_cache_size, 0);
    assert!(config.retrieval.query_preprocess.is_empty());

    // Observability defaults
    assert_eq!(config.observability.log_level, "info");
    assert!(!config.observability.json_logs);
}

#[test]
fn config_loads_partial_toml_with_overrides() {
    let toml = r#"
[embedding]
batch_size = 16
call_timeout_ms = 2500

[index]
variant = "hybrid"
fields = ["title", "text"]

[index.dense]
metric = "inner_product"
structure = "ivf"
n_lists = 8
n_probe = 2

[index.hybrid]
fusion = "rrf"
"#;
    let config = QuarryConfig::from_toml(toml).unwrap();
    assert_eq!(config.embedding.batch_size, 16);
    assert_eq!(config.embedding.call_timeout_ms, Some(2500));
    // Non-overridden fields keep defaults
    assert_eq!(config.embedding.workers, 4);
    assert_eq!(config.index.variant, BackendVariant::Hybrid);
    assert_eq!(config.index.fields, vec!["title".to_string(), "text".to_string()]);
    assert_eq!(config.index.dense.metric, DistanceMetric::InnerProduct);
    assert_eq!(config.index.dense.structure, DenseStructure::Ivf);
    assert_eq!(config.index.dense.n_lists, 8);
    assert_eq!(config.index.hybrid.fusion, FusionRule::Rrf);
    assert_eq!(config.index.hybrid.dense_weight, 0.5);
}

#[test]
fn config_serde_roundtrip() {
    let config = QuarryConfig::default();
    let toml_str = toml::to_string(&config).unwrap();
    let roundtripped = QuarryConfig::from_toml(&toml_str).unwrap();
    assert_eq!(roundtripped.storage.data_dir, config.storage.data_dir);
    assert_eq!(roundtripped.embedding.dimensions, config.embedding.dimensions);
    assert_eq!(roundtripped.index.variant, config.index.variant);
}

#[test]
fn config_rejects_zero_batch_size() {
    let err = QuarryConfig::from_toml("[embedding]\nbatch_size = 0\n").unwrap_err();
    assert!(err.to_string().contains("batch_size"));
}

#[test]
fn config_rejects_zero_workers() {
    let err = QuarryConfig::from_toml("[embedding]\nworkers = 0\n").unwrap_err();
    assert!(err.to_string().contains("workers"));
}

#[test]
fn config_rejects_out_of_range_dense_weight() {
    let err = QuarryConfig::from_toml("[index.hybrid]\ndense_weight = 1.5\n").unwrap_err();
    assert!(err.to_string().contains("dense_weight"));
}

#[test]
fn config_rejects_probe_beyond_lists() {
    let toml = r#"
[index.dense]
structure = "ivf"
n_lists = 4
n_probe = 8
"#;
    let err = QuarryConfig::from_toml(toml).unwrap_err();
    assert!(err.to_string().contains("n_probe"));
}

#[test]
fn config_ignores_probe_for_flat_structure() {
    let toml = r#"
[index.dense]
n_lists = 4
n_probe = 8
"#;
    assert!(QuarryConfig::from_toml(toml).is_ok());
}

#[test]
fn config_rejects_unknown_variant() {
    let err = QuarryConfig::from_toml("[index]\nvariant = \"graph\"\n").unwrap_err();
    assert!(matches!(err, quarry_core::QuarryError::ConfigError { .. }));
}

#[test]
fn backend_variant_capabilities() {
    assert!(BackendVariant::Dense.needs_encoder());
    assert!(!BackendVariant::Dense.needs_tokenizer());
    assert!(BackendVariant::Sparse.needs_tokenizer());
    assert!(!BackendVariant::Sparse.needs_encoder());
    assert!(BackendVariant::Hybrid.needs_encoder());
    assert!(BackendVariant::Hybrid.needs_tokenizer());
    assert_eq!(BackendVariant::Hybrid.to_string(), "hybrid");
}
