//! Retriever: the query entry point.
//!
//! Query path: preprocess → encode (dense, hybrid) and/or tokenize (sparse, hybrid) →
//! `IndexHandle::search` over a candidate pool → load records → filter →
//! optional rerank → truncate to `top_k` → project display fields.
//!
//! The live index sits in an [`IndexSlot`]. Builds and loads swap a new
//! handle in; queries already running keep the handle they started with.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::{debug, info};

use quarry_core::config::{BackendVariant, QuarryConfig};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::{DegradationEvent, FieldFilter, RecordId, RetrievedContext};
use quarry_core::traits::{IEncoder, IQueryProcessor, IReranker, ITokenizer};
use quarry_core::CancellationToken;
use quarry_embeddings::{create_encoder, EncodeCache, QueryEncoder};
use quarry_index::{
    create_backend, load_index, BuildContext, IndexBackend, IndexHandle, IndexSlot, SearchQuery,
    SimpleTokenizer,
};
use quarry_store::ContentStore;

use crate::filter;
use crate::pipeline::{IndexPipeline, PipelineReport};
use crate::preprocess::QueryPipeline;
use crate::query_cache::{QueryVectorCache, ResultCache, ResultKey};
use crate::rerank::{create_reranker, rerank};

pub struct Retriever {
    config: QuarryConfig,
    store: Arc<ContentStore>,
    backend: Arc<dyn IndexBackend>,
    encoder: Arc<dyn IEncoder>,
    query_encoder: QueryEncoder,
    tokenizer: Arc<dyn ITokenizer>,
    reranker: Option<Arc<dyn IReranker>>,
    preprocess: QueryPipeline,
    encode_cache: Arc<EncodeCache>,
    query_vectors: QueryVectorCache,
    results: Option<ResultCache>,
    slot: IndexSlot,
    events: Mutex<Vec<DegradationEvent>>,
}

impl Retriever {
    /// Retriever over `store` with the given encoder. The tokenizer is the
    /// configured [`SimpleTokenizer`], no reranker is installed, and the
    /// encode cache is opened from `embedding` settings.
    pub fn new(config: &QuarryConfig, store: Arc<ContentStore>, encoder: Arc<dyn IEncoder>) -> QuarryResult<Self> {
        config.validate()?;
        let preprocess = QueryPipeline::from_names(&config.retrieval.query_preprocess)?;
        let encode_cache = Arc::new(EncodeCache::open(&config.embedding)?);
        info!(
            variant = %config.index.variant,
            encoder = encoder.name(),
            fingerprint = %encoder.fingerprint(),
            index_path = %config.index.path,
            "retriever initialized"
        );
        Ok(Self {
            backend: create_backend(&config.index),
            tokenizer: Arc::new(SimpleTokenizer::from_config(&config.index.sparse)),
            reranker: None,
            preprocess,
            encode_cache,
            query_encoder: QueryEncoder::new(Arc::clone(&encoder), &config.embedding),
            query_vectors: QueryVectorCache::new(config.embedding.query_cache_size),
            results: ResultCache::new(config.retrieval.result_cache_size),
            slot: IndexSlot::new(),
            events: Mutex::new(Vec::new()),
            config: config.clone(),
            store,
            encoder,
        })
    }

    /// Retriever with the configured encoder and, when
    /// `retrieval.rerank_enabled` is set, the configured HTTP reranker.
    pub fn from_config(config: &QuarryConfig, store: Arc<ContentStore>) -> QuarryResult<Self> {
        let encoder = create_encoder(&config.embedding)?;
        let reranker = create_reranker(&config.retrieval)?;
        let retriever = Self::new(config, store, encoder)?;
        Ok(match reranker {
            Some(r) => retriever.with_reranker(r),
            None => retriever,
        })
    }

    /// Replace the tokenizer. Must happen before building or loading.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn ITokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Install a reranker; it runs over the candidate pool of every query.
    pub fn with_reranker(mut self, reranker: Arc<dyn IReranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Append a query rewriting step after the configured ones.
    pub fn with_query_processor(mut self, step: Arc<dyn IQueryProcessor>) -> Self {
        self.preprocess.push(step);
        self
    }

    /// Share an encode cache with other components.
    pub fn with_encode_cache(mut self, cache: Arc<EncodeCache>) -> Self {
        self.encode_cache = cache;
        self
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    pub fn variant(&self) -> BackendVariant {
        self.backend.variant()
    }

    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.config.index.path)
    }

    pub fn is_ready(&self) -> bool {
        self.slot.is_ready()
    }

    /// Generation of the live index; bumps on every build or load.
    pub fn generation(&self) -> u64 {
        self.slot.generation()
    }

    pub fn encode_cache(&self) -> &Arc<EncodeCache> {
        &self.encode_cache
    }

    fn context(&self) -> BuildContext {
        BuildContext::new(self.config.index.fields.clone())
            .with_encoder(self.encoder.fingerprint())
            .with_tokenizer(Arc::clone(&self.tokenizer))
            .with_checksums(self.config.index.verify_checksums)
    }

    /// Build an index over `store` at the configured path and swap it in.
    ///
    /// Queries keep being served by the previous index, if any, until the
    /// new one is committed. On failure or cancellation nothing changes.
    pub fn build_index(&self, store: &ContentStore, cancel: &CancellationToken) -> QuarryResult<PipelineReport> {
        let pipeline = IndexPipeline::new(
            &self.config,
            Arc::clone(&self.backend),
            self.context(),
            Arc::clone(&self.encoder),
            Arc::clone(&self.encode_cache),
        )?;
        let (handle, report) = pipeline.run(store, &self.index_path(), cancel)?;
        let generation = self.slot.swap(handle)?;
        info!(generation, records = report.records, "built index installed");
        Ok(report)
    }

    /// Load the persisted index at the configured path and swap it in.
    pub fn load_index(&self) -> QuarryResult<()> {
        let handle = load_index(self.backend.as_ref(), &self.index_path(), &self.context())?;
        self.install(handle)
    }

    /// Swap in an already opened handle.
    pub fn install(&self, handle: Arc<dyn IndexHandle>) -> QuarryResult<()> {
        if handle.manifest().variant != self.backend.variant() {
            return Err(QuarryError::InvalidArgument {
                reason: format!(
                    "handle variant {} does not match configured {}",
                    handle.manifest().variant,
                    self.backend.variant()
                ),
            });
        }
        self.slot.swap(handle)?;
        Ok(())
    }

    /// Top `top_k` contexts for `query` among records passing `filters`.
    ///
    /// Fails with `IndexNotReady` until an index was built or loaded.
    pub fn retrieve(&self, query: &str, top_k: usize, filters: &[FieldFilter]) -> QuarryResult<Vec<RetrievedContext>> {
        let (handle, generation) = self.slot.snapshot()?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let rewritten = self.preprocess.apply(query);
        let query = rewritten.as_str();

        let key = self.results.as_ref().map(|_| ResultKey {
            query: query.to_string(),
            top_k,
            filters: filters.to_vec(),
            generation,
        });
        if let (Some(cache), Some(key)) = (&self.results, &key) {
            if let Some(hit) = cache.get(key) {
                debug!(generation, top_k, "result cache hit");
                return Ok(hit.as_ref().clone());
            }
        }

        let (contexts, degraded) = self.run_query(handle.as_ref(), query, top_k, filters)?;
        // Degraded answers are never cached.
        if let (Some(cache), Some(key), false) = (&self.results, key, degraded) {
            cache.insert(key, Arc::new(contexts.clone()));
        }
        Ok(contexts)
    }

    /// `retrieve` for each query, in order. Queries run in parallel.
    pub fn retrieve_batch(
        &self,
        queries: &[String],
        top_k: usize,
        filters: &[FieldFilter],
    ) -> QuarryResult<Vec<Vec<RetrievedContext>>> {
        queries
            .par_iter()
            .map(|q| self.retrieve(q, top_k, filters))
            .collect()
    }

    /// `retrieve` on tokio's blocking pool.
    pub async fn retrieve_async(
        self: &Arc<Self>,
        query: String,
        top_k: usize,
        filters: Vec<FieldFilter>,
    ) -> QuarryResult<Vec<RetrievedContext>> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.retrieve(&query, top_k, &filters))
            .await
            .map_err(|e| QuarryError::Io(std::io::Error::other(format!("query task failed: {e}"))))?
    }

    /// Remove cached embeddings written under other encoder fingerprints.
    pub fn purge_stale_embeddings(&self) -> QuarryResult<usize> {
        self.encode_cache.purge_stale(&self.encoder.fingerprint())
    }

    /// Degradation events recorded since the last drain.
    pub fn drain_degradation_events(&self) -> Vec<DegradationEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    fn record_event(&self, event: DegradationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn search_query(&self, query: &str) -> QuarryResult<SearchQuery> {
        let variant = self.backend.variant();
        let vector = if variant.needs_encoder() {
            Some(self.query_vector(query)?)
        } else {
            None
        };
        let text = variant.needs_tokenizer().then(|| query.to_string());
        Ok(SearchQuery { text, vector })
    }

    fn query_vector(&self, query: &str) -> QuarryResult<Vec<f32>> {
        let vector = self
            .query_vectors
            .get_or_encode(query, |q| self.query_encoder.encode(q))?;
        Ok(vector.as_ref().clone())
    }

    /// Returns the contexts and whether reranking degraded.
    fn run_query(
        &self,
        handle: &dyn IndexHandle,
        query: &str,
        top_k: usize,
        filters: &[FieldFilter],
    ) -> QuarryResult<(Vec<RetrievedContext>, bool)> {
        let pool = filter::pool_size(&self.config.retrieval, top_k, !filters.is_empty());
        let search = self.search_query(query)?;
        let hits = handle.search(&search, pool)?;

        let ids: Vec<RecordId> = hits.iter().map(|h| h.id).collect();
        let records = self.store.get_many(&ids)?;
        let source = handle.manifest().variant.as_str();
        let indexed = &self.config.index.fields;

        let mut contexts: Vec<RetrievedContext> = hits
            .iter()
            .zip(records)
            .filter(|(_, record)| filter::matches_all(record, filters))
            .map(|(hit, record)| RetrievedContext {
                record_id: hit.id,
                score: hit.score,
                matched_fields: indexed
                    .iter()
                    .filter(|f| record.fields.contains_key(f.as_str()))
                    .cloned()
                    .collect(),
                fields: record.fields,
                source: source.to_string(),
            })
            .collect();
        let candidates = contexts.len();

        let mut degraded = false;
        if let Some(reranker) = &self.reranker {
            let outcome = rerank(query, contexts, reranker.as_ref());
            if let Some(event) = outcome.event {
                self.record_event(event);
                degraded = true;
            }
            contexts = outcome.contexts;
        }
        contexts.truncate(top_k);

        let display = &self.config.retrieval.display_fields;
        if !display.is_empty() {
            for ctx in &mut contexts {
                ctx.fields = filter::project(&ctx.fields, display);
            }
        }

        debug!(
            hits = hits.len(),
            pool,
            candidates,
            returned = contexts.len(),
            filters = filters.len(),
            "query answered"
        );
        Ok((contexts, degraded))
    }
}
