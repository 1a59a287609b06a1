//! Index pipeline: store scan, batch encoding (dense and hybrid), and a
//! build session that publishes the index atomically.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use quarry_core::config::QuarryConfig;
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::Record;
use quarry_core::traits::IEncoder;
use quarry_core::CancellationToken;
use quarry_embeddings::{BatchEncoder, EncodeCache, EncodeReport};
use quarry_index::{BuildContext, BuildSession, IndexBackend, IndexHandle, IndexItem};
use quarry_store::ContentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Records written into the new index.
    pub records: u64,
    /// Encoder totals; `None` for sparse builds.
    pub encode: Option<EncodeReport>,
}

pub struct IndexPipeline {
    backend: Arc<dyn IndexBackend>,
    ctx: BuildContext,
    encoder: Option<BatchEncoder>,
    batch_size: usize,
}

impl IndexPipeline {
    /// The batch encoder is only set up for variants that store vectors.
    pub fn new(
        config: &QuarryConfig,
        backend: Arc<dyn IndexBackend>,
        ctx: BuildContext,
        encoder: Arc<dyn IEncoder>,
        cache: Arc<EncodeCache>,
    ) -> QuarryResult<Self> {
        let encoder = if backend.variant().needs_encoder() {
            Some(BatchEncoder::new(
                encoder,
                cache,
                &config.embedding,
                ctx.fields.clone(),
            )?)
        } else {
            None
        };
        Ok(Self {
            backend,
            ctx,
            encoder,
            batch_size: config.embedding.batch_size.max(1),
        })
    }

    /// Build an index over every record in `store` and publish it at `target`.
    ///
    /// Nothing is published unless every batch succeeds; cancellation and
    /// failures leave any previous index at `target` in place.
    pub fn run(
        &self,
        store: &ContentStore,
        target: &Path,
        cancel: &CancellationToken,
    ) -> QuarryResult<(Arc<dyn IndexHandle>, PipelineReport)> {
        let started = Instant::now();
        let variant = self.backend.variant();
        info!(variant = %variant, target = %target.display(), "index build started");

        let mut session = BuildSession::begin(Arc::clone(&self.backend), target, self.ctx.clone())?;
        let encode = match &self.encoder {
            Some(batch) => {
                let keep_text = variant.needs_tokenizer();
                let report = batch.run(
                    store.scan(),
                    |encoded| {
                        let items: Vec<IndexItem> = encoded
                            .entries
                            .into_iter()
                            .map(|e| IndexItem {
                                id: e.id,
                                vector: Some(e.vector),
                                text: keep_text.then_some(e.text),
                            })
                            .collect();
                        session.add_batch(&items)
                    },
                    cancel,
                )?;
                Some(report)
            }
            None => {
                self.add_texts(store, &mut session, cancel)?;
                None
            }
        };

        let records = session.record_count();
        let handle = session.commit()?;
        info!(
            variant = %variant,
            records,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index build finished"
        );
        Ok((handle, PipelineReport { records, encode }))
    }

    fn add_texts(
        &self,
        store: &ContentStore,
        session: &mut BuildSession,
        cancel: &CancellationToken,
    ) -> QuarryResult<()> {
        let mut scan = store.scan();
        let mut offset = 0usize;
        loop {
            if cancel.is_cancelled() {
                return Err(QuarryError::Cancelled { batch_offset: offset });
            }
            let records = scan
                .by_ref()
                .take(self.batch_size)
                .collect::<QuarryResult<Vec<Record>>>()?;
            if records.is_empty() {
                return Ok(());
            }
            let items: Vec<IndexItem> = records
                .iter()
                .map(|r| IndexItem {
                    id: r.id,
                    vector: None,
                    text: Some(r.joined_text(&self.ctx.fields)),
                })
                .collect();
            session.add_batch(&items)?;
            debug!(batch_offset = offset, records = items.len(), "text batch indexed");
            offset += records.len();
            if records.len() < self.batch_size {
                return Ok(());
            }
        }
    }
}
