//! Bounded-parallel batch encoding.
//!
//! The record stream is cut into batches of `embedding.batch_size`. Up to
//! `embedding.workers` batches are encoded concurrently on a dedicated rayon
//! pool; results are handed to the sink in submission order. Per batch, only
//! cache misses reach the encoder.

pub mod progress;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::{EmbeddingError, QuarryError, QuarryResult};
use quarry_core::models::{Fingerprint, Record, RecordId};
use quarry_core::traits::IEncoder;
use quarry_core::CancellationToken;

use crate::cache::{CacheKey, EncodeCache};
use crate::field_label;
use progress::EncodeProgress;
use retry::{call_with_timeout, with_retry, RetryPolicy};

/// One encoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub id: RecordId,
    /// Encoder input: the indexed fields joined by newlines.
    pub text: String,
    pub vector: Vec<f32>,
}

/// One batch of encoded records, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    /// Position of the first record in the stream.
    pub offset: usize,
    pub entries: Vec<EncodedRecord>,
}

/// Totals for a `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeReport {
    pub records: usize,
    pub batches: usize,
    pub cache_hits: usize,
    /// Records whose vectors came from the encoder.
    pub encoded: usize,
    /// Encoder invocations, retries included.
    pub encoder_calls: usize,
}

impl EncodeReport {
    fn absorb(&mut self, other: &EncodeReport) {
        self.records += other.records;
        self.batches += other.batches;
        self.cache_hits += other.cache_hits;
        self.encoded += other.encoded;
        self.encoder_calls += other.encoder_calls;
    }
}

struct PendingBatch {
    offset: usize,
    records: Vec<Record>,
}

pub struct BatchEncoder {
    encoder: Arc<dyn IEncoder>,
    cache: Arc<EncodeCache>,
    fields: Vec<String>,
    label: String,
    batch_size: usize,
    workers: usize,
    retry: RetryPolicy,
    call_timeout: Option<Duration>,
    log_interval: usize,
    pool: ThreadPool,
}

impl BatchEncoder {
    pub fn new(
        encoder: Arc<dyn IEncoder>,
        cache: Arc<EncodeCache>,
        config: &EmbeddingConfig,
        fields: Vec<String>,
    ) -> QuarryResult<Self> {
        if config.batch_size == 0 || config.workers == 0 {
            return Err(QuarryError::ConfigError {
                reason: "batch_size and workers must be positive".to_string(),
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("quarry-encode-{i}"))
            .build()
            .map_err(|e| QuarryError::ConfigError {
                reason: format!("failed to build encode pool: {e}"),
            })?;
        Ok(Self {
            label: field_label(&fields),
            encoder,
            cache,
            fields,
            batch_size: config.batch_size,
            workers: config.workers,
            retry: RetryPolicy::from_config(config),
            call_timeout: config.call_timeout_ms.map(Duration::from_millis),
            log_interval: config.log_interval,
            pool,
        })
    }

    /// Cache field label entries are stored under.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.encoder.fingerprint()
    }

    /// Encode every record in `records`, passing each batch to `sink` in
    /// stream order.
    ///
    /// Cancellation is observed between batches. A batch whose encoder calls
    /// keep failing ends the run with `BuildFailed`; cache entries written by
    /// earlier batches remain valid.
    pub fn run<I, S>(&self, records: I, mut sink: S, cancel: &CancellationToken) -> QuarryResult<EncodeReport>
    where
        I: IntoIterator<Item = QuarryResult<Record>>,
        S: FnMut(EncodedBatch) -> QuarryResult<()>,
    {
        let mut stream = records.into_iter();
        let mut report = EncodeReport::default();
        let mut progress = EncodeProgress::new(self.log_interval);
        let mut offset = 0usize;

        info!(
            encoder = self.encoder.name(),
            fingerprint = %self.encoder.fingerprint(),
            batch_size = self.batch_size,
            workers = self.workers,
            "batch encode started"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(QuarryError::Cancelled { batch_offset: offset });
            }

            let mut window = Vec::with_capacity(self.workers);
            while window.len() < self.workers {
                let records = stream
                    .by_ref()
                    .take(self.batch_size)
                    .collect::<QuarryResult<Vec<_>>>()?;
                if records.is_empty() {
                    break;
                }
                let len = records.len();
                window.push(PendingBatch { offset, records });
                offset += len;
                if len < self.batch_size {
                    break;
                }
            }
            if window.is_empty() {
                break;
            }

            let results: Vec<QuarryResult<(EncodedBatch, EncodeReport)>> = self
                .pool
                .install(|| window.into_par_iter().map(|b| self.encode_one(b)).collect());

            for result in results {
                let (batch, stats) = result?;
                if cancel.is_cancelled() {
                    return Err(QuarryError::Cancelled {
                        batch_offset: batch.offset,
                    });
                }
                report.absorb(&stats);
                progress.advance(stats.records);
                sink(batch)?;
            }
        }

        info!(
            records = report.records,
            batches = report.batches,
            cache_hits = report.cache_hits,
            encoded = report.encoded,
            encoder_calls = report.encoder_calls,
            "batch encode finished"
        );
        Ok(report)
    }

    fn encode_one(&self, batch: PendingBatch) -> QuarryResult<(EncodedBatch, EncodeReport)> {
        let PendingBatch { offset, records } = batch;
        let fingerprint = self.encoder.fingerprint();
        let texts: Vec<String> = records.iter().map(|r| r.joined_text(&self.fields)).collect();
        let keys: Vec<CacheKey> = texts
            .iter()
            .map(|text| CacheKey::new(text, self.label.as_str(), &fingerprint))
            .collect();

        let mut vectors = self.cache.get_many(&keys);
        let misses: Vec<usize> = (0..vectors.len()).filter(|&i| vectors[i].is_none()).collect();
        let mut stats = EncodeReport {
            records: records.len(),
            batches: 1,
            cache_hits: records.len() - misses.len(),
            ..EncodeReport::default()
        };

        if !misses.is_empty() {
            let inputs: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let (fresh, attempts) = with_retry(&self.retry, |attempt| {
                debug!(batch_offset = offset, attempt, inputs = inputs.len(), "encoder call");
                self.call_encoder(offset, &inputs)
            })
            .map_err(|exhausted| QuarryError::BuildFailed {
                batch_offset: offset,
                record_ids: records.iter().map(|r| r.id).collect(),
                attempts: exhausted.attempts,
                reason: exhausted.last_error.to_string(),
            })?;
            stats.encoder_calls = attempts as usize;
            stats.encoded = fresh.len();

            let entries: Vec<(CacheKey, Vec<f32>)> = misses
                .iter()
                .map(|&i| keys[i].clone())
                .zip(fresh)
                .collect();
            if let Err(e) = self.cache.put_many(&entries) {
                warn!(batch_offset = offset, error = %e, "failed to persist encoded vectors");
            }
            for (&i, (_, vector)) in misses.iter().zip(entries) {
                vectors[i] = Some(vector);
            }
        }

        let entries = records
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .map(|((record, text), vector)| {
                let vector = vector.ok_or_else(|| QuarryError::EncodeFailed {
                    batch_offset: offset,
                    reason: format!("no vector for record {}", record.id),
                })?;
                Ok(EncodedRecord {
                    id: record.id,
                    text,
                    vector,
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;

        Ok((EncodedBatch { offset, entries }, stats))
    }

    /// One encoder invocation, bounded by the call timeout and validated for
    /// count and dimensions. Every failure is a retryable `EncodeFailed`.
    fn call_encoder(&self, offset: usize, inputs: &[String]) -> QuarryResult<Vec<Vec<f32>>> {
        let result = match self.call_timeout {
            Some(timeout) => {
                let encoder = Arc::clone(&self.encoder);
                let owned = inputs.to_vec();
                call_with_timeout(timeout, move || encoder.encode_batch(&owned))
            }
            None => self.encoder.encode_batch(inputs),
        };
        let encode_failed = |reason: String| QuarryError::EncodeFailed {
            batch_offset: offset,
            reason,
        };

        let vectors = result.map_err(|e| encode_failed(e.to_string()))?;
        if vectors.len() != inputs.len() {
            return Err(encode_failed(
                EmbeddingError::PartialBatch {
                    requested: inputs.len(),
                    returned: vectors.len(),
                }
                .to_string(),
            ));
        }
        let expected = self.encoder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(encode_failed(
                EmbeddingError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                }
                .to_string(),
            ));
        }
        Ok(vectors)
    }
}
