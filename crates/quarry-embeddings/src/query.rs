//! Query-time encoding of a single text.
//!
//! Uses the same retry and call-timeout budget as batch encoding. Once the
//! budget is spent the last encoder error is returned unchanged.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::{EmbeddingError, QuarryError, QuarryResult};
use quarry_core::traits::IEncoder;

use crate::batch::retry::{call_with_timeout, with_retry, RetryPolicy};

pub struct QueryEncoder {
    encoder: Arc<dyn IEncoder>,
    retry: RetryPolicy,
    call_timeout: Option<Duration>,
}

impl QueryEncoder {
    pub fn new(encoder: Arc<dyn IEncoder>, config: &EmbeddingConfig) -> Self {
        Self {
            encoder,
            retry: RetryPolicy::from_config(config),
            call_timeout: config.call_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn encode(&self, text: &str) -> QuarryResult<Vec<f32>> {
        let (vector, attempts) = with_retry(&self.retry, |attempt| {
            debug!(attempt, "query encoder call");
            self.call(text)
        })
        .map_err(|exhausted| exhausted.last_error)?;
        if attempts > 1 {
            debug!(attempts, "query encoded after retries");
        }
        Ok(vector)
    }

    fn call(&self, text: &str) -> QuarryResult<Vec<f32>> {
        let input = vec![text.to_string()];
        let mut out = match self.call_timeout {
            Some(timeout) => {
                let encoder = Arc::clone(&self.encoder);
                call_with_timeout(timeout, move || encoder.encode_batch(&input))?
            }
            None => self.encoder.encode_batch(&input)?,
        };
        if out.len() != 1 {
            return Err(EmbeddingError::PartialBatch {
                requested: 1,
                returned: out.len(),
            }
            .into());
        }
        let vector = out.swap_remove(0);
        let expected = self.encoder.dimensions();
        if vector.len() != expected {
            return Err(QuarryError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}
