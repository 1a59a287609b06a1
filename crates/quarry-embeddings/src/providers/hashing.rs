//! Term-hashing encoder.
//!
//! Hashes lowercase terms into fixed-dimension buckets weighted by term
//! frequency, then L2-normalizes. Deterministic and offline; texts sharing
//! terms land close together.

use std::collections::HashMap;

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::QuarryResult;
use quarry_core::models::Fingerprint;
use quarry_core::traits::IEncoder;

pub struct HashingEncoder {
    dimensions: usize,
    fingerprint: Fingerprint,
}

impl HashingEncoder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fingerprint: Fingerprint::new("hashing-tf", "1", dimensions),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            dimensions: config.dimensions,
            fingerprint: Fingerprint::new(&config.model, &config.model_version, config.dimensions),
        }
    }

    /// FNV-1a bucket for a term.
    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }

    fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut tf: HashMap<String, f32> = HashMap::new();
        for term in Self::terms(text) {
            *tf.entry(term).or_default() += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        if tf.is_empty() || self.dimensions == 0 {
            return vec;
        }
        for (term, count) in &tf {
            // Longer terms carry more signal than short function words.
            let weight = 1.0 + (term.chars().count() as f32).ln();
            vec[Self::bucket(term, self.dimensions)] += count * weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl IEncoder for HashingEncoder {
    fn encode_batch(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
