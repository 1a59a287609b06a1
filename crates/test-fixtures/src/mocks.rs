//! Scriptable collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use quarry_core::errors::{EmbeddingError, QuarryError, QuarryResult};
use quarry_core::models::Fingerprint;
use quarry_core::traits::{IEncoder, IReranker, ITokenizer};

/// What the next scripted encoder call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scripted {
    Fail,
    DropOne,
    WrongDims,
}

/// Deterministic encoder: each text maps to a unit vector derived from its
/// blake3 hash, so identical texts get identical vectors.
pub struct MockEncoder {
    dims: usize,
    version: String,
    delay: Option<Duration>,
    script: Mutex<VecDeque<Scripted>>,
    fail_always: bool,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl MockEncoder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            version: "1".to_string(),
            delay: None,
            script: Mutex::new(VecDeque::new()),
            fail_always: false,
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call fails with a transient error.
    pub fn failing() -> Self {
        Self {
            fail_always: true,
            ..Self::new(8)
        }
    }

    /// The next `n` calls fail with a transient error.
    pub fn fail_next(self, n: usize) -> Self {
        self.push(Scripted::Fail, n);
        self
    }

    /// The next `n` calls return one vector fewer than requested.
    pub fn drop_one_next(self, n: usize) -> Self {
        self.push(Scripted::DropOne, n);
        self
    }

    /// The next `n` calls return vectors one element too long.
    pub fn wrong_dims_next(self, n: usize) -> Self {
        self.push(Scripted::WrongDims, n);
        self
    }

    fn push(&self, step: Scripted, n: usize) {
        let mut script = self.script.lock().unwrap();
        script.extend(std::iter::repeat(step).take(n));
    }

    /// Total `encode_batch` invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total texts received across successful and failed calls.
    pub fn texts_seen(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    /// The vector this encoder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; self.dims * 4];
        reader.fill(&mut bytes);
        let mut v: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| {
                let n = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                (n as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl IEncoder for MockEncoder {
    fn encode_batch(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_always {
            return Err(EmbeddingError::ProviderUnavailable {
                provider: "mock".to_string(),
            }
            .into());
        }

        let step = self.script.lock().unwrap().pop_front();
        let mut out: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        match step {
            Some(Scripted::Fail) => {
                return Err(EmbeddingError::InferenceFailed {
                    reason: "scripted failure".to_string(),
                }
                .into())
            }
            Some(Scripted::DropOne) => {
                out.pop();
            }
            Some(Scripted::WrongDims) => out.iter_mut().for_each(|v| v.push(0.0)),
            None => {}
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new("mock", self.version.clone(), self.dims)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Whitespace tokenizer over lowercase alphanumeric words.
#[derive(Default)]
pub struct MockTokenizer;

impl ITokenizer for MockTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new("mock-tokenizer", "1", 0)
    }
}

enum RerankMode {
    Keyword(String),
    Failing,
    Short,
}

/// Reranker with a fixed behavior.
pub struct MockReranker {
    mode: RerankMode,
    calls: AtomicUsize,
}

impl MockReranker {
    /// Scores 1.0 for documents containing `word`, 0.0 otherwise.
    pub fn keyword(word: &str) -> Self {
        Self::with_mode(RerankMode::Keyword(word.to_lowercase()))
    }

    /// Every call errors.
    pub fn failing() -> Self {
        Self::with_mode(RerankMode::Failing)
    }

    /// Returns one score fewer than documents.
    pub fn short() -> Self {
        Self::with_mode(RerankMode::Short)
    }

    fn with_mode(mode: RerankMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IReranker for MockReranker {
    fn score(&self, _query: &str, documents: &[String]) -> QuarryResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            RerankMode::Keyword(word) => Ok(documents
                .iter()
                .map(|d| if d.to_lowercase().contains(word) { 1.0 } else { 0.0 })
                .collect()),
            RerankMode::Failing => Err(QuarryError::Embedding(EmbeddingError::ProviderUnavailable {
                provider: "mock-reranker".to_string(),
            })),
            RerankMode::Short => Ok(vec![0.5; documents.len().saturating_sub(1)]),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
