//! BM25 inverted index persisted as `postings.json`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use quarry_core::errors::QuarryResult;
use quarry_core::models::RecordId;

use crate::backend::ScoredId;
use crate::topk::TopK;
use crate::{corrupt, io_err};

pub const POSTINGS_FILE: &str = "postings.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PostingsFile {
    k1: f32,
    b: f32,
    doc_ids: Vec<RecordId>,
    doc_lens: Vec<u32>,
    /// term → (document number, term frequency), ascending document number.
    terms: BTreeMap<String, Vec<(u32, u32)>>,
}

pub struct Bm25Builder {
    dir: PathBuf,
    file: PostingsFile,
}

impl Bm25Builder {
    pub fn new(dir: &Path, k1: f32, b: f32) -> Self {
        Self {
            dir: dir.to_path_buf(),
            file: PostingsFile {
                k1,
                b,
                ..PostingsFile::default()
            },
        }
    }

    pub fn add(&mut self, id: RecordId, tokens: &[String]) {
        let doc = self.file.doc_ids.len() as u32;
        let mut tf: BTreeMap<&str, u32> = BTreeMap::new();
        for t in tokens {
            *tf.entry(t.as_str()).or_default() += 1;
        }
        for (term, count) in tf {
            self.file.terms.entry(term.to_string()).or_default().push((doc, count));
        }
        self.file.doc_ids.push(id);
        self.file.doc_lens.push(tokens.len() as u32);
    }

    pub fn len(&self) -> usize {
        self.file.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.doc_ids.is_empty()
    }

    /// Write `postings.json`; returns its name.
    pub fn finish(self) -> QuarryResult<String> {
        let path = self.dir.join(POSTINGS_FILE);
        let json = serde_json::to_vec(&self.file)?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))?;
        Ok(POSTINGS_FILE.to_string())
    }
}

pub struct Bm25Index {
    file: PostingsFile,
    avg_len: f64,
}

impl Bm25Index {
    pub fn load(dir: &Path) -> QuarryResult<Self> {
        let path = dir.join(POSTINGS_FILE);
        let raw = fs::read(&path).map_err(|_| corrupt(&path, "postings file missing"))?;
        let file: PostingsFile = serde_json::from_slice(&raw)
            .map_err(|e| corrupt(&path, format!("unparsable postings: {e}")))?;
        let n = file.doc_ids.len();
        if file.doc_lens.len() != n {
            return Err(corrupt(&path, "document id and length tables differ"));
        }
        if file.terms.values().flatten().any(|&(doc, _)| doc as usize >= n) {
            return Err(corrupt(&path, "posting references an unknown document"));
        }
        let total: u64 = file.doc_lens.iter().map(|&l| l as u64).sum();
        let avg_len = if n == 0 { 0.0 } else { total as f64 / n as f64 };
        Ok(Self { file, avg_len })
    }

    pub fn len(&self) -> usize {
        self.file.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.doc_ids.is_empty()
    }

    /// Score every document; those sharing no query term score 0 and rank
    /// after the matches by ascending id.
    pub fn search(&self, query_tokens: &[String], k: usize) -> Vec<ScoredId> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        let n = self.len() as f64;
        let k1 = self.file.k1 as f64;
        let b = self.file.b as f64;
        let terms: BTreeSet<&str> = query_tokens.iter().map(String::as_str).collect();

        let mut scores = vec![0.0f64; self.len()];
        for term in terms {
            let Some(postings) = self.file.terms.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for &(doc, tf) in postings {
                let tf = tf as f64;
                let len_norm = if self.avg_len > 0.0 {
                    self.file.doc_lens[doc as usize] as f64 / self.avg_len
                } else {
                    1.0
                };
                let s = idf * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * len_norm));
                scores[doc as usize] += s;
            }
        }

        let mut top = TopK::new(k);
        for (id, score) in self.file.doc_ids.iter().zip(scores) {
            top.push(ScoredId { id: *id, score });
        }
        top.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn index(docs: &[(RecordId, &str)]) -> (tempfile::TempDir, Bm25Index) {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = Bm25Builder::new(dir.path(), 1.2, 0.75);
        for (id, text) in docs {
            builder.add(*id, &tokens(text));
        }
        builder.finish().unwrap();
        let index = Bm25Index::load(dir.path()).unwrap();
        (dir, index)
    }

    #[test]
    fn higher_term_frequency_ranks_first() {
        let (_dir, index) = index(&[(1, "cat dog"), (2, "cat cat dog"), (3, "bird")]);
        let hits = index.search(&tokens("cat"), 10);
        let ids: Vec<RecordId> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn rare_terms_weigh_more() {
        let (_dir, index) = index(&[(1, "common rare"), (2, "common"), (3, "common")]);
        let hits = index.search(&tokens("common rare"), 3);
        assert_eq!(hits[0].id, 1);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn unmatched_documents_score_zero() {
        let (_dir, index) = index(&[(2, "alpha"), (1, "beta")]);
        let hits = index.search(&tokens("omega"), 5);
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(hits.iter().all(|h| h.score == 0.0));
        assert_eq!(index.search(&[], 5).len(), 2);
    }

    #[test]
    fn k_beyond_the_corpus_returns_every_document() {
        let (_dir, index) = index(&[(1, "the cat sat"), (2, "the dog ran")]);
        let hits = index.search(&tokens("cat"), 10);
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn repeated_query_terms_count_once() {
        let (_dir, index) = index(&[(1, "cat"), (2, "dog")]);
        let once = index.search(&tokens("cat"), 1);
        let twice = index.search(&tokens("cat cat"), 1);
        assert_eq!(once, twice);
    }
}
