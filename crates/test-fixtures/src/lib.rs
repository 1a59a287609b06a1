//! Test fixtures for the Quarry workspace: mock collaborators and JSON
//! corpora shared by every crate's tests.

mod mocks;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use quarry_core::models::{fields, FieldMap};

pub use mocks::{MockEncoder, MockReranker, MockTokenizer};

/// Directory holding the fixture corpora.
fn corpora_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("corpora")
}

/// Load and deserialize a JSON fixture file under `corpora/`.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = corpora_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Absolute path to a fixture file.
pub fn fixture_path(relative_path: &str) -> PathBuf {
    corpora_root().join(relative_path)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDoc {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl CorpusDoc {
    pub fn to_fields(&self) -> FieldMap {
        let mut map = fields([("title", self.title.as_str()), ("text", self.text.as_str())]);
        if let Some(lang) = &self.lang {
            map.insert("lang".to_string(), lang.as_str().into());
        }
        if let Some(topic) = &self.topic {
            map.insert("topic".to_string(), topic.as_str().into());
        }
        map
    }
}

/// Load a corpus file (`corpora/<name>.json`) as field maps.
pub fn load_corpus(name: &str) -> Vec<FieldMap> {
    let docs: Vec<CorpusDoc> = load_fixture(&format!("{name}.json"));
    docs.iter().map(CorpusDoc::to_fields).collect()
}

/// `n` synthetic single-field passages, all distinct.
pub fn synthetic_corpus(n: usize) -> Vec<FieldMap> {
    const WORDS: [&str; 12] = [
        "river", "stone", "lantern", "harbor", "meadow", "copper", "signal", "orchard", "glacier",
        "engine", "violet", "archive",
    ];
    (0..n)
        .map(|i| {
            let text = format!(
                "passage {i} {} {} {}",
                WORDS[i % WORDS.len()],
                WORDS[(i / WORDS.len()) % WORDS.len()],
                WORDS[(i * 7 + 3) % WORDS.len()]
            );
            fields([("text", text)])
        })
        .collect()
}
