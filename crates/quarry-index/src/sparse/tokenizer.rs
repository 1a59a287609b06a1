use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use quarry_core::config::SparseIndexConfig;
use quarry_core::models::Fingerprint;
use quarry_core::traits::ITokenizer;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Lowercased Unicode word tokenizer with a length floor and stopword list.
pub struct SimpleTokenizer {
    min_len: usize,
    stopwords: HashSet<String>,
    version: String,
}

impl SimpleTokenizer {
    pub fn new(min_len: usize, stopwords: &[String]) -> Self {
        let mut sorted: Vec<String> = stopwords.iter().map(|w| w.to_lowercase()).collect();
        sorted.sort();
        sorted.dedup();
        // Tokenization settings are part of the identity.
        let settings = format!("{min_len}\u{1f}{}", sorted.join("\u{1f}"));
        let digest = blake3::hash(settings.as_bytes()).to_hex();
        Self {
            min_len,
            stopwords: sorted.into_iter().collect(),
            version: format!("1-{}", &digest[..8]),
        }
    }

    pub fn from_config(config: &SparseIndexConfig) -> Self {
        Self::new(config.min_token_len, &config.stopwords)
    }
}

impl Default for SimpleTokenizer {
    fn default() -> Self {
        Self::new(1, &[])
    }
}

impl ITokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        WORD_RE
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|t| t.chars().count() >= self.min_len && !self.stopwords.contains(t))
            .collect()
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new("simple", self.version.clone(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_non_words() {
        let t = SimpleTokenizer::default();
        assert_eq!(t.tokenize("The Cat, sat!"), vec!["the", "cat", "sat"]);
        assert_eq!(t.tokenize("Die Katze schläft"), vec!["die", "katze", "schläft"]);
    }

    #[test]
    fn drops_short_tokens_and_stopwords() {
        let t = SimpleTokenizer::new(2, &["The".to_string()]);
        assert_eq!(t.tokenize("the cat a mat"), vec!["cat", "mat"]);
    }

    #[test]
    fn settings_change_the_fingerprint() {
        let a = SimpleTokenizer::default().fingerprint();
        let b = SimpleTokenizer::new(2, &[]).fingerprint();
        let c = SimpleTokenizer::new(1, &["the".to_string()]).fingerprint();
        assert_eq!(a, SimpleTokenizer::default().fingerprint());
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
