//! Human-readable identifier generation: a fixed 7776-word list, uniform
//! random selection, and collision checking against a live index.

#![deny(unsafe_code)]

use rand::seq::SliceRandom;
use std::path::Path;
use thiserror::Error;

/// Exact cardinality the wordlist must have.
pub const REQUIRED_WORD_COUNT: usize = 7776;

/// Number of words joined to form an identifier.
pub const DEFAULT_WORD_COUNT: usize = 3;

/// Errors loading or using the wordlist.
#[derive(Debug, Error)]
pub enum WordlistError {
    /// The file could not be read.
    #[error("failed to read wordlist at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    /// A non-empty, non-comment line did not have exactly two whitespace-separated fields.
    #[error("malformed wordlist line {line_num}: {line:?}")]
    MalformedLine { line_num: usize, line: String },
    /// The file did not contain exactly [`REQUIRED_WORD_COUNT`] words.
    #[error("wordlist must have exactly {expected} words, found {actual}")]
    WrongSize { expected: usize, actual: usize },
}

/// Checked out-of-band: after [`REQUIRED_WORD_COUNT`] attempts, no unique
/// identifier could be found. Expected probability of this is astronomically
/// small (~1 in 10^30); callers should log it at critical severity.
#[derive(Debug, Error)]
#[error("failed to generate a unique identifier after {attempts} attempts")]
pub struct ExhaustedAttempts {
    pub attempts: usize,
}

/// An error encountered while probing the index for collisions.
pub trait ExistenceCheckError: std::error::Error + Send + Sync + 'static {}
impl<T: std::error::Error + Send + Sync + 'static> ExistenceCheckError for T {}

/// Abstraction over "does this key already exist", implemented by the index
/// crate. Kept generic (not a trait object) so this crate never depends on
/// the concurrency runtime or the KV client.
pub trait KeyExistenceCheck {
    /// Error type surfaced by the backing store.
    type Error: ExistenceCheckError;

    /// Probe whether `key` is already occupied.
    fn exists(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>> + Send;
}

/// The fixed wordlist plus the operations defined over it.
#[derive(Debug, Clone)]
pub struct Wordlist {
    words: Vec<String>,
}

impl Wordlist {
    /// Load a wordlist from `path`. Each non-empty, non-`#`-prefixed line
    /// must have the shape `<digits> <word>`; the second field is kept.
    /// Fails fast unless the result has exactly [`REQUIRED_WORD_COUNT`] words.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WordlistError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| WordlistError::Io { path: path.display().to_string(), source })?;

        let mut words = Vec::new();
        for (idx, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(_digits), Some(word), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(WordlistError::MalformedLine {
                    line_num: idx + 1,
                    line: raw_line.to_string(),
                });
            };
            words.push(word.to_string());
        }

        if words.len() != REQUIRED_WORD_COUNT {
            return Err(WordlistError::WrongSize {
                expected: REQUIRED_WORD_COUNT,
                actual: words.len(),
            });
        }

        tracing::info!(word_count = words.len(), "diceware_wordlist_loaded");
        Ok(Self { words })
    }

    /// Build directly from an in-memory list, for tests and fixtures.
    pub fn from_words(words: Vec<String>) -> Result<Self, WordlistError> {
        if words.len() != REQUIRED_WORD_COUNT {
            return Err(WordlistError::WrongSize {
                expected: REQUIRED_WORD_COUNT,
                actual: words.len(),
            });
        }
        Ok(Self { words })
    }

    /// Number of words loaded (always [`REQUIRED_WORD_COUNT`] for a constructed instance).
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Never empty once constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Draw `word_count` words uniformly at random (with replacement across
    /// draws, but each word is drawn independently) and join with `-`.
    #[must_use]
    pub fn draw(&self, word_count: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..word_count)
            .map(|_| self.words.choose(&mut rng).expect("wordlist is never empty").as_str())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// True iff `id` splits on `-` into exactly three tokens, each a member
    /// of the wordlist.
    #[must_use]
    pub fn validate_format(&self, id: &str) -> bool {
        let tokens: Vec<&str> = id.split('-').collect();
        tokens.len() == DEFAULT_WORD_COUNT
            && tokens.iter().all(|t| !t.is_empty() && self.words.iter().any(|w| w == t))
    }

    /// Generate an identifier guaranteed absent from `index` at the moment of
    /// the check, retrying on collision up to `max_attempts` times.
    pub async fn generate_unique<C: KeyExistenceCheck>(
        &self,
        index: &C,
        word_count: usize,
        max_attempts: usize,
    ) -> Result<String, ExhaustedAttempts> {
        for attempt in 1..=max_attempts {
            let candidate = self.draw(word_count);
            match index.exists(&candidate).await {
                Ok(false) => {
                    tracing::info!(key = %candidate, "unique_key_generated");
                    return Ok(candidate);
                }
                Ok(true) => {
                    tracing::warn!(key = %candidate, attempt, "diceware_collision_detected");
                }
                Err(err) => {
                    tracing::warn!(key = %candidate, attempt, error = %err, "diceware_existence_check_failed");
                }
            }
        }
        tracing::error!(max_attempts, "failed_to_generate_unique_key");
        Err(ExhaustedAttempts { attempts: max_attempts })
    }

    /// Diagnostic stats surfaced by the health reporter.
    #[must_use]
    pub fn stats(&self) -> WordlistStats {
        let size = self.words.len() as u128;
        let combinations = size.pow(3);
        #[allow(clippy::cast_precision_loss)]
        let entropy_bits = (combinations as f64).log2();
        WordlistStats { wordlist_size: self.words.len(), combinations_3words: combinations, entropy_bits }
    }
}

/// Diagnostic statistics about the loaded wordlist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordlistStats {
    pub wordlist_size: usize,
    pub combinations_3words: u128,
    pub entropy_bits: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn fixture_wordlist() -> Wordlist {
        let words = (0..REQUIRED_WORD_COUNT).map(|i| format!("word{i:04}")).collect();
        Wordlist::from_words(words).unwrap()
    }

    struct EmptyIndex;
    impl KeyExistenceCheck for EmptyIndex {
        type Error = Infallible;
        async fn exists(&self, _key: &str) -> Result<bool, Infallible> {
            Ok(false)
        }
    }

    struct AlwaysOccupied;
    impl KeyExistenceCheck for AlwaysOccupied {
        type Error = Infallible;
        async fn exists(&self, _key: &str) -> Result<bool, Infallible> {
            Ok(true)
        }
    }

    #[test]
    fn wrong_size_is_rejected() {
        let words = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(Wordlist::from_words(words), Err(WordlistError::WrongSize { .. })));
    }

    #[test]
    fn draw_produces_three_valid_words() {
        let list = fixture_wordlist();
        let id = list.draw(3);
        assert!(list.validate_format(&id));
    }

    #[test]
    fn validate_format_rejects_wrong_arity() {
        let list = fixture_wordlist();
        assert!(!list.validate_format("word0001-word0002"));
        assert!(!list.validate_format("word0001-word0002-word0003-word0004"));
    }

    #[test]
    fn validate_format_rejects_unknown_words() {
        let list = fixture_wordlist();
        assert!(!list.validate_format("not-a-real-word-triplet"));
    }

    #[tokio::test]
    async fn generate_unique_succeeds_against_empty_index() {
        let list = fixture_wordlist();
        let id = list.generate_unique(&EmptyIndex, 3, 10).await.unwrap();
        assert!(list.validate_format(&id));
    }

    #[tokio::test]
    async fn generate_unique_exhausts_against_full_index() {
        let list = fixture_wordlist();
        let err = list.generate_unique(&AlwaysOccupied, 3, 5).await.unwrap_err();
        assert_eq!(err.attempts, 5);
    }

    #[test]
    fn stats_report_expected_entropy() {
        let list = fixture_wordlist();
        let stats = list.stats();
        assert_eq!(stats.wordlist_size, REQUIRED_WORD_COUNT);
        assert!((stats.entropy_bits - 38.8).abs() < 0.1);
    }
}
