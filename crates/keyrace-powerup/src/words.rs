//! Where race words come from.

use rand::seq::IndexedRandom;

/// A source of random words for new lobbies and for Spike Strip.
///
/// Implementations are shared across lobby tasks, hence `Send + Sync`.
pub trait WordSource: Send + Sync + 'static {
    /// Returns `n` words drawn uniformly (with repetition) from the corpus.
    fn random_words(&self, n: usize) -> Vec<String>;
}

/// The built-in list of common English words.
const ENGLISH: &[&str] = &[
    "the", "be", "of", "and", "a", "to", "in", "he", "have", "it", "that", "for", "they",
    "I", "with", "as", "not", "on", "she", "at", "by", "this", "we", "you", "do", "but",
    "from", "or", "which", "one", "would", "all", "will", "there", "say", "who", "make",
    "when", "can", "more", "if", "no", "man", "out", "other", "so", "what", "time", "up",
    "go", "about", "than", "into", "could", "state", "only", "new", "year", "some",
    "take", "come", "these", "know", "see", "use", "get", "like", "then", "first", "any",
    "work", "now", "may", "such", "give", "over", "think", "most", "even", "find", "day",
    "also", "after", "way", "many", "must", "look", "before", "great", "back", "through",
    "long", "where", "much", "should", "well", "people", "down", "own", "just",
    "because", "good", "each", "those", "feel", "seem", "how", "high", "too", "place",
    "little", "world", "very", "still", "nation", "hand", "old", "life", "tell", "write",
    "become", "here", "show", "house", "both", "between", "need", "mean", "call",
    "develop", "under", "last", "right", "move", "thing", "general", "school", "never",
    "same", "another", "begin", "while", "number", "part", "turn", "real", "leave",
    "might", "want", "point", "form", "off", "child", "few", "small", "since", "against",
    "ask", "late", "home", "interest", "large", "person", "end", "open", "public",
    "follow", "during", "present", "without", "again", "hold", "govern", "around",
    "possible", "head", "consider", "word", "program", "problem", "however", "lead",
    "system", "set", "order", "eye", "plan", "run", "keep", "face", "fact", "group",
    "play", "stand", "increase", "early", "course", "change", "help", "line",
];

/// A [`WordSource`] over a fixed, non-empty corpus.
#[derive(Debug, Clone)]
pub struct CorpusWords {
    corpus: Vec<String>,
}

impl CorpusWords {
    /// Wraps a custom corpus. Returns `None` if it is empty.
    pub fn new(corpus: Vec<String>) -> Option<Self> {
        if corpus.is_empty() {
            None
        } else {
            Some(Self { corpus })
        }
    }

    /// The built-in English corpus.
    pub fn english() -> Self {
        Self {
            corpus: ENGLISH.iter().map(|w| (*w).to_owned()).collect(),
        }
    }
}

impl Default for CorpusWords {
    fn default() -> Self {
        Self::english()
    }
}

impl WordSource for CorpusWords {
    fn random_words(&self, n: usize) -> Vec<String> {
        let mut rng = rand::rng();
        (0..n)
            .filter_map(|_| self.corpus.choose(&mut rng).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_corpus_size() {
        assert_eq!(CorpusWords::english().corpus.len(), 200);
    }

    #[test]
    fn test_random_words_returns_requested_count() {
        let words = CorpusWords::default().random_words(100);
        assert_eq!(words.len(), 100);
        assert!(words.iter().all(|w| ENGLISH.contains(&w.as_str())));
    }

    #[test]
    fn test_custom_corpus() {
        let src = CorpusWords::new(vec!["zip".into()]).unwrap();
        assert_eq!(src.random_words(3), vec!["zip", "zip", "zip"]);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert!(CorpusWords::new(vec![]).is_none());
    }
}
