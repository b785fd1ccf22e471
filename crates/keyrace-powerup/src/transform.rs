//! Word transforms used by the word-mutating power-ups.
//!
//! All transforms work on Unicode scalar values, never on bytes, so a
//! mutated word is always valid UTF-8. Transforms that grow a word stop at
//! [`MAX_WORD_BYTES`], so a word can be mutated any number of times and
//! still fit its length prefix on the wire.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

/// Longest word a transform will produce, in bytes. Words travel with a
/// one-byte length prefix.
pub const MAX_WORD_BYTES: usize = u8::MAX as usize;

/// A per-word rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Each character is repeated 1 to 5 times (Icy Roads), fewer once the
    /// word reaches [`MAX_WORD_BYTES`].
    RepeatChars,
    /// Characters are shuffled (Scrambler).
    Scramble,
    /// Leetspeak substitutions, stray `*` and trailing punctuation
    /// (Stick Shift).
    Obfuscate,
}

impl Transform {
    /// Applies the transform to one word. The result is never longer than
    /// `max(word.len(), MAX_WORD_BYTES)` bytes.
    pub fn apply<R: Rng>(self, word: &str, rng: &mut R) -> String {
        match self {
            Transform::RepeatChars => repeat_chars(word, rng),
            Transform::Scramble => scramble(word, rng),
            Transform::Obfuscate => obfuscate(word, rng),
        }
    }
}

/// The result of [`mutate_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordsUpdate {
    /// Index of the first rewritten word.
    pub start: usize,
    /// How many words were rewritten, starting at `start`.
    pub mutated: usize,
    /// Every word from `start` to the end of the sequence. A client
    /// replaces its words from `start` onward with these.
    pub words: Vec<String>,
}

/// Rewrites up to `count` words of `words` starting at `start`, clipped to
/// the end of the sequence. Returns the tail of the sequence from `start`,
/// or `None` when `start` is past the end or `count` is zero.
pub fn mutate_range<R: Rng>(
    words: &mut [String],
    start: usize,
    count: usize,
    transform: Transform,
    rng: &mut R,
) -> Option<WordsUpdate> {
    if start >= words.len() || count == 0 {
        return None;
    }
    let end = (start + count).min(words.len());
    for word in &mut words[start..end] {
        *word = transform.apply(word, rng);
    }
    Some(WordsUpdate {
        start,
        mutated: end - start,
        words: words[start..].to_vec(),
    })
}

fn repeat_chars<R: Rng>(word: &str, rng: &mut R) -> String {
    let mut out = String::with_capacity((word.len() * 3).min(MAX_WORD_BYTES));
    // Bytes of the input still to be copied once.
    let mut rest = word.len();
    for c in word.chars() {
        rest -= c.len_utf8();
        out.push(c);
        for _ in 1..rng.random_range(1..=5) {
            if out.len() + c.len_utf8() + rest > MAX_WORD_BYTES {
                break;
            }
            out.push(c);
        }
    }
    out
}

fn scramble<R: Rng>(word: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    chars.shuffle(rng);
    chars.into_iter().collect()
}

const PUNCTUATION: [char; 5] = ['!', ',', '.', ':', ';'];

fn leet(c: char) -> &'static [char] {
    match c {
        'a' | 'A' => &['@', '4'],
        'e' | 'E' => &['3'],
        'i' | 'I' => &['1', '!'],
        'o' | 'O' => &['0'],
        's' | 'S' => &['$', '5'],
        't' | 'T' => &['+', '7'],
        _ => &[],
    }
}

fn obfuscate<R: Rng>(word: &str, rng: &mut R) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    let mut rest = word.len();
    for c in word.chars() {
        rest -= c.len_utf8();
        let subs = leet(c);
        if !subs.is_empty() && rng.random_bool(0.3) {
            if let Some(sub) = subs.choose(rng) {
                out.push(*sub);
                continue;
            }
        }
        if rng.random_bool(0.1) && out.len() + 1 + c.len_utf8() + rest <= MAX_WORD_BYTES {
            out.push('*');
        }
        out.push(c);
    }
    if rng.random_bool(0.5) && out.len() < MAX_WORD_BYTES {
        if let Some(p) = PUNCTUATION.choose(rng) {
            out.push(*p);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_repeat_chars_keeps_order_and_bounds() {
        let mut rng = rng();
        for _ in 0..100 {
            let out = Transform::RepeatChars.apply("abc", &mut rng);
            let mut rest = out.as_str();
            for c in ['a', 'b', 'c'] {
                let run = rest.chars().take_while(|x| *x == c).count();
                assert!((1..=5).contains(&run), "run of {c} was {run} in {out}");
                rest = &rest[run..];
            }
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_scramble_is_permutation() {
        let mut rng = rng();
        let out = Transform::Scramble.apply("ñandú", &mut rng);
        let mut a: Vec<char> = out.chars().collect();
        let mut b: Vec<char> = "ñandú".chars().collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_obfuscate_only_uses_known_characters() {
        let mut rng = rng();
        for _ in 0..200 {
            let out = Transform::Obfuscate.apply("state", &mut rng);
            assert!(out.chars().all(|c| "state@43!1$5+7*0!,.:;".contains(c)));
            assert!(out.chars().filter(|c| *c != '*').count() >= 5);
        }
    }

    #[test]
    fn test_mutate_range_clips_to_end() {
        let mut words: Vec<String> = ["a", "b", "c", "d"].map(String::from).to_vec();
        let update =
            mutate_range(&mut words, 2, 10, Transform::RepeatChars, &mut rng()).unwrap();
        assert_eq!(update.start, 2);
        assert_eq!(update.mutated, 2);
        assert_eq!(update.words, words[2..].to_vec());
        assert_eq!(words[0], "a");
        assert_eq!(words[1], "b");
    }

    #[test]
    fn test_mutate_range_returns_whole_tail() {
        let mut words: Vec<String> = ["a", "b", "c", "d", "e", "f"].map(String::from).to_vec();
        let update = mutate_range(&mut words, 1, 2, Transform::RepeatChars, &mut rng()).unwrap();
        assert_eq!(update.start, 1);
        assert_eq!(update.mutated, 2);
        assert_eq!(update.start + update.words.len(), words.len());
        assert_eq!(update.words, words[1..].to_vec());
        assert_eq!(&update.words[2..], &["d", "e", "f"]);
    }

    #[test]
    fn test_repeated_growth_stays_within_word_limit() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for start in ["possible", "ñandú"] {
                let mut word = start.to_string();
                for _ in 0..10 {
                    word = Transform::RepeatChars.apply(&word, &mut rng);
                    assert!(word.len() <= MAX_WORD_BYTES, "{} bytes", word.len());
                    word = Transform::Obfuscate.apply(&word, &mut rng);
                    assert!(word.len() <= MAX_WORD_BYTES, "{} bytes", word.len());
                }
            }
        }
    }

    #[test]
    fn test_full_length_word_is_not_grown() {
        let mut rng = rng();
        let word = "state".repeat(MAX_WORD_BYTES / 5);
        assert_eq!(word.len(), MAX_WORD_BYTES);
        for _ in 0..20 {
            assert_eq!(Transform::RepeatChars.apply(&word, &mut rng), word);
            assert_eq!(Transform::Obfuscate.apply(&word, &mut rng).len(), MAX_WORD_BYTES);
        }
    }

    #[test]
    fn test_mutate_range_past_end_is_none() {
        let mut words: Vec<String> = vec!["a".into()];
        assert!(mutate_range(&mut words, 1, 10, Transform::Scramble, &mut rng()).is_none());
        assert!(mutate_range(&mut words, 0, 0, Transform::Scramble, &mut rng()).is_none());
    }
}
