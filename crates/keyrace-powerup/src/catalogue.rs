//! What each power-up does.
//!
//! The catalogue is a process-wide constant: a kind maps to exactly one
//! [`Effect`]. Per-racer bookkeeping lives in [`crate::PowerupState`].

use std::time::Duration;

use keyrace_protocol::PowerupKind;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::Transform;

/// How long Fog, Tire Boot and Rear View Mirror last.
pub const STATUS_DURATION: Duration = Duration::from_secs(10);

/// How many words Icy Roads, Scrambler and Stick Shift mutate.
pub const MUTATION_WORDS: usize = 10;

/// How many words Spike Strip appends.
pub const SPIKE_STRIP_WORDS: usize = 5;

/// Mutations start this many words ahead of the target's cursor, so the
/// word being typed (and the next couple) stay readable.
pub const MUTATION_OFFSET: usize = 3;

/// The effect of a power-up once it lands on a racer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A status that lasts for a fixed time.
    Timed(Duration),
    /// Rewrite up to `words` words ahead of the cursor.
    Mutate { transform: Transform, words: usize },
    /// Append `words` random words to the end of the sequence.
    Append { words: usize },
}

/// Returns the effect of `kind`.
pub fn effect(kind: PowerupKind) -> Effect {
    match kind {
        PowerupKind::SpikeStrip => Effect::Append {
            words: SPIKE_STRIP_WORDS,
        },
        PowerupKind::StickShift => Effect::Mutate {
            transform: Transform::Obfuscate,
            words: MUTATION_WORDS,
        },
        PowerupKind::IcyRoads => Effect::Mutate {
            transform: Transform::RepeatChars,
            words: MUTATION_WORDS,
        },
        PowerupKind::Scrambler => Effect::Mutate {
            transform: Transform::Scramble,
            words: MUTATION_WORDS,
        },
        PowerupKind::Fog | PowerupKind::TireBoot | PowerupKind::RearViewMirror => {
            Effect::Timed(STATUS_DURATION)
        }
    }
}

/// `true` for power-ups the purchaser applies to themselves.
pub fn targets_self(kind: PowerupKind) -> bool {
    matches!(kind, PowerupKind::RearViewMirror)
}

/// Picks `n` distinct kinds to display to a racer, in id order.
///
/// `n` is capped at the catalogue size.
pub fn random_display<R: Rng>(n: usize, rng: &mut R) -> Vec<PowerupKind> {
    let mut kinds: Vec<PowerupKind> = PowerupKind::ALL
        .choose_multiple(rng, n.min(PowerupKind::COUNT))
        .copied()
        .collect();
    kinds.sort();
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_kinds_last_ten_seconds() {
        for kind in [
            PowerupKind::Fog,
            PowerupKind::TireBoot,
            PowerupKind::RearViewMirror,
        ] {
            assert_eq!(effect(kind), Effect::Timed(Duration::from_secs(10)));
        }
    }

    #[test]
    fn test_word_effects() {
        assert_eq!(
            effect(PowerupKind::IcyRoads),
            Effect::Mutate {
                transform: Transform::RepeatChars,
                words: 10
            }
        );
        assert_eq!(effect(PowerupKind::SpikeStrip), Effect::Append { words: 5 });
    }

    #[test]
    fn test_only_mirror_targets_self() {
        let selfish: Vec<_> = PowerupKind::ALL
            .into_iter()
            .filter(|k| targets_self(*k))
            .collect();
        assert_eq!(selfish, vec![PowerupKind::RearViewMirror]);
    }

    #[test]
    fn test_random_display_is_distinct_and_sorted() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let shown = random_display(4, &mut rng);
            assert_eq!(shown.len(), 4);
            assert!(shown.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_random_display_caps_at_catalogue_size() {
        let shown = random_display(20, &mut rand::rng());
        assert_eq!(shown, PowerupKind::ALL.to_vec());
    }
}
