//! Power-up engine for Keyrace.
//!
//! Everything a racer's state handler needs to resolve power-ups, with no
//! I/O of its own:
//!
//! - [`catalogue`]: what each [`PowerupKind`] does ([`Effect`]).
//! - [`PowerupState`]: offered, used and active flags plus word counters.
//! - [`Transform`] and [`mutate_range`]: the word-rewriting effects.
//! - [`EffectTimer`] and [`EffectTimers`]: cancellable expiry for timed
//!   effects, designed to sit in a `tokio::select!` loop.
//! - [`WordSource`]: where race words come from.

pub mod catalogue;
mod state;
mod timer;
mod transform;
mod words;

pub use catalogue::{effect, random_display, targets_self, Effect};
pub use keyrace_protocol::PowerupKind;
pub use state::{PowerupState, PurchaseRejection, SelectionError};
pub use timer::{EffectTimer, EffectTimers};
pub use transform::{mutate_range, Transform, WordsUpdate, MAX_WORD_BYTES};
pub use words::{CorpusWords, WordSource};
