//! Per-racer power-up bookkeeping.

use keyrace_protocol::PowerupKind;

const N: usize = PowerupKind::COUNT;

/// Why a `SelectPowerups` request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("expected {expected} power-ups, got {got}")]
    WrongCount { expected: usize, got: usize },

    #[error("selection size changed from {previous} to {got}")]
    CountChanged { previous: usize, got: usize },

    #[error("{0} selected twice")]
    Duplicate(PowerupKind),

    #[error("{0} was not displayed")]
    NotDisplayed(PowerupKind),

    #[error("selection is frozen after the first purchase")]
    Frozen,
}

/// Why a purchase was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseRejection {
    #[error("the race has not started")]
    RaceNotStarted,

    #[error("{0} is not offered")]
    NotOffered(PowerupKind),

    #[error("{0} was already used")]
    AlreadyUsed(PowerupKind),

    #[error("purchases are locked by a tire boot")]
    TireBooted,
}

/// The power-up side of one racer.
///
/// Invariant: `used[k]` implies `offered[k]`. Every mutation goes through
/// methods that preserve it.
#[derive(Debug, Clone)]
pub struct PowerupState {
    displayed: Vec<PowerupKind>,
    selection: Option<usize>,
    offered: [bool; N],
    used: [bool; N],
    active: [bool; N],
    words_left: [usize; N],
}

impl PowerupState {
    /// Creates the state for a racer who was shown `displayed`.
    pub fn new(displayed: Vec<PowerupKind>) -> Self {
        Self {
            displayed,
            selection: None,
            offered: [false; N],
            used: [false; N],
            active: [false; N],
            words_left: [0; N],
        }
    }

    /// Records the racer's choice of `required` displayed power-ups.
    ///
    /// A repeat selection must keep the same size, and is only allowed
    /// until the first purchase. On error nothing changes.
    pub fn select(
        &mut self,
        kinds: &[PowerupKind],
        required: usize,
    ) -> Result<(), SelectionError> {
        if let Some(previous) = self.selection {
            if previous != kinds.len() {
                return Err(SelectionError::CountChanged {
                    previous,
                    got: kinds.len(),
                });
            }
            if self.used.iter().any(|u| *u) {
                return Err(SelectionError::Frozen);
            }
        }
        if kinds.len() != required {
            return Err(SelectionError::WrongCount {
                expected: required,
                got: kinds.len(),
            });
        }

        let mut chosen = [false; N];
        for &kind in kinds {
            if !self.displayed.contains(&kind) {
                return Err(SelectionError::NotDisplayed(kind));
            }
            if std::mem::replace(&mut chosen[kind.index()], true) {
                return Err(SelectionError::Duplicate(kind));
            }
        }

        self.offered = chosen;
        self.selection = Some(kinds.len());
        Ok(())
    }

    /// Checks whether `kind` may be bought right now.
    pub fn check_purchase(&self, kind: PowerupKind) -> Result<(), PurchaseRejection> {
        if self.is_active(PowerupKind::TireBoot) {
            return Err(PurchaseRejection::TireBooted);
        }
        if !self.offered[kind.index()] {
            return Err(PurchaseRejection::NotOffered(kind));
        }
        if self.used[kind.index()] {
            return Err(PurchaseRejection::AlreadyUsed(kind));
        }
        Ok(())
    }

    /// Checks and records a purchase of `kind`.
    pub fn purchase(&mut self, kind: PowerupKind) -> Result<(), PurchaseRejection> {
        self.check_purchase(kind)?;
        self.used[kind.index()] = true;
        Ok(())
    }

    pub fn is_offered(&self, kind: PowerupKind) -> bool {
        self.offered[kind.index()]
    }

    pub fn is_used(&self, kind: PowerupKind) -> bool {
        self.used[kind.index()]
    }

    pub fn is_active(&self, kind: PowerupKind) -> bool {
        self.active[kind.index()]
    }

    pub fn words_left(&self, kind: PowerupKind) -> usize {
        self.words_left[kind.index()]
    }

    /// Marks `kind` as affecting this racer.
    pub fn activate(&mut self, kind: PowerupKind) {
        self.active[kind.index()] = true;
    }

    /// Marks `kind` as affecting this racer for the next `words` words.
    pub fn activate_for_words(&mut self, kind: PowerupKind, words: usize) {
        self.active[kind.index()] = true;
        self.words_left[kind.index()] = words;
    }

    /// Clears `kind`. Returns `true` if it was active.
    pub fn deactivate(&mut self, kind: PowerupKind) -> bool {
        self.words_left[kind.index()] = 0;
        std::mem::replace(&mut self.active[kind.index()], false)
    }

    /// Counts one completed word against every word-bounded effect.
    /// Returns `true` if any effect ran out and was cleared.
    pub fn word_completed(&mut self) -> bool {
        let mut cleared = false;
        for kind in PowerupKind::ALL {
            let left = &mut self.words_left[kind.index()];
            if *left == 0 {
                continue;
            }
            *left -= 1;
            if *left == 0 {
                self.active[kind.index()] = false;
                cleared = true;
            }
        }
        cleared
    }

    /// The kinds currently affecting this racer, in id order.
    pub fn active_kinds(&self) -> Vec<PowerupKind> {
        PowerupKind::ALL
            .into_iter()
            .filter(|k| self.active[k.index()])
            .collect()
    }
}
