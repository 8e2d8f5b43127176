//! Optimistic display state for a single toggle control (a like button or a
//! follow button).
//!
//! The control flips immediately when tapped, is disabled while the write
//! sequence runs, then either settles on the store's authoritative count or
//! returns to exactly what was shown before the tap:
//!
//! ```text
//! Idle ──begin──▶ Pending ──commit───▶ Idle   (Transition::Committed)
//!                        └──roll_back─▶ Idle   (Transition::RolledBack)
//! ```
//!
//! Nothing here is persisted.

use crate::error::{EchoError, Result};
use serde::Serialize;

/// What the control showed when the gesture started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub active_before: bool,
    pub count_before: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending(Snapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Committed { active: bool, count: i64 },
    RolledBack { active: bool, count: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticToggle {
    active: bool,
    count: i64,
    phase: Phase,
}

impl OptimisticToggle {
    pub fn new(active: bool, count: i64) -> Self {
        Self {
            active,
            count,
            phase: Phase::Idle,
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The control accepts taps only while idle.
    pub fn is_enabled(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Record the snapshot and flip the displayed state.
    pub fn begin(&mut self) -> Result<Snapshot> {
        if let Phase::Pending(_) = self.phase {
            return Err(EchoError::InFlight("toggle".into()));
        }
        let snapshot = Snapshot {
            active_before: self.active,
            count_before: self.count,
        };
        self.active = !self.active;
        self.count = if self.active {
            self.count + 1
        } else {
            (self.count - 1).max(0)
        };
        self.phase = Phase::Pending(snapshot);
        Ok(snapshot)
    }

    /// Settle on the store's answer. Without an authoritative count the
    /// optimistic one stays on screen.
    pub fn commit(&mut self, active: bool, authoritative: Option<i64>) -> Transition {
        self.active = active;
        if let Some(count) = authoritative {
            self.count = count;
        }
        self.phase = Phase::Idle;
        Transition::Committed {
            active: self.active,
            count: self.count,
        }
    }

    pub fn roll_back(&mut self) -> Transition {
        if let Phase::Pending(snapshot) = self.phase {
            self.active = snapshot.active_before;
            self.count = snapshot.count_before;
        }
        self.phase = Phase::Idle;
        Transition::RolledBack {
            active: self.active,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_flips_and_disables() {
        let mut view = OptimisticToggle::new(false, 3);
        let snapshot = view.begin().unwrap();
        assert_eq!(
            snapshot,
            Snapshot {
                active_before: false,
                count_before: 3
            }
        );
        assert!(view.active());
        assert_eq!(view.count(), 4);
        assert!(!view.is_enabled());
        assert!(matches!(view.begin(), Err(EchoError::InFlight(_))));
    }

    #[test]
    fn commit_takes_authoritative_count() {
        let mut view = OptimisticToggle::new(false, 3);
        view.begin().unwrap();
        // Someone else liked in the meantime.
        let t = view.commit(true, Some(6));
        assert_eq!(
            t,
            Transition::Committed {
                active: true,
                count: 6
            }
        );
        assert!(view.is_enabled());
    }

    #[test]
    fn commit_without_count_keeps_optimistic_value() {
        let mut view = OptimisticToggle::new(true, 1);
        view.begin().unwrap();
        view.commit(false, None);
        assert!(!view.active());
        assert_eq!(view.count(), 0);
    }

    #[test]
    fn roll_back_restores_snapshot_exactly() {
        let mut view = OptimisticToggle::new(true, 0);
        view.begin().unwrap();
        assert_eq!(view.count(), 0);
        let t = view.roll_back();
        assert_eq!(
            t,
            Transition::RolledBack {
                active: true,
                count: 0
            }
        );
        assert_eq!(view.phase(), Phase::Idle);
    }
}
