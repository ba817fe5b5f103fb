//! Match tally and delta accounting.
//!
//! The match runner prints a cumulative score after every game. The worker
//! only ever reports the part the coordinator has not acknowledged yet, so the
//! tally keeps two views: the cumulative score, and the `sent` checkpoint.

use serde::{Deserialize, Serialize};

/// Win/loss/draw counts from the dev engine's perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl Score {
    pub fn new(wins: u32, losses: u32, draws: u32) -> Self {
        Self {
            wins,
            losses,
            draws,
        }
    }

    /// Saturates at `u32::MAX`; the counts come straight from runner output.
    pub fn total_games(&self) -> u32 {
        self.wins.saturating_add(self.losses).saturating_add(self.draws)
    }

    /// Component-wise `self - earlier`, clamped at zero.
    pub fn saturating_sub(&self, earlier: &Score) -> Score {
        Score {
            wins: self.wins.saturating_sub(earlier.wins),
            losses: self.losses.saturating_sub(earlier.losses),
            draws: self.draws.saturating_sub(earlier.draws),
        }
    }

    /// True if every component is at least the matching component of `other`.
    pub fn dominates(&self, other: &Score) -> bool {
        self.wins >= other.wins && self.losses >= other.losses && self.draws >= other.draws
    }
}

/// One upload's worth of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDelta {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub crashes: u32,
    pub timelosses: u32,
}

impl ResultDelta {
    pub fn score(&self) -> Score {
        Score::new(self.wins, self.losses, self.draws)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Cumulative results for one match session plus the acknowledged checkpoint.
///
/// Invariant: `sent` never exceeds `cumulative` in any component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchTally {
    cumulative: Score,
    sent: Score,
    crashes: u32,
    timelosses: u32,
}

impl MatchTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cumulative(&self) -> Score {
        self.cumulative
    }

    pub fn sent(&self) -> Score {
        self.sent
    }

    /// Crashes observed since the last acknowledged report.
    pub fn pending_crashes(&self) -> u32 {
        self.crashes
    }

    /// Time losses observed since the last acknowledged report.
    pub fn pending_timelosses(&self) -> u32 {
        self.timelosses
    }

    /// Replace the cumulative score with the runner's latest summary.
    ///
    /// A summary that would move any component below the acknowledged
    /// checkpoint is ignored and `false` is returned.
    pub fn update_score(&mut self, score: Score) -> bool {
        if !score.dominates(&self.sent) {
            return false;
        }
        self.cumulative = score;
        true
    }

    pub fn record_crash(&mut self) {
        self.crashes += 1;
    }

    pub fn record_timeloss(&mut self) {
        self.timelosses += 1;
    }

    /// Everything not yet acknowledged by the coordinator.
    pub fn delta(&self) -> ResultDelta {
        let score = self.cumulative.saturating_sub(&self.sent);
        ResultDelta {
            wins: score.wins,
            losses: score.losses,
            draws: score.draws,
            crashes: self.crashes,
            timelosses: self.timelosses,
        }
    }

    /// Games played but not yet acknowledged.
    pub fn pending_games(&self) -> u32 {
        self.cumulative.saturating_sub(&self.sent).total_games()
    }

    /// Record that `delta` was accepted by the coordinator.
    ///
    /// The checkpoint advances by exactly the acknowledged amount, so events
    /// recorded after the delta was taken stay pending.
    pub fn acknowledge(&mut self, delta: &ResultDelta) {
        self.sent = Score {
            wins: (self.sent.wins + delta.wins).min(self.cumulative.wins),
            losses: (self.sent.losses + delta.losses).min(self.cumulative.losses),
            draws: (self.sent.draws + delta.draws).min(self.cumulative.draws),
        };
        self.crashes = self.crashes.saturating_sub(delta.crashes);
        self.timelosses = self.timelosses.saturating_sub(delta.timelosses);
    }
}

#[cfg(test)]
#[path = "tally_tests.rs"]
mod tally_tests;
