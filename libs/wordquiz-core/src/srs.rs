//! Level-ladder spaced repetition.
//!
//! A word climbs one level per "memorized" answer and drops back to level 0
//! on a miss. Each level maps to a fixed review interval. The same function
//! runs on the client (offline answers) and on the server (replayed toggles),
//! so both sides converge as long as they start from the same level.

use chrono::{DateTime, Duration, Utc};

use crate::types::WordChanges;

/// Review interval in days, indexed by level.
pub const SRS_INTERVALS: [i64; 6] = [0, 1, 3, 7, 14, 30];

/// Highest level; reaching it marks the word memorized.
pub const MAX_LEVEL: u8 = 5;

/// Result of scheduling a word after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingResult {
    pub level: u8,
    pub memorized: bool,
    pub next_review_at: DateTime<Utc>,
}

impl SchedulingResult {
    /// Word update carrying the scheduled state.
    pub fn to_changes(&self) -> WordChanges {
        WordChanges {
            memorized: Some(self.memorized),
            level: Some(self.level),
            next_review_at: Some(self.next_review_at),
            ..Default::default()
        }
    }
}

/// Interval before the next review at `level`. Levels above the ladder clamp to the top.
pub fn interval_for(level: u8) -> Duration {
    let idx = usize::from(level.min(MAX_LEVEL));
    Duration::days(SRS_INTERVALS[idx])
}

/// Compute the next level and due date for a word.
pub fn schedule(current_level: u8, marked_memorized: bool, now: DateTime<Utc>) -> SchedulingResult {
    if marked_memorized {
        let level = current_level.saturating_add(1).min(MAX_LEVEL);
        SchedulingResult {
            level,
            memorized: level >= MAX_LEVEL,
            next_review_at: now + interval_for(level),
        }
    } else {
        SchedulingResult {
            level: 0,
            memorized: false,
            next_review_at: now,
        }
    }
}
