//! ============================================================================
//! Streak Rules - Consecutive UTC days with at least one completion
//! ============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::UserState;

/// What a completion did to the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// Already counted today
    Unchanged,
    /// Last counted yesterday
    Extended,
    /// First completion ever, or after a gap
    Started,
}

/// Count a completion on `today` (UTC).
///
/// At most one increment per day; a gap of two or more days restarts at 1.
pub fn update_streak(state: &mut UserState, today: NaiveDate) -> StreakChange {
    if state.streak_last_date == Some(today) {
        return StreakChange::Unchanged;
    }

    let change = match (state.streak_last_date, today.pred_opt()) {
        (Some(last), Some(yesterday)) if last == yesterday => {
            state.streak = state.streak.saturating_add(1);
            StreakChange::Extended
        }
        _ => {
            state.streak = 1;
            StreakChange::Started
        }
    };
    state.streak_last_date = Some(today);
    change
}
