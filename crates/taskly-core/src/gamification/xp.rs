//! ============================================================================
//! XP Rules - Completion rewards and level progression
//! ============================================================================
//! reward = 10 base
//!        + priority bonus (high 15, medium 10, low 5)
//!        + 3 per subtask
//!        + 10 if the due date parses and has not passed
//! ============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{level_for_xp, UserState};
use crate::types::{Priority, Task};

pub const BASE_XP: u64 = 10;
pub const XP_PER_SUBTASK: u64 = 3;
pub const ON_TIME_BONUS: u64 = 10;

pub fn priority_bonus(priority: Priority) -> u64 {
    match priority {
        Priority::High => 15,
        Priority::Medium => 10,
        Priority::Low => 5,
    }
}

/// XP a task pays out when completed at `now`.
pub fn compute_xp(task: &Task, now: DateTime<Utc>) -> u64 {
    let mut xp = BASE_XP + priority_bonus(task.priority);
    xp += XP_PER_SUBTASK * task.subtasks.len() as u64;

    if let Some(due) = task.due_at() {
        if now <= due {
            xp += ON_TIME_BONUS;
        }
    }

    xp
}

/// Parse a due date.
///
/// Accepts RFC 3339 (`Z` or an offset). Offset-less datetimes are read as
/// UTC and a bare date means the end of that UTC day. Anything else is `None`.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let end = NaiveTime::from_hms_opt(23, 59, 59)?;
        return Some(day.and_time(end).and_utc());
    }
    None
}

/// Result of an XP award
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    pub amount: u64,
    pub total_xp: u64,
    pub level: u32,
    pub leveled_up: bool,
}

/// Add XP and recompute the level.
pub fn award_xp(state: &mut UserState, amount: u64) -> XpAward {
    let previous_level = state.level;
    state.xp = state.xp.saturating_add(amount);
    state.level = level_for_xp(state.xp);

    XpAward {
        amount,
        total_xp: state.xp,
        level: state.level,
        leveled_up: state.level > previous_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaStamp;
    use crate::types::{NewTask, SubtaskDraft};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()
    }

    fn task(priority: &str, subtasks: usize, due: Option<String>) -> Task {
        let mut input = NewTask::titled("Task");
        input.priority = Some(priority.to_string());
        input.due_date = due;
        input.subtasks = (0..subtasks)
            .map(|i| SubtaskDraft::new(format!("step {}", i), 10))
            .collect();
        Task::new("user_1", input, PersonaStamp::default(), now())
    }

    #[test]
    fn test_high_priority_with_subtasks_on_time() {
        let due = (now() + Duration::days(1)).to_rfc3339();
        assert_eq!(compute_xp(&task("high", 2, Some(due)), now()), 10 + 15 + 6 + 10);
    }

    #[test]
    fn test_low_priority_plain() {
        assert_eq!(compute_xp(&task("low", 0, None), now()), 15);
    }

    #[test]
    fn test_unknown_priority_is_medium() {
        assert_eq!(compute_xp(&task("whenever", 0, None), now()), 20);
    }

    #[test]
    fn test_overdue_gets_no_bonus() {
        let due = (now() - Duration::hours(1)).to_rfc3339();
        assert_eq!(compute_xp(&task("medium", 0, Some(due)), now()), 20);
    }

    #[test]
    fn test_due_exactly_now_counts_as_on_time() {
        let due = now().to_rfc3339();
        assert_eq!(compute_xp(&task("medium", 0, Some(due)), now()), 30);
    }

    #[test]
    fn test_garbage_due_date_is_ignored() {
        assert_eq!(compute_xp(&task("medium", 1, Some("next tuesday".into())), now()), 23);
        assert_eq!(compute_xp(&task("medium", 0, Some(String::new())), now()), 20);
    }

    #[test]
    fn test_parse_due_date_forms() {
        let z = parse_due_date("2025-06-10T15:00:00Z").unwrap();
        assert_eq!(z, Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap());

        let offset = parse_due_date("2025-06-10T17:00:00+02:00").unwrap();
        assert_eq!(offset, z);

        let naive = parse_due_date("2025-06-10T15:00:00").unwrap();
        assert_eq!(naive, z);

        let day = parse_due_date("2025-06-10").unwrap();
        assert_eq!(day, Utc.with_ymd_and_hms(2025, 6, 10, 23, 59, 59).unwrap());

        assert!(parse_due_date("soon").is_none());
    }

    #[test]
    fn test_award_xp_levels() {
        let mut state = UserState::default();
        let award = award_xp(&mut state, 90);
        assert_eq!(award.level, 1);
        assert!(!award.leveled_up);

        let award = award_xp(&mut state, 10);
        assert_eq!(state.xp, 100);
        assert_eq!(state.level, 2);
        assert!(award.leveled_up);

        award_xp(&mut state, 150);
        assert_eq!(state.level, 3);
    }
}
