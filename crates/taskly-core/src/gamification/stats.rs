//! Progress summary for a user: level, streak, badges and weekly activity.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::types::{BadgeDefinition, BadgeRecord, UserState, BADGE_DEFINITIONS};
use crate::types::Task;

/// Days covered by the activity chart
pub const ACTIVITY_DAYS: i64 = 7;

/// Completions on one UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon"
    pub day: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GamificationStats {
    pub xp: u64,
    pub level: u32,
    pub level_title: &'static str,
    pub streak: u32,
    pub badges: Vec<BadgeRecord>,
    pub completed_today: usize,
    pub total_completed: usize,
    pub total_tasks: usize,
    /// Oldest day first, ending today
    pub weekly_activity: Vec<DayActivity>,
    pub all_badges: &'static [BadgeDefinition],
}

impl GamificationStats {
    pub fn build(state: &UserState, tasks: &[Task], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let weekly_activity = (0..ACTIVITY_DAYS)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                DayActivity {
                    date,
                    day: date.format("%a").to_string(),
                    count: tasks.iter().filter(|t| t.completed_on(date)).count(),
                }
            })
            .collect();

        Self {
            xp: state.xp,
            level: state.level,
            level_title: state.level_title(),
            streak: state.streak,
            badges: state.badges.clone(),
            completed_today: tasks.iter().filter(|t| t.completed_on(today)).count(),
            total_completed: tasks.iter().filter(|t| t.completed).count(),
            total_tasks: tasks.len(),
            weekly_activity,
            all_badges: &BADGE_DEFINITIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaStamp;
    use crate::types::NewTask;
    use chrono::TimeZone;

    fn done_at(at: DateTime<Utc>) -> Task {
        let mut task = Task::new("u", NewTask::titled("t"), PersonaStamp::default(), at);
        task.completed = true;
        task.completed_at = Some(at.timestamp());
        task
    }

    #[test]
    fn test_weekly_activity_window() {
        // Tuesday
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap();
        let tasks = vec![
            done_at(now),
            done_at(now - Duration::hours(2)),
            done_at(now - Duration::days(3)),
            done_at(now - Duration::days(9)),
            Task::new("u", NewTask::titled("open"), PersonaStamp::default(), now),
        ];
        let state = UserState {
            xp: 340,
            level: 4,
            ..Default::default()
        };

        let stats = GamificationStats::build(&state, &tasks, now);
        assert_eq!(stats.level_title, "Apprentice");
        assert_eq!(stats.completed_today, 2);
        assert_eq!(stats.total_completed, 4);
        assert_eq!(stats.total_tasks, 5);

        assert_eq!(stats.weekly_activity.len(), 7);
        let last = stats.weekly_activity.last().unwrap();
        assert_eq!(last.date, now.date_naive());
        assert_eq!(last.day, "Tue");
        assert_eq!(last.count, 2);
        assert_eq!(stats.weekly_activity[3].count, 1);
        let in_window: usize = stats.weekly_activity.iter().map(|d| d.count).sum();
        assert_eq!(in_window, 3);
        assert_eq!(stats.all_badges.len(), 10);
    }
}
