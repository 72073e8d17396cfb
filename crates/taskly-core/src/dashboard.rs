//! ============================================================================
//! Dashboard - Home screen summary
//! ============================================================================

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::Arc;

use crate::store::{NotificationStore, TaskStore, UserDirectory};
use crate::types::{Task, TasklyError};

/// Pending tasks shown on the dashboard
const DASHBOARD_TASKS: usize = 5;

pub const QUOTES: [&str; 8] = [
    "The secret of getting ahead is getting started. - Mark Twain",
    "Every accomplishment starts with the decision to try.",
    "Small steps every day lead to big changes.",
    "You don't have to be perfect, just consistent.",
    "Believe you can and you're halfway there. - Theodore Roosevelt",
    "The only way to do great work is to love what you do. - Steve Jobs",
    "Progress, not perfection, is what we should be asking of ourselves.",
    "Start where you are. Use what you have. Do what you can.",
];

/// Greeting for a UTC hour
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good Morning",
        12..=16 => "Good Afternoon",
        _ => "Good Evening",
    }
}

pub fn random_quote() -> &'static str {
    QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(QUOTES[0])
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub greeting: &'static str,
    pub name: String,
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    /// Highest priority first
    pub today_tasks: Vec<Task>,
    pub completed_today: usize,
    pub total_pending: usize,
    pub quote: &'static str,
    pub unread_notifications: usize,
    pub mascot: String,
}

pub struct DashboardService {
    users: Arc<dyn UserDirectory>,
    tasks: Arc<dyn TaskStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl DashboardService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        tasks: Arc<dyn TaskStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            users,
            tasks,
            notifications,
        }
    }

    pub async fn load(&self, user_id: &str) -> Result<Dashboard> {
        self.load_at(user_id, Utc::now()).await
    }

    pub async fn load_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<Dashboard> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| TasklyError::UserNotFound(user_id.to_string()))?;
        let tasks = self.tasks.user_tasks(user_id).await?;
        let unread = self.notifications.unread_count(user_id).await?;

        let today = now.date_naive();
        let completed_today = tasks.iter().filter(|t| t.completed_on(today)).count();

        let mut pending: Vec<Task> = tasks.into_iter().filter(|t| !t.completed).collect();
        pending.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(b.created_at.cmp(&a.created_at))
        });
        let total_pending = pending.len();
        pending.truncate(DASHBOARD_TASKS);

        Ok(Dashboard {
            greeting: greeting(now.hour()),
            name: user.name,
            xp: user.state.xp,
            level: user.state.level,
            streak: user.state.streak,
            today_tasks: pending,
            completed_today,
            total_pending,
            quote: random_quote(),
            unread_notifications: unread,
            mascot: user.state.mascot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{TasklyDb, UserRecord};
    use crate::gamification::NotificationSink;
    use crate::persona::PersonaStamp;
    use crate::types::{NewTask, NotificationKind, Priority};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_greeting_boundaries() {
        assert_eq!(greeting(0), "Good Morning");
        assert_eq!(greeting(11), "Good Morning");
        assert_eq!(greeting(12), "Good Afternoon");
        assert_eq!(greeting(16), "Good Afternoon");
        assert_eq!(greeting(17), "Good Evening");
        assert_eq!(greeting(23), "Good Evening");
    }

    #[test]
    fn test_random_quote_is_from_list() {
        for _ in 0..20 {
            assert!(QUOTES.contains(&random_quote()));
        }
    }

    #[tokio::test]
    async fn test_dashboard_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskly.redb");
        let db = Arc::new(TasklyDb::open(Some(path.to_str().unwrap())).unwrap());
        let user = UserRecord::new("Ada", Utc::now());
        db.store_user(&user).unwrap();

        let now = Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap();
        let priorities = ["low", "high", "medium", "low", "high", "medium", "low"];
        for (i, p) in priorities.iter().enumerate() {
            let mut input = NewTask::titled(format!("t{}", i));
            input.priority = Some(p.to_string());
            let task = Task::new(&user.user_id, input, PersonaStamp::default(), now - Duration::minutes(i as i64));
            db.store_task(&task).unwrap();
        }
        let mut done = Task::new(&user.user_id, NewTask::titled("done"), PersonaStamp::default(), now);
        done.completed = true;
        done.completed_at = Some(now.timestamp());
        db.store_task(&done).unwrap();
        db.emit(&user.user_id, NotificationKind::Achievement, "t", "m", "owl")
            .await
            .unwrap();

        let service = DashboardService::new(db.clone(), db.clone(), db.clone());
        let dash = service.load_at(&user.user_id, now).await.unwrap();

        assert_eq!(dash.greeting, "Good Afternoon");
        assert_eq!(dash.name, "Ada");
        assert_eq!(dash.total_pending, 7);
        assert_eq!(dash.today_tasks.len(), 5);
        assert_eq!(dash.today_tasks[0].priority, Priority::High);
        assert_eq!(dash.today_tasks[0].title, "t1");
        assert_eq!(dash.today_tasks[1].title, "t4");
        assert_eq!(dash.today_tasks[2].priority, Priority::Medium);
        assert_eq!(dash.completed_today, 1);
        assert_eq!(dash.unread_notifications, 1);
        assert_eq!(dash.mascot, "owl");
    }
}
