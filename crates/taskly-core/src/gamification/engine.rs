//! ============================================================================
//! Gamification Engine - Serialized per-user XP, streak and badge updates
//! ============================================================================
//! The engine owns no storage. It reads and writes user state through
//! `UserStateStore`, counts tasks through `TaskHistoryQuery`, and reports
//! unlocks through `NotificationSink`.
//!
//! Every mutating operation takes a `UserGuard`, obtained from `lock_user`,
//! so one user's read-modify-write cycles never interleave. Callers hold the
//! guard across their own writes (e.g. marking the task complete) to make
//! the whole completion one logical transaction. Different users never
//! contend.
//! ============================================================================

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::badges::{check_badges, TaskHistory};
use super::streak::{update_streak, StreakChange};
use super::types::{BadgeRecord, BadgeType, UserState, UserStateUpdate};
use super::xp::{award_xp, XpAward};
use crate::types::{NotificationKind, Task};

/// Lock table size above which idle entries are dropped
const LOCK_PRUNE_THRESHOLD: usize = 1024;

// ============================================================================
// Collaborator Interfaces
// ============================================================================

/// Read/write access to per-user gamification state
#[async_trait]
pub trait UserStateStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<UserState>;

    /// Apply a field-level update atomically
    async fn set(&self, user_id: &str, update: &UserStateUpdate) -> Result<()>;
}

/// Read-only aggregate queries over a user's tasks
#[async_trait]
pub trait TaskHistoryQuery: Send + Sync {
    async fn count_completed(&self, user_id: &str) -> Result<u64>;

    async fn count_active(&self, user_id: &str) -> Result<u64>;

    async fn most_recent_completed(&self, user_id: &str) -> Result<Option<Task>>;

    /// All three aggregates at once
    async fn history(&self, user_id: &str) -> Result<TaskHistory> {
        Ok(TaskHistory {
            completed_count: self.count_completed(user_id).await?,
            active_count: self.count_active(user_id).await?,
            most_recent_completed: self.most_recent_completed(user_id).await?,
        })
    }
}

/// Fire-and-forget notification delivery
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        icon_hint: &str,
    ) -> Result<()>;
}

// ============================================================================
// Per-user Locks
// ============================================================================

/// Proof that the holder has exclusive access to one user's state
pub struct UserGuard {
    user_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl UserGuard {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl std::fmt::Debug for UserGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserGuard").field("user_id", &self.user_id).finish()
    }
}

/// Registry of per-user mutexes
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`.
    pub async fn lock(&self, user_id: &str) -> UserGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= LOCK_PRUNE_THRESHOLD {
                // Only the table itself references idle entries
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        UserGuard {
            user_id: user_id.to_string(),
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of users currently tracked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Everything one task completion changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub task_id: String,
    pub xp: XpAward,
    pub streak: u32,
    pub streak_change: StreakChange,
    pub new_badges: Vec<BadgeRecord>,
}

/// XP, streak and badge state machine
pub struct GamificationEngine {
    users: Arc<dyn UserStateStore>,
    history: Arc<dyn TaskHistoryQuery>,
    notifications: Arc<dyn NotificationSink>,
    locks: UserLocks,
}

impl GamificationEngine {
    pub fn new(
        users: Arc<dyn UserStateStore>,
        history: Arc<dyn TaskHistoryQuery>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            users,
            history,
            notifications,
            locks: UserLocks::new(),
        }
    }

    /// Acquire the user's lock. Hold it for the whole transaction.
    pub async fn lock_user(&self, user_id: &str) -> UserGuard {
        self.locks.lock(user_id).await
    }

    /// Current state, read under the caller's guard
    pub async fn state(&self, guard: &UserGuard) -> Result<UserState> {
        self.users.get(guard.user_id()).await
    }

    /// Apply a completed task: award its XP, count the streak day, evaluate
    /// badges, then report.
    ///
    /// `task` must already be stored as completed with `xp_earned` set, so
    /// the history counts include it.
    pub async fn record_completion(
        &self,
        guard: &UserGuard,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let user_id = guard.user_id();
        if task.user_id != user_id {
            bail!(
                "Task {} belongs to {}, not {}",
                task.task_id,
                task.user_id,
                user_id
            );
        }
        if !task.completed {
            bail!("Task {} is not completed", task.task_id);
        }

        let before = self.users.get(user_id).await?;
        let mut state = before.clone();

        let xp = award_xp(&mut state, task.xp_earned);
        let streak_change = update_streak(&mut state, now.date_naive());
        let history = self.history.history(user_id).await?;
        let new_badges = check_badges(&mut state, &history, now);

        self.commit(user_id, &before, &state).await?;
        self.announce_badges(user_id, &state.mascot, &new_badges).await;
        self.notify(
            user_id,
            NotificationKind::Achievement,
            "Task Complete!",
            &format!(
                "You earned {} XP for completing '{}'! Keep it up!",
                xp.amount, task.title
            ),
            &state.mascot,
        )
        .await;

        info!(
            "User {} completed {}: +{} XP (total {}, level {}), streak {} ({:?}), {} new badges",
            user_id,
            task.task_id,
            xp.amount,
            xp.total_xp,
            xp.level,
            state.streak,
            streak_change,
            new_badges.len()
        );

        Ok(CompletionOutcome {
            task_id: task.task_id.clone(),
            xp,
            streak: state.streak,
            streak_change,
            new_badges,
        })
    }

    /// Evaluate badges against current state without any other change
    pub async fn evaluate_badges(
        &self,
        guard: &UserGuard,
        now: DateTime<Utc>,
    ) -> Result<Vec<BadgeRecord>> {
        let user_id = guard.user_id();
        let before = self.users.get(user_id).await?;
        let mut state = before.clone();
        let history = self.history.history(user_id).await?;
        let new_badges = check_badges(&mut state, &history, now);

        self.commit(user_id, &before, &state).await?;
        self.announce_badges(user_id, &state.mascot, &new_badges).await;
        Ok(new_badges)
    }

    // ========================================================================
    // Developer Operations
    // ========================================================================

    /// Pretend a day passed with a completion: streak + 1, dated today.
    pub async fn simulate_day(
        &self,
        guard: &UserGuard,
        now: DateTime<Utc>,
    ) -> Result<(UserState, Vec<BadgeRecord>)> {
        let user_id = guard.user_id();
        let before = self.users.get(user_id).await?;
        let mut state = before.clone();
        state.streak = state.streak.saturating_add(1);
        state.streak_last_date = Some(now.date_naive());

        let history = self.history.history(user_id).await?;
        let new_badges = check_badges(&mut state, &history, now);

        self.commit(user_id, &before, &state).await?;
        self.announce_badges(user_id, &state.mascot, &new_badges).await;
        info!("Simulated day for {}: streak now {}", user_id, state.streak);
        Ok((state, new_badges))
    }

    /// Zero the streak and forget the last streak day
    pub async fn reset_streak(&self, guard: &UserGuard) -> Result<UserState> {
        let user_id = guard.user_id();
        let before = self.users.get(user_id).await?;
        let mut state = before.clone();
        state.streak = 0;
        state.streak_last_date = None;

        self.commit(user_id, &before, &state).await?;
        info!("Reset streak for {}", user_id);
        Ok(state)
    }

    /// Grant XP outside of a task completion, then evaluate badges
    pub async fn add_xp(
        &self,
        guard: &UserGuard,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<(XpAward, Vec<BadgeRecord>)> {
        let user_id = guard.user_id();
        let before = self.users.get(user_id).await?;
        let mut state = before.clone();
        let award = award_xp(&mut state, amount);

        let history = self.history.history(user_id).await?;
        let new_badges = check_badges(&mut state, &history, now);

        self.commit(user_id, &before, &state).await?;
        self.announce_badges(user_id, &state.mascot, &new_badges).await;
        info!("Added {} XP to {} (total {})", amount, user_id, award.total_xp);
        Ok((award, new_badges))
    }

    /// Grant one badge by hand. `None` if it was already owned.
    pub async fn trigger_badge(
        &self,
        guard: &UserGuard,
        badge_type: BadgeType,
        now: DateTime<Utc>,
    ) -> Result<Option<BadgeRecord>> {
        let user_id = guard.user_id();
        let before = self.users.get(user_id).await?;
        let mut state = before.clone();

        let granted = state.grant_badge(badge_type, now);
        if let Some(badge) = &granted {
            self.commit(user_id, &before, &state).await?;
            self.announce_badges(user_id, &state.mascot, std::slice::from_ref(badge))
                .await;
        }
        Ok(granted)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn commit(&self, user_id: &str, before: &UserState, after: &UserState) -> Result<()> {
        let update = UserStateUpdate::diff(before, after);
        if update.is_empty() {
            debug!("No state change for {}", user_id);
            return Ok(());
        }
        self.users.set(user_id, &update).await
    }

    async fn announce_badges(&self, user_id: &str, mascot: &str, badges: &[BadgeRecord]) {
        for badge in badges {
            self.notify(
                user_id,
                NotificationKind::Badge,
                &format!("Badge Unlocked: {}!", badge.name),
                &format!("{} {}", badge.icon, badge.description),
                mascot,
            )
            .await;
        }
    }

    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        icon_hint: &str,
    ) {
        if let Err(e) = self
            .notifications
            .emit(user_id, kind, title, message, icon_hint)
            .await
        {
            warn!("Failed to emit {} notification for {}: {}", kind.as_str(), user_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::xp::compute_xp;
    use crate::persona::PersonaStamp;
    use crate::types::{NewTask, Priority};
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;

    /// In-memory collaborators for the engine
    #[derive(Default)]
    struct Fakes {
        users: StdMutex<HashMap<String, UserState>>,
        tasks: StdMutex<Vec<Task>>,
        sent: StdMutex<Vec<(String, NotificationKind, String)>>,
        fail_notifications: bool,
    }

    #[async_trait]
    impl UserStateStore for Fakes {
        async fn get(&self, user_id: &str) -> Result<UserState> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn set(&self, user_id: &str, update: &UserStateUpdate) -> Result<()> {
            // Yield mid-write so unserialized callers would interleave
            tokio::task::yield_now().await;
            let mut users = self.users.lock().unwrap();
            update.apply_to(users.entry(user_id.to_string()).or_default());
            Ok(())
        }
    }

    #[async_trait]
    impl TaskHistoryQuery for Fakes {
        async fn count_completed(&self, user_id: &str) -> Result<u64> {
            let tasks = self.tasks.lock().unwrap();
            Ok(tasks.iter().filter(|t| t.user_id == user_id && t.completed).count() as u64)
        }

        async fn count_active(&self, user_id: &str) -> Result<u64> {
            let tasks = self.tasks.lock().unwrap();
            Ok(tasks.iter().filter(|t| t.user_id == user_id && !t.completed).count() as u64)
        }

        async fn most_recent_completed(&self, user_id: &str) -> Result<Option<Task>> {
            let tasks = self.tasks.lock().unwrap();
            Ok(tasks
                .iter()
                .filter(|t| t.user_id == user_id && t.completed)
                .max_by_key(|t| t.completed_at)
                .cloned())
        }
    }

    #[async_trait]
    impl NotificationSink for Fakes {
        async fn emit(
            &self,
            user_id: &str,
            kind: NotificationKind,
            title: &str,
            _message: &str,
            _icon_hint: &str,
        ) -> Result<()> {
            if self.fail_notifications {
                bail!("sink offline");
            }
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), kind, title.to_string()));
            Ok(())
        }
    }

    fn engine(fakes: &Arc<Fakes>) -> GamificationEngine {
        GamificationEngine::new(fakes.clone(), fakes.clone(), fakes.clone())
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    /// Store a completed task the way the task service does
    fn complete(fakes: &Fakes, user_id: &str, priority: Priority, now: DateTime<Utc>) -> Task {
        let mut task = Task::new(user_id, NewTask::titled("Chore"), PersonaStamp::default(), now);
        task.priority = priority;
        task.estimated_time = 0;
        task.completed = true;
        task.completed_at = Some(now.timestamp());
        task.xp_earned = compute_xp(&task, now);
        fakes.tasks.lock().unwrap().push(task.clone());
        task
    }

    #[tokio::test]
    async fn test_xp_90_to_100_levels_and_unlocks_century() {
        let fakes = Arc::new(Fakes::default());
        fakes.users.lock().unwrap().insert(
            "u1".into(),
            UserState {
                xp: 90,
                level: 1,
                ..Default::default()
            },
        );
        let engine = engine(&fakes);

        let guard = engine.lock_user("u1").await;
        let task = complete(&fakes, "u1", Priority::Medium, noon());
        let outcome = engine.record_completion(&guard, &task, noon()).await.unwrap();

        assert_eq!(outcome.xp.amount, 20);
        let state = engine.state(&guard).await.unwrap();
        assert_eq!(state.xp, 110);
        assert_eq!(state.level, 2);
        assert!(outcome.xp.leveled_up);
        assert!(state.has_badge(BadgeType::Xp100));
        assert!(state.has_badge(BadgeType::FirstTask));
        assert_eq!(state.streak, 1);
        assert_eq!(outcome.streak_change, StreakChange::Started);
    }

    #[tokio::test]
    async fn test_xp_exactly_100() {
        let fakes = Arc::new(Fakes::default());
        fakes.users.lock().unwrap().insert(
            "u1".into(),
            UserState {
                xp: 90,
                ..Default::default()
            },
        );
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;

        let mut task = complete(&fakes, "u1", Priority::Medium, noon());
        task.xp_earned = 10;
        let outcome = engine.record_completion(&guard, &task, noon()).await.unwrap();

        assert_eq!(outcome.xp.total_xp, 100);
        assert_eq!(outcome.xp.level, 2);
        assert!(outcome.new_badges.iter().any(|b| b.badge_type == BadgeType::Xp100));
    }

    #[tokio::test]
    async fn test_notifications_badges_then_completion() {
        let fakes = Arc::new(Fakes::default());
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;
        let task = complete(&fakes, "u1", Priority::Low, noon());
        engine.record_completion(&guard, &task, noon()).await.unwrap();

        let sent = fakes.sent.lock().unwrap().clone();
        let titles: Vec<_> = sent.iter().map(|(_, _, t)| t.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Badge Unlocked: First Steps!",
                "Badge Unlocked: Zero Inbox!",
                "Task Complete!"
            ]
        );
        assert_eq!(sent[2].1, NotificationKind::Achievement);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_completion() {
        let fakes = Arc::new(Fakes {
            fail_notifications: true,
            ..Default::default()
        });
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;
        let task = complete(&fakes, "u1", Priority::High, noon());
        let outcome = engine.record_completion(&guard, &task, noon()).await.unwrap();
        assert_eq!(outcome.xp.total_xp, 25);
    }

    #[tokio::test]
    async fn test_rejects_foreign_or_open_task() {
        let fakes = Arc::new(Fakes::default());
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;

        let foreign = complete(&fakes, "u2", Priority::Low, noon());
        assert!(engine.record_completion(&guard, &foreign, noon()).await.is_err());

        let mut open = complete(&fakes, "u1", Priority::Low, noon());
        open.completed = false;
        assert!(engine.record_completion(&guard, &open, noon()).await.is_err());
    }

    #[tokio::test]
    async fn test_same_day_completions_count_streak_once() {
        let fakes = Arc::new(Fakes::default());
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;

        for _ in 0..3 {
            let task = complete(&fakes, "u1", Priority::Low, noon());
            engine.record_completion(&guard, &task, noon()).await.unwrap();
        }
        let state = engine.state(&guard).await.unwrap();
        assert_eq!(state.streak, 1);
        assert_eq!(state.xp, 45);
    }

    #[tokio::test]
    async fn test_evaluate_badges_twice_is_idempotent() {
        let fakes = Arc::new(Fakes::default());
        complete(&fakes, "u1", Priority::Low, noon());
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;

        let first = engine.evaluate_badges(&guard, noon()).await.unwrap();
        assert!(!first.is_empty());
        let second = engine.evaluate_badges(&guard, noon()).await.unwrap();
        assert!(second.is_empty());

        let state = engine.state(&guard).await.unwrap();
        let mut types: Vec<_> = state.badges.iter().map(|b| b.badge_type).collect();
        let total = types.len();
        types.dedup();
        assert_eq!(types.len(), total);
    }

    #[tokio::test]
    async fn test_concurrent_completions_do_not_lose_xp() {
        let fakes = Arc::new(Fakes::default());
        let engine = Arc::new(engine(&fakes));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = engine.clone();
            let fakes = fakes.clone();
            handles.push(tokio::spawn(async move {
                let guard = engine.lock_user("u1").await;
                let task = complete(&fakes, "u1", Priority::High, noon());
                engine.record_completion(&guard, &task, noon()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let guard = engine.lock_user("u1").await;
        let state = engine.state(&guard).await.unwrap();
        assert_eq!(state.xp, 20 * 25);
        assert_eq!(state.level, 6);
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let fakes = Arc::new(Fakes::default());
        let engine = engine(&fakes);
        let _held = engine.lock_user("u1").await;
        let other = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            engine.lock_user("u2"),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_dev_operations() {
        let fakes = Arc::new(Fakes::default());
        let engine = engine(&fakes);
        let guard = engine.lock_user("u1").await;

        for _ in 0..3 {
            engine.simulate_day(&guard, noon()).await.unwrap();
        }
        let state = engine.state(&guard).await.unwrap();
        assert_eq!(state.streak, 3);
        assert!(state.has_badge(BadgeType::Streak3));

        let state = engine.reset_streak(&guard).await.unwrap();
        assert_eq!(state.streak, 0);
        assert_eq!(state.streak_last_date, None);

        let (award, badges) = engine.add_xp(&guard, 250, noon()).await.unwrap();
        assert_eq!(award.level, 3);
        assert!(badges.iter().any(|b| b.badge_type == BadgeType::Xp100));

        let granted = engine
            .trigger_badge(&guard, BadgeType::BigBrain, noon())
            .await
            .unwrap();
        assert!(granted.is_some());
        let again = engine
            .trigger_badge(&guard, BadgeType::BigBrain, noon())
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_lock_table_prunes_idle_users() {
        let locks = UserLocks::new();
        for i in 0..LOCK_PRUNE_THRESHOLD + 5 {
            let _guard = locks.lock(&format!("user_{}", i)).await;
        }
        assert!(locks.len().await < LOCK_PRUNE_THRESHOLD);
    }
}
