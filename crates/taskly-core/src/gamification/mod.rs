//! ============================================================================
//! Gamification - XP, levels, streaks and badges
//! ============================================================================
//! The rules (`xp`, `streak`, `badges`) are pure functions over `UserState`.
//! `GamificationEngine` composes them into one per-user transaction on top of
//! the storage and notification collaborators.
//! ============================================================================

mod badges;
mod engine;
mod stats;
mod streak;
mod types;
mod xp;

pub use badges::{check_badges, TaskHistory, EARLY_BIRD_BEFORE_HOUR, EVALUATION_ORDER, NIGHT_OWL_FROM_HOUR};
pub use engine::{
    CompletionOutcome, GamificationEngine, NotificationSink, TaskHistoryQuery, UserGuard,
    UserLocks, UserStateStore,
};
pub use stats::{DayActivity, GamificationStats, ACTIVITY_DAYS};
pub use streak::{update_streak, StreakChange};
pub use types::{
    level_for_xp, level_title, BadgeDefinition, BadgeRecord, BadgeType, UserState,
    UserStateUpdate, BADGE_DEFINITIONS, XP_PER_LEVEL,
};
pub use xp::{
    award_xp, compute_xp, parse_due_date, priority_bonus, XpAward, BASE_XP, ON_TIME_BONUS,
    XP_PER_SUBTASK,
};
