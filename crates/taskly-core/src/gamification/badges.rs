//! ============================================================================
//! Badge Rules - Unlock predicates over user state and task history
//! ============================================================================
//! Badges only ever move from absent to present. Each evaluation checks every
//! predicate in a fixed order, skips badges already owned, and may unlock
//! several at once.
//! ============================================================================

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{BadgeRecord, BadgeType, UserState};
use crate::types::Task;

/// Hour (UTC) before which a completion earns Early Bird
pub const EARLY_BIRD_BEFORE_HOUR: u32 = 9;
/// Hour (UTC) from which a completion earns Night Owl
pub const NIGHT_OWL_FROM_HOUR: u32 = 21;

/// Predicate-backed badges in evaluation order. Big Brain has no predicate.
pub const EVALUATION_ORDER: [BadgeType; 9] = [
    BadgeType::FirstTask,
    BadgeType::Task10,
    BadgeType::Xp100,
    BadgeType::Streak3,
    BadgeType::ConsistencyKing,
    BadgeType::EarlyBird,
    BadgeType::NightOwl,
    BadgeType::SpeedRunner,
    BadgeType::ZeroInbox,
];

/// Aggregate view of a user's tasks used by the badge predicates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskHistory {
    pub completed_count: u64,
    pub active_count: u64,
    pub most_recent_completed: Option<Task>,
}

fn qualifies(badge: BadgeType, state: &UserState, history: &TaskHistory, hour: u32) -> bool {
    match badge {
        BadgeType::FirstTask => history.completed_count >= 1,
        BadgeType::Task10 => history.completed_count >= 10,
        BadgeType::Xp100 => state.xp >= 100,
        BadgeType::Streak3 => state.streak >= 3,
        BadgeType::ConsistencyKing => state.streak >= 7,
        BadgeType::EarlyBird => hour < EARLY_BIRD_BEFORE_HOUR,
        BadgeType::NightOwl => hour >= NIGHT_OWL_FROM_HOUR,
        // Only checks that an estimate exists; elapsed time is never compared.
        BadgeType::SpeedRunner => history
            .most_recent_completed
            .as_ref()
            .map(|t| t.estimated_time > 0)
            .unwrap_or(false),
        BadgeType::ZeroInbox => history.active_count == 0 && history.completed_count > 0,
        BadgeType::BigBrain => false,
    }
}

/// Evaluate every predicate and grant the newly qualifying badges.
///
/// Returns only the badges unlocked by this call.
pub fn check_badges(
    state: &mut UserState,
    history: &TaskHistory,
    now: DateTime<Utc>,
) -> Vec<BadgeRecord> {
    let hour = now.hour();
    let qualifying: Vec<BadgeType> = EVALUATION_ORDER
        .iter()
        .copied()
        .filter(|badge| !state.has_badge(*badge))
        .filter(|badge| qualifies(*badge, state, history, hour))
        .collect();

    let unlocked: Vec<BadgeRecord> = qualifying
        .into_iter()
        .filter_map(|badge| state.grant_badge(badge, now))
        .collect();

    if !unlocked.is_empty() {
        debug!(
            "Unlocked badges: {:?}",
            unlocked.iter().map(|b| b.badge_type.as_str()).collect::<Vec<_>>()
        );
    }
    unlocked
}
