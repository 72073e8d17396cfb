//! ============================================================================
//! Gamification Types - User progress, badges and level math
//! ============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// XP needed per level
pub const XP_PER_LEVEL: u64 = 100;

/// Level for a given XP total: `max(1, xp / 100 + 1)`
pub fn level_for_xp(xp: u64) -> u32 {
    let level = xp / XP_PER_LEVEL + 1;
    u32::try_from(level).unwrap_or(u32::MAX).max(1)
}

/// Human-readable rank for a level
pub fn level_title(level: u32) -> &'static str {
    match level {
        0..=2 => "Beginner",
        3..=5 => "Apprentice",
        6..=10 => "Warrior",
        11..=20 => "Expert",
        _ => "Master",
    }
}

fn default_level() -> u32 {
    1
}

fn default_mascot() -> String {
    "owl".to_string()
}

/// Per-user gamification state.
///
/// `level` always equals `level_for_xp(xp)` after an XP mutation and `badges`
/// holds at most one record per badge type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    #[serde(default)]
    pub xp: u64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub streak: u32,
    /// UTC day of the last streak-counting completion
    #[serde(default)]
    pub streak_last_date: Option<NaiveDate>,
    #[serde(default)]
    pub badges: Vec<BadgeRecord>,
    /// Only used to style notifications
    #[serde(default = "default_mascot")]
    pub mascot: String,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            streak_last_date: None,
            badges: Vec::new(),
            mascot: default_mascot(),
        }
    }
}

impl UserState {
    pub fn has_badge(&self, badge_type: BadgeType) -> bool {
        self.badges.iter().any(|b| b.badge_type == badge_type)
    }

    /// Append a badge unless it is already owned. Returns the new record.
    pub fn grant_badge(&mut self, badge_type: BadgeType, now: DateTime<Utc>) -> Option<BadgeRecord> {
        if self.has_badge(badge_type) {
            return None;
        }
        let record = BadgeRecord::earned(badge_type, now);
        self.badges.push(record.clone());
        Some(record)
    }

    pub fn level_title(&self) -> &'static str {
        level_title(self.level)
    }
}

/// Every badge the system knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadgeType {
    #[serde(rename = "early_bird")]
    EarlyBird,
    #[serde(rename = "night_owl")]
    NightOwl,
    #[serde(rename = "consistency_king")]
    ConsistencyKing,
    /// Metadata only; no automatic predicate
    #[serde(rename = "big_brain")]
    BigBrain,
    #[serde(rename = "zero_inbox")]
    ZeroInbox,
    #[serde(rename = "first_task")]
    FirstTask,
    #[serde(rename = "xp_100")]
    Xp100,
    #[serde(rename = "streak_3")]
    Streak3,
    #[serde(rename = "task_10")]
    Task10,
    #[serde(rename = "speed_runner")]
    SpeedRunner,
}

impl BadgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::EarlyBird => "early_bird",
            BadgeType::NightOwl => "night_owl",
            BadgeType::ConsistencyKing => "consistency_king",
            BadgeType::BigBrain => "big_brain",
            BadgeType::ZeroInbox => "zero_inbox",
            BadgeType::FirstTask => "first_task",
            BadgeType::Xp100 => "xp_100",
            BadgeType::Streak3 => "streak_3",
            BadgeType::Task10 => "task_10",
            BadgeType::SpeedRunner => "speed_runner",
        }
    }

    pub fn definition(&self) -> &'static BadgeDefinition {
        BADGE_DEFINITIONS
            .iter()
            .find(|d| d.badge_type == *self)
            .unwrap_or(&BADGE_DEFINITIONS[0])
    }
}

impl std::fmt::Display for BadgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BadgeType {
    type Err = crate::types::TasklyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BADGE_DEFINITIONS
            .iter()
            .map(|d| d.badge_type)
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| crate::types::TasklyError::UnknownBadge(s.to_string()))
    }
}

/// Human-facing badge metadata
#[derive(Debug, Clone, Serialize)]
pub struct BadgeDefinition {
    pub badge_type: BadgeType,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

/// Badge metadata in display order
pub static BADGE_DEFINITIONS: [BadgeDefinition; 10] = [
    BadgeDefinition {
        badge_type: BadgeType::EarlyBird,
        name: "Early Bird",
        description: "Complete a task before 9am",
        icon: "🌅",
    },
    BadgeDefinition {
        badge_type: BadgeType::NightOwl,
        name: "Night Owl",
        description: "Complete a task after 9pm",
        icon: "🌙",
    },
    BadgeDefinition {
        badge_type: BadgeType::ConsistencyKing,
        name: "Consistency King",
        description: "7-day streak",
        icon: "👑",
    },
    BadgeDefinition {
        badge_type: BadgeType::BigBrain,
        name: "Big Brain",
        description: "Complete 5 AI-assisted tasks",
        icon: "🧠",
    },
    BadgeDefinition {
        badge_type: BadgeType::ZeroInbox,
        name: "Zero Inbox",
        description: "Clear all tasks in a day",
        icon: "🏆",
    },
    BadgeDefinition {
        badge_type: BadgeType::FirstTask,
        name: "First Steps",
        description: "Complete your first task",
        icon: "🎯",
    },
    BadgeDefinition {
        badge_type: BadgeType::Xp100,
        name: "Century Club",
        description: "Earn 100 XP",
        icon: "💯",
    },
    BadgeDefinition {
        badge_type: BadgeType::Streak3,
        name: "On Fire",
        description: "3-day streak",
        icon: "🔥",
    },
    BadgeDefinition {
        badge_type: BadgeType::Task10,
        name: "Task Master",
        description: "Complete 10 tasks",
        icon: "⚡",
    },
    BadgeDefinition {
        badge_type: BadgeType::SpeedRunner,
        name: "Speed Runner",
        description: "Finish task faster than estimate",
        icon: "🏃",
    },
];

/// An earned badge as stored on the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeRecord {
    pub badge_type: BadgeType,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned_at: i64,
}

impl BadgeRecord {
    pub fn earned(badge_type: BadgeType, now: DateTime<Utc>) -> Self {
        let def = badge_type.definition();
        Self {
            badge_type,
            name: def.name.to_string(),
            description: def.description.to_string(),
            icon: def.icon.to_string(),
            earned_at: now.timestamp(),
        }
    }
}

/// Field-level write against a user's state.
///
/// `None` leaves a field untouched; `badges_added` is appended idempotently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStateUpdate {
    pub xp: Option<u64>,
    pub level: Option<u32>,
    pub streak: Option<u32>,
    /// `Some(None)` clears the date
    pub streak_last_date: Option<Option<NaiveDate>>,
    pub mascot: Option<String>,
    pub badges_added: Vec<BadgeRecord>,
}

impl UserStateUpdate {
    /// The writes needed to turn `before` into `after`.
    pub fn diff(before: &UserState, after: &UserState) -> Self {
        Self {
            xp: (before.xp != after.xp).then_some(after.xp),
            level: (before.level != after.level).then_some(after.level),
            streak: (before.streak != after.streak).then_some(after.streak),
            streak_last_date: (before.streak_last_date != after.streak_last_date)
                .then_some(after.streak_last_date),
            mascot: (before.mascot != after.mascot).then(|| after.mascot.clone()),
            badges_added: after
                .badges
                .iter()
                .filter(|b| !before.has_badge(b.badge_type))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xp.is_none()
            && self.level.is_none()
            && self.streak.is_none()
            && self.streak_last_date.is_none()
            && self.mascot.is_none()
            && self.badges_added.is_empty()
    }

    pub fn apply_to(&self, state: &mut UserState) {
        if let Some(xp) = self.xp {
            state.xp = xp;
        }
        if let Some(level) = self.level {
            state.level = level;
        }
        if let Some(streak) = self.streak {
            state.streak = streak;
        }
        if let Some(date) = self.streak_last_date {
            state.streak_last_date = date;
        }
        if let Some(mascot) = &self.mascot {
            state.mascot = mascot.clone();
        }
        for badge in &self.badges_added {
            if !state.has_badge(badge.badge_type) {
                state.badges.push(badge.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(250), 3);
        for xp in (0..5_000).step_by(37) {
            assert_eq!(level_for_xp(xp) as u64, std::cmp::max(1, xp / 100 + 1));
        }
    }

    #[test]
    fn test_level_titles() {
        assert_eq!(level_title(1), "Beginner");
        assert_eq!(level_title(2), "Beginner");
        assert_eq!(level_title(3), "Apprentice");
        assert_eq!(level_title(10), "Warrior");
        assert_eq!(level_title(20), "Expert");
        assert_eq!(level_title(21), "Master");
    }

    #[test]
    fn test_badge_table_unique() {
        let types: HashSet<_> = BADGE_DEFINITIONS.iter().map(|d| d.badge_type).collect();
        assert_eq!(types.len(), BADGE_DEFINITIONS.len());
        assert_eq!(BadgeType::ZeroInbox.definition().name, "Zero Inbox");
    }

    #[test]
    fn test_badge_serde_names() {
        assert_eq!(serde_json::to_string(&BadgeType::Task10).unwrap(), "\"task_10\"");
        assert_eq!(serde_json::to_string(&BadgeType::Xp100).unwrap(), "\"xp_100\"");
        for def in BADGE_DEFINITIONS.iter() {
            let json = serde_json::to_string(&def.badge_type).unwrap();
            assert_eq!(json, format!("\"{}\"", def.badge_type.as_str()));
            assert_eq!(def.badge_type.as_str().parse::<BadgeType>().unwrap(), def.badge_type);
        }
        assert!("gold_star".parse::<BadgeType>().is_err());
    }

    #[test]
    fn test_grant_badge_idempotent() {
        let mut state = UserState::default();
        let now = Utc::now();
        assert!(state.grant_badge(BadgeType::FirstTask, now).is_some());
        assert!(state.grant_badge(BadgeType::FirstTask, now).is_none());
        assert_eq!(state.badges.len(), 1);
    }

    #[test]
    fn test_update_diff_and_apply() {
        let before = UserState::default();
        let mut after = before.clone();
        after.xp = 120;
        after.level = 2;
        after.grant_badge(BadgeType::Xp100, Utc::now());

        let update = UserStateUpdate::diff(&before, &after);
        assert_eq!(update.xp, Some(120));
        assert_eq!(update.streak, None);
        assert_eq!(update.badges_added.len(), 1);

        let mut replay = before.clone();
        update.apply_to(&mut replay);
        update.apply_to(&mut replay);
        assert_eq!(replay, after);
        assert!(UserStateUpdate::diff(&after, &after).is_empty());
    }
}
