//! ============================================================================
//! Core Types for Taskly
//! ============================================================================
//! Tasks, subtasks, notifications and the error enum. Records are stored as
//! JSON, so every field added after the first release carries a serde default
//! and older records load without migration.
//! ============================================================================

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::gamification::parse_due_date;
use crate::persona::{PersonaId, PersonaStamp};

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Parse a priority, treating anything unrecognised as medium.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Sort rank, high first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = TasklyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(TasklyError::InvalidPriority(s.to_string())),
        }
    }
}

/// Stored priorities outside high/medium/low read as medium
fn lenient_priority<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(Priority::parse_lenient).unwrap_or_default())
}

fn default_emoji() -> String {
    "📝".to_string()
}

fn default_estimate() -> u32 {
    30
}

fn default_subtask_estimate() -> u32 {
    15
}

fn default_category() -> String {
    "general".to_string()
}

/// A checklist item inside a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub subtask_id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "default_subtask_estimate")]
    pub estimated_time: u32,
}

impl Subtask {
    pub fn from_draft(draft: SubtaskDraft) -> Self {
        Self {
            subtask_id: format!("st_{}", short_id(8)),
            title: draft.title,
            completed: draft.completed,
            estimated_time: draft.estimated_time.unwrap_or_else(default_subtask_estimate),
        }
    }
}

/// Subtask as supplied by a caller or an AI breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtaskDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub estimated_time: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

impl SubtaskDraft {
    pub fn new(title: impl Into<String>, estimated_time: u32) -> Self {
        Self {
            title: title.into(),
            estimated_time: Some(estimated_time),
            completed: false,
        }
    }
}

/// A user's task.
///
/// The persona stamp is written once at creation and never recomputed.
/// `xp_earned` stays 0 until the first completion and is never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_emoji")]
    pub emoji: String,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    /// Raw due date as supplied (RFC 3339 expected)
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default = "default_estimate")]
    pub estimated_time: u32,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub xp_earned: u64,
    #[serde(default)]
    pub persona: PersonaStamp,
    pub created_at: i64,
}

impl Task {
    /// Build a new, incomplete task for `user_id`.
    pub fn new(user_id: &str, input: NewTask, persona: PersonaStamp, now: DateTime<Utc>) -> Self {
        Self {
            task_id: format!("task_{}", short_id(12)),
            user_id: user_id.to_string(),
            title: input.title,
            description: input.description,
            emoji: input.emoji.unwrap_or_else(default_emoji),
            priority: input
                .priority
                .as_deref()
                .map(Priority::parse_lenient)
                .unwrap_or_default(),
            due_date: input.due_date,
            estimated_time: input.estimated_time.unwrap_or_else(default_estimate),
            category: input.category.unwrap_or_else(default_category),
            tags: input.tags,
            subtasks: input.subtasks.into_iter().map(Subtask::from_draft).collect(),
            completed: false,
            completed_at: None,
            xp_earned: 0,
            persona,
            created_at: now.timestamp(),
        }
    }

    pub fn persona_id(&self) -> PersonaId {
        self.persona.persona_id
    }

    /// Whether this task has already paid out XP at some point.
    pub fn has_earned_xp(&self) -> bool {
        self.xp_earned > 0
    }

    /// Parsed due date, if present and well-formed
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_date.as_deref().and_then(parse_due_date)
    }

    /// Apply every edit except the completion flag, which goes through the
    /// completion transaction.
    pub fn apply_edits(&mut self, update: &TaskUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(emoji) = &update.emoji {
            self.emoji = emoji.clone();
        }
        if let Some(priority) = &update.priority {
            self.priority = Priority::parse_lenient(priority);
        }
        if let Some(due_date) = &update.due_date {
            self.due_date = Some(due_date.clone());
        }
        if let Some(estimated_time) = update.estimated_time {
            self.estimated_time = estimated_time;
        }
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(subtasks) = &update.subtasks {
            self.subtasks = subtasks.iter().cloned().map(Subtask::from_draft).collect();
        }
    }

    /// Whether the task belongs in a listing filter at `now`
    pub fn matches(&self, filter: TaskFilter, now: DateTime<Utc>) -> bool {
        match filter {
            TaskFilter::All => true,
            TaskFilter::Completed => self.completed,
            TaskFilter::Active => !self.completed,
            TaskFilter::Today => match &self.due_date {
                None => !self.completed,
                Some(_) => self
                    .due_at()
                    .map(|due| due.date_naive() == now.date_naive())
                    .unwrap_or(false),
            },
            TaskFilter::Week => self
                .due_at()
                .map(|due| due <= now + Duration::days(7))
                .unwrap_or(false),
        }
    }

    /// Whether the task was completed on the same UTC day as `day`
    pub fn completed_on(&self, day: chrono::NaiveDate) -> bool {
        self.completed
            && self
                .completed_at
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .map(|at| at.date_naive() == day)
                .unwrap_or(false)
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskDraft>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Partial task update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub emoji: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub estimated_time: Option<u32>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub subtasks: Option<Vec<SubtaskDraft>>,
    pub completed: Option<bool>,
}

impl TaskUpdate {
    pub fn complete() -> Self {
        Self {
            completed: Some(true),
            ..Default::default()
        }
    }

    pub fn reopen() -> Self {
        Self {
            completed: Some(false),
            ..Default::default()
        }
    }
}

/// Task listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    /// Due today, or undated and still open
    Today,
    /// Due within the next seven days (overdue included)
    Week,
    Completed,
    Active,
}

impl std::str::FromStr for TaskFilter {
    type Err = TasklyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "today" => Ok(TaskFilter::Today),
            "week" => Ok(TaskFilter::Week),
            "completed" | "done" => Ok(TaskFilter::Completed),
            "active" | "open" => Ok(TaskFilter::Active),
            _ => Err(TasklyError::InvalidFilter(s.to_string())),
        }
    }
}

/// Kind of in-app notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Achievement,
    Badge,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Achievement => "achievement",
            NotificationKind::Badge => "badge",
        }
    }
}

/// A stored in-app notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Mascot used to style the notification
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: i64,
}

impl Notification {
    pub fn new(
        user_id: &str,
        kind: NotificationKind,
        title: String,
        message: String,
        character: String,
    ) -> Self {
        Self {
            notification_id: format!("notif_{}", short_id(12)),
            user_id: user_id.to_string(),
            kind,
            title,
            message,
            character,
            read: false,
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Error types for Taskly
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TasklyError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    #[error("Unknown badge type: {0}")]
    UnknownBadge(String),

    #[error("Invalid priority '{0}'. Valid values: high, medium, low")]
    InvalidPriority(String),

    #[error("Invalid filter '{0}'. Valid values: all, today, week, completed, active")]
    InvalidFilter(String),
}

/// First `len` hex characters of a fresh v4 UUID
pub(crate) fn short_id(len: usize) -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(len);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task_at(now: DateTime<Utc>) -> Task {
        Task::new("user_1", NewTask::titled("Something"), PersonaStamp::default(), now)
    }

    #[test]
    fn test_stored_task_with_unknown_priority_loads_as_medium() {
        let mut value = serde_json::to_value(task_at(Utc::now())).unwrap();
        value["priority"] = serde_json::json!("urgent");
        let task: Task = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(task.priority, Priority::Medium);

        value["priority"] = serde_json::json!("HIGH");
        let task: Task = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(task.priority, Priority::High);

        value["priority"] = serde_json::Value::Null;
        let task: Task = serde_json::from_value(value).unwrap();
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_priority_parse_lenient() {
        assert_eq!(Priority::parse_lenient("HIGH"), Priority::High);
        assert_eq!(Priority::parse_lenient("low"), Priority::Low);
        assert_eq!(Priority::parse_lenient("urgent"), Priority::Medium);
        assert_eq!(Priority::parse_lenient(""), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_new_task_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut input = NewTask::titled("Plan trip");
        input.subtasks = vec![SubtaskDraft {
            title: "Book hotel".into(),
            estimated_time: None,
            completed: false,
        }];
        let task = Task::new("user_1", input, PersonaStamp::default(), now);

        assert!(task.task_id.starts_with("task_"));
        assert_eq!(task.task_id.len(), 17);
        assert_eq!(task.emoji, "📝");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.estimated_time, 30);
        assert_eq!(task.category, "general");
        assert_eq!(task.subtasks[0].estimated_time, 15);
        assert!(task.subtasks[0].subtask_id.starts_with("st_"));
        assert!(!task.completed);
        assert_eq!(task.xp_earned, 0);
        assert_eq!(task.created_at, now.timestamp());
    }

    #[test]
    fn test_old_record_loads_with_defaults() {
        let json = r#"{"task_id":"task_abc","user_id":"u","title":"Old","created_at":0}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.persona.persona_id, PersonaId::Life);
        assert_eq!(task.estimated_time, 30);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn test_apply_edits_leaves_persona_and_completion() {
        let now = Utc::now();
        let mut task = task_at(now);
        let update = TaskUpdate {
            title: Some("Run a marathon".into()),
            priority: Some("high".into()),
            completed: Some(true),
            ..Default::default()
        };
        task.apply_edits(&update);
        assert_eq!(task.title, "Run a marathon");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.persona.persona_id, PersonaId::Life);
        assert!(!task.completed);
    }

    #[test]
    fn test_filters() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut undated = task_at(now);
        assert!(undated.matches(TaskFilter::Today, now));
        assert!(!undated.matches(TaskFilter::Week, now));
        undated.completed = true;
        assert!(!undated.matches(TaskFilter::Today, now));
        assert!(undated.matches(TaskFilter::Completed, now));
        assert!(!undated.matches(TaskFilter::Active, now));

        let mut dated = task_at(now);
        dated.due_date = Some("2025-03-01T18:00:00Z".into());
        assert!(dated.matches(TaskFilter::Today, now));
        assert!(dated.matches(TaskFilter::Week, now));

        dated.due_date = Some("2025-03-20T18:00:00Z".into());
        assert!(!dated.matches(TaskFilter::Today, now));
        assert!(!dated.matches(TaskFilter::Week, now));
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("Today".parse::<TaskFilter>().unwrap(), TaskFilter::Today);
        assert_eq!("done".parse::<TaskFilter>().unwrap(), TaskFilter::Completed);
        assert!("later".parse::<TaskFilter>().is_err());
    }
}
