//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gamification::UserState;
use crate::types::{short_id, Notification, Task};

fn default_name() -> String {
    "Friend".to_string()
}

/// A user profile with its gamification state.
/// The state is flattened so the stored JSON reads as one flat user document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub is_guest: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub state: UserState,
}

impl UserRecord {
    pub fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: format!("user_{}", short_id(12)),
            name: name.to_string(),
            is_guest: false,
            created_at: now.timestamp(),
            state: UserState::default(),
        }
    }

    /// Guest account named "Explorer"
    pub fn guest(now: DateTime<Utc>) -> Self {
        Self {
            user_id: format!("guest_{}", short_id(12)),
            name: "Explorer".to_string(),
            is_guest: true,
            created_at: now.timestamp(),
            state: UserState::default(),
        }
    }
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Single stored chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub user_id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Model key the message was exchanged with ("claude", "gpt4o", ...)
    #[serde(default)]
    pub ai_model: String,
    pub created_at: i64,
}

impl ChatMessage {
    pub fn new(
        user_id: &str,
        session_id: &str,
        role: ChatRole,
        content: impl Into<String>,
        ai_model: &str,
    ) -> Self {
        Self {
            message_id: format!("msg_{}", short_id(12)),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.into(),
            ai_model: ai_model.to_string(),
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub total_users: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_notifications: usize,
    pub unread_notifications: usize,
    pub total_chat_messages: usize,
}

/// Everything stored for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExport {
    pub user: UserRecord,
    pub tasks: Vec<Task>,
    pub notifications: Vec<Notification>,
    pub chat_messages: Vec<ChatMessage>,
}
