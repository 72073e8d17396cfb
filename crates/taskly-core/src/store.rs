//! ============================================================================
//! Storage Interfaces - Task, notification, chat and user persistence
//! ============================================================================
//! The gamification collaborators (`UserStateStore`, `TaskHistoryQuery`,
//! `NotificationSink`) live next to the engine. These are the remaining
//! seams the services depend on. `TasklyDb` implements all of them.
//! ============================================================================

use anyhow::Result;
use async_trait::async_trait;

use crate::db::{ChatMessage, UserRecord};
use crate::types::{Notification, Task};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace a task
    async fn put_task(&self, task: &Task) -> Result<()>;

    async fn find_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// Every task the user owns, in no particular order
    async fn user_tasks(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Returns false if the task did not exist
    async fn remove_task(&self, user_id: &str, task_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Newest first, at most `limit`
    async fn recent_notifications(&self, user_id: &str, limit: usize) -> Result<Vec<Notification>>;

    async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<bool>;

    /// Returns how many were unread
    async fn mark_all_read(&self, user_id: &str) -> Result<usize>;

    async fn unread_count(&self, user_id: &str) -> Result<usize>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn append_message(&self, message: &ChatMessage) -> Result<()>;

    /// The last `limit` messages, oldest first, optionally for one session
    async fn recent_messages(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>>;
}
