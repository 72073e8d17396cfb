// ============================================================================
// TasklyDb - Embedded Database (redb)
// ============================================================================
// Persistent local storage for users, tasks, notifications and chat.
// Default path: ~/.taskly/taskly.redb (override via TASKLY_DB_PATH env var)
//
// Values are JSON so records written before a field existed still load with
// that field's serde default. Keys are "<table>:<user_id>:<id>" so a user's
// rows are one contiguous range.
// ============================================================================

pub mod types;

pub use types::{ChatMessage, ChatRole, DbStats, UserExport, UserRecord};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition, TableHandle, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::gamification::{
    NotificationSink, TaskHistory, TaskHistoryQuery, UserState, UserStateStore, UserStateUpdate,
};
use crate::store::{ChatStore, NotificationStore, TaskStore, UserDirectory};
use crate::types::{Notification, NotificationKind, Task, TasklyError};

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

// Table definitions
const USERS: JsonTable = TableDefinition::new("users");
const TASKS: JsonTable = TableDefinition::new("tasks");
const NOTIFICATIONS: JsonTable = TableDefinition::new("notifications");
const CHAT_MESSAGES: JsonTable = TableDefinition::new("chat_messages");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Cap on a single notification listing
pub const MAX_NOTIFICATIONS_LISTED: usize = 50;

fn user_key(user_id: &str) -> String {
    format!("users:{}", user_id)
}

fn task_key(user_id: &str, task_id: &str) -> String {
    format!("tasks:{}:{}", user_id, task_id)
}

/// First key after every key starting with `prefix` (which ends in ':')
fn prefix_end(prefix: &str) -> String {
    format!("{};", prefix.trim_end_matches(':'))
}

fn encode<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize {}: {}", what, e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| anyhow!("Failed to deserialize {}: {}", what, e))
}

/// Bump and return the named counter inside an open write transaction
fn next_seq(txn: &WriteTransaction, name: &str) -> Result<u64> {
    let mut table = txn
        .open_table(SEQUENCES)
        .map_err(|e| anyhow!("Failed to open sequences table: {}", e))?;
    let next = table
        .get(name)
        .map_err(|e| anyhow!("Failed to read sequence {}: {}", name, e))?
        .map(|v| v.value())
        .unwrap_or(0)
        + 1;
    table
        .insert(name, next)
        .map_err(|e| anyhow!("Failed to bump sequence {}: {}", name, e))?;
    Ok(next)
}

/// Embedded database for Taskly
pub struct TasklyDb {
    db: Database,
    path: PathBuf,
}

impl TasklyDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses TASKLY_DB_PATH env var or ~/.taskly/taskly.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("TASKLY_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let taskly_dir = home.join(".taskly");
            std::fs::create_dir_all(&taskly_dir)
                .map_err(|e| anyhow!("Failed to create .taskly directory: {}", e))?;
            taskly_dir.join("taskly.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path).map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            for table in [USERS, TASKS, NOTIFICATIONS, CHAT_MESSAGES] {
                let _ = write_txn
                    .open_table(table)
                    .map_err(|e| anyhow!("Failed to create {} table: {}", table.name(), e))?;
            }
            let _ = write_txn
                .open_table(SEQUENCES)
                .map_err(|e| anyhow!("Failed to create sequences table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        info!("Database ready");

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Generic JSON Access
    // ========================================================================

    fn put_json<T: Serialize>(&self, def: JsonTable, key: &str, value: &T) -> Result<()> {
        let bytes = encode(value, def.name())?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(def)
                .map_err(|e| anyhow!("Failed to open {} table: {}", def.name(), e))?;
            table.insert(key, bytes.as_slice())
                .map_err(|e| anyhow!("Failed to insert into {}: {}", def.name(), e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, def: JsonTable, key: &str) -> Result<Option<T>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(def)
            .map_err(|e| anyhow!("Failed to open {} table: {}", def.name(), e))?;

        match table.get(key).map_err(|e| anyhow!("Failed to get from {}: {}", def.name(), e))? {
            Some(value) => Ok(Some(decode(value.value(), def.name())?)),
            None => Ok(None),
        }
    }

    /// Every value whose key starts with `prefix`, in key order
    fn scan_json<T: DeserializeOwned>(&self, def: JsonTable, prefix: &str) -> Result<Vec<T>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(def)
            .map_err(|e| anyhow!("Failed to open {} table: {}", def.name(), e))?;

        let end = prefix_end(prefix);
        let mut results = Vec::new();
        let iter = table.range::<&str>(prefix..end.as_str())
            .map_err(|e| anyhow!("Failed to iterate {}: {}", def.name(), e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode(value.value(), def.name())?);
        }
        Ok(results)
    }

    fn remove(&self, def: JsonTable, key: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(def)
                .map_err(|e| anyhow!("Failed to open {} table: {}", def.name(), e))?;
            removed = table.remove(key)
                .map_err(|e| anyhow!("Failed to remove from {}: {}", def.name(), e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(removed)
    }

    /// Read-modify-write one record in a single transaction.
    /// Returns the updated value, or None if the key was absent.
    fn modify<T, F>(&self, def: JsonTable, key: &str, f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let updated = {
            let mut table = write_txn.open_table(def)
                .map_err(|e| anyhow!("Failed to open {} table: {}", def.name(), e))?;
            let existing = table.get(key)
                .map_err(|e| anyhow!("Failed to get from {}: {}", def.name(), e))?
                .map(|v| v.value().to_vec());

            match existing {
                Some(bytes) => {
                    let mut value: T = decode(&bytes, def.name())?;
                    f(&mut value);
                    let bytes = encode(&value, def.name())?;
                    table.insert(key, bytes.as_slice())
                        .map_err(|e| anyhow!("Failed to insert into {}: {}", def.name(), e))?;
                    Some(value)
                }
                None => None,
            }
        };
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(updated)
    }

    /// Append under a fresh sequence number so key order is insertion order
    fn append<T: Serialize>(&self, def: JsonTable, user_id: &str, value: &T) -> Result<()> {
        let bytes = encode(value, def.name())?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let seq = next_seq(&write_txn, def.name())?;
            let key = format!("{}:{}:{:020}", def.name(), user_id, seq);
            let mut table = write_txn.open_table(def)
                .map_err(|e| anyhow!("Failed to open {} table: {}", def.name(), e))?;
            table.insert(key.as_str(), bytes.as_slice())
                .map_err(|e| anyhow!("Failed to insert into {}: {}", def.name(), e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a named user with fresh gamification state
    pub fn create_user(&self, name: &str) -> Result<UserRecord> {
        let user = UserRecord::new(name, Utc::now());
        self.store_user(&user)?;
        info!("Created user {} ({})", user.user_id, user.name);
        Ok(user)
    }

    pub fn create_guest(&self) -> Result<UserRecord> {
        let user = UserRecord::guest(Utc::now());
        self.store_user(&user)?;
        info!("Created guest user {}", user.user_id);
        Ok(user)
    }

    pub fn store_user(&self, user: &UserRecord) -> Result<()> {
        self.put_json(USERS, &user_key(&user.user_id), user)?;
        debug!("Stored user: {}", user.user_id);
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.get_json(USERS, &user_key(user_id))
    }

    /// Like `get_user` but a missing user is a `UserNotFound` error
    pub fn require_user(&self, user_id: &str) -> Result<UserRecord> {
        self.get_user(user_id)?
            .ok_or_else(|| TasklyError::UserNotFound(user_id.to_string()).into())
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.scan_json(USERS, "users:")
    }

    /// Apply a gamification update atomically
    pub fn update_user_state(&self, user_id: &str, update: &UserStateUpdate) -> Result<()> {
        self.modify::<UserRecord, _>(USERS, &user_key(user_id), |user| {
            update.apply_to(&mut user.state)
        })?
        .ok_or_else(|| TasklyError::UserNotFound(user_id.to_string()))?;
        debug!("Updated state for user {}: {:?}", user_id, update);
        Ok(())
    }

    /// Change display name and/or mascot
    pub fn update_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        mascot: Option<&str>,
    ) -> Result<UserRecord> {
        let user = self
            .modify::<UserRecord, _>(USERS, &user_key(user_id), |user| {
                if let Some(name) = name {
                    user.name = name.to_string();
                }
                if let Some(mascot) = mascot {
                    user.state.mascot = mascot.to_string();
                }
            })?
            .ok_or_else(|| TasklyError::UserNotFound(user_id.to_string()))?;
        info!("Updated profile for user {}", user_id);
        Ok(user)
    }

    // ========================================================================
    // Task Operations
    // ========================================================================

    pub fn store_task(&self, task: &Task) -> Result<()> {
        self.put_json(TASKS, &task_key(&task.user_id, &task.task_id), task)?;
        debug!("Stored task: {}", task.task_id);
        Ok(())
    }

    pub fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.get_json(TASKS, &task_key(user_id, task_id))
    }

    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        self.scan_json(TASKS, &format!("tasks:{}:", user_id))
    }

    pub fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        let removed = self.remove(TASKS, &task_key(user_id, task_id))?;
        if removed {
            debug!("Deleted task: {}", task_id);
        }
        Ok(removed)
    }

    // ========================================================================
    // Notification Operations
    // ========================================================================

    pub fn store_notification(&self, notification: &Notification) -> Result<()> {
        self.append(NOTIFICATIONS, &notification.user_id, notification)?;
        debug!(
            "Stored {} notification for {}: {}",
            notification.kind.as_str(),
            notification.user_id,
            notification.title
        );
        Ok(())
    }

    fn user_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.scan_json(NOTIFICATIONS, &format!("notifications:{}:", user_id))
    }

    /// Newest first, at most `limit` (capped at 50)
    pub fn list_notifications(&self, user_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let mut all = self.user_notifications(user_id)?;
        all.reverse();
        all.truncate(limit.min(MAX_NOTIFICATIONS_LISTED));
        Ok(all)
    }

    /// Set `read` on every notification of `user_id` matching `pred`.
    /// Returns how many changed.
    fn mark_notifications<F>(&self, user_id: &str, pred: F) -> Result<usize>
    where
        F: Fn(&Notification) -> bool,
    {
        let prefix = format!("notifications:{}:", user_id);
        let end = prefix_end(&prefix);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let changed = {
            let mut table = write_txn.open_table(NOTIFICATIONS)
                .map_err(|e| anyhow!("Failed to open notifications table: {}", e))?;

            let mut pending = Vec::new();
            for entry in table.range::<&str>(prefix.as_str()..end.as_str())
                .map_err(|e| anyhow!("Failed to iterate notifications: {}", e))?
            {
                let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
                let notification: Notification = decode(value.value(), "notification")?;
                if !notification.read && pred(&notification) {
                    pending.push((key.value().to_string(), notification));
                }
            }

            for (key, mut notification) in pending.iter().cloned() {
                notification.read = true;
                let bytes = encode(&notification, "notification")?;
                table.insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| anyhow!("Failed to update notification: {}", e))?;
            }
            pending.len()
        };
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(changed)
    }

    pub fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<bool> {
        let changed = self.mark_notifications(user_id, |n| n.notification_id == notification_id)?;
        Ok(changed > 0)
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        let changed = self.mark_notifications(user_id, |_| true)?;
        info!("Marked {} notifications read for {}", changed, user_id);
        Ok(changed)
    }

    pub fn unread_notification_count(&self, user_id: &str) -> Result<usize> {
        let all = self.user_notifications(user_id)?;
        Ok(all.iter().filter(|n| !n.read).count())
    }

    // ========================================================================
    // Chat Operations
    // ========================================================================

    pub fn store_chat_message(&self, message: &ChatMessage) -> Result<()> {
        self.append(CHAT_MESSAGES, &message.user_id, message)?;
        debug!("Stored chat message {} ({:?})", message.message_id, message.role);
        Ok(())
    }

    /// The last `limit` messages, oldest first
    pub fn list_chat_messages(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let all: Vec<ChatMessage> =
            self.scan_json(CHAT_MESSAGES, &format!("chat_messages:{}:", user_id))?;
        let mut matching: Vec<ChatMessage> = all
            .into_iter()
            .filter(|m| session_id.map_or(true, |s| m.session_id == s))
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.split_off(skip))
    }

    // ========================================================================
    // Statistics & Export
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let users = self.list_users()?;
        let tasks: Vec<Task> = self.scan_json(TASKS, "tasks:")?;
        let notifications: Vec<Notification> = self.scan_json(NOTIFICATIONS, "notifications:")?;
        let messages: Vec<ChatMessage> = self.scan_json(CHAT_MESSAGES, "chat_messages:")?;

        Ok(DbStats {
            total_users: users.len(),
            total_tasks: tasks.len(),
            completed_tasks: tasks.iter().filter(|t| t.completed).count(),
            total_notifications: notifications.len(),
            unread_notifications: notifications.iter().filter(|n| !n.read).count(),
            total_chat_messages: messages.len(),
        })
    }

    /// Everything stored for one user
    pub fn export_user(&self, user_id: &str) -> Result<UserExport> {
        Ok(UserExport {
            user: self.require_user(user_id)?,
            tasks: self.list_tasks(user_id)?,
            notifications: self.user_notifications(user_id)?,
            chat_messages: self.list_chat_messages(user_id, None, usize::MAX)?,
        })
    }
}

// ============================================================================
// Collaborator Implementations
// ============================================================================

#[async_trait]
impl UserStateStore for TasklyDb {
    async fn get(&self, user_id: &str) -> Result<UserState> {
        Ok(self.require_user(user_id)?.state)
    }

    async fn set(&self, user_id: &str, update: &UserStateUpdate) -> Result<()> {
        self.update_user_state(user_id, update)
    }
}

#[async_trait]
impl TaskHistoryQuery for TasklyDb {
    async fn count_completed(&self, user_id: &str) -> Result<u64> {
        Ok(self.list_tasks(user_id)?.iter().filter(|t| t.completed).count() as u64)
    }

    async fn count_active(&self, user_id: &str) -> Result<u64> {
        Ok(self.list_tasks(user_id)?.iter().filter(|t| !t.completed).count() as u64)
    }

    async fn most_recent_completed(&self, user_id: &str) -> Result<Option<Task>> {
        Ok(self
            .list_tasks(user_id)?
            .into_iter()
            .filter(|t| t.completed)
            .max_by_key(|t| t.completed_at))
    }

    /// One scan instead of three
    async fn history(&self, user_id: &str) -> Result<TaskHistory> {
        let tasks = self.list_tasks(user_id)?;
        let completed = tasks.iter().filter(|t| t.completed).count() as u64;
        Ok(TaskHistory {
            completed_count: completed,
            active_count: tasks.len() as u64 - completed,
            most_recent_completed: tasks
                .into_iter()
                .filter(|t| t.completed)
                .max_by_key(|t| t.completed_at),
        })
    }
}

#[async_trait]
impl NotificationSink for TasklyDb {
    async fn emit(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        icon_hint: &str,
    ) -> Result<()> {
        let notification = Notification::new(
            user_id,
            kind,
            title.to_string(),
            message.to_string(),
            icon_hint.to_string(),
        );
        self.store_notification(&notification)
    }
}

#[async_trait]
impl TaskStore for TasklyDb {
    async fn put_task(&self, task: &Task) -> Result<()> {
        self.store_task(task)
    }

    async fn find_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.get_task(user_id, task_id)
    }

    async fn user_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        self.list_tasks(user_id)
    }

    async fn remove_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.delete_task(user_id, task_id)
    }
}

#[async_trait]
impl NotificationStore for TasklyDb {
    async fn recent_notifications(&self, user_id: &str, limit: usize) -> Result<Vec<Notification>> {
        self.list_notifications(user_id, limit)
    }

    async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<bool> {
        self.mark_notification_read(user_id, notification_id)
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        self.mark_all_notifications_read(user_id)
    }

    async fn unread_count(&self, user_id: &str) -> Result<usize> {
        self.unread_notification_count(user_id)
    }
}

#[async_trait]
impl ChatStore for TasklyDb {
    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.store_chat_message(message)
    }

    async fn recent_messages(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        self.list_chat_messages(user_id, session_id, limit)
    }
}

#[async_trait]
impl UserDirectory for TasklyDb {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.get_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::BadgeType;
    use crate::persona::PersonaStamp;
    use crate::types::NewTask;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, TasklyDb) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskly.redb");
        let db = TasklyDb::open(Some(path.to_str().unwrap())).unwrap();
        (dir, db)
    }

    fn task_for(user_id: &str, title: &str) -> Task {
        Task::new(user_id, NewTask::titled(title), PersonaStamp::default(), Utc::now())
    }

    #[test]
    fn test_user_roundtrip_and_profile() {
        let (_dir, db) = open_temp();
        let user = UserRecord::new("Ada", Utc::now());
        db.store_user(&user).unwrap();

        let loaded = db.require_user(&user.user_id).unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.state.level, 1);
        assert_eq!(loaded.state.mascot, "owl");

        let updated = db.update_profile(&user.user_id, None, Some("fox")).unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.state.mascot, "fox");

        let err = db.require_user("nobody").unwrap_err();
        assert_eq!(
            err.downcast_ref::<TasklyError>(),
            Some(&TasklyError::UserNotFound("nobody".into()))
        );
    }

    #[test]
    fn test_guest_user() {
        let (_dir, db) = open_temp();
        let guest = db.create_guest().unwrap();
        assert!(db.get_user(&guest.user_id).unwrap().is_some());
        assert!(guest.user_id.starts_with("guest_"));
        assert_eq!(guest.user_id.len(), "guest_".len() + 12);
        assert_eq!(guest.name, "Explorer");
        assert!(guest.is_guest);
    }

    #[test]
    fn test_flat_user_document_loads_with_defaults() {
        let json = r#"{"user_id":"user_old","name":"Old","xp":240}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(user.state.xp, 240);
        assert_eq!(user.state.level, 1);
        assert!(user.state.badges.is_empty());
        assert_eq!(user.state.mascot, "owl");
    }

    #[test]
    fn test_update_user_state_is_field_level() {
        let (_dir, db) = open_temp();
        let user = UserRecord::new("Ada", Utc::now());
        db.store_user(&user).unwrap();

        let mut after = user.state.clone();
        after.xp = 120;
        after.level = 2;
        after.grant_badge(BadgeType::Xp100, Utc::now());
        let update = UserStateUpdate::diff(&user.state, &after);
        db.update_user_state(&user.user_id, &update).unwrap();
        db.update_user_state(&user.user_id, &update).unwrap();

        let loaded = db.require_user(&user.user_id).unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.state.xp, 120);
        assert_eq!(loaded.state.badges.len(), 1);

        assert!(db.update_user_state("ghost", &update).is_err());
    }

    #[test]
    fn test_tasks_are_scoped_per_user() {
        let (_dir, db) = open_temp();
        let a = task_for("user_a", "one");
        let b = task_for("user_a", "two");
        let other = task_for("user_ab", "not mine");
        for t in [&a, &b, &other] {
            db.store_task(t).unwrap();
        }

        assert_eq!(db.list_tasks("user_a").unwrap().len(), 2);
        assert_eq!(db.list_tasks("user_ab").unwrap().len(), 1);
        assert!(db.get_task("user_ab", &a.task_id).unwrap().is_none());

        assert!(db.delete_task("user_a", &a.task_id).unwrap());
        assert!(!db.delete_task("user_a", &a.task_id).unwrap());
        assert_eq!(db.list_tasks("user_a").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_stored_priority_does_not_break_listing() {
        let (_dir, db) = open_temp();
        let task = task_for("u", "legacy");
        let mut value = serde_json::to_value(&task).unwrap();
        value["priority"] = serde_json::json!("urgent");
        db.put_json(TASKS, &task_key("u", &task.task_id), &value).unwrap();
        db.store_task(&task_for("u", "fresh")).unwrap();

        let tasks = db.list_tasks("u").unwrap();
        assert_eq!(tasks.len(), 2);
        let legacy = tasks.iter().find(|t| t.task_id == task.task_id).unwrap();
        assert_eq!(legacy.priority, crate::types::Priority::Medium);
        assert_eq!(db.history("u").await.unwrap().active_count, 2);
    }

    #[tokio::test]
    async fn test_history_counts() {
        let (_dir, db) = open_temp();
        let mut early = task_for("u", "early");
        early.completed = true;
        early.completed_at = Some(100);
        early.estimated_time = 0;
        let mut late = task_for("u", "late");
        late.completed = true;
        late.completed_at = Some(200);
        let open = task_for("u", "open");
        for t in [&early, &late, &open] {
            db.store_task(t).unwrap();
        }

        let history = db.history("u").await.unwrap();
        assert_eq!(history.completed_count, 2);
        assert_eq!(history.active_count, 1);
        assert_eq!(history.most_recent_completed.unwrap().task_id, late.task_id);
        assert_eq!(db.count_completed("u").await.unwrap(), 2);
        assert_eq!(db.count_active("u").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_notifications_newest_first_and_read_flags() {
        let (_dir, db) = open_temp();
        for i in 0..55 {
            db.emit("u", NotificationKind::Achievement, &format!("n{}", i), "m", "owl")
                .await
                .unwrap();
        }
        db.emit("other", NotificationKind::Badge, "x", "m", "owl").await.unwrap();

        let recent = db.list_notifications("u", 50).unwrap();
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].title, "n54");
        assert_eq!(recent[49].title, "n5");
        assert_eq!(db.unread_notification_count("u").unwrap(), 55);

        assert!(db.mark_notification_read("u", &recent[0].notification_id).unwrap());
        assert!(!db.mark_notification_read("u", &recent[0].notification_id).unwrap());
        assert_eq!(db.unread_notification_count("u").unwrap(), 54);

        assert_eq!(db.mark_all_notifications_read("u").unwrap(), 54);
        assert_eq!(db.unread_notification_count("u").unwrap(), 0);
        assert_eq!(db.unread_notification_count("other").unwrap(), 1);
    }

    #[test]
    fn test_chat_history_order_and_session_filter() {
        let (_dir, db) = open_temp();
        for i in 0..4 {
            let session = if i % 2 == 0 { "s1" } else { "s2" };
            db.store_chat_message(&ChatMessage::new("u", session, ChatRole::User, format!("m{}", i), "claude"))
                .unwrap();
        }

        let all = db.list_chat_messages("u", None, 100).unwrap();
        let contents: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3"]);

        let s1 = db.list_chat_messages("u", Some("s1"), 100).unwrap();
        assert_eq!(s1.len(), 2);

        let last = db.list_chat_messages("u", None, 2).unwrap();
        assert_eq!(last[0].content, "m2");
        assert_eq!(last[1].content, "m3");
    }

    #[test]
    fn test_stats_and_export() {
        let (_dir, db) = open_temp();
        let user = UserRecord::new("Ada", Utc::now());
        db.store_user(&user).unwrap();
        let mut done = task_for(&user.user_id, "done");
        done.completed = true;
        db.store_task(&done).unwrap();
        db.store_task(&task_for(&user.user_id, "open")).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.completed_tasks, 1);

        let export = db.export_user(&user.user_id).unwrap();
        assert_eq!(export.tasks.len(), 2);
        assert_eq!(export.user.name, "Ada");
    }
}
