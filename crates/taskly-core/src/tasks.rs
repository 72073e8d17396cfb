//! ============================================================================
//! Task Service - Task lifecycle on top of storage and gamification
//! ============================================================================
//! Creation classifies the task's persona exactly once. Completion runs as
//! one per-user transaction: the task is stored as completed with its XP,
//! then the engine awards that XP, counts the streak day and evaluates
//! badges against a history that already includes the task. If the engine
//! step fails the stored task is restored, so a retry pays out.
//!
//! XP is paid once per task. Reopening keeps `xp_earned` and the user's XP;
//! completing the same task again grants nothing.
//! ============================================================================

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::gamification::{compute_xp, CompletionOutcome, GamificationEngine, GamificationStats};
use crate::persona::{classify, persona, PersonaStamp};
use crate::store::TaskStore;
use crate::types::{NewTask, Task, TaskFilter, TaskUpdate, TasklyError};

/// Result of `update_task`
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdateOutcome {
    pub task: Task,
    /// Present only when this update paid out XP
    pub completion: Option<CompletionOutcome>,
}

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    engine: Arc<GamificationEngine>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, engine: Arc<GamificationEngine>) -> Self {
        Self { tasks, engine }
    }

    pub fn engine(&self) -> &Arc<GamificationEngine> {
        &self.engine
    }

    pub async fn create_task(&self, user_id: &str, input: NewTask) -> Result<Task> {
        self.create_task_at(user_id, input, Utc::now()).await
    }

    pub async fn create_task_at(
        &self,
        user_id: &str,
        input: NewTask,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let persona_id = classify(&input.title, &input.description);
        let stamp = PersonaStamp::from(persona(persona_id));
        let task = Task::new(user_id, input, stamp, now);

        self.tasks.put_task(&task).await?;
        info!(
            "Task {} created for {} with persona: {} ({})",
            task.task_id, user_id, persona_id, task.persona.persona_name
        );
        Ok(task)
    }

    pub async fn get_task(&self, user_id: &str, task_id: &str) -> Result<Task> {
        self.tasks
            .find_task(user_id, task_id)
            .await?
            .ok_or_else(|| TasklyError::TaskNotFound(task_id.to_string()).into())
    }

    /// Tasks matching `filter`, newest first
    pub async fn list_tasks(&self, user_id: &str, filter: TaskFilter) -> Result<Vec<Task>> {
        self.list_tasks_at(user_id, filter, Utc::now()).await
    }

    pub async fn list_tasks_at(
        &self,
        user_id: &str,
        filter: TaskFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .user_tasks(user_id)
            .await?
            .into_iter()
            .filter(|t| t.matches(filter, now))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    pub async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        update: TaskUpdate,
    ) -> Result<TaskUpdateOutcome> {
        self.update_task_at(user_id, task_id, update, Utc::now()).await
    }

    /// Edit a task; a first incomplete -> complete transition pays out.
    pub async fn update_task_at(
        &self,
        user_id: &str,
        task_id: &str,
        update: TaskUpdate,
        now: DateTime<Utc>,
    ) -> Result<TaskUpdateOutcome> {
        let guard = self.engine.lock_user(user_id).await;
        let stored = self.get_task(user_id, task_id).await?;
        let mut task = stored.clone();
        task.apply_edits(&update);

        let mut pays_out = false;
        match update.completed {
            Some(true) if !task.completed => {
                task.completed = true;
                task.completed_at = Some(now.timestamp());
                if !task.has_earned_xp() {
                    // Scored as stored, before this update's edits
                    task.xp_earned = compute_xp(&stored, now);
                    pays_out = true;
                } else {
                    debug!("Task {} already paid {} XP, not awarding again", task_id, task.xp_earned);
                }
            }
            Some(false) if task.completed => {
                task.completed = false;
                task.completed_at = None;
                info!("Task {} reopened (keeps {} XP)", task_id, task.xp_earned);
            }
            _ => {}
        }

        self.tasks.put_task(&task).await?;

        let completion = if pays_out {
            match self.engine.record_completion(&guard, &task, now).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    // The XP never reached the user; put the task back as it was
                    warn!("Completion of {} failed, restoring task: {}", task_id, e);
                    if let Err(restore) = self.tasks.put_task(&stored).await {
                        warn!("Failed to restore task {}: {}", task_id, restore);
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(TaskUpdateOutcome { task, completion })
    }

    pub async fn complete_task(&self, user_id: &str, task_id: &str) -> Result<TaskUpdateOutcome> {
        self.update_task(user_id, task_id, TaskUpdate::complete()).await
    }

    pub async fn reopen_task(&self, user_id: &str, task_id: &str) -> Result<TaskUpdateOutcome> {
        self.update_task(user_id, task_id, TaskUpdate::reopen()).await
    }

    /// Flip one subtask's completed flag
    pub async fn toggle_subtask(&self, user_id: &str, task_id: &str, subtask_id: &str) -> Result<Task> {
        let _guard = self.engine.lock_user(user_id).await;
        let mut task = self.get_task(user_id, task_id).await?;

        let subtask = task
            .subtasks
            .iter_mut()
            .find(|s| s.subtask_id == subtask_id)
            .ok_or_else(|| TasklyError::SubtaskNotFound(subtask_id.to_string()))?;
        subtask.completed = !subtask.completed;
        debug!("Subtask {} of {} now completed={}", subtask_id, task_id, subtask.completed);

        self.tasks.put_task(&task).await?;
        Ok(task)
    }

    pub async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<()> {
        let _guard = self.engine.lock_user(user_id).await;
        if !self.tasks.remove_task(user_id, task_id).await? {
            return Err(TasklyError::TaskNotFound(task_id.to_string()).into());
        }
        info!("Task {} deleted for {}", task_id, user_id);
        Ok(())
    }

    /// Progress summary
    pub async fn stats(&self, user_id: &str) -> Result<GamificationStats> {
        let guard = self.engine.lock_user(user_id).await;
        let state = self.engine.state(&guard).await?;
        let tasks = self.tasks.user_tasks(user_id).await?;
        Ok(GamificationStats::build(&state, &tasks, Utc::now()))
    }
}
