//! ============================================================================
//! Assist Service - Suggestions, breakdowns, chat and persona coaching
//! ============================================================================
//! Every AI feature degrades instead of failing: a missing API key, a model
//! error or a timeout produces a canned answer. Only storage errors and
//! unknown users/tasks propagate.
//! ============================================================================

use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::cache::SuggestionCache;
use super::client::{clean_json_reply, LlmClient};
use super::types::{
    fallback_breakdown, AiModel, BreakdownReply, ChatReply, CoachReply, TaskSuggestion,
};
use crate::config::TasklyConfig;
use crate::db::{ChatMessage, ChatRole};
use crate::persona::build_coaching_prompt;
use crate::store::{ChatStore, TaskStore, UserDirectory};
use crate::types::{short_id, SubtaskDraft, TasklyError};

/// Pending tasks listed in the chat prompt
const CHAT_TASK_CONTEXT: usize = 5;
/// Stored messages fetched for chat context
const CHAT_HISTORY_FETCH: usize = 10;
/// Messages (three exchanges) replayed into the prompt
const CHAT_HISTORY_TURNS: usize = 6;
/// Characters kept per replayed message
const CHAT_HISTORY_CHARS: usize = 200;
/// Messages returned by `chat_history`
const CHAT_HISTORY_LIMIT: usize = 100;

const SUGGEST_SYSTEM_PROMPT: &str = "You are a task planning AI. Given a task title, suggest:
1. An emoji icon that represents the task
2. Priority: \"high\", \"medium\", or \"low\"
3. Estimated time in minutes
4. A category (school, work, personal, health, creative, chores, social)
5. Up to 3 relevant tags

Respond in EXACTLY this JSON format, nothing else:
{\"emoji\": \"📚\", \"priority\": \"medium\", \"estimated_time\": 30, \"category\": \"school\", \"tags\": [\"homework\", \"reading\"]}";

const BREAKDOWN_SYSTEM_PROMPT: &str = "You are a task breakdown expert. Given a task, create 3-6 clear subtasks with time estimates.
Respond in EXACTLY this JSON format, nothing else:
{\"subtasks\": [{\"title\": \"Research topic\", \"estimated_time\": 30}, {\"title\": \"Create outline\", \"estimated_time\": 15}]}";

const CONNECTION_TROUBLE: &str = "I'm having trouble connecting right now. Please try again! 🤖";

/// Why a model call produced no usable answer
enum CallFailure {
    TimedOut,
    Failed(anyhow::Error),
}

pub struct AssistService {
    llm: Option<Arc<dyn LlmClient>>,
    chats: Arc<dyn ChatStore>,
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserDirectory>,
    cache: SuggestionCache,
    default_model: AiModel,
    suggest_timeout: Duration,
    chat_timeout: Duration,
}

impl AssistService {
    pub fn new(
        llm: Option<Arc<dyn LlmClient>>,
        chats: Arc<dyn ChatStore>,
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserDirectory>,
        config: &TasklyConfig,
    ) -> Self {
        if llm.is_none() {
            info!("No LLM client configured; AI features will use fallbacks");
        }
        Self {
            llm,
            chats,
            tasks,
            users,
            cache: SuggestionCache::new(config.suggest_cache_ttl),
            default_model: config.default_model,
            suggest_timeout: config.suggest_timeout,
            chat_timeout: config.chat_timeout,
        }
    }

    pub fn default_model(&self) -> AiModel {
        self.default_model
    }

    async fn call(
        &self,
        model: AiModel,
        system: &str,
        user: &str,
        limit: Duration,
    ) -> std::result::Result<String, CallFailure> {
        let Some(llm) = &self.llm else {
            return Err(CallFailure::Failed(anyhow!("no LLM client configured")));
        };
        with_timeout(limit, llm.complete(model, system, user)).await
    }

    // ========================================================================
    // Task Metadata
    // ========================================================================

    /// Suggest emoji, priority, estimate, category and tags for a title
    pub async fn suggest(&self, title: &str) -> TaskSuggestion {
        if let Some(hit) = self.cache.get(title).await {
            info!("AI SUGGEST: Cache hit for '{}'", title);
            return hit;
        }

        let reply = self
            .call(
                self.default_model,
                SUGGEST_SYSTEM_PROMPT,
                &format!("Task: {}", title),
                self.suggest_timeout,
            )
            .await;

        match reply {
            Ok(text) => match serde_json::from_str::<TaskSuggestion>(clean_json_reply(&text)) {
                Ok(suggestion) => {
                    self.cache.insert(title, suggestion.clone()).await;
                    suggestion
                }
                Err(e) => {
                    warn!("AI SUGGEST: Unparseable reply for '{}': {}", title, e);
                    TaskSuggestion::fallback()
                }
            },
            Err(CallFailure::TimedOut) => {
                warn!("AI SUGGEST: Timeout for '{}'", title);
                TaskSuggestion::timed_out()
            }
            Err(CallFailure::Failed(e)) => {
                warn!("AI SUGGEST: {}", e);
                TaskSuggestion::fallback()
            }
        }
    }

    /// Split a task into subtasks
    pub async fn breakdown(&self, title: &str) -> Vec<SubtaskDraft> {
        let reply = self
            .call(
                self.default_model,
                BREAKDOWN_SYSTEM_PROMPT,
                &format!("Break down this task into subtasks: {}", title),
                self.suggest_timeout,
            )
            .await;

        let parsed = match reply {
            Ok(text) => serde_json::from_str::<BreakdownReply>(clean_json_reply(&text))
                .map_err(|e| anyhow!("unparseable reply: {}", e)),
            Err(CallFailure::TimedOut) => Err(anyhow!("timed out")),
            Err(CallFailure::Failed(e)) => Err(e),
        };

        match parsed {
            Ok(reply) if !reply.subtasks.is_empty() => reply.subtasks,
            Ok(_) => {
                warn!("AI BREAKDOWN: Empty subtask list for '{}'", title);
                fallback_breakdown()
            }
            Err(e) => {
                warn!("AI BREAKDOWN: {} for '{}'", e, title);
                fallback_breakdown()
            }
        }
    }

    // ========================================================================
    // Chat
    // ========================================================================

    /// General assistant chat. Both turns are stored under `session_id`,
    /// which is generated when absent.
    pub async fn chat(
        &self,
        user_id: &str,
        message: &str,
        model: AiModel,
        session_id: Option<String>,
    ) -> Result<ChatReply> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| TasklyError::UserNotFound(user_id.to_string()))?;
        let session_id =
            session_id.unwrap_or_else(|| format!("chat_{}_{}", user_id, short_id(8)));
        info!("AI CHAT: Using model={} -> {}", model, model.provider_model());

        let pending: Vec<String> = self
            .tasks
            .user_tasks(user_id)
            .await?
            .into_iter()
            .filter(|t| !t.completed)
            .take(CHAT_TASK_CONTEXT)
            .map(|t| format!("- {} ({})", t.title, t.priority))
            .collect();
        let task_context = if pending.is_empty() {
            String::new()
        } else {
            format!("\n\nUser's pending tasks:\n{}", pending.join("\n"))
        };

        let history = self
            .chats
            .recent_messages(user_id, Some(session_id.as_str()), CHAT_HISTORY_FETCH)
            .await?;
        let history_text = format_history(&history);

        let system = format!(
            "You are Taskly AI, a friendly task management assistant. Be concise, helpful, encouraging. Use emojis occasionally.\n\n\
             User: {} | Level {} | {} XP | {}-day streak{}{}",
            user.name, user.state.level, user.state.xp, user.state.streak, task_context, history_text
        );

        self.chats
            .append_message(&ChatMessage::new(user_id, &session_id, ChatRole::User, message, model.as_str()))
            .await?;

        let response = match self.call(model, &system, message, self.chat_timeout).await {
            Ok(text) => {
                info!("AI CHAT: Got response from {} ({} chars)", model, text.len());
                text
            }
            Err(CallFailure::TimedOut) => {
                warn!("AI CHAT: Timeout for model {}", model);
                format!(
                    "I'm taking too long to respond. Please try again! The {} might be busy. 🤖",
                    model.display_name()
                )
            }
            Err(CallFailure::Failed(e)) => {
                warn!("AI CHAT error ({}): {}", model, e);
                CONNECTION_TROUBLE.to_string()
            }
        };

        self.chats
            .append_message(&ChatMessage::new(
                user_id,
                &session_id,
                ChatRole::Assistant,
                response.clone(),
                model.as_str(),
            ))
            .await?;

        Ok(ChatReply {
            response,
            session_id,
            ai_model: model,
        })
    }

    /// Coaching reply from the persona stamped on the task
    pub async fn coach(
        &self,
        user_id: &str,
        task_id: &str,
        message: &str,
        session_id: Option<String>,
    ) -> Result<CoachReply> {
        let task = self
            .tasks
            .find_task(user_id, task_id)
            .await?
            .ok_or_else(|| TasklyError::TaskNotFound(task_id.to_string()))?;
        let stamp = &task.persona;
        let session_id = session_id.unwrap_or_else(|| format!("persona_{}", task_id));
        let model = self.default_model;

        let system = build_coaching_prompt(stamp.persona_id.as_str(), &task.title);

        self.chats
            .append_message(&ChatMessage::new(user_id, &session_id, ChatRole::User, message, model.as_str()))
            .await?;

        let response = match self.call(model, &system, message, self.chat_timeout).await {
            Ok(text) => text,
            Err(CallFailure::TimedOut) => {
                warn!("AI COACH: Timeout for task {}", task_id);
                format!(
                    "{} I'm taking too long to respond. Please try again!",
                    stamp.persona_emoji
                )
            }
            Err(CallFailure::Failed(e)) => {
                warn!("AI COACH error for task {}: {}", task_id, e);
                format!("{} {}", stamp.persona_emoji, CONNECTION_TROUBLE)
            }
        };

        self.chats
            .append_message(&ChatMessage::new(
                user_id,
                &session_id,
                ChatRole::Assistant,
                response.clone(),
                model.as_str(),
            ))
            .await?;

        Ok(CoachReply {
            response,
            session_id,
            persona_id: stamp.persona_id,
            persona_name: stamp.persona_name.clone(),
            persona_emoji: stamp.persona_emoji.clone(),
        })
    }

    /// Stored messages, oldest first
    pub async fn chat_history(&self, user_id: &str, session_id: Option<&str>) -> Result<Vec<ChatMessage>> {
        self.chats
            .recent_messages(user_id, session_id, CHAT_HISTORY_LIMIT)
            .await
    }
}

async fn with_timeout<F>(limit: Duration, call: F) -> std::result::Result<String, CallFailure>
where
    F: Future<Output = Result<String>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(CallFailure::Failed(e)),
        Err(_) => Err(CallFailure::TimedOut),
    }
}

/// "Recent conversation" prompt block from the last few stored messages
fn format_history(history: &[ChatMessage]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let start = history.len().saturating_sub(CHAT_HISTORY_TURNS);
    let lines: Vec<String> = history[start..]
        .iter()
        .map(|m| {
            let speaker = match m.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "AI",
            };
            let content: String = m.content.chars().take(CHAT_HISTORY_CHARS).collect();
            format!("{}: {}", speaker, content)
        })
        .collect();
    format!("\n\nRecent conversation:\n{}", lines.join("\n"))
}
