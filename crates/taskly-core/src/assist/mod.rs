//! ============================================================================
//! Assist - LLM-backed helpers around tasks
//! ============================================================================
//! - Suggest: emoji, priority, estimate, category and tags for a title
//! - Breakdown: subtasks for a title
//! - Chat: general assistant with the user's progress as context
//! - Coach: persona-flavored advice about one task
//! ============================================================================

mod cache;
mod client;
mod service;
mod types;

pub use cache::{title_key, SuggestionCache};
pub use client::{clean_json_reply, ChatCompletionsClient, LlmClient};
pub use service::AssistService;
pub use types::{fallback_breakdown, AiModel, ChatReply, CoachReply, TaskSuggestion};
