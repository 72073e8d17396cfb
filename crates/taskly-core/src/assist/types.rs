//! ============================================================================
//! Assist Types - Models, suggestions and replies
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::persona::PersonaId;
use crate::types::SubtaskDraft;

/// Selectable chat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiModel {
    #[default]
    Claude,
    Gpt4o,
    Gemini,
}

impl AiModel {
    pub const ALL: [AiModel; 3] = [AiModel::Claude, AiModel::Gpt4o, AiModel::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiModel::Claude => "claude",
            AiModel::Gpt4o => "gpt4o",
            AiModel::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AiModel::Claude => "Claude",
            AiModel::Gpt4o => "GPT-4o",
            AiModel::Gemini => "Gemini",
        }
    }

    /// Model name sent to the provider
    pub fn provider_model(&self) -> &'static str {
        match self {
            AiModel::Claude => "claude-sonnet-4-5-20250929",
            AiModel::Gpt4o => "gpt-4o",
            AiModel::Gemini => "gemini-2.5-flash",
        }
    }

    /// Parse a model key, falling back to Claude
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for AiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(AiModel::Claude),
            "gpt4o" | "gpt-4o" => Ok(AiModel::Gpt4o),
            "gemini" => Ok(AiModel::Gemini),
            other => Err(format!("Unknown model: {}", other)),
        }
    }
}

fn default_emoji() -> String {
    "📝".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

fn default_estimate() -> u32 {
    30
}

fn default_category() -> String {
    "general".to_string()
}

/// Metadata suggested for a new task title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSuggestion {
    #[serde(default = "default_emoji")]
    pub emoji: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_estimate")]
    pub estimated_time: u32,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Set when the model did not answer in time
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timeout: bool,
}

impl TaskSuggestion {
    pub fn fallback() -> Self {
        Self {
            emoji: default_emoji(),
            priority: default_priority(),
            estimated_time: default_estimate(),
            category: default_category(),
            tags: Vec::new(),
            timeout: false,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            timeout: true,
            ..Self::fallback()
        }
    }
}

/// Model reply shape for a breakdown request
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct BreakdownReply {
    #[serde(default)]
    pub subtasks: Vec<SubtaskDraft>,
}

/// Subtasks used when the model cannot break a task down
pub fn fallback_breakdown() -> Vec<SubtaskDraft> {
    vec![
        SubtaskDraft::new("Get started", 15),
        SubtaskDraft::new("Work on it", 30),
        SubtaskDraft::new("Review & finish", 15),
    ]
}

/// Reply to a general chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub ai_model: AiModel,
}

/// Reply from a task's persona coach
#[derive(Debug, Clone, Serialize)]
pub struct CoachReply {
    pub response: String,
    pub session_id: String,
    pub persona_id: PersonaId,
    pub persona_name: String,
    pub persona_emoji: String,
}
