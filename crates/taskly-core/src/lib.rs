//! ============================================================================
//! TASKLY-CORE: Gamified task management
//! ============================================================================
//! This crate handles all backend logic for Taskly:
//! - Persona classification of tasks by weighted keywords
//! - XP, level, streak and badge rules with per-user serialized updates
//! - Task lifecycle, notifications and the dashboard summary
//! - Embedded storage via redb
//! - LLM-backed suggestions, breakdowns, chat and coaching
//! ============================================================================

pub mod app;
pub mod assist;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod gamification;
pub mod persona;
pub mod store;
pub mod tasks;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use app::Taskly;
pub use assist::{AiModel, AssistService};
pub use config::TasklyConfig;
pub use dashboard::{Dashboard, DashboardService};
pub use db::{TasklyDb, UserRecord};
pub use gamification::{BadgeType, GamificationEngine, GamificationStats, UserState};
pub use persona::{classify, PersonaId};
pub use tasks::{TaskService, TaskUpdateOutcome};
