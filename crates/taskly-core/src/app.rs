//! ============================================================================
//! Taskly - Wired application state
//! ============================================================================
//! One database backs every collaborator; the services share it through Arcs.
//! ============================================================================

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::assist::{AssistService, ChatCompletionsClient, LlmClient};
use crate::config::TasklyConfig;
use crate::dashboard::DashboardService;
use crate::db::TasklyDb;
use crate::gamification::GamificationEngine;
use crate::tasks::TaskService;

pub struct Taskly {
    pub config: TasklyConfig,
    pub db: Arc<TasklyDb>,
    pub engine: Arc<GamificationEngine>,
    pub tasks: TaskService,
    pub assist: AssistService,
    pub dashboard: DashboardService,
}

impl Taskly {
    /// Open the database named by `config` and wire the services
    pub fn open(config: TasklyConfig) -> Result<Self> {
        let db = Arc::new(TasklyDb::open(config.db_path.as_deref())?);

        let llm: Option<Arc<dyn LlmClient>> = config.llm_api_key.clone().map(|key| {
            Arc::new(ChatCompletionsClient::new(key, config.llm_base_url.clone())) as Arc<dyn LlmClient>
        });

        let engine = Arc::new(GamificationEngine::new(db.clone(), db.clone(), db.clone()));
        let tasks = TaskService::new(db.clone(), engine.clone());
        let assist = AssistService::new(llm, db.clone(), db.clone(), db.clone(), &config);
        let dashboard = DashboardService::new(db.clone(), db.clone(), db.clone());

        info!(
            "Taskly ready (db: {}, model: {})",
            db.path().display(),
            config.default_model
        );

        Ok(Self {
            config,
            db,
            engine,
            tasks,
            assist,
            dashboard,
        })
    }
}
