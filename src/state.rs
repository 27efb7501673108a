//! Application state: configuration, the optional model client, live quiz
//! sessions and the revision chunk store.
//!
//! Quiz sessions are locked one at a time (see `session::SessionStore`); the
//! chunk store is shared by every revision request behind a `RwLock`.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::chunks::ChunkStore;
use crate::config::{load_config_from_env, AppConfig};
use crate::llm::LlmClient;
use crate::revision::RevisionContext;
use crate::session::{QuizContext, SessionStore};

pub struct AppState {
    pub llm: Option<LlmClient>,
    pub config: AppConfig,
    pub sessions: SessionStore,
    pub chunks: Arc<RwLock<ChunkStore>>,
}

impl AppState {
    /// Build state from env: load TOML config and init the model client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_config_from_env().unwrap_or_default();
        info!(
            target: "quicklearn_backend",
            content_chars = config.quiz.content_chars,
            chunk_size = config.revision.chunk_size,
            mcq_count = config.revision.mcq_count,
            "Configuration ready"
        );

        let llm = LlmClient::from_env();
        if let Some(c) = &llm {
            info!(target: "quicklearn_backend", base_url = %c.base_url, fast_model = %c.fast_model, strong_model = %c.strong_model, "Model client enabled.");
        } else {
            warn!(target: "quicklearn_backend", "Model client disabled (no OPENAI_API_KEY). Question generation and revision guides will fail.");
        }

        Self::with_parts(llm, config)
    }

    pub fn with_parts(llm: Option<LlmClient>, config: AppConfig) -> Self {
        Self {
            llm,
            config,
            sessions: SessionStore::new(),
            chunks: Arc::new(RwLock::new(ChunkStore::new())),
        }
    }

    pub fn quiz_ctx(&self) -> QuizContext<'_> {
        QuizContext {
            llm: self.llm.as_ref(),
            prompts: &self.config.prompts,
            settings: &self.config.quiz,
        }
    }

    pub fn revision_ctx(&self) -> RevisionContext<'_> {
        RevisionContext {
            llm: self.llm.as_ref(),
            prompts: &self.config.prompts,
            settings: &self.config.revision,
        }
    }
}
