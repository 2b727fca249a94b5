// src/state.rs
use std::sync::Arc;

use crate::{
    config::ServerConfig,
    services::{
        chat_service::ChatService,
        llm::{LlmService, OpenAiCompatible},
        session_manager::SessionManager,
        tts::{HttpSpeech, NoSpeech, SpeechSynthesizer},
    },
};

pub type SharedState = Arc<AppState>;

#[derive(Debug)]
pub struct AppState {
    pub chat: ChatService,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self { chat }
    }
}

impl AppState {
    /// Wire the production services described by `config`.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let model = OpenAiCompatible::new(
            &config.llm_api_key,
            &config.llm_api_url,
            &config.llm_model,
            config.upstream_timeout(),
        )?;
        let llm = LlmService::new(Arc::new(model), config.llm_max_retries);

        let speech: Arc<dyn SpeechSynthesizer> = match &config.tts_api_url {
            Some(url) => Arc::new(HttpSpeech::new(
                url,
                &config.tts_api_key,
                &config.tts_reference_id,
                config.upstream_timeout(),
            )?),
            None => Arc::new(NoSpeech),
        };

        let sessions = SessionManager::new(config.session_ttl());
        Ok(Self::new(ChatService::new(sessions, llm, speech)))
    }
}
