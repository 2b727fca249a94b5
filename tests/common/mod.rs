#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use avatar_chat::services::{
    chat_service::ChatService,
    llm::{LanguageModel, LlmError, LlmService, PromptMessage},
    session_manager::SessionManager,
    tts::{SpeechSynthesizer, TtsError},
};
use avatar_chat::state::AppState;

/// Replies with canned completions and records every prompt it saw.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<Vec<Result<String, LlmError>>>,
    pub prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies), prompts: Mutex::default() })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        replies.remove(0)
    }
}

pub struct FixedSpeech(pub Option<Vec<u8>>);

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>, TtsError> {
        Ok(self.0.clone())
    }
}

pub fn app_state(model: Arc<ScriptedModel>, speech: Option<Vec<u8>>) -> Arc<AppState> {
    let llm = LlmService::new(model, 3).with_retry_delay(Duration::ZERO);
    let sessions = SessionManager::new(Duration::from_secs(60));
    Arc::new(AppState::new(ChatService::new(sessions, llm, Arc::new(FixedSpeech(speech)))))
}
