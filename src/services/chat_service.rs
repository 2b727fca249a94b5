// src/services/chat_service.rs
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::{
    llm::{LlmError, LlmService, PromptMessage, PromptRole},
    session_manager::{MessageRole, SessionManager},
    tts::SpeechSynthesizer,
};

/// Expressions the avatar model knows how to show.
pub const EXPRESSIONS: &[&str] = &["happy", "sad", "angry", "surprised", "shy", "thinking"];

/// Messages of context sent along with each new user message.
const HISTORY_LIMIT: usize = 20;

/// What the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(alias = "message")]
    reply: String,
    #[serde(default)]
    expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub expression: Option<String>,
    pub audio: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct ChatService {
    sessions: SessionManager,
    llm: LlmService,
    speech: Arc<dyn SpeechSynthesizer>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("sessions", &self.sessions)
            .field("llm", &self.llm)
            .finish_non_exhaustive()
    }
}

impl ChatService {
    pub fn new(sessions: SessionManager, llm: LlmService, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { sessions, llm, speech }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn generate_reply(&self, session_id: &str, message: &str) -> Result<Reply, LlmError> {
        let history = self.sessions.recent_history(session_id, HISTORY_LIMIT).await;

        let mut prompt = Vec::with_capacity(history.len() + 2);
        prompt.push(PromptMessage::new(PromptRole::System, system_prompt()));
        prompt.extend(history.into_iter().map(|m| {
            let role = match m.role {
                MessageRole::User => PromptRole::User,
                MessageRole::Assistant => PromptRole::Assistant,
            };
            PromptMessage::new(role, m.content)
        }));
        prompt.push(PromptMessage::new(PromptRole::User, message));

        let ModelReply { reply, expression } = self.llm.generate::<ModelReply>(&prompt).await?;
        let expression = expression.and_then(|e| known_expression(&e));

        self.sessions.append_message(session_id, MessageRole::User, message).await;
        self.sessions.append_message(session_id, MessageRole::Assistant, &reply).await;

        let audio = match self.speech.synthesize(&reply).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "speech synthesis failed, replying without audio");
                None
            }
        };

        info!(session_id, reply = %reply, expression = ?expression, has_audio = audio.is_some(), "reply generated");
        Ok(Reply { text: reply, expression, audio })
    }
}

fn known_expression(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    EXPRESSIONS.contains(&name.as_str()).then_some(name)
}

fn system_prompt() -> String {
    format!(
        "You are a friendly animated character chatting with the user. Keep replies short enough \
         to read as a subtitle. Answer ONLY with a JSON object of the form \
         {{\"reply\": \"<your answer>\", \"expression\": \"<one of: {}>\"}}. \
         Use the expression that best matches the mood of your answer.",
        EXPRESSIONS.join(", ")
    )
}
