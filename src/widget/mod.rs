//! The chat widget: text input, subtitle, and the avatar side effects of replies.

pub mod audio;
pub mod avatar;
pub mod client;
pub mod keyboard;

use std::{fmt, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::message::{ChatRequest, ChatResponse, DEFAULT_SESSION_ID};
use audio::{AudioPlayer, Playback, decode_audio};
use avatar::AvatarController;
use client::{ChatBackend, WidgetError};
use keyboard::{Focus, Key, KeyEvent, TrackingToggle};

/// Pause between the end of reply audio and clearing the expression.
pub const EXPRESSION_REVERT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank; nothing was sent.
    Empty,
    /// A request is already outstanding; nothing was sent.
    Busy,
    Replied,
    /// The request failed; the failure has been logged.
    Failed,
}

/// A request taken off the widget so it can be awaited without holding it.
pub struct PendingSubmit {
    backend: Arc<dyn ChatBackend>,
    request: ChatRequest,
}

impl fmt::Debug for PendingSubmit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmit").field("request", &self.request).finish_non_exhaustive()
    }
}

impl PendingSubmit {
    pub async fn send(self) -> SubmitResult {
        let response = self.backend.send(&self.request).await;
        SubmitResult { text: self.request.message, response }
    }
}

#[derive(Debug)]
pub struct SubmitResult {
    text: String,
    response: Result<ChatResponse, WidgetError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subtitle {
    /// Waiting on the backend.
    Pending,
    Reply(String),
    Blank,
}

impl fmt::Display for Subtitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subtitle::Pending => f.write_str("..."),
            Subtitle::Reply(text) => f.write_str(text),
            Subtitle::Blank => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub subtitle: Subtitle,
    pub input: String,
    pub tracking: bool,
}

pub struct ChatWidget {
    backend: Arc<dyn ChatBackend>,
    avatar: Arc<dyn AvatarController>,
    player: Arc<dyn AudioPlayer>,
    session_id: String,
    revert_delay: Duration,
    input: String,
    messages: Vec<Message>,
    loading: bool,
    tracking: TrackingToggle,
    pending_revert: Option<JoinHandle<()>>,
}

impl fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatWidget")
            .field("session_id", &self.session_id)
            .field("input", &self.input)
            .field("messages", &self.messages)
            .field("loading", &self.loading)
            .field("tracking", &self.tracking)
            .finish_non_exhaustive()
    }
}

impl ChatWidget {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        avatar: Arc<dyn AvatarController>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            tracking: TrackingToggle::new(Arc::clone(&avatar)),
            backend,
            avatar,
            player,
            session_id: DEFAULT_SESSION_ID.to_string(),
            revert_delay: EXPRESSION_REVERT_DELAY,
            input: String::new(),
            messages: Vec::new(),
            loading: false,
            pending_revert: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_revert_delay(mut self, delay: Duration) -> Self {
        self.revert_delay = delay;
        self
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_enabled()
    }

    /// `true` while an expression reset is waiting on playback or its delay.
    pub fn has_pending_revert(&self) -> bool {
        self.pending_revert.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Route a key press. Enter in the input submits and reports the outcome.
    pub async fn handle_key(&mut self, event: KeyEvent) -> Option<SubmitOutcome> {
        match (event.key, event.focus) {
            (Key::Enter, Focus::Input) => Some(self.submit().await),
            (Key::Space, Focus::Input) => {
                self.input.push(' ');
                None
            }
            (Key::Char(c), Focus::Input) => {
                self.input.push(c);
                None
            }
            (Key::Backspace, Focus::Input) => {
                self.input.pop();
                None
            }
            _ => {
                self.tracking.handle(&event);
                None
            }
        }
    }

    /// Send the current input and apply the reply.
    pub async fn submit(&mut self) -> SubmitOutcome {
        match self.begin_submit() {
            Ok(pending) => {
                let result = pending.send().await;
                self.finish_submit(result).await
            }
            Err(outcome) => outcome,
        }
    }

    /// First half of [`submit`](Self::submit): validates the input and marks
    /// the widget as loading. The caller awaits the returned request and hands
    /// the result to [`finish_submit`](Self::finish_submit).
    pub fn begin_submit(&mut self) -> Result<PendingSubmit, SubmitOutcome> {
        if self.input.trim().is_empty() {
            return Err(SubmitOutcome::Empty);
        }
        if self.loading {
            return Err(SubmitOutcome::Busy);
        }

        self.loading = true;
        Ok(PendingSubmit {
            backend: Arc::clone(&self.backend),
            request: ChatRequest::new(self.input.clone(), self.session_id.clone()),
        })
    }

    pub async fn finish_submit(&mut self, result: SubmitResult) -> SubmitOutcome {
        let outcome = match result.response {
            Ok(response) => {
                self.apply_response(result.text, response).await;
                SubmitOutcome::Replied
            }
            Err(e) => {
                error!(error = %e, "chat request failed");
                SubmitOutcome::Failed
            }
        };
        self.loading = false;
        outcome
    }

    async fn apply_response(&mut self, text: String, response: ChatResponse) {
        let ChatResponse { message, expression, audio } = response;
        let expression = expression.filter(|e| !e.is_empty());

        if let Some(name) = expression.as_deref() {
            // A newer expression supersedes any reset still queued for the old one.
            if let Some(handle) = self.pending_revert.take() {
                handle.abort();
            }
            self.avatar.show(name);
        }

        if let Some(encoded) = audio.as_deref().filter(|a| !a.is_empty()) {
            match self.start_audio(encoded).await {
                Ok(playback) => {
                    if let Some(name) = expression {
                        self.schedule_revert(playback, name);
                    }
                }
                Err(e) => warn!(error = %e, "audio processing error"),
            }
        }

        self.messages.push(Message::new(Role::User, text));
        self.messages.push(Message::new(Role::Assistant, message));
        self.input.clear();
    }

    async fn start_audio(&self, encoded: &str) -> Result<Playback, audio::AudioError> {
        let clip = decode_audio(encoded)?;
        self.player.play(clip).await
    }

    fn schedule_revert(&mut self, playback: Playback, expression: String) {
        let avatar = Arc::clone(&self.avatar);
        let delay = self.revert_delay;
        self.pending_revert = Some(tokio::spawn(async move {
            if !playback.finished().await {
                warn!(expression, "audio playback error, keeping expression");
                return;
            }
            tokio::time::sleep(delay).await;
            avatar.show_expression(&expression, false);
        }));
    }

    pub fn render(&self) -> WidgetView {
        let subtitle = if self.loading {
            Subtitle::Pending
        } else {
            self.messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .map_or(Subtitle::Blank, |m| Subtitle::Reply(m.text.clone()))
        };
        WidgetView {
            subtitle,
            input: self.input.clone(),
            tracking: self.is_tracking(),
        }
    }

    /// Detach the keyboard shortcut and drop any queued expression reset.
    pub fn teardown(&mut self) {
        self.tracking.detach();
        if let Some(handle) = self.pending_revert.take() {
            handle.abort();
        }
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        self.teardown();
    }
}
