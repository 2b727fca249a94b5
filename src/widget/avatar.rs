//! Capability interface of the animated avatar.

use std::sync::Mutex;

use tracing::info;

/// What the chat widget is allowed to ask of the avatar.
pub trait AvatarController: Send + Sync {
    fn set_tracking(&self, enabled: bool);

    /// Show (`active = true`) or clear (`active = false`) a named expression.
    fn show_expression(&self, name: &str, active: bool);

    fn show(&self, name: &str) {
        self.show_expression(name, true);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvatarState {
    pub tracking: bool,
    pub expression: Option<String>,
}

/// Avatar stand-in for headless use: logs every command and remembers the pose.
#[derive(Debug)]
pub struct LoggingAvatar {
    state: Mutex<AvatarState>,
}

impl Default for LoggingAvatar {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingAvatar {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AvatarState { tracking: true, expression: None }),
        }
    }

    pub fn state(&self) -> AvatarState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AvatarController for LoggingAvatar {
    fn set_tracking(&self, enabled: bool) {
        info!(enabled, "avatar head tracking");
        self.state.lock().unwrap_or_else(|e| e.into_inner()).tracking = enabled;
    }

    fn show_expression(&self, name: &str, active: bool) {
        info!(name, active, "avatar expression");
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if active {
            state.expression = Some(name.to_string());
        } else if state.expression.as_deref() == Some(name) {
            state.expression = None;
        }
    }
}
