//! Keyboard events and the head-tracking shortcut.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use super::avatar::AvatarController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Backspace,
    Char(char),
}

/// Where keyboard focus was when the key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Elsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub focus: Focus,
}

impl KeyEvent {
    pub fn new(key: Key, focus: Focus) -> Self {
        Self { key, focus }
    }
}

/// Space outside the text input flips avatar head tracking.
///
/// A single handler instance lives for the whole widget lifetime; the current
/// value sits in a shared cell so clones observe the same state.
#[derive(Clone)]
pub struct TrackingToggle {
    enabled: Arc<AtomicBool>,
    attached: Arc<AtomicBool>,
    avatar: Arc<dyn AvatarController>,
}

impl fmt::Debug for TrackingToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingToggle")
            .field("enabled", &self.is_enabled())
            .field("attached", &self.attached.load(Ordering::Acquire))
            .finish()
    }
}

impl TrackingToggle {
    pub fn new(avatar: Arc<dyn AvatarController>) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
            attached: Arc::new(AtomicBool::new(true)),
            avatar,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns `true` when the event toggled tracking.
    pub fn handle(&self, event: &KeyEvent) -> bool {
        if event.key != Key::Space || event.focus == Focus::Input {
            return false;
        }
        if !self.attached.load(Ordering::Acquire) {
            return false;
        }
        let now = !self.enabled.fetch_xor(true, Ordering::AcqRel);
        tracing::debug!(tracking = now, "tracking toggled");
        self.avatar.set_tracking(now);
        true
    }

    /// Stop reacting to key events.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::avatar::LoggingAvatar;

    #[test]
    fn space_outside_input_toggles_and_notifies() {
        let avatar = Arc::new(LoggingAvatar::new());
        let toggle = TrackingToggle::new(avatar.clone());

        assert!(toggle.handle(&KeyEvent::new(Key::Space, Focus::Elsewhere)));
        assert!(!toggle.is_enabled());
        assert!(!avatar.state().tracking);

        assert!(toggle.handle(&KeyEvent::new(Key::Space, Focus::Elsewhere)));
        assert!(toggle.is_enabled());
        assert!(avatar.state().tracking);
    }

    #[test]
    fn space_in_input_and_other_keys_are_ignored() {
        let toggle = TrackingToggle::new(Arc::new(LoggingAvatar::new()));
        assert!(!toggle.handle(&KeyEvent::new(Key::Space, Focus::Input)));
        assert!(!toggle.handle(&KeyEvent::new(Key::Enter, Focus::Elsewhere)));
        assert!(toggle.is_enabled());
    }

    #[test]
    fn detached_toggle_is_inert() {
        let toggle = TrackingToggle::new(Arc::new(LoggingAvatar::new()));
        let clone = toggle.clone();
        toggle.detach();
        assert!(!clone.handle(&KeyEvent::new(Key::Space, Focus::Elsewhere)));
        assert!(clone.is_enabled());
    }
}
