//! Reply audio: base64 decoding and playback.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;
use tokio::{process::Command, sync::oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

pub const MPEG_MIME: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("audio payload is empty")]
    Empty,

    #[error("audio player command is empty")]
    NoPlayer,

    #[error("audio io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

pub fn decode_audio(encoded: &str) -> Result<AudioClip, AudioError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }
    Ok(AudioClip { bytes, mime: MPEG_MIME })
}

/// A started playback. Resolves once the clip has played to the end.
#[derive(Debug)]
pub struct Playback {
    done: oneshot::Receiver<()>,
}

/// Held by the player; dropping it without calling `finish` means playback broke off.
#[derive(Debug)]
pub struct PlaybackDone(oneshot::Sender<()>);

impl PlaybackDone {
    pub fn finish(self) {
        let _ = self.0.send(());
    }
}

impl Playback {
    pub fn channel() -> (PlaybackDone, Playback) {
        let (tx, rx) = oneshot::channel();
        (PlaybackDone(tx), Playback { done: rx })
    }

    /// `true` when the clip ended normally.
    pub async fn finished(self) -> bool {
        self.done.await.is_ok()
    }
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playing `clip`; returns once playback has begun.
    async fn play(&self, clip: AudioClip) -> Result<Playback, AudioError>;
}

/// Plays clips with an external program, e.g. `ffplay -nodisp -autoexit`.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    clip_dir: PathBuf,
}

/// A clip written to disk for the player; the file goes away with the value.
#[derive(Debug)]
struct ClipFile {
    path: PathBuf,
}

impl ClipFile {
    async fn write(path: PathBuf, bytes: &[u8]) -> Result<Self, AudioError> {
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ClipFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove audio clip");
        }
    }
}

impl CommandPlayer {
    pub fn from_command_line(line: &str) -> Result<Self, AudioError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(AudioError::NoPlayer)?;
        Ok(Self {
            program,
            args: parts.collect(),
            clip_dir: std::env::temp_dir(),
        })
    }

    /// Directory clips are written to while they play. Defaults to the system temp dir.
    pub fn with_clip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.clip_dir = dir.into();
        self
    }

    fn clip_path(&self) -> PathBuf {
        self.clip_dir.join(format!("avatar-chat-{}.mp3", Uuid::new_v4()))
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, clip: AudioClip) -> Result<Playback, AudioError> {
        let file = ClipFile::write(self.clip_path(), &clip.bytes).await?;

        // On spawn failure `file` drops here and removes the clip.
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .kill_on_drop(true)
            .spawn()?;

        debug!(path = %file.path().display(), len = clip.bytes.len(), "playback started");
        let (done, playback) = Playback::channel();
        tokio::spawn(async move {
            let status = child.wait().await;
            // The task owns `file`; dropping the task mid-playback removes it as well.
            drop(file);
            match status {
                Ok(s) if s.success() => done.finish(),
                Ok(s) => warn!(status = %s, "audio player exited with failure"),
                Err(e) => warn!(error = %e, "audio playback error"),
            }
        });
        Ok(playback)
    }
}
