// src/config.rs
use std::{net::SocketAddr, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::message::DEFAULT_SESSION_ID;

#[derive(Debug, Parser)]
#[command(name = "avatar-chat", version, about = "Talking avatar chat: backend and terminal widget")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the `/api/chat` backend.
    Serve(ServerConfig),
    /// Run the chat widget in this terminal.
    Widget(WidgetConfig),
}

#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    /// Idle time after which a conversation is forgotten.
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 3600)]
    pub session_ttl_secs: u64,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true, default_value = "")]
    pub llm_api_key: String,

    #[arg(
        long,
        env = "LLM_API_URL",
        default_value = "https://dashscope.aliyuncs.com/compatible-mode/v1"
    )]
    pub llm_api_url: String,

    #[arg(long, env = "LLM_MODEL", default_value = "qwen2.5-32b-instruct")]
    pub llm_model: String,

    #[arg(long, env = "LLM_MAX_RETRIES", default_value_t = 3)]
    pub llm_max_retries: u32,

    /// Per-request limit for model and speech calls.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 60)]
    pub upstream_timeout_secs: u64,

    /// Speech endpoint; speech is disabled when unset.
    #[arg(long, env = "TTS_API_URL")]
    pub tts_api_url: Option<String>,

    #[arg(long, env = "TTS_API_KEY", hide_env_values = true, default_value = "")]
    pub tts_api_key: String,

    #[arg(long, env = "TTS_REFERENCE_ID", default_value = "")]
    pub tts_reference_id: String,
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct WidgetConfig {
    #[arg(long, env = "CHAT_BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    #[arg(long, env = "CHAT_SESSION_ID", default_value = DEFAULT_SESSION_ID)]
    pub session_id: String,

    /// Player command; the clip path is appended as the last argument.
    #[arg(long, env = "AUDIO_PLAYER", default_value = "ffplay -nodisp -autoexit -loglevel quiet")]
    pub audio_player: String,

    /// Delay between the end of playback and the expression reset.
    #[arg(long, env = "EXPRESSION_REVERT_MS", default_value_t = 1000)]
    pub expression_revert_ms: u64,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl WidgetConfig {
    pub fn expression_revert_delay(&self) -> Duration {
        Duration::from_millis(self.expression_revert_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
