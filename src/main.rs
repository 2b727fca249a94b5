use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use avatar_chat::{
    config::{Cli, Command, ServerConfig},
    routes, state::AppState, terminal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(config) => serve(config).await,
        Command::Widget(config) => terminal::run(config).await,
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    if config.llm_api_key.is_empty() {
        tracing::warn!("LLM_API_KEY is not set; model calls will be rejected");
    }

    let state = Arc::new(AppState::from_config(&config)?);

    let sessions = state.chat.sessions().clone();
    let sweep_every = (sessions.ttl() / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired().await;
            if removed > 0 {
                tracing::info!(removed, "purged idle sessions");
            }
        }
    });

    let app = routes::create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!("chat backend running at http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
