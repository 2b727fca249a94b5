//! Line-based terminal front end for [`ChatWidget`].
//!
//! Each line typed is the text field content followed by Enter. `/track`
//! stands for a space press outside the text field and `/quit` closes the
//! widget.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::{
    config::WidgetConfig,
    widget::{
        ChatWidget, PendingSubmit, SubmitOutcome, SubmitResult, WidgetView,
        audio::CommandPlayer,
        avatar::LoggingAvatar,
        client::HttpChatClient,
        keyboard::{Focus, Key, KeyEvent},
    },
};

type InFlight = Pin<Box<dyn Future<Output = SubmitResult> + Send>>;

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Quit,
    Track,
    Say(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    match line.trim() {
        "/quit" => Line::Quit,
        "/track" => Line::Track,
        _ => Line::Say(line),
    }
}

pub async fn run(config: WidgetConfig) -> anyhow::Result<()> {
    let backend = Arc::new(HttpChatClient::new(&config.backend_url, config.request_timeout())?);
    let player = Arc::new(CommandPlayer::from_command_line(&config.audio_player)?);
    let avatar = Arc::new(LoggingAvatar::new());

    info!(endpoint = backend.endpoint(), session_id = %config.session_id, "widget ready");

    let mut widget = ChatWidget::new(backend, avatar, player)
        .with_session_id(config.session_id.clone())
        .with_revert_delay(config.expression_revert_delay());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight: Option<InFlight> = None;

    println!("Type a message and press Enter. /track toggles head tracking, /quit exits.");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Line::Quit => break,
                    Line::Track => {
                        widget.handle_key(KeyEvent::new(Key::Space, Focus::Elsewhere)).await;
                    }
                    Line::Say(text) => {
                        match submit_line(&mut widget, text) {
                            Ok(pending) => in_flight = Some(Box::pin(pending.send())),
                            Err(SubmitOutcome::Busy) => println!("(still waiting for the last reply)"),
                            Err(_) => {}
                        }
                    }
                }
            }
            result = wait_in_flight(&mut in_flight) => {
                in_flight = None;
                widget.finish_submit(result).await;
            }
        }
        print_view(&widget.render());
    }

    widget.teardown();
    Ok(())
}

/// Type `text` into the widget and press Enter. While a reply is outstanding
/// the line is refused and the pending input stays untouched.
fn submit_line(widget: &mut ChatWidget, text: &str) -> Result<PendingSubmit, SubmitOutcome> {
    if widget.is_loading() {
        return Err(SubmitOutcome::Busy);
    }
    widget.set_input(text);
    widget.begin_submit()
}

async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> SubmitResult {
    match in_flight {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

fn print_view(view: &WidgetView) {
    let tracking = if view.tracking { "on" } else { "off" };
    println!("[tracking {tracking}] {}", view.subtitle);
}
