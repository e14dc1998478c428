//! One chat turn against the backend: `sitecraft chat`.

use anyhow::{Context, Result};
use sitecraft::chat::HttpChatClient;
use sitecraft::config::SessionConfig;
use sitecraft::session::BuildSession;
use sitecraft::ui::render_step;
use std::sync::Arc;

pub async fn cmd_chat(config: &SessionConfig, prompt: &str) -> Result<()> {
    let client = HttpChatClient::new(&config.backend.api_url);
    let mut session = BuildSession::new().with_chat(Arc::new(client));

    let report = session
        .send_message(prompt)
        .await
        .with_context(|| format!("Chat request to {} failed", config.backend.api_url))?;

    for step in session.steps() {
        println!("{}", render_step(step));
    }
    if report.new_steps() == 0
        && let Some(reply) = session.transcript().messages.last()
    {
        println!("{}", reply.content);
    }
    Ok(())
}
