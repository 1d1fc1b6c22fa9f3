use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{ListingMessage, Transport};

#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

impl Default for SlackNotifier {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn render_text(msg: &ListingMessage) -> String {
    let mut text = format!("*<{}|{}>*\n{}", msg.url, msg.title, msg.description);
    for f in &msg.fields {
        text.push_str(&format!("\n*{}:* {}", f.name, f.value));
    }
    text.push_str(&format!("\n_{}_", msg.footer));
    text
}

#[async_trait]
impl Transport for SlackNotifier {
    async fn deliver(&self, webhook: &str, message: &ListingMessage) -> Result<()> {
        let body = serde_json::json!({ "text": render_text(message) });

        self.client
            .post(webhook)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
