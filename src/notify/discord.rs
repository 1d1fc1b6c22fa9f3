use super::{ListingMessage, Transport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Posts listings as embeds to Discord webhook URLs.
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Total attempts per message, including the first. Minimum 1.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

/// 500ms doubling per attempt, capped at 8 doublings.
fn backoff(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(8);
    Duration::from_millis(500u64 << shift)
}

impl Default for DiscordNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for DiscordNotifier {
    async fn deliver(&self, webhook: &str, message: &ListingMessage) -> Result<()> {
        let payload = DiscordWebhookPayload::embed(message);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(backoff(attempt)).await;
                            continue;
                        }
                        return Err(anyhow!("Discord webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Discord webhook request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    url: String,
    description: String,
    color: u32,
    fields: Vec<DiscordField>,
    footer: DiscordFooter,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(msg: &ListingMessage) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: truncate(&msg.title, 256),
                url: msg.url.clone(),
                description: truncate(&msg.description, 4096),
                color: msg.color,
                fields: msg
                    .fields
                    .iter()
                    .map(|f| DiscordField {
                        name: f.name.clone(),
                        value: truncate(&f.value, 1024),
                        inline: true,
                    })
                    .collect(),
                footer: DiscordFooter {
                    text: msg.footer.clone(),
                },
            }],
        }
    }
}

// Discord rejects embeds over its per-field limits.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
