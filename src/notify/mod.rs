// src/notify/mod.rs
pub mod discord;
pub mod fanout;
pub mod format;
pub mod slack;

use anyhow::Result;
use async_trait::async_trait;

pub use discord::DiscordNotifier;
pub use fanout::{DeliveryStats, FanOut, Pacer};
pub use slack::SlackNotifier;

/// Transport-neutral rendering of one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingMessage {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<MessageField>,
    pub footer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageField {
    pub name: String,
    pub value: String,
}

/// Delivers a formatted message to an opaque destination handle.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, destination: &str, message: &ListingMessage) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Routes each destination to Slack or Discord by webhook host.
#[derive(Clone)]
pub struct TransportMux {
    discord: DiscordNotifier,
    slack: SlackNotifier,
}

impl TransportMux {
    pub fn new(discord: DiscordNotifier, slack: SlackNotifier) -> Self {
        Self { discord, slack }
    }

    fn is_slack(destination: &str) -> bool {
        reqwest::Url::parse(destination)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == "hooks.slack.com"))
            .unwrap_or(false)
    }
}

impl Default for TransportMux {
    fn default() -> Self {
        Self::new(DiscordNotifier::new(), SlackNotifier::new())
    }
}

#[async_trait]
impl Transport for TransportMux {
    async fn deliver(&self, destination: &str, message: &ListingMessage) -> Result<()> {
        if Self::is_slack(destination) {
            self.slack.deliver(destination, message).await
        } else {
            self.discord.deliver(destination, message).await
        }
    }

    fn name(&self) -> &'static str {
        "webhook-mux"
    }
}
