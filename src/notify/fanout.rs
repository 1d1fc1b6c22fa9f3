// src/notify/fanout.rs
//! Delivery fan-out: every listing of a category to every destination
//! subscribed to it, one send at a time, failures isolated per send.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{format, Transport};
use crate::ingest::types::{Category, Listing};

/// Enforces a minimum gap between consecutive sends on one transport.
#[derive(Debug)]
pub struct Pacer {
    min_spacing: Duration,
    last_send: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_send: Mutex::new(None),
        }
    }

    /// Waits until the next send is allowed and claims the slot.
    pub async fn wait_turn(&self) {
        let mut last = self.last_send.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_spacing;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryStats {
    pub fn merge(&mut self, other: DeliveryStats) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

pub struct FanOut {
    transport: Arc<dyn Transport>,
    pacer: Pacer,
}

impl FanOut {
    pub fn new(transport: Arc<dyn Transport>, min_spacing: Duration) -> Self {
        Self {
            transport,
            pacer: Pacer::new(min_spacing),
        }
    }

    /// For each destination, each listing in the order given. A failed send is
    /// logged and counted; it never stops the remaining sends.
    pub async fn deliver(
        &self,
        category: Category,
        listings: &[Listing],
        destinations: &[String],
    ) -> DeliveryStats {
        let mut stats = DeliveryStats::default();
        if listings.is_empty() {
            return stats;
        }

        for destination in destinations {
            for listing in listings {
                let message = format::listing_message(listing, category);
                self.pacer.wait_turn().await;

                match self.transport.deliver(destination, &message).await {
                    Ok(()) => {
                        stats.sent += 1;
                        counter!("delivery_sent_total", "category" => category.as_str()).increment(1);
                    }
                    Err(e) => {
                        stats.failed += 1;
                        counter!("delivery_failed_total", "category" => category.as_str()).increment(1);
                        tracing::warn!(
                            target: "delivery",
                            transport = self.transport.name(),
                            destination = %destination,
                            listing_id = %listing.id,
                            %category,
                            error = %format!("{e:#}"),
                            "delivery failed"
                        );
                    }
                }
            }
        }

        tracing::info!(
            target: "delivery",
            %category,
            destinations = destinations.len(),
            listings = listings.len(),
            sent = stats.sent,
            failed = stats.failed,
            "fan-out finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ListingMessage;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        sent: StdMutex<Vec<(String, String, Instant)>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn deliver(&self, destination: &str, message: &ListingMessage) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), message.footer.clone(), Instant::now()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.into(),
            title: "Intern".into(),
            company_name: "Acme".into(),
            url: format!("https://example.com/{id}"),
            terms: vec!["Summer 2026".into()],
            locations: vec![],
            date_posted: 10,
            active: true,
            is_visible: true,
            sponsorship: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_sends_are_spaced() {
        let rec = Arc::new(Recorder::default());
        let fan = FanOut::new(rec.clone(), Duration::from_secs(1));

        let stats = fan
            .deliver(
                Category::Summer,
                &[listing("a"), listing("b")],
                &["https://d1.test".to_string(), "https://d2.test".to_string()],
            )
            .await;
        assert_eq!(stats, DeliveryStats { sent: 4, failed: 0 });

        let sent = rec.sent.lock().unwrap();
        let order: Vec<_> = sent.iter().map(|(d, f, _)| format!("{d}|{f}")).collect();
        assert_eq!(
            order,
            vec![
                "https://d1.test|ID: a",
                "https://d1.test|ID: b",
                "https://d2.test|ID: a",
                "https://d2.test|ID: b",
            ]
        );
        for pair in sent.windows(2) {
            assert!(pair[1].2 - pair[0].2 >= Duration::from_secs(1));
        }
    }

    #[tokio::test]
    async fn nothing_to_send_touches_no_destination() {
        let rec = Arc::new(Recorder::default());
        let fan = FanOut::new(rec.clone(), Duration::ZERO);
        let stats = fan
            .deliver(Category::Offseason, &[], &["https://d1.test".to_string()])
            .await;
        assert_eq!(stats, DeliveryStats::default());
        assert!(rec.sent.lock().unwrap().is_empty());
    }
}
