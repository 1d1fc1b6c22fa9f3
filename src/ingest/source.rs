// src/ingest/source.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, StatusCode};

use crate::error::FetchError;
use crate::ingest::dedup::DedupState;
use crate::ingest::types::{Category, Listing, ListingBatch};

pub const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/SimplifyJobs/Summer2026-Internships/dev/.github/scripts/listings.json";

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Postable listings newer than `start_timestamp`, in upstream order
    /// (newest-first).
    async fn fetch(&self, start_timestamp: Option<i64>) -> Result<Vec<Listing>, FetchError>;

    fn name(&self) -> &'static str;

    /// Returns `(new, all)`: `all` is every retained listing split by
    /// category, `new` drops ids already in `seen` for that category.
    async fn get_new_listings(
        &self,
        seen: &DedupState,
        start_timestamp: Option<i64>,
    ) -> Result<(ListingBatch, ListingBatch), FetchError> {
        let all = ListingBatch::from_listings(self.fetch(start_timestamp).await?);
        let new = select_new(&all, seen);
        Ok((new, all))
    }
}

/// `all` minus ids already seen for the listing's category.
pub fn select_new(all: &ListingBatch, seen: &DedupState) -> ListingBatch {
    let mut out = ListingBatch::default();
    for category in Category::ALL {
        *out.get_mut(category) = all
            .get(category)
            .iter()
            .filter(|l| !seen.contains(category, &l.id))
            .cloned()
            .collect();
    }
    out
}

/// Decode the feed body and apply the retention rules.
///
/// The feed is assumed newest-first: decoding stops at the first record posted
/// before `start_timestamp`. If upstream ever reorders, older-but-relevant
/// records behind that point are dropped.
pub fn parse_feed(body: &str, start_timestamp: Option<i64>) -> Result<Vec<Listing>, FetchError> {
    let records: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let total = records.len();

    let mut out = Vec::new();
    let mut invalid = 0usize;
    let mut hidden = 0usize;
    let mut stopped_at = None;

    for (idx, raw) in records.into_iter().enumerate() {
        let listing: Listing = match serde_json::from_value(raw) {
            Ok(l) => l,
            Err(e) => {
                invalid += 1;
                tracing::warn!(target: "ingest", error = %e, index = idx, "skipping malformed listing");
                continue;
            }
        };

        if let Some(start) = start_timestamp {
            if listing.date_posted < start {
                stopped_at = Some(idx);
                break;
            }
            if listing.date_posted <= start {
                continue;
            }
        }

        if !listing.is_postable() {
            hidden += 1;
            continue;
        }
        out.push(listing);
    }

    tracing::info!(
        target: "ingest",
        total,
        kept = out.len(),
        invalid,
        hidden,
        stopped_at = ?stopped_at,
        "feed parsed"
    );
    Ok(out)
}

/// Fetches the listings JSON published in a GitHub repository.
#[derive(Clone)]
pub struct GithubListingsClient {
    url: String,
    token: Option<String>,
    client: Client,
    timeout: Duration,
}

impl GithubListingsClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Optional credential for the higher authenticated rate limit.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_body(&self) -> Result<String, FetchError> {
        let mut req = self.client.get(&self.url).timeout(self.timeout);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: self.url.clone(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        // raw.githubusercontent.com serves JSON as text/plain, so decode ourselves.
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl ListingSource for GithubListingsClient {
    async fn fetch(&self, start_timestamp: Option<i64>) -> Result<Vec<Listing>, FetchError> {
        let t0 = std::time::Instant::now();
        let body = self.fetch_body().await?;
        let listings = parse_feed(&body, start_timestamp)?;

        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("listings_fetched_total").increment(listings.len() as u64);
        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "github"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, terms: &[&str], ts: i64, active: bool, visible: bool) -> serde_json::Value {
        json!({
            "id": id,
            "company_name": "Acme",
            "title": "Intern",
            "locations": ["Remote"],
            "terms": terms,
            "sponsorship": "",
            "active": active,
            "is_visible": visible,
            "url": format!("https://example.com/{id}"),
            "date_posted": ts,
            "date_updated": ts
        })
    }

    #[test]
    fn boundary_timestamp_is_excluded_but_does_not_stop() {
        let body = json!([
            record("a", &["Summer 2026"], 200, true, true),
            record("b", &["Summer 2026"], 100, true, true),
            record("c", &["Summer 2026"], 150, true, true),
        ])
        .to_string();
        let out = parse_feed(&body, Some(100)).unwrap();
        let ids: Vec<_> = out.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn older_record_stops_the_scan_even_if_newer_ones_follow() {
        let body = json!([
            record("a", &["Summer 2026"], 300, true, true),
            record("b", &["Summer 2026"], 50, true, true),
            record("c", &["Summer 2026"], 250, true, true),
        ])
        .to_string();
        let out = parse_feed(&body, Some(100)).unwrap();
        let ids: Vec<_> = out.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn no_start_timestamp_keeps_everything_postable() {
        let body = json!([
            record("a", &["Summer 2026"], 5, true, true),
            record("b", &["Fall 2025"], 1, true, false),
        ])
        .to_string();
        let out = parse_feed(&body, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn non_array_body_is_a_parse_error() {
        let err = parse_feed(r#"{"listings": []}"#, None).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn malformed_record_is_skipped() {
        let body = json!([
            {"id": "broken"},
            record("ok", &["Summer 2026"], 10, true, true),
        ])
        .to_string();
        let out = parse_feed(&body, Some(1)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "ok");
    }

    #[test]
    fn blank_token_is_ignored() {
        let c = GithubListingsClient::new("http://x").with_token(Some("  ".into()));
        assert!(c.token.is_none());
    }
}
