// tests/common/mod.rs
//
// Local stand-ins for the upstream feed and the webhook endpoints, bound to
// 127.0.0.1:0 so every test gets its own ports.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub fn listing_json(id: &str, terms: &[&str], date_posted: i64) -> Value {
    json!({
        "id": id,
        "title": format!("Intern {id}"),
        "company_name": "Acme",
        "url": format!("https://jobs.example.com/{id}"),
        "terms": terms,
        "locations": ["Remote"],
        "date_posted": date_posted,
        "active": true,
        "is_visible": true,
        "sponsorship": "Offers Sponsorship"
    })
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

#[derive(Clone, Default)]
pub struct FeedState {
    pub status: Arc<Mutex<u16>>,
    pub body: Arc<Mutex<String>>,
    pub auth_headers: Arc<Mutex<Vec<Option<String>>>>,
}

impl FeedState {
    pub fn set_listings(&self, listings: Vec<Value>) {
        *self.body.lock().unwrap() = Value::Array(listings).to_string();
        *self.status.lock().unwrap() = 200;
    }

    pub fn set_raw(&self, status: u16, body: &str) {
        *self.status.lock().unwrap() = status;
        *self.body.lock().unwrap() = body.to_string();
    }

    pub fn hits(&self) -> usize {
        self.auth_headers.lock().unwrap().len()
    }
}

async fn feed_handler(State(state): State<FeedState>, headers: HeaderMap) -> (StatusCode, String) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.auth_headers.lock().unwrap().push(auth);
    let status = StatusCode::from_u16(*state.status.lock().unwrap()).unwrap();
    (status, state.body.lock().unwrap().clone())
}

/// Returns the feed URL and a handle to change what it serves.
pub async fn spawn_feed() -> (String, FeedState) {
    let state = FeedState::default();
    state.set_listings(vec![]);
    let app = Router::new()
        .route("/listings.json", get(feed_handler))
        .with_state(state.clone());
    let base = serve(app).await;
    (format!("{base}/listings.json"), state)
}

/// Hooks named `down*` answer 500; every other name accepts and records.
#[derive(Clone, Default)]
pub struct Hooks {
    pub base: String,
    pub received: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Hooks {
    pub fn url(&self, name: &str) -> String {
        format!("{}/hook/{name}", self.base)
    }

    /// Footer ids received by `name`, in arrival order.
    pub fn ids_for(&self, name: &str) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, body)| {
                body["embeds"][0]["footer"]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .trim_start_matches("ID: ")
                    .to_string()
            })
            .collect()
    }

    pub fn total(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

async fn hook_handler(
    State(hooks): State<Hooks>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    if name.starts_with("down") {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    hooks.received.lock().unwrap().push((name, body));
    StatusCode::NO_CONTENT
}

pub async fn spawn_hooks() -> Hooks {
    let mut hooks = Hooks::default();
    let app = Router::new()
        .route("/hook/{name}", post(hook_handler))
        .with_state(hooks.clone());
    hooks.base = serve(app).await;
    hooks
}
