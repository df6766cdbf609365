// tests/common/mod.rs
// Shared test doubles: in-memory feeds, a recording publisher, a local webhook.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use news_digest_etl::ingest::types::{FeedFetcher, FeedSource};
use news_digest_etl::ingest::FeedAggregator;
use news_digest_etl::notify::{Ack, DeliveryError, Publisher};
use news_digest_etl::orchestrator::{Orchestrator, FETCH_TOOL, PUBLISH_TOOL};
use news_digest_etl::reasoning::ScriptedClient;
use news_digest_etl::store::{Db, PersistedState};

pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {path}: {e}"))
}

pub fn source(id: &str, name: &str, url: &str) -> FeedSource {
    FeedSource {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
    }
}

/// Source A (2 RSS items) followed by source B (3 Atom entries).
pub fn two_sources() -> Vec<FeedSource> {
    vec![
        source("a", "Source A", "mem://a"),
        source("b", "Source B", "mem://b"),
    ]
}

/// Serves bodies by URL from memory and records every URL requested.
#[derive(Default)]
pub struct MapFetcher {
    bodies: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixtures() -> Self {
        let f = Self::new();
        f.serve("mem://a", &fixture("source_a.xml"));
        f.serve("mem://b", &fixture("source_b.xml"));
        f.serve("mem://long", &fixture("source_long.xml"));
        f.serve("mem://broken", &fixture("broken.xml"));
        f.serve("mem://wordpress", &fixture("wordpress_atom.xml"));
        f.serve("mem://interleaved", &fixture("rss_interleaved.xml"));
        f.fail("mem://down", "connection refused");
        f
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.to_string()));
    }

    pub fn fail(&self, url: &str, reason: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(reason.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.bodies.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(reason)) => Err(anyhow!("{reason}")),
            None => Err(anyhow!("404 Not Found")),
        }
    }
}

/// Records every message; optionally rejects all of them.
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<String>>,
    reject_with: Option<u16>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(status_code: u16) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_with: Some(status_code),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, message: &str) -> Result<Ack, DeliveryError> {
        self.sent.lock().unwrap().push(message.to_string());
        match self.reject_with {
            Some(status_code) => Err(DeliveryError::Rejected {
                status_code,
                body: "invalid_payload".to_string(),
            }),
            None => Ok(Ack::Delivered { http_status: 200 }),
        }
    }
}

pub const DIGEST: &str = "Daily digest: yen, AI venture, box office, economy.";

/// Queue the two replies of a well-behaved run.
pub fn script_happy_run(client: &ScriptedClient, digest: &str) {
    client
        .push_call(FETCH_TOOL, json!({"category": "topic", "limit": 5}))
        .push_call(PUBLISH_TOOL, json!({ "message": digest }));
}

pub struct Harness {
    pub client: Arc<ScriptedClient>,
    pub fetcher: Arc<MapFetcher>,
    pub publisher: Arc<RecordingPublisher>,
    pub db: Arc<Db>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self::with_publisher(sources, RecordingPublisher::new())
    }

    pub fn with_publisher(sources: Vec<FeedSource>, publisher: RecordingPublisher) -> Self {
        let client = Arc::new(ScriptedClient::new());
        let fetcher = Arc::new(MapFetcher::with_fixtures());
        let publisher = Arc::new(publisher);
        let db = Arc::new(Db::in_memory(PersistedState {
            news_sources: sources,
            ..Default::default()
        }));
        let orchestrator = Arc::new(Orchestrator::new(
            client.clone(),
            FeedAggregator::new(fetcher.clone()),
            publisher.clone(),
            Arc::clone(&db),
        ));
        Self {
            client,
            fetcher,
            publisher,
            db,
            orchestrator,
        }
    }
}

/// Local incoming-webhook endpoint. Replies with `status` and records JSON bodies.
pub struct WebhookSink {
    pub url: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

#[derive(Clone)]
struct SinkState {
    status: StatusCode,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn sink(State(state): State<SinkState>, Json(body): Json<Value>) -> (StatusCode, &'static str) {
    state.received.lock().unwrap().push(body);
    let reply = if state.status.is_success() { "ok" } else { "invalid_payload" };
    (state.status, reply)
}

pub async fn spawn_webhook(status: StatusCode) -> WebhookSink {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/hook", post(sink)).with_state(SinkState {
        status,
        received: received.clone(),
    });
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    WebhookSink {
        url: format!("http://{addr}/hook"),
        received,
    }
}

/// Serves fixture feeds over real HTTP; `/missing` answers 404.
pub async fn spawn_feed_server() -> String {
    let a = fixture("source_a.xml");
    let b = fixture("source_b.xml");
    let app = Router::new()
        .route("/a.xml", axum::routing::get(move || async move { a }))
        .route("/b.xml", axum::routing::get(move || async move { b }));
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

