#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tutorsheet_client::{ClientConfig, HttpResponse, HttpTransport, SheetService};
use tutorsheet_core::TransportError;

/// Scripted answer for one kind of request.
#[derive(Debug, Clone)]
pub struct Reply {
    delay: Duration,
    result: Result<HttpResponse, TransportError>,
}

impl Reply {
    pub fn csv(text: &str) -> Self {
        Self::body(200, text)
    }

    pub fn json(value: Value) -> Self {
        Self::body(200, &value.to_string())
    }

    pub fn body(status: u16, body: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::body(status, "")
    }

    pub fn unreachable() -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(TransportError::Connection {
                url: "mock".to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Transport that answers from scripted replies and counts calls.
///
/// Requests to the export host get `export`; GETs to anything else get
/// `script_get`; POSTs get `script_post`.
pub struct MockTransport {
    export: Mutex<Reply>,
    script_get: Mutex<Reply>,
    script_post: Mutex<Reply>,
    pub export_calls: AtomicUsize,
    pub script_get_calls: AtomicUsize,
    pub script_post_calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    posted: Mutex<Vec<Value>>,
}

pub const EXPORT_HOST: &str = "https://docs.google.com/";

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            export: Mutex::new(Reply::status(404)),
            script_get: Mutex::new(Reply::status(404)),
            script_post: Mutex::new(Reply::status(404)),
            export_calls: AtomicUsize::new(0),
            script_get_calls: AtomicUsize::new(0),
            script_post_calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
        })
    }

    pub fn on_export(&self, reply: Reply) {
        *self.export.lock().unwrap() = reply;
    }

    pub fn on_script_get(&self, reply: Reply) {
        *self.script_get.lock().unwrap() = reply;
    }

    pub fn on_script_post(&self, reply: Reply) {
        *self.script_post.lock().unwrap() = reply;
    }

    pub fn exports(&self) -> usize {
        self.export_calls.load(Ordering::SeqCst)
    }

    pub fn script_gets(&self) -> usize {
        self.script_get_calls.load(Ordering::SeqCst)
    }

    pub fn script_posts(&self) -> usize {
        self.script_post_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.exports() + self.script_gets() + self.script_posts()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    async fn answer(reply: Reply) -> Result<HttpResponse, TransportError> {
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        let reply = if url.starts_with(EXPORT_HOST) {
            self.export_calls.fetch_add(1, Ordering::SeqCst);
            self.export.lock().unwrap().clone()
        } else {
            self.script_get_calls.fetch_add(1, Ordering::SeqCst);
            self.script_get.lock().unwrap().clone()
        };
        Self::answer(reply).await
    }

    async fn post_text(&self, url: &str, body: String) -> Result<HttpResponse, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        self.script_post_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(value) = serde_json::from_str(&body) {
            self.posted.lock().unwrap().push(value);
        }
        let reply = self.script_post.lock().unwrap().clone();
        Self::answer(reply).await
    }
}

/// Service with default config over `transport`.
pub fn service_with(transport: &Arc<MockTransport>) -> SheetService {
    service_with_config(transport, &ClientConfig::default())
}

pub fn service_with_config(transport: &Arc<MockTransport>, config: &ClientConfig) -> SheetService {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    SheetService::new(transport, config)
}
