//! In-memory transport for tests and offline runs.
//!
//! Records every request and answers from a per-path script, falling back to
//! a default reply.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::transport::{OutboundRequest, Transport, TransportResponse};

#[derive(Debug, Clone)]
pub enum MockReply {
    Respond { status: u16, body: Value },
    Fail(String),
}

impl MockReply {
    pub fn ok(body: Value) -> Self {
        MockReply::Respond { status: 200, body }
    }

    pub fn status(status: u16, body: Value) -> Self {
        MockReply::Respond { status, body }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

pub struct MockTransport {
    replies: Mutex<HashMap<String, MockReply>>,
    default_reply: MockReply,
    delay: Option<Duration>,
    requests: Mutex<Vec<OutboundRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Answers every path with `200 {"status_code": 0}`.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            default_reply: MockReply::ok(json!({ "status_code": 0 })),
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    pub fn with_reply(self, path: &str, reply: MockReply) -> Self {
        match self.replies.lock() {
            Ok(mut replies) => {
                replies.insert(path.to_string(), reply);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(path.to_string(), reply);
            }
        }
        self
    }

    /// Hold each request open for `delay` (tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        match self.requests.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Highest number of requests that were open at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, path: &str) -> MockReply {
        let replies = match self.replies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        replies
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse> {
        let reply = self.reply_for(&request.path);
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Respond { status, body } => Ok(TransportResponse { status, body }),
            MockReply::Fail(message) => Err(Error::msg(message)),
        }
    }
}
