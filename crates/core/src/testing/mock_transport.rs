//! Mock transport for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::client::{ApiResponse, ApiTransport, ClientError, QueryParams};

/// A recorded request for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A response with the given status, body and optional `Link` header.
    Response {
        status: u16,
        body: String,
        link: Option<String>,
    },
    /// A transport failure, as surfaced after the retry budget is spent.
    Timeout,
}

impl MockReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockReply::Response {
            status,
            body: body.to_string(),
            link: None,
        }
    }

    pub fn status(status: u16) -> Self {
        MockReply::Response {
            status,
            body: String::new(),
            link: None,
        }
    }

    /// Attach a `Link` header. No-op on [`MockReply::Timeout`].
    pub fn with_link(mut self, value: impl Into<String>) -> Self {
        if let MockReply::Response { link, .. } = &mut self {
            *link = Some(value.into());
        }
        self
    }
}

/// Mock implementation of the ApiTransport trait.
///
/// Provides controllable behavior for testing:
/// - Scripted replies per route (a route is the URL plus its `page` parameter)
/// - Reply sequences; the last reply of a sequence repeats
/// - Request recording and in-flight tracking for concurrency assertions
///
/// Unscripted routes answer `404`.
///
/// # Example
///
/// ```rust,ignore
/// use prharvest_core::testing::{MockReply, MockTransport};
///
/// let transport = MockTransport::new();
/// transport
///     .reply("http://mock/repos/o/r/pulls?page=1", MockReply::json(200, json!([])))
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    routes: Arc<RwLock<HashMap<String, VecDeque<MockReply>>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    latency: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Base URL to use for endpoints pointed at this transport.
    pub const BASE_URL: &'static str = "http://mock.api";

    /// Create a new mock transport with no routes.
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn route_key(url: &str, params: QueryParams<'_>) -> String {
        match params.iter().find(|(k, _)| *k == "page") {
            Some((_, page)) if !url.contains('?') => format!("{}?page={}", url, page),
            _ => url.to_string(),
        }
    }

    /// Always answer `route` with `reply`.
    pub async fn reply(&self, route: &str, reply: MockReply) {
        self.reply_sequence(route, vec![reply]).await;
    }

    /// Answer `route` with each reply in turn, repeating the last one.
    pub async fn reply_sequence(&self, route: &str, replies: Vec<MockReply>) {
        self.routes
            .write()
            .await
            .insert(route.to_string(), replies.into_iter().collect());
    }

    /// Delay every reply by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// All requests received so far.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Requests whose URL starts with `prefix`.
    pub async fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Highest number of requests observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn next_reply(&self, key: &str) -> Option<MockReply> {
        let mut routes = self.routes.write().await;
        let queue = routes.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn get(&self, url: &str, params: QueryParams<'_>) -> Result<ApiResponse, ClientError> {
        self.requests.write().await.push(RecordedRequest {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let key = Self::route_key(url, params);
        let reply = self.next_reply(&key).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(MockReply::Response { status, body, link }) => {
                let mut response = ApiResponse::new(url, status, body);
                response.link = link;
                Ok(response)
            }
            Some(MockReply::Timeout) => Err(ClientError::Timeout {
                url: url.to_string(),
            }),
            None => Ok(ApiResponse::new(url, 404, r#"{"message":"Not Found"}"#)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_page_param_selects_route() {
        let transport = MockTransport::new();
        transport
            .reply("http://mock.api/list?page=2", MockReply::json(200, json!([2])))
            .await;

        let resp = transport
            .get("http://mock.api/list", &[("page", "2".to_string())])
            .await
            .unwrap();
        assert_eq!(resp.body, "[2]");

        let missing = transport
            .get("http://mock.api/list", &[("page", "3".to_string())])
            .await
            .unwrap();
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let transport = MockTransport::new();
        transport
            .reply_sequence(
                "http://mock.api/x",
                vec![MockReply::Timeout, MockReply::status(204)],
            )
            .await;

        assert!(transport.get("http://mock.api/x", &[]).await.is_err());
        for _ in 0..3 {
            let resp = transport.get("http://mock.api/x", &[]).await.unwrap();
            assert_eq!(resp.status, 204);
        }
        assert_eq!(transport.recorded_requests().await.len(), 4);
    }
}
