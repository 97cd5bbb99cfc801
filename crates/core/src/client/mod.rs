//! HTTP access to the upstream REST API.
//!
//! Components never talk to `reqwest` directly; they receive an
//! `Arc<dyn ApiTransport>`. [`ResilientClient`] is the production
//! implementation and `testing::MockTransport` the scripted fake.

mod resilient;
mod response;

pub use resilient::ResilientClient;
pub use response::ApiResponse;

use async_trait::async_trait;
use thiserror::Error;

/// Query parameters for a GET request.
pub type QueryParams<'a> = &'a [(&'a str, String)];

/// Errors that can occur when talking to the upstream API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The attempt exceeded the per-request timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Could not establish a connection.
    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// Any other transport-level failure.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Final response had a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A paginated list kept advertising more pages past the limit.
    #[error("list at {url} has more than {limit} pages")]
    PageLimit { url: String, limit: usize },

    /// A configured header value is not a valid HTTP header.
    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// Transient transport failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout { .. } | ClientError::Connect { .. })
    }

    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            ClientError::Timeout { url }
        } else if e.is_connect() {
            ClientError::Connect {
                url,
                message: e.to_string(),
            }
        } else {
            ClientError::Transport {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// A GET-only transport to the upstream API.
///
/// Implementations must be safe to share between many concurrent tasks.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Issue a GET request.
    ///
    /// Non-2xx responses are returned as `Ok`; callers decide whether the
    /// status is fatal via [`ApiResponse::error_for_status`].
    async fn get(&self, url: &str, params: QueryParams<'_>) -> Result<ApiResponse, ClientError>;
}
