use std::time::Duration;

use serde::de::DeserializeOwned;

use super::ClientError;

/// Longest slice of an error body kept in [`ClientError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// URL the request was sent to (without query parameters).
    pub url: String,
    pub status: u16,
    /// Raw `Link` header, if any.
    pub link: Option<String>,
    /// `Retry-After` expressed in seconds, if the server sent one.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            link: None,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`ClientError::Status`].
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ClientError::Status {
            url: self.url,
            status: self.status,
            body: self.body.chars().take(ERROR_BODY_LIMIT).collect(),
        })
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|e| ClientError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

/// Parse a delta-seconds `Retry-After` value. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Thing {
        name: String,
    }

    #[test]
    fn test_error_for_status_passes_success() {
        let resp = ApiResponse::new("https://x/y", 204, "");
        assert!(resp.error_for_status().is_ok());
    }

    #[test]
    fn test_error_for_status_truncates_body() {
        let resp = ApiResponse::new("https://x/y", 403, "x".repeat(1000));
        match resp.error_for_status() {
            Err(ClientError::Status { status, body, .. }) => {
                assert_eq!(status, 403);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_json_decode() {
        let resp = ApiResponse::new("https://x/y", 200, r#"{"name":"widget"}"#);
        let thing: Thing = resp.json().unwrap();
        assert_eq!(thing.name, "widget");
    }

    #[test]
    fn test_json_decode_error_is_typed() {
        let resp = ApiResponse::new("https://x/y", 200, r#"{"nom":"widget"}"#);
        let err = resp.json::<Thing>().unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
