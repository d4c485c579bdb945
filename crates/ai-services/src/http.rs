//! Shared request plumbing for the HTTP service clients

use std::time::Duration;

use aibridge_session_core::services::ServiceError;
use tracing::warn;

/// Longest error body kept in a [`ServiceError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Connection settings shared by every client
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Whole-request timeout enforced by the HTTP client
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl HttpSettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn client(&self) -> Result<reqwest::Client, ServiceError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("aibridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::NotConfigured(format!("HTTP client: {e}")))
    }

    /// Classify a failed request
    pub(crate) fn request_error(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.timeout)
        } else if err.is_connect() || err.is_request() {
            ServiceError::Unreachable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ServiceError::InvalidResponse(err.to_string())
        } else {
            ServiceError::Unreachable(err.to_string())
        }
    }
}

/// Turn a non-success status into [`ServiceError::Status`]
pub(crate) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    warn!(service, status = status.as_u16(), body = %body, "Service returned an error");
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:11434/", "/api/chat"),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(join_url("http://tts:5050", "v1/audio/speech"), "http://tts:5050/v1/audio/speech");
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpSettings::default().with_timeout(Duration::from_secs(1)).client().is_ok());
    }
}
