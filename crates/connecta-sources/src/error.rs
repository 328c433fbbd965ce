//! Error types for connecta-sources

use thiserror::Error;

/// Errors a data-source collaborator can report for a single request
#[derive(Error, Debug)]
pub enum SourceError {
    /// The request never produced a response (DNS, connect, timeout, ...)
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// The body could not be decoded as JSON
    #[error("Response decoding failed: {0}")]
    Decode(String),

    /// Single-record lookup found nothing
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The collaborator itself is misconfigured
    #[error("Source is not configured: {0}")]
    Config(String),

    /// IO error (fixture loading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (fixture loading)
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    /// Short machine-readable classification, stable across versions.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Network { .. } => "network",
            SourceError::Http { .. } => "http",
            SourceError::Decode(_) | SourceError::Json(_) => "decode",
            SourceError::NotFound { .. } => "not_found",
            SourceError::Config(_) => "config",
            SourceError::Io(_) => "io",
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Http { status, .. } => Some(*status),
            SourceError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                url,
                status: status.as_u16(),
            }
        } else {
            SourceError::Network {
                url,
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_displays_status_and_url() {
        let err = SourceError::Http {
            url: "https://api.example/api/users".to_string(),
            status: 502,
        };
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("/api/users"));
        assert_eq!(err.kind(), "http");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_not_found_reports_404() {
        let err = SourceError::NotFound {
            collection: "users".to_string(),
            id: "u-1".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("users/u-1"));
    }

    #[test]
    fn test_json_error_is_classified_as_decode() {
        let err: SourceError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "decode");
        assert_eq!(err.status(), None);
    }
}
