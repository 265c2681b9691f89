//! Error types for the client.

use bytes::Bytes;
use datomic_edn::CodecError;
use std::borrow::Cow;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to a Datomic REST service.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection, DNS, timeout or stream read failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message reported by the HTTP layer.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}: {}", preview(.body))]
    Protocol {
        /// HTTP status code.
        status: u16,
        /// Response headers, in the order received.
        headers: Vec<(String, String)>,
        /// Raw response body, usually the server's diagnostic text.
        body: Bytes,
    },

    /// A payload could not be written as EDN. Raised before any request.
    #[error("encoding error: {0}")]
    Encoding(#[source] CodecError),

    /// A response body was not valid EDN (or not valid UTF-8).
    #[error("decoding error: {message}")]
    Decoding {
        /// Description of the decoding failure.
        message: String,
    },
}

impl ClientError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a decoding error.
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Returns the HTTP status of a protocol error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw body of a protocol error.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            ClientError::Protocol { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns the body of a protocol error as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body().map(|b| String::from_utf8_lossy(b))
    }

    /// Returns true for connection-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// Returns true for non-success HTTP statuses.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ClientError::Protocol { .. })
    }
}

/// First line of a body, capped for display.
fn preview(body: &Bytes) -> String {
    const MAX: usize = 200;
    let text = String::from_utf8_lossy(body);
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > MAX {
        let cut: String = line.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_exposes_status_and_body() {
        let err = ClientError::Protocol {
            status: 500,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: Bytes::from_static(b"Server Error\nstack trace"),
        };

        assert!(err.is_protocol());
        assert!(!err.is_transport());
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.body_text().unwrap(), "Server Error\nstack trace");
        assert_eq!(err.to_string(), "server returned HTTP 500: Server Error");
    }

    #[test]
    fn transport_error_has_no_status() {
        let err = ClientError::transport("connection refused");
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
        assert!(err.body().is_none());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn long_bodies_are_truncated_in_display() {
        let err = ClientError::Protocol {
            status: 400,
            headers: Vec::new(),
            body: Bytes::from("x".repeat(500)),
        };
        let shown = err.to_string();
        assert!(shown.ends_with("..."));
        assert!(shown.len() < 300);
    }
}
