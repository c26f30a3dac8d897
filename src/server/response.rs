//! JSON responses serialized straight to HTTP/1.1 bytes.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{Error, ErrorKind};

#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Serialize `value` as the body. A value that cannot be serialized
    /// becomes a 500.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                body,
                keep_alive: true,
            },
            Err(e) => {
                error!(error = %e, "response serialization failed");
                Self::message(500, "Something went wrong, please try again")
            }
        }
    }

    /// `{"error": message}` with the given status.
    pub fn message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }).to_string().into_bytes(),
            keep_alive: true,
        }
    }

    /// Map a service error to a status and its generic user-facing message.
    pub fn from_error(err: &Error) -> Self {
        Self::message(status_for(err.kind()), &err.user_message())
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> BytesMut {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
            self.status,
            reason_phrase(self.status),
            self.body.len(),
            if self.keep_alive { "keep-alive" } else { "close" },
        );
        let mut buf = BytesMut::with_capacity(head.len() + self.body.len());
        buf.put_slice(head.as_bytes());
        buf.put_slice(&self.body);
        buf
    }
}

pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidInput => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::UpstreamUnavailable | ErrorKind::Timeout | ErrorKind::RetriesExhausted => 502,
        ErrorKind::Configuration | ErrorKind::Internal => 500,
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_hide_upstream_detail() {
        let err = Error::Upstream {
            status: 503,
            message: "secret provider text".into(),
            retryable: true,
        };
        let response = Response::from_error(&err);
        assert_eq!(response.status(), 502);
        let text = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.starts_with("{\"error\":"));
    }

    #[test]
    fn serializes_head_and_body() {
        let bytes = Response::json(200, &json!({ "ok": true }))
            .keep_alive(false)
            .into_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 11\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("{\"ok\":true}"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidInput), 400);
        assert_eq!(status_for(ErrorKind::NotFound), 404);
        assert_eq!(status_for(ErrorKind::Configuration), 500);
        assert_eq!(status_for(ErrorKind::RetriesExhausted), 502);
        assert_eq!(status_for(ErrorKind::Timeout), 502);
    }
}
