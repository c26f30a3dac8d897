//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{Error, ErrorContext, Result};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed inbound request. Query parameters are percent-decoded.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    path: String,
    version: u8,
    headers: HashMap<String, String>,
    params: HashMap<String, String>,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parse the request head from `buf`.
    ///
    /// Returns the request with an empty body and the offset at which the body
    /// begins. The caller attaches the body with [`Request::with_body`] once it
    /// is fully buffered.
    pub fn parse(buf: &[u8]) -> std::result::Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = raw
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .to_ascii_uppercase();
        let target = raw
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let version = raw
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        let mut header_map = HashMap::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name.to_ascii_lowercase(), value.trim().to_string());
            }
        }

        Ok((
            Self {
                method,
                path: path.to_string(),
                version,
                headers: header_map,
                params,
                body: Bytes::new(),
            },
            body_offset,
        ))
    }

    /// Replace the buffered body with exactly `body`.
    pub(crate) fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the body as JSON. Malformed bodies are the caller's fault.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::validation_with_context(
                "request body is not valid JSON for this endpoint",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("request_body"),
            )
        })
    }

    /// HTTP/1.1 keeps the connection open unless told otherwise.
    pub fn is_keep_alive(&self) -> bool {
        match self.header("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.parse().ok()
    }
}
