//! Comment storage: an in-process store and a Firestore REST adapter.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use super::CommentStore;
use crate::config::CommentsConfig;
use crate::transport::HttpTransport;
use crate::types::Comment;
use crate::{Error, ErrorContext, Result};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bounded in-memory store; the oldest comments fall off past `capacity`.
pub struct MemoryCommentStore {
    comments: RwLock<VecDeque<Comment>>,
    capacity: usize,
}

impl MemoryCommentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            comments: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryCommentStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn append(&self, text: &str) -> Result<Comment> {
        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            timestamp: now_rfc3339(),
        };
        let mut comments = self
            .comments
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        comments.push_front(comment.clone());
        comments.truncate(self.capacity);
        Ok(comment)
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<Comment>> {
        Ok(self
            .comments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

const FIRESTORE: &str = "firestore";

/// Comments as documents in a Firestore collection, via the REST API.
pub struct FirestoreCommentStore {
    transport: HttpTransport,
    config: CommentsConfig,
}

impl FirestoreCommentStore {
    pub fn new(transport: HttpTransport, config: CommentsConfig) -> Self {
        Self { transport, config }
    }

    fn documents_root(&self) -> Result<String> {
        let project = self.config.firebase_project_id.as_deref().ok_or_else(|| {
            Error::configuration_with_context(
                "Firebase project id is not configured",
                ErrorContext::new()
                    .with_field_path("FIREBASE_PROJECT_ID")
                    .with_source(FIRESTORE),
            )
        })?;
        Ok(format!(
            "{}/projects/{}/databases/(default)/documents",
            self.config.firestore_base_url.trim_end_matches('/'),
            project
        ))
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.firebase_api_key.as_deref() {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }
}

/// Map a Firestore document resource into a [`Comment`]. The id is the last
/// path segment of the document name.
pub(crate) fn decode_document(doc: &Value) -> Option<Comment> {
    let id = doc.get("name")?.as_str()?.rsplit('/').next()?.to_string();
    let fields = doc.get("fields")?;
    let text = fields.pointer("/text/stringValue")?.as_str()?.to_string();
    let timestamp = fields
        .pointer("/timestamp/stringValue")
        .or_else(|| fields.pointer("/timestamp/timestampValue"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Comment {
        id,
        text,
        timestamp,
    })
}

#[async_trait]
impl CommentStore for FirestoreCommentStore {
    async fn append(&self, text: &str) -> Result<Comment> {
        let url = format!("{}/{}", self.documents_root()?, self.config.collection);
        let body = json!({
            "fields": {
                "text": { "stringValue": text },
                "timestamp": { "stringValue": now_rfc3339() },
            }
        });
        let request = self.with_key(self.transport.client().post(url).json(&body));
        let doc: Value = self.transport.send_json(FIRESTORE, request).await?;
        decode_document(&doc)
            .ok_or_else(|| Error::malformed_response(FIRESTORE, "created document lacks name or fields"))
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<Comment>> {
        let url = format!("{}:runQuery", self.documents_root()?);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.config.collection }],
                "orderBy": [{ "field": { "fieldPath": "timestamp" }, "direction": "DESCENDING" }],
                "limit": limit,
            }
        });
        let request = self.with_key(self.transport.client().post(url).json(&body));
        let rows: Vec<Value> = self.transport.send_json(FIRESTORE, request).await?;
        // rows without a "document" carry only read metadata
        Ok(rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(decode_document)
            .collect())
    }

    fn name(&self) -> &'static str {
        FIRESTORE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_returns_newest_first() {
        let store = MemoryCommentStore::new(10);
        store.append("first").await.unwrap();
        store.append("second").await.unwrap();
        let recent = store.query_recent(10).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
        assert_ne!(recent[0].id, recent[1].id);
    }

    #[tokio::test]
    async fn memory_store_caps_results_and_capacity() {
        let store = MemoryCommentStore::new(3);
        for i in 0..5 {
            store.append(&format!("c{}", i)).await.unwrap();
        }
        assert_eq!(store.query_recent(10).await.unwrap().len(), 3);
        assert_eq!(store.query_recent(2).await.unwrap()[0].text, "c4");
    }

    #[test]
    fn decodes_firestore_document() {
        let doc = json!({
            "name": "projects/vaderpoesi/databases/(default)/documents/comments/abc123",
            "fields": {
                "text": { "stringValue": "Vackert!" },
                "timestamp": { "stringValue": "2024-03-01T12:00:00.000Z" }
            }
        });
        let comment = decode_document(&doc).unwrap();
        assert_eq!(comment.id, "abc123");
        assert_eq!(comment.text, "Vackert!");
    }

    #[test]
    fn document_without_text_is_skipped() {
        let doc = json!({ "name": "x/y", "fields": {} });
        assert!(decode_document(&doc).is_none());
    }
}
