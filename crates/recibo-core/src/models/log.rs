//! Diagnostic log of provider traffic, shown to the user next to a document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// Kind of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Request,
    Response,
    Error,
}

/// One entry of the API log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub data: Value,
}

impl ApiLogEntry {
    pub fn new(kind: LogKind, data: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            data,
        }
    }
}

/// Receiver of API log entries.
pub trait ApiLogSink: Send + Sync {
    fn add_log(&self, kind: LogKind, data: Value);
}

/// Append-only, thread-safe log scoped to one document.
#[derive(Debug, Default)]
pub struct ApiLog {
    entries: Mutex<Vec<ApiLogEntry>>,
}

impl ApiLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<ApiLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.entries.lock() {
            Ok(mut entries) => entries.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ApiLogSink for ApiLog {
    fn add_log(&self, kind: LogKind, data: Value) {
        let entry = ApiLogEntry::new(kind, data);
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Sink that drops every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ApiLogSink for NoopSink {
    fn add_log(&self, _kind: LogKind, _data: Value) {}
}

/// Adapter turning a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> ApiLogSink for FnSink<F>
where
    F: Fn(LogKind, Value) + Send + Sync,
{
    fn add_log(&self, kind: LogKind, data: Value) {
        (self.0)(kind, data)
    }
}

/// Forward to an optional sink.
pub(crate) fn emit(sink: Option<&dyn ApiLogSink>, kind: LogKind, data: Value) {
    if let Some(sink) = sink {
        sink.add_log(kind, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_log_is_append_only_until_cleared() {
        let log = ApiLog::new();
        log.add_log(LogKind::Request, json!({"chunk": 1}));
        log.add_log(LogKind::Error, json!({"message": "boom"}));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, LogKind::Request);
        assert_eq!(entries[1].data["message"], "boom");
        assert!(entries[0].timestamp <= entries[1].timestamp);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = ApiLogEntry::new(LogKind::Response, json!({}));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "response");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_fn_sink_and_missing_sink() {
        let count = AtomicUsize::new(0);
        let sink = FnSink(|_kind: LogKind, _data: Value| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        emit(Some(&sink as &dyn ApiLogSink), LogKind::Request, json!(null));
        emit(None, LogKind::Request, json!(null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
