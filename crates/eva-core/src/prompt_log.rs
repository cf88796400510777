//! Run log — the observability sink the orchestrator reports to.
//!
//! `PromptLog` keeps the most recent entries in memory (served by the
//! `/api/prompt_logs` route) and mirrors every entry to `tracing`.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Local;
use serde::Serialize;
use serde_json::Value;

/// Entries kept before the oldest are dropped.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Longer entry contents are cut to this many characters.
pub const MAX_CONTENT_CHARS: usize = 66_000;

/// Receives `(category, text, metadata)` reports. Must never block or fail the caller.
pub trait RunLogger: Send + Sync {
    fn log(&self, category: &str, text: &str, metadata: Option<Value>);
}

/// Logger that only forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl RunLogger for TracingLogger {
    fn log(&self, category: &str, text: &str, metadata: Option<Value>) {
        emit_trace(category, text, metadata.as_ref());
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromptLogEntry {
    /// Local wall-clock time, `HH:MM:SS`
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub metadata: Value,
}

/// Bounded in-memory log with keep-last-N semantics.
#[derive(Debug)]
pub struct PromptLog {
    capacity: usize,
    entries: Mutex<VecDeque<PromptLogEntry>>,
}

impl Default for PromptLog {
    fn default() -> Self {
        Self::new(MAX_LOG_ENTRIES)
    }
}

impl PromptLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn entries(&self) -> Vec<PromptLogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PromptLogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunLogger for PromptLog {
    fn log(&self, category: &str, text: &str, metadata: Option<Value>) {
        emit_trace(category, text, metadata.as_ref());

        let entry = PromptLogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            kind: category.to_string(),
            content: truncate_chars(text, MAX_CONTENT_CHARS),
            metadata: metadata.unwrap_or_else(|| Value::Object(Default::default())),
        };

        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}

fn emit_trace(category: &str, text: &str, metadata: Option<&Value>) {
    let preview = truncate_chars(text, 200);
    match metadata {
        Some(meta) => tracing::info!("[RunLog:{}] {} {}", category, preview, meta),
        None => tracing::info!("[RunLog:{}] {}", category, preview),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
