//! Bounded, oldest-evicted record of recent optimization rounds.

use super::types::OptimizationEntry;

/// Fixed-capacity history owned by the controller.
///
/// Entries are kept oldest first. Recording past capacity drops entries
/// from the front. A capacity of zero keeps nothing.
#[derive(Debug, Clone, Default)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: Vec<OptimizationEntry>,
}

impl HistoryBuffer {
    /// Create an empty buffer holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append an entry, evicting the oldest ones beyond capacity.
    pub fn record(&mut self, entry: OptimizationEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }

    /// Recent entries, oldest first.
    pub fn recent(&self) -> &[OptimizationEntry] {
        &self.entries
    }

    /// Most recently recorded entry still held.
    pub fn latest(&self) -> Option<&OptimizationEntry> {
        self.entries.last()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render history as pretty JSON for embedding in a generator request.
pub fn history_for_prompt(history: &[OptimizationEntry]) -> String {
    if history.is_empty() {
        return "No previous rounds.".to_string();
    }
    serde_json::to_string_pretty(history).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialize optimization history");
        "History unavailable.".to_string()
    })
}
