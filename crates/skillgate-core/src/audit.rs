//! Bounded, append-only audit log.
//!
//! A single global sequence shared by all components. The log enforces a
//! hard cap: when an append pushes it past the cap, the oldest entries are
//! dropped and only the most recent `retain` entries survive, preserving
//! chronological order. Older entries are expected to have already been
//! appended to durable storage before truncation.

use std::sync::RwLock;

use skillgate_types::audit::{AuditEntry, AuditEventLevel};

/// Default hard cap on in-memory entries.
pub const DEFAULT_AUDIT_CAP: usize = 10_000;
/// Default number of most-recent entries retained after truncation.
pub const DEFAULT_AUDIT_RETAIN: usize = 5_000;

/// Append-only, size-bounded audit log.
///
/// Appends take a short write lock; reads clone out of a read lock. The
/// total order of entries is the append order, which is the single global
/// audit order for the whole orchestrator.
#[derive(Debug)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    cap: usize,
    retain: usize,
}

impl AuditLog {
    /// Create a log with the given cap and post-truncation retention.
    ///
    /// `retain` is clamped to `cap`.
    pub fn new(cap: usize, retain: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            cap,
            retain: retain.min(cap),
        }
    }

    /// Append an entry, truncating to the most recent `retain` entries if
    /// the cap is exceeded.
    pub fn append(&self, entry: AuditEntry) {
        let mut entries = self.entries.write().expect("audit log lock poisoned");
        entries.push(entry);
        if entries.len() > self.cap {
            let drop_count = entries.len() - self.retain;
            entries.drain(..drop_count);
        }
    }

    /// Build, append, and return a new entry.
    pub fn record(
        &self,
        level: AuditEventLevel,
        action: &str,
        user_id: Option<&str>,
        skill_id: Option<&str>,
        details: impl Into<String>,
    ) -> AuditEntry {
        let entry = AuditEntry::new(
            level,
            action,
            user_id.map(str::to_string),
            skill_id.map(str::to_string),
            details,
        );
        self.append(entry.clone());
        entry
    }

    /// The `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().expect("audit log lock poisoned");
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }

    /// All entries for a specific skill, in append order.
    pub fn for_skill(&self, skill_id: &str) -> Vec<AuditEntry> {
        let entries = self.entries.read().expect("audit log lock poisoned");
        entries
            .iter()
            .filter(|e| e.skill_id.as_deref() == Some(skill_id))
            .cloned()
            .collect()
    }

    /// Snapshot of the full in-memory sequence.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.read().expect("audit log lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed the log from persisted entries at startup. Entries beyond the
    /// retention target are dropped oldest-first.
    pub fn restore(&self, mut persisted: Vec<AuditEntry>) {
        if persisted.len() > self.retain {
            let drop_count = persisted.len() - self.retain;
            persisted.drain(..drop_count);
        }
        let mut entries = self.entries.write().expect("audit log lock poisoned");
        *entries = persisted;
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAP, DEFAULT_AUDIT_RETAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> AuditEntry {
        AuditEntry::new(
            AuditEventLevel::Info,
            "test_action",
            None,
            Some("audio-processor".to_string()),
            format!("entry {n}"),
        )
    }

    #[test]
    fn append_preserves_order() {
        let log = AuditLog::new(100, 50);
        for n in 0..10 {
            log.append(entry(n));
        }
        let all = log.snapshot();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0].details, "entry 0");
        assert_eq!(all[9].details, "entry 9");
    }

    #[test]
    fn exceeding_cap_truncates_to_most_recent() {
        let log = AuditLog::new(10_000, 5_000);
        for n in 0..10_001 {
            log.append(entry(n));
        }
        // The 10,001st append drops the oldest 5,001 entries.
        assert_eq!(log.len(), 5_000);
        let all = log.snapshot();
        assert_eq!(all[0].details, "entry 5001");
        assert_eq!(all[4_999].details, "entry 10000");
    }

    #[test]
    fn truncation_preserves_chronological_order() {
        let log = AuditLog::new(10, 5);
        for n in 0..11 {
            log.append(entry(n));
        }
        let all = log.snapshot();
        assert_eq!(all.len(), 5);
        for window in all.windows(2) {
            assert!(window[0].id < window[1].id);
        }
    }

    #[test]
    fn recent_returns_newest_oldest_first() {
        let log = AuditLog::new(100, 50);
        for n in 0..10 {
            log.append(entry(n));
        }
        let recent = log.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].details, "entry 7");
        assert_eq!(recent[2].details, "entry 9");
    }

    #[test]
    fn for_skill_filters_by_id() {
        let log = AuditLog::new(100, 50);
        log.append(entry(0));
        log.append(AuditEntry::new(
            AuditEventLevel::Info,
            "other",
            None,
            Some("video-encoder".to_string()),
            "other skill",
        ));
        log.append(entry(1));

        assert_eq!(log.for_skill("audio-processor").len(), 2);
        assert_eq!(log.for_skill("video-encoder").len(), 1);
        assert!(log.for_skill("missing").is_empty());
    }

    #[test]
    fn restore_drops_overflow_oldest_first() {
        let log = AuditLog::new(10, 5);
        let persisted: Vec<AuditEntry> = (0..8).map(entry).collect();
        log.restore(persisted);
        let all = log.snapshot();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].details, "entry 3");
    }
}
