//! Fingerprint deduplication: drop alert notifications that are not newer
//!
//! Alertmanager re-sends the same alert on every group interval and may
//! deliver notifications out of order. `Deduper` remembers the latest
//! accepted change time per fingerprint and only lets strictly newer
//! changes through.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Result of an `update_if_newer` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Whether the change time was stored
    pub accepted: bool,

    /// Change time stored before this call, `None` on first sight
    pub previous: Option<DateTime<Utc>>,
}

/// Per-fingerprint latest-change-time filter
///
/// Entries are never evicted; memory grows with the number of distinct
/// fingerprints seen by the process.
#[derive(Debug, Default)]
pub struct Deduper {
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Deduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `change_time` for `fingerprint` if it is strictly newer
    ///
    /// The compare and store happen under one lock, so racing updates for
    /// the same fingerprint never lose the maximum.
    pub fn update_if_newer(&self, fingerprint: &str, change_time: DateTime<Utc>) -> DedupOutcome {
        // Every critical section is a single map operation, so a poisoned
        // map is still consistent.
        let mut last_seen = self
            .last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match last_seen.get_mut(fingerprint) {
            None => {
                last_seen.insert(fingerprint.to_string(), change_time);
                DedupOutcome {
                    accepted: true,
                    previous: None,
                }
            }
            Some(stored) if change_time > *stored => {
                let previous = std::mem::replace(stored, change_time);
                DedupOutcome {
                    accepted: true,
                    previous: Some(previous),
                }
            }
            Some(stored) => DedupOutcome {
                accepted: false,
                previous: Some(*stored),
            },
        }
    }

    /// Number of fingerprints tracked
    pub fn len(&self) -> usize {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
