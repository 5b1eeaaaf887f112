//! In-memory publisher for testing and single-process use
//!
//! Records every successful publish in order. Failures can be scripted per
//! attempt to exercise partial-failure handling.

use super::EventPublisher;
use crate::error::{GatewayError, Result};
use crate::types::{Event, Subject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Builds the error returned for a scripted failure
type FailureFn = Box<dyn Fn() -> GatewayError + Send + Sync>;

/// Publisher that keeps published events in memory
#[derive(Default)]
pub struct MemoryPublisher {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    published: Vec<(Event, Subject)>,
    attempts: usize,
    failures: HashMap<usize, FailureFn>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `attempt`-th publish call (1-based) fail with `make_error()`
    pub fn fail_on(self, attempt: usize, make_error: impl Fn() -> GatewayError + Send + Sync + 'static) -> Self {
        self.lock().failures.insert(attempt, Box::new(make_error));
        self
    }

    /// Events published successfully, in order
    pub fn published(&self) -> Vec<(Event, Subject)> {
        self.lock().published.clone()
    }

    /// Number of publish calls made, successful or not
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &Event, subject: &Subject) -> Result<()> {
        let mut state = self.lock();
        state.attempts += 1;

        if let Some(make_error) = state.failures.get(&state.attempts) {
            return Err(make_error());
        }

        state.published.push((event.clone(), subject.clone()));
        tracing::debug!(
            event_id = %event.id,
            subject = %subject,
            "Event published"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
