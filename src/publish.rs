//! Publish orchestration
//!
//! `PublishOrchestrator` pushes a batch of events through any
//! `EventPublisher`, writes exactly one audit record per attempt, and
//! reports how many made it. Cancellation or an exceeded deadline stops
//! the batch; any other failure is collected and the batch continues.

use crate::audit::{AuditRecord, AuditSink};
use crate::error::{GatewayError, Result};
use crate::provider::EventPublisher;
use crate::types::{Event, EventPerSubject, Subject};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation and deadline for one batch
#[derive(Debug, Clone, Default)]
pub struct PublishContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl PublishContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Error describing why the context is done, if it is
    fn done(&self, what: &str) -> Option<GatewayError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(GatewayError::Cancelled(what.to_string()));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(GatewayError::Timeout(what.to_string()));
        }
        None
    }

    async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Run `fut` unless the context is cancelled or expires first
    async fn run<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if let Some(err) = self.done(what) {
            return Err(err);
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(GatewayError::Cancelled(what.to_string())),
            _ = self.expired() => Err(GatewayError::Timeout(what.to_string())),
            result = fut => result,
        }
    }

    /// Poll `fut` even on a done context; only a pending `fut` is cut short
    async fn bound<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            result = fut => result,
            _ = self.cancelled() => Err(GatewayError::Cancelled(what.to_string())),
            _ = self.expired() => Err(GatewayError::Timeout(what.to_string())),
        }
    }
}

/// Outcome of publishing one batch
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Pairs published without error
    pub success_count: usize,

    /// Pairs a publish was attempted for
    pub attempted: usize,

    /// Per-pair errors in publish order
    pub errors: Vec<GatewayError>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Combined error, `None` when every pair was published
    pub fn into_error(self) -> Option<GatewayError> {
        GatewayError::join(self.errors)
    }

    /// `Ok(success_count)` or the combined error
    pub fn into_result(self) -> Result<usize> {
        let success_count = self.success_count;
        match self.into_error() {
            None => Ok(success_count),
            Some(err) => Err(err),
        }
    }
}

/// Publishes events and records an audit entry for every attempt
///
/// Publishes within one batch run sequentially; separate batches may run
/// concurrently on a shared orchestrator.
pub struct PublishOrchestrator {
    publisher: Arc<dyn EventPublisher>,
    audit: Arc<dyn AuditSink>,
}

impl PublishOrchestrator {
    pub fn new(publisher: Arc<dyn EventPublisher>, audit: Arc<dyn AuditSink>) -> Self {
        Self { publisher, audit }
    }

    /// Transport name of the underlying publisher
    pub fn publisher_name(&self) -> &str {
        self.publisher.name()
    }

    /// Publish every pair in order
    ///
    /// A cancellation or deadline error stops the batch; remaining pairs are
    /// never attempted. Audit write failures are logged and otherwise ignored.
    pub async fn publish_events(
        &self,
        pairs: &[EventPerSubject],
        ctx: &PublishContext,
    ) -> PublishReport {
        let mut report = PublishReport::default();

        for pair in pairs {
            let result = ctx
                .run("publish", self.publisher.publish(&pair.event, &pair.subject))
                .await;
            report.attempted += 1;

            self.record_audit(&pair.event, result.is_ok(), ctx).await;

            match result {
                Ok(()) => {
                    report.success_count += 1;
                }
                Err(e) if e.is_cancellation() => {
                    tracing::warn!(
                        event_id = %pair.event.id,
                        subject = %pair.subject,
                        remaining = pairs.len() - report.attempted,
                        error = %e,
                        "Publishing stopped"
                    );
                    report.errors.push(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        event_id = %pair.event.id,
                        subject = %pair.subject,
                        error = %e,
                        "Failed to publish event"
                    );
                    report.errors.push(e);
                }
            }
        }

        report
    }

    /// Publish a single event
    pub async fn publish_one(
        &self,
        event: Event,
        subject: Subject,
        ctx: &PublishContext,
    ) -> Result<()> {
        self.publish_events(&[EventPerSubject::new(event, subject)], ctx)
            .await
            .into_result()
            .map(|_| ())
    }

    async fn record_audit(&self, event: &Event, publish_success: bool, ctx: &PublishContext) {
        let record = AuditRecord::from_event(event, publish_success);
        tracing::info!(
            logstream = "audit",
            event = ?record.fields(),
            "AUDIT: Published event"
        );

        // The failed attempt of an interrupted publish still gets its record
        let result = ctx
            .bound("audit write", self.audit.insert_audit_record(&record))
            .await;
        if let Err(e) = result {
            tracing::error!(
                hub_name = %event.hub_name,
                name = %event.name,
                correlation_id = %event.correlation_id,
                publish_success,
                error = %e,
                "Failed to write audit event"
            );
        }
    }
}
