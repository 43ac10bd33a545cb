//! Boundary to the cloud messaging collaborator.
//!
//! The transport that delivers deltas and accepts reports is external to
//! this crate; what lives here is the seam. Inbound, deltas land on a
//! single-slot feed that coalesces to the latest document. Outbound,
//! reports go through the [`ReportSink`] trait. The polled-file source and
//! the log/file sinks are the concrete glue shipped with the binary.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{DeltaHasher, DesiredSet, load_delta_file};
use crate::error::{ReportError, Result};

use super::reporter::StateReport;

/// Outbound boundary for reported state.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Publishes one report upstream.
    async fn publish(&self, report: &StateReport) -> Result<()>;
}

#[async_trait]
impl ReportSink for Box<dyn ReportSink> {
    async fn publish(&self, report: &StateReport) -> Result<()> {
        (**self).publish(report).await
    }
}

/// Sink that emits reports on the log stream as single JSON lines.
#[derive(Debug, Default)]
pub struct LogReportSink;

impl LogReportSink {
    /// Creates a new log sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportSink for LogReportSink {
    async fn publish(&self, report: &StateReport) -> Result<()> {
        let json = serde_json::to_string(report)
            .map_err(|e| ReportError::serialize(e.to_string()))?;
        info!(target: "quaymaster::report", "{json}");
        Ok(())
    }
}

/// Sink that writes each report to a file, replacing the previous one.
#[derive(Debug)]
pub struct FileReportSink {
    /// Destination path.
    path: PathBuf,
}

impl FileReportSink {
    /// Creates a new file sink.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn publish(&self, report: &StateReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| ReportError::serialize(e.to_string()))?;

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            ReportError::publish(format!("write {}: {e}", self.path.display()))
        })?;

        debug!("Wrote report to {}", self.path.display());
        Ok(())
    }
}

/// Receiving half of the delta feed, held by the agent worker.
pub type DeltaReceiver = watch::Receiver<Option<DesiredSet>>;

/// Single-slot inbound delta queue.
///
/// Offering a new delta replaces any unconsumed one, so a worker that is
/// mid-pass only ever observes the latest document when it comes back
/// around. This is what keeps at most one pass in flight.
#[derive(Debug, Clone)]
pub struct DeltaFeed {
    /// Sender half of the slot.
    tx: watch::Sender<Option<DesiredSet>>,
}

impl DeltaFeed {
    /// Creates the feed and its receiving half.
    #[must_use]
    pub fn channel() -> (Self, DeltaReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Offers a delta, replacing any unconsumed one.
    ///
    /// Returns false once the consumer is gone.
    pub fn offer(&self, delta: DesiredSet) -> bool {
        self.tx.send(Some(delta)).is_ok()
    }
}

/// Polls a delta file and feeds content changes into a [`DeltaFeed`].
///
/// Change detection is by content hash, so rewrites of an identical
/// document do not trigger passes.
#[derive(Debug)]
pub struct DeltaFilePoller {
    /// File to poll.
    path: PathBuf,
    /// Poll interval.
    interval: Duration,
    /// Content hasher.
    hasher: DeltaHasher,
}

impl DeltaFilePoller {
    /// Creates a new poller.
    #[must_use]
    pub const fn new(path: PathBuf, interval: Duration) -> Self {
        Self {
            path,
            interval,
            hasher: DeltaHasher::new(),
        }
    }

    /// Runs the poll loop until the feed's consumer goes away.
    ///
    /// Read or parse failures are logged and the previous document stays
    /// in effect until the file becomes readable again.
    pub async fn run(self, feed: DeltaFeed) {
        info!(
            "Watching delta file {} every {}s",
            self.path.display(),
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        let mut last_hash: Option<String> = None;

        loop {
            ticker.tick().await;

            let delta = match load_delta_file(&self.path) {
                Ok(delta) => delta,
                Err(e) => {
                    warn!("Skipping poll of {}: {e}", self.path.display());
                    continue;
                }
            };

            let hash = self.hasher.hash_set(&delta);
            if last_hash.as_deref() == Some(hash.as_str()) {
                continue;
            }

            debug!("Delta file changed (hash {})", &hash[..8]);
            last_hash = Some(hash);

            if !feed.offer(delta) {
                info!("Delta consumer gone, stopping poller");
                return;
            }
        }
    }
}
