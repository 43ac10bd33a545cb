//! Serialized consumer loop for inbound deltas.

use tracing::{info, warn};

use super::handler::DeltaHandler;
use super::transport::{DeltaReceiver, ReportSink};
use crate::runtime::ContainerRuntime;

/// The agent's single reconciliation worker.
///
/// Passes run strictly one at a time: the loop awaits the handler before
/// looking at the feed again, and the feed itself only ever holds the
/// latest delta. Together that enforces the at-most-one-in-flight rule and
/// coalesces bursts of notifications into one pass over the newest
/// document.
#[derive(Debug)]
pub struct AgentWorker<R: ContainerRuntime, S: ReportSink> {
    /// Pass handler.
    handler: DeltaHandler<R, S>,
}

impl<R: ContainerRuntime, S: ReportSink> AgentWorker<R, S> {
    /// Creates a new worker.
    #[must_use]
    pub const fn new(handler: DeltaHandler<R, S>) -> Self {
        Self { handler }
    }

    /// Drains the delta feed until every producer is gone.
    pub async fn run(self, mut deltas: DeltaReceiver) {
        info!("Agent worker started");

        while deltas.changed().await.is_ok() {
            let Some(delta) = deltas.borrow_and_update().clone() else {
                continue;
            };

            let summary = self.handler.handle_delta(&delta).await;
            if !summary.succeeded() {
                warn!("Waiting for the next delta after a failed pass");
            }
        }

        info!("Delta feed closed, agent worker exiting");
    }
}
