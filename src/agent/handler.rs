//! Delta handler driving one reconciliation pass end to end.
//!
//! A pass moves through `Planning`, `Stopping`, `Starting`, and
//! `Reporting`, and lands back on `Idle`; any step-level failure lands on
//! `Failed`. Nothing is retried here: the next inbound delta is the only
//! recovery path.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{DeltaHasher, DesiredSet, RegistryCredential};
use crate::error::QuaymasterError;
use crate::planner::{ActionExecutor, ExecutionReport, Planner};
use crate::runtime::ContainerRuntime;

use super::reporter::StateReporter;
use super::transport::ReportSink;

/// State of a reconciliation pass.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    /// No pass in flight.
    Idle,
    /// Querying inventory and computing the plan.
    Planning,
    /// Stop phase running.
    Stopping,
    /// Start phase running.
    Starting,
    /// Publishing the report.
    Reporting,
    /// The pass failed at some step.
    Failed,
}

/// Outcome summary of one reconciliation pass.
#[derive(Debug, Serialize)]
pub struct PassSummary {
    /// Pass identifier.
    pub pass_id: Uuid,
    /// Hash of the delta the pass applied.
    pub delta_hash: String,
    /// Where the pass ended: `Idle` on completion, `Failed` otherwise.
    pub final_state: PassState,
    /// Number of containers stopped.
    pub stopped: usize,
    /// Number of containers started.
    pub started: usize,
    /// Number of per-container chains that failed.
    pub failed: usize,
    /// Collected error messages (per-container and step-level).
    pub errors: Vec<String>,
}

/// Handler executing one pass per inbound delta.
#[derive(Debug)]
pub struct DeltaHandler<R: ContainerRuntime, S: ReportSink> {
    /// Container runtime client.
    runtime: R,
    /// Report builder and sink.
    reporter: StateReporter<S>,
    /// Registry credentials for the start phase.
    registries: HashMap<String, RegistryCredential>,
    /// Plan computation.
    planner: Planner,
    /// Delta hashing for pass logging.
    hasher: DeltaHasher,
    /// Pass-level timeout; zero disables.
    pass_timeout: Duration,
}

impl<R: ContainerRuntime, S: ReportSink> DeltaHandler<R, S> {
    /// Creates a new handler.
    #[must_use]
    pub const fn new(
        runtime: R,
        reporter: StateReporter<S>,
        registries: HashMap<String, RegistryCredential>,
        pass_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            reporter,
            registries,
            planner: Planner::new(),
            hasher: DeltaHasher::new(),
            pass_timeout,
        }
    }

    /// Runs one reconciliation pass for an inbound delta.
    ///
    /// Never propagates an error: every failure is caught, logged, and
    /// folded into the summary. Partial convergence left behind by a failed
    /// pass is corrected by the next delta.
    pub async fn handle_delta(&self, delta: &DesiredSet) -> PassSummary {
        let pass_id = Uuid::new_v4();
        let delta_hash = self.hasher.hash_set(delta);
        info!(
            pass = %pass_id,
            "Pass started for delta {} ({} entries)",
            &delta_hash[..8],
            delta.len()
        );

        let summary = if self.pass_timeout.is_zero() {
            self.run_pass(pass_id, delta_hash, delta).await
        } else {
            match tokio::time::timeout(
                self.pass_timeout,
                self.run_pass(pass_id, delta_hash.clone(), delta),
            )
            .await
            {
                Ok(summary) => summary,
                Err(_) => {
                    error!(pass = %pass_id, "Pass timed out after {:?}", self.pass_timeout);
                    PassSummary {
                        pass_id,
                        delta_hash,
                        final_state: PassState::Failed,
                        stopped: 0,
                        started: 0,
                        failed: 0,
                        errors: vec![format!(
                            "Pass timed out after {}s",
                            self.pass_timeout.as_secs()
                        )],
                    }
                }
            }
        };

        if summary.succeeded() {
            info!(pass = %pass_id, "Pass finished: {summary}");
        } else {
            error!(pass = %pass_id, "Pass failed: {summary}");
        }

        summary
    }

    /// The pass body: inventory, plan, execute, report.
    async fn run_pass(&self, pass_id: Uuid, delta_hash: String, delta: &DesiredSet) -> PassSummary {
        debug!(pass = %pass_id, "Pass state: {}", PassState::Planning);

        let running = match self.runtime.list_running_containers().await {
            Ok(inventory) => inventory,
            Err(e) => return Self::fail(pass_id, delta_hash, None, e),
        };
        let all = match self.runtime.list_all_containers().await {
            Ok(inventory) => inventory,
            Err(e) => return Self::fail(pass_id, delta_hash, None, e),
        };

        let plan = self.planner.plan(delta, &running, &all);
        info!(pass = %pass_id, "Plan: {plan}");

        let executor = ActionExecutor::new(&self.runtime, &self.registries);

        debug!(pass = %pass_id, "Pass state: {}", PassState::Stopping);
        let mut results = match executor.stop_containers(&plan.to_stop).await {
            Ok(results) => results,
            Err(e) => return Self::fail(pass_id, delta_hash, None, e),
        };

        debug!(pass = %pass_id, "Pass state: {}", PassState::Starting);
        results.extend(executor.start_containers(&plan.to_start).await);
        let execution = ExecutionReport::aggregate(results);

        debug!(pass = %pass_id, "Pass state: {}", PassState::Reporting);
        let report = self.reporter.build_report(pass_id, delta);
        if let Err(e) = self.reporter.publish(&report).await {
            return Self::fail(pass_id, delta_hash, Some(&execution), e);
        }

        debug!(pass = %pass_id, "Pass state: {}", PassState::Idle);
        PassSummary {
            pass_id,
            delta_hash,
            final_state: PassState::Idle,
            stopped: execution.stopped,
            started: execution.started,
            failed: execution.failed,
            errors: execution.errors(),
        }
    }

    /// Builds the summary for a step-level failure.
    fn fail(
        pass_id: Uuid,
        delta_hash: String,
        execution: Option<&ExecutionReport>,
        error: QuaymasterError,
    ) -> PassSummary {
        error!(pass = %pass_id, "Pass step failed: {error}");

        let mut errors = execution.map(ExecutionReport::errors).unwrap_or_default();
        errors.push(error.to_string());

        PassSummary {
            pass_id,
            delta_hash,
            final_state: PassState::Failed,
            stopped: execution.map_or(0, |e| e.stopped),
            started: execution.map_or(0, |e| e.started),
            failed: execution.map_or(0, |e| e.failed),
            errors,
        }
    }
}

impl PassSummary {
    /// Returns true if the pass completed all steps.
    ///
    /// Per-container chain failures do not fail the pass itself; they are
    /// visible through `failed` and `errors`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.final_state == PassState::Idle
    }
}

impl std::fmt::Display for PassState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Stopping => "stopping",
            Self::Starting => "starting",
            Self::Reporting => "reporting",
            Self::Failed => "failed",
        };
        write!(f, "{state}")
    }
}

impl std::fmt::Display for PassSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} stopped, {} started, {} failed ({})",
            self.stopped, self.started, self.failed, self.final_state
        )?;

        if !self.errors.is_empty() {
            write!(f, "; errors: {}", self.errors.join("; "))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::reporter::StateReport;
    use crate::config::{DesiredContainerSpec, DesiredRunState};
    use crate::error::{ReportError, Result, RuntimeError};
    use crate::runtime::{LocalContainerRecord, MockContainerRuntime, RuntimeState};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink capturing published reports for assertions.
    #[derive(Debug, Default)]
    struct CapturingSink {
        published: Mutex<Vec<StateReport>>,
    }

    #[async_trait]
    impl ReportSink for &CapturingSink {
        async fn publish(&self, report: &StateReport) -> Result<()> {
            self.published.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    /// Sink that always rejects.
    #[derive(Debug, Default)]
    struct FailingSink;

    #[async_trait]
    impl ReportSink for FailingSink {
        async fn publish(&self, _report: &StateReport) -> Result<()> {
            Err(ReportError::publish("upstream unreachable").into())
        }
    }

    /// Sink that hangs long enough for the pass timeout to fire.
    #[derive(Debug, Default)]
    struct SlowSink;

    #[async_trait]
    impl ReportSink for SlowSink {
        async fn publish(&self, _report: &StateReport) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn delta_running(name: &str, image: &str, tag: &str) -> DesiredSet {
        let mut set = DesiredSet::new();
        set.insert(
            name,
            DesiredContainerSpec {
                image: String::from(image),
                tag: Some(String::from(tag)),
                state: DesiredRunState::Running,
                ..DesiredContainerSpec::default()
            },
        );
        set
    }

    fn registries(key: &str) -> HashMap<String, RegistryCredential> {
        HashMap::from([(
            String::from(key),
            RegistryCredential {
                username: String::from("user"),
                password: String::from("pass"),
                email: None,
                server_address: format!("https://{key}"),
            },
        )])
    }

    fn handler_with<'a>(
        runtime: MockContainerRuntime,
        sink: &'a CapturingSink,
        registries: HashMap<String, RegistryCredential>,
    ) -> DeltaHandler<MockContainerRuntime, &'a CapturingSink> {
        DeltaHandler::new(
            runtime,
            StateReporter::new(sink, String::from("test-agent")),
            registries,
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_full_pass_replaces_old_version() {
        let mut runtime = MockContainerRuntime::new();

        let old = LocalContainerRecord {
            id: String::from("old-id"),
            image_ref: String::from("myrepo/app:v1"),
            state: RuntimeState::Running,
        };

        let inventory = vec![old.clone()];
        runtime
            .expect_list_running_containers()
            .returning(move || Ok(inventory.clone()));
        let inventory = vec![old];
        runtime
            .expect_list_all_containers()
            .returning(move || Ok(inventory.clone()));
        runtime.expect_stop_container().returning(|_| Ok(()));
        runtime.expect_remove_container().returning(|_| Ok(()));
        runtime
            .expect_list_dangling_images()
            .returning(|| Ok(vec![]));
        runtime.expect_pull_image().returning(|_, _| Ok(()));
        runtime
            .expect_create_container()
            .returning(|_| Ok(String::from("new-id")));
        runtime.expect_start_container().returning(|_| Ok(()));

        let sink = CapturingSink::default();
        let handler = handler_with(runtime, &sink, registries("myrepo"));

        let summary = handler
            .handle_delta(&delta_running("app", "myrepo/app", "v2"))
            .await;

        assert!(summary.succeeded());
        assert_eq!(summary.stopped, 1);
        assert_eq!(summary.started, 1);
        assert_eq!(summary.failed, 0);

        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert!(published[0].containers.contains_key("app"));
        assert_eq!(published[0].agent, "test-agent");
    }

    #[tokio::test]
    async fn test_inventory_failure_fails_pass_without_report() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_list_running_containers().returning(|| {
            Err(RuntimeError::inventory("list running containers", "daemon down").into())
        });

        let sink = CapturingSink::default();
        let handler = handler_with(runtime, &sink, HashMap::new());

        let summary = handler
            .handle_delta(&delta_running("app", "myrepo/app", "v1"))
            .await;

        assert_eq!(summary.final_state, PassState::Failed);
        assert!(summary.errors[0].contains("daemon down"));
        assert!(sink.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chain_failure_still_reports_and_completes() {
        let mut runtime = MockContainerRuntime::new();

        runtime
            .expect_list_running_containers()
            .returning(|| Ok(vec![]));
        runtime
            .expect_list_all_containers()
            .returning(|| Ok(vec![]));
        runtime.expect_pull_image().returning(|_, _| {
            Err(RuntimeError::image("pull", "myrepo/app:v1", "no such image").into())
        });

        let sink = CapturingSink::default();
        let handler = handler_with(runtime, &sink, registries("myrepo"));

        let summary = handler
            .handle_delta(&delta_running("app", "myrepo/app", "v1"))
            .await;

        assert!(summary.succeeded());
        assert_eq!(summary.failed, 1);
        assert!(summary.errors[0].contains("no such image"));
        assert_eq!(sink.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_fails_pass() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_running_containers()
            .returning(|| Ok(vec![]));
        runtime
            .expect_list_all_containers()
            .returning(|| Ok(vec![]));

        let handler = DeltaHandler::new(
            runtime,
            StateReporter::new(FailingSink, String::from("test-agent")),
            HashMap::new(),
            Duration::from_secs(30),
        );

        let summary = handler.handle_delta(&DesiredSet::new()).await;

        assert_eq!(summary.final_state, PassState::Failed);
        assert!(summary.errors[0].contains("upstream unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_timeout_fails_pass() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_running_containers()
            .returning(|| Ok(vec![]));
        runtime
            .expect_list_all_containers()
            .returning(|| Ok(vec![]));

        let handler = DeltaHandler::new(
            runtime,
            StateReporter::new(SlowSink, String::from("test-agent")),
            HashMap::new(),
            Duration::from_secs(1),
        );

        let summary = handler.handle_delta(&DesiredSet::new()).await;

        assert_eq!(summary.final_state, PassState::Failed);
        assert!(summary.errors[0].contains("timed out"));
    }
}
