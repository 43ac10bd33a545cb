//! Executor applying reconciliation plans to the container runtime.
//!
//! Both phases fan out per container and fan back in collecting a result
//! per entry; one container's failure never aborts its siblings. The stop
//! phase fully resolves before the start phase begins.

use std::collections::{HashMap, HashSet};

use futures_util::future::join_all;
use tracing::{debug, error, info};

use crate::config::{DesiredContainerSpec, RegistryCredential};
use crate::error::{ExecError, Result};
use crate::runtime::{
    ContainerIdentity, ContainerRuntime, CreateContainerRequest, LocalContainerRecord,
    PortBindingSpec,
};

use super::plan::{PlannedStart, ReconciliationPlan};

/// Host interface new port bindings are published on.
const HOST_ALL_INTERFACES: &str = "0.0.0.0";

/// Executor for reconciliation plans.
#[derive(Debug)]
pub struct ActionExecutor<'a, R: ContainerRuntime> {
    /// Container runtime client.
    runtime: &'a R,
    /// Registry credentials keyed by image path prefix.
    registries: &'a HashMap<String, RegistryCredential>,
}

/// Kind of action taken for a single container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Stop, remove, and sweep dangling images.
    Stop,
    /// Pull, create, and start.
    Start,
}

/// Result of executing a single container's action chain.
#[derive(Debug)]
pub struct ActionResult {
    /// Container name (derived for stops, logical for starts).
    pub name: String,
    /// Action kind.
    pub kind: ActionKind,
    /// Container id involved, when known.
    pub container_id: Option<String>,
    /// Whether the whole chain succeeded.
    pub success: bool,
    /// Error message when the chain failed.
    pub error: Option<String>,
}

/// Aggregate result of executing a plan.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Individual per-container results.
    pub results: Vec<ActionResult>,
    /// Number of successful stop chains.
    pub stopped: usize,
    /// Number of successful start chains.
    pub started: usize,
    /// Number of failed chains of either kind.
    pub failed: usize,
}

impl<'a, R: ContainerRuntime> ActionExecutor<'a, R> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(runtime: &'a R, registries: &'a HashMap<String, RegistryCredential>) -> Self {
        Self {
            runtime,
            registries,
        }
    }

    /// Executes a plan: the stop phase runs to completion, then the start
    /// phase.
    ///
    /// # Errors
    ///
    /// Returns an error only when the stop phase's inventory query fails;
    /// per-container failures are collected in the report instead.
    pub async fn execute(&self, plan: &ReconciliationPlan) -> Result<ExecutionReport> {
        if plan.is_empty() {
            debug!("Plan is empty, nothing to execute");
            return Ok(ExecutionReport::default());
        }

        info!(
            "Executing plan: {} to stop, {} to start",
            plan.stop_count(),
            plan.start_count()
        );

        let mut results = self.stop_containers(&plan.to_stop).await?;
        results.extend(self.start_containers(&plan.to_start).await);

        Ok(ExecutionReport::aggregate(results))
    }

    /// Stop phase: stops, removes, and sweeps dangling images for every
    /// running container whose derived name is in the stop set.
    ///
    /// # Errors
    ///
    /// Returns an error if the running-container inventory query fails.
    pub async fn stop_containers(
        &self,
        to_stop: &[ContainerIdentity],
    ) -> Result<Vec<ActionResult>> {
        if to_stop.is_empty() {
            return Ok(Vec::new());
        }

        let names_to_stop: HashSet<&str> = to_stop.iter().map(|i| i.name.as_str()).collect();

        let running = self.runtime.list_running_containers().await?;
        let targets: Vec<LocalContainerRecord> = running
            .into_iter()
            .filter(|record| names_to_stop.contains(record.identity().name.as_str()))
            .collect();

        let chains = targets.iter().map(|record| self.stop_one(record));
        Ok(join_all(chains).await)
    }

    /// Start phase: pulls, creates, and starts every planned entry.
    pub async fn start_containers(&self, to_start: &[PlannedStart]) -> Vec<ActionResult> {
        let chains = to_start.iter().map(|entry| self.start_one(entry));
        join_all(chains).await
    }

    /// Runs one container's stop chain: stop, remove, dangling-image sweep.
    async fn stop_one(&self, record: &LocalContainerRecord) -> ActionResult {
        let identity = record.identity();
        info!("Stopping container {} ({})", identity, record.id);

        let outcome: Result<()> = async {
            self.runtime.stop_container(&record.id).await.map_err(|e| {
                ExecError::Stop {
                    name: identity.name.clone(),
                    id: record.id.clone(),
                    message: e.to_string(),
                }
            })?;

            self.runtime
                .remove_container(&record.id)
                .await
                .map_err(|e| ExecError::Remove {
                    name: identity.name.clone(),
                    id: record.id.clone(),
                    message: e.to_string(),
                })?;

            let dangling =
                self.runtime
                    .list_dangling_images()
                    .await
                    .map_err(|e| ExecError::Remove {
                        name: identity.name.clone(),
                        id: record.id.clone(),
                        message: e.to_string(),
                    })?;

            for image_id in dangling {
                self.runtime
                    .remove_image(&image_id)
                    .await
                    .map_err(|e| ExecError::Remove {
                        name: identity.name.clone(),
                        id: image_id.clone(),
                        message: e.to_string(),
                    })?;
            }

            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => ActionResult {
                name: identity.name,
                kind: ActionKind::Stop,
                container_id: Some(record.id.clone()),
                success: true,
                error: None,
            },
            Err(e) => {
                error!("Stop chain failed for {} ({}): {e}", identity.name, record.id);
                ActionResult {
                    name: identity.name,
                    kind: ActionKind::Stop,
                    container_id: Some(record.id.clone()),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Runs one entry's start chain: resolve credential, pull, create,
    /// start.
    async fn start_one(&self, entry: &PlannedStart) -> ActionResult {
        let image = entry.spec.image_reference();
        info!("Starting container {} from {image}", entry.name);

        let outcome: Result<String> = async {
            let registry = entry.spec.registry_key();
            let credential =
                self.registries
                    .get(registry)
                    .ok_or_else(|| ExecError::PullAuth {
                        registry: registry.to_string(),
                        image: image.clone(),
                    })?;

            self.runtime
                .pull_image(&image, credential)
                .await
                .map_err(|e| ExecError::Pull {
                    image: image.clone(),
                    message: e.to_string(),
                })?;

            let request = compose_create_request(&entry.spec);

            let id = self
                .runtime
                .create_container(&request)
                .await
                .map_err(|e| ExecError::Start {
                    name: entry.name.clone(),
                    image: image.clone(),
                    message: e.to_string(),
                })?;

            self.runtime
                .start_container(&id)
                .await
                .map_err(|e| ExecError::Start {
                    name: entry.name.clone(),
                    image: image.clone(),
                    message: e.to_string(),
                })?;

            Ok(id)
        }
        .await;

        match outcome {
            Ok(id) => ActionResult {
                name: entry.name.clone(),
                kind: ActionKind::Start,
                container_id: Some(id),
                success: true,
                error: None,
            },
            Err(e) => {
                error!("Start chain failed for {}: {e}", entry.name);
                ActionResult {
                    name: entry.name.clone(),
                    kind: ActionKind::Start,
                    container_id: None,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Translates a desired spec into a runtime create request.
///
/// Volumes become `hostPath:containerPath` binds; ports become TCP bindings
/// published on all interfaces; the network mode falls back to bridge.
fn compose_create_request(spec: &DesiredContainerSpec) -> CreateContainerRequest {
    let binds = spec
        .volumes
        .iter()
        .map(|(host, container)| format!("{host}:{container}"))
        .collect();

    let port_bindings = spec
        .ports
        .iter()
        .map(|(container_port, host_port)| PortBindingSpec {
            container_port: container_port.clone(),
            host_port: host_port.clone(),
            host_ip: String::from(HOST_ALL_INTERFACES),
        })
        .collect();

    CreateContainerRequest {
        image: spec.image_reference(),
        binds,
        port_bindings,
        network_mode: spec.network_mode().to_string(),
    }
}

impl ExecutionReport {
    /// Builds the aggregate from per-container results.
    #[must_use]
    pub fn aggregate(results: Vec<ActionResult>) -> Self {
        let stopped = results
            .iter()
            .filter(|r| r.success && r.kind == ActionKind::Stop)
            .count();
        let started = results
            .iter()
            .filter(|r| r.success && r.kind == ActionKind::Start)
            .count();
        let failed = results.iter().filter(|r| !r.success).count();

        Self {
            results,
            stopped,
            started,
            failed,
        }
    }

    /// Returns true if every chain succeeded.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failed == 0
    }

    /// Error messages of the failed chains.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .filter_map(|r| r.error.clone())
            .collect()
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} stopped, {} started, {} failed",
            self.stopped, self.started, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DesiredContainerSpec, DesiredRunState};
    use crate::error::{QuaymasterError, RuntimeError};
    use crate::runtime::{MockContainerRuntime, RuntimeState};
    use std::sync::{Arc, Mutex};

    fn record(id: &str, image_ref: &str) -> LocalContainerRecord {
        LocalContainerRecord {
            id: String::from(id),
            image_ref: String::from(image_ref),
            state: RuntimeState::Running,
        }
    }

    fn identity(raw: &str) -> ContainerIdentity {
        ContainerIdentity::parse(raw)
    }

    fn start_entry(name: &str, image: &str, tag: &str) -> PlannedStart {
        PlannedStart {
            name: String::from(name),
            spec: DesiredContainerSpec {
                image: String::from(image),
                tag: Some(String::from(tag)),
                state: DesiredRunState::Running,
                ..DesiredContainerSpec::default()
            },
        }
    }

    fn registries(keys: &[&str]) -> HashMap<String, RegistryCredential> {
        keys.iter()
            .map(|key| {
                (
                    (*key).to_string(),
                    RegistryCredential {
                        username: String::from("user"),
                        password: String::from("pass"),
                        email: None,
                        server_address: format!("https://{key}"),
                    },
                )
            })
            .collect()
    }

    fn container_error(op: &str, id: &str) -> QuaymasterError {
        QuaymasterError::Runtime(RuntimeError::container(op, id, "boom"))
    }

    #[tokio::test]
    async fn test_empty_plan_makes_no_runtime_calls() {
        let runtime = MockContainerRuntime::new();
        let registries = registries(&[]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let report = executor.execute(&ReconciliationPlan::default()).await.unwrap();
        assert!(report.success());
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_stop_failure_does_not_block_siblings() {
        let mut runtime = MockContainerRuntime::new();

        runtime.expect_list_running_containers().returning(|| {
            Ok(vec![
                record("bad", "myrepo/app:v1"),
                record("good", "myrepo/db:v1"),
            ])
        });
        runtime
            .expect_stop_container()
            .returning(|id| {
                if id == "bad" {
                    Err(container_error("stop", "bad"))
                } else {
                    Ok(())
                }
            });
        runtime
            .expect_remove_container()
            .withf(|id| id == "good")
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_list_dangling_images()
            .returning(|| Ok(vec![]));

        let registries = registries(&[]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let results = executor
            .stop_containers(&[identity("myrepo/app:v1"), identity("myrepo/db:v1")])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "app");
        assert!(results.iter().any(|r| r.success && r.name == "db"));
    }

    #[tokio::test]
    async fn test_stop_only_touches_named_containers() {
        let mut runtime = MockContainerRuntime::new();

        runtime.expect_list_running_containers().returning(|| {
            Ok(vec![
                record("c1", "myrepo/app:v1"),
                record("c2", "myrepo/other:v1"),
            ])
        });
        runtime
            .expect_stop_container()
            .withf(|id| id == "c1")
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_remove_container()
            .withf(|id| id == "c1")
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_list_dangling_images()
            .returning(|| Ok(vec![String::from("sha256:dead")]));
        runtime
            .expect_remove_image()
            .withf(|id| id == "sha256:dead")
            .times(1)
            .returning(|_| Ok(()));

        let registries = registries(&[]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let results = executor
            .stop_containers(&[identity("myrepo/app:v1")])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_only_that_entry() {
        let mut runtime = MockContainerRuntime::new();

        runtime
            .expect_pull_image()
            .withf(|reference, _| reference == "myrepo/app:v1")
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_create_container()
            .times(1)
            .returning(|_| Ok(String::from("new-id")));
        runtime
            .expect_start_container()
            .withf(|id| id == "new-id")
            .times(1)
            .returning(|_| Ok(()));

        let registries = registries(&["myrepo"]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let results = executor
            .start_containers(&[
                start_entry("app", "myrepo/app", "v1"),
                start_entry("ghost", "unknown.registry/ghost", "v1"),
            ])
            .await;

        assert_eq!(results.len(), 2);
        let ok: Vec<_> = results.iter().filter(|r| r.success).collect();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].name, "app");
        assert_eq!(ok[0].container_id.as_deref(), Some("new-id"));

        let failed = results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.name, "ghost");
        assert!(failed.error.as_ref().unwrap().contains("unknown.registry"));
    }

    #[tokio::test]
    async fn test_create_request_translation() {
        let mut runtime = MockContainerRuntime::new();

        runtime.expect_pull_image().returning(|_, _| Ok(()));
        runtime
            .expect_create_container()
            .withf(|request| {
                request.image == "myrepo/app:v1"
                    && request.binds == vec![String::from("/srv/data:/data")]
                    && request.port_bindings.len() == 1
                    && request.port_bindings[0].container_port == "8080"
                    && request.port_bindings[0].host_port == "80"
                    && request.port_bindings[0].host_ip == "0.0.0.0"
                    && request.network_mode == "bridge"
            })
            .times(1)
            .returning(|_| Ok(String::from("id")));
        runtime.expect_start_container().returning(|_| Ok(()));

        let mut entry = start_entry("app", "myrepo/app", "v1");
        entry
            .spec
            .volumes
            .insert(String::from("/srv/data"), String::from("/data"));
        entry
            .spec
            .ports
            .insert(String::from("8080"), String::from("80"));

        let registries = registries(&["myrepo"]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let results = executor.start_containers(&[entry]).await;
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn test_stop_phase_completes_before_start_phase() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = MockContainerRuntime::new();

        let log = Arc::clone(&calls);
        runtime.expect_list_running_containers().returning(move || {
            log.lock().unwrap().push("list");
            Ok(vec![record("old", "myrepo/app:v1")])
        });
        let log = Arc::clone(&calls);
        runtime.expect_stop_container().returning(move |_| {
            log.lock().unwrap().push("stop");
            Ok(())
        });
        let log = Arc::clone(&calls);
        runtime.expect_remove_container().returning(move |_| {
            log.lock().unwrap().push("remove");
            Ok(())
        });
        let log = Arc::clone(&calls);
        runtime.expect_list_dangling_images().returning(move || {
            log.lock().unwrap().push("dangling");
            Ok(vec![])
        });
        let log = Arc::clone(&calls);
        runtime.expect_pull_image().returning(move |_, _| {
            log.lock().unwrap().push("pull");
            Ok(())
        });
        let log = Arc::clone(&calls);
        runtime.expect_create_container().returning(move |_| {
            log.lock().unwrap().push("create");
            Ok(String::from("new"))
        });
        let log = Arc::clone(&calls);
        runtime.expect_start_container().returning(move |_| {
            log.lock().unwrap().push("start");
            Ok(())
        });

        let registries = registries(&["myrepo"]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let plan = ReconciliationPlan {
            to_stop: vec![identity("myrepo/app:v1")],
            to_start: vec![start_entry("app", "myrepo/app", "v2")],
        };

        let report = executor.execute(&plan).await.unwrap();
        assert!(report.success());
        assert_eq!(report.stopped, 1);
        assert_eq!(report.started, 1);

        let calls = calls.lock().unwrap();
        let pull_at = calls.iter().position(|c| *c == "pull").unwrap();
        let stop_at = calls.iter().position(|c| *c == "stop").unwrap();
        let remove_at = calls.iter().position(|c| *c == "remove").unwrap();
        assert!(stop_at < remove_at);
        assert!(remove_at < pull_at);
    }

    #[tokio::test]
    async fn test_pull_failure_reports_entry_error() {
        let mut runtime = MockContainerRuntime::new();

        runtime.expect_pull_image().returning(|_, _| {
            Err(QuaymasterError::Runtime(RuntimeError::image(
                "pull",
                "myrepo/app:v1",
                "manifest unknown",
            )))
        });

        let registries = registries(&["myrepo"]);
        let executor = ActionExecutor::new(&runtime, &registries);

        let results = executor
            .start_containers(&[start_entry("app", "myrepo/app", "v1")])
            .await;

        assert!(!results[0].success);
        assert!(results[0].error.as_ref().unwrap().contains("manifest unknown"));
    }
}
