//! Configuration and desired-state types for the agent.
//!
//! Two families of types live here: the agent's own configuration
//! (`quaymaster.agent.yaml`, snake_case) and the desired-state delta
//! documents delivered from upstream (camelCase wire format, one entry per
//! logical container name).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// The root configuration structure for the agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentConfig {
    /// Agent-level settings.
    #[serde(default)]
    pub agent: AgentSettings,
    /// Container runtime connection settings.
    #[serde(default)]
    pub runtime: RuntimeConnection,
    /// Delta source settings.
    #[serde(default)]
    pub delta: DeltaConfig,
    /// Reported-state sink settings.
    #[serde(default)]
    pub report: ReportConfig,
    /// Registry credentials, keyed by the first path segment of the image
    /// references they cover.
    #[serde(default)]
    pub registries: HashMap<String, RegistryCredential>,
}

/// Agent-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSettings {
    /// Name this agent identifies itself as (defaults to the hostname).
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Upper bound on a single reconciliation pass in seconds; 0 disables.
    #[serde(default = "default_pass_timeout")]
    pub pass_timeout_secs: u64,
}

/// Container runtime connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConnection {
    /// Transport used to reach the runtime daemon.
    #[serde(default)]
    pub protocol: RuntimeProtocol,
    /// Unix socket path (socket protocol).
    #[serde(default = "default_socket")]
    pub socket: String,
    /// Daemon host (http protocol).
    #[serde(default = "default_host")]
    pub host: String,
    /// Daemon port (http protocol).
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Runtime transport options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeProtocol {
    /// Local unix socket.
    #[default]
    Socket,
    /// TCP/HTTP daemon endpoint.
    Http,
}

/// Delta source settings for the polled-file glue shipped with the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaConfig {
    /// Path to the desired-state document to watch.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Poll interval in seconds for `run` mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Reported-state sink settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReportConfig {
    /// Optional file the reported state is written to; when absent the
    /// report is emitted on the log stream only.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Authentication material for one container registry.
///
/// Supplied once at startup and read-only for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryCredential {
    /// Registry user name.
    pub username: String,
    /// Registry password or token.
    pub password: String,
    /// Account email, if the registry wants one.
    #[serde(default)]
    pub email: Option<String>,
    /// Registry server address.
    pub server_address: String,
}

/// A desired-state delta document: logical container name to spec.
///
/// `BTreeMap` keeps iteration order deterministic, which in turn keeps plan
/// membership and report layout stable for identical inputs.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct DesiredSet {
    /// Desired containers keyed by logical name.
    pub containers: BTreeMap<String, DesiredContainerSpec>,
}

/// Desired configuration for a single container.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredContainerSpec {
    /// Repository reference without a tag. May be empty on entries that only
    /// exist to stop a container.
    #[serde(default)]
    pub image: String,
    /// Image tag.
    #[serde(default)]
    pub tag: Option<String>,
    /// Whether the container should be running.
    #[serde(default)]
    pub state: DesiredRunState,
    /// Bind mounts, host path to container path.
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    /// Port mappings, container port to host port.
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
    /// Docker network mode.
    #[serde(default)]
    pub network_mode: Option<String>,
}

/// Desired run state for a container.
///
/// Only `running` ever triggers start evaluation; unrecognized wire values
/// land on `stopped` so they can only contribute to stop evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DesiredRunState {
    /// Container should be running.
    Running,
    /// Container should not be running.
    #[default]
    #[serde(other)]
    Stopped,
}

/// Default network mode applied when a spec leaves it unset.
pub const DEFAULT_NETWORK_MODE: &str = "bridge";

fn default_agent_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| String::from("quaymaster"))
}

const fn default_pass_timeout() -> u64 {
    600
}

fn default_socket() -> String {
    String::from("/var/run/docker.sock")
}

fn default_host() -> String {
    String::from("localhost")
}

const fn default_port() -> u16 {
    2375
}

const fn default_poll_interval() -> u64 {
    30
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            pass_timeout_secs: default_pass_timeout(),
        }
    }
}

impl Default for RuntimeConnection {
    fn default() -> Self {
        Self {
            protocol: RuntimeProtocol::Socket,
            socket: default_socket(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            path: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl DesiredSet {
    /// Creates an empty desired set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            containers: BTreeMap::new(),
        }
    }

    /// Looks up a desired spec by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DesiredContainerSpec> {
        self.containers.get(name)
    }

    /// Returns true if a logical name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Iterates over (name, spec) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DesiredContainerSpec)> {
        self.containers.iter()
    }

    /// Number of desired entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns true if no containers are desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Inserts a desired entry, replacing any previous one with the name.
    pub fn insert(&mut self, name: impl Into<String>, spec: DesiredContainerSpec) {
        self.containers.insert(name.into(), spec);
    }
}

impl FromIterator<(String, DesiredContainerSpec)> for DesiredSet {
    fn from_iter<I: IntoIterator<Item = (String, DesiredContainerSpec)>>(iter: I) -> Self {
        Self {
            containers: iter.into_iter().collect(),
        }
    }
}

impl DesiredContainerSpec {
    /// Composes the full image reference, `image[:tag]`.
    #[must_use]
    pub fn image_reference(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}:{tag}", self.image),
            None => self.image.clone(),
        }
    }

    /// The registry credential key: the first path segment of the image
    /// reference.
    #[must_use]
    pub fn registry_key(&self) -> &str {
        self.image.split('/').next().unwrap_or(&self.image)
    }

    /// Network mode with the bridge default applied.
    #[must_use]
    pub fn network_mode(&self) -> &str {
        self.network_mode.as_deref().unwrap_or(DEFAULT_NETWORK_MODE)
    }

    /// Returns true if this entry asks for a running container.
    #[must_use]
    pub fn wants_running(&self) -> bool {
        self.state == DesiredRunState::Running
    }
}
