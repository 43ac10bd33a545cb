//! Container runtime types and data structures.
//!
//! These are the runtime-neutral shapes the rest of the agent works with;
//! the bollard-specific wire types stay inside the Docker client.

use serde::{Deserialize, Serialize};

use super::identity::ContainerIdentity;

/// A container as reported by the local runtime inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalContainerRecord {
    /// Runtime-assigned container id (opaque, unique).
    pub id: String,
    /// Raw image reference, `repo[/path]/name[:tag]`.
    pub image_ref: String,
    /// Runtime-reported state.
    pub state: RuntimeState,
}

/// Runtime-reported container state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    /// Container is running.
    Running,
    /// Container has exited.
    Exited,
    /// Container is paused.
    Paused,
    /// Container is restarting.
    Restarting,
    /// Container is being removed.
    Removing,
    /// Container is dead.
    Dead,
    /// Any state the agent does not act on.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Request to create a new container from a pulled image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerRequest {
    /// Full image reference, `image[:tag]`.
    pub image: String,
    /// Bind mounts in `hostPath:containerPath` form.
    pub binds: Vec<String>,
    /// TCP port bindings.
    pub port_bindings: Vec<PortBindingSpec>,
    /// Docker network mode.
    pub network_mode: String,
}

/// A single container-to-host port binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBindingSpec {
    /// Container-side port.
    pub container_port: String,
    /// Host-side port.
    pub host_port: String,
    /// Host interface address.
    pub host_ip: String,
}

impl LocalContainerRecord {
    /// Derives the logical identity from the raw image reference.
    #[must_use]
    pub fn identity(&self) -> ContainerIdentity {
        ContainerIdentity::parse(&self.image_ref)
    }

    /// Returns true if the runtime reports this container as running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, RuntimeState::Running)
    }
}

impl RuntimeState {
    /// Maps a runtime-reported state label to the enum.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "running" => Self::Running,
            "exited" => Self::Exited,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        };
        write!(f, "{state}")
    }
}

impl CreateContainerRequest {
    /// Creates a request for the given image reference.
    #[must_use]
    pub const fn new(image: String) -> Self {
        Self {
            image,
            binds: Vec::new(),
            port_bindings: Vec::new(),
            network_mode: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_label_round_trip() {
        assert_eq!(RuntimeState::from_label("running"), RuntimeState::Running);
        assert_eq!(RuntimeState::from_label("exited"), RuntimeState::Exited);
        assert_eq!(RuntimeState::from_label("dead"), RuntimeState::Dead);
        assert_eq!(RuntimeState::from_label("created"), RuntimeState::Unknown);
    }

    #[test]
    fn test_record_running_check() {
        let record = LocalContainerRecord {
            id: String::from("abc123"),
            image_ref: String::from("myrepo/app:v1"),
            state: RuntimeState::Running,
        };
        assert!(record.is_running());
        assert_eq!(record.identity().name, "app");
    }
}
