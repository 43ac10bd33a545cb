//! Container runtime client trait.
//!
//! This is the boundary to the local container engine. The agent only ever
//! touches the engine through this trait, which keeps reconciliation
//! testable against a fake runtime and keeps engine-specific wire types out
//! of the planner and executor.

use async_trait::async_trait;

use crate::config::RegistryCredential;
use crate::error::Result;

use super::types::{CreateContainerRequest, LocalContainerRecord};

/// Interface to the local container runtime.
///
/// Inventory queries are read-only; everything else mutates engine state
/// that is observable outside the process and is not transactional.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Lists currently running containers.
    async fn list_running_containers(&self) -> Result<Vec<LocalContainerRecord>>;

    /// Lists running and exited containers.
    async fn list_all_containers(&self) -> Result<Vec<LocalContainerRecord>>;

    /// Lists ids of dangling images.
    async fn list_dangling_images(&self) -> Result<Vec<String>>;

    /// Removes an image by id.
    async fn remove_image(&self, id: &str) -> Result<()>;

    /// Stops a container by id.
    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Removes a stopped container by id.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Pulls an image with registry authentication, returning only after
    /// the full pull stream has completed.
    async fn pull_image(&self, reference: &str, credential: &RegistryCredential) -> Result<()>;

    /// Creates a container and returns its runtime-assigned id.
    async fn create_container(&self, request: &CreateContainerRequest) -> Result<String>;

    /// Starts a created container by id.
    async fn start_container(&self, id: &str) -> Result<()>;
}
