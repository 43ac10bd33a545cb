//! Docker Engine implementation of the container runtime client.
//!
//! Talks to the daemon through bollard over a unix socket or HTTP,
//! depending on configuration. All wire types stay inside this module.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{HostConfig, PortBinding, PortMap};
use bollard::{API_DEFAULT_VERSION, Docker};
use futures_util::StreamExt;
use tracing::{debug, trace, warn};

use crate::config::{RegistryCredential, RuntimeConnection, RuntimeProtocol};
use crate::error::{Result, RuntimeError};

use super::client::ContainerRuntime;
use super::types::{CreateContainerRequest, LocalContainerRecord, RuntimeState};

/// Client timeout in seconds. Pulls stream through the same client, so the
/// pass-level timeout is the effective bound for those.
const DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Docker Engine runtime client.
#[derive(Debug)]
pub struct DockerRuntime {
    /// Underlying bollard client.
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the Docker daemon as configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    pub fn connect(connection: &RuntimeConnection) -> Result<Self> {
        let docker = match connection.protocol {
            RuntimeProtocol::Socket => {
                debug!("Connecting to Docker via socket: {}", connection.socket);
                Docker::connect_with_socket(
                    &connection.socket,
                    DEFAULT_TIMEOUT_SECS,
                    API_DEFAULT_VERSION,
                )
            }
            RuntimeProtocol::Http => {
                let address = format!("http://{}:{}", connection.host, connection.port);
                debug!("Connecting to Docker via HTTP: {address}");
                Docker::connect_with_http(&address, DEFAULT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
        }
        .map_err(|e| RuntimeError::connection(e.to_string()))?;

        Ok(Self { docker })
    }

    /// Lists containers matching the given status filters.
    async fn list_by_status(&self, operation: &str, statuses: &[&str]) -> Result<Vec<LocalContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: HashMap::from([(
                String::from("status"),
                statuses.iter().map(|s| (*s).to_string()).collect(),
            )]),
            ..Default::default()
        };

        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::inventory(operation, e.to_string()))?;

        let records = summaries
            .into_iter()
            .filter_map(|summary| {
                let id = summary.id?;
                let Some(image_ref) = summary.image else {
                    warn!("Skipping container {id} with no image reference");
                    return None;
                };
                let state = summary
                    .state
                    .as_deref()
                    .map_or(RuntimeState::Unknown, RuntimeState::from_label);
                Some(LocalContainerRecord {
                    id,
                    image_ref,
                    state,
                })
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running_containers(&self) -> Result<Vec<LocalContainerRecord>> {
        self.list_by_status("list running containers", &["running"]).await
    }

    async fn list_all_containers(&self) -> Result<Vec<LocalContainerRecord>> {
        self.list_by_status("list all containers", &["running", "exited"])
            .await
    }

    async fn list_dangling_images(&self) -> Result<Vec<String>> {
        let options = ListImagesOptions::<String> {
            filters: HashMap::from([(String::from("dangling"), vec![String::from("true")])]),
            ..Default::default()
        };

        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| RuntimeError::inventory("list dangling images", e.to_string()))?;

        Ok(images.into_iter().map(|image| image.id).collect())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        self.docker
            .remove_image(id, None::<RemoveImageOptions>, None)
            .await
            .map_err(|e| RuntimeError::image("remove", id, e.to_string()))?;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await
            .map_err(|e| RuntimeError::container("stop", id, e.to_string()))?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| RuntimeError::container("remove", id, e.to_string()))?;
        Ok(())
    }

    async fn pull_image(&self, reference: &str, credential: &RegistryCredential) -> Result<()> {
        let options = CreateImageOptions::<String> {
            from_image: reference.to_string(),
            ..Default::default()
        };

        let credentials = DockerCredentials {
            username: Some(credential.username.clone()),
            password: Some(credential.password.clone()),
            email: credential.email.clone(),
            serveraddress: Some(credential.server_address.clone()),
            ..Default::default()
        };

        let mut stream = self
            .docker
            .create_image(Some(options), None, Some(credentials));

        // The pull is only complete once the progress stream is drained.
        while let Some(progress) = stream.next().await {
            let info =
                progress.map_err(|e| RuntimeError::image("pull", reference, e.to_string()))?;
            if let Some(status) = info.status {
                trace!(image = reference, "pull: {status}");
            }
        }

        debug!("Pulled image: {reference}");
        Ok(())
    }

    async fn create_container(&self, request: &CreateContainerRequest) -> Result<String> {
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings: PortMap = HashMap::new();

        for binding in &request.port_bindings {
            let key = format!("{}/tcp", binding.container_port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: Some(binding.host_ip.clone()),
                    host_port: Some(binding.host_port.clone()),
                }]),
            );
        }

        let host_config = HostConfig {
            binds: (!request.binds.is_empty()).then(|| request.binds.clone()),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            network_mode: Some(request.network_mode.clone()),
            ..Default::default()
        };

        let config = Config {
            image: Some(request.image.clone()),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| {
                RuntimeError::image("create container from", request.image.as_str(), e.to_string())
            })?;

        for warning in &response.warnings {
            warn!("Runtime warning creating {}: {warning}", request.image);
        }

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::container("start", id, e.to_string()))?;
        Ok(())
    }
}
