//! Validation of agent configuration and desired-state documents.
//!
//! Errors block startup (or reject a delta before planning); warnings are
//! surfaced but do not stop anything.

use crate::error::{ConfigError, QuaymasterError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{AgentConfig, DesiredSet, RegistryCredential};

/// Validator for agent configuration and delta documents.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates the agent configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation finds any hard errors.
    pub fn validate(&self, config: &AgentConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_agent(config, &mut result);
        Self::validate_registries(config, &mut result);

        if config.registries.is_empty() {
            result.warnings.push(String::from(
                "No registries configured; every start entry will fail credential resolution",
            ));
        }

        finish(result)
    }

    /// Validates a desired-state document.
    ///
    /// # Errors
    ///
    /// Returns an error if validation finds any hard errors.
    pub fn validate_delta(&self, delta: &DesiredSet) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        for (name, spec) in delta.iter() {
            if name.is_empty() {
                result.errors.push(ValidationError {
                    field: String::from("<delta>"),
                    message: String::from("Container name cannot be empty"),
                });
            }

            if spec.wants_running() && spec.image.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{name}.image"),
                    message: String::from("Running entries must name an image"),
                });
            }

            for container_port in spec.ports.keys() {
                if container_port.parse::<u16>().is_err() {
                    result.errors.push(ValidationError {
                        field: format!("{name}.ports"),
                        message: format!("Container port '{container_port}' is not a valid port"),
                    });
                }
            }

            for host_port in spec.ports.values() {
                if host_port.parse::<u16>().is_err() {
                    result.errors.push(ValidationError {
                        field: format!("{name}.ports"),
                        message: format!("Host port '{host_port}' is not a valid port"),
                    });
                }
            }

            for host_path in spec.volumes.keys() {
                if !host_path.starts_with('/') {
                    result.warnings.push(format!(
                        "{name}.volumes: host path '{host_path}' is not absolute"
                    ));
                }
            }

            if spec.wants_running() && spec.tag.is_none() {
                result.warnings.push(format!(
                    "{name}.tag: no tag set; the runtime will resolve the reference itself"
                ));
            }
        }

        Self::validate_host_port_collisions(delta, &mut result);

        finish(result)
    }

    /// Validates agent-level settings.
    fn validate_agent(config: &AgentConfig, result: &mut ValidationResult) {
        if config.agent.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("agent.name"),
                message: String::from("Agent name cannot be empty"),
            });
        }

        if config.delta.poll_interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("delta.poll_interval_secs"),
                message: String::from("Poll interval must be at least 1 second"),
            });
        }

        if config.agent.pass_timeout_secs == 0 {
            result.warnings.push(String::from(
                "agent.pass_timeout_secs is 0; a stuck pull can block the agent indefinitely",
            ));
        }
    }

    /// Validates registry credential entries.
    fn validate_registries(config: &AgentConfig, result: &mut ValidationResult) {
        for (key, credential) in &config.registries {
            Self::validate_credential(key, credential, result);
        }
    }

    /// Validates a single registry credential.
    fn validate_credential(
        key: &str,
        credential: &RegistryCredential,
        result: &mut ValidationResult,
    ) {
        if key.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("registries"),
                message: String::from("Registry key cannot be empty"),
            });
        }

        if credential.username.is_empty() {
            result.errors.push(ValidationError {
                field: format!("registries.{key}.username"),
                message: String::from("Registry username cannot be empty"),
            });
        }

        if credential.password.is_empty() {
            result.errors.push(ValidationError {
                field: format!("registries.{key}.password"),
                message: String::from("Registry password cannot be empty"),
            });
        }

        if credential.server_address.is_empty() {
            result.errors.push(ValidationError {
                field: format!("registries.{key}.server_address"),
                message: String::from("Registry server address cannot be empty"),
            });
        }
    }

    /// Flags host ports mapped by more than one desired entry.
    fn validate_host_port_collisions(delta: &DesiredSet, result: &mut ValidationResult) {
        let mut seen: HashSet<&str> = HashSet::new();

        for (name, spec) in delta.iter() {
            if !spec.wants_running() {
                continue;
            }
            for host_port in spec.ports.values() {
                if !seen.insert(host_port.as_str()) {
                    result.errors.push(ValidationError {
                        field: format!("{name}.ports"),
                        message: format!("Host port {host_port} is mapped by multiple containers"),
                    });
                }
            }
        }
    }
}

/// Converts a populated result into the module's success/failure shape.
fn finish(result: ValidationResult) -> Result<ValidationResult> {
    if result.errors.is_empty() {
        debug!("Validation passed ({} warnings)", result.warnings.len());
        Ok(result)
    } else {
        let first_error = &result.errors[0];
        Err(QuaymasterError::Config(ConfigError::ValidationError {
            message: first_error.message.clone(),
            field: Some(first_error.field.clone()),
        }))
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
