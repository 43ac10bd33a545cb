//! Error types for the quaymaster agent.
//!
//! This module provides the error hierarchy for all stages of a
//! reconciliation pass: configuration, runtime inventory queries, plan
//! execution, and upstream reporting.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the quaymaster agent.
#[derive(Debug, Error)]
pub enum QuaymasterError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Container runtime errors.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Plan execution errors.
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Reported-state publishing errors.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration or delta document could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Container runtime errors.
///
/// Inventory queries and connection failures are the pass-fatal variants;
/// everything else is scoped to a single container.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Connecting to the container runtime failed.
    #[error("Failed to connect to container runtime: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// Listing containers or images failed.
    #[error("Inventory query '{operation}' failed: {message}")]
    InventoryQuery {
        /// The listing operation that failed.
        operation: String,
        /// Error message from the runtime.
        message: String,
    },

    /// The runtime rejected a request for a specific container.
    #[error("Runtime rejected {operation} for container {id}: {message}")]
    ContainerApi {
        /// Operation that was attempted.
        operation: String,
        /// Container id.
        id: String,
        /// Error message from the runtime.
        message: String,
    },

    /// The runtime rejected a request for a specific image.
    #[error("Runtime rejected {operation} for image {reference}: {message}")]
    ImageApi {
        /// Operation that was attempted.
        operation: String,
        /// Image reference or id.
        reference: String,
        /// Error message from the runtime.
        message: String,
    },
}

/// Plan execution errors, each scoped to a single container entry.
#[derive(Debug, Error)]
pub enum ExecError {
    /// No registry credential is configured for an image's registry.
    #[error("No registry credential configured for '{registry}' (image {image})")]
    PullAuth {
        /// Registry key derived from the image reference.
        registry: String,
        /// Full image reference.
        image: String,
    },

    /// Pulling an image failed.
    #[error("Failed to pull image {image}: {message}")]
    Pull {
        /// Image reference being pulled.
        image: String,
        /// Underlying error message.
        message: String,
    },

    /// Stopping a container failed.
    #[error("Failed to stop container {name} ({id}): {message}")]
    Stop {
        /// Derived container name.
        name: String,
        /// Container id.
        id: String,
        /// Underlying error message.
        message: String,
    },

    /// Removing a container or its dangling images failed.
    #[error("Failed to remove {name} ({id}): {message}")]
    Remove {
        /// Derived container name.
        name: String,
        /// Container id.
        id: String,
        /// Underlying error message.
        message: String,
    },

    /// Creating or starting a container failed after a successful pull.
    #[error("Failed to start container {name} from {image}: {message}")]
    Start {
        /// Logical container name.
        name: String,
        /// Image reference.
        image: String,
        /// Underlying error message.
        message: String,
    },
}

/// Reported-state publishing errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report could not be serialized.
    #[error("Failed to serialize reported state: {message}")]
    Serialize {
        /// Description of the serialization error.
        message: String,
    },

    /// The report could not be published upstream.
    #[error("Failed to publish reported state: {message}")]
    Publish {
        /// Description of the publish failure.
        message: String,
    },
}

/// Result type alias for quaymaster operations.
pub type Result<T> = std::result::Result<T, QuaymasterError>;

impl QuaymasterError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error aborts the whole reconciliation pass.
    ///
    /// Per-container execution failures are collected and reported alongside
    /// their siblings; only inventory and report failures end the pass.
    #[must_use]
    pub const fn is_pass_fatal(&self) -> bool {
        matches!(
            self,
            Self::Runtime(RuntimeError::InventoryQuery { .. } | RuntimeError::Connection { .. })
                | Self::Report(_)
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a parse error with an optional source location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl RuntimeError {
    /// Creates an inventory query error.
    #[must_use]
    pub fn inventory(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InventoryQuery {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a container API error.
    #[must_use]
    pub fn container(
        operation: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ContainerApi {
            operation: operation.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates an image API error.
    #[must_use]
    pub fn image(
        operation: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ImageApi {
            operation: operation.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }
}

impl ReportError {
    /// Creates a publish error with the given message.
    #[must_use]
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::Serialize {
            message: message.into(),
        }
    }
}
