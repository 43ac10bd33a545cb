//! Configuration module for the quaymaster agent.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `quaymaster.agent.yaml`
//! - Parsing desired-state delta documents
//! - Validation of configuration and delta values
//! - Hashing desired sets for change detection

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{
    AgentConfig, AgentSettings, DEFAULT_NETWORK_MODE, DeltaConfig, DesiredContainerSpec,
    DesiredRunState, DesiredSet, RegistryCredential, ReportConfig, RuntimeConnection,
    RuntimeProtocol,
};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, find_config_file, load_delta_file, parse_delta,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::DeltaHasher;
