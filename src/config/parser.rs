//! Loading of agent configuration and desired-state delta documents.
//!
//! Agent configuration comes from a YAML file with `${VAR}` interpolation
//! for secrets and a handful of environment overrides for the runtime
//! connection. Delta documents are JSON or YAML, keyed by logical container
//! name.

use crate::error::{ConfigError, QuaymasterError, Result};
use std::path::Path;
use tracing::{debug, info};

use super::spec::{AgentConfig, DesiredSet, RuntimeProtocol};

/// Parser for agent configuration files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads agent configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, interpolated, or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<AgentConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(QuaymasterError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            QuaymasterError::Config(ConfigError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            ))
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses agent configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if interpolation or parsing fails.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<AgentConfig> {
        debug!("Parsing YAML configuration");

        let interpolated = expand_env(content)?;

        let mut config: AgentConfig = serde_yaml::from_str(&interpolated).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            QuaymasterError::Config(ConfigError::parse(format!("YAML parse error: {e}"), location))
        })?;

        Self::apply_env_overrides(&mut config);

        debug!(
            "Parsed configuration for agent '{}' ({} registries)",
            config.agent.name,
            config.registries.len()
        );
        Ok(config)
    }

    /// Applies runtime-connection environment overrides.
    ///
    /// The variable names match what the daemon tooling already uses:
    /// `DOCKER_PROTOCOL`, `DOCKER_HOST`, `DOCKER_PORT`, `DOCKER_SOCKET`.
    fn apply_env_overrides(config: &mut AgentConfig) {
        if let Ok(protocol) = std::env::var("DOCKER_PROTOCOL") {
            debug!("Overriding runtime.protocol from environment");
            config.runtime.protocol = if protocol.eq_ignore_ascii_case("http") {
                RuntimeProtocol::Http
            } else {
                RuntimeProtocol::Socket
            };
        }

        if let Ok(host) = std::env::var("DOCKER_HOST") {
            debug!("Overriding runtime.host from environment");
            config.runtime.host = host;
        }

        if let Ok(port) = std::env::var("DOCKER_PORT") {
            if let Ok(port) = port.parse() {
                debug!("Overriding runtime.port from environment");
                config.runtime.port = port;
            }
        }

        if let Ok(socket) = std::env::var("DOCKER_SOCKET") {
            debug!("Overriding runtime.socket from environment");
            config.runtime.socket = socket;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                QuaymasterError::Config(ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                ))
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Expands `${VAR}` references against the process environment.
fn expand_env(content: &str) -> Result<String> {
    expand_with(content, |name| std::env::var(name).ok())
}

/// Expands `${VAR}` references using the given lookup.
///
/// Fails on an unset variable rather than substituting an empty string.
fn expand_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| {
            QuaymasterError::Config(ConfigError::MissingEnvVar {
                name: name.to_string(),
            })
        })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Parses a desired-state delta document from JSON or YAML.
///
/// JSON is tried first since that is the upstream wire format; YAML accepts
/// hand-written documents for `plan`/`apply`.
///
/// # Errors
///
/// Returns an error if neither format parses.
pub fn parse_delta(content: &str, source: Option<&Path>) -> Result<DesiredSet> {
    if let Ok(set) = serde_json::from_str::<DesiredSet>(content) {
        return Ok(set);
    }

    serde_yaml::from_str(content).map_err(|e| {
        let location = source.map(|p| p.display().to_string());
        QuaymasterError::Config(ConfigError::parse(
            format!("Delta document parse error: {e}"),
            location,
        ))
    })
}

/// Loads a desired-state delta document from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_delta_file(path: impl AsRef<Path>) -> Result<DesiredSet> {
    let path = path.as_ref();
    debug!("Loading delta document from: {}", path.display());

    if !path.exists() {
        return Err(QuaymasterError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        QuaymasterError::Config(ConfigError::parse(
            format!("Failed to read file: {e}"),
            Some(path.display().to_string()),
        ))
    })?;

    parse_delta(&content, Some(path))
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "quaymaster.agent.yaml",
    "quaymaster.agent.yml",
    "agent.yaml",
    "agent.yml",
];

/// Finds the configuration file in the start directory, its parents, or the
/// user configuration directory.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user_path = config_dir.join("quaymaster").join("agent.yaml");
        if user_path.exists() {
            info!("Found configuration file: {}", user_path.display());
            return Ok(user_path);
        }
    }

    Err(QuaymasterError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::RuntimeProtocol;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
agent:
  name: test-agent
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(config.agent.name, "test-agent");
        assert_eq!(config.agent.pass_timeout_secs, 600);
        assert_eq!(config.runtime.protocol, RuntimeProtocol::Socket);
        assert!(config.registries.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
agent:
  name: pi-node-01
  pass_timeout_secs: 120

runtime:
  protocol: http
  host: docker.internal
  port: 2376

delta:
  path: ./containers.delta.json
  poll_interval_secs: 15

report:
  path: ./containers.reported.json

registries:
  registry.example.com:
    username: deploy
    password: hunter2
    email: ops@example.com
    server_address: https://registry.example.com
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(config.agent.name, "pi-node-01");
        assert_eq!(config.agent.pass_timeout_secs, 120);
        assert_eq!(config.runtime.protocol, RuntimeProtocol::Http);
        assert_eq!(config.runtime.host, "docker.internal");
        assert_eq!(config.delta.poll_interval_secs, 15);

        let cred = config.registries.get("registry.example.com").unwrap();
        assert_eq!(cred.username, "deploy");
        assert_eq!(cred.server_address, "https://registry.example.com");
    }

    #[test]
    fn test_interpolation_expands_variables() {
        let expanded = expand_with("password: ${SECRET} end", |name| {
            (name == "SECRET").then(|| String::from("s3cret"))
        })
        .unwrap();
        assert_eq!(expanded, "password: s3cret end");
    }

    #[test]
    fn test_interpolation_missing_var_fails() {
        let result = expand_with("password: ${UNSET}", |_| None);
        assert!(result.is_err());
    }

    #[test]
    fn test_interpolation_leaves_unterminated_reference() {
        let expanded = expand_with("oops ${NOT_CLOSED", |_| None).unwrap();
        assert_eq!(expanded, "oops ${NOT_CLOSED");
    }

    #[test]
    fn test_parse_delta_json_and_yaml() {
        let json = r#"{"app": {"image": "myrepo/app", "tag": "v1", "state": "running"}}"#;
        let set = parse_delta(json, None).unwrap();
        assert!(set.get("app").unwrap().wants_running());

        let yaml = r"
app:
  image: myrepo/app
  tag: v1
  state: running
";
        let set = parse_delta(yaml, None).unwrap();
        assert_eq!(set.get("app").unwrap().tag.as_deref(), Some("v1"));
    }

    #[test]
    fn test_load_delta_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delta.json");
        std::fs::write(&path, r#"{"db": {"image": "library/postgres", "tag": "16"}}"#).unwrap();

        let set = load_delta_file(&path).unwrap();
        assert!(set.contains("db"));
        assert!(!set.get("db").unwrap().wants_running());
    }
}
