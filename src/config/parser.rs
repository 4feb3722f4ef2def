//! Configuration parser for declared deployments and reconciler settings.
//!
//! Declarations and settings are YAML. Settings additionally accept
//! `HALLDYLL_*` environment overrides and a `.env` file.

use crate::error::{ConfigError, HalldyllError, Result};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::settings::ReconcilerSettings;
use super::spec::DeploymentSpec;

/// Environment variable holding the control-plane API key.
pub const API_KEY_VAR: &str = "HALLDYLL_API_KEY";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a declared deployment from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_spec_file(&self, path: impl AsRef<Path>) -> Result<DeploymentSpec> {
        let path = path.as_ref();
        info!("Loading deployment declaration from: {}", path.display());
        let content = read_file(path)?;
        self.parse_spec_yaml(&content, Some(path))
    }

    /// Parses a declared deployment from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_spec_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeploymentSpec> {
        let spec: DeploymentSpec = parse_yaml(content, source)?;
        debug!("Parsed declaration for deployment: {}", spec.name);
        Ok(spec)
    }

    /// Loads reconciler settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_settings_file(&self, path: impl AsRef<Path>) -> Result<ReconcilerSettings> {
        let path = path.as_ref();
        info!("Loading reconciler settings from: {}", path.display());
        let content = read_file(path)?;
        parse_yaml(&content, Some(path))
    }

    /// Loads settings (defaults when `path` is `None`), then applies
    /// environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, an override is malformed,
    /// or the merged settings are invalid.
    pub fn load_settings_with_env(&self, path: Option<&Path>) -> Result<ReconcilerSettings> {
        let mut settings = match path {
            Some(path) => self.load_settings_file(path)?,
            None => ReconcilerSettings::default(),
        };

        Self::apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies `HALLDYLL_*` overrides obtained through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnvVar` if a numeric or boolean override cannot be parsed.
    pub fn apply_env_overrides<F>(settings: &mut ReconcilerSettings, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("HALLDYLL_API_URL") {
            debug!("Overriding api.url from environment");
            settings.api.url = url;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_REQUEST_TIMEOUT_SECS")? {
            settings.api.request_timeout_secs = value;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_MAX_RETRIES")? {
            settings.api.max_retries = value;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_POLL_INTERVAL_SECS")? {
            settings.poller.interval_secs = value;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_POLL_DEADLINE_SECS")? {
            settings.poller.deadline_secs = value;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_DELETE_TIMEOUT_SECS")? {
            settings.poller.delete_timeout_hint_secs = value;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_CHECK_GPU_AVAILABILITY")? {
            settings.check_gpu_availability = value;
        }
        if let Some(level) = lookup("HALLDYLL_LOG_LEVEL") {
            debug!("Overriding logging.level from environment");
            settings.logging.level = level;
        }
        if let Some(value) = parsed(&lookup, "HALLDYLL_LOG_JSON")? {
            settings.logging.json = value;
        }
        Ok(())
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
                HalldyllError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the control-plane API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not set or empty.
    pub fn get_api_key() -> Result<String> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(HalldyllError::Config(ConfigError::MissingEnvVar {
                name: String::from(API_KEY_VAR),
            })),
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(HalldyllError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    std::fs::read_to_string(path).map_err(|e| {
        HalldyllError::Config(ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}

fn parse_yaml<T: serde::de::DeserializeOwned>(content: &str, source: Option<&Path>) -> Result<T> {
    serde_yaml::from_str(content).map_err(|e| {
        let location = source.map(|p| p.display().to_string());
        HalldyllError::Config(ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location,
        })
    })
}

fn parsed<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    debug!("Overriding setting from {name}");
    raw.trim().parse().map(Some).map_err(|_| {
        HalldyllError::Config(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: raw,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SPEC_YAML: &str = r"
name: svc-infer
compute:
  gpu_class: rtx4090
scaling:
  max_replicas: 3
  triggers:
    queue_load:
      threshold: 4
    cpu_utilization:
      threshold: 80
containers:
  - image: ghcr.io/acme/infer:1.2.0
    port: 8000
    healthcheck:
      path: /health
    env:
      - kind: plain
        name: MODEL
        value: qwen
      - kind: secret
        name: HF_TOKEN
        secret_ref: hf/token
    volumes:
      - kind: shared
        mount_path: /models
        volume_id: vol-123
      - kind: memory
        mount_path: /dev/shm
        size_mb: 2048
";

    #[test]
    fn test_parse_spec() {
        let spec = ConfigParser::new().parse_spec_yaml(SPEC_YAML, None).unwrap();

        assert_eq!(spec.name, "svc-infer");
        assert_eq!(spec.compute.gpu_count, 1);
        assert_eq!(spec.scaling.max_replicas, 3);
        let cpu = spec.scaling.triggers.cpu_utilization.unwrap();
        assert!(cpu.enabled);
        assert_eq!(cpu.threshold, 80);
        assert!(spec.scaling.triggers.gpu_utilization.is_none());

        let container = &spec.containers[0];
        assert_eq!(container.healthcheck.as_ref().unwrap().period_secs, 10);
        assert!(container.entrypoint.is_none());
        assert_eq!(container.env.len(), 2);
        assert_eq!(container.volumes.len(), 2);
    }

    #[test]
    fn test_load_spec_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SPEC_YAML.as_bytes()).unwrap();

        let spec = ConfigParser::new().load_spec_file(file.path()).unwrap();
        assert_eq!(spec.containers[0].port, 8000);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigParser::new()
            .load_spec_file(dir.path().join("absent.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            HalldyllError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_parse_error_has_location() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name: [unterminated").unwrap();

        let err = ConfigParser::new().load_spec_file(file.path()).unwrap_err();
        match err {
            HalldyllError::Config(ConfigError::ParseError { location, .. }) => {
                assert!(location.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HALLDYLL_API_URL", "http://localhost:9000"),
            ("HALLDYLL_POLL_INTERVAL_SECS", "2"),
            ("HALLDYLL_CHECK_GPU_AVAILABILITY", "true"),
            ("HALLDYLL_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut settings = ReconcilerSettings::default();
        ConfigParser::apply_env_overrides(&mut settings, |name| {
            vars.get(name).map(|v| (*v).to_string())
        })
        .unwrap();

        assert_eq!(settings.api.url, "http://localhost:9000");
        assert_eq!(settings.poller.interval_secs, 2);
        assert_eq!(settings.poller.deadline_secs, 300);
        assert!(settings.check_gpu_availability);
        assert!(settings.logging.json);
    }

    #[test]
    fn test_env_override_invalid_number() {
        let mut settings = ReconcilerSettings::default();
        let err = ConfigParser::apply_env_overrides(&mut settings, |name| {
            (name == "HALLDYLL_MAX_RETRIES").then(|| String::from("many"))
        })
        .unwrap_err();

        assert!(matches!(
            err,
            HalldyllError::Config(ConfigError::InvalidEnvVar { ref name, .. }) if name == "HALLDYLL_MAX_RETRIES"
        ));
    }

    #[test]
    fn test_load_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"poller:\n  deadline_secs: 60\nlogging:\n  level: debug\n")
            .unwrap();

        let settings = ConfigParser::new().load_settings_file(file.path()).unwrap();
        assert_eq!(settings.poller.deadline_secs, 60);
        assert_eq!(settings.logging.level, "debug");
    }
}
