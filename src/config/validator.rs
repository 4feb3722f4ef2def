//! Validation of declared deployments.
//!
//! Validation runs before any remote call. It collects every error and
//! warning in one pass, then fails with the first error.

use crate::error::{ConfigError, HalldyllError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{Container, DeploymentSpec, EnvVar, ScalingConfig, VolumeSource};

/// Maximum GPUs per replica accepted by the control plane.
const MAX_GPU_COUNT: u32 = 8;

/// GPU classes the control plane is known to offer.
const KNOWN_GPU_CLASSES: &[&str] = &[
    "a4000",
    "a5000",
    "a6000",
    "a40",
    "a100-40gb",
    "a100-80gb",
    "h100-pcie",
    "h100-sxm",
    "l4",
    "l40",
    "l40s",
    "rtx3090",
    "rtx4090",
    "rtx6000-ada",
];

/// Validator for declared deployments.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Known GPU classes; unknown classes only warn.
    known_gpu_classes: HashSet<String>,
}

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
    /// Creates a new validator with the default GPU class list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_gpu_classes: KNOWN_GPU_CLASSES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Adds a GPU class to the known list.
    pub fn add_gpu_class(&mut self, gpu_class: impl Into<String>) {
        self.known_gpu_classes.insert(gpu_class.into().to_lowercase());
    }

    /// Validates a declared deployment.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, spec: &DeploymentSpec) -> Result<ValidationResult> {
        let result = self.check(spec);

        if result.errors.is_empty() {
            debug!("Declaration for {} passed validation", spec.name);
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(HalldyllError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Runs every check and returns all findings without failing.
    #[must_use]
    pub fn check(&self, spec: &DeploymentSpec) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_name(&spec.name, &mut result);
        self.validate_compute(spec, &mut result);
        Self::validate_scaling(&spec.scaling, &mut result);

        if spec.registry.private && spec.registry.credential.is_none() {
            result.warnings.push(String::from(
                "registry.private is set without a credential; pulls may fail",
            ));
        }

        if spec.containers.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("containers"),
                message: String::from("At least one container is required"),
            });
        }
        for (i, container) in spec.containers.iter().enumerate() {
            Self::validate_container(i, container, &mut result);
        }

        result
    }

    fn validate_name(name: &str, result: &mut ValidationResult) {
        if name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("name"),
                message: String::from("Deployment name cannot be empty"),
            });
        } else if !is_valid_name(name) {
            result.errors.push(ValidationError {
                field: String::from("name"),
                message: format!(
                    "Deployment name '{name}' is invalid. Must be lowercase alphanumeric with hyphens."
                ),
            });
        }
    }

    fn validate_compute(&self, spec: &DeploymentSpec, result: &mut ValidationResult) {
        let compute = &spec.compute;

        if compute.gpu_class.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("compute.gpu_class"),
                message: String::from("GPU class cannot be empty"),
            });
        } else if !self
            .known_gpu_classes
            .contains(&compute.gpu_class.to_lowercase())
        {
            result.warnings.push(format!(
                "GPU class '{}' is not in the known list; availability is not guaranteed",
                compute.gpu_class
            ));
        }

        if compute.gpu_count == 0 || compute.gpu_count > MAX_GPU_COUNT {
            result.errors.push(ValidationError {
                field: String::from("compute.gpu_count"),
                message: format!(
                    "GPU count must be between 1 and {MAX_GPU_COUNT}, got {}",
                    compute.gpu_count
                ),
            });
        }
    }

    fn validate_scaling(scaling: &ScalingConfig, result: &mut ValidationResult) {
        if scaling.max_replicas == 0 {
            result.errors.push(ValidationError {
                field: String::from("scaling.max_replicas"),
                message: String::from("max_replicas must be at least 1"),
            });
        }
        if scaling.min_replicas > scaling.max_replicas {
            result.errors.push(ValidationError {
                field: String::from("scaling.min_replicas"),
                message: format!(
                    "min_replicas ({}) exceeds max_replicas ({})",
                    scaling.min_replicas, scaling.max_replicas
                ),
            });
        }

        let queue = scaling.triggers.queue_load.threshold;
        if !queue.is_finite() || queue <= 0.0 {
            result.errors.push(ValidationError {
                field: String::from("scaling.triggers.queue_load.threshold"),
                message: format!("Queue load threshold must be positive, got {queue}"),
            });
        }

        let utilization = [
            ("cpu_utilization", scaling.triggers.cpu_utilization),
            ("gpu_utilization", scaling.triggers.gpu_utilization),
        ];
        for (name, trigger) in utilization {
            if let Some(trigger) = trigger {
                if trigger.threshold == 0 || trigger.threshold > 100 {
                    result.errors.push(ValidationError {
                        field: format!("scaling.triggers.{name}.threshold"),
                        message: format!(
                            "Utilization threshold must be between 1 and 100, got {}",
                            trigger.threshold
                        ),
                    });
                }
            }
        }
    }

    fn validate_container(index: usize, container: &Container, result: &mut ValidationResult) {
        let prefix = format!("containers[{index}]");

        if container.image.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.image"),
                message: String::from("Container image cannot be empty"),
            });
        } else if container.image.ends_with(":latest") || !has_tag(&container.image) {
            result.warnings.push(format!(
                "{prefix}.image '{}' is not pinned; drift will go unnoticed",
                container.image
            ));
        }

        if container.port == 0 {
            result.errors.push(ValidationError {
                field: format!("{prefix}.port"),
                message: String::from("Port cannot be 0"),
            });
        }

        if let Some(healthcheck) = &container.healthcheck {
            if !healthcheck.path.starts_with('/') {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.healthcheck.path"),
                    message: format!("Healthcheck path must start with '/': {}", healthcheck.path),
                });
            }
            if healthcheck.period_secs == 0 || healthcheck.failure_threshold == 0 {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.healthcheck"),
                    message: String::from("Healthcheck period and failure threshold must be positive"),
                });
            }
        }

        if let Some(entrypoint) = &container.entrypoint {
            if entrypoint.command.is_empty() && entrypoint.args.is_empty() {
                result.warnings.push(format!(
                    "{prefix}.entrypoint is empty and behaves like the image default"
                ));
            }
        }

        Self::validate_env(&prefix, &container.env, result);
        Self::validate_volumes(&prefix, container, result);
    }

    fn validate_env(prefix: &str, env: &[EnvVar], result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, var) in env.iter().enumerate() {
            let field = format!("{prefix}.env[{i}]");
            if var.name().trim().is_empty() {
                result.errors.push(ValidationError {
                    field,
                    message: String::from("Environment variable name cannot be empty"),
                });
                continue;
            }
            if !seen.insert(var.name()) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!("Duplicate environment variable: {}", var.name()),
                });
            }
            if let EnvVar::Secret { secret_ref, .. } = var {
                if secret_ref.trim().is_empty() {
                    result.errors.push(ValidationError {
                        field: format!("{field}.secret_ref"),
                        message: format!("Secret variable {} has no secret reference", var.name()),
                    });
                }
            }
        }
    }

    fn validate_volumes(prefix: &str, container: &Container, result: &mut ValidationResult) {
        let mut paths = HashSet::new();

        for (i, volume) in container.volumes.iter().enumerate() {
            let field = format!("{prefix}.volumes[{i}]");

            if !volume.mount_path.starts_with('/') {
                result.errors.push(ValidationError {
                    field: format!("{field}.mount_path"),
                    message: format!("Mount path must be absolute: {}", volume.mount_path),
                });
            }
            if !paths.insert(volume.mount_path.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{field}.mount_path"),
                    message: format!("Duplicate mount path: {}", volume.mount_path),
                });
            }
            if let Err(HalldyllError::Config(ConfigError::ValidationError {
                message,
                field: Some(companion),
            })) = volume.source.check_companion()
            {
                result.errors.push(ValidationError {
                    field: format!("{field}.{companion}"),
                    message,
                });
            }
            match volume.source {
                VolumeSource::Scratch { size_mb: Some(0) }
                | VolumeSource::Memory { size_mb: Some(0) } => {
                    result.errors.push(ValidationError {
                        field: format!("{field}.size_mb"),
                        message: String::from("Volume size must be positive"),
                    });
                }
                _ => {}
            }
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

/// Returns true if the image reference carries a tag or digest.
fn has_tag(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    last_segment.contains(':')
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ComputeDescriptor, RegistrySettings, UtilizationTrigger, VolumeMount,
    };

    fn spec() -> DeploymentSpec {
        DeploymentSpec {
            name: String::from("svc-infer"),
            compute: ComputeDescriptor {
                gpu_class: String::from("rtx4090"),
                gpu_count: 1,
            },
            scaling: ScalingConfig::default(),
            registry: RegistrySettings::default(),
            containers: vec![Container {
                image: String::from("ghcr.io/acme/infer:1.2.0"),
                port: 8000,
                healthcheck: None,
                entrypoint: None,
                env: vec![EnvVar::plain("MODEL", "qwen")],
                volumes: vec![VolumeMount::scratch("/tmp/work", Some(1024))],
            }],
        }
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("svc-infer"));
        assert!(is_valid_name("my-svc-123"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Svc")); // uppercase
        assert!(!is_valid_name("123-svc")); // starts with number
        assert!(!is_valid_name("svc_infer")); // underscore
        assert!(!is_valid_name("svc-")); // ends with hyphen
        assert!(!is_valid_name("svc--infer")); // consecutive hyphens
    }

    #[test]
    fn test_valid_spec_passes() {
        let result = ConfigValidator::new().validate(&spec()).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_shared_volume_without_id_rejected() {
        let mut spec = spec();
        spec.containers[0].volumes.push(VolumeMount {
            mount_path: String::from("/models"),
            source: VolumeSource::Shared {
                volume_id: String::new(),
            },
        });

        let err = ConfigValidator::new().validate(&spec).unwrap_err();
        match err {
            HalldyllError::Config(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field.as_deref(), Some("containers[0].volumes[1].volume_id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_secret_volume_without_name_rejected() {
        let mut spec = spec();
        spec.containers[0].volumes = vec![VolumeMount {
            mount_path: String::from("/etc/creds"),
            source: VolumeSource::Secret {
                secret_name: String::from(" "),
            },
        }];

        assert!(ConfigValidator::new().validate(&spec).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut spec = spec();
        spec.containers[0].env.push(EnvVar::plain("MODEL", "other"));
        spec.containers[0].volumes.push(VolumeMount::memory("relative", None));
        spec.scaling.triggers.cpu_utilization = Some(UtilizationTrigger {
            enabled: true,
            threshold: 120,
        });
        spec.scaling.min_replicas = 5;

        let result = ConfigValidator::new().check(&spec);
        assert_eq!(result.error_count(), 4);
    }

    #[test]
    fn test_empty_containers_rejected() {
        let mut spec = spec();
        spec.containers.clear();
        assert!(ConfigValidator::new().validate(&spec).is_err());
    }

    #[test]
    fn test_warnings() {
        let mut spec = spec();
        spec.compute.gpu_class = String::from("tpu-v5");
        spec.containers[0].image = String::from("ghcr.io/acme/infer");
        spec.registry.private = true;

        let result = ConfigValidator::new().validate(&spec).unwrap();
        assert_eq!(result.warning_count(), 3);
    }
}
