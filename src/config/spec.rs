//! Declared deployment types.
//!
//! These structs are the local representation of a deployment: what the
//! caller declares, and what the reconciler hands back after merging the
//! remote response. They deserialize from YAML documents such as:
//!
//! ```yaml
//! name: svc
//! compute:
//!   gpu_class: rtx4090
//!   gpu_count: 1
//! scaling:
//!   triggers:
//!     queue_load:
//!       threshold: 4
//! containers:
//!   - image: ghcr.io/acme/infer:1.2.0
//!     port: 8000
//!     volumes:
//!       - kind: shared
//!         mount_path: /models
//!         volume_id: vol-123
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A declared deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSpec {
    /// Durable key. Assigned at creation and never changed in place.
    pub name: String,
    /// GPU compute descriptor.
    pub compute: ComputeDescriptor,
    /// Replica bounds, policy and triggers.
    #[serde(default)]
    pub scaling: ScalingConfig,
    /// Container registry access.
    #[serde(default)]
    pub registry: RegistrySettings,
    /// Ordered containers. Identity is positional.
    pub containers: Vec<Container>,
}

/// GPU class and count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputeDescriptor {
    /// GPU class identifier (e.g. `rtx4090`, `a100-80gb`).
    pub gpu_class: String,
    /// Number of GPUs per replica.
    #[serde(default = "default_gpu_count")]
    pub gpu_count: u32,
}

/// Scaling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingConfig {
    /// Minimum replicas kept warm.
    #[serde(default)]
    pub min_replicas: u32,
    /// Maximum replicas.
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    /// Delay applied before scaling actions.
    #[serde(default)]
    pub policy: ScalingPolicy,
    /// Autoscaling triggers.
    #[serde(default)]
    pub triggers: ScalingTriggers,
}

/// Delay before any scale-up or scale-down action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingPolicy {
    /// Seconds to wait before acting.
    #[serde(default = "default_scaling_delay")]
    pub delay_secs: u32,
}

/// Autoscaling triggers. Queue load is mandatory, utilization triggers are
/// optional and independently toggled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingTriggers {
    /// Queue-load trigger.
    #[serde(default)]
    pub queue_load: QueueLoadTrigger,
    /// CPU utilization trigger. `None` means "not mentioned".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<UtilizationTrigger>,
    /// GPU utilization trigger. `None` means "not mentioned".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_utilization: Option<UtilizationTrigger>,
}

/// Scale when queued requests per replica exceed the threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QueueLoadTrigger {
    /// Queued requests per replica.
    pub threshold: f64,
}

/// Scale when utilization (percent) exceeds the threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UtilizationTrigger {
    /// Whether the trigger is active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Utilization percentage, 1 to 100.
    pub threshold: u8,
}

/// A single autoscaling trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Queue load.
    QueueLoad(QueueLoadTrigger),
    /// CPU utilization.
    CpuUtilization(UtilizationTrigger),
    /// GPU utilization.
    GpuUtilization(UtilizationTrigger),
}

/// Trigger discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Queue load.
    QueueLoad,
    /// CPU utilization.
    CpuUtilization,
    /// GPU utilization.
    GpuUtilization,
}

/// Private registry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Whether the image registry requires authentication.
    #[serde(default)]
    pub private: bool,
    /// Name of a stored registry credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// A container within a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    /// Image reference.
    pub image: String,
    /// Exposed port.
    pub port: u16,
    /// Readiness probe. Absent means no probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    /// Entrypoint override. Absent means the image default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<EntrypointOverride>,
    /// Environment variables.
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Volume mounts.
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
}

/// HTTP readiness probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Healthcheck {
    /// Probe path.
    pub path: String,
    /// Probe port; defaults to the container port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Seconds before the first probe.
    #[serde(default)]
    pub initial_delay_secs: u32,
    /// Seconds between probes.
    #[serde(default = "default_probe_period")]
    pub period_secs: u32,
    /// Consecutive failures before the replica is marked unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

/// Replacement command and arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntrypointOverride {
    /// Command vector.
    #[serde(default)]
    pub command: Vec<String>,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

/// An environment variable, either inline or sourced from a secret.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EnvVar {
    /// Inline value.
    Plain {
        /// Variable name.
        name: String,
        /// Value.
        value: String,
    },
    /// Value stored in a named secret.
    Secret {
        /// Variable name.
        name: String,
        /// Secret reference.
        secret_ref: String,
    },
}

/// A volume mounted into a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeMount {
    /// Absolute mount path.
    pub mount_path: String,
    /// What backs the mount.
    #[serde(flatten)]
    pub source: VolumeSource,
}

/// Volume backing. Each kind carries exactly the companion field it needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VolumeSource {
    /// Ephemeral disk.
    Scratch {
        /// Size in MiB.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_mb: Option<u32>,
    },
    /// RAM-backed tmpfs.
    Memory {
        /// Size in MiB.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_mb: Option<u32>,
    },
    /// Secret projected as files.
    Secret {
        /// Secret name.
        secret_name: String,
    },
    /// Network volume shared across replicas.
    Shared {
        /// Volume identifier.
        volume_id: String,
    },
}

/// Remote resource kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Long-running container deployment. Has an update endpoint.
    #[default]
    Deployment,
    /// Batch job deployment. The remote API cannot update it.
    Job,
}

// Default value functions

const fn default_gpu_count() -> u32 {
    1
}

const fn default_max_replicas() -> u32 {
    1
}

const fn default_scaling_delay() -> u32 {
    30
}

const fn default_enabled() -> bool {
    true
}

const fn default_probe_period() -> u32 {
    10
}

const fn default_failure_threshold() -> u32 {
    3
}

/// Default queue load threshold (requests per replica).
pub const DEFAULT_QUEUE_LOAD_THRESHOLD: f64 = 1.0;

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min_replicas: 0,
            max_replicas: default_max_replicas(),
            policy: ScalingPolicy::default(),
            triggers: ScalingTriggers::default(),
        }
    }
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            delay_secs: default_scaling_delay(),
        }
    }
}

impl Default for QueueLoadTrigger {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_QUEUE_LOAD_THRESHOLD,
        }
    }
}

impl Default for ScalingTriggers {
    fn default() -> Self {
        Self {
            queue_load: QueueLoadTrigger::default(),
            cpu_utilization: None,
            gpu_utilization: None,
        }
    }
}

impl TriggerKind {
    /// The optional utilization triggers.
    pub const UTILIZATION: [Self; 2] = [Self::CpuUtilization, Self::GpuUtilization];

    /// Wire and config name of the trigger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueueLoad => "queue_load",
            Self::CpuUtilization => "cpu_utilization",
            Self::GpuUtilization => "gpu_utilization",
        }
    }
}

impl Trigger {
    /// Returns the discriminant.
    #[must_use]
    pub const fn kind(&self) -> TriggerKind {
        match self {
            Self::QueueLoad(_) => TriggerKind::QueueLoad,
            Self::CpuUtilization(_) => TriggerKind::CpuUtilization,
            Self::GpuUtilization(_) => TriggerKind::GpuUtilization,
        }
    }

    /// Returns true if this trigger participates in scaling decisions.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        match self {
            Self::QueueLoad(_) => true,
            Self::CpuUtilization(t) | Self::GpuUtilization(t) => t.enabled,
        }
    }
}

impl ScalingTriggers {
    /// Returns every declared trigger, queue load first.
    #[must_use]
    pub fn iter(&self) -> Vec<Trigger> {
        let mut triggers = vec![Trigger::QueueLoad(self.queue_load)];
        if let Some(cpu) = self.cpu_utilization {
            triggers.push(Trigger::CpuUtilization(cpu));
        }
        if let Some(gpu) = self.gpu_utilization {
            triggers.push(Trigger::GpuUtilization(gpu));
        }
        triggers
    }

    /// Returns the utilization trigger of the given kind, if mentioned.
    #[must_use]
    pub const fn utilization(&self, kind: TriggerKind) -> Option<UtilizationTrigger> {
        match kind {
            TriggerKind::CpuUtilization => self.cpu_utilization,
            TriggerKind::GpuUtilization => self.gpu_utilization,
            TriggerKind::QueueLoad => None,
        }
    }

    /// Returns true if the declaration mentions the trigger.
    #[must_use]
    pub const fn mentions(&self, kind: TriggerKind) -> bool {
        match kind {
            TriggerKind::QueueLoad => true,
            TriggerKind::CpuUtilization => self.cpu_utilization.is_some(),
            TriggerKind::GpuUtilization => self.gpu_utilization.is_some(),
        }
    }
}

impl EnvVar {
    /// Creates a plain variable.
    #[must_use]
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Plain {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a secret-backed variable.
    #[must_use]
    pub fn secret(name: impl Into<String>, secret_ref: impl Into<String>) -> Self {
        Self::Secret {
            name: name.into(),
            secret_ref: secret_ref.into(),
        }
    }

    /// Returns the variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Plain { name, .. } | Self::Secret { name, .. } => name,
        }
    }
}

impl VolumeMount {
    /// Creates a scratch mount.
    #[must_use]
    pub fn scratch(mount_path: impl Into<String>, size_mb: Option<u32>) -> Self {
        Self {
            mount_path: mount_path.into(),
            source: VolumeSource::Scratch { size_mb },
        }
    }

    /// Creates a memory-backed mount.
    #[must_use]
    pub fn memory(mount_path: impl Into<String>, size_mb: Option<u32>) -> Self {
        Self {
            mount_path: mount_path.into(),
            source: VolumeSource::Memory { size_mb },
        }
    }

    /// Creates a secret mount.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the secret name is empty.
    pub fn secret(mount_path: impl Into<String>, secret_name: impl Into<String>) -> Result<Self> {
        let mount = Self {
            mount_path: mount_path.into(),
            source: VolumeSource::Secret {
                secret_name: secret_name.into(),
            },
        };
        mount.source.check_companion()?;
        Ok(mount)
    }

    /// Creates a shared network volume mount.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the volume identifier is empty.
    pub fn shared(mount_path: impl Into<String>, volume_id: impl Into<String>) -> Result<Self> {
        let mount = Self {
            mount_path: mount_path.into(),
            source: VolumeSource::Shared {
                volume_id: volume_id.into(),
            },
        };
        mount.source.check_companion()?;
        Ok(mount)
    }
}

impl VolumeSource {
    /// Wire name of the kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Scratch { .. } => "scratch",
            Self::Memory { .. } => "memory",
            Self::Secret { .. } => "secret",
            Self::Shared { .. } => "shared",
        }
    }

    /// Checks that the kind's required companion field is non-empty.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing field.
    pub fn check_companion(&self) -> Result<()> {
        match self {
            Self::Secret { secret_name } if secret_name.trim().is_empty() => Err(
                ConfigError::validation("secret volume requires a secret name", "secret_name").into(),
            ),
            Self::Shared { volume_id } if volume_id.trim().is_empty() => Err(
                ConfigError::validation("shared volume requires a volume identifier", "volume_id")
                    .into(),
            ),
            _ => Ok(()),
        }
    }
}

impl ResourceKind {
    /// Whether the remote API exposes an update endpoint for this kind.
    #[must_use]
    pub const fn supports_update(self) -> bool {
        matches!(self, Self::Deployment)
    }

    /// REST collection name.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Deployment => "deployments",
            Self::Job => "jobs",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Deployment => "deployment",
            Self::Job => "job",
        };
        write!(f, "{kind}")
    }
}

impl DeploymentSpec {
    /// Total GPUs requested per replica across the deployment.
    #[must_use]
    pub const fn gpus_per_replica(&self) -> u32 {
        self.compute.gpu_count
    }

    /// Container images in positional order.
    #[must_use]
    pub fn images(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.image.as_str()).collect()
    }
}
