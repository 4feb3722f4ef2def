//! Control-plane wire types.
//!
//! Every field of a response is optional: the control plane echoes back only
//! part of what it was given, and "not echoed" must stay distinguishable from
//! an explicit value. The same structs are serialized for outgoing payloads,
//! with `None` fields omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{
    ComputeDescriptor, Container, DeploymentSpec, EnvVar, RegistrySettings, ResourceKind,
    ScalingConfig, UtilizationTrigger, VolumeMount, VolumeSource,
};

/// Identity of a remote resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Remote identifier.
    pub id: String,
}

/// A deployment as reported by the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDeployment {
    /// Remote identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Deployment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Status string (e.g. `PROVISIONING`, `READY`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Compute descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<RemoteCompute>,
    /// Scaling configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<RemoteScaling>,
    /// Registry settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RemoteRegistry>,
    /// Containers in positional order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<RemoteContainer>>,
    /// Public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Hourly price in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_hour: Option<f64>,
    /// Replicas currently serving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<u32>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Compute section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCompute {
    /// GPU class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_class: Option<String>,
    /// GPU count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_count: Option<u32>,
}

/// Registry section. The credential name is write-only on most responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRegistry {
    /// Private registry flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    /// Stored credential name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_name: Option<String>,
}

/// Scaling section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteScaling {
    /// Minimum replicas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,
    /// Maximum replicas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,
    /// Scaling delay policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<RemoteScalingPolicy>,
    /// Trigger set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<RemoteTriggers>,
}

/// Scaling delay.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteScalingPolicy {
    /// Seconds before acting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u32>,
}

/// Trigger set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTriggers {
    /// Queue load trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_load: Option<RemoteQueueLoad>,
    /// CPU utilization trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<RemoteUtilization>,
    /// GPU utilization trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_utilization: Option<RemoteUtilization>,
}

/// Queue load trigger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteQueueLoad {
    /// Requests per replica.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Utilization trigger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteUtilization {
    /// Active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Percentage threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
}

/// A container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteContainer {
    /// Image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Exposed port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Readiness probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<RemoteHealthcheck>,
    /// Entrypoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<RemoteEntrypoint>,
    /// Environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<RemoteEnvVar>>,
    /// Volume mounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<RemoteVolume>>,
}

/// Readiness probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHealthcheck {
    /// Active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Probe path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Probe port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Initial delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<u32>,
    /// Probe period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<u32>,
    /// Failures tolerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

/// Entrypoint override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteEntrypoint {
    /// Active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Command vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

/// Environment variable. Secret references are never echoed back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEnvVar {
    /// `plain` or `secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Variable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Inline value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Secret reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

/// Volume mount.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVolume {
    /// Volume kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RemoteVolumeKind>,
    /// Mount path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    /// Size for scratch and memory volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<u32>,
    /// Secret name for secret volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    /// Volume identifier for shared volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,
}

/// Volume kinds known to this crate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteVolumeKind {
    /// Ephemeral disk.
    Scratch,
    /// RAM-backed.
    Memory,
    /// Secret files.
    Secret,
    /// Shared network volume.
    Shared,
    /// A kind this crate does not model.
    #[serde(other)]
    Unknown,
}

/// Create payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    /// Deployment name.
    pub name: String,
    /// Compute descriptor.
    pub compute: RemoteCompute,
    /// Scaling configuration.
    pub scaling: RemoteScaling,
    /// Registry settings.
    pub registry: RemoteRegistry,
    /// Containers.
    pub containers: Vec<RemoteContainer>,
}

/// Update payload. Only the sections being changed are sent.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeploymentRequest {
    /// Scaling section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling: Option<RemoteScaling>,
    /// Containers section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<RemoteContainer>>,
}

/// HTTP verbs accepted by the generic `execute` escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PATCH.
    Patch,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

/// Raw response from `execute`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: u16,
    /// Decoded JSON body, `Null` when empty.
    pub body: serde_json::Value,
}

/// GPU class entry returned by `GET /gpu-classes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GpuClass {
    /// GPU class identifier.
    pub id: String,
    /// Whether capacity is currently offered.
    #[serde(default)]
    pub available: bool,
}

impl ResourceId {
    /// Creates a resource identity.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// REST path of the resource, relative to the API base URL.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.kind.collection(), self.id)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl HttpMethod {
    /// Upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

impl CreateDeploymentRequest {
    /// Builds the create payload from a declaration.
    #[must_use]
    pub fn from_spec(spec: &DeploymentSpec) -> Self {
        Self {
            name: spec.name.clone(),
            compute: RemoteCompute::from(&spec.compute),
            scaling: RemoteScaling::from(&spec.scaling),
            registry: RemoteRegistry::from(&spec.registry),
            containers: spec.containers.iter().map(RemoteContainer::from).collect(),
        }
    }
}

impl UpdateDeploymentRequest {
    /// Returns true if no section is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.scaling.is_none() && self.containers.is_none()
    }
}

impl From<&ComputeDescriptor> for RemoteCompute {
    fn from(compute: &ComputeDescriptor) -> Self {
        Self {
            gpu_class: Some(compute.gpu_class.clone()),
            gpu_count: Some(compute.gpu_count),
        }
    }
}

impl From<&RegistrySettings> for RemoteRegistry {
    fn from(registry: &RegistrySettings) -> Self {
        Self {
            private: Some(registry.private),
            credential_name: registry.credential.clone(),
        }
    }
}

impl From<UtilizationTrigger> for RemoteUtilization {
    fn from(trigger: UtilizationTrigger) -> Self {
        Self {
            enabled: Some(trigger.enabled),
            threshold: Some(trigger.threshold),
        }
    }
}

impl From<&ScalingConfig> for RemoteScaling {
    fn from(scaling: &ScalingConfig) -> Self {
        let triggers = &scaling.triggers;
        Self {
            min_replicas: Some(scaling.min_replicas),
            max_replicas: Some(scaling.max_replicas),
            policy: Some(RemoteScalingPolicy {
                delay_seconds: Some(scaling.policy.delay_secs),
            }),
            triggers: Some(RemoteTriggers {
                queue_load: Some(RemoteQueueLoad {
                    threshold: Some(triggers.queue_load.threshold),
                }),
                cpu_utilization: triggers.cpu_utilization.map(RemoteUtilization::from),
                gpu_utilization: triggers.gpu_utilization.map(RemoteUtilization::from),
            }),
        }
    }
}

impl From<&Container> for RemoteContainer {
    fn from(container: &Container) -> Self {
        let healthcheck = container.healthcheck.as_ref().map(|h| RemoteHealthcheck {
            enabled: Some(true),
            path: Some(h.path.clone()),
            port: h.port,
            initial_delay_seconds: Some(h.initial_delay_secs),
            period_seconds: Some(h.period_secs),
            failure_threshold: Some(h.failure_threshold),
        });
        let entrypoint = container.entrypoint.as_ref().map(|e| RemoteEntrypoint {
            enabled: Some(true),
            command: Some(e.command.clone()),
            args: Some(e.args.clone()),
        });

        Self {
            image: Some(container.image.clone()),
            port: Some(container.port),
            healthcheck,
            entrypoint,
            env: Some(container.env.iter().map(RemoteEnvVar::from).collect()),
            volumes: Some(container.volumes.iter().map(RemoteVolume::from).collect()),
        }
    }
}

impl From<&EnvVar> for RemoteEnvVar {
    fn from(var: &EnvVar) -> Self {
        match var {
            EnvVar::Plain { name, value } => Self {
                kind: Some(String::from("plain")),
                name: Some(name.clone()),
                value: Some(value.clone()),
                secret_ref: None,
            },
            EnvVar::Secret { name, secret_ref } => Self {
                kind: Some(String::from("secret")),
                name: Some(name.clone()),
                value: None,
                secret_ref: Some(secret_ref.clone()),
            },
        }
    }
}

impl From<&VolumeMount> for RemoteVolume {
    fn from(mount: &VolumeMount) -> Self {
        let mut volume = Self {
            mount_path: Some(mount.mount_path.clone()),
            ..Self::default()
        };
        match &mount.source {
            VolumeSource::Scratch { size_mb } => {
                volume.kind = Some(RemoteVolumeKind::Scratch);
                volume.size_mb = *size_mb;
            }
            VolumeSource::Memory { size_mb } => {
                volume.kind = Some(RemoteVolumeKind::Memory);
                volume.size_mb = *size_mb;
            }
            VolumeSource::Secret { secret_name } => {
                volume.kind = Some(RemoteVolumeKind::Secret);
                volume.secret_name = Some(secret_name.clone());
            }
            VolumeSource::Shared { volume_id } => {
                volume.kind = Some(RemoteVolumeKind::Shared);
                volume.volume_id = Some(volume_id.clone());
            }
        }
        volume
    }
}
