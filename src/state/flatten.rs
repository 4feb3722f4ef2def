//! Projection of remote responses into the local shape.
//!
//! [`flatten`] keeps every field the remote response carries and nothing
//! else. All fields stay optional so the merger can tell "the remote said
//! nothing" apart from a real value. Disabled or null nested objects
//! (healthcheck, entrypoint, utilization triggers) are dropped rather than
//! turned into zero-valued structs.

use crate::config::UtilizationTrigger;
use crate::gateway::{
    RemoteContainer, RemoteDeployment, RemoteEntrypoint, RemoteEnvVar, RemoteHealthcheck,
    RemoteScaling, RemoteUtilization, RemoteVolume, RemoteVolumeKind,
};

use super::types::ComputedAttributes;

/// Remote response in local shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedDeployment {
    /// Remote identifier.
    pub id: Option<String>,
    /// Deployment name.
    pub name: Option<String>,
    /// Compute descriptor.
    pub compute: Option<FlattenedCompute>,
    /// Scaling configuration.
    pub scaling: Option<FlattenedScaling>,
    /// Registry settings.
    pub registry: Option<FlattenedRegistry>,
    /// Containers in positional order.
    pub containers: Option<Vec<FlattenedContainer>>,
    /// Remote-derived attributes.
    pub computed: ComputedAttributes,
}

/// Compute descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedCompute {
    /// GPU class.
    pub gpu_class: Option<String>,
    /// GPU count.
    pub gpu_count: Option<u32>,
}

/// Scaling configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlattenedScaling {
    /// Minimum replicas.
    pub min_replicas: Option<u32>,
    /// Maximum replicas.
    pub max_replicas: Option<u32>,
    /// Scaling delay.
    pub delay_secs: Option<u32>,
    /// Queue load threshold.
    pub queue_load_threshold: Option<f64>,
    /// Enabled CPU trigger.
    pub cpu_utilization: Option<UtilizationTrigger>,
    /// Enabled GPU trigger.
    pub gpu_utilization: Option<UtilizationTrigger>,
}

/// Registry settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedRegistry {
    /// Private flag.
    pub private: Option<bool>,
    /// Credential name.
    pub credential: Option<String>,
}

/// A container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedContainer {
    /// Image reference.
    pub image: Option<String>,
    /// Exposed port.
    pub port: Option<u16>,
    /// Enabled readiness probe.
    pub healthcheck: Option<FlattenedHealthcheck>,
    /// Enabled entrypoint override.
    pub entrypoint: Option<FlattenedEntrypoint>,
    /// Environment.
    pub env: Option<Vec<FlattenedEnvVar>>,
    /// Volume mounts with a known kind.
    pub volumes: Option<Vec<FlattenedVolume>>,
}

/// Readiness probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedHealthcheck {
    /// Probe path.
    pub path: Option<String>,
    /// Probe port.
    pub port: Option<u16>,
    /// Initial delay.
    pub initial_delay_secs: Option<u32>,
    /// Probe period.
    pub period_secs: Option<u32>,
    /// Failures tolerated.
    pub failure_threshold: Option<u32>,
}

/// Entrypoint override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedEntrypoint {
    /// Command vector.
    pub command: Option<Vec<String>>,
    /// Arguments.
    pub args: Option<Vec<String>>,
}

/// Environment variable kind as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlattenedEnvKind {
    /// Inline value.
    Plain,
    /// Secret-backed.
    Secret,
}

/// Environment variable. Entries without a name are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedEnvVar {
    /// Variable name.
    pub name: String,
    /// Kind, when reported.
    pub kind: Option<FlattenedEnvKind>,
    /// Inline value.
    pub value: Option<String>,
    /// Secret reference.
    pub secret_ref: Option<String>,
}

/// Volume mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedVolume {
    /// Mount path.
    pub mount_path: Option<String>,
    /// Backing, with companion fields as reported.
    pub source: FlattenedVolumeSource,
}

/// Volume backing with optional companion fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenedVolumeSource {
    /// Ephemeral disk.
    Scratch {
        /// Size in MiB.
        size_mb: Option<u32>,
    },
    /// RAM-backed.
    Memory {
        /// Size in MiB.
        size_mb: Option<u32>,
    },
    /// Secret files.
    Secret {
        /// Secret name.
        secret_name: Option<String>,
    },
    /// Shared network volume.
    Shared {
        /// Volume identifier.
        volume_id: Option<String>,
    },
}

impl FlattenedVolumeSource {
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
}

/// Projects a remote response into the local shape.
#[must_use]
pub fn flatten(remote: &RemoteDeployment) -> FlattenedDeployment {
    FlattenedDeployment {
        id: remote.id.clone(),
        name: remote.name.clone(),
        compute: remote.compute.as_ref().map(|c| FlattenedCompute {
            gpu_class: c.gpu_class.clone(),
            gpu_count: c.gpu_count,
        }),
        scaling: remote.scaling.as_ref().map(flatten_scaling),
        registry: remote.registry.as_ref().map(|r| FlattenedRegistry {
            private: r.private,
            credential: r.credential_name.clone(),
        }),
        containers: remote
            .containers
            .as_ref()
            .map(|containers| containers.iter().map(flatten_container).collect()),
        computed: ComputedAttributes {
            status: remote.status.clone(),
            endpoint_url: remote.endpoint_url.clone(),
            hourly_price: remote.price_per_hour,
            ready_replicas: remote.ready_replicas,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
        },
    }
}

/// Projects a remote scaling section.
#[must_use]
pub fn flatten_scaling(scaling: &RemoteScaling) -> FlattenedScaling {
    let triggers = scaling.triggers.unwrap_or_default();
    FlattenedScaling {
        min_replicas: scaling.min_replicas,
        max_replicas: scaling.max_replicas,
        delay_secs: scaling.policy.and_then(|p| p.delay_seconds),
        queue_load_threshold: triggers.queue_load.and_then(|q| q.threshold),
        cpu_utilization: triggers.cpu_utilization.and_then(enabled_trigger),
        gpu_utilization: triggers.gpu_utilization.and_then(enabled_trigger),
    }
}

/// A utilization trigger survives only when enabled with a known threshold.
fn enabled_trigger(trigger: RemoteUtilization) -> Option<UtilizationTrigger> {
    if trigger.enabled == Some(false) {
        return None;
    }
    trigger.threshold.map(|threshold| UtilizationTrigger {
        enabled: true,
        threshold,
    })
}

fn flatten_container(container: &RemoteContainer) -> FlattenedContainer {
    FlattenedContainer {
        image: container.image.clone(),
        port: container.port,
        healthcheck: container.healthcheck.as_ref().and_then(flatten_healthcheck),
        entrypoint: container.entrypoint.as_ref().and_then(flatten_entrypoint),
        env: container
            .env
            .as_ref()
            .map(|env| env.iter().filter_map(flatten_env_var).collect()),
        volumes: container
            .volumes
            .as_ref()
            .map(|volumes| volumes.iter().filter_map(flatten_volume).collect()),
    }
}

fn flatten_healthcheck(healthcheck: &RemoteHealthcheck) -> Option<FlattenedHealthcheck> {
    if healthcheck.enabled == Some(false) {
        return None;
    }
    Some(FlattenedHealthcheck {
        path: healthcheck.path.clone(),
        port: healthcheck.port,
        initial_delay_secs: healthcheck.initial_delay_seconds,
        period_secs: healthcheck.period_seconds,
        failure_threshold: healthcheck.failure_threshold,
    })
}

fn flatten_entrypoint(entrypoint: &RemoteEntrypoint) -> Option<FlattenedEntrypoint> {
    if entrypoint.enabled == Some(false) {
        return None;
    }
    Some(FlattenedEntrypoint {
        command: entrypoint.command.clone(),
        args: entrypoint.args.clone(),
    })
}

fn flatten_env_var(var: &RemoteEnvVar) -> Option<FlattenedEnvVar> {
    let name = var.name.clone()?;
    let kind = match var.kind.as_deref() {
        Some(k) if k.eq_ignore_ascii_case("plain") => Some(FlattenedEnvKind::Plain),
        Some(k) if k.eq_ignore_ascii_case("secret") => Some(FlattenedEnvKind::Secret),
        _ => None,
    };

    Some(FlattenedEnvVar {
        name,
        kind,
        value: var.value.clone(),
        secret_ref: var.secret_ref.clone(),
    })
}

fn flatten_volume(volume: &RemoteVolume) -> Option<FlattenedVolume> {
    let source = match volume.kind? {
        RemoteVolumeKind::Scratch => FlattenedVolumeSource::Scratch {
            size_mb: volume.size_mb,
        },
        RemoteVolumeKind::Memory => FlattenedVolumeSource::Memory {
            size_mb: volume.size_mb,
        },
        RemoteVolumeKind::Secret => FlattenedVolumeSource::Secret {
            secret_name: volume.secret_name.clone(),
        },
        RemoteVolumeKind::Shared => FlattenedVolumeSource::Shared {
            volume_id: volume.volume_id.clone(),
        },
        RemoteVolumeKind::Unknown => return None,
    };

    Some(FlattenedVolume {
        mount_path: volume.mount_path.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{RemoteQueueLoad, RemoteTriggers};

    #[test]
    fn test_disabled_objects_are_omitted() {
        let remote = RemoteDeployment {
            containers: Some(vec![RemoteContainer {
                image: Some(String::from("img:1")),
                healthcheck: Some(RemoteHealthcheck {
                    enabled: Some(false),
                    path: Some(String::from("/health")),
                    ..RemoteHealthcheck::default()
                }),
                entrypoint: None,
                ..RemoteContainer::default()
            }]),
            scaling: Some(RemoteScaling {
                triggers: Some(RemoteTriggers {
                    queue_load: Some(RemoteQueueLoad {
                        threshold: Some(2.0),
                    }),
                    cpu_utilization: Some(RemoteUtilization {
                        enabled: Some(false),
                        threshold: Some(80),
                    }),
                    gpu_utilization: Some(RemoteUtilization {
                        enabled: None,
                        threshold: Some(90),
                    }),
                }),
                ..RemoteScaling::default()
            }),
            ..RemoteDeployment::default()
        };

        let flat = flatten(&remote);
        let container = &flat.containers.as_ref().unwrap()[0];
        assert!(container.healthcheck.is_none());
        assert!(container.entrypoint.is_none());
        assert!(container.env.is_none());

        let scaling = flat.scaling.unwrap();
        assert_eq!(scaling.queue_load_threshold, Some(2.0));
        assert!(scaling.cpu_utilization.is_none());
        assert_eq!(scaling.gpu_utilization.map(|t| t.threshold), Some(90));
        assert!(scaling.min_replicas.is_none());
    }

    #[test]
    fn test_silence_stays_silent() {
        let flat = flatten(&RemoteDeployment::default());
        assert_eq!(flat, FlattenedDeployment::default());
    }

    #[test]
    fn test_volumes_keep_companions_and_drop_unknown() {
        let remote = RemoteDeployment {
            containers: Some(vec![RemoteContainer {
                volumes: Some(vec![
                    RemoteVolume {
                        kind: Some(RemoteVolumeKind::Shared),
                        mount_path: Some(String::from("/models")),
                        ..RemoteVolume::default()
                    },
                    RemoteVolume {
                        kind: Some(RemoteVolumeKind::Unknown),
                        ..RemoteVolume::default()
                    },
                    RemoteVolume {
                        kind: Some(RemoteVolumeKind::Memory),
                        size_mb: Some(512),
                        ..RemoteVolume::default()
                    },
                ]),
                ..RemoteContainer::default()
            }]),
            ..RemoteDeployment::default()
        };

        let flat = flatten(&remote);
        let volumes = flat.containers.unwrap()[0].volumes.clone().unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(
            volumes[0].source,
            FlattenedVolumeSource::Shared { volume_id: None }
        );
        assert_eq!(
            volumes[1].source,
            FlattenedVolumeSource::Memory { size_mb: Some(512) }
        );
    }

    #[test]
    fn test_env_without_name_dropped() {
        let remote = RemoteDeployment {
            containers: Some(vec![RemoteContainer {
                env: Some(vec![
                    RemoteEnvVar {
                        kind: Some(String::from("secret")),
                        name: Some(String::from("TOKEN")),
                        ..RemoteEnvVar::default()
                    },
                    RemoteEnvVar {
                        value: Some(String::from("orphan")),
                        ..RemoteEnvVar::default()
                    },
                ]),
                ..RemoteContainer::default()
            }]),
            ..RemoteDeployment::default()
        };

        let env = flatten(&remote).containers.unwrap()[0].env.clone().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].kind, Some(FlattenedEnvKind::Secret));
        assert!(env[0].secret_ref.is_none());
    }
}
