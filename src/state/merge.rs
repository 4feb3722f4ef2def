//! Recovery of caller intent from partial remote responses.
//!
//! [`merge`] combines a flattened remote snapshot with the prior declaration.
//! Remote values win wherever the remote side reported one. Where it stayed
//! silent (shared volume ids, secret references, entrypoint contents,
//! registry credentials) the prior value is kept, so a field present in the
//! prior declaration and absent from the response is never lost.
//!
//! Containers are matched by position. When the remote container count
//! differs from the prior count, per-field merging is abandoned and the
//! prior list is kept wholesale. This can hide real drift; it is reported
//! as [`MergeNote::ContainerCountMismatch`].

use tracing::{debug, warn};

use crate::config::{
    ComputeDescriptor, Container, DeploymentSpec, EntrypointOverride, EnvVar, Healthcheck,
    RegistrySettings, ScalingConfig, ScalingPolicy, ScalingTriggers, QueueLoadTrigger,
    VolumeMount, VolumeSource,
};

use super::flatten::{
    FlattenedContainer, FlattenedDeployment, FlattenedEntrypoint, FlattenedEnvKind,
    FlattenedEnvVar, FlattenedHealthcheck, FlattenedScaling, FlattenedVolume,
    FlattenedVolumeSource,
};
use super::types::ComputedAttributes;

/// Probe path assumed when neither side supplies one.
const DEFAULT_PROBE_PATH: &str = "/";

/// Result of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Reconciled declaration.
    pub spec: DeploymentSpec,
    /// Remote-derived attributes from the snapshot.
    pub computed: ComputedAttributes,
    /// Fallbacks taken while merging.
    pub notes: Vec<MergeNote>,
}

/// A fallback the merger took instead of trusting the remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeNote {
    /// Remote container count differs from the prior count; prior list kept.
    ContainerCountMismatch {
        /// Containers in the prior declaration.
        declared: usize,
        /// Containers in the remote response.
        observed: usize,
    },
    /// A volume changed kind remotely; the remote mount replaced the prior one.
    VolumeKindChanged {
        /// Container index.
        container: usize,
        /// Volume index.
        volume: usize,
        /// Prior kind.
        from: &'static str,
        /// Remote kind.
        to: &'static str,
    },
    /// A remote volume lacked its companion field and could not replace the
    /// prior mount; the prior mount was kept.
    IncompleteRemoteVolume {
        /// Container index.
        container: usize,
        /// Volume index.
        volume: usize,
    },
}

impl std::fmt::Display for MergeNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContainerCountMismatch { declared, observed } => write!(
                f,
                "remote reports {observed} container(s) but {declared} are declared; \
                 keeping the declared list, remote drift may be hidden"
            ),
            Self::VolumeKindChanged {
                container,
                volume,
                from,
                to,
            } => write!(
                f,
                "containers[{container}].volumes[{volume}] changed kind remotely ({from} -> {to})"
            ),
            Self::IncompleteRemoteVolume { container, volume } => write!(
                f,
                "containers[{container}].volumes[{volume}] reported without its companion field; keeping prior mount"
            ),
        }
    }
}

/// Merges a flattened remote snapshot with the prior declaration.
#[must_use]
pub fn merge(flat: FlattenedDeployment, prior: &DeploymentSpec) -> MergeOutcome {
    let mut notes = Vec::new();

    let containers = match flat.containers {
        None => prior.containers.clone(),
        Some(remote) if remote.len() != prior.containers.len() => {
            warn!(
                "Deployment {}: remote returned {} container(s), {} declared; keeping declared list",
                prior.name,
                remote.len(),
                prior.containers.len()
            );
            notes.push(MergeNote::ContainerCountMismatch {
                declared: prior.containers.len(),
                observed: remote.len(),
            });
            prior.containers.clone()
        }
        Some(remote) => remote
            .into_iter()
            .zip(&prior.containers)
            .enumerate()
            .map(|(i, (remote, prior))| merge_container(i, remote, prior, &mut notes))
            .collect(),
    };

    let compute = flat.compute.map_or_else(
        || prior.compute.clone(),
        |c| ComputeDescriptor {
            gpu_class: c.gpu_class.unwrap_or_else(|| prior.compute.gpu_class.clone()),
            gpu_count: c.gpu_count.unwrap_or(prior.compute.gpu_count),
        },
    );

    let registry = flat.registry.map_or_else(
        || prior.registry.clone(),
        |r| RegistrySettings {
            private: r.private.unwrap_or(prior.registry.private),
            credential: r.credential.or_else(|| prior.registry.credential.clone()),
        },
    );

    let scaling = flat
        .scaling
        .map_or_else(|| prior.scaling.clone(), |s| merge_scaling(s, &prior.scaling));

    let spec = DeploymentSpec {
        name: flat.name.unwrap_or_else(|| prior.name.clone()),
        compute,
        scaling,
        registry,
        containers,
    };

    debug!("Merged remote snapshot for {} ({} note(s))", spec.name, notes.len());

    MergeOutcome {
        spec,
        computed: flat.computed,
        notes,
    }
}

/// Merges a scaling section; unreported triggers keep their prior value.
#[must_use]
pub fn merge_scaling(remote: FlattenedScaling, prior: &ScalingConfig) -> ScalingConfig {
    ScalingConfig {
        min_replicas: remote.min_replicas.unwrap_or(prior.min_replicas),
        max_replicas: remote.max_replicas.unwrap_or(prior.max_replicas),
        policy: ScalingPolicy {
            delay_secs: remote.delay_secs.unwrap_or(prior.policy.delay_secs),
        },
        triggers: ScalingTriggers {
            queue_load: QueueLoadTrigger {
                threshold: remote
                    .queue_load_threshold
                    .unwrap_or(prior.triggers.queue_load.threshold),
            },
            cpu_utilization: remote.cpu_utilization.or(prior.triggers.cpu_utilization),
            gpu_utilization: remote.gpu_utilization.or(prior.triggers.gpu_utilization),
        },
    }
}

fn merge_container(
    index: usize,
    remote: FlattenedContainer,
    prior: &Container,
    notes: &mut Vec<MergeNote>,
) -> Container {
    Container {
        image: remote.image.unwrap_or_else(|| prior.image.clone()),
        port: remote.port.unwrap_or(prior.port),
        healthcheck: match remote.healthcheck {
            Some(h) => Some(merge_healthcheck(h, prior.healthcheck.as_ref())),
            None => prior.healthcheck.clone(),
        },
        entrypoint: match remote.entrypoint {
            Some(e) => Some(merge_entrypoint(e, prior.entrypoint.as_ref())),
            None => prior.entrypoint.clone(),
        },
        env: match remote.env {
            Some(env) => merge_env(env, &prior.env),
            None => prior.env.clone(),
        },
        volumes: match remote.volumes {
            Some(volumes) => merge_volumes(index, volumes, &prior.volumes, notes),
            None => prior.volumes.clone(),
        },
    }
}

fn merge_healthcheck(remote: FlattenedHealthcheck, prior: Option<&Healthcheck>) -> Healthcheck {
    Healthcheck {
        path: remote
            .path
            .or_else(|| prior.map(|p| p.path.clone()))
            .unwrap_or_else(|| String::from(DEFAULT_PROBE_PATH)),
        port: remote.port.or_else(|| prior.and_then(|p| p.port)),
        initial_delay_secs: remote
            .initial_delay_secs
            .or_else(|| prior.map(|p| p.initial_delay_secs))
            .unwrap_or(0),
        period_secs: remote
            .period_secs
            .or_else(|| prior.map(|p| p.period_secs))
            .unwrap_or(10),
        failure_threshold: remote
            .failure_threshold
            .or_else(|| prior.map(|p| p.failure_threshold))
            .unwrap_or(3),
    }
}

fn merge_entrypoint(
    remote: FlattenedEntrypoint,
    prior: Option<&EntrypointOverride>,
) -> EntrypointOverride {
    EntrypointOverride {
        command: remote
            .command
            .or_else(|| prior.map(|p| p.command.clone()))
            .unwrap_or_default(),
        args: remote
            .args
            .or_else(|| prior.map(|p| p.args.clone()))
            .unwrap_or_default(),
    }
}

/// Env vars are matched by name. Prior order is kept; remote-only entries
/// are appended when they carry enough to be represented.
fn merge_env(remote: Vec<FlattenedEnvVar>, prior: &[EnvVar]) -> Vec<EnvVar> {
    let mut merged: Vec<EnvVar> = prior
        .iter()
        .map(|var| match remote.iter().find(|r| r.name == var.name()) {
            Some(r) => merge_env_var(r, var),
            None => var.clone(),
        })
        .collect();

    for r in &remote {
        if prior.iter().any(|p| p.name() == r.name) {
            continue;
        }
        let var = match (r.kind, &r.value, &r.secret_ref) {
            (Some(FlattenedEnvKind::Secret), _, Some(secret_ref)) | (None, None, Some(secret_ref)) => {
                Some(EnvVar::secret(r.name.clone(), secret_ref.clone()))
            }
            (Some(FlattenedEnvKind::Plain) | None, Some(value), _) => {
                Some(EnvVar::plain(r.name.clone(), value.clone()))
            }
            _ => None,
        };
        match var {
            Some(var) => merged.push(var),
            None => debug!("Skipping remote env var {} without a usable value", r.name),
        }
    }

    merged
}

fn merge_env_var(remote: &FlattenedEnvVar, prior: &EnvVar) -> EnvVar {
    match (remote.kind, prior) {
        (Some(FlattenedEnvKind::Plain), EnvVar::Secret { .. }) => match &remote.value {
            Some(value) => EnvVar::plain(remote.name.clone(), value.clone()),
            None => prior.clone(),
        },
        (Some(FlattenedEnvKind::Secret), EnvVar::Plain { .. }) => match &remote.secret_ref {
            Some(secret_ref) => EnvVar::secret(remote.name.clone(), secret_ref.clone()),
            None => prior.clone(),
        },
        (_, EnvVar::Plain { name, value }) => {
            EnvVar::plain(name.clone(), remote.value.clone().unwrap_or_else(|| value.clone()))
        }
        (_, EnvVar::Secret { name, secret_ref }) => EnvVar::secret(
            name.clone(),
            remote.secret_ref.clone().unwrap_or_else(|| secret_ref.clone()),
        ),
    }
}

fn merge_volumes(
    container: usize,
    remote: Vec<FlattenedVolume>,
    prior: &[VolumeMount],
    notes: &mut Vec<MergeNote>,
) -> Vec<VolumeMount> {
    let len = remote.len().max(prior.len());
    let mut remote = remote.into_iter();
    let mut merged = Vec::with_capacity(len);

    for volume in 0..len {
        match (remote.next(), prior.get(volume)) {
            (Some(r), Some(p)) => merged.push(merge_volume(container, volume, r, p, notes)),
            (Some(r), None) => {
                let mount_path = r.mount_path.clone();
                match (mount_path, complete_source(r.source)) {
                    (Some(mount_path), Some(source)) => merged.push(VolumeMount { mount_path, source }),
                    _ => debug!("Skipping incomplete remote-only volume {container}/{volume}"),
                }
            }
            (None, Some(p)) => merged.push(p.clone()),
            (None, None) => {}
        }
    }

    merged
}

fn merge_volume(
    container: usize,
    volume: usize,
    remote: FlattenedVolume,
    prior: &VolumeMount,
    notes: &mut Vec<MergeNote>,
) -> VolumeMount {
    let mount_path = remote
        .mount_path
        .clone()
        .unwrap_or_else(|| prior.mount_path.clone());

    let source = match (remote.source, &prior.source) {
        (FlattenedVolumeSource::Scratch { size_mb }, VolumeSource::Scratch { size_mb: p }) => {
            VolumeSource::Scratch {
                size_mb: size_mb.or(*p),
            }
        }
        (FlattenedVolumeSource::Memory { size_mb }, VolumeSource::Memory { size_mb: p }) => {
            VolumeSource::Memory {
                size_mb: size_mb.or(*p),
            }
        }
        (FlattenedVolumeSource::Secret { secret_name }, VolumeSource::Secret { secret_name: p }) => {
            VolumeSource::Secret {
                secret_name: secret_name.unwrap_or_else(|| p.clone()),
            }
        }
        (FlattenedVolumeSource::Shared { volume_id }, VolumeSource::Shared { volume_id: p }) => {
            VolumeSource::Shared {
                volume_id: volume_id.unwrap_or_else(|| p.clone()),
            }
        }
        (other, _) => {
            let to = other.kind_name();
            match complete_source(other) {
                Some(source) => {
                    warn!(
                        "containers[{container}].volumes[{volume}] changed kind remotely ({} -> {to})",
                        prior.source.kind_name()
                    );
                    notes.push(MergeNote::VolumeKindChanged {
                        container,
                        volume,
                        from: prior.source.kind_name(),
                        to,
                    });
                    source
                }
                None => {
                    notes.push(MergeNote::IncompleteRemoteVolume { container, volume });
                    return prior.clone();
                }
            }
        }
    };

    VolumeMount { mount_path, source }
}

/// Converts a flattened source into a local one when its companion is known.
fn complete_source(source: FlattenedVolumeSource) -> Option<VolumeSource> {
    match source {
        FlattenedVolumeSource::Scratch { size_mb } => Some(VolumeSource::Scratch { size_mb }),
        FlattenedVolumeSource::Memory { size_mb } => Some(VolumeSource::Memory { size_mb }),
        FlattenedVolumeSource::Secret { secret_name } => secret_name
            .filter(|s| !s.is_empty())
            .map(|secret_name| VolumeSource::Secret { secret_name }),
        FlattenedVolumeSource::Shared { volume_id } => volume_id
            .filter(|s| !s.is_empty())
            .map(|volume_id| VolumeSource::Shared { volume_id }),
    }
}
