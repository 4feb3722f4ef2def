//! Declaration fingerprints for change detection.
//!
//! The planner compares the fingerprint of a new declaration with the one
//! recorded at the last apply and skips diffing when they match. Containers
//! and volumes hash in positional order; environment variables hash sorted
//! by name since they are matched by name.

use sha2::{Digest, Sha256};

use super::spec::{
    Container, DeploymentSpec, EnvVar, ScalingConfig, UtilizationTrigger, VolumeSource,
};

/// Hasher for computing declaration fingerprints.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a whole declaration.
    #[must_use]
    pub fn hash_spec(&self, spec: &DeploymentSpec) -> String {
        let mut hasher = Sha256::new();

        feed(&mut hasher, spec.name.as_bytes());
        feed(&mut hasher, spec.compute.gpu_class.as_bytes());
        hasher.update(spec.compute.gpu_count.to_be_bytes());

        hash_scaling(&mut hasher, &spec.scaling);

        hasher.update([u8::from(spec.registry.private)]);
        feed_opt(&mut hasher, spec.registry.credential.as_deref());

        hasher.update((spec.containers.len() as u64).to_be_bytes());
        for container in &spec.containers {
            hasher.update(self.hash_container(container).as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes the fingerprint of a single container.
    #[must_use]
    pub fn hash_container(&self, container: &Container) -> String {
        let mut hasher = Sha256::new();

        feed(&mut hasher, container.image.as_bytes());
        hasher.update(container.port.to_be_bytes());

        match &container.healthcheck {
            Some(h) => {
                hasher.update([1u8]);
                feed(&mut hasher, h.path.as_bytes());
                hasher.update(h.port.unwrap_or(0).to_be_bytes());
                hasher.update(h.initial_delay_secs.to_be_bytes());
                hasher.update(h.period_secs.to_be_bytes());
                hasher.update(h.failure_threshold.to_be_bytes());
            }
            None => hasher.update([0u8]),
        }

        match &container.entrypoint {
            Some(e) => {
                hasher.update([1u8]);
                hasher.update((e.command.len() as u64).to_be_bytes());
                for part in e.command.iter().chain(&e.args) {
                    feed(&mut hasher, part.as_bytes());
                }
            }
            None => hasher.update([0u8]),
        }

        let mut env: Vec<_> = container.env.iter().collect();
        env.sort_by(|a, b| a.name().cmp(b.name()));
        for var in env {
            match var {
                EnvVar::Plain { name, value } => {
                    hasher.update([0u8]);
                    feed(&mut hasher, name.as_bytes());
                    feed(&mut hasher, value.as_bytes());
                }
                EnvVar::Secret { name, secret_ref } => {
                    hasher.update([1u8]);
                    feed(&mut hasher, name.as_bytes());
                    feed(&mut hasher, secret_ref.as_bytes());
                }
            }
        }

        for volume in &container.volumes {
            feed(&mut hasher, volume.mount_path.as_bytes());
            feed(&mut hasher, volume.source.kind_name().as_bytes());
            match &volume.source {
                VolumeSource::Scratch { size_mb } | VolumeSource::Memory { size_mb } => {
                    hasher.update(size_mb.unwrap_or(0).to_be_bytes());
                }
                VolumeSource::Secret { secret_name } => feed(&mut hasher, secret_name.as_bytes()),
                VolumeSource::Shared { volume_id } => feed(&mut hasher, volume_id.as_bytes()),
            }
        }

        hex::encode(hasher.finalize())
    }

    /// Returns a short form of the hash (first 12 characters).
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(12).collect()
    }

    /// Compares two hashes.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        hash1 == hash2
    }
}

fn hash_scaling(hasher: &mut Sha256, scaling: &ScalingConfig) {
    hasher.update(scaling.min_replicas.to_be_bytes());
    hasher.update(scaling.max_replicas.to_be_bytes());
    hasher.update(scaling.policy.delay_secs.to_be_bytes());
    hasher.update(scaling.triggers.queue_load.threshold.to_be_bytes());
    hash_utilization(hasher, scaling.triggers.cpu_utilization);
    hash_utilization(hasher, scaling.triggers.gpu_utilization);
}

fn hash_utilization(hasher: &mut Sha256, trigger: Option<UtilizationTrigger>) {
    match trigger {
        Some(t) => hasher.update([1u8, u8::from(t.enabled), t.threshold]),
        None => hasher.update([0u8]),
    }
}

/// Length-prefixed update so adjacent fields cannot run together.
fn feed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn feed_opt(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            feed(hasher, v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComputeDescriptor, RegistrySettings, VolumeMount};

    fn create_test_spec(name: &str) -> DeploymentSpec {
        DeploymentSpec {
            name: name.to_string(),
            compute: ComputeDescriptor {
                gpu_class: String::from("a100-80gb"),
                gpu_count: 1,
            },
            scaling: ScalingConfig::default(),
            registry: RegistrySettings::default(),
            containers: vec![Container {
                image: String::from("img:1"),
                port: 8000,
                healthcheck: None,
                entrypoint: None,
                env: vec![EnvVar::plain("A", "1"), EnvVar::secret("B", "s/b")],
                volumes: vec![VolumeMount::scratch("/scratch", None)],
            }],
        }
    }

    #[test]
    fn test_spec_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let spec = create_test_spec("svc");

        assert_eq!(hasher.hash_spec(&spec), hasher.hash_spec(&spec));
        assert_eq!(hasher.hash_spec(&spec).len(), 64);
    }

    #[test]
    fn test_env_order_does_not_matter() {
        let hasher = ConfigHasher::new();
        let spec = create_test_spec("svc");
        let mut reordered = spec.clone();
        reordered.containers[0].env.reverse();

        assert_eq!(hasher.hash_spec(&spec), hasher.hash_spec(&reordered));
    }

    #[test]
    fn test_changes_change_hash() {
        let hasher = ConfigHasher::new();
        let spec = create_test_spec("svc");

        let mut image = spec.clone();
        image.containers[0].image = String::from("img:2");
        assert_ne!(hasher.hash_spec(&spec), hasher.hash_spec(&image));

        let mut volume = spec.clone();
        volume.containers[0].volumes[0] = VolumeMount::memory("/scratch", None);
        assert_ne!(hasher.hash_spec(&spec), hasher.hash_spec(&volume));

        assert_ne!(
            hasher.hash_spec(&spec),
            hasher.hash_spec(&create_test_spec("svc2"))
        );
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let hash = hasher.hash_spec(&create_test_spec("svc"));
        assert_eq!(hasher.short_hash(&hash).len(), 12);
    }

    #[test]
    fn test_hashes_match() {
        assert!(ConfigHasher::hashes_match("abc", "abc"));
        assert!(!ConfigHasher::hashes_match("abc", "abd"));
    }
}
