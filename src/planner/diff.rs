//! Diff engine for comparing prior and declared deployments.
//!
//! Every detected difference is tagged with the mutability of the field it
//! touches, so the plan can decide between an in-place update and a
//! replacement without re-deriving the policy.

use serde::Serialize;
use tracing::debug;

use crate::config::{Container, DeploymentSpec, EnvVar};

use super::policy::{Field, Mutability};

/// Engine for computing field-level diffs.
#[derive(Debug, Default)]
pub struct DiffEngine;

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Logical field that differs.
    pub field: Field,
    /// Path of the value, with the container index where relevant.
    pub path: String,
    /// Prior value.
    pub old_value: Option<String>,
    /// Declared value.
    pub new_value: Option<String>,
}

/// Complete diff between two declarations.
#[derive(Debug, Default)]
pub struct DiffResult {
    /// All detected changes.
    pub changes: Vec<FieldChange>,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the diff between the prior reconciled declaration and the
    /// newly declared one.
    #[must_use]
    pub fn diff(&self, prior: &DeploymentSpec, declared: &DeploymentSpec) -> DiffResult {
        let mut changes = Vec::new();

        compare(&mut changes, Field::Name, None, &prior.name, &declared.name);
        compare(
            &mut changes,
            Field::GpuClass,
            None,
            &prior.compute.gpu_class,
            &declared.compute.gpu_class,
        );
        compare(
            &mut changes,
            Field::GpuCount,
            None,
            &prior.compute.gpu_count,
            &declared.compute.gpu_count,
        );

        let (old, new) = (&prior.scaling, &declared.scaling);
        compare(&mut changes, Field::MinReplicas, None, &old.min_replicas, &new.min_replicas);
        compare(&mut changes, Field::MaxReplicas, None, &old.max_replicas, &new.max_replicas);
        compare(
            &mut changes,
            Field::ScalingDelay,
            None,
            &old.policy.delay_secs,
            &new.policy.delay_secs,
        );
        compare(
            &mut changes,
            Field::QueueLoadThreshold,
            None,
            &old.triggers.queue_load.threshold,
            &new.triggers.queue_load.threshold,
        );
        compare_declared(
            &mut changes,
            Field::CpuUtilization,
            old.triggers.cpu_utilization.as_ref(),
            new.triggers.cpu_utilization.as_ref(),
        );
        compare_declared(
            &mut changes,
            Field::GpuUtilization,
            old.triggers.gpu_utilization.as_ref(),
            new.triggers.gpu_utilization.as_ref(),
        );

        compare(
            &mut changes,
            Field::RegistryPrivate,
            None,
            &prior.registry.private,
            &declared.registry.private,
        );
        compare(
            &mut changes,
            Field::RegistryCredential,
            None,
            &prior.registry.credential,
            &declared.registry.credential,
        );

        if prior.containers.len() == declared.containers.len() {
            for (index, (old, new)) in prior.containers.iter().zip(&declared.containers).enumerate() {
                Self::diff_container(&mut changes, index, old, new);
            }
        } else {
            compare(
                &mut changes,
                Field::ContainerCount,
                None,
                &prior.containers.len(),
                &declared.containers.len(),
            );
        }

        debug!("Deployment {} has {} changed fields", declared.name, changes.len());
        DiffResult { changes }
    }

    /// Compares two containers at the same position.
    fn diff_container(changes: &mut Vec<FieldChange>, index: usize, old: &Container, new: &Container) {
        let at = Some(index);
        compare(changes, Field::Image, at, &old.image, &new.image);
        compare(changes, Field::Port, at, &old.port, &new.port);
        compare(changes, Field::Healthcheck, at, &old.healthcheck, &new.healthcheck);
        compare(changes, Field::Entrypoint, at, &old.entrypoint, &new.entrypoint);
        compare(changes, Field::Env, at, &sorted_env(&old.env), &sorted_env(&new.env));
        compare(changes, Field::Volumes, at, &old.volumes, &new.volumes);
    }
}

/// Env order carries no meaning; compare by name.
fn sorted_env(env: &[EnvVar]) -> Vec<&EnvVar> {
    let mut sorted: Vec<&EnvVar> = env.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));
    sorted
}

fn compare<T>(changes: &mut Vec<FieldChange>, field: Field, container: Option<usize>, old: &T, new: &T)
where
    T: PartialEq + Serialize + ?Sized,
{
    if old == new {
        return;
    }

    let path = container.map_or_else(
        || field.as_str().to_string(),
        |index| format!("containers[{index}].{field}"),
    );

    changes.push(FieldChange {
        field,
        path,
        old_value: render(old),
        new_value: render(new),
    });
}

/// Compares an optional setting the remote side fills in when undeclared.
/// An absent declaration keeps whatever the remote reports.
fn compare_declared<T>(changes: &mut Vec<FieldChange>, field: Field, old: Option<&T>, new: Option<&T>)
where
    T: PartialEq + Serialize,
{
    if new.is_some() {
        compare(changes, field, None, &old, &new);
    }
}

/// Renders a value for display. `null` renders as absent.
fn render<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) | Err(_) => None,
        Ok(serde_json::Value::String(s)) => Some(s),
        Ok(other) => Some(other.to_string()),
    }
}

impl FieldChange {
    /// Mutability of the changed field.
    #[must_use]
    pub fn mutability(&self) -> Mutability {
        self.field.mutability()
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Returns the total number of changes.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.changes.len()
    }

    /// Changes that force destroy and recreate.
    #[must_use]
    pub fn replacing_changes(&self) -> Vec<&FieldChange> {
        self.changes
            .iter()
            .filter(|c| c.mutability().forces_replace())
            .collect()
    }

    /// Returns true if any change forces replacement.
    #[must_use]
    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.mutability().forces_replace())
    }

    /// Fields changed, deduplicated, in detection order.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = Vec::new();
        for change in &self.changes {
            if !fields.contains(&change.field) {
                fields.push(change.field);
            }
        }
        fields
    }
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.path,
            self.old_value.as_deref().unwrap_or("(none)"),
            self.new_value.as_deref().unwrap_or("(none)")
        )
    }
}

impl std::fmt::Display for DiffResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.changes.is_empty() {
            return write!(f, "no change");
        }
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", change.path)?;
        }
        Ok(())
    }
}
