//! Field mutability policy.
//!
//! [`FIELD_POLICIES`] is the single table that decides, per field, whether a
//! declared change is applied in place, forces replacement, or is not the
//! caller's to change at all. The diff engine, the plan and the wire request
//! builders all read it.

use crate::config::DeploymentSpec;
use crate::gateway::{CreateDeploymentRequest, RemoteContainer, RemoteScaling, UpdateDeploymentRequest};

/// How a field may change over the lifetime of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Must be supplied; any change forces replacement.
    Required,
    /// Optional; changes are applied in place.
    OptionalInPlace,
    /// Optional; changes force destroy and recreate.
    OptionalRequiresReplace,
    /// Known only after the remote call; carry the last known value forward
    /// while a planned value is unknown.
    ComputedRetainPrior,
    /// Always remote-derived; unknown until observed.
    ComputedOnly,
}

/// Logical fields of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Deployment name.
    Name,
    /// GPU class.
    GpuClass,
    /// GPU count.
    GpuCount,
    /// Minimum replicas.
    MinReplicas,
    /// Maximum replicas.
    MaxReplicas,
    /// Scaling delay.
    ScalingDelay,
    /// Queue load threshold.
    QueueLoadThreshold,
    /// CPU utilization trigger.
    CpuUtilization,
    /// GPU utilization trigger.
    GpuUtilization,
    /// Private registry flag.
    RegistryPrivate,
    /// Registry credential.
    RegistryCredential,
    /// Number of containers.
    ContainerCount,
    /// Container image.
    Image,
    /// Container port.
    Port,
    /// Readiness probe.
    Healthcheck,
    /// Entrypoint override.
    Entrypoint,
    /// Environment variables.
    Env,
    /// Volume mounts.
    Volumes,
    /// Remote identifier.
    Id,
    /// Public endpoint.
    EndpointUrl,
    /// Creation time.
    CreatedAt,
    /// Remote status.
    Status,
    /// Hourly price.
    HourlyPrice,
    /// Ready replicas.
    ReadyReplicas,
    /// Last remote modification.
    UpdatedAt,
}

/// Top-level sections of the wire payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WireSection {
    /// `name`.
    Name,
    /// `compute`.
    Compute,
    /// `scaling`.
    Scaling,
    /// `registry`.
    Registry,
    /// `containers`.
    Containers,
}

/// Mutability of every field.
pub const FIELD_POLICIES: &[(Field, Mutability)] = &[
    (Field::Name, Mutability::Required),
    (Field::GpuClass, Mutability::OptionalRequiresReplace),
    (Field::GpuCount, Mutability::OptionalRequiresReplace),
    (Field::MinReplicas, Mutability::OptionalInPlace),
    (Field::MaxReplicas, Mutability::OptionalInPlace),
    (Field::ScalingDelay, Mutability::OptionalInPlace),
    (Field::QueueLoadThreshold, Mutability::OptionalInPlace),
    (Field::CpuUtilization, Mutability::OptionalInPlace),
    (Field::GpuUtilization, Mutability::OptionalInPlace),
    (Field::RegistryPrivate, Mutability::OptionalRequiresReplace),
    (Field::RegistryCredential, Mutability::OptionalRequiresReplace),
    (Field::ContainerCount, Mutability::OptionalRequiresReplace),
    (Field::Image, Mutability::OptionalInPlace),
    (Field::Port, Mutability::OptionalRequiresReplace),
    (Field::Healthcheck, Mutability::OptionalInPlace),
    (Field::Entrypoint, Mutability::OptionalInPlace),
    (Field::Env, Mutability::OptionalInPlace),
    (Field::Volumes, Mutability::OptionalRequiresReplace),
    (Field::Id, Mutability::ComputedRetainPrior),
    (Field::EndpointUrl, Mutability::ComputedRetainPrior),
    (Field::CreatedAt, Mutability::ComputedRetainPrior),
    (Field::Status, Mutability::ComputedOnly),
    (Field::HourlyPrice, Mutability::ComputedOnly),
    (Field::ReadyReplicas, Mutability::ComputedOnly),
    (Field::UpdatedAt, Mutability::ComputedOnly),
];

impl Mutability {
    /// Returns true if a change to the field forces replacement.
    #[must_use]
    pub const fn forces_replace(self) -> bool {
        matches!(self, Self::Required | Self::OptionalRequiresReplace)
    }

    /// Returns true if the field is only known after a remote call.
    #[must_use]
    pub const fn is_computed(self) -> bool {
        matches!(self, Self::ComputedRetainPrior | Self::ComputedOnly)
    }

    /// Returns true if the field can be updated in place.
    #[must_use]
    pub const fn is_in_place(self) -> bool {
        matches!(self, Self::OptionalInPlace)
    }
}

impl Field {
    /// Looks up the field's mutability in [`FIELD_POLICIES`].
    #[must_use]
    pub fn mutability(self) -> Mutability {
        FIELD_POLICIES
            .iter()
            .find(|(field, _)| *field == self)
            .map_or(Mutability::ComputedOnly, |(_, mutability)| *mutability)
    }

    /// Wire section carrying the field; `None` for computed fields.
    #[must_use]
    pub const fn section(self) -> Option<WireSection> {
        match self {
            Self::Name => Some(WireSection::Name),
            Self::GpuClass | Self::GpuCount => Some(WireSection::Compute),
            Self::MinReplicas
            | Self::MaxReplicas
            | Self::ScalingDelay
            | Self::QueueLoadThreshold
            | Self::CpuUtilization
            | Self::GpuUtilization => Some(WireSection::Scaling),
            Self::RegistryPrivate | Self::RegistryCredential => Some(WireSection::Registry),
            Self::ContainerCount
            | Self::Image
            | Self::Port
            | Self::Healthcheck
            | Self::Entrypoint
            | Self::Env
            | Self::Volumes => Some(WireSection::Containers),
            Self::Id
            | Self::EndpointUrl
            | Self::CreatedAt
            | Self::Status
            | Self::HourlyPrice
            | Self::ReadyReplicas
            | Self::UpdatedAt => None,
        }
    }

    /// Dotted name used in diffs and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::GpuClass => "compute.gpu_class",
            Self::GpuCount => "compute.gpu_count",
            Self::MinReplicas => "scaling.min_replicas",
            Self::MaxReplicas => "scaling.max_replicas",
            Self::ScalingDelay => "scaling.policy.delay_secs",
            Self::QueueLoadThreshold => "scaling.triggers.queue_load",
            Self::CpuUtilization => "scaling.triggers.cpu_utilization",
            Self::GpuUtilization => "scaling.triggers.gpu_utilization",
            Self::RegistryPrivate => "registry.private",
            Self::RegistryCredential => "registry.credential",
            Self::ContainerCount => "containers",
            Self::Image => "image",
            Self::Port => "port",
            Self::Healthcheck => "healthcheck",
            Self::Entrypoint => "entrypoint",
            Self::Env => "env",
            Self::Volumes => "volumes",
            Self::Id => "id",
            Self::EndpointUrl => "endpoint_url",
            Self::CreatedAt => "created_at",
            Self::Status => "status",
            Self::HourlyPrice => "hourly_price",
            Self::ReadyReplicas => "ready_replicas",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for WireSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let section = match self {
            Self::Name => "name",
            Self::Compute => "compute",
            Self::Scaling => "scaling",
            Self::Registry => "registry",
            Self::Containers => "containers",
        };
        f.write_str(section)
    }
}

/// Sections sent on create: every section holding a non-computed field.
#[must_use]
pub fn create_sections() -> Vec<WireSection> {
    sections_where(|mutability| !mutability.is_computed())
}

/// Sections an update may carry: those holding an in-place field.
#[must_use]
pub fn updatable_sections() -> Vec<WireSection> {
    sections_where(Mutability::is_in_place)
}

/// Sections to send for a set of changed fields. Replacement-only and
/// computed fields never put a section on the update wire.
#[must_use]
pub fn update_sections<I>(changed: I) -> Vec<WireSection>
where
    I: IntoIterator<Item = Field>,
{
    let mut sections: Vec<WireSection> = changed
        .into_iter()
        .filter(|field| field.mutability().is_in_place())
        .filter_map(Field::section)
        .collect();
    sections.sort_unstable();
    sections.dedup();
    sections
}

fn sections_where(predicate: impl Fn(Mutability) -> bool) -> Vec<WireSection> {
    let mut sections: Vec<WireSection> = FIELD_POLICIES
        .iter()
        .filter(|(_, mutability)| predicate(*mutability))
        .filter_map(|(field, _)| field.section())
        .collect();
    sections.sort_unstable();
    sections.dedup();
    sections
}

/// Builds the create payload. Every create section is populated.
#[must_use]
pub fn build_create_request(spec: &DeploymentSpec) -> CreateDeploymentRequest {
    CreateDeploymentRequest::from_spec(spec)
}

/// Builds an update payload carrying only `sections`. Sections that cannot
/// be updated in place are ignored.
#[must_use]
pub fn build_update_request(
    spec: &DeploymentSpec,
    sections: &[WireSection],
) -> UpdateDeploymentRequest {
    let updatable = updatable_sections();
    let mut request = UpdateDeploymentRequest::default();

    for section in sections.iter().filter(|s| updatable.contains(s)) {
        match section {
            WireSection::Scaling => request.scaling = Some(RemoteScaling::from(&spec.scaling)),
            WireSection::Containers => {
                request.containers =
                    Some(spec.containers.iter().map(RemoteContainer::from).collect());
            }
            WireSection::Name | WireSection::Compute | WireSection::Registry => {}
        }
    }

    request
}
