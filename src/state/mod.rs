//! Reconciled deployment state.
//!
//! This module turns remote snapshots into tracked state:
//! - [`flatten`] projects a response into the local shape
//! - [`merge`] recovers fields the remote side is silent about
//! - [`Phase`] tracks where a resource is in its lifecycle

mod flatten;
mod lifecycle;
mod merge;
mod types;

pub use flatten::{
    FlattenedCompute, FlattenedContainer, FlattenedDeployment, FlattenedEntrypoint,
    FlattenedEnvKind, FlattenedEnvVar, FlattenedHealthcheck, FlattenedRegistry, FlattenedScaling,
    FlattenedVolume, FlattenedVolumeSource, flatten, flatten_scaling,
};
pub use lifecycle::{LifecycleEvent, Phase};
pub use merge::{MergeNote, MergeOutcome, merge, merge_scaling};
pub use types::{ComputedAttributes, DeploymentState, STATE_VERSION};
