//! Tracked state handed back to the host orchestrator.
//!
//! A [`DeploymentState`] is the reconciled view of one remote resource: the
//! declaration as recovered by the merger, plus attributes only the remote
//! side knows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeploymentSpec;
use crate::gateway::ResourceId;

use super::lifecycle::Phase;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Reconciled state of one deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentState {
    /// State format version.
    pub version: String,
    /// Remote identity.
    pub id: ResourceId,
    /// Reconciled declaration.
    pub spec: DeploymentSpec,
    /// Remote-derived attributes.
    #[serde(default)]
    pub computed: ComputedAttributes,
    /// Fingerprint of the last applied declaration.
    pub spec_hash: String,
    /// Lifecycle phase.
    pub phase: Phase,
    /// When the state was last synchronized with the remote side.
    pub last_synced: DateTime<Utc>,
}

/// Attributes that only the remote side can supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComputedAttributes {
    /// Remote status string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Hourly price in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_price: Option<f64>,
    /// Replicas currently serving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<u32>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last remote modification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeploymentState {
    /// Creates a state for a freshly identified resource.
    #[must_use]
    pub fn new(id: ResourceId, spec: DeploymentSpec, spec_hash: String) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            id,
            spec,
            computed: ComputedAttributes::default(),
            spec_hash,
            phase: Phase::Creating,
            last_synced: Utc::now(),
        }
    }

    /// Records a successful synchronization.
    pub fn touch(&mut self) {
        self.last_synced = Utc::now();
    }

    /// Deployment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

impl ComputedAttributes {
    /// Overlays `observed` onto `self`: observed values win, gaps keep the
    /// last known value.
    #[must_use]
    pub fn refreshed(&self, observed: Self) -> Self {
        Self {
            status: observed.status.or_else(|| self.status.clone()),
            endpoint_url: observed.endpoint_url.or_else(|| self.endpoint_url.clone()),
            hourly_price: observed.hourly_price.or(self.hourly_price),
            ready_replicas: observed.ready_replicas.or(self.ready_replicas),
            created_at: observed.created_at.or(self.created_at),
            updated_at: observed.updated_at.or(self.updated_at),
        }
    }

    /// Returns true if the remote reports the deployment as serving.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("ready") || s.eq_ignore_ascii_case("running"))
    }
}
