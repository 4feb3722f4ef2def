//! Deployment lifecycle state machine.
//!
//! ```text
//! Absent -> Creating -> Present -> Updating -> Present
//!                               -> Deleting -> Polling -> Absent
//!                               -> Rejected  (kinds without update)
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ResourceKind;
use crate::error::{ReconcileError, Result};

/// Lifecycle phase of a tracked resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No remote resource.
    #[default]
    Absent,
    /// Create issued, not yet confirmed.
    Creating,
    /// Remote resource exists.
    Present,
    /// In-place update in flight.
    Updating,
    /// Delete issued.
    Deleting,
    /// Waiting for the remote side to confirm deletion.
    Polling,
    /// Update refused for a kind without an update endpoint.
    Rejected,
}

/// Events that move a resource between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Create requested.
    BeginCreate,
    /// Remote resource identified.
    Created,
    /// Update requested for a resource of the given kind.
    BeginUpdate(ResourceKind),
    /// Update applied.
    Updated,
    /// Delete requested.
    BeginDelete,
    /// Delete accepted or timed out; confirmation pending.
    DeleteAccepted,
    /// Remote side reports the resource gone.
    Gone,
    /// A read refreshed the resource.
    Refreshed,
    /// The in-flight operation failed; the resource is assumed unchanged.
    Failed,
}

impl Phase {
    /// Applies an event.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the event is not allowed in this phase.
    pub fn transition(self, event: LifecycleEvent) -> Result<Self> {
        use LifecycleEvent as E;

        let next = match (self, event) {
            (Self::Absent, E::BeginCreate) => Self::Creating,
            (Self::Creating, E::Created) => Self::Present,
            (Self::Creating, E::Failed) | (Self::Polling | Self::Present, E::Gone) => Self::Absent,
            (Self::Present, E::BeginUpdate(kind)) if kind.supports_update() => Self::Updating,
            (Self::Present, E::BeginUpdate(_)) => Self::Rejected,
            (Self::Updating, E::Updated | E::Failed)
            | (Self::Present | Self::Rejected, E::Refreshed)
            | (Self::Deleting | Self::Polling, E::Failed) => Self::Present,
            (Self::Present, E::BeginDelete) => Self::Deleting,
            (Self::Deleting, E::DeleteAccepted) => Self::Polling,
            (Self::Deleting, E::Gone) => Self::Absent,
            _ => {
                return Err(ReconcileError::InvalidTransition {
                    from: self.to_string(),
                    event: format!("{event:?}"),
                }
                .into());
            }
        };

        Ok(next)
    }

    /// Returns true if a remote resource may exist in this phase.
    #[must_use]
    pub const fn may_exist(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Present => "present",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
            Self::Polling => "polling",
            Self::Rejected => "rejected",
        };
        write!(f, "{phase}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HalldyllError;

    #[test]
    fn test_create_update_delete_path() {
        let phase = Phase::Absent
            .transition(LifecycleEvent::BeginCreate)
            .and_then(|p| p.transition(LifecycleEvent::Created))
            .and_then(|p| p.transition(LifecycleEvent::BeginUpdate(ResourceKind::Deployment)))
            .and_then(|p| p.transition(LifecycleEvent::Updated))
            .and_then(|p| p.transition(LifecycleEvent::BeginDelete))
            .and_then(|p| p.transition(LifecycleEvent::DeleteAccepted))
            .and_then(|p| p.transition(LifecycleEvent::Gone))
            .unwrap();

        assert_eq!(phase, Phase::Absent);
    }

    #[test]
    fn test_immutable_kind_is_rejected() {
        let phase = Phase::Present
            .transition(LifecycleEvent::BeginUpdate(ResourceKind::Job))
            .unwrap();
        assert_eq!(phase, Phase::Rejected);
        assert_eq!(
            phase.transition(LifecycleEvent::Refreshed).unwrap(),
            Phase::Present
        );
    }

    #[test]
    fn test_invalid_transition() {
        let err = Phase::Absent
            .transition(LifecycleEvent::BeginDelete)
            .unwrap_err();
        assert!(matches!(
            err,
            HalldyllError::Reconcile(ReconcileError::InvalidTransition { .. })
        ));

        assert!(Phase::Rejected.transition(LifecycleEvent::Updated).is_err());
    }

    #[test]
    fn test_failed_delete_returns_to_present() {
        let phase = Phase::Polling.transition(LifecycleEvent::Failed).unwrap();
        assert_eq!(phase, Phase::Present);
        assert!(phase.may_exist());
    }
}
