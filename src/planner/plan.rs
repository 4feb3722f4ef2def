//! Plan construction.
//!
//! A [`Plan`] says what applying a declaration to the tracked state would
//! do, and what the state is expected to look like afterwards.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{ConfigHasher, DeploymentSpec, ResourceKind};
use crate::state::{ComputedAttributes, DeploymentState};

use super::diff::{DiffEngine, FieldChange};
use super::policy::{Field, Mutability, WireSection, update_sections};

/// A plan for one deployment.
#[derive(Debug, Clone)]
pub struct Plan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Deployment name.
    pub resource_name: String,
    /// Kind of the remote resource.
    pub kind: ResourceKind,
    /// What applying the declaration would do.
    pub action: PlannedAction,
    /// Field-level changes, empty for creates and no-ops.
    pub changes: Vec<FieldChange>,
    /// Fingerprint of the prior declaration.
    pub old_hash: Option<String>,
    /// Fingerprint of the new declaration.
    pub new_hash: String,
    /// Expected state after apply.
    pub planned: PlannedState,
    /// Non-blocking remarks for the orchestrator.
    pub warnings: Vec<String>,
}

/// Action a plan resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// Nothing tracked yet; create.
    Create,
    /// Declaration matches the tracked state.
    NoOp,
    /// Apply in place, sending only these wire sections.
    UpdateInPlace {
        /// Sections carried by the update request.
        sections: Vec<WireSection>,
    },
    /// Destroy and recreate.
    Replace {
        /// Paths of the fields that force replacement.
        fields: Vec<String>,
    },
    /// The resource kind cannot be updated; apply will fail.
    Reject {
        /// Why the update cannot proceed.
        reason: String,
    },
}

/// Expected state after apply. `None` computed values are unknown until the
/// remote side reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedState {
    /// Declared configuration.
    pub spec: DeploymentSpec,
    /// Remote identifier, when it survives the apply.
    pub id: Option<String>,
    /// Computed attributes.
    pub computed: ComputedAttributes,
}

impl Plan {
    /// Builds a plan for applying `declared` over `prior`.
    #[must_use]
    pub fn build(
        prior: Option<&DeploymentState>,
        declared: &DeploymentSpec,
        kind: ResourceKind,
    ) -> Self {
        let hasher = ConfigHasher::new();
        let new_hash = hasher.hash_spec(declared);

        let mut plan = Self {
            created_at: Utc::now(),
            resource_name: declared.name.clone(),
            kind,
            action: PlannedAction::Create,
            changes: Vec::new(),
            old_hash: prior.map(|p| p.spec_hash.clone()),
            new_hash,
            planned: PlannedState {
                spec: declared.clone(),
                id: None,
                computed: ComputedAttributes::default(),
            },
            warnings: Vec::new(),
        };

        let Some(prior) = prior else {
            debug!("Deployment {} is not tracked, planning create", declared.name);
            return plan;
        };

        plan.planned.id = Some(prior.id.id.clone());
        plan.planned.computed = planned_computed(&prior.computed);

        // The recorded hash predates any refresh; fingerprint the tracked spec.
        if ConfigHasher::hashes_match(&hasher.hash_spec(&prior.spec), &plan.new_hash) {
            debug!("Deployment {} is up to date", declared.name);
            plan.action = PlannedAction::NoOp;
            plan.planned.computed = prior.computed.clone();
            return plan;
        }

        let diff = DiffEngine::new().diff(&prior.spec, declared);
        if !diff.has_changes() {
            plan.action = PlannedAction::NoOp;
            plan.planned.computed = prior.computed.clone();
            return plan;
        }

        plan.action = if diff.requires_replace() {
            plan.planned.id = None;
            plan.planned.computed = ComputedAttributes::default();
            PlannedAction::Replace {
                fields: diff.replacing_changes().iter().map(|c| c.path.clone()).collect(),
            }
        } else if kind.supports_update() {
            PlannedAction::UpdateInPlace {
                sections: update_sections(diff.fields()),
            }
        } else {
            let reason = format!("{kind} resources have no update endpoint");
            plan.warnings
                .push(format!("{reason}; applying {} will fail", declared.name));
            PlannedAction::Reject { reason }
        };

        debug!("Deployment {} planned as {}", declared.name, plan.action);
        plan.changes = diff.changes;
        plan
    }

    /// Returns true if applying the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.action == PlannedAction::NoOp
    }

    /// Sections to send on update; empty unless the plan updates in place.
    #[must_use]
    pub fn update_sections(&self) -> &[WireSection] {
        match &self.action {
            PlannedAction::UpdateInPlace { sections } => sections,
            _ => &[],
        }
    }

    /// Returns true if the update carries the scaling section.
    #[must_use]
    pub fn sends_scaling(&self) -> bool {
        self.update_sections().contains(&WireSection::Scaling)
    }
}

/// Projects computed attributes across an in-place change: retained values
/// are carried forward, the rest become unknown.
fn planned_computed(prior: &ComputedAttributes) -> ComputedAttributes {
    let retain = |field: Field| field.mutability() == Mutability::ComputedRetainPrior;

    ComputedAttributes {
        status: prior.status.clone().filter(|_| retain(Field::Status)),
        endpoint_url: prior.endpoint_url.clone().filter(|_| retain(Field::EndpointUrl)),
        hourly_price: prior.hourly_price.filter(|_| retain(Field::HourlyPrice)),
        ready_replicas: prior.ready_replicas.filter(|_| retain(Field::ReadyReplicas)),
        created_at: prior.created_at.filter(|_| retain(Field::CreatedAt)),
        updated_at: prior.updated_at.filter(|_| retain(Field::UpdatedAt)),
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::NoOp => write!(f, "no change"),
            Self::UpdateInPlace { sections } => {
                write!(f, "update in place (")?;
                for (i, section) in sections.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{section}")?;
                }
                write!(f, ")")
            }
            Self::Replace { fields } => write!(f, "replace ({})", fields.join(", ")),
            Self::Reject { reason } => write!(f, "reject ({reason})"),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {}: {}", self.kind, self.resource_name, self.action)?;
        for change in &self.changes {
            writeln!(f, "  ~ {change}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "  ! {warning}")?;
        }
        Ok(())
    }
}
