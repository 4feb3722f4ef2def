//! Reconciler for declared deployments.
//!
//! The reconciler is the composition root. It owns no per-resource state:
//! every operation takes the tracked state from the host orchestrator and
//! hands back the new state together with structured diagnostics. Nothing
//! here panics or returns early with a bare error; failures after a remote
//! identity is known still return that identity.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigHasher, ConfigValidator, DeploymentSpec, ReconcilerSettings, ResourceKind};
use crate::error::{Diagnostic, ErrorKind, GatewayError, HalldyllError, ReconcileError, Result};
use crate::gateway::{RemoteGateway, is_gpu_available};
use crate::planner::{Plan, PlannedAction, WireSection, build_create_request, build_update_request};
use crate::poller::{Clock, DeletionPoller, TokioClock};
use crate::scaling;
use crate::state::{DeploymentState, LifecycleEvent, MergeNote, Phase, flatten, merge};

/// Reconciles declared deployments against the control plane.
pub struct Reconciler<G: RemoteGateway + ?Sized, C: Clock = TokioClock> {
    /// Shared gateway.
    gateway: Arc<G>,
    /// Runtime settings.
    settings: ReconcilerSettings,
    /// Declaration validator.
    validator: ConfigValidator,
    /// Configuration hasher.
    hasher: ConfigHasher,
    /// Deletion confirmation.
    poller: DeletionPoller<C>,
}

/// Result of one reconciler operation.
#[derive(Debug, Default, Serialize)]
pub struct OperationResult {
    /// New tracked state. `None` means the resource no longer exists.
    pub state: Option<DeploymentState>,
    /// Warnings and errors encountered.
    pub diagnostics: Vec<Diagnostic>,
}

impl<G: RemoteGateway + ?Sized> Reconciler<G> {
    /// Creates a reconciler on the tokio clock.
    #[must_use]
    pub fn new(gateway: Arc<G>, settings: ReconcilerSettings) -> Self {
        Self::with_clock(gateway, settings, TokioClock)
    }
}

impl<G: RemoteGateway + ?Sized, C: Clock> Reconciler<G, C> {
    /// Creates a reconciler whose poller uses `clock`.
    #[must_use]
    pub fn with_clock(gateway: Arc<G>, settings: ReconcilerSettings, clock: C) -> Self {
        let poller = DeletionPoller::with_clock(&settings.poller, clock);
        Self {
            gateway,
            settings,
            validator: ConfigValidator::new(),
            hasher: ConfigHasher::new(),
            poller,
        }
    }

    /// Replaces the declaration validator.
    #[must_use]
    pub fn with_validator(mut self, validator: ConfigValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Plans applying `declared`. A tracked resource keeps its own kind.
    #[must_use]
    pub fn plan(
        &self,
        prior: Option<&DeploymentState>,
        kind: ResourceKind,
        declared: &DeploymentSpec,
    ) -> Plan {
        let kind = prior.map_or(kind, |p| p.id.kind);
        Plan::build(prior, declared, kind)
    }

    /// Creates a deployment of `kind`.
    pub async fn create(&self, kind: ResourceKind, declared: &DeploymentSpec) -> OperationResult {
        info!("Creating {kind} {}", declared.name);
        let mut result = OperationResult::default();

        if let Err(e) = self.validate(declared, &mut result) {
            return result.failed(None, &e);
        }

        if let Err(e) = self.check_gpu(declared).await {
            return result.failed(None, &e);
        }

        let request = build_create_request(declared);
        let (id, echo) = match self.gateway.create(kind, &request).await {
            Ok(created) => created,
            Err(e) => return result.failed(None, &e),
        };
        info!("Created {id} for {}", declared.name);

        let mut state = DeploymentState::new(id, declared.clone(), self.hasher.hash_spec(declared));
        state.computed = flatten(&echo).computed;
        advance(&mut state, LifecycleEvent::Created);

        match self.refresh(&mut state).await {
            Ok(notes) => result.note(&notes),
            Err(e) => return result.failed(Some(state), &e),
        }

        result.succeeded(state)
    }

    /// Refreshes a tracked deployment from the control plane.
    pub async fn read(&self, prior: &DeploymentState) -> OperationResult {
        debug!("Reading {}", prior.id);
        let mut result = OperationResult::default();
        let mut state = prior.clone();

        match self.refresh(&mut state).await {
            Ok(notes) => {
                result.note(&notes);
                state.phase = state.phase.transition(LifecycleEvent::Refreshed).unwrap_or(Phase::Present);
                result.succeeded(state)
            }
            Err(e) if e.is_not_found() => {
                warn!("Deployment {} no longer exists; dropping it from state", prior.id);
                result.diagnostics.push(
                    Diagnostic::warning(ErrorKind::NotFound, format!("{} no longer exists", prior.id))
                        .with_detail("removed from state"),
                );
                result
            }
            Err(e) => result.failed(Some(prior.clone()), &e),
        }
    }

    /// Applies `declared` over a tracked deployment in place.
    pub async fn update(&self, prior: &DeploymentState, declared: &DeploymentSpec) -> OperationResult {
        info!("Updating {}", prior.id);
        let mut result = OperationResult::default();
        let kind = prior.id.kind;

        if !kind.supports_update() {
            let mut state = prior.clone();
            advance(&mut state, LifecycleEvent::BeginUpdate(kind));
            let e = HalldyllError::from(ReconcileError::UnsupportedOperation {
                kind: kind.to_string(),
            });
            return result.failed(Some(state), &e);
        }

        if let Err(e) = self.validate(declared, &mut result) {
            return result.failed(Some(prior.clone()), &e);
        }

        let plan = Plan::build(Some(prior), declared, kind);
        result.diagnostics.extend(
            plan.warnings
                .iter()
                .map(|w| Diagnostic::warning(ErrorKind::Validation, w.clone())),
        );

        let sections = match &plan.action {
            PlannedAction::NoOp => {
                debug!("{} is up to date", prior.id);
                return result.succeeded(prior.clone());
            }
            PlannedAction::UpdateInPlace { sections } => sections.clone(),
            PlannedAction::Replace { fields } => {
                let e = HalldyllError::from(ReconcileError::RequiresReplace {
                    resource: prior.id.to_string(),
                    fields: fields.clone(),
                });
                return result.failed(Some(prior.clone()), &e);
            }
            PlannedAction::Reject { .. } => {
                let e = HalldyllError::from(ReconcileError::UnsupportedOperation {
                    kind: kind.to_string(),
                });
                return result.failed(Some(prior.clone()), &e);
            }
            PlannedAction::Create => {
                let e = HalldyllError::internal(format!("{} planned as a create", prior.id));
                return result.failed(Some(prior.clone()), &e);
            }
        };

        let mut state = prior.clone();
        advance(&mut state, LifecycleEvent::BeginUpdate(kind));

        let mut request = build_update_request(declared, &sections);
        if sections.contains(&WireSection::Scaling) {
            match scaling::compose_update(&*self.gateway, &prior.id, &declared.scaling).await {
                Ok(scaling) => request.scaling = Some(scaling),
                Err(e) => {
                    advance(&mut state, LifecycleEvent::Failed);
                    return result.failed(Some(state), &e);
                }
            }
        }

        let echo = match self.gateway.update(&prior.id, &request).await {
            Ok(echo) => echo,
            Err(e) => {
                advance(&mut state, LifecycleEvent::Failed);
                return result.failed(Some(state), &e);
            }
        };

        let outcome = merge(flatten(&echo), declared);
        result.note(&outcome.notes);
        state.spec = outcome.spec;
        state.computed = plan.planned.computed.refreshed(outcome.computed);
        state.spec_hash = plan.new_hash;
        state.touch();
        advance(&mut state, LifecycleEvent::Updated);

        info!("Updated {}", prior.id);
        result.succeeded(state)
    }

    /// Deletes a tracked deployment and waits for confirmation.
    pub async fn delete(&self, prior: &DeploymentState, cancel: &CancellationToken) -> OperationResult {
        info!("Deleting {}", prior.id);
        let result = OperationResult::default();
        let mut state = prior.clone();
        advance(&mut state, LifecycleEvent::BeginDelete);

        match self.poller.run(&*self.gateway, &prior.id, cancel).await {
            Ok(report) => {
                info!(
                    "Deleted {} ({} polls, {:?})",
                    prior.id, report.polls, report.elapsed
                );
                result
            }
            Err(e) => {
                advance(&mut state, LifecycleEvent::Failed);
                result.failed(Some(state), &e)
            }
        }
    }

    /// Validates a declaration, recording warnings.
    fn validate(&self, declared: &DeploymentSpec, result: &mut OperationResult) -> Result<()> {
        let validation = self.validator.validate(declared)?;
        result.diagnostics.extend(
            validation
                .warnings
                .into_iter()
                .map(|w| Diagnostic::warning(ErrorKind::Validation, w)),
        );
        Ok(())
    }

    /// Fails if the availability check is on and the GPU class is not offered.
    async fn check_gpu(&self, declared: &DeploymentSpec) -> Result<()> {
        if !self.settings.check_gpu_availability {
            return Ok(());
        }

        let gpu_class = &declared.compute.gpu_class;
        if is_gpu_available(&*self.gateway, gpu_class).await? {
            Ok(())
        } else {
            Err(GatewayError::GpuUnavailable {
                gpu_class: gpu_class.clone(),
            }
            .into())
        }
    }

    /// Reads the remote resource and merges it into `state`.
    async fn refresh(&self, state: &mut DeploymentState) -> Result<Vec<MergeNote>> {
        let remote = self.gateway.get(&state.id).await?;
        let outcome = merge(flatten(&remote), &state.spec);

        state.spec = outcome.spec;
        state.computed = state.computed.refreshed(outcome.computed);
        state.touch();
        Ok(outcome.notes)
    }
}

/// Applies a lifecycle event. A transition the machine rejects leaves the
/// phase unchanged.
fn advance(state: &mut DeploymentState, event: LifecycleEvent) {
    match state.phase.transition(event) {
        Ok(next) => state.phase = next,
        Err(e) => warn!("{}: {e}", state.id),
    }
}

impl OperationResult {
    /// Returns true if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Returns the first error diagnostic.
    #[must_use]
    pub fn error(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_error())
    }

    /// Warnings only.
    #[must_use]
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error()).collect()
    }

    fn note(&mut self, notes: &[MergeNote]) {
        self.diagnostics.extend(
            notes
                .iter()
                .map(|note| Diagnostic::warning(ErrorKind::Client, note.to_string())),
        );
    }

    fn succeeded(mut self, state: DeploymentState) -> Self {
        self.state = Some(state);
        self
    }

    fn failed(mut self, state: Option<DeploymentState>, err: &HalldyllError) -> Self {
        error!("{err}");
        self.state = state;
        self.diagnostics.push(Diagnostic::from(err));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ComputeDescriptor, Container, EntrypointOverride, EnvVar, RegistrySettings, ScalingConfig,
        UtilizationTrigger, VolumeMount,
    };
    use crate::gateway::fake::{FakeGateway, Scripted};
    use crate::gateway::{
        MockRemoteGateway, RemoteCompute, RemoteContainer, RemoteDeployment, RemoteEntrypoint,
        ResourceId,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn container(image: &str) -> Container {
        Container {
            image: image.to_string(),
            port: 8000,
            healthcheck: None,
            entrypoint: None,
            env: vec![EnvVar::secret("HF_TOKEN", "hf/token")],
            volumes: vec![VolumeMount::shared("/models", "vol-123").unwrap()],
        }
    }

    fn declared() -> DeploymentSpec {
        DeploymentSpec {
            name: String::from("svc"),
            compute: ComputeDescriptor {
                gpu_class: String::from("rtx4090"),
                gpu_count: 1,
            },
            scaling: ScalingConfig::default(),
            registry: RegistrySettings::default(),
            containers: vec![container("ghcr.io/acme/infer:1.0")],
        }
    }

    fn remote(containers: usize) -> RemoteDeployment {
        RemoteDeployment {
            id: Some(String::from("dep-1")),
            name: Some(String::from("svc")),
            status: Some(String::from("READY")),
            compute: Some(RemoteCompute {
                gpu_class: Some(String::from("rtx4090")),
                gpu_count: Some(1),
            }),
            containers: Some(
                (0..containers)
                    .map(|_| RemoteContainer {
                        image: Some(String::from("ghcr.io/acme/infer:1.0")),
                        port: Some(8000),
                        entrypoint: Some(RemoteEntrypoint {
                            enabled: Some(false),
                            command: None,
                            args: None,
                        }),
                        ..RemoteContainer::default()
                    })
                    .collect(),
            ),
            endpoint_url: Some(String::from("https://svc.example")),
            ..RemoteDeployment::default()
        }
    }

    fn settings() -> ReconcilerSettings {
        let mut settings = ReconcilerSettings::default();
        settings.poller.interval_secs = 10;
        settings.poller.deadline_secs = 300;
        settings
    }

    fn tracked(spec: DeploymentSpec, kind: ResourceKind) -> DeploymentState {
        let hash = ConfigHasher::new().hash_spec(&spec);
        let mut state = DeploymentState::new(ResourceId::new(kind, "dep-1"), spec, hash);
        state.phase = Phase::Present;
        state
    }

    #[tokio::test]
    async fn test_create_then_read_leaves_entrypoint_absent() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_created("dep-1", RemoteDeployment::default())
                .with_get_default(Scripted::Found(remote(1))),
        );
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings());

        let created = reconciler.create(ResourceKind::Deployment, &declared()).await;
        assert!(!created.has_errors(), "{:?}", created.diagnostics);
        let state = created.state.unwrap();
        assert_eq!(state.id.id, "dep-1");
        assert_eq!(state.phase, Phase::Present);

        let read = reconciler.read(&state).await;
        let state = read.state.unwrap();
        let container = &state.spec.containers[0];
        assert!(container.entrypoint.is_none());
        assert_eq!(container.volumes, declared().containers[0].volumes);
        assert_eq!(container.env, declared().containers[0].env);
        assert_eq!(state.computed.endpoint_url.as_deref(), Some("https://svc.example"));
        assert_eq!(gateway.creates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_after_timeout_confirms_by_polling() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_delete(Scripted::Timeout)
                .with_gets([Scripted::Found(remote(1)), Scripted::Found(remote(1)), Scripted::NotFound]),
        );
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings());
        let prior = tracked(declared(), ResourceKind::Deployment);
        let started = Instant::now();

        let result = reconciler.delete(&prior, &CancellationToken::new()).await;

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert!(result.state.is_none());
        assert_eq!(started.elapsed(), Duration::from_secs(20));
        assert_eq!(gateway.get_count(), 3);
    }

    #[tokio::test]
    async fn test_container_count_mismatch_keeps_prior_list() {
        let mut spec = declared();
        spec.containers.push(container("ghcr.io/acme/sidecar:2.0"));
        let prior = tracked(spec.clone(), ResourceKind::Deployment);
        let gateway = Arc::new(FakeGateway::new().with_get_default(Scripted::Found(remote(1))));
        let reconciler = Reconciler::new(gateway, settings());

        let result = reconciler.read(&prior).await;

        assert!(!result.has_errors());
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.state.unwrap().spec.containers, spec.containers);
    }

    #[tokio::test]
    async fn test_read_not_found_drops_state() {
        let gateway = Arc::new(FakeGateway::new());
        let reconciler = Reconciler::new(gateway, settings());

        let result = reconciler.read(&tracked(declared(), ResourceKind::Deployment)).await;

        assert!(result.state.is_none());
        assert!(!result.has_errors());
        assert_eq!(result.diagnostics[0].kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_read_failure_keeps_prior_state() {
        let gateway = Arc::new(FakeGateway::new().with_get_default(Scripted::Fail(500)));
        let reconciler = Reconciler::new(gateway, settings());
        let prior = tracked(declared(), ResourceKind::Deployment);

        let result = reconciler.read(&prior).await;

        assert_eq!(result.state, Some(prior));
        assert_eq!(result.error().unwrap().kind, ErrorKind::Client);
    }

    #[tokio::test]
    async fn test_invalid_declaration_makes_no_remote_call() {
        let gateway = Arc::new(MockRemoteGateway::new());
        let reconciler = Reconciler::new(gateway, settings());
        let mut spec = declared();
        spec.containers[0].volumes = vec![VolumeMount {
            mount_path: String::from("/models"),
            source: crate::config::VolumeSource::Shared {
                volume_id: String::new(),
            },
        }];

        let result = reconciler.create(ResourceKind::Deployment, &spec).await;

        assert!(result.state.is_none());
        assert_eq!(result.error().unwrap().kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_create_refresh_failure_keeps_identity() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_created("dep-7", RemoteDeployment::default())
                .with_get_default(Scripted::Timeout),
        );
        let reconciler = Reconciler::new(gateway, settings());

        let result = reconciler.create(ResourceKind::Deployment, &declared()).await;

        assert_eq!(result.error().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(result.state.as_ref().unwrap().id.id, "dep-7");
    }

    #[tokio::test]
    async fn test_create_checks_gpu_availability() {
        let gateway = Arc::new(
            FakeGateway::new().with_gpu_classes(json!([{"id": "rtx4090", "available": false}])),
        );
        let mut settings = settings();
        settings.check_gpu_availability = true;
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings);

        let result = reconciler.create(ResourceKind::Deployment, &declared()).await;

        assert!(result.state.is_none());
        assert_eq!(result.error().unwrap().kind, ErrorKind::Client);
        assert_eq!(gateway.calls(), vec![String::from("get gpu-classes")]);
    }

    #[tokio::test]
    async fn test_update_job_is_unsupported() {
        let gateway = Arc::new(MockRemoteGateway::new());
        let reconciler = Reconciler::new(gateway, settings());
        let prior = tracked(declared(), ResourceKind::Job);
        let mut spec = declared();
        spec.containers[0].image = String::from("ghcr.io/acme/infer:1.1");

        let result = reconciler.update(&prior, &spec).await;

        assert_eq!(result.error().unwrap().kind, ErrorKind::UnsupportedOperation);
        assert_eq!(result.state.unwrap().phase, Phase::Rejected);
    }

    #[tokio::test]
    async fn test_update_requiring_replace_is_refused() {
        let gateway = Arc::new(FakeGateway::new());
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings());
        let prior = tracked(declared(), ResourceKind::Deployment);
        let mut spec = declared();
        spec.compute.gpu_class = String::from("a100-80gb");

        let result = reconciler.update(&prior, &spec).await;

        assert!(result.error().unwrap().summary.contains("compute.gpu_class"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_scaling_preserves_remote_trigger() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_scaling(json!({
                    "triggers": {"cpuUtilization": {"enabled": true, "threshold": 80}}
                }))
                .with_update(remote(1)),
        );
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings());
        let prior = tracked(declared(), ResourceKind::Deployment);
        let mut spec = declared();
        spec.scaling.max_replicas = 3;

        let result = reconciler.update(&prior, &spec).await;

        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        let updates = gateway.updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].containers.is_none());
        let scaling = updates[0].scaling.clone().unwrap();
        assert_eq!(scaling.max_replicas, Some(3));
        let cpu = scaling.triggers.unwrap().cpu_utilization.unwrap();
        assert_eq!(cpu.threshold, Some(80));

        let state = result.state.unwrap();
        assert_eq!(state.phase, Phase::Present);
        assert_eq!(state.spec.scaling.max_replicas, 3);
        assert_eq!(state.spec_hash, ConfigHasher::new().hash_spec(&spec));
    }

    #[tokio::test]
    async fn test_update_containers_only() {
        let gateway = Arc::new(FakeGateway::new().with_update(remote(1)));
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings());
        let prior = tracked(declared(), ResourceKind::Deployment);
        let mut spec = declared();
        spec.containers[0].entrypoint = Some(EntrypointOverride {
            command: vec![String::from("python")],
            args: vec![String::from("serve.py")],
        });

        let result = reconciler.update(&prior, &spec).await;

        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(gateway.calls(), vec![String::from("update deployments/dep-1")]);
        assert!(gateway.updates()[0].scaling.is_none());
        assert!(gateway.bodies().is_empty());
        // The echo disables the override; the declaration still carries it.
        let state = result.state.unwrap();
        assert!(state.spec.containers[0].entrypoint.is_some());
    }

    #[tokio::test]
    async fn test_drift_picked_up_by_read_is_corrected() {
        let mut drifted = remote(1);
        if let Some(containers) = drifted.containers.as_mut() {
            containers[0].image = Some(String::from("ghcr.io/acme/infer:9.9"));
        }
        let gateway = Arc::new(
            FakeGateway::new()
                .with_get_default(Scripted::Found(drifted))
                .with_update(remote(1)),
        );
        let reconciler = Reconciler::new(Arc::clone(&gateway), settings());

        let read = reconciler
            .read(&tracked(declared(), ResourceKind::Deployment))
            .await;
        let refreshed = read.state.unwrap();
        assert_eq!(refreshed.spec.containers[0].image, "ghcr.io/acme/infer:9.9");

        let plan = reconciler.plan(Some(&refreshed), ResourceKind::Deployment, &declared());
        assert_eq!(plan.update_sections(), &[WireSection::Containers]);

        let result = reconciler.update(&refreshed, &declared()).await;

        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        let updates = gateway.updates();
        assert_eq!(updates.len(), 1);
        let containers = updates[0].containers.clone().unwrap();
        assert_eq!(containers[0].image.as_deref(), Some("ghcr.io/acme/infer:1.0"));
        assert_eq!(
            result.state.unwrap().spec.containers[0].image,
            "ghcr.io/acme/infer:1.0"
        );
    }

    #[tokio::test]
    async fn test_noop_update_makes_no_call() {
        let gateway = Arc::new(MockRemoteGateway::new());
        let reconciler = Reconciler::new(gateway, settings());
        let prior = tracked(declared(), ResourceKind::Deployment);

        let result = reconciler.update(&prior, &declared()).await;

        assert!(result.diagnostics.is_empty());
        assert_eq!(result.state, Some(prior));
    }

    #[test]
    fn test_plan_uses_tracked_kind() {
        let reconciler = Reconciler::new(Arc::new(MockRemoteGateway::new()), settings());
        let prior = tracked(declared(), ResourceKind::Job);
        let mut spec = declared();
        spec.scaling.triggers.cpu_utilization = Some(UtilizationTrigger {
            enabled: true,
            threshold: 70,
        });

        let plan = reconciler.plan(Some(&prior), ResourceKind::Deployment, &spec);
        assert!(matches!(plan.action, PlannedAction::Reject { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_delete_keeps_state() {
        let gateway = Arc::new(FakeGateway::new().with_get_default(Scripted::Found(remote(1))));
        let reconciler = Reconciler::new(gateway, settings());
        let prior = tracked(declared(), ResourceKind::Deployment);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = reconciler.delete(&prior, &cancel).await;

        assert_eq!(result.error().unwrap().kind, ErrorKind::Cancelled);
        assert_eq!(result.state.unwrap().phase, Phase::Present);
    }
}
