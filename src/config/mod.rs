//! Configuration module for the deployment synchronizer.
//!
//! This module handles all configuration-related functionality:
//! - The declared deployment model and its YAML form
//! - Reconciler settings with environment overrides
//! - Validation of declarations before any remote call
//! - Declaration fingerprints for change detection

mod hash;
mod parser;
mod settings;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use parser::{API_KEY_VAR, ConfigParser};
pub use settings::{
    ApiSettings, DEFAULT_API_URL, LoggingSettings, PollerSettings, ReconcilerSettings,
};
pub use spec::{
    ComputeDescriptor, Container, DEFAULT_QUEUE_LOAD_THRESHOLD, DeploymentSpec,
    EntrypointOverride, EnvVar, Healthcheck, QueueLoadTrigger, RegistrySettings, ResourceKind,
    ScalingConfig, ScalingPolicy, ScalingTriggers, Trigger, TriggerKind, UtilizationTrigger,
    VolumeMount, VolumeSource,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
