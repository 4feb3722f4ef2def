//! Remote control-plane gateway.
//!
//! [`RemoteGateway`] is the seam between reconciliation logic and the
//! network. [`HttpGateway`] talks REST; tests substitute the mockall mock or
//! the scripted fake.

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ResourceKind;
use crate::error::{GatewayError, HalldyllError, Result};

pub use client::HttpGateway;
pub use types::{
    ApiResponse, CreateDeploymentRequest, GpuClass, HttpMethod, RemoteCompute, RemoteContainer,
    RemoteDeployment, RemoteEntrypoint, RemoteEnvVar, RemoteHealthcheck, RemoteQueueLoad,
    RemoteRegistry, RemoteScaling, RemoteScalingPolicy, RemoteTriggers, RemoteUtilization,
    RemoteVolume, RemoteVolumeKind, ResourceId, UpdateDeploymentRequest,
};

/// Path of the GPU class catalogue.
pub const GPU_CLASSES_PATH: &str = "gpu-classes";

/// Operations the reconciler needs from the control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Creates a resource and returns its identity with the creation echo.
    async fn create(
        &self,
        kind: ResourceKind,
        request: &CreateDeploymentRequest,
    ) -> Result<(ResourceId, RemoteDeployment)>;

    /// Reads a resource. A missing resource is `GatewayError::NotFound`.
    async fn get(&self, id: &ResourceId) -> Result<RemoteDeployment>;

    /// Updates a resource in place. Kinds without an update endpoint yield
    /// `GatewayError::Unsupported`.
    async fn update(
        &self,
        id: &ResourceId,
        request: &UpdateDeploymentRequest,
    ) -> Result<RemoteDeployment>;

    /// Requests deletion, asking the server to give up after `timeout_hint`.
    async fn delete(&self, id: &ResourceId, timeout_hint: Duration) -> Result<()>;

    /// Generic request against a path relative to the API base URL.
    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse>;
}

/// Checks whether a GPU class is currently offered.
///
/// # Errors
///
/// Returns an error if the catalogue cannot be fetched or decoded.
pub async fn is_gpu_available<G: RemoteGateway + ?Sized>(
    gateway: &G,
    gpu_class: &str,
) -> Result<bool> {
    let response = gateway.execute(HttpMethod::Get, GPU_CLASSES_PATH, None).await?;
    let classes: Vec<GpuClass> = serde_json::from_value(response.body).map_err(|e| {
        HalldyllError::Gateway(GatewayError::InvalidResponse {
            message: format!("Failed to parse GPU classes: {e}"),
        })
    })?;

    let available = classes
        .iter()
        .any(|class| class.id.eq_ignore_ascii_case(gpu_class) && class.available);
    debug!("GPU class {gpu_class} available: {available}");
    Ok(available)
}
