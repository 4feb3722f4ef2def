//! Scaling trigger updates.
//!
//! The control plane replaces the whole trigger set on update, so a trigger
//! the declaration does not mention would be switched off by omission. The
//! outgoing scaling section is therefore built read-modify-write: the
//! current remote triggers are fetched first and every utilization trigger
//! the declaration leaves unmentioned is copied forward unchanged.

use tracing::debug;

use crate::config::{ScalingConfig, TriggerKind};
use crate::error::{GatewayError, HalldyllError, Result};
use crate::gateway::{HttpMethod, RemoteGateway, RemoteScaling, RemoteTriggers, ResourceId};

/// Path of a resource's scaling sub-resource.
#[must_use]
pub fn scaling_path(id: &ResourceId) -> String {
    format!("{}/scaling", id.path())
}

/// Fetches the scaling configuration currently applied remotely.
///
/// # Errors
///
/// Returns an error if the request fails or the body cannot be decoded.
pub async fn fetch_current<G: RemoteGateway + ?Sized>(
    gateway: &G,
    id: &ResourceId,
) -> Result<RemoteScaling> {
    let response = gateway.execute(HttpMethod::Get, &scaling_path(id), None).await?;
    if response.body.is_null() {
        return Ok(RemoteScaling::default());
    }

    serde_json::from_value(response.body).map_err(|e| {
        HalldyllError::Gateway(GatewayError::InvalidResponse {
            message: format!("Failed to parse scaling for {id}: {e}"),
        })
    })
}

/// Builds the outgoing scaling section from the declaration, preserving
/// utilization triggers the declaration does not mention.
#[must_use]
pub fn read_modify_write(current: &RemoteScaling, declared: &ScalingConfig) -> RemoteScaling {
    let mut outgoing = RemoteScaling::from(declared);
    let current = current.triggers.unwrap_or_default();
    let triggers = outgoing.triggers.get_or_insert_with(RemoteTriggers::default);

    for kind in TriggerKind::UTILIZATION {
        if declared.triggers.mentions(kind) {
            continue;
        }
        let (slot, kept) = match kind {
            TriggerKind::CpuUtilization => (&mut triggers.cpu_utilization, current.cpu_utilization),
            TriggerKind::GpuUtilization => (&mut triggers.gpu_utilization, current.gpu_utilization),
            TriggerKind::QueueLoad => continue,
        };
        if kept.is_some() {
            debug!("Preserving unmentioned {} trigger", kind.as_str());
        }
        *slot = kept;
    }

    outgoing
}

/// Fetches the current scaling and composes the outgoing section.
///
/// # Errors
///
/// Returns an error if the current scaling cannot be fetched.
pub async fn compose_update<G: RemoteGateway + ?Sized>(
    gateway: &G,
    id: &ResourceId,
    declared: &ScalingConfig,
) -> Result<RemoteScaling> {
    let current = fetch_current(gateway, id).await?;
    Ok(read_modify_write(&current, declared))
}
