//! Cloud calls that device and location commands resolve to.

use crate::device::Device;
use crate::error::Result;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Active mode of a location as reported by the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMode {
    /// Mode id, e.g. `mode1`.
    pub mode: String,
    pub revision: i64,
}

/// Performs commands against the Arlo cloud.
#[async_trait]
pub trait CommandBackend: Send + Sync {
    /// Enable or disable privacy mode for `device`, routed via `base`.
    async fn set_privacy(&self, base: Arc<Device>, device: Arc<Device>, privacy_on: bool)
    -> Result<()>;

    /// Make `mode_id` the active mode of a location.
    ///
    /// `revision` is the last mode revision seen; the returned value is the
    /// revision after the change.
    async fn set_location_mode(&self, location_id: &str, mode_id: &str, revision: i64)
    -> Result<i64>;

    /// Fetch the active mode of a location and its revision.
    async fn location_mode(&self, location_id: &str) -> Result<ActiveMode>;

    /// Fetch the mode list of a location, in either shape
    /// [`Location::parse_modes`](crate::location::Location::parse_modes) accepts.
    async fn location_modes(&self, location_id: &str) -> Result<Value>;
}

/// Backend that only logs what it would have sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBackend;

#[async_trait]
impl CommandBackend for DryRunBackend {
    async fn set_privacy(
        &self,
        base: Arc<Device>,
        device: Arc<Device>,
        privacy_on: bool,
    ) -> Result<()> {
        info!(
            "[DryRun] {} via {}: privacy {}",
            device.name(),
            base.name(),
            if privacy_on { "on" } else { "off" }
        );
        Ok(())
    }

    async fn set_location_mode(
        &self,
        location_id: &str,
        mode_id: &str,
        revision: i64,
    ) -> Result<i64> {
        info!(
            "[DryRun] location {}: mode {} (revision {})",
            location_id, mode_id, revision
        );
        Ok(revision + 1)
    }

    async fn location_mode(&self, location_id: &str) -> Result<ActiveMode> {
        info!("[DryRun] location {}: fetch active mode", location_id);
        Ok(ActiveMode {
            mode: "mode0".to_string(),
            revision: 1,
        })
    }

    async fn location_modes(&self, location_id: &str) -> Result<Value> {
        info!("[DryRun] location {}: fetch modes", location_id);
        Ok(json!([
            {"id": "mode0", "name": "disarmed"},
            {"id": "mode1", "name": "armed"}
        ]))
    }
}
