//! Physical Arlo devices: cameras, doorbells and base stations.
//!
//! A [`Device`] is an [`Entity`] plus a [`DeviceKind`]. Kind-specific
//! behaviour (capabilities, derived state) comes from the tables in
//! [`kind`], not from per-kind types.

pub mod directory;
pub mod kind;

pub use directory::DeviceDirectory;
pub use kind::{Capability, DeviceKind, DeviceState};

use crate::backend::CommandBackend;
use crate::constant::{
    BATTERY_KEY, CONNECTION_KEY, PARENT_ID_KEY, PRIVACY_KEY, SIGNAL_STR_KEY,
    THERMAL_SHUTDOWN_COLD, TIMEZONE_KEY, UNIQUE_ID_KEY, UNKNOWN, XCLOUD_ID_KEY,
};
use crate::entity::{Entity, SubscriptionId};
use crate::error::{ArloError, Result};
use crate::events::EventListener;
use crate::services::Services;
use crate::tasks::TaskRunner;
use log::{debug, info};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_BATTERY_LEVEL: i64 = 100;
pub const DEFAULT_SIGNAL_STRENGTH: i64 = 3;

pub struct Device {
    entity: Entity,
    kind: DeviceKind,
    device_id: String,
    device_type: Option<String>,
    unique_id: Option<String>,
    runner: Arc<dyn TaskRunner>,
    backend: Arc<dyn CommandBackend>,
    directory: Arc<DeviceDirectory>,
}

impl Device {
    /// Build a device named after the snapshot's `deviceName`, falling back
    /// to its `deviceId`.
    pub fn from_snapshot(attrs: Value, services: &Services) -> Result<Arc<Self>> {
        let name = attrs
            .get("deviceName")
            .or_else(|| attrs.get("deviceId"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::new(name, attrs, services)
    }

    /// Build a device and register it for events and parent lookups.
    pub fn new(name: impl Into<String>, attrs: Value, services: &Services) -> Result<Arc<Self>> {
        let device_id = attrs
            .get("deviceId")
            .and_then(Value::as_str)
            .ok_or(ArloError::MissingField("deviceId"))?
            .to_string();
        let device_type = attrs
            .get("deviceType")
            .and_then(Value::as_str)
            .map(str::to_string);
        let unique_id = attrs
            .get(UNIQUE_ID_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);
        let kind = device_type
            .as_deref()
            .map(DeviceKind::from_device_type)
            .unwrap_or(DeviceKind::Generic);

        let entity = Entity::new(
            name,
            device_id.clone(),
            kind.class_tag(),
            attrs,
            services.store.clone(),
            services.filter,
        );

        let device = Arc::new(Self {
            entity,
            kind,
            device_id,
            device_type,
            unique_id,
            runner: services.runner.clone(),
            backend: services.backend.clone(),
            directory: services.directory.clone(),
        });

        let listener: Arc<dyn EventListener> = device.clone();
        services
            .events
            .add_listener(&device.device_id, Arc::downgrade(&listener));
        services.directory.insert(&device);

        info!("Added {} {:?}", device.kind, device.entity);
        Ok(device)
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn resource_id(&self) -> &str {
        &self.device_id
    }

    pub fn serial_number(&self) -> &str {
        &self.device_id
    }

    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.entity.model_id()
    }

    pub fn hw_version(&self) -> Option<&str> {
        self.entity.snapshot_property_str("hwVersion")
    }

    pub fn timezone(&self) -> Option<&str> {
        self.entity.snapshot_property_str(TIMEZONE_KEY)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.entity.snapshot_str("userId")
    }

    pub fn user_role(&self) -> Option<&str> {
        self.entity.snapshot_str("userRole")
    }

    /// Identifier the web client uses for this device's owner.
    pub fn web_id(&self) -> Option<String> {
        self.user_id().map(|user| format!("{}_web", user))
    }

    pub fn xcloud_id(&self) -> String {
        self.string_attribute(XCLOUD_ID_KEY)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn parent_id(&self) -> String {
        self.string_attribute(PARENT_ID_KEY)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// The base station this device talks through.
    ///
    /// Devices without a known parent (base stations themselves, and
    /// cameras that connect straight to the cloud) are their own.
    pub fn base_station(self: &Arc<Self>) -> Arc<Device> {
        self.directory
            .base_station(&self.parent_id())
            .unwrap_or_else(|| self.clone())
    }

    pub fn attribute(&self, attr: &str, default: Value) -> Value {
        self.entity.attribute(attr, default)
    }

    pub fn add_attr_callback<F>(&self, attr: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&Entity, &str, &Value) + Send + Sync + 'static,
    {
        self.entity.add_attr_callback(attr, callback)
    }

    pub fn remove_attr_callback(&self, id: SubscriptionId) -> bool {
        self.entity.remove_attr_callback(id)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.kind.has_capability(capability)
    }

    /// Capability check by attribute name; unknown names are unsupported.
    pub fn has_capability_named(&self, name: &str) -> bool {
        Capability::from_str(name)
            .map(|cap| self.has_capability(cap))
            .unwrap_or(false)
    }

    pub fn battery_level(&self) -> i64 {
        self.int_attribute(BATTERY_KEY)
            .unwrap_or(DEFAULT_BATTERY_LEVEL)
    }

    pub fn signal_strength(&self) -> i64 {
        self.int_attribute(SIGNAL_STR_KEY)
            .unwrap_or(DEFAULT_SIGNAL_STRENGTH)
    }

    pub fn too_cold(&self) -> bool {
        self.string_attribute(CONNECTION_KEY).as_deref() == Some(THERMAL_SHUTDOWN_COLD)
    }

    /// On unless privacy mode is active.
    pub fn is_on(&self) -> bool {
        matches!(
            self.entity.attribute_opt(PRIVACY_KEY),
            None | Some(Value::Bool(false))
        )
    }

    pub fn state(&self) -> DeviceState {
        self.kind.derive_state(self.is_on(), self.too_cold())
    }

    /// Ask the cloud to leave privacy mode. The outcome arrives later as a
    /// `privacyActive` change.
    pub fn turn_on(self: &Arc<Self>) {
        self.request_privacy(false);
    }

    /// Ask the cloud to enter privacy mode. The outcome arrives later as a
    /// `privacyActive` change.
    pub fn turn_off(self: &Arc<Self>) {
        self.request_privacy(true);
    }

    fn request_privacy(self: &Arc<Self>, privacy_on: bool) {
        let base = self.base_station();
        let device = self.clone();
        let backend = self.backend.clone();
        info!(
            "{}: turning {} via {}",
            self.name(),
            if privacy_on { "off" } else { "on" },
            base.name()
        );
        self.runner.run(
            if privacy_on { "turn_off" } else { "turn_on" },
            Box::pin(async move { backend.set_privacy(base, device, privacy_on).await }),
        );
    }

    fn string_attribute(&self, attr: &str) -> Option<String> {
        self.entity
            .attribute_opt(attr)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Integer attribute; whole floats and numeric strings are accepted.
    fn int_attribute(&self, attr: &str) -> Option<i64> {
        let value = self.entity.attribute_opt(attr)?;
        let parsed = match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        };
        if parsed.is_none() {
            debug!("{}: ignoring non-numeric {} = {}", self.name(), attr, value);
        }
        parsed
    }
}

impl EventListener for Device {
    fn on_event(&self, resource: &str, event: &Value) {
        self.entity.handle_event(resource, event);
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}:{}:{}>",
            self.kind,
            self.device_type.as_deref().unwrap_or("-"),
            self.name()
        )
    }
}
