//! Index of constructed devices.

use super::{Device, DeviceKind};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Weak index of every device built with the same [`crate::Services`].
///
/// Used to resolve a device's parent base station. Entries for dropped
/// devices are skipped on lookup and pruned on insert.
#[derive(Default)]
pub struct DeviceDirectory {
    devices: RwLock<Vec<Weak<Device>>>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, device: &Arc<Device>) {
        let mut devices = self.devices.write();
        devices.retain(|d| d.strong_count() > 0);
        devices.push(Arc::downgrade(device));
    }

    /// Every live device, in insertion order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|d| d.device_id() == device_id)
    }

    pub fn base_stations(&self) -> Vec<Arc<Device>> {
        self.devices()
            .into_iter()
            .filter(|d| d.kind() == DeviceKind::BaseStation)
            .collect()
    }

    /// The base station with id `device_id`, if one is known.
    pub fn base_station(&self, device_id: &str) -> Option<Arc<Device>> {
        self.base_stations()
            .into_iter()
            .find(|d| d.device_id() == device_id)
    }

    pub fn len(&self) -> usize {
        self.devices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
