//! Device kinds and the per-kind behaviour tables.

use strum::{Display, EnumString};

/// What sort of hardware a device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    Generic,
    Camera,
    BaseStation,
}

/// Attribute-backed features a device may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum Capability {
    MotionDetected,
    AudioDetected,
    BatteryLevel,
    SignalStrength,
    PrivacyActive,
    SirenState,
    ActiveMode,
}

/// Derived device state. Recomputed from attributes on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeviceState {
    #[strum(serialize = "idle")]
    Idle,
    #[strum(serialize = "turned off")]
    TurnedOff,
    #[strum(serialize = "offline, too cold")]
    OfflineTooCold,
}

const CAMERA_CAPABILITIES: &[Capability] = &[
    Capability::MotionDetected,
    Capability::AudioDetected,
    Capability::BatteryLevel,
    Capability::SignalStrength,
    Capability::PrivacyActive,
];

const BASE_STATION_CAPABILITIES: &[Capability] = &[Capability::SirenState, Capability::ActiveMode];

impl DeviceKind {
    /// Classify the cloud's `deviceType` string.
    pub fn from_device_type(device_type: &str) -> Self {
        match device_type.to_ascii_lowercase().as_str() {
            "camera" | "arloq" | "arloqs" | "doorbell" | "videodoorbell" => DeviceKind::Camera,
            "basestation" | "routerm1" => DeviceKind::BaseStation,
            _ => DeviceKind::Generic,
        }
    }

    /// Tag used for this kind's keys in the attribute store.
    pub fn class_tag(&self) -> &'static str {
        match self {
            DeviceKind::Generic => "device",
            DeviceKind::Camera => "camera",
            DeviceKind::BaseStation => "base_station",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            DeviceKind::Generic => &[],
            DeviceKind::Camera => CAMERA_CAPABILITIES,
            DeviceKind::BaseStation => BASE_STATION_CAPABILITIES,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// State of a device of this kind given its power and thermal readings.
    pub fn derive_state(&self, is_on: bool, too_cold: bool) -> DeviceState {
        match self {
            DeviceKind::Generic => DeviceState::Idle,
            DeviceKind::Camera | DeviceKind::BaseStation => {
                if !is_on {
                    DeviceState::TurnedOff
                } else if too_cold {
                    DeviceState::OfflineTooCold
                } else {
                    DeviceState::Idle
                }
            }
        }
    }
}
