//! Attribute keys reported by the Arlo cloud.

pub const ACTIVITY_STATE_KEY: &str = "activityState";
pub const AIR_QUALITY_KEY: &str = "airQuality";
pub const AUDIO_DETECTED_KEY: &str = "audioDetected";
pub const BATTERY_KEY: &str = "batteryLevel";
pub const BATTERY_TECH_KEY: &str = "batteryTech";
pub const BRIGHTNESS_KEY: &str = "brightness";
pub const CAPTURED_TODAY_KEY: &str = "capturedToday";
pub const CHARGER_KEY: &str = "chargerTech";
pub const CHARGING_KEY: &str = "chargingState";
pub const CONNECTION_KEY: &str = "connectionState";
pub const CONNECTIVITY_KEY: &str = "connectivity";
pub const FLIP_KEY: &str = "flip";
pub const HUMIDITY_KEY: &str = "humidity";
pub const LAMP_STATE_KEY: &str = "lampState";
pub const LAST_CAPTURE_KEY: &str = "lastCapture";
pub const LAST_IMAGE_KEY: &str = "presignedLastImageUrl";
pub const MIRROR_KEY: &str = "mirror";
pub const MOTION_DETECTED_KEY: &str = "motionDetected";
pub const NIGHTLIGHT_KEY: &str = "nightLight";
pub const POWER_SAVE_KEY: &str = "powerSaveMode";
pub const PRIVACY_KEY: &str = "privacyActive";
pub const SIGNAL_STR_KEY: &str = "signalStrength";
pub const SIREN_STATE_KEY: &str = "sirenState";
pub const TEMPERATURE_KEY: &str = "temperature";
pub const TIMEZONE_KEY: &str = "olsonTimeZone";

pub const PARENT_ID_KEY: &str = "parentId";
pub const UNIQUE_ID_KEY: &str = "uniqueId";
pub const XCLOUD_ID_KEY: &str = "xCloudId";

pub const MODE_KEY: &str = "activeMode";
pub const MODE_ID_TO_NAME_KEY: &str = "modeIdToName";
pub const MODE_NAME_TO_ID_KEY: &str = "modeNameToId";
pub const MODE_REVISION_KEY: &str = "modeRevision";

/// Value of `connectionState` when a device has shut itself down from cold.
pub const THERMAL_SHUTDOWN_COLD: &str = "thermalShutdownCold";

/// Placeholder returned for identifiers the cloud has not reported yet.
pub const UNKNOWN: &str = "UNKNOWN";

/// Keys a base station reports for its children in a `devices` listing.
pub const RESOURCE_KEYS: &[&str] = &[
    ACTIVITY_STATE_KEY,
    AIR_QUALITY_KEY,
    AUDIO_DETECTED_KEY,
    BATTERY_KEY,
    BATTERY_TECH_KEY,
    BRIGHTNESS_KEY,
    CAPTURED_TODAY_KEY,
    CHARGER_KEY,
    CHARGING_KEY,
    CONNECTION_KEY,
    CONNECTIVITY_KEY,
    FLIP_KEY,
    HUMIDITY_KEY,
    LAMP_STATE_KEY,
    MIRROR_KEY,
    MOTION_DETECTED_KEY,
    NIGHTLIGHT_KEY,
    POWER_SAVE_KEY,
    PRIVACY_KEY,
    SIGNAL_STR_KEY,
    SIREN_STATE_KEY,
    TEMPERATURE_KEY,
    XCLOUD_ID_KEY,
];

/// Keys a device reports about itself in response to a request.
pub const RESOURCE_UPDATE_KEYS: &[&str] = &[
    LAST_CAPTURE_KEY,
    LAST_IMAGE_KEY,
    PARENT_ID_KEY,
    TIMEZONE_KEY,
];

/// Whether `key` is one the entities persist from resource events.
pub fn is_resource_key(key: &str) -> bool {
    RESOURCE_KEYS.contains(&key) || RESOURCE_UPDATE_KEYS.contains(&key)
}
