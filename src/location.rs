//! Arlo locations and their security modes.
//!
//! A location groups the devices of one site. Its only live state is the
//! active mode, plus two lookup tables kept in the store:
//! `modeIdToName/<id>` and `modeNameToId/<lowercase name>`.
//!
//! The cloud sends bursts of `states` events around a mode change without
//! saying what changed, so those trigger a re-fetch of the mode list and the
//! active mode, at most once per [`MODE_UPDATE_INTERVAL`].

use crate::backend::CommandBackend;
use crate::constant::{MODE_ID_TO_NAME_KEY, MODE_KEY, MODE_NAME_TO_ID_KEY, MODE_REVISION_KEY};
use crate::entity::{Entity, SubscriptionId};
use crate::error::{ArloError, Result};
use crate::events::EventListener;
use crate::services::Services;
use crate::tasks::TaskRunner;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

pub const LOCATION_CLASS: &str = "location";

/// Modes every location has before the cloud reports its own list.
pub const DEFAULT_MODES: &[(&str, &str)] = &[("disarmed", "mode0"), ("armed", "mode1")];

/// Minimum time between two `states`-triggered mode refreshes.
pub const MODE_UPDATE_INTERVAL: Duration = Duration::from_secs(2);

const UNKNOWN_MODE: &str = "unknown";
const INITIAL_REVISION: i64 = 1;

pub struct Location {
    entity: Entity,
    location_id: String,
    gateway_device_ids: Vec<String>,
    runner: Arc<dyn TaskRunner>,
    backend: Arc<dyn CommandBackend>,
    last_update: Mutex<Option<Instant>>,
    this: Weak<Location>,
}

impl Location {
    pub fn new(attrs: Value, services: &Services) -> Result<Arc<Self>> {
        let location_id = attrs
            .get("locationId")
            .and_then(Value::as_str)
            .ok_or(ArloError::MissingField("locationId"))?
            .to_string();
        let name = attrs
            .get("locationName")
            .and_then(Value::as_str)
            .unwrap_or(&location_id)
            .to_string();
        let gateway_device_ids = attrs
            .get("gatewayDeviceIds")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let entity = Entity::new(
            name,
            location_id.clone(),
            LOCATION_CLASS,
            attrs,
            services.store.clone(),
            services.filter,
        );
        let location = Arc::new_cyclic(|this| Self {
            entity,
            location_id,
            gateway_device_ids,
            runner: services.runner.clone(),
            backend: services.backend.clone(),
            last_update: Mutex::new(None),
            this: this.clone(),
        });

        let listener: Arc<dyn EventListener> = location.clone();
        services
            .events
            .add_listener(&location.location_id, Arc::downgrade(&listener));

        info!("Added location {:?}", location.entity);
        Ok(location)
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn gateway_device_ids(&self) -> &[String] {
        &self.gateway_device_ids
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

    /// Name of the active mode, or `"unknown"` before the first report.
    pub fn mode(&self) -> String {
        self.entity
            .load(MODE_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_MODE.to_string())
    }

    /// Mode names mapped to their cloud ids.
    pub fn available_modes_with_ids(&self) -> BTreeMap<String, String> {
        let modes: BTreeMap<String, String> = self
            .entity
            .load_matching(&[MODE_NAME_TO_ID_KEY, crate::store::WILDCARD])
            .into_iter()
            .filter_map(|(key, id)| Some((key.last()?.to_string(), id.as_str()?.to_string())))
            .collect();
        if modes.is_empty() {
            return default_modes();
        }
        modes
    }

    pub fn available_modes(&self) -> Vec<String> {
        self.available_modes_with_ids().into_keys().collect()
    }

    /// Change the active mode, by name or by id.
    ///
    /// Returns once the request is queued; the new mode is stored and
    /// reported when the cloud accepts it.
    pub fn set_mode(self: &Arc<Self>, mode: &str) -> Result<()> {
        let (mode_name, mode_id) = match self.id_to_name(mode) {
            Some(name) => {
                debug!("{}: passed an id ({}), converting it", self.name(), mode);
                (name, Some(mode.to_string()))
            }
            None => (mode.to_string(), None),
        };

        let current = self.mode();
        if current == mode_name {
            debug!("{}: no mode change needed", self.name());
            return Ok(());
        }

        let Some(mode_id) = mode_id.or_else(|| self.name_to_id(&mode_name)) else {
            warn!("{}: mode {} is unrecognised", self.location_id, mode_name);
            return Err(ArloError::UnknownMode {
                location_id: self.location_id.clone(),
                mode: mode_name,
            });
        };
        if current == mode_id {
            debug!("{}: no mode change needed (id)", self.name());
            return Ok(());
        }

        let revision = self
            .entity
            .load(MODE_REVISION_KEY)
            .and_then(|v| v.as_i64())
            .unwrap_or(INITIAL_REVISION);
        info!(
            "{}: new mode {} (id {}, revision {})",
            self.location_id, mode_name, mode_id, revision
        );

        let location = self.clone();
        let backend = self.backend.clone();
        self.runner.run(
            "set_mode",
            Box::pin(async move {
                let new_revision = backend
                    .set_location_mode(&location.location_id, &mode_id, revision)
                    .await?;
                location
                    .entity
                    .save_and_do_callbacks(MODE_KEY, json!(mode_name));
                location.entity.save(MODE_REVISION_KEY, json!(new_revision));
                Ok::<(), ArloError>(())
            }),
        );
        Ok(())
    }

    /// Re-fetch the active mode and its revision in the background.
    pub fn update_mode(self: &Arc<Self>) {
        let location = self.clone();
        self.runner
            .run("update_mode", Box::pin(async move { location.fetch_mode().await }));
    }

    /// Re-fetch the mode list in the background.
    pub fn update_modes(self: &Arc<Self>) {
        let location = self.clone();
        self.runner
            .run("update_modes", Box::pin(async move { location.fetch_modes().await }));
    }

    async fn fetch_mode(&self) -> Result<()> {
        let active = self.backend.location_mode(&self.location_id).await?;
        debug!(
            "{}: active mode {} (revision {})",
            self.name(),
            active.mode,
            active.revision
        );
        let name = self.id_to_name(&active.mode).unwrap_or(active.mode);
        self.entity.save_and_do_callbacks(MODE_KEY, json!(name));
        self.entity.save(MODE_REVISION_KEY, json!(active.revision));
        Ok(())
    }

    async fn fetch_modes(&self) -> Result<()> {
        let modes = self.backend.location_modes(&self.location_id).await?;
        self.parse_modes(&modes);
        Ok(())
    }

    /// Claim the next refresh slot; `false` if one ran within the interval.
    fn refresh_due(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last_update.lock();
        if last.is_some_and(|at| now < at + MODE_UPDATE_INTERVAL) {
            return false;
        }
        *last = Some(now);
        true
    }

    fn handle_states_event(&self) {
        if !self.refresh_due() {
            debug!("{}: skipping a mode refresh", self.name());
            return;
        }
        let Some(location) = self.this.upgrade() else {
            return;
        };
        debug!("{}: state change, refreshing modes", self.name());
        self.runner.run(
            "refresh_mode",
            Box::pin(async move {
                location.fetch_modes().await?;
                location.fetch_mode().await
            }),
        );
    }

    /// Store the id/name tables for a reported mode list.
    ///
    /// Accepts `{"mode1": {"name": "armed"}, ...}` or
    /// `[{"id": "mode1", "name": "armed"}, ...]`.
    pub fn parse_modes(&self, modes: &Value) {
        let entries: Vec<(&str, &str)> = match modes {
            Value::Object(map) => map
                .iter()
                .filter_map(|(id, mode)| Some((id.as_str(), mode.get("name")?.as_str()?)))
                .collect(),
            Value::Array(list) => list
                .iter()
                .filter_map(|mode| Some((mode.get("id")?.as_str()?, mode.get("name")?.as_str()?)))
                .collect(),
            _ => Vec::new(),
        };

        for (mode_id, mode_name) in entries {
            if mode_id.is_empty() || mode_name.is_empty() {
                continue;
            }
            debug!("{}: {} <=M=> {}", self.name(), mode_id, mode_name);
            self.entity
                .save_key(&[MODE_ID_TO_NAME_KEY, mode_id], json!(mode_name));
            self.entity.save_key(
                &[MODE_NAME_TO_ID_KEY, mode_name.to_lowercase().as_str()],
                json!(mode_id),
            );
        }
    }

    fn handle_modes_event(&self, event: &Value) {
        let Some(props) = event.get("properties") else {
            return;
        };
        if let Some(modes) = props.get("modes") {
            self.parse_modes(modes);
        }

        let active = props
            .get("activeMode")
            .or_else(|| props.get("active"))
            .and_then(Value::as_str);
        if let Some(mode_id) = active {
            debug!("{}: mode change {}", self.name(), mode_id);
            let name = self
                .id_to_name(mode_id)
                .unwrap_or_else(|| mode_id.to_string());
            self.entity.save_and_do_callbacks(MODE_KEY, json!(name));
        }
    }

    fn id_to_name(&self, mode_id: &str) -> Option<String> {
        self.entity
            .load_key(&[MODE_ID_TO_NAME_KEY, mode_id])
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| {
                DEFAULT_MODES
                    .iter()
                    .find(|(_, id)| *id == mode_id)
                    .map(|(name, _)| name.to_string())
            })
    }

    fn name_to_id(&self, mode_name: &str) -> Option<String> {
        let lower = mode_name.to_lowercase();
        self.entity
            .load_key(&[MODE_NAME_TO_ID_KEY, lower.as_str()])
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| {
                DEFAULT_MODES
                    .iter()
                    .find(|(name, _)| *name == lower)
                    .map(|(_, id)| id.to_string())
            })
    }
}

impl EventListener for Location {
    fn on_event(&self, resource: &str, event: &Value) {
        debug!("{}: got {} event", self.name(), resource);
        match resource {
            "modes" => self.handle_modes_event(event),
            "states" => self.handle_states_event(),
            "automationRevisionUpdate" => {
                if let Some(location) = self.this.upgrade() {
                    location.update_modes();
                }
            }
            _ => self.entity.handle_event(resource, event),
        }
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.entity)
    }
}

fn default_modes() -> BTreeMap<String, String> {
    DEFAULT_MODES
        .iter()
        .map(|(name, id)| (name.to_string(), id.to_string()))
        .collect()
}
