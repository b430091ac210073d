//! Attribute cache shared by every Arlo entity.
//!
//! An [`Entity`] holds the snapshot the cloud returned when the entity was
//! discovered, reads and writes live attribute values through the shared
//! [`KeyValueStore`], and fans attribute changes out to registered
//! callbacks. Devices and locations wrap an `Entity` and add their own
//! accessors on top.

use crate::constant;
use crate::store::{KeyValueStore, StorageKey};
use log::{debug, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::{AsRefStr, Display, EnumString};

/// Watch pattern that matches every attribute.
pub const ANY_ATTRIBUTE: &str = "*";

/// Called with `(entity, attribute, new value)` when an attribute changes.
pub type AttrCallback = Arc<dyn Fn(&Entity, &str, &Value) + Send + Sync>;

/// Handle returned by [`Entity::add_attr_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Which event properties an entity persists.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResourceFilter {
    /// Only the known resource keys.
    #[default]
    AllowList,
    /// Every property in the event.
    All,
}

impl ResourceFilter {
    pub fn accepts(&self, key: &str) -> bool {
        match self {
            ResourceFilter::AllowList => constant::is_resource_key(key),
            ResourceFilter::All => true,
        }
    }
}

struct Registration {
    id: SubscriptionId,
    watch: String,
    callback: AttrCallback,
}

pub struct Entity {
    name: String,
    storage_id: String,
    class_tag: &'static str,
    attrs: Map<String, Value>,
    store: Arc<dyn KeyValueStore>,
    filter: ResourceFilter,
    next_subscription: AtomicU64,
    callbacks: Mutex<Vec<Registration>>,
}

impl Entity {
    /// Create an entity from its discovery snapshot.
    ///
    /// A snapshot that is not a JSON object is treated as empty.
    pub fn new(
        name: impl Into<String>,
        storage_id: impl Into<String>,
        class_tag: &'static str,
        attrs: Value,
        store: Arc<dyn KeyValueStore>,
        filter: ResourceFilter,
    ) -> Self {
        let attrs = match attrs {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            storage_id: storage_id.into(),
            class_tag,
            attrs,
            store,
            filter,
            next_subscription: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    /// Tag separating this kind of entity in the store.
    pub fn class_tag(&self) -> &'static str {
        self.class_tag
    }

    /// The discovery snapshot.
    pub fn snapshot(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Top-level string field of the snapshot.
    pub fn snapshot_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    /// String field of the snapshot's nested `properties`.
    pub fn snapshot_property_str(&self, key: &str) -> Option<&str> {
        self.attrs
            .get("properties")
            .and_then(|props| props.get(key))
            .and_then(Value::as_str)
    }

    pub fn model_id(&self) -> Option<&str> {
        self.snapshot_str("modelId")
    }

    /// Store key for `segments` under this entity.
    pub fn storage_key(&self, segments: &[&str]) -> StorageKey {
        StorageKey::new(
            [self.class_tag, self.storage_id.as_str()]
                .into_iter()
                .chain(segments.iter().copied()),
        )
    }

    /// Stored value of `attr`, ignoring the snapshot.
    pub fn load(&self, attr: &str) -> Option<Value> {
        self.load_key(&[attr])
    }

    pub fn load_key(&self, segments: &[&str]) -> Option<Value> {
        non_null(self.store.get(&self.storage_key(segments)))
    }

    /// Every stored entry under this entity matching `segments`, where a
    /// `*` segment matches anything.
    pub fn load_matching(&self, segments: &[&str]) -> Vec<(StorageKey, Value)> {
        self.store.get_matching(&self.storage_key(segments))
    }

    pub fn save(&self, attr: &str, value: Value) {
        self.save_key(&[attr], value);
    }

    pub fn save_key(&self, segments: &[&str], value: Value) {
        self.store.set(&self.storage_key(segments), value);
    }

    /// Persist `value` and tell everyone watching `attr`.
    pub fn save_and_do_callbacks(&self, attr: &str, value: Value) {
        trace!("{}: {} <- {}", self.name, attr, value);
        self.save(attr, value.clone());
        self.do_callbacks(attr, &value);
    }

    /// Value of `attr`, looked up in the store, then the snapshot, then the
    /// snapshot's `properties`.
    pub fn attribute_opt(&self, attr: &str) -> Option<Value> {
        self.load(attr)
            .or_else(|| non_null(self.attrs.get(attr).cloned()))
            .or_else(|| {
                non_null(
                    self.attrs
                        .get("properties")
                        .and_then(|props| props.get(attr))
                        .cloned(),
                )
            })
    }

    /// Value of `attr`, or `default` if it is not known anywhere.
    pub fn attribute(&self, attr: &str, default: Value) -> Value {
        self.attribute_opt(attr).unwrap_or(default)
    }

    /// Register `callback` for changes of `attr` (or [`ANY_ATTRIBUTE`]).
    pub fn add_attr_callback<F>(&self, attr: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&Entity, &str, &Value) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push(Registration {
            id,
            watch: attr.into(),
            callback: Arc::new(callback),
        });
        id
    }

    /// Drop a callback. Returns `false` if `id` was not registered.
    pub fn remove_attr_callback(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|reg| reg.id != id);
        callbacks.len() != before
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Run the callbacks watching `attr`.
    ///
    /// Callbacks run after the registry lock is released, so they may add
    /// or remove registrations themselves.
    pub fn do_callbacks(&self, attr: &str, value: &Value) {
        let matching: Vec<AttrCallback> = {
            let callbacks = self.callbacks.lock();
            callbacks
                .iter()
                .filter(|reg| reg.watch == attr || reg.watch == ANY_ATTRIBUTE)
                .map(|reg| reg.callback.clone())
                .collect()
        };
        for callback in matching {
            callback(self, attr, value);
        }
    }

    /// Handle a resource event addressed to this entity.
    ///
    /// The event either carries its values under `properties` or is the
    /// property map itself.
    pub fn handle_event(&self, resource: &str, event: &Value) {
        debug!("{}: got {} event", self.name, resource);
        let props = match event.get("properties") {
            Some(Value::Object(props)) => props,
            _ => match event {
                Value::Object(props) => props,
                _ => {
                    debug!("{}: ignoring non-object {} event", self.name, resource);
                    return;
                }
            },
        };
        self.update_resources(props);
    }

    /// Persist and report every accepted key of `props`.
    pub fn update_resources(&self, props: &Map<String, Value>) {
        for (key, value) in props {
            if value.is_null() {
                continue;
            }
            if !self.filter.accepts(key) {
                trace!("{}: dropping {}", self.name, key);
                continue;
            }
            self.save_and_do_callbacks(key, value.clone());
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}:{}:{}>", self.class_tag, self.storage_id, self.name)
    }
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn entity(attrs: Value) -> (Entity, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let entity = Entity::new(
            "Front Door",
            "C1",
            "camera",
            attrs,
            store.clone(),
            ResourceFilter::AllowList,
        );
        (entity, store)
    }

    fn recorder(entity: &Entity, attr: &str) -> (SubscriptionId, Arc<Mutex<Vec<(String, Value)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let id = entity.add_attr_callback(attr, move |_, attr, value| {
            s.lock().push((attr.to_string(), value.clone()));
        });
        (id, seen)
    }

    #[test]
    fn test_attribute_default_on_total_miss() {
        let (entity, _) = entity(json!({}));
        assert_eq!(entity.attribute("x", json!(42)), json!(42));
        assert_eq!(entity.attribute_opt("x"), None);
    }

    #[test]
    fn test_attribute_fallback_order() {
        let (entity, store) = entity(json!({
            "modelId": "VMC4040P",
            "batteryLevel": 55,
            "properties": {"batteryLevel": 20, "hwVersion": "H7"}
        }));

        // snapshot top level beats nested properties
        assert_eq!(entity.attribute("batteryLevel", json!(0)), json!(55));
        assert_eq!(entity.attribute("hwVersion", json!(null)), json!("H7"));

        // store beats snapshot
        store.set(&StorageKey::new(["camera", "C1", "batteryLevel"]), json!(77));
        assert_eq!(entity.attribute("batteryLevel", json!(0)), json!(77));
    }

    #[test]
    fn test_null_values_fall_through() {
        let (entity, store) = entity(json!({"signalStrength": null, "properties": {"signalStrength": 4}}));
        store.set(&StorageKey::new(["camera", "C1", "signalStrength"]), Value::Null);
        assert_eq!(entity.attribute("signalStrength", json!(3)), json!(4));
    }

    #[test]
    fn test_event_updates_store_and_fires_callback_once() {
        let (entity, store) = entity(json!({}));
        let (_, seen) = recorder(&entity, "batteryLevel");

        entity.handle_event("cameras/C1", &json!({"properties": {"batteryLevel": 77}}));

        assert_eq!(entity.attribute("batteryLevel", json!(null)), json!(77));
        assert_eq!(
            store.get(&StorageKey::new(["camera", "C1", "batteryLevel"])),
            Some(json!(77))
        );
        assert_eq!(*seen.lock(), vec![("batteryLevel".to_string(), json!(77))]);
    }

    #[test]
    fn test_flat_event_is_its_own_property_map() {
        let (entity, _) = entity(json!({}));
        entity.handle_event("cameras", &json!({"signalStrength": 2, "deviceId": "C1"}));
        assert_eq!(entity.attribute("signalStrength", json!(3)), json!(2));
        // deviceId is not a resource key
        assert_eq!(entity.load("deviceId"), None);
    }

    #[test]
    fn test_wildcard_sees_every_change() {
        let (entity, _) = entity(json!({}));
        let (_, all) = recorder(&entity, ANY_ATTRIBUTE);
        let (_, battery) = recorder(&entity, "batteryLevel");

        entity.handle_event(
            "cameras/C1",
            &json!({"properties": {"batteryLevel": 30, "privacyActive": true}}),
        );

        let mut attrs: Vec<_> = all.lock().iter().map(|(a, _)| a.clone()).collect();
        attrs.sort();
        assert_eq!(attrs, vec!["batteryLevel", "privacyActive"]);
        assert_eq!(battery.lock().len(), 1);
    }

    #[test]
    fn test_callback_receives_entity() {
        let (entity, _) = entity(json!({}));
        let names = Arc::new(Mutex::new(Vec::new()));
        let n = names.clone();
        entity.add_attr_callback("motionDetected", move |entity, _, _| {
            n.lock().push(entity.name().to_string());
        });

        entity.handle_event("cameras/C1", &json!({"motionDetected": true}));
        assert_eq!(*names.lock(), vec!["Front Door".to_string()]);
    }

    #[test]
    fn test_allow_list_drops_unknown_keys() {
        let (entity, store) = entity(json!({}));
        let (_, seen) = recorder(&entity, ANY_ATTRIBUTE);

        entity.handle_event("cameras/C1", &json!({"properties": {"vendorExtra": 1}}));
        assert!(seen.lock().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_pass_through_filter_keeps_unknown_keys() {
        let store = Arc::new(MemoryStore::new());
        let entity = Entity::new("Cam", "C1", "camera", json!({}), store, ResourceFilter::All);
        entity.handle_event("cameras/C1", &json!({"properties": {"vendorExtra": 1}}));
        assert_eq!(entity.attribute("vendorExtra", json!(0)), json!(1));
    }

    #[test]
    fn test_removed_callback_stops_firing() {
        let (entity, _) = entity(json!({}));
        let (id, seen) = recorder(&entity, "batteryLevel");
        assert_eq!(entity.callback_count(), 1);

        assert!(entity.remove_attr_callback(id));
        assert!(!entity.remove_attr_callback(id));
        assert_eq!(entity.callback_count(), 0);

        entity.handle_event("cameras/C1", &json!({"batteryLevel": 10}));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let (entity, _) = entity(json!({}));
        let id_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));

        let slot = id_slot.clone();
        let c = count.clone();
        let id = entity.add_attr_callback("batteryLevel", move |entity, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot.lock() {
                entity.remove_attr_callback(id);
            }
        });
        *id_slot.lock() = Some(id);

        entity.handle_event("cameras/C1", &json!({"batteryLevel": 10}));
        entity.handle_event("cameras/C1", &json!({"batteryLevel": 11}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_registration_and_delivery() {
        let (entity, _) = entity(json!({}));
        let entity = Arc::new(entity);
        let fired = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let entity = entity.clone();
                let fired = fired.clone();
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let f = fired.clone();
                        entity.add_attr_callback(ANY_ATTRIBUTE, move |_, _, _| {
                            f.fetch_add(1, Ordering::Relaxed);
                        });
                        entity.handle_event("cameras/C1", &json!({"batteryLevel": i * 100 + n}));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(entity.callback_count(), 200);
        assert!(fired.load(Ordering::Relaxed) >= 200);
    }

    #[test]
    fn test_storage_key_includes_class_and_id() {
        let (entity, _) = entity(json!({}));
        assert_eq!(
            entity.storage_key(&["modeNameToId", "armed"]).to_string(),
            "camera/C1/modeNameToId/armed"
        );
        assert_eq!(format!("{:?}", entity), "<camera:C1:Front Door>");
    }
}
