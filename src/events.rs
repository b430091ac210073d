//! Resource event delivery.
//!
//! The cloud push channel reports activity per resource (`cameras/<id>`,
//! `modes`, ...). Entities register a listener for their identifier when
//! they are constructed; the bus only holds weak references, so dropping an
//! entity is enough to stop its delivery.

use crate::error::{ArloError, Result};
use log::{debug, trace};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Receives resource events for one entity.
pub trait EventListener: Send + Sync {
    fn on_event(&self, resource: &str, event: &Value);
}

/// Anything entities can subscribe to for events addressed to them.
pub trait EventSource: Send + Sync {
    fn add_listener(&self, id: &str, listener: Weak<dyn EventListener>);
}

/// In-process event bus keyed by entity identifier.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Weak<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live listeners registered for `id`.
    pub fn listener_count(&self, id: &str) -> usize {
        self.listeners
            .read()
            .get(id)
            .map(|list| list.iter().filter(|l| l.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Deliver `event` to every listener registered for `id`.
    ///
    /// Listeners run outside the bus lock. Returns how many were called.
    pub fn dispatch(&self, id: &str, resource: &str, event: &Value) -> usize {
        let targets: Vec<Arc<dyn EventListener>> = {
            let mut listeners = self.listeners.write();
            let Some(list) = listeners.get_mut(id) else {
                trace!("no listener for {} ({})", id, resource);
                return 0;
            };
            list.retain(|l| l.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };

        for listener in &targets {
            listener.on_event(resource, event);
        }
        targets.len()
    }

    /// Deliver a raw cloud message, working out which entity it is for.
    ///
    /// The target is the part of `resource` after the first `/`
    /// (`cameras/<id>`), else the message's `deviceId`, `locationId` or
    /// `from` field.
    pub fn route(&self, message: &Value) -> Result<usize> {
        let resource = message
            .get("resource")
            .and_then(Value::as_str)
            .ok_or_else(|| ArloError::InvalidEvent("missing resource".to_string()))?;

        let id = match resource.split_once('/') {
            Some((_, id)) if !id.is_empty() => id,
            _ => ["deviceId", "locationId", "from"]
                .iter()
                .find_map(|field| message.get(*field).and_then(Value::as_str))
                .ok_or_else(|| {
                    ArloError::InvalidEvent(format!("no target for resource {}", resource))
                })?,
        };

        debug!("routing {} to {}", resource, id);
        Ok(self.dispatch(id, resource, message))
    }
}

impl EventSource for EventBus {
    fn add_listener(&self, id: &str, listener: Weak<dyn EventListener>) {
        self.listeners
            .write()
            .entry(id.to_string())
            .or_default()
            .push(listener);
    }
}
