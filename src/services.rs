//! Collaborators injected into every entity.

use crate::backend::CommandBackend;
use crate::device::DeviceDirectory;
use crate::entity::ResourceFilter;
use crate::events::EventSource;
use crate::store::KeyValueStore;
use crate::tasks::TaskRunner;
use std::sync::Arc;

/// Everything an entity needs from the world around it.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn KeyValueStore>,
    pub events: Arc<dyn EventSource>,
    pub runner: Arc<dyn TaskRunner>,
    pub backend: Arc<dyn CommandBackend>,
    pub directory: Arc<DeviceDirectory>,
    pub filter: ResourceFilter,
}

impl Services {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        events: Arc<dyn EventSource>,
        runner: Arc<dyn TaskRunner>,
        backend: Arc<dyn CommandBackend>,
    ) -> Self {
        Self {
            store,
            events,
            runner,
            backend,
            directory: Arc::new(DeviceDirectory::new()),
            filter: ResourceFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ResourceFilter) -> Self {
        self.filter = filter;
        self
    }
}
