//! Collaborators for unit tests.

use crate::backend::{ActiveMode, CommandBackend};
use crate::device::Device;
use crate::error::{ArloError, Result};
use crate::events::EventBus;
use crate::services::Services;
use crate::store::MemoryStore;
use crate::tasks::{Job, TaskRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Holds jobs until the test runs them.
#[derive(Default)]
pub struct QueuedRunner {
    jobs: Mutex<Vec<(&'static str, Job)>>,
}

impl QueuedRunner {
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Run every queued job to completion; returns `(name, succeeded)` pairs.
    pub fn drain(&self) -> Vec<(&'static str, bool)> {
        let jobs = std::mem::take(&mut *self.jobs.lock());
        jobs.into_iter()
            .map(|(name, job)| (name, tokio_test::block_on(job).is_ok()))
            .collect()
    }
}

impl TaskRunner for QueuedRunner {
    fn run(&self, name: &'static str, job: Job) {
        self.jobs.lock().push((name, job));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacyCall {
    pub base_id: String,
    pub device_id: String,
    pub privacy_on: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeCall {
    pub location_id: String,
    pub mode_id: String,
    pub revision: i64,
}

/// Records every command; optionally fails them all.
///
/// Fetches answer from `active_mode` and `mode_list`.
pub struct RecordingBackend {
    pub privacy: Mutex<Vec<PrivacyCall>>,
    pub modes: Mutex<Vec<ModeCall>>,
    pub fail: AtomicBool,
    pub active_mode: Mutex<ActiveMode>,
    pub mode_list: Mutex<Value>,
    pub mode_fetches: AtomicUsize,
    pub list_fetches: AtomicUsize,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            privacy: Mutex::default(),
            modes: Mutex::default(),
            fail: AtomicBool::new(false),
            active_mode: Mutex::new(ActiveMode {
                mode: "mode0".to_string(),
                revision: 1,
            }),
            mode_list: Mutex::new(json!({})),
            mode_fetches: AtomicUsize::new(0),
            list_fetches: AtomicUsize::new(0),
        }
    }
}

impl RecordingBackend {
    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ArloError::Backend("offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CommandBackend for RecordingBackend {
    async fn set_privacy(
        &self,
        base: Arc<Device>,
        device: Arc<Device>,
        privacy_on: bool,
    ) -> Result<()> {
        self.check()?;
        self.privacy.lock().push(PrivacyCall {
            base_id: base.device_id().to_string(),
            device_id: device.device_id().to_string(),
            privacy_on,
        });
        Ok(())
    }

    async fn set_location_mode(
        &self,
        location_id: &str,
        mode_id: &str,
        revision: i64,
    ) -> Result<i64> {
        self.check()?;
        self.modes.lock().push(ModeCall {
            location_id: location_id.to_string(),
            mode_id: mode_id.to_string(),
            revision,
        });
        Ok(revision + 1)
    }

    async fn location_mode(&self, _location_id: &str) -> Result<ActiveMode> {
        self.mode_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.active_mode.lock().clone())
    }

    async fn location_modes(&self, _location_id: &str) -> Result<Value> {
        self.list_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.mode_list.lock().clone())
    }
}

pub struct Harness {
    pub services: Services,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus>,
    pub runner: Arc<QueuedRunner>,
    pub backend: Arc<RecordingBackend>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new());
    let runner = Arc::new(QueuedRunner::default());
    let backend = Arc::new(RecordingBackend::default());
    let services = Services::new(store.clone(), bus.clone(), runner.clone(), backend.clone());
    Harness {
        services,
        store,
        bus,
        runner,
        backend,
    }
}
