use std::marker::PhantomData;
use std::sync::Arc;

use bitflags::bitflags;
use bson::{Bson, Document, doc};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::Entity;
use crate::errors::EntityError;

bitflags! {
    /// Change kinds a watcher subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventType: u8 {
        const CREATED = 1;
        const UPDATED = 1 << 1;
        const DELETED = 1 << 2;
    }
}

impl EventType {
    /// Change-stream `operationType` values covered by these flags.
    pub fn operation_types(self) -> Vec<&'static str> {
        let mut ops = Vec::new();
        if self.contains(Self::CREATED) {
            ops.push("insert");
        }
        if self.contains(Self::UPDATED) {
            ops.push("update");
            ops.push("replace");
        }
        if self.contains(Self::DELETED) {
            ops.push("delete");
        }
        ops
    }
}

/// Options applied when a watcher is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Max number of change documents per delivered batch.
    pub batch_size: u32,
    /// Project change documents down to their ids.
    pub only_ids: bool,
    /// Keep running after a transport error instead of stopping.
    pub auto_resume: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { batch_size: 25, only_ids: false, auto_resume: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
struct WatchPlan {
    event_types: EventType,
    options: WatchOptions,
    filter: Option<Document>,
    pipeline: Vec<Document>,
}

#[derive(Debug)]
struct WatcherInner {
    state: WatcherState,
    plan: Option<WatchPlan>,
    resume_token: Option<Document>,
}

type ChangesFn = Arc<dyn Fn(&[Document]) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&str) + Send + Sync>;
type StopFn = Arc<dyn Fn() + Send + Sync>;

// Invoked from a snapshot so a callback may register further callbacks.
#[derive(Default)]
struct Callbacks {
    changes: RwLock<Vec<ChangesFn>>,
    errors: RwLock<Vec<ErrorFn>>,
    stops: RwLock<Vec<StopFn>>,
}

/// A named change-stream watcher for entity `T`.
///
/// The watcher owns the subscription plan (pipeline, options, resume token)
/// and fans out batches handed to it by the change-stream transport.
pub struct Watcher<T: Entity> {
    name: String,
    id: Uuid,
    created_at: DateTime<Utc>,
    inner: Mutex<WatcherInner>,
    callbacks: Callbacks,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> std::fmt::Debug for Watcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("entity", &T::collection_name())
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Entity> Watcher<T> {
    /// Creates a watcher for an already normalized name.
    ///
    /// # Errors
    /// Returns `InvalidWatcherName` if the name is blank.
    pub fn new(name: &str) -> Result<Self, EntityError> {
        if name.trim().is_empty() {
            return Err(EntityError::InvalidWatcherName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            inner: Mutex::new(WatcherInner {
                state: WatcherState::NotStarted,
                plan: None,
                resume_token: None,
            }),
            callbacks: Callbacks::default(),
            _entity: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique id of this instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn collection_name(&self) -> &'static str {
        T::collection_name()
    }

    pub fn state(&self) -> WatcherState {
        self.inner.lock().state
    }

    pub fn on_changes<F>(&self, f: F)
    where
        F: Fn(&[Document]) + Send + Sync + 'static,
    {
        self.callbacks.changes.write().push(Arc::new(f));
    }

    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.errors.write().push(Arc::new(f));
    }

    pub fn on_stop<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.stops.write().push(Arc::new(f));
    }

    /// Starts watching for the given change kinds.
    ///
    /// # Errors
    /// Returns `InvalidWatchOptions` for an empty event set or a zero batch
    /// size, and `WatcherState` if the watcher is already running.
    pub fn start(&self, event_types: EventType, options: WatchOptions) -> Result<(), EntityError> {
        self.start_with_filter(event_types, options, None)
    }

    /// Like `start`, AND-ing `filter` into the `$match` stage.
    ///
    /// # Errors
    /// Same as `start`.
    pub fn start_with_filter(
        &self,
        event_types: EventType,
        options: WatchOptions,
        filter: Option<Document>,
    ) -> Result<(), EntityError> {
        if event_types.is_empty() {
            return Err(EntityError::InvalidWatchOptions("no event types selected".into()));
        }
        if options.batch_size == 0 {
            return Err(EntityError::InvalidWatchOptions("batch_size must be > 0".into()));
        }
        let mut inner = self.inner.lock();
        if inner.state == WatcherState::Running {
            return Err(EntityError::WatcherState(format!("watcher {} is already running", self.name)));
        }
        let pipeline = build_pipeline(event_types, filter.as_ref(), options.only_ids);
        inner.plan = Some(WatchPlan { event_types, options, filter, pipeline });
        inner.resume_token = None;
        inner.state = WatcherState::Running;
        log::info!(
            "watcher started: collection={}, name={}, events={:?}",
            T::collection_name(),
            self.name,
            event_types
        );
        Ok(())
    }

    /// Change-stream pipeline of the current plan; empty before the first start.
    pub fn pipeline(&self) -> Vec<Document> {
        self.inner.lock().plan.as_ref().map(|p| p.pipeline.clone()).unwrap_or_default()
    }

    pub fn options(&self) -> Option<WatchOptions> {
        self.inner.lock().plan.as_ref().map(|p| p.options)
    }

    pub fn event_types(&self) -> Option<EventType> {
        self.inner.lock().plan.as_ref().map(|p| p.event_types)
    }

    pub fn filter(&self) -> Option<Document> {
        self.inner.lock().plan.as_ref().and_then(|p| p.filter.clone())
    }

    pub fn resume_token(&self) -> Option<Document> {
        self.inner.lock().resume_token.clone()
    }

    pub fn set_resume_token(&self, token: Document) {
        self.inner.lock().resume_token = Some(token);
    }

    /// Hands a batch from the transport to the `on_changes` callbacks.
    ///
    /// Returns false when the batch was dropped (watcher not running, or
    /// empty batch).
    pub fn deliver(&self, batch: &[Document]) -> bool {
        if batch.is_empty() {
            return false;
        }
        {
            let mut inner = self.inner.lock();
            if inner.state != WatcherState::Running {
                return false;
            }
            if let Some(token) = batch.last().and_then(|d| d.get_document("_id").ok()) {
                inner.resume_token = Some(token.clone());
            }
        }
        let callbacks = self.callbacks.changes.read().clone();
        for cb in &callbacks {
            cb(batch);
        }
        true
    }

    /// Reports a transport error. Stops the watcher unless `auto_resume` is set.
    pub fn fail(&self, message: &str) {
        log::warn!("watcher error: collection={}, name={}: {message}", T::collection_name(), self.name);
        let callbacks = self.callbacks.errors.read().clone();
        for cb in &callbacks {
            cb(message);
        }
        let auto_resume = self.inner.lock().plan.as_ref().is_some_and(|p| p.options.auto_resume);
        if !auto_resume {
            self.stop();
        }
    }

    /// Stops a running watcher. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state != WatcherState::Running {
                return false;
            }
            inner.state = WatcherState::Stopped;
        }
        log::info!("watcher stopped: collection={}, name={}", T::collection_name(), self.name);
        let callbacks = self.callbacks.stops.read().clone();
        for cb in &callbacks {
            cb();
        }
        true
    }

    /// True when stopped with a known resume token to continue from.
    pub fn can_restart(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == WatcherState::Stopped && inner.plan.is_some() && inner.resume_token.is_some()
    }

    /// Resumes with the previous plan and resume token.
    ///
    /// # Errors
    /// Returns `WatcherState` unless `can_restart()` holds.
    pub fn restart(&self) -> Result<(), EntityError> {
        let mut inner = self.inner.lock();
        let resumable = inner.state == WatcherState::Stopped
            && inner.plan.is_some()
            && inner.resume_token.is_some();
        if !resumable {
            return Err(EntityError::WatcherState(format!("watcher {} cannot be restarted", self.name)));
        }
        inner.state = WatcherState::Running;
        log::info!("watcher restarted: collection={}, name={}", T::collection_name(), self.name);
        Ok(())
    }
}

fn build_pipeline(event_types: EventType, filter: Option<&Document>, only_ids: bool) -> Vec<Document> {
    let ops: Vec<Bson> = event_types.operation_types().into_iter().map(Bson::from).collect();
    let op_match = doc! { "operationType": { "$in": ops } };
    let stage = match filter {
        Some(f) if !f.is_empty() => doc! { "$match": { "$and": [op_match, f.clone()] } },
        _ => doc! { "$match": op_match },
    };
    let mut pipeline = vec![stage];
    if only_ids {
        pipeline.push(doc! { "$project": { "_id": 1, "fullDocument._id": 1, "documentKey": 1 } });
    }
    pipeline
}
