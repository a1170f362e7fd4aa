//! SDK registry manager
//!
//! Owns the canonical [`SdkSet`] of one namespace, persists it through an
//! [`SdkStore`], and tells listeners what changed between generations.

use crate::classpath::{ContainerPath, PathKind};
use crate::sdk::{codec, Sdk, SdkFactory, SdkSet, SdkStore};
use crate::types::SdkError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    NewDefault,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::NewDefault => "new default",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkUpdate {
    pub sdk: Sdk,
    pub kind: ChangeKind,
}

/// Changes between two registry generations, ordered
/// `[NewDefault?, Added*, Removed*]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateEvent {
    updates: Vec<SdkUpdate>,
}

impl UpdateEvent {
    pub fn updates(&self) -> &[SdkUpdate] {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn new_default(&self) -> Option<&Sdk> {
        self.of_kind(ChangeKind::NewDefault).next()
    }

    pub fn added(&self) -> impl Iterator<Item = &Sdk> {
        self.of_kind(ChangeKind::Added)
    }

    pub fn removed(&self) -> impl Iterator<Item = &Sdk> {
        self.of_kind(ChangeKind::Removed)
    }

    fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &Sdk> {
        self.updates
            .iter()
            .filter(move |u| u.kind == kind)
            .map(|u| &u.sdk)
    }

    fn push(&mut self, sdk: &Sdk, kind: ChangeKind) {
        self.updates.push(SdkUpdate {
            sdk: sdk.clone(),
            kind,
        });
    }
}

/// Compute what changed from `old` to `new`.
///
/// An SDK counts as added unless `old` holds an identical value, so
/// re-registering a name at a new install path is reported as `Added`.
/// Such a same-name replacement is reported only that way: it is neither a
/// removal nor, when it is the default, a new default.
pub fn diff(old: &SdkSet, new: &SdkSet) -> UpdateEvent {
    let mut event = UpdateEvent::default();

    // An emptied set has no default, which is not a default change.
    if let Some(new_default) = new.default_sdk() {
        let same_default = old
            .default_sdk()
            .is_some_and(|old_default| old_default.name_eq(new_default));
        if !same_default {
            event.push(new_default, ChangeKind::NewDefault);
        }
    }

    for sdk in new.iter().filter(|sdk| !old.contains_value(sdk)) {
        event.push(sdk, ChangeKind::Added);
    }

    for sdk in old.iter().filter(|sdk| !new.contains_name(sdk.name())) {
        event.push(sdk, ChangeKind::Removed);
    }

    event
}

/// Whether a project bound to `path` must re-resolve after `event`.
///
/// `bound_sdk` is the name of the SDK the project resolved to last time;
/// for pinned paths it defaults to the name in the path.
pub fn is_project_affected(path: &ContainerPath, bound_sdk: Option<&str>, event: &UpdateEvent) -> bool {
    if path.is_default() && event.new_default().is_some() {
        return true;
    }

    let Some(bound) = bound_sdk.or(path.sdk_name()) else {
        return false;
    };

    event
        .updates()
        .iter()
        .any(|u| u.kind != ChangeKind::NewDefault && u.sdk.name() == bound)
}

/// Receives an [`UpdateEvent`] after every [`SdkManager::set_sdks`].
pub trait UpdateListener: Send + Sync {
    fn on_update(&self, event: &UpdateEvent) -> anyhow::Result<()>;
}

impl<F> UpdateListener for F
where
    F: Fn(&UpdateEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_update(&self, event: &UpdateEvent) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub event: UpdateEvent,
    /// `false` if the new registry could not be written to the store; the
    /// in-memory registry is replaced regardless.
    pub persisted: bool,
}

/// Events that were written but not yet delivered, in write order.
#[derive(Default)]
struct Dispatch {
    next_ticket: u64,
    delivered: u64,
    pending: VecDeque<(u64, UpdateEvent)>,
    /// Thread currently running listeners
    dispatcher: Option<ThreadId>,
    /// Listener failures not yet picked up by the writer of the event
    failures: HashMap<u64, SdkError>,
    /// Tickets written from inside a listener; their failures are only logged
    detached: HashSet<u64>,
}

pub struct SdkManager {
    namespace: String,
    store: Arc<dyn SdkStore>,
    factory: Arc<dyn SdkFactory>,
    /// Canonical registry, loaded on first use
    sdks: RwLock<Option<Arc<SdkSet>>>,
    /// Serializes writers
    write_lock: Mutex<()>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn UpdateListener>)>>,
    next_listener_id: AtomicU64,
    dispatch: Mutex<Dispatch>,
    delivery: Condvar,
}

impl SdkManager {
    pub fn new(namespace: impl Into<String>, store: Arc<dyn SdkStore>, factory: Arc<dyn SdkFactory>) -> Self {
        let namespace = namespace.into();
        info!("Creating SDK manager for namespace: {}", namespace);

        Self {
            namespace,
            store,
            factory,
            sdks: RwLock::new(None),
            write_lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            dispatch: Mutex::new(Dispatch::default()),
            delivery: Condvar::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn factory(&self) -> &dyn SdkFactory {
        self.factory.as_ref()
    }

    /// A copy of the registered SDKs. Never fails: an unreadable or corrupt
    /// store is logged and treated as empty.
    pub fn get_sdks(&self) -> SdkSet {
        self.canonical().as_ref().clone()
    }

    /// Replace the registry with `sdks`, persist it, and notify listeners.
    ///
    /// A failed write is logged and reported through
    /// [`UpdateReport::persisted`]. The only error returned is
    /// [`SdkError::Listener`], raised after every listener has run.
    ///
    /// Listeners run outside the write lock but always see events in write
    /// order. A `set_sdks` made from inside a listener returns once its write
    /// is applied; its event is delivered after the current one.
    pub fn set_sdks(&self, sdks: SdkSet) -> Result<UpdateReport, SdkError> {
        let (event, persisted, ticket) = {
            let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
            let old = self.canonical();

            let persisted = match codec::encode(&sdks)
                .and_then(|blob| self.store.save(&self.namespace, &blob))
            {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to persist SDK registry '{}': {}", self.namespace, e);
                    false
                }
            };

            let event = diff(&old, &sdks);
            let ticket = self.enqueue(event.clone());
            debug!("SDK registry '{}' now {}", self.namespace, sdks);
            *self.cache_mut() = Some(Arc::new(sdks));
            (event, persisted, ticket)
        };

        self.deliver(ticket)?;
        Ok(UpdateReport { event, persisted })
    }

    /// The SDK a container path refers to: the default for default paths,
    /// the named SDK otherwise.
    pub fn find_sdk(&self, path: &ContainerPath) -> Option<Sdk> {
        let sdks = self.canonical();
        match path.kind() {
            PathKind::Default => sdks.default_sdk().cloned(),
            PathKind::Named(name) => sdks.find_by_name(name).cloned(),
        }
    }

    pub fn find_sdk_for_path(&self, path: &str) -> Option<Sdk> {
        match ContainerPath::parse(path) {
            Ok(path) => self.find_sdk(&path),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn UpdateListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Drop the cached registry so the next read goes back to the store.
    pub fn reload(&self) {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        *self.cache_mut() = None;
    }

    fn canonical(&self) -> Arc<SdkSet> {
        if let Some(sdks) = self.cache().as_ref() {
            return Arc::clone(sdks);
        }

        let mut cache = self.cache_mut();
        if let Some(sdks) = cache.as_ref() {
            return Arc::clone(sdks);
        }

        let loaded = Arc::new(self.load());
        *cache = Some(Arc::clone(&loaded));
        loaded
    }

    fn load(&self) -> SdkSet {
        let blob = match self.store.load(&self.namespace) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                info!("No SDKs registered in '{}' yet", self.namespace);
                return SdkSet::new();
            }
            Err(e) => {
                let e = SdkError::serialization("SDK registry store is unreadable", e);
                error!("{} ('{}'); starting with no SDKs", e, self.namespace);
                return SdkSet::new();
            }
        };

        match codec::decode(&blob, self.factory.as_ref()) {
            Ok(sdks) => {
                info!("Loaded {} SDK(s) into '{}'", sdks.len(), self.namespace);
                sdks
            }
            Err(e) => {
                error!("{} ('{}'); starting with no SDKs", e, self.namespace);
                SdkSet::new()
            }
        }
    }

    fn enqueue(&self, event: UpdateEvent) -> u64 {
        let mut dispatch = self.dispatch_state();
        dispatch.next_ticket += 1;
        let ticket = dispatch.next_ticket;
        dispatch.pending.push_back((ticket, event));
        ticket
    }

    /// Block until the event behind `ticket` has reached every listener,
    /// delivering queued events ourselves if no other thread is.
    fn deliver(&self, ticket: u64) -> Result<(), SdkError> {
        let current = thread::current().id();
        let mut dispatch = self.dispatch_state();

        loop {
            if dispatch.delivered >= ticket {
                return dispatch.failures.remove(&ticket).map_or(Ok(()), Err);
            }

            match dispatch.dispatcher {
                Some(id) if id == current => {
                    // Written from a listener: the running dispatch loop picks it up
                    dispatch.detached.insert(ticket);
                    return Ok(());
                }
                Some(_) => {
                    dispatch = self
                        .delivery
                        .wait(dispatch)
                        .unwrap_or_else(|e| e.into_inner());
                }
                None => {
                    dispatch.dispatcher = Some(current);
                    drop(dispatch);
                    Dispatcher::new(self).run();
                    dispatch = self.dispatch_state();
                }
            }
        }
    }

    fn notify(&self, event: &UpdateEvent) -> Result<(), SdkError> {
        // Snapshot so listeners may (un)register while being notified
        let listeners: Vec<Arc<dyn UpdateListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut failed = 0;
        let mut first_error = None;

        for listener in &listeners {
            if let Err(e) = listener.on_update(event) {
                warn!("SDK update listener failed in '{}': {:#}", self.namespace, e);
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(source) => Err(SdkError::Listener {
                failed,
                total: listeners.len(),
                source,
            }),
            None => Ok(()),
        }
    }

    fn dispatch_state(&self) -> MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cache(&self) -> RwLockReadGuard<'_, Option<Arc<SdkSet>>> {
        self.sdks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, Option<Arc<SdkSet>>> {
        self.sdks.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drains the pending queue. Dropping it hands dispatch back, also when a
/// listener panics, so waiting writers are never stranded.
struct Dispatcher<'a> {
    manager: &'a SdkManager,
    in_flight: Option<u64>,
}

impl<'a> Dispatcher<'a> {
    fn new(manager: &'a SdkManager) -> Self {
        Self {
            manager,
            in_flight: None,
        }
    }

    fn run(mut self) {
        loop {
            let Some((ticket, event)) = self.manager.dispatch_state().pending.pop_front() else {
                return;
            };

            self.in_flight = Some(ticket);
            let result = self.manager.notify(&event);
            self.in_flight = None;

            let mut dispatch = self.manager.dispatch_state();
            dispatch.delivered = ticket;
            let detached = dispatch.detached.remove(&ticket);
            if let Err(e) = result {
                if !detached {
                    dispatch.failures.insert(ticket, e);
                }
            }
            drop(dispatch);
            self.manager.delivery.notify_all();
        }
    }
}

impl Drop for Dispatcher<'_> {
    fn drop(&mut self) {
        let mut dispatch = self.manager.dispatch_state();
        if let Some(ticket) = self.in_flight {
            dispatch.delivered = dispatch.delivered.max(ticket);
            dispatch.detached.remove(&ticket);
        }
        dispatch.dispatcher = None;
        drop(dispatch);
        self.manager.delivery.notify_all();
    }
}
