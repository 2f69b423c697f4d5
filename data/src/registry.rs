//! Store registry.
//!
//! The [`Registry`] owns every registered store, a global state version and
//! the subscriber list. It is a cheap handle: clones share the same stores.
//!
//! # Flow
//!
//! - `select(store).call(selector, args)` schedules the selector's resolver the
//!   first time a given argument signature is seen, then evaluates the
//!   selector against the current state. Results are memoized per registry
//!   version, except for selectors declared with `uncached_selector`.
//! - `dispatch(store).call(action, args)` runs a synchronous action creator
//!   and commits the resulting action through the store's reducers.
//! - `dispatch(store).run(action, args).await` runs an asynchronous action;
//!   failures are recorded in the store's error slice and returned in the
//!   [`ActionResponse`], never raised.
//!
//! All state changes go through one commit path, which applies reducers under
//! the store's state lock, bumps the version and then notifies subscribers
//! synchronously in subscription order after the lock is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use sitekit_types::{Action, ApiError, ArgSignature};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::{RegistrationError, StoreError};
use crate::errors::{clear_error, error_from_state, receive_error};
use crate::memo::SelectorCache;
use crate::resolution::{ResolutionRecord, ResolutionTable};
use crate::store::{ActionCreator, ResolverFn, StoreDefinition, StoreState};

type Listener = Arc<dyn Fn() + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`Registry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Result of an asynchronous action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResponse {
    pub response: Option<Value>,
    pub error: Option<ApiError>,
}

impl ActionResponse {
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

struct StoreEntry {
    name: String,
    definition: StoreDefinition,
    state: Mutex<Arc<StoreState>>,
    resolutions: Mutex<ResolutionTable>,
    memo: Mutex<SelectorCache>,
}

impl StoreEntry {
    fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&lock(&self.state))
    }

    fn resolution(&self, selector: &str, args: &[Value]) -> Option<ResolutionRecord> {
        lock(&self.resolutions)
            .get(selector, &ArgSignature::of(args))
            .cloned()
    }
}

struct RegistryInner {
    stores: RwLock<HashMap<String, Arc<StoreEntry>>>,
    version: AtomicU64,
    changes: watch::Sender<u64>,
    listeners: Mutex<Vec<(Subscription, Listener)>>,
    next_subscription: AtomicU64,
    runtime: Option<Handle>,
}

#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("stores", &self.store_names())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry that spawns resolvers on the ambient tokio runtime, if any.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Handle::try_current().ok())
    }

    #[must_use]
    pub fn with_runtime(handle: Handle) -> Self {
        Self::build(Some(handle))
    }

    fn build(runtime: Option<Handle>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(RegistryInner {
                stores: RwLock::new(HashMap::new()),
                version: AtomicU64::new(0),
                changes,
                listeners: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                runtime,
            }),
        }
    }

    pub fn register_store(
        &self,
        name: impl Into<String>,
        definition: StoreDefinition,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        let mut stores = self
            .inner
            .stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if stores.contains_key(&name) {
            tracing::warn!(store = %name, "Store already registered");
            return Err(RegistrationError::DuplicateStore { name });
        }

        tracing::debug!(store = %name, ?definition, "Registered store");
        let entry = StoreEntry {
            name: name.clone(),
            state: Mutex::new(Arc::new(definition.initial_state.clone())),
            definition,
            resolutions: Mutex::new(ResolutionTable::default()),
            memo: Mutex::new(SelectorCache::default()),
        };
        stores.insert(name, Arc::new(entry));
        Ok(())
    }

    #[must_use]
    pub fn has_store(&self, name: &str) -> bool {
        self.inner
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered store names, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Current state version. Advances on every committed change and every
    /// resolution transition.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Receiver that observes every version bump.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    #[must_use]
    pub fn select(&self, store: &str) -> Select<'_> {
        Select {
            registry: self,
            store: store.to_string(),
        }
    }

    #[must_use]
    pub fn dispatch(&self, store: &str) -> Dispatch<'_> {
        Dispatch {
            registry: self,
            store: store.to_string(),
        }
    }

    #[must_use]
    pub fn until_resolved(&self, store: &str) -> UntilResolved<'_> {
        UntilResolved {
            registry: self,
            store: store.to_string(),
        }
    }

    /// Wait until `predicate` holds, re-checking after every version bump.
    pub async fn until<F>(&self, mut predicate: F)
    where
        F: FnMut(&Registry) -> bool,
    {
        let mut changes = self.changes();
        while !predicate(self) {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Register a change listener. Listeners run synchronously, in
    /// subscription order, after each committed change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = Subscription(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Returns whether the subscription was still active.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    pub fn unsubscribe_all(&self) {
        lock(&self.inner.listeners).clear();
    }

    /// Resolvers currently in flight across all stores.
    #[must_use]
    pub fn pending_resolutions(&self) -> usize {
        let stores: Vec<Arc<StoreEntry>> = self
            .inner
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        stores
            .iter()
            .map(|entry| lock(&entry.resolutions).pending_count())
            .sum()
    }

    fn entry(&self, store: &str) -> Result<Arc<StoreEntry>, StoreError> {
        self.inner
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store)
            .cloned()
            .ok_or_else(|| StoreError::UnknownStore {
                store: store.to_string(),
            })
    }

    fn bump(&self) -> u64 {
        let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.changes.send_replace(version);
        version
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Apply `action` through the store's reducers. Returns whether the state
    /// changed; subscribers are only notified when it did.
    fn commit(&self, entry: &StoreEntry, action: &Action) -> bool {
        let changed = {
            let mut state = lock(&entry.state);
            let mut next: Option<StoreState> = None;
            for reducer in &entry.definition.reducers {
                let current = next.as_ref().unwrap_or(&**state);
                if let Some(reduced) = reducer(current, action) {
                    next = Some(reduced);
                }
            }
            match next {
                Some(next) if next != **state => {
                    *state = Arc::new(next);
                    true
                }
                _ => false,
            }
        };

        tracing::debug!(store = %entry.name, action = %action.kind, changed, "Dispatch");
        if changed {
            self.bump();
            self.notify();
        }
        changed
    }

    fn start_resolution(
        &self,
        entry: &Arc<StoreEntry>,
        selector: &str,
        resolver: &ResolverFn,
        signature: &ArgSignature,
        args: &[Value],
    ) {
        let Some(ticket) = lock(&entry.resolutions).start(selector, signature) else {
            return;
        };
        self.bump();
        tracing::debug!(store = %entry.name, selector, args = %signature, "Resolving");

        let ctx = StoreContext::new(self.clone(), entry.name.clone());
        let resolution = resolver(ctx, args.to_vec());
        let registry = self.clone();
        let task_entry = Arc::clone(entry);
        let selector_name = selector.to_string();
        let task_signature = signature.clone();
        let task_args = args.to_vec();
        let task = async move {
            let result = resolution.await;
            registry.finish_resolution(
                &task_entry,
                &selector_name,
                &task_signature,
                ticket,
                &task_args,
                result,
            );
        };

        match self.inner.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                tracing::error!(
                    store = %entry.name,
                    selector,
                    "No tokio runtime available; resolver cannot run"
                );
                let error = ApiError::new("no_runtime", "No async runtime available to run resolver");
                self.finish_resolution(entry, selector, signature, ticket, args, Err(error.into()));
            }
        }
    }

    fn finish_resolution(
        &self,
        entry: &StoreEntry,
        selector: &str,
        signature: &ArgSignature,
        ticket: u64,
        args: &[Value],
        result: Result<(), StoreError>,
    ) {
        match result {
            Ok(()) => {
                self.commit(entry, &clear_error(selector, args));
            }
            Err(err) => {
                let error = err.into_api_error();
                tracing::warn!(
                    store = %entry.name,
                    selector,
                    code = %error.code,
                    "Resolver failed: {}",
                    error.message
                );
                self.commit(entry, &receive_error(&error, selector, args));
            }
        }

        if lock(&entry.resolutions).finish(selector, signature, ticket) {
            tracing::debug!(store = %entry.name, selector, args = %signature, "Resolved");
            self.bump();
            self.notify();
        }
    }
}

/// Read access to one store.
pub struct Select<'a> {
    registry: &'a Registry,
    store: String,
}

impl Select<'_> {
    /// Evaluate a selector, scheduling its resolver on first use of `args`.
    pub fn call(&self, selector: &str, args: &[Value]) -> Result<Option<Value>, StoreError> {
        let entry = self.registry.entry(&self.store)?;
        let selector_fn = entry
            .definition
            .selectors
            .get(selector)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSelector {
                store: self.store.clone(),
                selector: selector.to_string(),
            })?;
        let signature = ArgSignature::of(args);

        if let Some(resolver) = entry.definition.resolvers.get(selector) {
            self.registry
                .start_resolution(&entry, selector, resolver, &signature, args);
        }

        let memoized = !entry.definition.uncached.contains(selector);
        let version = self.registry.version();
        if memoized && let Some(cached) = lock(&entry.memo).get(selector, &signature, version) {
            return Ok(cached);
        }

        let state = entry.snapshot();
        let ctx = SelectorContext {
            registry: self.registry,
            store: &entry.name,
            state: &state,
            definition: &entry.definition,
        };
        let value = selector_fn(&ctx, args)?;
        if memoized {
            lock(&entry.memo).insert(selector, signature, version, value.clone());
        }
        Ok(value)
    }

    /// [`Select::call`] with the result deserialized into `T`.
    pub fn call_as<T: DeserializeOwned>(
        &self,
        selector: &str,
        args: &[Value],
    ) -> Result<Option<T>, StoreError> {
        self.call(selector, args)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn state(&self) -> Result<Arc<StoreState>, StoreError> {
        Ok(self.registry.entry(&self.store)?.snapshot())
    }

    #[must_use]
    pub fn resolution(&self, selector: &str, args: &[Value]) -> Option<ResolutionRecord> {
        self.registry
            .entry(&self.store)
            .ok()?
            .resolution(selector, args)
    }

    #[must_use]
    pub fn has_started_resolution(&self, selector: &str, args: &[Value]) -> bool {
        self.resolution(selector, args).is_some()
    }

    #[must_use]
    pub fn has_finished_resolution(&self, selector: &str, args: &[Value]) -> bool {
        self.resolution(selector, args)
            .is_some_and(|record| record.is_done())
    }

    #[must_use]
    pub fn is_resolving(&self, selector: &str, args: &[Value]) -> bool {
        self.resolution(selector, args)
            .is_some_and(|record| record.is_pending())
    }

    #[must_use]
    pub fn error_for_selector(&self, selector: &str, args: &[Value]) -> Option<ApiError> {
        let state = self.state().ok()?;
        error_from_state(&state, selector, args)
    }

    #[must_use]
    pub fn error_for_action(&self, action: &str, args: &[Value]) -> Option<ApiError> {
        let state = self.state().ok()?;
        error_from_state(&state, action, args)
    }

    /// Drop memoized results of one selector.
    pub fn invalidate_cache(&self, selector: &str) {
        if let Ok(entry) = self.registry.entry(&self.store) {
            lock(&entry.memo).invalidate(selector);
        }
    }
}

/// Write access to one store.
pub struct Dispatch<'a> {
    registry: &'a Registry,
    store: String,
}

impl Dispatch<'_> {
    /// Run a synchronous action creator. Returns whether the state changed.
    pub fn call(&self, action: &str, args: &[Value]) -> Result<bool, StoreError> {
        let entry = self.registry.entry(&self.store)?;
        match self.creator(&entry, action)? {
            ActionCreator::Sync(create) => {
                let action = create(args)?;
                Ok(self.registry.commit(&entry, &action))
            }
            ActionCreator::Async(_) => Err(StoreError::RequiresAwait {
                store: self.store.clone(),
                action: action.to_string(),
            }),
        }
    }

    /// Run any action to completion.
    ///
    /// An API failure of an asynchronous action is recorded under
    /// `(action, args)` and returned in [`ActionResponse::error`]; a success
    /// clears any previous error for the same call.
    pub async fn run(&self, action: &str, args: &[Value]) -> Result<ActionResponse, StoreError> {
        let entry = self.registry.entry(&self.store)?;
        let run = match self.creator(&entry, action)? {
            ActionCreator::Sync(create) => {
                let typed = create(args)?;
                self.registry.commit(&entry, &typed);
                return Ok(ActionResponse {
                    response: Some(serde_json::to_value(&typed)?),
                    error: None,
                });
            }
            ActionCreator::Async(run) => run,
        };

        tracing::debug!(store = %self.store, action, "Running action");
        let ctx = StoreContext::new(self.registry.clone(), self.store.clone());
        match run(ctx, args.to_vec()).await {
            Ok(response) => {
                self.registry.commit(&entry, &clear_error(action, args));
                Ok(ActionResponse {
                    response: Some(response),
                    error: None,
                })
            }
            Err(StoreError::Api(error)) => {
                tracing::warn!(
                    store = %self.store,
                    action,
                    code = %error.code,
                    "Action failed: {}",
                    error.message
                );
                self.registry
                    .commit(&entry, &receive_error(&error, action, args));
                Ok(ActionResponse {
                    response: None,
                    error: Some(error),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Apply a raw action envelope. Returns whether the state changed.
    pub fn apply(&self, action: &Action) -> Result<bool, StoreError> {
        let entry = self.registry.entry(&self.store)?;
        Ok(self.registry.commit(&entry, action))
    }

    /// Forget the resolution of one selector call so the next select runs the
    /// resolver again.
    pub fn invalidate_resolution(&self, selector: &str, args: &[Value]) -> Result<bool, StoreError> {
        let entry = self.registry.entry(&self.store)?;
        let removed = lock(&entry.resolutions).invalidate(selector, &ArgSignature::of(args));
        if removed {
            tracing::debug!(store = %self.store, selector, "Invalidated resolution");
            self.registry.bump();
            self.registry.notify();
        }
        Ok(removed)
    }

    /// Forget every resolution of a selector. Returns how many were dropped.
    pub fn invalidate_resolution_for_selector(&self, selector: &str) -> Result<usize, StoreError> {
        let entry = self.registry.entry(&self.store)?;
        let removed = lock(&entry.resolutions).invalidate_selector(selector);
        if removed > 0 {
            tracing::debug!(store = %self.store, selector, removed, "Invalidated resolutions");
            self.registry.bump();
            self.registry.notify();
        }
        Ok(removed)
    }

    fn creator(&self, entry: &StoreEntry, action: &str) -> Result<ActionCreator, StoreError> {
        entry
            .definition
            .actions
            .get(action)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAction {
                store: self.store.clone(),
                action: action.to_string(),
            })
    }
}

/// Waits for resolvers of one store.
pub struct UntilResolved<'a> {
    registry: &'a Registry,
    store: String,
}

impl UntilResolved<'_> {
    /// Select, then wait until the selector's resolver for `args` has
    /// finished, and select again. Selectors without a resolver return
    /// immediately.
    pub async fn selector(&self, selector: &str, args: &[Value]) -> Result<Option<Value>, StoreError> {
        let mut changes = self.registry.changes();
        let select = self.registry.select(&self.store);
        let value = select.call(selector, args)?;

        let entry = self.registry.entry(&self.store)?;
        if !entry.definition.has_resolver(selector) {
            return Ok(value);
        }

        while !select.has_finished_resolution(selector, args) {
            if changes.changed().await.is_err() {
                return Ok(value);
            }
        }
        select.call(selector, args)
    }
}

/// What a selector sees while it runs.
pub struct SelectorContext<'a> {
    registry: &'a Registry,
    store: &'a str,
    state: &'a StoreState,
    definition: &'a StoreDefinition,
}

impl<'a> SelectorContext<'a> {
    #[must_use]
    pub fn state(&self) -> &StoreState {
        self.state
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store
    }

    #[must_use]
    pub fn has_selector(&self, name: &str) -> bool {
        self.definition.has_selector(name)
    }

    /// Another selector of the same store, resolvers included.
    pub fn select(&self, selector: &str, args: &[Value]) -> Result<Option<Value>, StoreError> {
        self.registry.select(self.store).call(selector, args)
    }

    /// A selector of another store.
    #[must_use]
    pub fn select_from(&self, store: &str) -> Select<'a> {
        self.registry.select(store)
    }

    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }
}

/// Owned handle given to resolvers and asynchronous actions.
#[derive(Clone)]
pub struct StoreContext {
    registry: Registry,
    store: String,
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl StoreContext {
    fn new(registry: Registry, store: String) -> Self {
        Self { registry, store }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store
    }

    #[must_use]
    pub fn select(&self) -> Select<'_> {
        self.registry.select(&self.store)
    }

    #[must_use]
    pub fn dispatch(&self) -> Dispatch<'_> {
        self.registry.dispatch(&self.store)
    }

    pub fn state(&self) -> Result<Arc<StoreState>, StoreError> {
        self.select().state()
    }

    /// Invoke one of the store's controls.
    pub async fn control(&self, name: &str, payload: Value) -> Result<Value, StoreError> {
        let control = self
            .registry
            .entry(&self.store)?
            .definition
            .controls
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownControl {
                store: self.store.clone(),
                control: name.to_string(),
            })?;
        Ok(control(payload).await?)
    }
}
