//! Store definitions and composition.
//!
//! A [`StoreDefinition`] is the declarative description of a state slice:
//! its initial state, reducers, action creators, selectors, resolvers and
//! controls. Definitions are built with the chained methods below, merged
//! with [`combine_stores`], and handed to
//! [`Registry::register_store`](crate::Registry::register_store), after which
//! they are immutable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sitekit_types::{Action, ApiError};

use crate::error::{MemberKind, RegistrationError, StoreError};
use crate::registry::{SelectorContext, StoreContext};

/// A store's state: one JSON object whose top-level keys are owned by slices.
pub type StoreState = Map<String, Value>;

/// Reducer. Returns the next state, or `None` when the action is not handled.
pub type ReducerFn = Arc<dyn Fn(&StoreState, &Action) -> Option<StoreState> + Send + Sync>;

/// Selector. `Ok(None)` means "not yet known"; `Ok(Some(Value::Null))` means
/// "known to be absent".
pub type SelectorFn =
    Arc<dyn Fn(&SelectorContext<'_>, &[Value]) -> Result<Option<Value>, StoreError> + Send + Sync>;

pub type SyncActionFn = Arc<dyn Fn(&[Value]) -> Result<Action, StoreError> + Send + Sync>;

pub type AsyncActionFn =
    Arc<dyn Fn(StoreContext, Vec<Value>) -> BoxFuture<'static, Result<Value, StoreError>> + Send + Sync>;

pub type ResolverFn =
    Arc<dyn Fn(StoreContext, Vec<Value>) -> BoxFuture<'static, Result<(), StoreError>> + Send + Sync>;

/// Control. Performs one side effect (usually an API call) for an action.
pub type ControlFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

#[derive(Clone)]
pub enum ActionCreator {
    /// Builds an action that is applied immediately.
    Sync(SyncActionFn),
    /// Runs to completion on the runtime; its failure is tracked by name.
    Async(AsyncActionFn),
}

#[derive(Clone, Default)]
pub struct StoreDefinition {
    pub(crate) initial_state: StoreState,
    pub(crate) reducers: Vec<ReducerFn>,
    pub(crate) actions: BTreeMap<String, ActionCreator>,
    pub(crate) selectors: BTreeMap<String, SelectorFn>,
    /// Selectors evaluated on every call, bypassing the memo cache.
    pub(crate) uncached: BTreeSet<String>,
    pub(crate) resolvers: BTreeMap<String, ResolverFn>,
    pub(crate) controls: BTreeMap<String, ControlFn>,
}

impl fmt::Debug for StoreDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDefinition")
            .field("state_keys", &self.initial_state.keys().collect::<Vec<_>>())
            .field("reducers", &self.reducers.len())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("selectors", &self.selectors.keys().collect::<Vec<_>>())
            .field("uncached", &self.uncached)
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .field("controls", &self.controls.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StoreDefinition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a top-level state key owned by this slice.
    pub fn state(mut self, key: impl Into<String>, initial: Value) -> Self {
        self.initial_state.insert(key.into(), initial);
        self
    }

    pub fn reducer<F>(mut self, reducer: F) -> Self
    where
        F: Fn(&StoreState, &Action) -> Option<StoreState> + Send + Sync + 'static,
    {
        self.reducers.push(Arc::new(reducer));
        self
    }

    /// Reducer over the slice's own action enum. Envelopes that do not decode
    /// into `T` leave the state unchanged.
    pub fn reducer_for<T, F>(self, reducer: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&StoreState, T) -> Option<StoreState> + Send + Sync + 'static,
    {
        self.reducer(move |state, action| reducer(state, action.decode::<T>()?))
    }

    pub fn action<F>(mut self, name: impl Into<String>, creator: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Action, StoreError> + Send + Sync + 'static,
    {
        self.actions
            .insert(name.into(), ActionCreator::Sync(Arc::new(creator)));
        self
    }

    pub fn async_action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(StoreContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StoreError>> + Send + 'static,
    {
        let wrapped: AsyncActionFn = Arc::new(
            move |ctx: StoreContext, args: Vec<Value>| -> BoxFuture<'static, Result<Value, StoreError>> {
                Box::pin(action(ctx, args))
            },
        );
        self.actions.insert(name.into(), ActionCreator::Async(wrapped));
        self
    }

    pub fn selector<F>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&SelectorContext<'_>, &[Value]) -> Result<Option<Value>, StoreError>
            + Send
            + Sync
            + 'static,
    {
        self.selectors.insert(name.into(), Arc::new(selector));
        self
    }

    /// Selector that reads something besides store state, such as the wall
    /// clock. It is never memoized.
    pub fn uncached_selector<F>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&SelectorContext<'_>, &[Value]) -> Result<Option<Value>, StoreError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        self.uncached.insert(name.clone());
        self.selector(name, selector)
    }

    /// Resolver for the selector of the same name.
    pub fn resolver<F, Fut>(mut self, selector: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(StoreContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        let wrapped: ResolverFn = Arc::new(
            move |ctx: StoreContext, args: Vec<Value>| -> BoxFuture<'static, Result<(), StoreError>> {
                Box::pin(resolver(ctx, args))
            },
        );
        self.resolvers.insert(selector.into(), wrapped);
        self
    }

    pub fn control<F, Fut>(mut self, name: impl Into<String>, control: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let wrapped: ControlFn = Arc::new(
            move |payload: Value| -> BoxFuture<'static, Result<Value, ApiError>> {
                Box::pin(control(payload))
            },
        );
        self.controls.insert(name.into(), wrapped);
        self
    }

    #[must_use]
    pub fn initial_state(&self) -> &StoreState {
        &self.initial_state
    }

    #[must_use]
    pub fn has_selector(&self, name: &str) -> bool {
        self.selectors.contains_key(name)
    }

    #[must_use]
    pub fn has_resolver(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }
}

/// Merge slices into one definition.
///
/// State keys and member names must be unique across slices. Reducers run in
/// slice order, each seeing the state produced by the previous one.
pub fn combine_stores(
    definitions: impl IntoIterator<Item = StoreDefinition>,
) -> Result<StoreDefinition, RegistrationError> {
    let mut combined = StoreDefinition::new();

    for definition in definitions {
        for (key, value) in definition.initial_state {
            if combined.initial_state.contains_key(&key) {
                return Err(RegistrationError::StateKeyCollision { key });
            }
            combined.initial_state.insert(key, value);
        }
        combined.reducers.extend(definition.reducers);
        merge_members(&mut combined.actions, definition.actions, MemberKind::Action)?;
        merge_members(&mut combined.selectors, definition.selectors, MemberKind::Selector)?;
        combined.uncached.extend(definition.uncached);
        merge_members(&mut combined.resolvers, definition.resolvers, MemberKind::Resolver)?;
        merge_members(&mut combined.controls, definition.controls, MemberKind::Control)?;
    }

    Ok(combined)
}

fn merge_members<T>(
    into: &mut BTreeMap<String, T>,
    from: BTreeMap<String, T>,
    kind: MemberKind,
) -> Result<(), RegistrationError> {
    for (name, member) in from {
        if into.contains_key(&name) {
            return Err(RegistrationError::MemberCollision { kind, name });
        }
        into.insert(name, member);
    }
    Ok(())
}

static NULL: Value = Value::Null;

/// Argument at `index`, or `null` when the call passed fewer arguments.
#[must_use]
pub fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

/// String argument at `index`, or `InvalidArguments` naming the caller.
pub fn arg_str<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, StoreError> {
    arg(args, index).as_str().ok_or_else(|| {
        StoreError::invalid_arguments(name, format!("argument {index} must be a string"))
    })
}

/// Clone of the state with `key` replaced.
#[must_use]
pub fn with_key(state: &StoreState, key: &str, value: Value) -> StoreState {
    let mut next = state.clone();
    next.insert(key.to_string(), value);
    next
}
