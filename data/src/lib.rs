//! Reactive data store and async resolver runtime.
//!
//! # Architecture
//!
//! - [`StoreDefinition`] / [`combine_stores`] - declarative state slices and
//!   their composition
//! - [`Registry`] - owns registered stores; [`Select`], [`Dispatch`] and
//!   [`UntilResolved`] are its per-store handles
//! - [`errors`] - the error tracker slice every store combines in
//! - [`fetch`] - builder for the standard fetch/receive/isFetching slice
//!
//! Selectors never block. A selector with a resolver returns whatever the
//! state holds (`None` while unknown) and schedules the resolver once per
//! distinct argument signature; callers that need the settled value await
//! [`UntilResolved::selector`].

mod error;
pub mod errors;
pub mod fetch;
mod memo;
mod registry;
mod resolution;
mod store;

pub use error::{MemberKind, RegistrationError, StoreError};
pub use errors::error_store;
pub use fetch::{FetchNames, FetchStoreBuilder};
pub use registry::{
    ActionResponse, Dispatch, Registry, Select, SelectorContext, StoreContext, Subscription,
    UntilResolved,
};
pub use resolution::{ResolutionRecord, ResolutionStatus};
pub use sitekit_types::{Action, ApiError, ArgSignature};
pub use store::{
    ActionCreator, AsyncActionFn, ControlFn, ReducerFn, ResolverFn, SelectorFn, StoreDefinition,
    StoreState, SyncActionFn, arg, arg_str, combine_stores, with_key,
};
