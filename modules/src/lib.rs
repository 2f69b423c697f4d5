//! Site Kit module stores.
//!
//! # Architecture
//!
//! Each store is a `StoreDefinition` assembled from slices with
//! [`combine_stores`](sitekit_data::combine_stores) and registered by
//! [`register_stores`]:
//!
//! | Store | Slices |
//! |-------|--------|
//! | `core/modules` | module list |
//! | `core/user` | date range, key metrics, errors |
//! | `modules/analytics-4` | settings, properties, report, errors |
//!
//! Remote data arrives through resolvers that call fetch stores, whose
//! controls go through the injected [`ApiClient`]. Date-dependent selectors
//! read the injected [`Clock`].

pub mod analytics_4;
pub mod clock;
mod core_modules;
mod core_user;
pub mod gathering;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sitekit_api::{ApiClient, ApiFut, ApiRequest};
use sitekit_config::ResolvedConfig;
use sitekit_data::{RegistrationError, Registry, StoreContext, StoreError};
use sitekit_types::{CORE_MODULES, CORE_USER, MODULES_ANALYTICS_4};

pub use clock::{Clock, FixedClock, SystemClock};
pub use gathering::{GatheringState, classify};

/// Collaborators shared by every module store.
#[derive(Clone)]
pub struct ModuleDeps {
    pub api: Arc<dyn ApiClient>,
    pub clock: Arc<dyn Clock>,
    pub config: ResolvedConfig,
}

impl fmt::Debug for ModuleDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDeps")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModuleDeps {
    /// Dependencies on the system clock.
    #[must_use]
    pub fn new(api: Arc<dyn ApiClient>, config: ResolvedConfig) -> Self {
        Self {
            api,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Register `core/modules`, `core/user` and `modules/analytics-4`.
pub fn register_stores(registry: &Registry, deps: &ModuleDeps) -> Result<(), RegistrationError> {
    registry.register_store(CORE_MODULES, core_modules::store(deps)?)?;
    registry.register_store(CORE_USER, core_user::store(deps)?)?;
    registry.register_store(MODULES_ANALYTICS_4, analytics_4::store(deps)?)?;
    tracing::debug!("Registered module stores");
    Ok(())
}

/// Run a store's fetch action and turn a reported API failure into `Err`.
pub(crate) async fn fetch(
    ctx: &StoreContext,
    action: &str,
    args: &[Value],
) -> Result<Value, StoreError> {
    let response = ctx.dispatch().run(action, args).await?;
    if let Some(error) = response.error {
        return Err(error.into());
    }
    Ok(response.response.unwrap_or(Value::Null))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Set,
}

/// Fetch-store control that sends its params as the request data.
pub(crate) fn api_control(
    api: &Arc<dyn ApiClient>,
    method: Method,
    request: ApiRequest,
) -> impl Fn(Value) -> ApiFut<'static> + Send + Sync + 'static {
    let api = Arc::clone(api);
    move |data: Value| -> ApiFut<'static> {
        let api = Arc::clone(&api);
        let request = request.clone().with_data(data);
        Box::pin(async move {
            match method {
                Method::Get => api.get(&request).await,
                Method::Set => api.set(&request).await,
            }
        })
    }
}

/// `true` once `key` holds something other than `null`.
pub(crate) fn is_loaded(ctx: &StoreContext, key: &str) -> Result<bool, StoreError> {
    Ok(ctx.state()?.get(key).is_some_and(|value| !value.is_null()))
}

/// Selector body for a key that is `null` until its resolver fills it.
pub(crate) fn loaded(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}
