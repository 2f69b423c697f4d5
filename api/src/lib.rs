//! REST API client for Site Kit datastore resolvers.
//!
//! # Architecture
//!
//! Stores never talk HTTP directly. Their controls call an [`ApiClient`], which
//! maps an [`ApiRequest`] onto a plugin route:
//!
//! ```text
//! {base_url}/google-site-kit/v1/{type}/{identifier}/data/{datapoint}
//! ```
//!
//! - `get` sends the request data as bracketed query arguments
//!   (`metrics[0][name]=sessions`);
//! - `set` POSTs `{"data": ...}` as JSON.
//!
//! Both return the parsed JSON payload or a structured [`ApiError`]
//! (`{ code, message, data: { status } }`). Transport failures map to the
//! `fetch_error` code. The client performs no retries and no caching; both are
//! caller policy.

mod http;
mod query;

use futures_util::future::BoxFuture;
use serde_json::Value;

pub use http::HttpApiClient;
pub use query::encode_query_pairs;
pub use sitekit_types::{ApiError, ApiErrorData};

/// REST namespace shared by every route.
pub const API_NAMESPACE: &str = "google-site-kit/v1";

/// API call future type alias.
pub type ApiFut<'a> = BoxFuture<'a, Result<Value, ApiError>>;

/// Top-level route type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointType {
    Core,
    Modules,
}

impl EndpointType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EndpointType::Core => "core",
            EndpointType::Modules => "modules",
        }
    }
}

/// One REST call: `{type}/{identifier}/data/{datapoint}` plus its data.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub kind: EndpointType,
    pub identifier: String,
    pub datapoint: String,
    pub data: Value,
}

impl ApiRequest {
    #[must_use]
    pub fn new(kind: EndpointType, identifier: impl Into<String>, datapoint: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            datapoint: datapoint.into(),
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn core(identifier: impl Into<String>, datapoint: impl Into<String>) -> Self {
        Self::new(EndpointType::Core, identifier, datapoint)
    }

    #[must_use]
    pub fn modules(identifier: impl Into<String>, datapoint: impl Into<String>) -> Self {
        Self::new(EndpointType::Modules, identifier, datapoint)
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Route path relative to the site root, with a leading slash.
    #[must_use]
    pub fn route(&self) -> String {
        format!(
            "/{API_NAMESPACE}/{}/{}/data/{}",
            self.kind.as_str(),
            self.identifier,
            self.datapoint
        )
    }
}

/// Remote-fetch capability consumed by store controls.
pub trait ApiClient: Send + Sync {
    fn get<'a>(&'a self, request: &'a ApiRequest) -> ApiFut<'a>;
    fn set<'a>(&'a self, request: &'a ApiRequest) -> ApiFut<'a>;
}
