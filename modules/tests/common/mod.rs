//! Shared test utilities and fixtures
//!
//! Each test gets its own mock WordPress site, a registry with every module
//! store registered, and a clock frozen at [`NOW`].

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use sitekit_api::HttpApiClient;
use sitekit_config::{ResolvedConfig, SitekitConfig};
use sitekit_data::Registry;
use sitekit_modules::{FixedClock, ModuleDeps, register_stores};
use tokio::task::yield_now;
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NOW: &str = "2024-03-15T12:00:00Z";

pub const REPORT_PATH: &str = "/google-site-kit/v1/modules/analytics-4/data/report";
pub const KEY_METRICS_PATH: &str = "/google-site-kit/v1/core/user/data/key-metrics";
pub const MODULES_LIST_PATH: &str = "/google-site-kit/v1/core/modules/data/list";

/// How long a test waits for a selector to settle before failing.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestSite {
    pub server: MockServer,
    pub registry: Registry,
    pub clock: Arc<FixedClock>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(NOW)
        .unwrap()
        .with_timezone(&Utc)
}

/// Start a mock site and register every module store against it.
pub async fn setup() -> TestSite {
    init_tracing();
    let server = MockServer::start().await;

    let mut config = ResolvedConfig::from_config(&SitekitConfig::default()).unwrap();
    config.api.base_url = Url::parse(&server.uri()).unwrap();
    config.api.nonce = Some("test-nonce".to_string());

    let api = Arc::new(HttpApiClient::new(&config.api).unwrap());
    let clock = Arc::new(FixedClock::new(now()));
    let deps = ModuleDeps::new(api, config).with_clock(clock.clone());

    let registry = Registry::new();
    register_stores(&registry, &deps).unwrap();

    TestSite {
        server,
        registry,
        clock,
    }
}

/// Mount a one-shot GET response.
pub async fn mount_get_once(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Mount a POST response.
pub async fn mount_post(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Hold every GET to `route` long past any test's lifetime.
pub async fn freeze_fetch(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(600)))
        .mount(server)
        .await;
}

/// Number of requests the site received for `route`.
pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}

pub fn server_error() -> Value {
    json!({
        "code": "internal_server_error",
        "message": "Internal server error",
        "data": { "status": 500 },
    })
}

/// Select until the result is known, like `subscribeUntil(() => x !== undefined)`.
pub async fn select_until_known(
    registry: &Registry,
    store: &str,
    selector: &str,
    args: &[Value],
) -> Value {
    let known = |registry: &Registry| {
        registry
            .select(store)
            .call(selector, args)
            .ok()
            .flatten()
            .is_some()
    };
    timeout(SETTLE_TIMEOUT, registry.until(known))
        .await
        .unwrap_or_else(|_| panic!("{store} {selector} never settled"));
    registry
        .select(store)
        .call(selector, args)
        .unwrap()
        .unwrap()
}

/// Give in-flight resolvers a chance to run.
pub async fn settle() {
    for _ in 0..10 {
        yield_now().await;
    }
    sleep(Duration::from_millis(20)).await;
}

/// A GA4 report with data in its totals.
pub fn report_fixture() -> Value {
    json!({
        "dimensionHeaders": [{ "name": "date" }],
        "metricHeaders": [{ "name": "totalUsers", "type": "TYPE_INTEGER" }],
        "rows": [
            {
                "dimensionValues": [{ "value": "20240313" }],
                "metricValues": [{ "value": "48" }],
            },
            {
                "dimensionValues": [{ "value": "20240314" }],
                "metricValues": [{ "value": "52" }],
            },
        ],
        "totals": [
            {
                "dimensionValues": [{ "value": "RESERVED_TOTAL" }],
                "metricValues": [{ "value": "100" }],
            },
        ],
        "rowCount": 2,
        "kind": "analyticsData#runReport",
    })
}

/// A GA4 property created `age` before [`NOW`].
pub fn property_fixture(age: Duration) -> Value {
    let created = now() - TimeDelta::from_std(age).unwrap();
    json!({
        "_id": "1000",
        "_accountID": "100",
        "displayName": "Test GA4 Property",
        "timeZone": "Etc/UTC",
        "createTime": created.to_rfc3339(),
    })
}
