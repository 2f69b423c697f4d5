//! `modules/analytics-4` report resolution

use std::time::Duration;

use serde_json::{Value, json};
use sitekit_data::{Registry, StoreError};
use sitekit_types::MODULES_ANALYTICS_4;
use tokio::time::timeout;
use wiremock::ResponseTemplate;

use crate::common::{
    REPORT_PATH, freeze_fetch, mount_get_once, report_fixture, requests_to, select_until_known,
    server_error, settle, setup,
};

fn report_options() -> Value {
    json!({
        "startDate": "2022-11-02",
        "endDate": "2022-11-04",
        "compareStartDate": "2022-11-01",
        "compareEndDate": "2022-11-02",
        // Dimensions in both string and object form.
        "dimensions": [
            "sessionDefaultChannelGrouping",
            { "name": "pageTitle" },
        ],
        "metrics": [
            "sessions",
            { "name": "PageViews" },
            { "name": "total", "expression": "totalUsers" },
        ],
    })
}

#[tokio::test]
async fn get_report_uses_a_resolver_to_fetch() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(report_fixture()),
    )
    .await;
    let args = [report_options()];

    let initial = site
        .registry
        .select(MODULES_ANALYTICS_4)
        .call("getReport", &args)
        .unwrap();
    assert_eq!(initial, None);

    let report = site
        .registry
        .until_resolved(MODULES_ANALYTICS_4)
        .selector("getReport", &args)
        .await
        .unwrap();

    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 1);
    assert_eq!(report, Some(report_fixture()));
}

#[tokio::test]
async fn get_report_sends_normalized_options_as_query_arguments() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(report_fixture()),
    )
    .await;

    site.registry
        .until_resolved(MODULES_ANALYTICS_4)
        .selector("getReport", &[report_options()])
        .await
        .unwrap();

    let requests = site.server.received_requests().await.unwrap();
    let query: Vec<(String, String)> = requests[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let has = |key: &str, value: &str| query.iter().any(|(k, v)| k == key && v == value);
    assert!(has("metrics[0][name]", "sessions"));
    assert!(has("metrics[2][expression]", "totalUsers"));
    assert!(has("dimensions[0][name]", "sessionDefaultChannelGrouping"));
    assert!(has("startDate", "2022-11-02"));
    assert!(requests[0].headers.get("X-WP-Nonce").is_some());
}

#[tokio::test]
async fn get_report_skips_the_request_when_already_received() {
    let site = setup().await;
    let args = [report_options()];

    site.registry
        .dispatch(MODULES_ANALYTICS_4)
        .call(
            "receiveGetReport",
            &[report_fixture(), json!({ "options": report_options() })],
        )
        .unwrap();

    let report = site
        .registry
        .select(MODULES_ANALYTICS_4)
        .call("getReport", &args)
        .unwrap();
    site.registry
        .until_resolved(MODULES_ANALYTICS_4)
        .selector("getReport", &args)
        .await
        .unwrap();

    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 0);
    assert_eq!(report, Some(report_fixture()));
}

#[tokio::test]
async fn equivalent_options_share_one_request() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(report_fixture()),
    )
    .await;

    let string_form = json!({
        "dateRange": "last-28-days",
        "metrics": "sessions",
        "dimensions": "date",
    });
    let object_form = json!({
        "dimensions": [{ "name": "date" }],
        "metrics": [{ "name": "sessions" }],
        "dateRange": "last-28-days",
    });

    site.registry
        .until_resolved(MODULES_ANALYTICS_4)
        .selector("getReport", &[string_form])
        .await
        .unwrap();
    let second = site
        .registry
        .until_resolved(MODULES_ANALYTICS_4)
        .selector("getReport", &[object_form])
        .await
        .unwrap();

    assert_eq!(second, Some(report_fixture()));
    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 1);
}

#[tokio::test]
async fn get_report_records_an_error_when_the_request_fails() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(500).set_body_json(server_error()),
    )
    .await;
    let args = [report_options()];

    site.registry
        .until_resolved(MODULES_ANALYTICS_4)
        .selector("getReport", &args)
        .await
        .unwrap();

    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 1);
    let select = site.registry.select(MODULES_ANALYTICS_4);
    assert_eq!(select.call("getReport", &args).unwrap(), None);

    let error = select.error_for_selector("getReport", &args).unwrap();
    assert_eq!(error.code, "internal_server_error");
    assert_eq!(error.status(), Some(500));
    assert_eq!(
        select
            .call("getErrorForSelector", &[json!("getReport"), json!(args)])
            .unwrap(),
        Some(server_error())
    );
}

#[tokio::test]
async fn failed_report_is_not_refetched_until_invalidated() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(500).set_body_json(server_error()),
    )
    .await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(report_fixture()),
    )
    .await;
    let args = [report_options()];
    let until = site.registry.until_resolved(MODULES_ANALYTICS_4);

    until.selector("getReport", &args).await.unwrap();
    site.registry
        .select(MODULES_ANALYTICS_4)
        .call("getReport", &args)
        .unwrap();
    settle().await;
    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 1);

    let dispatch = site.registry.dispatch(MODULES_ANALYTICS_4);
    assert!(dispatch.invalidate_resolution("getReport", &args).unwrap());
    let report = until.selector("getReport", &args).await.unwrap();

    assert_eq!(report, Some(report_fixture()));
    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 2);
    assert!(site
        .registry
        .select(MODULES_ANALYTICS_4)
        .error_for_selector("getReport", &args)
        .is_none());
}

#[tokio::test]
async fn invalid_options_fail_without_a_request() {
    let site = setup().await;

    let err = site
        .registry
        .dispatch(MODULES_ANALYTICS_4)
        .run("fetchGetReport", &[json!({ "metrics": "sessions" })])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidArguments { ref name, .. } if name == "fetchGetReport"));
    assert_eq!(requests_to(&site.server, REPORT_PATH).await, 0);
}

#[tokio::test]
async fn is_fetching_tracks_the_request() {
    let site = setup().await;
    freeze_fetch(&site.server, REPORT_PATH).await;
    let args = [report_options()];

    let select = site.registry.select(MODULES_ANALYTICS_4);
    assert_eq!(
        select.call("isFetchingGetReport", &args).unwrap(),
        Some(json!(false))
    );

    select.call("getReport", &args).unwrap();
    let fetching = |registry: &Registry| {
        registry
            .select(MODULES_ANALYTICS_4)
            .call("isFetchingGetReport", &args)
            .ok()
            .flatten()
            == Some(json!(true))
    };
    timeout(Duration::from_secs(5), site.registry.until(fetching))
        .await
        .unwrap();

    assert!(select.is_resolving("getReport", &args));
    assert!(!select.has_finished_resolution("getReport", &args));
}

#[tokio::test]
async fn has_zero_data_is_undefined_while_the_report_resolves() {
    let site = setup().await;
    freeze_fetch(&site.server, REPORT_PATH).await;

    let select = site.registry.select(MODULES_ANALYTICS_4);
    assert_eq!(select.call("hasZeroData", &[]).unwrap(), None);
    settle().await;
    assert_eq!(select.call("hasZeroData", &[]).unwrap(), None);
}

#[tokio::test]
async fn has_zero_data_is_true_for_a_zero_report() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(json!({ "totals": [{}] })),
    )
    .await;

    let select = site.registry.select(MODULES_ANALYTICS_4);
    assert_eq!(select.call("hasZeroData", &[]).unwrap(), None);

    let zero = select_until_known(&site.registry, MODULES_ANALYTICS_4, "hasZeroData", &[]).await;
    assert_eq!(zero, json!(true));
}

#[tokio::test]
async fn has_zero_data_is_false_for_a_report_with_data() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(report_fixture()),
    )
    .await;

    let select = site.registry.select(MODULES_ANALYTICS_4);
    assert_eq!(select.call("hasZeroData", &[]).unwrap(), None);

    let zero = select_until_known(&site.registry, MODULES_ANALYTICS_4, "hasZeroData", &[]).await;
    assert_eq!(zero, json!(false));
}
