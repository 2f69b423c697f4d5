//! `core/user` key metrics settings

use std::time::Duration;

use serde_json::{Value, json};
use sitekit_data::{Registry, Select};
use sitekit_types::CORE_USER;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    KEY_METRICS_PATH, mount_get_once, mount_post, requests_to, server_error, setup,
};

fn key_metrics(select: &Select<'_>) -> Value {
    select.state().unwrap()["keyMetrics"].clone()
}

#[tokio::test]
async fn set_key_metric_setting_updates_local_settings() {
    let site = setup().await;

    site.registry
        .dispatch(CORE_USER)
        .call("setKeyMetricSetting", &[json!("test-setting"), json!("test-value")])
        .unwrap();

    let select = site.registry.select(CORE_USER);
    assert_eq!(key_metrics(&select)["test-setting"], json!("test-value"));
    assert_eq!(requests_to(&site.server, KEY_METRICS_PATH).await, 0);
}

#[tokio::test]
async fn save_key_metrics_posts_settings_and_stores_the_response() {
    let site = setup().await;
    let saved = json!({ "widgetSlugs": ["widget1", "widget2"], "isWidgetHidden": false });
    mount_post(
        &site.server,
        KEY_METRICS_PATH,
        ResponseTemplate::new(200).set_body_json(saved.clone()),
    )
    .await;

    let dispatch = site.registry.dispatch(CORE_USER);
    dispatch
        .call("setKeyMetricSetting", &[json!("test-setting"), json!("test-value")])
        .unwrap();
    let response = dispatch.run("saveKeyMetrics", &[]).await.unwrap();

    assert!(!response.is_error());
    assert_eq!(response.response, Some(saved.clone()));

    let requests = site.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method.as_str(), "POST");
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(
        body,
        json!({ "data": { "settings": { "test-setting": "test-value" } } })
    );

    let select = site.registry.select(CORE_USER);
    assert_eq!(key_metrics(&select), saved);
    assert_eq!(
        select.call("isSavingKeyMetricsSettings", &[]).unwrap(),
        Some(json!(false))
    );
}

#[tokio::test]
async fn save_key_metrics_records_the_error() {
    let site = setup().await;
    mount_post(
        &site.server,
        KEY_METRICS_PATH,
        ResponseTemplate::new(500).set_body_json(server_error()),
    )
    .await;

    let dispatch = site.registry.dispatch(CORE_USER);
    dispatch
        .call("setKeyMetricSetting", &[json!("test-setting"), json!("test-value")])
        .unwrap();
    let response = dispatch.run("saveKeyMetrics", &[]).await.unwrap();

    let error = response.error.unwrap();
    assert_eq!(error.to_value(), server_error());

    let select = site.registry.select(CORE_USER);
    assert_eq!(
        select.error_for_action("saveKeyMetrics", &[]).map(|e| e.to_value()),
        Some(server_error())
    );
    assert_eq!(
        select.call("isSavingKeyMetricsSettings", &[]).unwrap(),
        Some(json!(false))
    );
    // The local edit survives a failed save.
    assert_eq!(key_metrics(&select)["test-setting"], json!("test-value"));
}

#[tokio::test]
async fn saving_flag_is_set_while_the_request_is_in_flight() {
    let site = setup().await;
    Mock::given(method("POST"))
        .and(path(KEY_METRICS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "widgetSlugs": [] }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&site.server)
        .await;

    let registry = site.registry.clone();
    let save = tokio::spawn(async move {
        registry.dispatch(CORE_USER).run("saveKeyMetrics", &[]).await
    });

    let saving = |registry: &Registry| {
        registry
            .select(CORE_USER)
            .call("isSavingKeyMetricsSettings", &[])
            .ok()
            .flatten()
            == Some(json!(true))
    };
    site.registry.until(saving).await;

    save.await.unwrap().unwrap();
    assert_eq!(
        site.registry
            .select(CORE_USER)
            .call("isSavingKeyMetricsSettings", &[])
            .unwrap(),
        Some(json!(false))
    );
}

#[tokio::test]
async fn get_key_metrics_settings_resolves_from_the_endpoint() {
    let site = setup().await;
    let settings = json!({ "widgetSlugs": ["widget1"], "isWidgetHidden": true });
    mount_get_once(
        &site.server,
        KEY_METRICS_PATH,
        ResponseTemplate::new(200).set_body_json(settings.clone()),
    )
    .await;

    let select = site.registry.select(CORE_USER);
    assert_eq!(select.call("getKeyMetricsSettings", &[]).unwrap(), None);

    let resolved = site
        .registry
        .until_resolved(CORE_USER)
        .selector("getKeyMetricsSettings", &[])
        .await
        .unwrap();
    assert_eq!(resolved, Some(settings));
    assert_eq!(requests_to(&site.server, KEY_METRICS_PATH).await, 1);
}
