//! `isGatheringData` for a freshly connected property

use std::time::Duration;

use serde_json::{Value, json};
use sitekit_types::MODULES_ANALYTICS_4;
use wiremock::ResponseTemplate;

use crate::common::{
    REPORT_PATH, TestSite, freeze_fetch, mount_get_once, property_fixture, report_fixture,
    select_until_known, server_error, settle, setup,
};

const HOUR: Duration = Duration::from_secs(3600);

/// Connect property `1000`, created `age` before now.
fn connect_property(site: &TestSite, age: Duration) {
    let dispatch = site.registry.dispatch(MODULES_ANALYTICS_4);
    dispatch
        .call("receiveGetSettings", &[json!({}), json!({})])
        .unwrap();
    dispatch
        .call(
            "receiveGetProperty",
            &[property_fixture(age), json!({ "propertyID": "1000" })],
        )
        .unwrap();
    dispatch.call("setPropertyID", &[json!("1000")]).unwrap();
}

fn zero_totals_report() -> Value {
    let mut report = report_fixture();
    report["totals"] = json!([{
        "dimensionValues": [{ "value": "RESERVED_TOTAL" }],
        "metricValues": [{ "value": "0" }],
    }]);
    report
}

/// Every shape of report that counts as zero data.
fn zero_responses() -> Vec<(&'static str, ResponseTemplate)> {
    vec![
        ("no body", ResponseTemplate::new(200)),
        (
            "null",
            ResponseTemplate::new(200).set_body_raw("null", "application/json"),
        ),
        ("empty object", ResponseTemplate::new(200).set_body_json(json!({}))),
        (
            "empty totals",
            ResponseTemplate::new(200).set_body_json(json!({ "totals": [{}] })),
        ),
        (
            "zero totals",
            ResponseTemplate::new(200).set_body_json(zero_totals_report()),
        ),
    ]
}

async fn gathering_for(response: ResponseTemplate, age: Duration) -> Value {
    let site = setup().await;
    mount_get_once(&site.server, REPORT_PATH, response).await;
    connect_property(&site, age);
    select_until_known(&site.registry, MODULES_ANALYTICS_4, "isGatheringData", &[]).await
}

#[tokio::test]
async fn is_undefined_while_the_report_resolves() {
    let site = setup().await;
    freeze_fetch(&site.server, REPORT_PATH).await;
    connect_property(&site, 36 * HOUR);

    let select = site.registry.select(MODULES_ANALYTICS_4);
    assert_eq!(select.call("isGatheringData", &[]).unwrap(), None);
    settle().await;
    assert_eq!(select.call("isGatheringData", &[]).unwrap(), None);
}

#[tokio::test]
async fn is_false_when_the_report_has_data() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(report_fixture()),
    )
    .await;

    let gathering =
        select_until_known(&site.registry, MODULES_ANALYTICS_4, "isGatheringData", &[]).await;
    assert_eq!(gathering, json!(false));
}

#[tokio::test]
async fn is_true_for_zero_data_within_the_threshold() {
    for (name, response) in zero_responses() {
        let gathering = gathering_for(response, 36 * HOUR).await;
        assert_eq!(gathering, json!(true), "report with {name}");
    }
}

#[tokio::test]
async fn is_false_for_zero_data_at_the_threshold() {
    for (name, response) in zero_responses() {
        let gathering = gathering_for(response, 48 * HOUR).await;
        assert_eq!(gathering, json!(false), "report with {name}");
    }
}

#[tokio::test]
async fn is_false_when_the_report_fails() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(500).set_body_json(server_error()),
    )
    .await;
    connect_property(&site, 36 * HOUR);

    let gathering =
        select_until_known(&site.registry, MODULES_ANALYTICS_4, "isGatheringData", &[]).await;
    assert_eq!(gathering, json!(false));
}

#[tokio::test]
async fn follows_the_clock_past_the_threshold() {
    let site = setup().await;
    mount_get_once(
        &site.server,
        REPORT_PATH,
        ResponseTemplate::new(200).set_body_json(json!({ "totals": [{}] })),
    )
    .await;
    connect_property(&site, 47 * HOUR);

    let gathering =
        select_until_known(&site.registry, MODULES_ANALYTICS_4, "isGatheringData", &[]).await;
    assert_eq!(gathering, json!(true));

    // Same day, so the sample report stays cached; only the age moves.
    site.clock.advance(2 * HOUR);

    let gathering =
        select_until_known(&site.registry, MODULES_ANALYTICS_4, "isGatheringData", &[]).await;
    assert_eq!(gathering, json!(false));
}
