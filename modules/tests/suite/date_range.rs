//! `core/user` date range and reference date

use std::time::Duration;

use serde_json::json;
use sitekit_data::StoreError;
use sitekit_types::CORE_USER;

use crate::common::setup;

#[tokio::test]
async fn defaults_to_the_configured_range() {
    let site = setup().await;
    let select = site.registry.select(CORE_USER);

    assert_eq!(
        select.call("getDateRange", &[]).unwrap(),
        Some(json!("last-28-days"))
    );
    assert_eq!(
        select.call("getDateRangeNumberOfDays", &[]).unwrap(),
        Some(json!(28))
    );
}

#[tokio::test]
async fn reference_date_follows_the_clock_until_set() {
    let site = setup().await;
    let select = site.registry.select(CORE_USER);

    assert_eq!(
        select.call("getReferenceDate", &[]).unwrap(),
        Some(json!("2024-03-15"))
    );

    site.registry
        .dispatch(CORE_USER)
        .call("setReferenceDate", &[json!("2023-12-31")])
        .unwrap();
    assert_eq!(
        select.call("getReferenceDate", &[]).unwrap(),
        Some(json!("2023-12-31"))
    );
}

#[tokio::test]
async fn reference_date_moves_with_the_clock() {
    let site = setup().await;
    let select = site.registry.select(CORE_USER);
    let dates_args = [json!({ "offsetDays": 1 })];

    assert_eq!(
        select.call("getReferenceDate", &[]).unwrap(),
        Some(json!("2024-03-15"))
    );
    assert_eq!(
        select.call("getDateRangeDates", &dates_args).unwrap().unwrap()["endDate"],
        json!("2024-03-14")
    );

    site.clock.advance(Duration::from_secs(24 * 3600));

    assert_eq!(
        select.call("getReferenceDate", &[]).unwrap(),
        Some(json!("2024-03-16"))
    );
    assert_eq!(
        select.call("getDateRangeDates", &dates_args).unwrap().unwrap()["endDate"],
        json!("2024-03-15")
    );
}

#[tokio::test]
async fn dates_end_before_the_reference_date() {
    let site = setup().await;
    let select = site.registry.select(CORE_USER);

    let dates = select
        .call("getDateRangeDates", &[json!({ "offsetDays": 1, "compare": true })])
        .unwrap();
    assert_eq!(
        dates,
        Some(json!({
            "startDate": "2024-02-16",
            "endDate": "2024-03-14",
            "compareStartDate": "2024-01-19",
            "compareEndDate": "2024-02-15",
        }))
    );
}

#[tokio::test]
async fn dates_follow_a_new_range() {
    let site = setup().await;
    site.registry
        .dispatch(CORE_USER)
        .call("setDateRange", &[json!("last-7-days")])
        .unwrap();

    let dates = site
        .registry
        .select(CORE_USER)
        .call("getDateRangeDates", &[json!({})])
        .unwrap();
    assert_eq!(
        dates,
        Some(json!({ "startDate": "2024-03-09", "endDate": "2024-03-15" }))
    );
}

#[tokio::test]
async fn explicit_reference_date_overrides_state() {
    let site = setup().await;

    let dates = site
        .registry
        .select(CORE_USER)
        .call(
            "getDateRangeDates",
            &[json!({ "referenceDate": "2022-11-30", "offsetDays": 0 })],
        )
        .unwrap();
    assert_eq!(
        dates,
        Some(json!({ "startDate": "2022-11-03", "endDate": "2022-11-30" }))
    );
}

#[tokio::test]
async fn rejects_malformed_input() {
    let site = setup().await;
    let dispatch = site.registry.dispatch(CORE_USER);

    let err = dispatch.call("setDateRange", &[json!("last-week")]).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArguments { ref name, .. } if name == "setDateRange"));

    let err = dispatch
        .call("setReferenceDate", &[json!("15/03/2024")])
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArguments { .. }));

    assert_eq!(
        site.registry.select(CORE_USER).call("getDateRange", &[]).unwrap(),
        Some(json!("last-28-days"))
    );
}
