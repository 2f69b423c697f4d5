//! Report slice.
//!
//! Reports are cached under the signature of their normalized options, so
//! `getReport` resolves each distinct request once. `hasZeroData` and
//! `isGatheringData` look at a small sample report (daily `totalUsers` over
//! the current date range, ending yesterday) to tell a new, still-empty
//! property from one that has been collecting data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use sitekit_api::ApiRequest;
use sitekit_data::{
    ArgSignature, FetchStoreBuilder, RegistrationError, SelectorContext, StoreContext,
    StoreDefinition, StoreError, StoreState, arg, combine_stores, with_key,
};
use sitekit_types::CORE_USER;

use super::SLUG;
use super::normalize::normalize_report_options;
use super::validation::validate_report_options;
use crate::clock::Clock;
use crate::gathering::classify;
use crate::{Method, ModuleDeps, api_control, fetch};

const REPORTS_KEY: &str = "reports";

/// Days between the reference date and the end of the sample report.
const DATE_RANGE_OFFSET: u64 = 1;

/// A report is zero when no total carries a metric value above zero.
///
/// Missing or empty `totals` count as zero, and so does a missing report.
/// String values are parsed as numbers.
#[must_use]
pub fn is_zero_report(report: &Value) -> bool {
    let Some(totals) = report.get("totals").and_then(Value::as_array) else {
        return true;
    };
    !totals.iter().any(|total| {
        total
            .get("metricValues")
            .and_then(Value::as_array)
            .is_some_and(|values| {
                values
                    .iter()
                    .any(|value| metric_value(value.get("value")) > 0.0)
            })
    })
}

fn metric_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn report_key(options: &Value) -> String {
    ArgSignature::of_value(&normalize_report_options(options))
        .as_str()
        .to_string()
}

fn report_in(state: &StoreState, options: &Value) -> Option<Value> {
    state.get(REPORTS_KEY)?.get(report_key(options)).cloned()
}

fn receive_report(state: &StoreState, report: &Value, params: &Value) -> StoreState {
    let options = params.get("options").unwrap_or(&Value::Null);
    let mut reports = state
        .get(REPORTS_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    reports.insert(report_key(options), report.clone());
    with_key(state, REPORTS_KEY, Value::Object(reports))
}

/// Objects are normalized before validation; anything else is passed through
/// for validation to reject.
fn report_params(args: &[Value]) -> Value {
    let options = arg(args, 0);
    let options = if options.is_object() {
        normalize_report_options(options)
    } else {
        options.clone()
    };
    json!({ "options": options })
}

pub(super) fn slice(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    let get_report = api_control(&deps.api, Method::Get, ApiRequest::modules(SLUG, "report"));
    let fetch_report = FetchStoreBuilder::new("getReport", move |params: Value| {
        get_report(params.get("options").cloned().unwrap_or(Value::Null))
    })
    .args_to_params(report_params)
    .validate_params(|params| validate_report_options(&params["options"]))
    .reducer(receive_report)
    .build();

    let clock = Arc::clone(&deps.clock);
    let threshold = deps.config.gathering_threshold;

    let slice = StoreDefinition::new()
        .state(REPORTS_KEY, json!({}))
        .selector("getReport", |ctx, args| Ok(report_in(ctx.state(), arg(args, 0))))
        .resolver("getReport", resolve_report)
        .uncached_selector("hasZeroData", |ctx, _| {
            let Some(args) = sample_report_args(ctx)? else {
                return Ok(None);
            };
            Ok(match settle_report(ctx, &args)? {
                Settled::Pending => None,
                Settled::Failed => Some(Value::Bool(true)),
                Settled::Report(report) => Some(Value::Bool(is_zero_report(&report))),
            })
        })
        .uncached_selector("isGatheringData", move |ctx, _| {
            is_gathering_data(ctx, clock.as_ref(), threshold)
        });

    combine_stores([slice, fetch_report])
}

async fn resolve_report(ctx: StoreContext, args: Vec<Value>) -> Result<(), StoreError> {
    let options = arg(&args, 0);
    let state = ctx.state()?;
    if report_in(&state, options).is_some_and(|report| !report.is_null()) {
        return Ok(());
    }
    fetch(&ctx, "fetchGetReport", &[options.clone()]).await?;
    Ok(())
}

/// Arguments of the sample report, or `None` until the date range is known.
fn sample_report_args(ctx: &SelectorContext<'_>) -> Result<Option<Vec<Value>>, StoreError> {
    let dates = ctx
        .select_from(CORE_USER)
        .call("getDateRangeDates", &[json!({ "offsetDays": DATE_RANGE_OFFSET })])?;
    Ok(dates.map(|dates| {
        vec![json!({
            "dimensions": ["date"],
            "metrics": [{ "name": "totalUsers" }],
            "startDate": dates["startDate"],
            "endDate": dates["endDate"],
        })]
    }))
}

enum Settled {
    Pending,
    Failed,
    Report(Value),
}

fn settle_report(ctx: &SelectorContext<'_>, args: &[Value]) -> Result<Settled, StoreError> {
    let report = ctx.select("getReport", args)?;
    let select = ctx.select_from(ctx.store_name());
    if !select.has_finished_resolution("getReport", args) {
        return Ok(Settled::Pending);
    }
    if select.error_for_selector("getReport", args).is_some() {
        return Ok(Settled::Failed);
    }
    Ok(Settled::Report(report.unwrap_or(Value::Null)))
}

fn is_gathering_data(
    ctx: &SelectorContext<'_>,
    clock: &dyn Clock,
    threshold: Duration,
) -> Result<Option<Value>, StoreError> {
    let Some(args) = sample_report_args(ctx)? else {
        return Ok(None);
    };
    let report = match settle_report(ctx, &args)? {
        Settled::Pending => return Ok(None),
        Settled::Failed => return Ok(Some(Value::Bool(false))),
        Settled::Report(report) => report,
    };
    let age = if is_zero_report(&report) {
        connection_age(ctx, clock)?
    } else {
        None
    };
    Ok(classify(Some(&report), age, threshold)
        .as_flag()
        .map(Value::Bool))
}

/// Time since the connected property was created.
fn connection_age(
    ctx: &SelectorContext<'_>,
    clock: &dyn Clock,
) -> Result<Option<Duration>, StoreError> {
    let Some(Value::String(property_id)) = ctx.select("getPropertyID", &[])? else {
        return Ok(None);
    };
    let Some(property) = ctx.select("getProperty", &[Value::String(property_id)])? else {
        return Ok(None);
    };
    let created = property
        .get("createTime")
        .and_then(Value::as_str)
        .and_then(|time| DateTime::parse_from_rfc3339(time).ok());
    let Some(created) = created else {
        return Ok(None);
    };
    let age = clock.now().signed_duration_since(created.with_timezone(&Utc));
    Ok(Some(age.to_std().unwrap_or(Duration::ZERO)))
}
