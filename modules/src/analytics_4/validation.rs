//! Report option validation.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use sitekit_types::date_range_days;

use super::normalize::normalize_report_options;

/// `YYYY-MM-DD`, zero-padded, naming a real day.
#[must_use]
pub fn is_valid_date_string(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Either a `dateRange` slug or both `startDate` and `endDate`.
#[must_use]
pub fn is_valid_date_range(options: &Value) -> bool {
    if options
        .get("dateRange")
        .and_then(Value::as_str)
        .is_some_and(|slug| date_range_days(slug).is_some())
    {
        return true;
    }
    let date = |key: &str| {
        options
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(is_valid_date_string)
    };
    date("startDate") && date("endDate")
}

/// A name, a valid object, or a non-empty list of either.
fn is_valid_strings_or_objects(
    items: &Value,
    is_valid_object: impl Fn(&Map<String, Value>) -> bool,
) -> bool {
    let is_valid_item = |item: &Value| match item {
        Value::String(name) => !name.is_empty(),
        Value::Object(object) => is_valid_object(object),
        _ => false,
    };
    match items {
        Value::Array(list) => !list.is_empty() && list.iter().all(is_valid_item),
        other => is_valid_item(other),
    }
}

/// Objects need a string `name` and, if present, a string `expression`.
#[must_use]
pub fn is_valid_metrics(metrics: &Value) -> bool {
    is_valid_strings_or_objects(metrics, |metric| {
        let name = metric.get("name").is_some_and(Value::is_string);
        let expression = metric.get("expression").is_none_or(Value::is_string);
        name && expression
    })
}

#[must_use]
pub fn is_valid_dimensions(dimensions: &Value) -> bool {
    is_valid_strings_or_objects(dimensions, |dimension| {
        dimension.get("name").is_some_and(Value::is_string)
    })
}

/// Dimension name → value or list of values.
#[must_use]
pub fn is_valid_dimension_filters(filters: &Value) -> bool {
    let Some(filters) = filters.as_object() else {
        return false;
    };
    filters.values().all(|filter| match filter {
        Value::String(_) => true,
        Value::Array(values) => values.iter().all(Value::is_string),
        _ => false,
    })
}

/// Each order sorts by exactly one of a metric or a dimension, with an
/// optional boolean `desc`.
#[must_use]
pub fn is_valid_orders(orders: &Value) -> bool {
    let Some(orders) = orders.as_array() else {
        return false;
    };
    orders.iter().all(|order| {
        let Some(order) = order.as_object() else {
            return false;
        };
        if order.get("desc").is_some_and(|desc| !desc.is_boolean()) {
            return false;
        }
        let present = |key: &str| order.get(key).is_some_and(is_truthy);
        if present("metric") {
            return !present("dimension")
                && order["metric"].get("metricName").is_some_and(Value::is_string);
        }
        if present("dimension") {
            return order["dimension"]
                .get("dimensionName")
                .is_some_and(Value::is_string);
        }
        false
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Reject options an Analytics 4 report request cannot be built from.
pub fn validate_report_options(options: &Value) -> Result<(), String> {
    if !options.is_object() {
        return Err("options for Analytics 4 report must be an object.".to_string());
    }
    if !is_valid_date_range(options) {
        return Err(
            "Either date range or start/end dates must be provided for Analytics 4 report."
                .to_string(),
        );
    }

    let normalized = normalize_report_options(options);
    let metrics = &normalized["metrics"];
    if metrics.as_array().is_none_or(Vec::is_empty) {
        return Err(
            "Requests must specify at least one metric for an Analytics 4 report.".to_string(),
        );
    }
    if !is_valid_metrics(metrics) {
        return Err(
            "metrics for an Analytics 4 report must be either a string, an array of strings, an object, an array of objects, or a mix of strings and objects. Objects must have a \"name\" property."
                .to_string(),
        );
    }

    let dimensions = &normalized["dimensions"];
    let has_dimensions = dimensions.as_array().is_some_and(|list| !list.is_empty());
    if has_dimensions && !is_valid_dimensions(dimensions) {
        return Err(
            "dimensions for an Analytics 4 report must be either a string, an array of strings, an object, an array of objects, or a mix of strings and objects. Objects must have a \"name\" property."
                .to_string(),
        );
    }

    if let Some(filters) = options.get("dimensionFilters")
        && !is_valid_dimension_filters(filters)
    {
        return Err(
            "dimensionFilters for an Analytics 4 report must be a map of dimension names as keys and dimension values as values."
                .to_string(),
        );
    }

    if let Some(orders) = options.get("orderby")
        && !is_valid_orders(orders)
    {
        return Err(
            "orderby for an Analytics 4 report must be an array of OrderBy objects where each object should have either a \"metric\" or \"dimension\" property, and an optional \"desc\" property."
                .to_string(),
        );
    }

    Ok(())
}
