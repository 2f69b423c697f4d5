//! Date range slice.
//!
//! The range is a `last-N-days` slug anchored at a reference date, which is
//! today unless explicitly set. [`date_range_dates`] turns both into concrete
//! `YYYY-MM-DD` bounds, optionally with the preceding comparison period.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sitekit_data::{Action, StoreDefinition, StoreError, StoreState, arg, arg_str, with_key};
use sitekit_types::date_range_days;

use crate::ModuleDeps;
use crate::clock::Clock;

const DATE_RANGE_KEY: &str = "dateRange";
const REFERENCE_DATE_KEY: &str = "referenceDate";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
enum DateRangeAction {
    #[serde(rename_all = "camelCase")]
    SetDateRange { date_range: String },
    SetReferenceDate { date: String },
}

fn reduce(state: &StoreState, action: DateRangeAction) -> Option<StoreState> {
    match action {
        DateRangeAction::SetDateRange { date_range } => {
            Some(with_key(state, DATE_RANGE_KEY, Value::String(date_range)))
        }
        DateRangeAction::SetReferenceDate { date } => {
            Some(with_key(state, REFERENCE_DATE_KEY, Value::String(date)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateRangeDates {
    start: NaiveDate,
    end: NaiveDate,
    compare: Option<(NaiveDate, NaiveDate)>,
}

impl DateRangeDates {
    fn to_value(self) -> Value {
        let mut out = Map::new();
        out.insert("startDate".to_string(), format_date(self.start));
        out.insert("endDate".to_string(), format_date(self.end));
        if let Some((compare_start, compare_end)) = self.compare {
            out.insert("compareStartDate".to_string(), format_date(compare_start));
            out.insert("compareEndDate".to_string(), format_date(compare_end));
        }
        Value::Object(out)
    }
}

fn format_date(date: NaiveDate) -> Value {
    Value::String(date.format(DATE_FORMAT).to_string())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Bounds of a `days`-long range ending `offset_days` before `reference`.
///
/// The comparison period is the `days`-long range right before the start.
fn date_range_dates(
    reference: NaiveDate,
    days: u32,
    offset_days: u64,
    compare: bool,
) -> Option<DateRangeDates> {
    let span = Days::new(u64::from(days.saturating_sub(1)));
    let end = reference.checked_sub_days(Days::new(offset_days))?;
    let start = end.checked_sub_days(span)?;
    let compare = if compare {
        let compare_end = start.checked_sub_days(Days::new(1))?;
        Some((compare_end.checked_sub_days(span)?, compare_end))
    } else {
        None
    };
    Some(DateRangeDates {
        start,
        end,
        compare,
    })
}

fn reference_date(state: &StoreState, clock: &dyn Clock) -> NaiveDate {
    state
        .get(REFERENCE_DATE_KEY)
        .and_then(Value::as_str)
        .and_then(parse_date)
        .unwrap_or_else(|| clock.now().date_naive())
}

fn number_of_days(state: &StoreState) -> Option<u32> {
    state
        .get(DATE_RANGE_KEY)
        .and_then(Value::as_str)
        .and_then(date_range_days)
}

pub(super) fn slice(deps: &ModuleDeps) -> StoreDefinition {
    let reference_clock = Arc::clone(&deps.clock);
    let dates_clock = Arc::clone(&deps.clock);

    StoreDefinition::new()
        .state(
            DATE_RANGE_KEY,
            Value::String(deps.config.default_date_range.clone()),
        )
        .state(REFERENCE_DATE_KEY, Value::Null)
        .reducer_for(reduce)
        .action("setDateRange", |args| {
            let slug = arg_str(args, 0, "setDateRange")?;
            if date_range_days(slug).is_none() {
                return Err(StoreError::invalid_arguments(
                    "setDateRange",
                    "date range slug must be in the form last-N-days",
                ));
            }
            Ok(Action::encode(&DateRangeAction::SetDateRange {
                date_range: slug.to_string(),
            })?)
        })
        .action("setReferenceDate", |args| {
            let date = arg_str(args, 0, "setReferenceDate")?;
            if parse_date(date).is_none() {
                return Err(StoreError::invalid_arguments(
                    "setReferenceDate",
                    "date must be in the form YYYY-MM-DD",
                ));
            }
            Ok(Action::encode(&DateRangeAction::SetReferenceDate {
                date: date.to_string(),
            })?)
        })
        .selector("getDateRange", |ctx, _| Ok(ctx.get(DATE_RANGE_KEY).cloned()))
        .selector("getDateRangeNumberOfDays", |ctx, _| {
            Ok(number_of_days(ctx.state()).map(Value::from))
        })
        .uncached_selector("getReferenceDate", move |ctx, _| {
            Ok(Some(format_date(reference_date(
                ctx.state(),
                reference_clock.as_ref(),
            ))))
        })
        .uncached_selector("getDateRangeDates", move |ctx, args| {
            let options = arg(args, 0);
            let offset_days = options.get("offsetDays").and_then(Value::as_u64).unwrap_or(0);
            let compare = options.get("compare").and_then(Value::as_bool).unwrap_or(false);
            let reference = match options.get("referenceDate").and_then(Value::as_str) {
                Some(date) => parse_date(date).ok_or_else(|| {
                    StoreError::invalid_arguments(
                        "getDateRangeDates",
                        "referenceDate must be in the form YYYY-MM-DD",
                    )
                })?,
                None => reference_date(ctx.state(), dates_clock.as_ref()),
            };
            let Some(days) = number_of_days(ctx.state()) else {
                return Ok(None);
            };
            Ok(date_range_dates(reference, days, offset_days, compare).map(DateRangeDates::to_value))
        })
}
