//! Gathering-data inference.
//!
//! A freshly connected analytics property reports zeros for a while before
//! data starts flowing. [`classify`] decides whether a zero report means
//! "still gathering" or "really empty" from the age of the connection.

use std::time::Duration;

use serde_json::Value;

use crate::analytics_4::is_zero_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    /// The report or the connection age is not known yet.
    Unknown,
    Gathering,
    Active,
    Empty,
}

impl GatheringState {
    /// `isGatheringData` value: `None` while unknown.
    #[must_use]
    pub fn as_flag(self) -> Option<bool> {
        match self {
            GatheringState::Unknown => None,
            GatheringState::Gathering => Some(true),
            GatheringState::Active | GatheringState::Empty => Some(false),
        }
    }
}

/// Classify a settled report.
///
/// `report` is `None` while the report is still resolving. A report that
/// resolved without a body is passed as `Some(&Value::Null)` and counts as
/// zero.
#[must_use]
pub fn classify(
    report: Option<&Value>,
    connection_age: Option<Duration>,
    threshold: Duration,
) -> GatheringState {
    let Some(report) = report else {
        return GatheringState::Unknown;
    };
    if !is_zero_report(report) {
        return GatheringState::Active;
    }
    match connection_age {
        None => GatheringState::Unknown,
        Some(age) if age < threshold => GatheringState::Gathering,
        Some(_) => GatheringState::Empty,
    }
}
