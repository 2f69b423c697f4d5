//! Core domain types for the Site Kit datastore.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: the API client, the store runtime,
//! and the module stores built on top of it.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod action;
mod api_error;
mod signature;

pub use action::Action;
pub use api_error::{ApiError, ApiErrorData};
pub use signature::{ArgSignature, canonicalize};

/// Store name of the site-wide module list (`core/modules`).
pub const CORE_MODULES: &str = "core/modules";

/// Store name of the current user's preferences (`core/user`).
pub const CORE_USER: &str = "core/user";

/// Store name of the Google Analytics 4 module (`modules/analytics-4`).
pub const MODULES_ANALYTICS_4: &str = "modules/analytics-4";

/// Number of days in a `last-N-days` date range slug.
///
/// Returns `None` for anything else, including `last-0-days`.
#[must_use]
pub fn date_range_days(slug: &str) -> Option<u32> {
    let days: u32 = slug.strip_prefix("last-")?.strip_suffix("-days")?.parse().ok()?;
    (days > 0).then_some(days)
}
