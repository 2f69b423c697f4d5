//! `modules/analytics-4`: the Google Analytics 4 module store.

mod normalize;
mod properties;
mod report;
mod settings;
mod validation;

use sitekit_data::{RegistrationError, StoreDefinition, combine_stores, error_store};

use crate::ModuleDeps;

pub use normalize::normalize_report_options;
pub use report::is_zero_report;
pub use validation::{
    is_valid_date_range, is_valid_date_string, is_valid_dimension_filters, is_valid_dimensions,
    is_valid_metrics, is_valid_orders, validate_report_options,
};

/// Module slug used in REST routes.
const SLUG: &str = "analytics-4";

pub(crate) fn store(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    combine_stores([
        settings::slice(deps)?,
        properties::slice(deps)?,
        report::slice(deps)?,
        error_store(),
    ])
}
