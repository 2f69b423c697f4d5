//! `core/user`: preferences of the signed-in user.

mod date_range;
mod key_metrics;

use sitekit_data::{RegistrationError, StoreDefinition, combine_stores, error_store};

use crate::ModuleDeps;

pub(crate) fn store(deps: &ModuleDeps) -> Result<StoreDefinition, RegistrationError> {
    combine_stores([
        date_range::slice(deps),
        key_metrics::slice(deps)?,
        error_store(),
    ])
}
