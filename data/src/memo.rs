//! Selector memoization.
//!
//! Results are keyed by selector name and argument signature and tagged with
//! the registry version they were computed at. A lookup at any other version
//! misses, so a cached value is never served across a state commit or a
//! resolution transition.

use std::collections::HashMap;

use serde_json::Value;
use sitekit_types::ArgSignature;

#[derive(Debug)]
struct CacheEntry {
    version: u64,
    value: Option<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct SelectorCache {
    entries: HashMap<String, HashMap<ArgSignature, CacheEntry>>,
}

impl SelectorCache {
    /// Cached result at `version`. The outer `Option` is hit/miss.
    #[allow(clippy::option_option)]
    pub(crate) fn get(
        &self,
        selector: &str,
        signature: &ArgSignature,
        version: u64,
    ) -> Option<Option<Value>> {
        let entry = self.entries.get(selector)?.get(signature)?;
        (entry.version == version).then(|| entry.value.clone())
    }

    pub(crate) fn insert(
        &mut self,
        selector: &str,
        signature: ArgSignature,
        version: u64,
        value: Option<Value>,
    ) {
        self.entries
            .entry(selector.to_string())
            .or_default()
            .insert(signature, CacheEntry { version, value });
    }

    pub(crate) fn invalidate(&mut self, selector: &str) {
        self.entries.remove(selector);
    }
}
