//! Resolution records.
//!
//! One record per (selector, argument signature) per store. A record is
//! created pending when the resolver is first scheduled and flips to done
//! when it settles, successfully or not. Done records stay until an explicit
//! invalidation, which is what keeps a resolver from running twice.

use std::collections::HashMap;
use std::time::Instant;

use sitekit_types::ArgSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone)]
pub struct ResolutionRecord {
    pub signature: ArgSignature,
    pub status: ResolutionStatus,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
    /// Distinguishes a record from one that replaced it after invalidation.
    ticket: u64,
}

impl ResolutionRecord {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ResolutionStatus::Pending
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == ResolutionStatus::Done
    }
}

#[derive(Debug, Default)]
pub(crate) struct ResolutionTable {
    records: HashMap<String, HashMap<ArgSignature, ResolutionRecord>>,
    next_ticket: u64,
}

impl ResolutionTable {
    /// Insert a pending record. Returns its ticket, or `None` if a record
    /// (pending or done) already exists for the key.
    pub(crate) fn start(&mut self, selector: &str, signature: &ArgSignature) -> Option<u64> {
        let by_sig = self.records.entry(selector.to_string()).or_default();
        if by_sig.contains_key(signature) {
            return None;
        }
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        by_sig.insert(
            signature.clone(),
            ResolutionRecord {
                signature: signature.clone(),
                status: ResolutionStatus::Pending,
                started_at: Instant::now(),
                finished_at: None,
                ticket,
            },
        );
        Some(ticket)
    }

    /// Mark the record started with `ticket` as done.
    ///
    /// A record that was invalidated (and possibly restarted) in the meantime
    /// is left untouched; returns whether anything changed.
    pub(crate) fn finish(&mut self, selector: &str, signature: &ArgSignature, ticket: u64) -> bool {
        let Some(record) = self
            .records
            .get_mut(selector)
            .and_then(|by_sig| by_sig.get_mut(signature))
        else {
            return false;
        };
        if record.ticket != ticket || record.is_done() {
            return false;
        }
        record.status = ResolutionStatus::Done;
        record.finished_at = Some(Instant::now());
        true
    }

    pub(crate) fn get(&self, selector: &str, signature: &ArgSignature) -> Option<&ResolutionRecord> {
        self.records.get(selector)?.get(signature)
    }

    pub(crate) fn invalidate(&mut self, selector: &str, signature: &ArgSignature) -> bool {
        self.records
            .get_mut(selector)
            .is_some_and(|by_sig| by_sig.remove(signature).is_some())
    }

    /// Drop every record of a selector. Returns how many were removed.
    pub(crate) fn invalidate_selector(&mut self, selector: &str) -> usize {
        self.records.remove(selector).map_or(0, |by_sig| by_sig.len())
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.records
            .values()
            .flat_map(HashMap::values)
            .filter(|r| r.is_pending())
            .count()
    }
}
